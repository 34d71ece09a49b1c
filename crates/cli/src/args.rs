//! Command-line arguments.
//!
//! ```text
//! clipseek search [OPTIONS] [TEXT]...   search, printing one result per line
//! clipseek tags [IMAGE_ID]              list all known tags, or one image's tags
//! ```

use clap::{ArgAction, Parser, ValueEnum};
use clipseek_core::search::SortOrder;
use clipseek_search::query::{EmbeddingInput, FilterInput, SearchRequest};

/// Semantic image search client.
#[derive(Debug, Parser)]
#[command(name = "clipseek", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Run a search and print the de-duplicated results.
    Search(SearchArgs),

    /// List all known tags, or the tags of one image.
    Tags {
        /// Image to list tags for.
        image_id: Option<String>,
    },
}

/// Arguments for the search command.
#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    /// Text to search for; words are joined into one query.
    #[arg(required_unless_present = "images")]
    pub text: Vec<String>,

    /// Add an image as an embedding input.
    #[arg(long = "image", action = ArgAction::Append)]
    pub images: Vec<String>,

    /// Require a tag.
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,

    /// Exclude images carrying a tag.
    #[arg(long = "exclude-tag", action = ArgAction::Append)]
    pub exclude_tags: Vec<String>,

    /// Require the path to contain TEXT.
    #[arg(long = "path", value_name = "TEXT")]
    pub path: Option<String>,

    /// Exclude paths containing TEXT.
    #[arg(long = "exclude-path", value_name = "TEXT")]
    pub exclude_path: Option<String>,

    #[arg(long, value_enum, default_value_t = SortArg::Similarity)]
    pub sort: SortArg,

    /// Number of pages to fetch.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,
}

/// `--sort` values, mirroring [`SortOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum SortArg {
    Similarity,
    SimilarityAsc,
    SemanticPage,
    SimilarityMax,
    SimilarityMaxAsc,
    Direction,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Similarity => Self::Similarity,
            SortArg::SimilarityAsc => Self::SimilarityAsc,
            SortArg::SemanticPage => Self::SemanticPage,
            SortArg::SimilarityMax => Self::SimilarityMax,
            SortArg::SimilarityMaxAsc => Self::SimilarityMaxAsc,
            SortArg::Direction => Self::Direction,
        }
    }
}

impl SearchArgs {
    /// Build the search request: the joined text first, then images.
    pub fn to_request(&self) -> SearchRequest {
        let mut inputs = Vec::new();
        if !self.text.is_empty() {
            inputs.push(EmbeddingInput::text(self.text.join(" ")));
        }
        inputs.extend(self.images.iter().cloned().map(EmbeddingInput::image));

        let filters = FilterInput {
            required_path_contains: self.path.clone(),
            excluded_path_contains: self.exclude_path.clone(),
            positive_tags: self.tags.clone(),
            negative_tags: self.exclude_tags.clone(),
        };

        SearchRequest::new(inputs)
            .with_filters(filters)
            .with_sort_order(self.sort.into())
    }
}
