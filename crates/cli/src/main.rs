//! `clipseek` -- command-line client for the semantic image search backend.
//!
//! Submits searches over HTTP, follows their progress over the shared
//! progress WebSocket and prints the de-duplicated results, one per line.
//! See [`clipseek_cli::args::Cli`] for the command line and
//! [`clipseek_cli::config::ClientConfig::from_env`] for the environment
//! variables.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use clipseek_cli::args::{Cli, Command};
use clipseek_cli::config::ClientConfig;
use clipseek_cli::monitor;
use clipseek_progress::channel::{ChannelConfig, ProgressChannel};
use clipseek_progress::registry::TaskRegistry;
use clipseek_search::api::SearchApi;
use clipseek_search::pagination::PaginationController;
use clipseek_search::query::SearchRequest;
use clipseek_tasks::runner::TaskRunner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for the progress channel before giving up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipseek=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("invalid configuration")?;

    tracing::info!(
        api_url = %config.api_url,
        progress_ws_url = %config.progress_ws_url,
        page_size = config.page_size,
        "Starting clipseek",
    );

    let api = Arc::new(SearchApi::new(config.api_url.clone()));

    match cli.command {
        Command::Tags { image_id: None } => {
            for tag in api.all_known_tags().await? {
                println!("{tag}");
            }
        }
        Command::Tags {
            image_id: Some(image_id),
        } => {
            for tag in api.tags_for_image(&image_id).await? {
                println!("{tag}");
            }
        }
        Command::Search(args) => {
            run_search(&config, api, args.to_request(), args.pages as usize).await?;
        }
    }

    Ok(())
}

async fn run_search(
    config: &ClientConfig,
    api: Arc<SearchApi>,
    request: SearchRequest,
    pages: usize,
) -> anyhow::Result<()> {
    let registry = TaskRegistry::new(config.eviction_grace);
    let channel = ProgressChannel::new(
        ChannelConfig {
            url: config.progress_ws_url.clone(),
            reconnect: config.reconnect.clone(),
        },
        registry.clone(),
    );

    let status_logger = tokio::spawn(monitor::log_connection_status(channel.watch_status()));
    let progress_logger = tokio::spawn(monitor::log_registry_updates(registry.subscribe()));

    let subscription = channel.subscribe();
    let mut status = channel.watch_status();
    let connected = tokio::time::timeout(CONNECT_TIMEOUT, status.wait_for(|s| s.is_connected())).await;
    if !matches!(connected, Ok(Ok(_))) {
        bail!(
            "could not connect to progress endpoint {} within {}s",
            config.progress_ws_url,
            CONNECT_TIMEOUT.as_secs()
        );
    }

    let runner = TaskRunner::with_cleanup_delay(registry.clone(), config.task_cleanup_delay);
    let controller = Arc::new(PaginationController::with_page_size(api, runner, config.page_size));

    let canceller = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling search");
                controller.cancel();
            }
        }
    });

    let result = fetch_pages(&controller, request, pages).await;

    canceller.abort();
    channel.shutdown().await;
    drop(subscription);
    status_logger.abort();
    progress_logger.abort();

    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {
            tracing::info!("Search cancelled");
        }
        Err(e) => return Err(e.into()),
    }

    let snapshot = controller.snapshot();
    for item in &snapshot.results {
        let distance = item
            .distance
            .map(|d| format!("{d:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}\t{}", item.id, distance, item.path);
    }
    tracing::info!(
        fetched = snapshot.fetched,
        has_more = snapshot.has_more,
        "Search finished",
    );
    Ok(())
}

async fn fetch_pages(
    controller: &PaginationController,
    request: SearchRequest,
    pages: usize,
) -> Result<(), clipseek_search::error::SearchError> {
    controller.search(request).await?;
    for _ in 1..pages {
        if !controller.has_more() {
            break;
        }
        controller.load_more().await?;
    }
    Ok(())
}
