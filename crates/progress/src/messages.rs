//! Progress frame parser.
//!
//! The server pushes one JSON object per text frame, matching the
//! [`ProgressEvent`] schema. Anything else is rejected here and dropped
//! by the caller.

use clipseek_core::progress::ProgressEvent;

/// Parse a progress WebSocket text frame into a typed event.
///
/// Returns `Err` for malformed JSON, unknown statuses or missing
/// required fields. Callers should log and continue.
pub fn parse_message(text: &str) -> Result<ProgressEvent, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use clipseek_core::progress::TaskStatus;

    use super::*;

    #[test]
    fn parse_in_progress_message() {
        let json = r#"{"task_id":"abc","status":"in_progress","progress":40,"message":"Scoring","current_step":"score","current_step_number":1,"total_steps":2,"timestamp":1.0}"#;
        let event = parse_message(json).unwrap();
        assert_eq!(event.task_id, "abc");
        assert_eq!(event.status, TaskStatus::InProgress);
        assert_eq!(event.progress, 40.0);
        assert_eq!(event.total_steps, Some(2));
    }

    #[test]
    fn parse_completed_with_data() {
        let json = r#"{"task_id":"abc","status":"completed","progress":100,"data":["i1","i2"]}"#;
        let event = parse_message(json).unwrap();
        assert!(event.is_terminal());
        assert_eq!(event.data, Some(serde_json::json!(["i1", "i2"])));
    }

    #[test]
    fn parse_terminal_frame_with_null_numbers() {
        let json = r#"{"task_id":"t","status":"completed","progress":null,"timestamp":null,"data":[{"id":"x"}]}"#;
        let event = parse_message(json).unwrap();
        assert!(event.is_terminal());
        assert_eq!(event.progress, 0.0);
        assert_eq!(event.data, Some(serde_json::json!([{"id": "x"}])));
    }

    #[test]
    fn parse_failed_message() {
        let json = r#"{"task_id":"abc","status":"failed","message":"Search failed"}"#;
        let event = parse_message(json).unwrap();
        assert_eq!(event.failure_message().as_deref(), Some("Search failed"));
    }

    #[test]
    fn parse_missing_task_id_returns_error() {
        assert!(parse_message(r#"{"status":"pending"}"#).is_err());
    }

    #[test]
    fn parse_greeting_text_returns_error() {
        assert!(parse_message("hello you are #0").is_err());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_message("{not json").is_err());
    }
}
