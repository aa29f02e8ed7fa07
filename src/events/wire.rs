//! Server-sent-event framing.

/// Frame one event: `event: <name>\ndata: <payload>\n\n`.
///
/// `payload` must be a single line (compact JSON is).
pub fn format_event(event: &str, payload: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        insta::assert_debug_snapshot!(
            format_event("job_update", r#"{"jobId":"j1"}"#),
            @r#""event: job_update\ndata: {\"jobId\":\"j1\"}\n\n""#
        );
        assert_eq!(format_event("x", "{}"), "event: x\ndata: {}\n\n");
    }
}
