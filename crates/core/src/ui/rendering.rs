//! Formatting helpers for the main view.

use crate::workflow::WorkflowState;

/// Human-readable size of base64 data, as decoded bytes.
pub fn format_encoded_size(encoded_len: usize) -> String {
    let bytes = encoded_len / 4 * 3;
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// First block of a UUID, enough to tell screenshots apart.
pub fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

/// One-line status for the footer.
pub fn status_line(state: &WorkflowState, screenshots: usize, protected: bool) -> String {
    let mode = match state {
        WorkflowState::Idle => match screenshots {
            0 => "Ready".to_string(),
            1 => "1 screenshot pending".to_string(),
            n => format!("{n} screenshots pending"),
        },
        WorkflowState::Capturing => "Capturing...".to_string(),
        WorkflowState::Analyzing => "Analyzing...".to_string(),
        WorkflowState::ShowingResult(_) => "Result ready".to_string(),
        WorkflowState::ShowingError(_) => "Error".to_string(),
    };
    let shield = if protected { "protected" } else { "VISIBLE" };
    format!("{mode} | {shield}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_decoded_bytes() {
        assert_eq!(format_encoded_size(8), "6 B");
        assert_eq!(format_encoded_size(4096), "3 KB");
        assert_eq!(format_encoded_size(4 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn short_id_takes_first_group() {
        assert_eq!(short_id("3f2a9c1e-0000-4000-8000-000000000000"), "3f2a9c1e");
        assert_eq!(short_id("plain"), "plain");
    }

    #[test]
    fn status_mentions_protection() {
        assert_eq!(status_line(&WorkflowState::Idle, 2, true), "2 screenshots pending | protected");
        assert_eq!(status_line(&WorkflowState::Capturing, 0, false), "Capturing... | VISIBLE");
    }
}
