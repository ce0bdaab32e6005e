//! Request-shape validation shared by routes and the session manager,
//! grounded on the original `validation.py` checks (§4.1, §4.4).

use crate::error::CognitionError;

const MAX_WORKSPACE_PATH_LEN: usize = 4096;
const MAX_TITLE_LEN: usize = 256;
const MAX_MESSAGE_CONTENT_BYTES: usize = 1_000_000;

/// `CreateSession.workspace_path` must be a non-empty absolute path within
/// the configured length budget.
pub fn validate_workspace_path(path: &str) -> Result<(), CognitionError> {
    if path.is_empty() {
        return Err(CognitionError::Conflict(
            "workspace_path must not be empty".into(),
        ));
    }
    if !path.starts_with('/') {
        return Err(CognitionError::Conflict(
            "workspace_path must be absolute".into(),
        ));
    }
    if path.len() > MAX_WORKSPACE_PATH_LEN {
        return Err(CognitionError::Conflict(format!(
            "workspace_path exceeds {MAX_WORKSPACE_PATH_LEN} bytes"
        )));
    }
    Ok(())
}

/// Optional `title` field on create/update — bounded length, no control
/// characters.
pub fn validate_title(title: &str) -> Result<(), CognitionError> {
    if title.len() > MAX_TITLE_LEN {
        return Err(CognitionError::Conflict(format!(
            "title exceeds {MAX_TITLE_LEN} bytes"
        )));
    }
    if title.chars().any(|c| c.is_control() && c != '\t') {
        return Err(CognitionError::Conflict(
            "title must not contain control characters".into(),
        ));
    }
    Ok(())
}

/// Message content must be present and within the size cap a single turn
/// may submit (§4.4 `CreateMessage`).
pub fn validate_message_content(content: &str) -> Result<(), CognitionError> {
    if content.trim().is_empty() {
        return Err(CognitionError::Conflict("content must not be empty".into()));
    }
    if content.len() > MAX_MESSAGE_CONTENT_BYTES {
        return Err(CognitionError::Conflict(format!(
            "content exceeds {MAX_MESSAGE_CONTENT_BYTES} bytes"
        )));
    }
    Ok(())
}

/// `temperature` is only meaningful in `[0.0, 2.0]` (§3 `SessionConfig`).
pub fn validate_temperature(temperature: f32) -> Result<(), CognitionError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(CognitionError::Conflict(
            "temperature must be between 0.0 and 2.0".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_workspace_path() {
        assert!(validate_workspace_path("relative/path").is_err());
    }

    #[test]
    fn accepts_absolute_workspace_path() {
        assert!(validate_workspace_path("/home/user/project").is_ok());
    }

    #[test]
    fn rejects_empty_message_content() {
        assert!(validate_message_content("   ").is_err());
    }

    #[test]
    fn rejects_oversized_title() {
        let title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(validate_title(&title).is_err());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        assert!(validate_temperature(2.5).is_err());
        assert!(validate_temperature(-0.1).is_err());
        assert!(validate_temperature(1.0).is_ok());
    }
}
