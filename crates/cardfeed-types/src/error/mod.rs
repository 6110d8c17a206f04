//! Typed error definitions for Cardfeed.
//!
//! Source failures and config failures are kept apart: the engine wraps both in
//! its own error. Both serialize with a `type` tag.

mod config;
mod source;

pub use config::ConfigError;
pub use source::SourceError;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_serialization() {
        let err = SourceError::Unreachable {
            source_id: "com.example.feed".to_string(),
            message: "connection refused".to_string(),
        };

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Unreachable"));
        assert!(json.contains("com.example.feed"));
        assert_eq!(serde_json::from_str::<SourceError>(&json).unwrap(), err);
    }

    #[test]
    fn test_error_display() {
        let err = SourceError::Timeout { source_id: "com.example.feed".to_string(), after_ms: 1500 };

        let msg = format!("{}", err);
        assert!(msg.contains("com.example.feed"));
        assert!(msg.contains("1500"));

        let err = ConfigError::WriteFailed {
            path: "/etc/cardfeed/config.json".to_string(),
            message: "read-only file system".to_string(),
        };
        assert!(err.to_string().contains("/etc/cardfeed/config.json"));
    }
}
