use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the crash audit crates.
#[derive(Error, Debug)]
pub enum AuditError {
    /// A log file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input path given on the command line does not exist.
    #[error("Input path not found: {0}")]
    PathNotFound(PathBuf),

    /// A single log line was not valid UTF-8.
    #[error("Undecodable line {line} in {path}")]
    LineDecode { path: PathBuf, line: u64 },

    /// A window bound did not match any accepted timestamp layout.
    #[error("Invalid timestamp format: {0}")]
    InvalidTimestamp(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A string is not a 36-character crash identifier.
    #[error("Invalid crash id: {0}")]
    InvalidCrashId(String),

    /// No crash was received inside the window, so ratios are undefined.
    #[error("No crashes received in window")]
    NoDataInWindow,

    /// The crash queue failed to produce or acknowledge an item.
    #[error("Queue error: {0}")]
    Queue(String),

    /// The object store failed to answer an existence check.
    #[error("Object store error: {0}")]
    Store(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the audit crates.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = AuditError::FileRead {
            path: PathBuf::from("/var/log/antenna.log"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/var/log/antenna.log"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_line_decode() {
        let err = AuditError::LineDecode {
            path: PathBuf::from("a.log"),
            line: 12,
        };
        assert_eq!(err.to_string(), "Undecodable line 12 in a.log");
    }

    #[test]
    fn test_error_display_invalid_timestamp() {
        let err = AuditError::InvalidTimestamp("yesterday".to_string());
        assert_eq!(err.to_string(), "Invalid timestamp format: yesterday");
    }

    #[test]
    fn test_error_display_no_data() {
        assert_eq!(
            AuditError::NoDataInWindow.to_string(),
            "No crashes received in window"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = AuditError::Config("start is after end".to_string());
        assert_eq!(err.to_string(), "Configuration error: start is after end");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AuditError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }
}
