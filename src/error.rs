//! Error types for gcfocus operations

use thiserror::Error;

/// Result type alias using gcfocus' Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for command line parsing failures
pub const EXIT_USAGE: u8 = 1;
/// Exit code for missing or invalid configuration
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for camera, watch or I/O subsystem failures
pub const EXIT_SUBSYSTEM: u8 = 3;
/// Exit code for a log rotation that could not be followed
pub const EXIT_ROTATION: u8 = 4;

/// Main error type for gcfocus operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value or unreadable configuration file
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required option was not given on the command line, config file or environment
    #[error("{0} must be given. See gcfocus --help")]
    MissingOption(&'static str),

    /// Camera could not be opened or rejected a control write
    #[error("Camera error: {0}")]
    Camera(String),

    /// Camera does not accept manual focus
    #[error("Unable to set camera {0} to manual focus mode. Is it supported?")]
    FocusUnsupported(String),

    /// Change notification subsystem failure
    #[error("Log file watch failed: {0}")]
    Watch(String),

    /// Log file rotated while reopening is disabled
    #[error("Log file {0} was rotated or deleted")]
    Rotation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code reported by the binary for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) | Error::MissingOption(_) => EXIT_CONFIG,
            Error::Camera(_) | Error::FocusUnsupported(_) | Error::Watch(_) | Error::Io(_) => {
                EXIT_SUBSYSTEM
            }
            Error::Rotation(_) => EXIT_ROTATION,
        }
    }
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::Watch(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_category() {
        assert_eq!(Error::MissingOption("Camera device path").exit_code(), EXIT_CONFIG);
        assert_eq!(Error::Watch("gone".into()).exit_code(), EXIT_SUBSYSTEM);
        assert_eq!(Error::Rotation("serial.log".into()).exit_code(), EXIT_ROTATION);
        assert_ne!(EXIT_USAGE, EXIT_CONFIG);
    }

    #[test]
    fn missing_option_carries_usage_hint() {
        let msg = Error::MissingOption("Camera device path").to_string();
        assert_eq!(msg, "Camera device path must be given. See gcfocus --help");
    }
}
