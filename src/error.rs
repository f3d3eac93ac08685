//! Error types for Beacon voice

use thiserror::Error;

/// Result type alias for Beacon voice operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Beacon voice
///
/// The turn-taking core itself never fails; these cover configuration
/// loading and the controller channel.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The controller task has stopped and no longer accepts commands
    #[error("voice controller closed")]
    ControllerClosed,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML rendering error
    #[error("toml render error: {0}")]
    TomlRender(#[from] toml::ser::Error),
}
