//! Error types shared by the AMF crates

use thiserror::Error;

/// Process-level errors: configuration and I/O.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is present but invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File or socket I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
