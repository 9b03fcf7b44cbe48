use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("SKYFORGE_CONFIG points to a missing file: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0} must be greater than zero")]
    InvalidValue(&'static str),

    #[error(
        "No operator secret configured. Set SKYFORGE_SECRET_KEY or pass --secret-key"
    )]
    MissingSecret,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
