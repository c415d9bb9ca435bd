//! Error types for the social scheduler

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedError>;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

impl SchedError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SchedError::Validation(_) => 3,
            SchedError::Config(_) => 2,
            SchedError::Storage(_) => 1,
        }
    }
}

/// Malformed post fields. Surfaced to the caller, never persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Content cannot be empty")]
    EmptyContent,

    #[error("Content is {len} characters, maximum is {max}")]
    ContentTooLong { len: usize, max: usize },

    #[error("Unrecognized platform: {0}")]
    UnknownPlatform(String),

    #[error("At least one platform is required")]
    NoPlatforms,

    #[error("Could not parse schedule time: {0}")]
    InvalidSchedule(String),

    #[error("Media file not found: {0}")]
    MediaNotFound(String),

    #[error("No scheduled post with id {0}")]
    PostNotFound(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("No publisher configured. Set [publisher] command in {0}")]
    NoPublisher(String),
}
