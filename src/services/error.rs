use crate::services::writer::WriterError;
use thiserror::Error;

/// A unit of work can never fit an output file under the current limits.
///
/// Fatal: the run stops at the first occurrence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{unit} needs {count} new records but a plugin may hold at most {limit}")]
    NewRecordsExceeded {
        unit: String,
        count: usize,
        limit: usize,
    },

    #[error("{unit} depends on {count} plugins but a plugin may have at most {limit} masters")]
    OriginsExceeded {
        unit: String,
        count: usize,
        limit: usize,
    },
}

/// Errors that abort a patch run
#[derive(Error, Debug)]
pub enum PatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error("Invalid path rule {pattern:?} for race {race}: {source}")]
    InvalidPathRule {
        race: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid non-wearable pattern {pattern:?}: {source}")]
    InvalidNonWearablePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Race {0} not found in the load order")]
    RaceNotFound(String),

    #[error("Patch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
