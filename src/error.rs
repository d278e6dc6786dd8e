use chrono::{DateTime, Utc};
use std::io;

/// Error type returned when a sink configuration cannot be resolved.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(
        "missing SLS credentials: pass access_key_id/access_key_secret or set SLS_ACCESS_KEY_ID and SLS_ACCESS_KEY_SECRET"
    )]
    MissingCredentials,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid sink url: {0}")]
    InvalidUrl(String),

    #[error("unknown or unsupported sink url scheme: {0}")]
    UnknownScheme(String),
}

/// Error raised while normalizing a single record. The record is dropped.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("timestamp out of range: {0}")]
    InvalidTimestamp(DateTime<Utc>),

    #[error("message formatting failed")]
    Format,
}

/// Error reported by an [`IngestionClient`](crate::client::IngestionClient)
/// when a batch could not be submitted.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("ingestion service rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// Error returned when constructing or installing a sink.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to spawn flush worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to build ingestion client: {0}")]
    Client(String),

    #[error("failed to install global subscriber: {0}")]
    Subscriber(String),
}
