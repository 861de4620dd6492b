//! Error types for orchestration and wire operations.

use crate::engine::EngineError;

/// Error type for client and server operations.
#[derive(Debug, thiserror::Error)]
pub enum PirError {
    /// The configuration cannot be used.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    /// An index or offset lies outside its valid range.
    #[error("{what} {index} out of range [0, {limit})")]
    OutOfRange {
        what: &'static str,
        index: u64,
        limit: u64,
    },
    /// Database length does not match `num_items * item_bytes`.
    #[error("database is {actual} bytes, expected {expected}")]
    DatabaseSize { expected: u64, actual: u64 },
    /// A message's declared payload length disagrees with its payload.
    #[error("message declares {declared} payload bytes but carries {actual}")]
    MessageLength { declared: u64, actual: u64 },
    /// A query arrived from a client whose keys were never installed.
    #[error("no galois keys installed for client {0}")]
    KeysNotInstalled(u64),
    /// A query arrived before the database was set up.
    #[error("database has not been set up")]
    DatabaseNotReady,
    /// Answer generation was cancelled before every shard ran.
    #[error("answer generation cancelled after {completed} of {total} shards")]
    Cancelled { completed: usize, total: usize },
    /// Answer generation ran past its deadline before every shard ran.
    #[error("answer generation exceeded its deadline after {completed} of {total} shards")]
    DeadlineExceeded { completed: usize, total: usize },
    /// The engine failed while working on one shard.
    #[error("shard {shard} failed: {source}")]
    Shard {
        shard: usize,
        #[source]
        source: EngineError,
    },
    /// The engine failed outside any shard.
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),
}

impl PirError {
    /// Engine error behind this failure, if any.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            PirError::Shard { source, .. } => Some(source),
            PirError::Engine(source) => Some(source),
            _ => None,
        }
    }

    /// Whether this is a range error, raised here or by the engine.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, PirError::OutOfRange { .. })
            || matches!(self.engine_error(), Some(EngineError::OutOfRange { .. }))
    }
}

/// Error type for peeking version from serialized data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeekError {
    /// Data is too short to contain a valid header.
    #[error("data too short to contain valid header")]
    TooShort,
    /// Magic bytes do not match expected value.
    #[error("invalid magic bytes")]
    InvalidMagic,
    /// Version field is corrupt or unreadable.
    #[error("version field is corrupt or unreadable")]
    InvalidVersion,
}

/// Error type for deserialization operations.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    /// Error peeking the version header.
    #[error("header validation failed: {0}")]
    Peek(#[from] PeekError),
    /// Version is not supported.
    #[error("unsupported version {got}, expected {expected}")]
    UnsupportedVersion { got: u32, expected: u32 },
    /// Error deserializing the payload.
    #[error("payload deserialization failed")]
    Payload(#[source] rmp_serde::decode::Error),
    /// Declared payload length disagrees with the payload carried.
    #[error("declared payload length {declared} does not match actual length {actual}")]
    LengthMismatch { declared: u64, actual: u64 },
}

/// Error type for serialization operations.
#[derive(Debug, thiserror::Error)]
#[error("payload serialization failed")]
pub struct SerializeError(#[source] pub(crate) rmp_serde::encode::Error);
