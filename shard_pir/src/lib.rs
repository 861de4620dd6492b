//! Sharded private information retrieval over a homomorphic-encryption engine.
//!
//! A client fetches one fixed-width item from a server-held array without
//! revealing which one. The cryptography lives behind the [`PirEngine`]
//! boundary; this crate translates item indices into engine coordinates,
//! splits the database into equal shards, fans one query out to every shard
//! concurrently and recovers the item from the owning shard's answer.
//!
//! ```text
//! Client::gen_galois_keys ──► Server::set_galois_keys   (every shard)
//!                             Server::setup_database    (one slice per shard)
//! Client::gen_query ────────► Server::gen_answer ──► [Answer; shard_count]
//! Client::recover(answers[shard], offset) ──► item bytes
//! ```
//!
//! # Wire Format
//!
//! Messages crossing the client/server boundary use a versioned binary format:
//!
//! ```text
//! [MAGIC: 4 bytes][VERSION: 4 bytes big-endian u32][PAYLOAD: msgpack bytes]
//! ```
//!
//! - **MAGIC**: Message type identifier ("PIRK" for Galois keys, "PIRQ" for
//!   queries, "PIRA" for answers)
//! - **VERSION**: Protocol version as big-endian u32 (fixed 4 bytes)
//! - **PAYLOAD**: MessagePack-serialized record carrying the engine bytes,
//!   their declared length and the per-message metadata
//!
//! Deserialization only accepts an exact version match and rejects any record
//! whose declared payload length disagrees with the payload it carries.

mod client;
mod database;
mod engine;
mod error;
mod messages;
mod params;
mod server;
pub mod transparent;
mod wire;

pub use client::{Client, ItemLocation};
pub use database::Database;
pub use engine::{Ciphertexts, CiphertextsRef, EngineError, PirEngine, ShardConfig};
pub use error::{DeserializeError, PeekError, PirError, SerializeError};
pub use messages::{Answer, GaloisKeys, Message, Query};
pub use params::{Parameters, ParametersConfig};
pub use server::{Cancellation, Server};
pub use wire::{deserialize_message, peek_message_version, serialize_message};

/// Current protocol version for all messages.
pub const MESSAGE_VERSION: u32 = 1;

/// Magic bytes identifying serialized Galois keys: "PIRK" in ASCII.
pub const GALOIS_KEYS_MAGIC: [u8; 4] = *b"PIRK";

/// Magic bytes identifying a serialized query: "PIRQ" in ASCII.
pub const QUERY_MAGIC: [u8; 4] = *b"PIRQ";

/// Magic bytes identifying a serialized answer: "PIRA" in ASCII.
pub const ANSWER_MAGIC: [u8; 4] = *b"PIRA";

/// Header size: 4 bytes magic + 4 bytes version.
pub const HEADER_SIZE: usize = 8;
