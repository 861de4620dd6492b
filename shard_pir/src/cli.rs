//! Command-line argument parsing.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;
use shard_pir::ParametersConfig;

/// Privately retrieve one item from a sharded database, in process.
///
/// Uses the transparent engine, which performs no encryption.
#[derive(Parser, Debug)]
pub(crate) struct Args {
    /// Database file of `num_items * item_bytes` bytes. If not specified, reads from stdin.
    #[arg(short, long)]
    pub db: Option<PathBuf>,

    /// Index of the item to retrieve.
    #[arg(short, long)]
    pub index: u64,

    /// Output file for the recovered item. If not specified, writes to stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Directory to write the serialized keys, query and answers into.
    #[arg(short, long)]
    pub messages: Option<PathBuf>,

    /// Give up on shards that have not started after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Client identity attached to keys and queries.
    #[arg(long, default_value_t = 0)]
    pub client_id: u64,

    #[arg(long, default_value_t = 4096)]
    pub num_items: u64,

    #[arg(long, default_value_t = 288)]
    pub item_bytes: u64,

    #[arg(long, default_value_t = 2048)]
    pub poly_degree: u64,

    #[arg(long, default_value_t = 12)]
    pub plaintext_modulus_bits: u32,

    #[arg(long, default_value_t = 2)]
    pub recursion_depth: u32,

    /// Number of shards answered in parallel.
    #[arg(short, long, default_value_t = NonZeroUsize::MIN)]
    pub shards: NonZeroUsize,
}

impl Args {
    pub fn parameters(&self) -> ParametersConfig {
        ParametersConfig {
            num_items: self.num_items,
            item_bytes: self.item_bytes,
            poly_degree: self.poly_degree,
            plaintext_modulus_bits: self.plaintext_modulus_bits,
            recursion_depth: self.recursion_depth,
            shard_count: self.shards,
        }
    }
}
