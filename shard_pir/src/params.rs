//! Scheme configuration and per-shard sizing.

use std::fmt;
use std::num::NonZeroUsize;

use log::info;
use serde::{Deserialize, Serialize};

use crate::engine::{PirEngine, ShardConfig};
use crate::error::PirError;

/// Largest plaintext modulus width the layout supports.
const MAX_PLAINTEXT_MODULUS_BITS: u32 = 60;

/// Deployment-wide PIR configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersConfig {
    /// Number of items in the whole database.
    pub num_items: u64,
    /// Width of every item in bytes.
    pub item_bytes: u64,
    /// Degree of the ring polynomial.
    pub poly_degree: u64,
    /// Bit width of the plaintext modulus.
    pub plaintext_modulus_bits: u32,
    /// Number of dimensions each shard is arranged in.
    pub recursion_depth: u32,
    /// Number of equal shards the database is split into.
    pub shard_count: NonZeroUsize,
}

impl ParametersConfig {
    /// Number of items held by every shard.
    pub fn per_shard_item_count(&self) -> u64 {
        self.num_items / self.shard_count.get() as u64
    }

    /// Bytes one plaintext can carry: `poly_degree * plaintext_modulus_bits / 8`.
    pub fn plaintext_bytes(&self) -> u64 {
        self.poly_degree * u64::from(self.plaintext_modulus_bits) / 8
    }

    /// Total database length in bytes.
    pub fn database_bytes(&self) -> u64 {
        self.num_items * self.item_bytes
    }

    /// Reject configurations that no engine could serve.
    pub fn validate(&self) -> Result<(), PirError> {
        if self.num_items == 0 {
            return Err(invalid("num_items must be at least 1"));
        }
        if self.item_bytes == 0 {
            return Err(invalid("item_bytes must be at least 1"));
        }
        let shards = self.shard_count.get() as u64;
        if self.num_items % shards != 0 {
            return Err(invalid(format!(
                "{} items cannot be split evenly into {} shards",
                self.num_items, shards
            )));
        }
        if self.poly_degree < 2 || !self.poly_degree.is_power_of_two() {
            return Err(invalid(format!(
                "poly_degree must be a power of two of at least 2, got {}",
                self.poly_degree
            )));
        }
        if !(2..=MAX_PLAINTEXT_MODULUS_BITS).contains(&self.plaintext_modulus_bits) {
            return Err(invalid(format!(
                "plaintext_modulus_bits must be in [2, {MAX_PLAINTEXT_MODULUS_BITS}], got {}",
                self.plaintext_modulus_bits
            )));
        }
        if self.recursion_depth == 0 {
            return Err(invalid("recursion_depth must be at least 1"));
        }
        if self.num_items.checked_mul(self.item_bytes).is_none() {
            return Err(invalid(format!(
                "{} items of {} bytes overflow the database size",
                self.num_items, self.item_bytes
            )));
        }
        if self
            .poly_degree
            .checked_mul(u64::from(self.plaintext_modulus_bits))
            .is_none()
        {
            return Err(invalid(format!(
                "poly_degree {} with {} plaintext modulus bits overflows the plaintext size",
                self.poly_degree, self.plaintext_modulus_bits
            )));
        }
        if self.item_bytes > self.plaintext_bytes() {
            return Err(invalid(format!(
                "item of {} bytes does not fit in a plaintext of {} bytes",
                self.item_bytes,
                self.plaintext_bytes()
            )));
        }
        Ok(())
    }

    fn shard_config(&self) -> ShardConfig {
        ShardConfig {
            num_items: self.per_shard_item_count(),
            item_bytes: self.item_bytes,
            poly_degree: self.poly_degree,
            plaintext_modulus_bits: self.plaintext_modulus_bits,
            recursion_depth: self.recursion_depth,
        }
    }
}

fn invalid(msg: impl Into<String>) -> PirError {
    PirError::InvalidParameters(msg.into())
}

/// Validated configuration bound to an engine parameter handle.
///
/// Built once per deployment and shared read-only, usually behind an `Arc`,
/// by every [`Client`](crate::Client) and [`Server`](crate::Server).
pub struct Parameters<E: PirEngine> {
    config: ParametersConfig,
    engine: E,
    handle: E::Params,
}

impl<E: PirEngine> Parameters<E> {
    /// Validate `config` and derive the engine parameters for one shard.
    pub fn new(engine: E, config: ParametersConfig) -> Result<Self, PirError> {
        config.validate()?;
        let handle = engine.init_params(&config.shard_config())?;
        info!(
            "Derived parameters for {} items of {} bytes in {} shards of {} items",
            config.num_items,
            config.item_bytes,
            config.shard_count,
            config.per_shard_item_count()
        );
        Ok(Self {
            config,
            engine,
            handle,
        })
    }

    pub fn config(&self) -> &ParametersConfig {
        &self.config
    }

    pub fn num_items(&self) -> u64 {
        self.config.num_items
    }

    pub fn item_bytes(&self) -> u64 {
        self.config.item_bytes
    }

    pub fn shard_count(&self) -> usize {
        self.config.shard_count.get()
    }

    pub fn per_shard_item_count(&self) -> u64 {
        self.config.per_shard_item_count()
    }

    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn handle(&self) -> &E::Params {
        &self.handle
    }

    /// Release this owner's hold on the parameters.
    ///
    /// The engine handle itself goes away with the last clone of the `Arc`
    /// shared with clients and servers.
    pub fn free(self) {}
}

impl<E: PirEngine> fmt::Debug for Parameters<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameters")
            .field("config", &self.config)
            .field("handle", &"<engine parameters>")
            .finish()
    }
}
