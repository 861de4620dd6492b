//! An engine with the SealPIR data layout and no encryption.
//!
//! Items are packed into plaintexts of `poly_degree * plaintext_modulus_bits / 8`
//! bytes, plaintexts are arranged in a hypercube of `recursion_depth`
//! dimensions, and a query is one selection vector per dimension. Queries
//! and answers travel in the clear, so this engine gives **no privacy at
//! all**. It exists to drive the orchestration layer end to end in tests and
//! tooling without linking a native homomorphic-encryption library.

use std::collections::HashMap;

use rand::Rng;

use crate::engine::{Ciphertexts, CiphertextsRef, EngineError, PirEngine, ShardConfig};

/// Length of the random per-client secret.
const SECRET_BYTES: usize = 32;

/// Galois keys are the client id (little endian) followed by the secret.
const KEY_BYTES: usize = 8 + SECRET_BYTES;

/// Engine implementing [`PirEngine`] without any cryptography.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransparentEngine;

/// How one shard's items map onto plaintexts and query dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    num_items: u64,
    item_bytes: u64,
    plaintext_bytes: u64,
    elements_per_plaintext: u64,
    plaintext_count: u64,
    dimension: u64,
    depth: u32,
}

impl Layout {
    pub fn new(config: &ShardConfig) -> Result<Self, EngineError> {
        if config.item_bytes == 0 {
            return Err(EngineError::Infeasible("items must be at least one byte".into()));
        }
        if config.recursion_depth == 0 {
            return Err(EngineError::Infeasible("recursion depth must be at least 1".into()));
        }
        let plaintext_bytes = config
            .poly_degree
            .checked_mul(u64::from(config.plaintext_modulus_bits))
            .ok_or_else(|| EngineError::Infeasible("plaintext size overflows u64".into()))?
            / 8;
        let elements_per_plaintext = plaintext_bytes / config.item_bytes;
        if elements_per_plaintext == 0 {
            return Err(EngineError::Infeasible(format!(
                "item of {} bytes exceeds plaintext of {} bytes",
                config.item_bytes, plaintext_bytes
            )));
        }
        if config.num_items.checked_mul(config.item_bytes).is_none() {
            return Err(EngineError::Infeasible("shard size overflows u64".into()));
        }
        let plaintext_count = config.num_items.div_ceil(elements_per_plaintext);
        let dimension = dimension_size(plaintext_count, config.recursion_depth);
        if dimension > config.poly_degree {
            return Err(EngineError::Infeasible(format!(
                "dimension of {dimension} exceeds the {} slots of a query ciphertext",
                config.poly_degree
            )));
        }
        Ok(Self {
            num_items: config.num_items,
            item_bytes: config.item_bytes,
            plaintext_bytes,
            elements_per_plaintext,
            plaintext_count,
            dimension,
            depth: config.recursion_depth,
        })
    }

    pub fn plaintext_bytes(&self) -> u64 {
        self.plaintext_bytes
    }

    pub fn elements_per_plaintext(&self) -> u64 {
        self.elements_per_plaintext
    }

    pub fn plaintext_count(&self) -> u64 {
        self.plaintext_count
    }

    /// Size of every query dimension.
    pub fn dimension(&self) -> u64 {
        self.dimension
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Coordinates of plaintext `index`, most significant dimension first.
    fn coordinates(&self, index: u64) -> Vec<u64> {
        let mut coords = vec![0; self.depth as usize];
        let mut rest = index;
        for coord in coords.iter_mut().rev() {
            *coord = rest % self.dimension;
            rest /= self.dimension;
        }
        coords
    }

    /// Inverse of [`coordinates`](Self::coordinates); `None` if the index overflows.
    fn combine(&self, coords: &[u64]) -> Option<u64> {
        coords.iter().try_fold(0u64, |acc, &c| {
            acc.checked_mul(self.dimension)?.checked_add(c)
        })
    }
}

/// Smallest `side` with `side^depth >= count`.
fn dimension_size(count: u64, depth: u32) -> u64 {
    let mut side = ((count as f64).powf(1.0 / f64::from(depth)).floor() as u64).max(1);
    while side > 1 && (side - 1).checked_pow(depth).is_none_or(|p| p >= count) {
        side -= 1;
    }
    while side.checked_pow(depth).is_some_and(|p| p < count) {
        side += 1;
    }
    side
}

#[derive(Debug)]
pub struct TransparentParams {
    layout: Layout,
}

impl TransparentParams {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}

pub struct TransparentClient {
    layout: Layout,
    client_id: u64,
    secret: [u8; SECRET_BYTES],
}

pub struct TransparentServer {
    layout: Layout,
    plaintexts: Option<Vec<u8>>,
    galois_keys: HashMap<u64, Vec<u8>>,
}

fn malformed(what: &'static str, reason: impl Into<String>) -> EngineError {
    EngineError::Malformed {
        what,
        reason: reason.into(),
    }
}

impl PirEngine for TransparentEngine {
    type Params = TransparentParams;
    type Client = TransparentClient;
    type Server = TransparentServer;

    fn init_params(&self, config: &ShardConfig) -> Result<Self::Params, EngineError> {
        Ok(TransparentParams {
            layout: Layout::new(config)?,
        })
    }

    fn init_client(
        &self,
        params: &Self::Params,
        client_id: u64,
    ) -> Result<Self::Client, EngineError> {
        Ok(TransparentClient {
            layout: params.layout.clone(),
            client_id,
            secret: rand::rng().random(),
        })
    }

    fn init_server(&self, params: &Self::Params) -> Result<Self::Server, EngineError> {
        Ok(TransparentServer {
            layout: params.layout.clone(),
            plaintexts: None,
            galois_keys: HashMap::new(),
        })
    }

    fn gen_galois_keys(&self, client: &Self::Client) -> Result<Vec<u8>, EngineError> {
        let mut keys = Vec::with_capacity(KEY_BYTES);
        keys.extend_from_slice(&client.client_id.to_le_bytes());
        keys.extend_from_slice(&client.secret);
        Ok(keys)
    }

    fn set_galois_keys(
        &self,
        server: &mut Self::Server,
        client_id: u64,
        keys: &[u8],
    ) -> Result<(), EngineError> {
        if keys.len() != KEY_BYTES {
            return Err(malformed(
                "galois keys",
                format!("expected {KEY_BYTES} bytes, got {}", keys.len()),
            ));
        }
        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&keys[..8]);
        let owner = u64::from_le_bytes(id_bytes);
        if owner != client_id {
            return Err(malformed(
                "galois keys",
                format!("keys belong to client {owner}, not {client_id}"),
            ));
        }
        server.galois_keys.insert(client_id, keys.to_vec());
        Ok(())
    }

    fn setup_database(&self, server: &mut Self::Server, items: &[u8]) -> Result<(), EngineError> {
        let layout = &server.layout;
        let expected = layout.num_items * layout.item_bytes;
        if items.len() as u64 != expected {
            return Err(malformed(
                "database",
                format!("expected {expected} bytes, got {}", items.len()),
            ));
        }
        let plaintext_bytes = layout.plaintext_bytes as usize;
        let packed_bytes = (layout.elements_per_plaintext * layout.item_bytes) as usize;
        let mut plaintexts = vec![0u8; layout.plaintext_count as usize * plaintext_bytes];
        for (src, dst) in items
            .chunks(packed_bytes)
            .zip(plaintexts.chunks_mut(plaintext_bytes))
        {
            dst[..src.len()].copy_from_slice(src);
        }
        server.plaintexts = Some(plaintexts);
        Ok(())
    }

    fn index_of(&self, client: &Self::Client, local_index: u64) -> u64 {
        local_index / client.layout.elements_per_plaintext
    }

    fn offset_of(&self, client: &Self::Client, local_index: u64) -> u64 {
        local_index % client.layout.elements_per_plaintext
    }

    fn gen_query(&self, client: &Self::Client, index: u64) -> Result<Ciphertexts, EngineError> {
        let layout = &client.layout;
        if index >= layout.plaintext_count {
            return Err(EngineError::OutOfRange {
                index,
                limit: layout.plaintext_count,
            });
        }
        let dimension = layout.dimension as usize;
        let mut bytes = vec![0u8; dimension * layout.depth as usize];
        for (selector, coord) in bytes.chunks_mut(dimension).zip(layout.coordinates(index)) {
            selector[coord as usize] = 1;
        }
        Ok(Ciphertexts {
            bytes,
            ciphertext_size: layout.dimension,
            count: u64::from(layout.depth),
        })
    }

    fn gen_answer(
        &self,
        server: &Self::Server,
        query: CiphertextsRef<'_>,
        client_id: u64,
    ) -> Result<Ciphertexts, EngineError> {
        if !server.galois_keys.contains_key(&client_id) {
            return Err(EngineError::MissingKeys(client_id));
        }
        let plaintexts = server.plaintexts.as_ref().ok_or(EngineError::NoDatabase)?;
        let layout = &server.layout;
        if query.count != u64::from(layout.depth)
            || query.ciphertext_size != layout.dimension
            || query.bytes.len() as u64 != layout.dimension * u64::from(layout.depth)
        {
            return Err(malformed(
                "query",
                format!(
                    "expected {} selectors of {} bytes, got {} of {} ({} bytes)",
                    layout.depth,
                    layout.dimension,
                    query.count,
                    query.ciphertext_size,
                    query.bytes.len()
                ),
            ));
        }

        let mut coords = Vec::with_capacity(layout.depth as usize);
        for selector in query.bytes.chunks(layout.dimension as usize) {
            let mut hot = selector.iter().enumerate().filter(|(_, b)| **b != 0);
            match (hot.next(), hot.next()) {
                (Some((pos, &1)), None) => coords.push(pos as u64),
                _ => {
                    return Err(malformed(
                        "query",
                        "selection vector must hold exactly one 1",
                    ));
                }
            }
        }

        let index = layout
            .combine(&coords)
            .ok_or_else(|| malformed("query", "selected cell lies outside the hypercube"))?;
        let plaintext_bytes = layout.plaintext_bytes as usize;
        // The hypercube can be larger than the plaintext count; padding cells are zero.
        let bytes = if index < layout.plaintext_count {
            let start = index as usize * plaintext_bytes;
            plaintexts[start..start + plaintext_bytes].to_vec()
        } else {
            vec![0u8; plaintext_bytes]
        };
        Ok(Ciphertexts {
            bytes,
            ciphertext_size: layout.plaintext_bytes,
            count: 1,
        })
    }

    fn recover(
        &self,
        client: &Self::Client,
        answer: CiphertextsRef<'_>,
    ) -> Result<Vec<u8>, EngineError> {
        let plaintext_bytes = client.layout.plaintext_bytes;
        if answer.count != 1
            || answer.ciphertext_size != plaintext_bytes
            || answer.bytes.len() as u64 != plaintext_bytes
        {
            return Err(malformed(
                "answer",
                format!(
                    "expected one plaintext of {plaintext_bytes} bytes, got {} of {} ({} bytes)",
                    answer.count,
                    answer.ciphertext_size,
                    answer.bytes.len()
                ),
            ));
        }
        Ok(answer.bytes.to_vec())
    }
}
