//! Client side: key generation, index translation, queries and recovery.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::engine::PirEngine;
use crate::error::PirError;
use crate::messages::{Answer, GaloisKeys, Query, check_payload_length};
use crate::params::Parameters;

/// Where a logical item lives, in the coordinates the server and engine use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemLocation {
    /// Shard holding the item.
    pub shard: usize,
    /// Engine index to pass to [`Client::gen_query`].
    pub query_index: u64,
    /// Offset to pass to [`Client::recover`].
    pub offset: u64,
}

/// A PIR client bound to one set of parameters and one identity.
pub struct Client<E: PirEngine> {
    params: Arc<Parameters<E>>,
    handle: E::Client,
    client_id: u64,
}

impl<E: PirEngine> Client<E> {
    pub fn new(params: Arc<Parameters<E>>, client_id: u64) -> Result<Self, PirError> {
        let handle = params.engine().init_client(params.handle(), client_id)?;
        Ok(Self {
            params,
            handle,
            client_id,
        })
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn params(&self) -> &Arc<Parameters<E>> {
        &self.params
    }

    /// Produce the evaluation keys a server needs to answer this client.
    pub fn gen_galois_keys(&self) -> Result<GaloisKeys, PirError> {
        let payload = self.params.engine().gen_galois_keys(&self.handle)?;
        Ok(GaloisKeys::new(self.client_id, payload))
    }

    /// Shard holding item `elem_index`.
    pub fn shard_index(&self, elem_index: u64) -> Result<usize, PirError> {
        self.check_elem_index(elem_index)?;
        Ok((elem_index / self.params.per_shard_item_count()) as usize)
    }

    /// Engine index of the object holding item `elem_index` inside its shard.
    pub fn query_index(&self, elem_index: u64) -> Result<u64, PirError> {
        let local = self.local_index(elem_index)?;
        Ok(self.params.engine().index_of(&self.handle, local))
    }

    /// Position of item `elem_index` inside the engine object that holds it.
    pub fn offset_in_shard(&self, elem_index: u64) -> Result<u64, PirError> {
        let local = self.local_index(elem_index)?;
        Ok(self.params.engine().offset_of(&self.handle, local))
    }

    /// All coordinates needed to retrieve item `elem_index`.
    pub fn locate(&self, elem_index: u64) -> Result<ItemLocation, PirError> {
        let local = self.local_index(elem_index)?;
        let engine = self.params.engine();
        Ok(ItemLocation {
            shard: (elem_index / self.params.per_shard_item_count()) as usize,
            query_index: engine.index_of(&self.handle, local),
            offset: engine.offset_of(&self.handle, local),
        })
    }

    /// Encrypt a request for the engine object at `index` within a shard.
    ///
    /// The same query is sent to every shard. Indices the engine does not
    /// accept come back as an engine range error.
    pub fn gen_query(&self, index: u64) -> Result<Query, PirError> {
        let ciphertexts = self.params.engine().gen_query(&self.handle, index)?;
        debug!(
            "Client {} generated a query of {} ciphertexts ({} bytes)",
            self.client_id,
            ciphertexts.count,
            ciphertexts.bytes.len()
        );
        Ok(Query::new(self.client_id, ciphertexts))
    }

    /// Decrypt `answer` and return the `item_bytes` bytes at `offset`.
    ///
    /// The bytes are the requested item only when `answer` came from the
    /// shard that owns it.
    pub fn recover(&self, answer: Answer, offset: u64) -> Result<Vec<u8>, PirError> {
        check_payload_length(&answer)?;
        let plaintext = self.params.engine().recover(&self.handle, answer.ciphertexts())?;
        let item_bytes = self.params.item_bytes();
        let limit = plaintext.len() as u64 / item_bytes;
        if offset >= limit {
            return Err(PirError::OutOfRange {
                what: "offset",
                index: offset,
                limit,
            });
        }
        let start = (offset * item_bytes) as usize;
        Ok(plaintext[start..start + item_bytes as usize].to_vec())
    }

    /// Release the client and its engine handle.
    pub fn free(self) {}

    fn check_elem_index(&self, elem_index: u64) -> Result<(), PirError> {
        let limit = self.params.num_items();
        if elem_index >= limit {
            return Err(PirError::OutOfRange {
                what: "item index",
                index: elem_index,
                limit,
            });
        }
        Ok(())
    }

    fn local_index(&self, elem_index: u64) -> Result<u64, PirError> {
        self.check_elem_index(elem_index)?;
        Ok(elem_index % self.params.per_shard_item_count())
    }
}

impl<E: PirEngine> fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("params", &self.params)
            .finish()
    }
}
