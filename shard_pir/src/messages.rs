//! Protocol messages exchanged between client and server.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::engine::{Ciphertexts, CiphertextsRef};
use crate::error::{DeserializeError, PirError, SerializeError};
use crate::wire::{deserialize_message, serialize_message};
use crate::{ANSWER_MAGIC, GALOIS_KEYS_MAGIC, QUERY_MAGIC};

/// A record that crosses the client/server boundary.
///
/// Every message carries an engine payload and the length it was produced
/// with; [`deserialize_message`] refuses records where the two disagree.
pub trait Message: Serialize + DeserializeOwned {
    /// Magic bytes identifying this message type on the wire.
    const MAGIC: [u8; 4];

    fn payload(&self) -> &[u8];

    /// Payload length declared by the producer.
    fn payload_length(&self) -> u64;

    /// Serialize with magic bytes and version header.
    fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        serialize_message(self)
    }

    /// Deserialize, validating header and declared payload length.
    fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializeError> {
        deserialize_message(bytes)
    }
}

/// Reject a message whose declared payload length disagrees with its payload.
pub(crate) fn check_payload_length<M: Message>(message: &M) -> Result<(), PirError> {
    let actual = message.payload().len() as u64;
    if message.payload_length() != actual {
        return Err(PirError::MessageLength {
            declared: message.payload_length(),
            actual,
        });
    }
    Ok(())
}

/// A client's serialized evaluation keys.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaloisKeys {
    pub(crate) payload: Vec<u8>,
    pub(crate) payload_length: u64,
    pub(crate) client_id: u64,
}

impl GaloisKeys {
    pub(crate) fn new(client_id: u64, payload: Vec<u8>) -> Self {
        Self {
            payload_length: payload.len() as u64,
            payload,
            client_id,
        }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }
}

impl Message for GaloisKeys {
    const MAGIC: [u8; 4] = GALOIS_KEYS_MAGIC;

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn payload_length(&self) -> u64 {
        self.payload_length
    }
}

/// An encrypted request for one engine object, valid for a single retrieval.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub(crate) payload: Vec<u8>,
    pub(crate) payload_length: u64,
    pub(crate) client_id: u64,
    pub(crate) ciphertext_size: u64,
    pub(crate) ciphertext_count: u64,
}

impl Query {
    pub(crate) fn new(client_id: u64, ciphertexts: Ciphertexts) -> Self {
        Self {
            payload_length: ciphertexts.bytes.len() as u64,
            payload: ciphertexts.bytes,
            client_id,
            ciphertext_size: ciphertexts.ciphertext_size,
            ciphertext_count: ciphertexts.count,
        }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn ciphertext_size(&self) -> u64 {
        self.ciphertext_size
    }

    pub fn ciphertext_count(&self) -> u64 {
        self.ciphertext_count
    }

    pub(crate) fn ciphertexts(&self) -> CiphertextsRef<'_> {
        CiphertextsRef {
            bytes: &self.payload,
            ciphertext_size: self.ciphertext_size,
            count: self.ciphertext_count,
        }
    }
}

impl Message for Query {
    const MAGIC: [u8; 4] = QUERY_MAGIC;

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn payload_length(&self) -> u64 {
        self.payload_length
    }
}

/// One shard's encrypted response to a query.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub(crate) payload: Vec<u8>,
    pub(crate) payload_length: u64,
    pub(crate) ciphertext_size: u64,
    pub(crate) ciphertext_count: u64,
}

impl Answer {
    pub(crate) fn new(ciphertexts: Ciphertexts) -> Self {
        Self {
            payload_length: ciphertexts.bytes.len() as u64,
            payload: ciphertexts.bytes,
            ciphertext_size: ciphertexts.ciphertext_size,
            ciphertext_count: ciphertexts.count,
        }
    }

    pub fn ciphertext_size(&self) -> u64 {
        self.ciphertext_size
    }

    pub fn ciphertext_count(&self) -> u64 {
        self.ciphertext_count
    }

    pub(crate) fn ciphertexts(&self) -> CiphertextsRef<'_> {
        CiphertextsRef {
            bytes: &self.payload,
            ciphertext_size: self.ciphertext_size,
            count: self.ciphertext_count,
        }
    }
}

impl Message for Answer {
    const MAGIC: [u8; 4] = ANSWER_MAGIC;

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn payload_length(&self) -> u64 {
        self.payload_length
    }
}

impl fmt::Debug for GaloisKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaloisKeys")
            .field("client_id", &self.client_id)
            .field("payload_length", &self.payload_length)
            .finish()
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("client_id", &self.client_id)
            .field("payload_length", &self.payload_length)
            .field("ciphertext_size", &self.ciphertext_size)
            .field("ciphertext_count", &self.ciphertext_count)
            .finish()
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Answer")
            .field("payload_length", &self.payload_length)
            .field("ciphertext_size", &self.ciphertext_size)
            .field("ciphertext_count", &self.ciphertext_count)
            .finish()
    }
}
