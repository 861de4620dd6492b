//! Serialization and deserialization for protocol messages.

use crate::error::{DeserializeError, PeekError, SerializeError};
use crate::messages::Message;
use crate::{HEADER_SIZE, MESSAGE_VERSION};

/// Peek the version number from message bytes without full deserialization.
///
/// This reads only the header (magic bytes + version) to allow fast-fail
/// for unsupported versions or the wrong message type without deserializing
/// the payload.
pub fn peek_message_version<M: Message>(bytes: &[u8]) -> Result<u32, PeekError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PeekError::TooShort);
    }
    if bytes[0..4] != M::MAGIC {
        return Err(PeekError::InvalidMagic);
    }
    let version_bytes: [u8; 4] = bytes[4..8]
        .try_into()
        .map_err(|_| PeekError::InvalidVersion)?;
    Ok(u32::from_be_bytes(version_bytes))
}

/// Serialize a message with magic bytes and version header.
pub fn serialize_message<M: Message>(message: &M) -> Result<Vec<u8>, SerializeError> {
    let payload_bytes = rmp_serde::to_vec(message).map_err(SerializeError)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload_bytes.len());
    buf.extend_from_slice(&M::MAGIC);
    buf.extend_from_slice(&MESSAGE_VERSION.to_be_bytes());
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Deserialize a message, validating magic bytes, version and payload length.
pub fn deserialize_message<M: Message>(bytes: &[u8]) -> Result<M, DeserializeError> {
    let version = peek_message_version::<M>(bytes)?;
    if version != MESSAGE_VERSION {
        return Err(DeserializeError::UnsupportedVersion {
            got: version,
            expected: MESSAGE_VERSION,
        });
    }
    let message: M =
        rmp_serde::from_slice(&bytes[HEADER_SIZE..]).map_err(DeserializeError::Payload)?;
    let actual = message.payload().len() as u64;
    if message.payload_length() != actual {
        return Err(DeserializeError::LengthMismatch {
            declared: message.payload_length(),
            actual,
        });
    }
    Ok(message)
}
