//! In-memory flat item storage.

/// Flat byte buffer holding fixed-width items back to back.
///
/// Item `i` occupies bytes `[i * item_bytes, (i + 1) * item_bytes)`. The buffer
/// is immutable; [`Server::setup_database`](crate::Server::setup_database)
/// copies each shard's slice into the engine.
#[derive(Clone, PartialEq, Eq)]
pub struct Database {
    bytes: Vec<u8>,
}

impl Database {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Concatenate items, all of which must share one width.
    pub fn from_items<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut bytes = Vec::new();
        for item in items {
            bytes.extend_from_slice(item.as_ref());
        }
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes of item `index`, or `None` if it lies past the end of the buffer.
    pub fn item(&self, index: u64, item_bytes: u64) -> Option<&[u8]> {
        let start = usize::try_from(index.checked_mul(item_bytes)?).ok()?;
        let end = start.checked_add(usize::try_from(item_bytes).ok()?)?;
        self.bytes.get(start..end)
    }
}

impl From<Vec<u8>> for Database {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("len", &self.bytes.len())
            .finish()
    }
}
