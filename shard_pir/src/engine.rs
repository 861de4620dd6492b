//! Boundary to the homomorphic-encryption engine.
//!
//! The orchestration layer never touches ciphertext arithmetic. Everything it
//! needs from the engine is listed on [`PirEngine`]; the engine's own state
//! lives in the associated handle types, which are released when dropped.

/// Scheme-level sizing for one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardConfig {
    /// Number of items held by a single shard.
    pub num_items: u64,
    /// Width of every item in bytes.
    pub item_bytes: u64,
    /// Degree of the ring polynomial.
    pub poly_degree: u64,
    /// Bit width of the plaintext modulus.
    pub plaintext_modulus_bits: u32,
    /// Number of dimensions the shard is arranged in.
    pub recursion_depth: u32,
}

/// Serialized ciphertexts as produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertexts {
    pub bytes: Vec<u8>,
    /// Serialized size of a single ciphertext.
    pub ciphertext_size: u64,
    /// Number of ciphertexts in `bytes`.
    pub count: u64,
}

/// Borrowed view of serialized ciphertexts handed back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CiphertextsRef<'a> {
    pub bytes: &'a [u8],
    pub ciphertext_size: u64,
    pub count: u64,
}

impl Ciphertexts {
    pub fn view(&self) -> CiphertextsRef<'_> {
        CiphertextsRef {
            bytes: &self.bytes,
            ciphertext_size: self.ciphertext_size,
            count: self.count,
        }
    }
}

/// Failures reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The requested configuration cannot be realised.
    #[error("infeasible configuration: {0}")]
    Infeasible(String),
    /// An index lies outside what the engine accepts.
    #[error("index {index} out of range, engine accepts [0, {limit})")]
    OutOfRange { index: u64, limit: u64 },
    /// No Galois keys were installed for the client.
    #[error("no galois keys installed for client {0}")]
    MissingKeys(u64),
    /// The database was never loaded into this handle.
    #[error("no database loaded")]
    NoDatabase,
    /// Input bytes do not parse as the expected object.
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

/// Operations consumed from a homomorphic-encryption PIR engine.
///
/// Handles are created by the `init_*` operations and released by dropping
/// them. The orchestration layer owns every handle exactly once, so a handle
/// is never used after release.
///
/// `gen_answer` is called concurrently on distinct server handles, hence the
/// `Sync` bounds.
pub trait PirEngine: Send + Sync {
    /// Scheme parameters shared by clients and servers.
    type Params: Send + Sync;
    /// Client state, including the secret key.
    type Client: Send + Sync;
    /// One database plus the evaluation keys installed into it.
    type Server: Send + Sync;

    /// Derive scheme parameters for one shard.
    fn init_params(&self, config: &ShardConfig) -> Result<Self::Params, EngineError>;

    /// Create a client with a fresh secret key.
    fn init_client(
        &self,
        params: &Self::Params,
        client_id: u64,
    ) -> Result<Self::Client, EngineError>;

    /// Create an empty database handle.
    fn init_server(&self, params: &Self::Params) -> Result<Self::Server, EngineError>;

    /// Serialize the client's public evaluation keys.
    fn gen_galois_keys(&self, client: &Self::Client) -> Result<Vec<u8>, EngineError>;

    /// Install a client's evaluation keys, replacing any earlier ones.
    fn set_galois_keys(
        &self,
        server: &mut Self::Server,
        client_id: u64,
        keys: &[u8],
    ) -> Result<(), EngineError>;

    /// Encode one shard's items into the handle, replacing any earlier database.
    fn setup_database(&self, server: &mut Self::Server, items: &[u8]) -> Result<(), EngineError>;

    /// Index of the engine object holding the shard-local item `local_index`.
    fn index_of(&self, client: &Self::Client, local_index: u64) -> u64;

    /// Position of the shard-local item `local_index` inside its engine object.
    fn offset_of(&self, client: &Self::Client, local_index: u64) -> u64;

    /// Encrypt a request for the engine object at `index`.
    fn gen_query(&self, client: &Self::Client, index: u64) -> Result<Ciphertexts, EngineError>;

    /// Evaluate a query against the database held by `server`.
    fn gen_answer(
        &self,
        server: &Self::Server,
        query: CiphertextsRef<'_>,
        client_id: u64,
    ) -> Result<Ciphertexts, EngineError>;

    /// Decrypt an answer into the plaintext byte stream it encodes.
    fn recover(
        &self,
        client: &Self::Client,
        answer: CiphertextsRef<'_>,
    ) -> Result<Vec<u8>, EngineError>;
}
