use std::{num::NonZeroUsize, sync::Arc};

use shard_pir::{
    Cancellation, Ciphertexts, CiphertextsRef, Client, Database, EngineError, Parameters,
    ParametersConfig, PirEngine, PirError, Server, ShardConfig, transparent::TransparentEngine,
};

/// Delegates to [`TransparentEngine`] but fails every answer, cancelling the
/// remaining shards as it does.
struct CancellingEngine {
    cancel: Arc<Cancellation>,
}

impl PirEngine for CancellingEngine {
    type Params = <TransparentEngine as PirEngine>::Params;
    type Client = <TransparentEngine as PirEngine>::Client;
    type Server = <TransparentEngine as PirEngine>::Server;

    fn init_params(&self, config: &ShardConfig) -> Result<Self::Params, EngineError> {
        TransparentEngine.init_params(config)
    }

    fn init_client(
        &self,
        params: &Self::Params,
        client_id: u64,
    ) -> Result<Self::Client, EngineError> {
        TransparentEngine.init_client(params, client_id)
    }

    fn init_server(&self, params: &Self::Params) -> Result<Self::Server, EngineError> {
        TransparentEngine.init_server(params)
    }

    fn gen_galois_keys(&self, client: &Self::Client) -> Result<Vec<u8>, EngineError> {
        TransparentEngine.gen_galois_keys(client)
    }

    fn set_galois_keys(
        &self,
        server: &mut Self::Server,
        client_id: u64,
        keys: &[u8],
    ) -> Result<(), EngineError> {
        TransparentEngine.set_galois_keys(server, client_id, keys)
    }

    fn setup_database(&self, server: &mut Self::Server, items: &[u8]) -> Result<(), EngineError> {
        TransparentEngine.setup_database(server, items)
    }

    fn index_of(&self, client: &Self::Client, local_index: u64) -> u64 {
        TransparentEngine.index_of(client, local_index)
    }

    fn offset_of(&self, client: &Self::Client, local_index: u64) -> u64 {
        TransparentEngine.offset_of(client, local_index)
    }

    fn gen_query(&self, client: &Self::Client, index: u64) -> Result<Ciphertexts, EngineError> {
        TransparentEngine.gen_query(client, index)
    }

    fn gen_answer(
        &self,
        _server: &Self::Server,
        _query: CiphertextsRef<'_>,
        _client_id: u64,
    ) -> Result<Ciphertexts, EngineError> {
        self.cancel.cancel();
        Err(EngineError::Malformed {
            what: "query",
            reason: "rejected".into(),
        })
    }

    fn recover(
        &self,
        client: &Self::Client,
        answer: CiphertextsRef<'_>,
    ) -> Result<Vec<u8>, EngineError> {
        TransparentEngine.recover(client, answer)
    }
}

#[test]
fn test_shard_failure_reported_over_cancellation() {
    let cancel = Arc::new(Cancellation::new());
    let config = ParametersConfig {
        num_items: 200,
        item_bytes: 288,
        poly_degree: 2048,
        plaintext_modulus_bits: 12,
        recursion_depth: 2,
        shard_count: NonZeroUsize::new(4).unwrap(),
    };
    let engine = CancellingEngine {
        cancel: Arc::clone(&cancel),
    };
    let params = Arc::new(Parameters::new(engine, config).unwrap());
    let client = Client::new(Arc::clone(&params), 0).unwrap();
    let mut server = Server::new(params).unwrap();
    server
        .set_galois_keys(&client.gen_galois_keys().unwrap())
        .unwrap();
    server
        .setup_database(&Database::new(vec![0u8; 200 * 288]))
        .unwrap();
    let query = client.gen_query(0).unwrap();

    // a single worker runs the shards one after another, so every shard after
    // the first sees the cancellation and is skipped
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let err = pool
        .install(|| server.gen_answer_with(query, &cancel))
        .unwrap_err();

    assert!(cancel.is_cancelled());
    assert!(matches!(
        err,
        PirError::Shard {
            source: EngineError::Malformed { what: "query", .. },
            ..
        }
    ));
}
