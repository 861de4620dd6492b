use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use rand::{Rng, RngCore, rng};
use serde::{Deserialize, Serialize};
use shard_pir::{
    Cancellation, Client, Database, EngineError, GaloisKeys, HEADER_SIZE, Message, Parameters,
    ParametersConfig, PirError, Query, Server, transparent::TransparentEngine,
};

fn config(num_items: u64, shards: usize) -> ParametersConfig {
    ParametersConfig {
        num_items,
        item_bytes: 288,
        poly_degree: 2048,
        plaintext_modulus_bits: 12,
        recursion_depth: 2,
        shard_count: NonZeroUsize::new(shards).unwrap(),
    }
}

fn random_database(config: &ParametersConfig) -> Database {
    let mut bytes = vec![0u8; config.database_bytes() as usize];
    rng().fill_bytes(&mut bytes);
    Database::new(bytes)
}

struct Deployment {
    client: Client<TransparentEngine>,
    server: Server<TransparentEngine>,
}

fn deploy(config: ParametersConfig, db: &Database) -> Deployment {
    let params = Arc::new(Parameters::new(TransparentEngine, config).unwrap());
    let client = Client::new(Arc::clone(&params), 0).unwrap();
    let mut server = Server::new(params).unwrap();

    let keys = client.gen_galois_keys().unwrap();
    server
        .set_galois_keys(&GaloisKeys::from_bytes(&keys.to_bytes().unwrap()).unwrap())
        .unwrap();
    server.setup_database(db).unwrap();
    Deployment { client, server }
}

fn retrieve(deployment: &Deployment, index: u64) -> Vec<u8> {
    let Deployment { client, server } = deployment;
    let location = client.locate(index).unwrap();
    let query = client.gen_query(location.query_index).unwrap();
    let query = Query::from_bytes(&query.to_bytes().unwrap()).unwrap();

    let mut answers = server.gen_answer(query).unwrap();
    assert_eq!(answers.len(), server.shard_count());
    client
        .recover(answers.swap_remove(location.shard), location.offset)
        .unwrap()
}

#[test]
fn test_round_trip_across_shard_counts() {
    for shards in [1, 2, 4, 20] {
        let config = config(2000, shards);
        let db = random_database(&config);
        let deployment = deploy(config, &db);

        let mut indices = vec![0, 1, 9, 10, 99, 100, 1999];
        indices.extend((0..16).map(|_| rng().random_range(0..2000)));
        for index in indices {
            assert_eq!(
                retrieve(&deployment, index),
                db.item(index, 288).unwrap(),
                "item {index} with {shards} shards"
            );
        }
    }
}

#[test]
fn test_only_owning_shard_holds_item() {
    let config = config(400, 4);
    // every item of shard `s` is filled with byte `s + 1`
    let db = Database::from_items((0..400u64).map(|i| [(i / 100) as u8 + 1; 288]));
    let Deployment { client, server } = deploy(config, &db);

    let location = client.locate(250).unwrap();
    assert_eq!(location.shard, 2);
    let answers = server
        .gen_answer(client.gen_query(location.query_index).unwrap())
        .unwrap();

    for (shard, answer) in answers.into_iter().enumerate() {
        let recovered = client.recover(answer, location.offset).unwrap();
        assert_eq!(recovered, vec![shard as u8 + 1; 288]);
    }
}

#[test]
fn test_default_deployment_coordinates() {
    let config = config(4096, 1);
    let db = random_database(&config);
    let deployment = deploy(config, &db);
    let client = &deployment.client;

    assert_eq!(client.shard_index(1234).unwrap(), 0);
    assert_eq!(client.query_index(1234).unwrap(), 123);
    assert_eq!(client.offset_in_shard(1234).unwrap(), 4);
    assert_eq!(retrieve(&deployment, 1234), db.item(1234, 288).unwrap());
    assert_eq!(retrieve(&deployment, 4095), db.item(4095, 288).unwrap());
}

#[test]
fn test_four_shard_coordinates() {
    let config = config(4096, 4);
    let db = random_database(&config);
    let deployment = deploy(config, &db);

    let Deployment { client, server } = &deployment;
    let location = client.locate(1234).unwrap();
    assert_eq!(location.shard, 1);
    assert_eq!(location.query_index, 21);
    assert_eq!(location.offset, 0);

    let item = db.item(1234, 288).unwrap();
    let answers = server
        .gen_answer(client.gen_query(location.query_index).unwrap())
        .unwrap();
    assert_eq!(answers.len(), 4);
    for (shard, answer) in answers.into_iter().enumerate() {
        let recovered = client.recover(answer, location.offset).unwrap();
        if shard == location.shard {
            assert_eq!(recovered, item);
        } else {
            assert_ne!(recovered, item, "shard {shard} returned the item");
        }
    }
}

#[test]
fn test_uneven_split_rejected() {
    let err = Parameters::new(TransparentEngine, config(4096, 20)).unwrap_err();
    assert!(matches!(err, PirError::InvalidParameters(_)));
}

#[test]
fn test_overflowing_database_rejected() {
    let mut config = config(1 << 62, 1);
    config.recursion_depth = 8;
    let err = Parameters::new(TransparentEngine, config).unwrap_err();
    assert!(matches!(err, PirError::InvalidParameters(_)));
}

/// Field-for-field mirror of a serialized query body.
#[derive(Serialize, Deserialize)]
struct QueryBody {
    payload: Vec<u8>,
    payload_length: u64,
    client_id: u64,
    ciphertext_size: u64,
    ciphertext_count: u64,
}

#[test]
fn test_query_selecting_past_u64_rejected() {
    let config = ParametersConfig {
        num_items: 40,
        item_bytes: 16,
        poly_degree: 64,
        plaintext_modulus_bits: 8,
        recursion_depth: 70,
        shard_count: NonZeroUsize::MIN,
    };
    let db = random_database(&config);
    let Deployment { client, server } = deploy(config, &db);

    // every selector of an honest query for index 0 is [1, 0]; flip them all
    let bytes = client.gen_query(0).unwrap().to_bytes().unwrap();
    let mut body: QueryBody = rmp_serde::from_slice(&bytes[HEADER_SIZE..]).unwrap();
    assert_eq!(body.ciphertext_count, 70);
    assert_eq!(body.ciphertext_size, 2);
    body.payload.chunks_mut(2).for_each(|selector| selector.swap(0, 1));

    let mut tampered = bytes[..HEADER_SIZE].to_vec();
    tampered.extend(rmp_serde::to_vec(&body).unwrap());
    let query = Query::from_bytes(&tampered).unwrap();

    let err = server.gen_answer(query).unwrap_err();
    assert!(matches!(
        err,
        PirError::Shard {
            shard: 0,
            source: EngineError::Malformed { what: "query", .. }
        }
    ));
}

#[test]
fn test_setup_database_is_idempotent() {
    let config = config(200, 2);
    let first = random_database(&config);
    let mut deployment = deploy(config, &first);
    deployment.server.setup_database(&first).unwrap();
    assert_eq!(retrieve(&deployment, 150), first.item(150, 288).unwrap());

    let second = random_database(&config);
    deployment.server.setup_database(&second).unwrap();
    assert_eq!(retrieve(&deployment, 150), second.item(150, 288).unwrap());
}

#[test]
fn test_database_size_mismatch() {
    let config = config(200, 2);
    let params = Arc::new(Parameters::new(TransparentEngine, config).unwrap());
    let mut server = Server::new(Arc::clone(&params)).unwrap();

    let short = Database::new(vec![0u8; config.database_bytes() as usize - 1]);
    let err = server.setup_database(&short).unwrap_err();
    assert!(matches!(
        err,
        PirError::DatabaseSize {
            expected: 57600,
            actual: 57599
        }
    ));
    assert!(!server.is_database_ready());

    let db = random_database(&config);
    let mut deployment = deploy(config, &db);
    let long = Database::new(vec![0u8; config.database_bytes() as usize + 288]);
    assert!(deployment.server.setup_database(&long).is_err());
    assert!(deployment.server.is_database_ready());
    assert_eq!(retrieve(&deployment, 42), db.item(42, 288).unwrap());
}

#[test]
fn test_answer_requires_database() {
    let params = Arc::new(Parameters::new(TransparentEngine, config(200, 2)).unwrap());
    let client = Client::new(Arc::clone(&params), 0).unwrap();
    let mut server = Server::new(params).unwrap();
    server
        .set_galois_keys(&client.gen_galois_keys().unwrap())
        .unwrap();

    let err = server.gen_answer(client.gen_query(0).unwrap()).unwrap_err();
    assert!(matches!(err, PirError::DatabaseNotReady));
}

#[test]
fn test_answer_requires_client_keys() {
    let config = config(200, 2);
    let db = random_database(&config);
    let Deployment { client, mut server } = deploy(config, &db);

    let stranger = Client::new(Arc::clone(client.params()), 9).unwrap();
    let err = server
        .gen_answer(stranger.gen_query(0).unwrap())
        .unwrap_err();
    assert!(matches!(err, PirError::KeysNotInstalled(9)));
    assert!(!server.has_keys_for(9));

    server
        .set_galois_keys(&stranger.gen_galois_keys().unwrap())
        .unwrap();
    assert!(server.has_keys_for(9));
    assert!(server.gen_answer(stranger.gen_query(0).unwrap()).is_ok());
}

#[test]
fn test_index_out_of_range() {
    let config = config(200, 2);
    let db = random_database(&config);
    let Deployment { client, server } = deploy(config, &db);

    for err in [
        client.locate(200).unwrap_err(),
        client.shard_index(u64::MAX).unwrap_err(),
        client.gen_query(10).unwrap_err(),
    ] {
        assert!(err.is_out_of_range(), "{err}");
    }
    assert!(matches!(
        client.gen_query(10).unwrap_err().engine_error(),
        Some(EngineError::OutOfRange { index: 10, limit: 10 })
    ));

    let answer = server
        .gen_answer(client.gen_query(0).unwrap())
        .unwrap()
        .swap_remove(0);
    let err = client.recover(answer, 10).unwrap_err();
    assert!(matches!(
        err,
        PirError::OutOfRange {
            what: "offset",
            index: 10,
            limit: 10
        }
    ));
}

#[test]
fn test_cancelled_before_start() {
    let config = config(200, 4);
    let db = random_database(&config);
    let Deployment { client, server } = deploy(config, &db);

    let cancel = Cancellation::new();
    cancel.cancel();
    let err = server
        .gen_answer_with(client.gen_query(0).unwrap(), &cancel)
        .unwrap_err();
    assert!(matches!(
        err,
        PirError::Cancelled {
            completed: 0,
            total: 4
        }
    ));
}

#[test]
fn test_deadline_exceeded() {
    let config = config(200, 4);
    let db = random_database(&config);
    let Deployment { client, server } = deploy(config, &db);

    let cancel = Cancellation::with_timeout(Duration::ZERO);
    assert!(cancel.deadline_passed());
    let err = server
        .gen_answer_with(client.gen_query(0).unwrap(), &cancel)
        .unwrap_err();
    assert!(matches!(
        err,
        PirError::DeadlineExceeded {
            completed: 0,
            total: 4
        }
    ));

    let generous = Cancellation::with_timeout(Duration::from_secs(600));
    assert_eq!(
        server
            .gen_answer_with(client.gen_query(0).unwrap(), &generous)
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn test_free_releases_handles() {
    let config = config(200, 2);
    let db = random_database(&config);
    let Deployment { client, server } = deploy(config, &db);
    let params = Arc::clone(client.params());

    client.free();
    server.free();
    let params = Arc::into_inner(params).unwrap();
    params.free();
}
