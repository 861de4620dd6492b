//! Server side: sharded database setup, key broadcast and concurrent answers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;

use crate::database::Database;
use crate::engine::PirEngine;
use crate::error::PirError;
use crate::messages::{Answer, GaloisKeys, Message, Query, check_payload_length};
use crate::params::Parameters;

/// Stops answer generation from starting work on further shards.
///
/// Shard tasks check the token right before calling the engine. An engine
/// call that is already running is not interrupted, so cancellation bounds
/// the work started rather than the wall-clock time of a hung engine.
#[derive(Debug, Default)]
pub struct Cancellation {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Cancel from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn should_stop(&self) -> bool {
        self.is_cancelled() || self.deadline_passed()
    }
}

/// A PIR server holding one engine database handle per shard.
pub struct Server<E: PirEngine> {
    params: Arc<Parameters<E>>,
    shards: Vec<E::Server>,
    keyed_clients: HashSet<u64>,
    database_ready: bool,
}

impl<E: PirEngine> Server<E> {
    /// Allocate `shard_count` empty database handles.
    pub fn new(params: Arc<Parameters<E>>) -> Result<Self, PirError> {
        let shards = (0..params.shard_count())
            .map(|_| params.engine().init_server(params.handle()))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Initialized server with {} shards", shards.len());
        Ok(Self {
            params,
            shards,
            keyed_clients: HashSet::new(),
            database_ready: false,
        })
    }

    pub fn params(&self) -> &Arc<Parameters<E>> {
        &self.params
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn is_database_ready(&self) -> bool {
        self.database_ready
    }

    /// Whether Galois keys for `client_id` are installed on every shard.
    pub fn has_keys_for(&self, client_id: u64) -> bool {
        self.keyed_clients.contains(&client_id)
    }

    /// Install a client's Galois keys into every shard.
    ///
    /// Installing keys for a client again replaces the earlier material. The
    /// client only counts as keyed once every shard accepted the keys.
    pub fn set_galois_keys(&mut self, keys: &GaloisKeys) -> Result<(), PirError> {
        check_payload_length(keys)?;
        let client_id = keys.client_id();
        let payload = keys.payload();
        let engine = self.params.engine();

        self.keyed_clients.remove(&client_id);
        self.shards
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(shard, handle)| {
                engine
                    .set_galois_keys(handle, client_id, payload)
                    .map_err(|source| PirError::Shard { shard, source })
            })?;
        self.keyed_clients.insert(client_id);

        info!(
            "Installed galois keys for client {client_id} on {} shards",
            self.shards.len()
        );
        Ok(())
    }

    /// Split `db` into `shard_count` contiguous equal slices and load each
    /// into its shard.
    ///
    /// A database of the wrong length is rejected before any shard is touched.
    pub fn setup_database(&mut self, db: &Database) -> Result<(), PirError> {
        let expected = self.params.config().database_bytes();
        let actual = db.len() as u64;
        if actual != expected {
            return Err(PirError::DatabaseSize { expected, actual });
        }

        let shard_bytes = (self.params.per_shard_item_count() * self.params.item_bytes()) as usize;
        let engine = self.params.engine();
        let started = Instant::now();

        self.database_ready = false;
        self.shards
            .par_iter_mut()
            .zip(db.as_bytes().par_chunks(shard_bytes))
            .enumerate()
            .try_for_each(|(shard, (handle, items))| {
                debug!("Encoding {} bytes into shard {shard}", items.len());
                engine
                    .setup_database(handle, items)
                    .map_err(|source| PirError::Shard { shard, source })
            })?;
        self.database_ready = true;

        info!(
            "Loaded {} items into {} shards in {:?}",
            self.params.num_items(),
            self.shards.len(),
            started.elapsed()
        );
        Ok(())
    }

    /// Answer `query` on every shard concurrently.
    ///
    /// Returns one answer per shard, in shard order. Fails with
    /// [`PirError::DatabaseNotReady`] before a successful
    /// [`setup_database`](Self::setup_database) and with
    /// [`PirError::KeysNotInstalled`] when the querying client's keys were
    /// never installed.
    pub fn gen_answer(&self, query: Query) -> Result<Vec<Answer>, PirError> {
        self.gen_answer_with(query, &Cancellation::new())
    }

    /// Like [`gen_answer`](Self::gen_answer), giving up on shards that have
    /// not started once `cancel` trips.
    ///
    /// Either every shard's answer is returned or the call fails; there are
    /// no partial results. A shard whose engine call failed is reported in
    /// preference to shards skipped by cancellation.
    pub fn gen_answer_with(
        &self,
        query: Query,
        cancel: &Cancellation,
    ) -> Result<Vec<Answer>, PirError> {
        check_payload_length(&query)?;
        if !self.database_ready {
            return Err(PirError::DatabaseNotReady);
        }
        let client_id = query.client_id();
        if !self.keyed_clients.contains(&client_id) {
            return Err(PirError::KeysNotInstalled(client_id));
        }

        let total = self.shards.len();
        let engine = self.params.engine();
        let ciphertexts = query.ciphertexts();
        let started = Instant::now();

        // Slot `i` is written only by the task answering shard `i`.
        let mut slots: Vec<Option<Result<Answer, PirError>>> = (0..total).map(|_| None).collect();
        rayon::scope(|scope| {
            for (shard, (handle, slot)) in self.shards.iter().zip(slots.iter_mut()).enumerate() {
                scope.spawn(move |_| {
                    if cancel.should_stop() {
                        return;
                    }
                    let answer = engine
                        .gen_answer(handle, ciphertexts, client_id)
                        .map(Answer::new)
                        .map_err(|source| PirError::Shard { shard, source });
                    *slot = Some(answer);
                });
            }
        });

        let answers = slots.into_iter().flatten().collect::<Result<Vec<_>, _>>()?;
        let completed = answers.len();
        if completed < total {
            return Err(if cancel.is_cancelled() {
                PirError::Cancelled { completed, total }
            } else {
                PirError::DeadlineExceeded { completed, total }
            });
        }

        info!(
            "Answered query from client {client_id} on {total} shards in {:?}",
            started.elapsed()
        );
        Ok(answers)
    }

    /// Release every shard handle.
    pub fn free(self) {}
}

impl<E: PirEngine> fmt::Debug for Server<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("params", &self.params)
            .field("shards", &self.shards.len())
            .field("keyed_clients", &self.keyed_clients)
            .field("database_ready", &self.database_ready)
            .finish()
    }
}
