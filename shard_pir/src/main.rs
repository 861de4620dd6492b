use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::info;
use shard_pir::{
    Answer, Cancellation, Client, Database, GaloisKeys, Message, Parameters, Query, Server,
    transparent::TransparentEngine,
};

mod cli;
mod io;

use cli::Args;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    // set up parameters, client and server
    let params = Arc::new(
        Parameters::new(TransparentEngine, args.parameters()).context("invalid parameters")?,
    );
    let client = Client::new(Arc::clone(&params), args.client_id)
        .context("failed to initialize client")?;
    let mut server = Server::new(Arc::clone(&params)).context("failed to initialize server")?;

    let location = client
        .locate(args.index)
        .with_context(|| format!("cannot retrieve item {}", args.index))?;
    info!(
        "Item {} lives in shard {} at query index {} offset {}",
        args.index, location.shard, location.query_index, location.offset
    );

    // install keys, round-tripping them through the wire format
    let keys_bytes = client
        .gen_galois_keys()
        .context("failed to generate galois keys")?
        .to_bytes()
        .context("failed to serialize galois keys")?;
    if let Some(dir) = &args.messages {
        io::write_message(dir, "galois_keys.bin", &keys_bytes)?;
    }
    let keys = GaloisKeys::from_bytes(&keys_bytes).context("failed to deserialize galois keys")?;
    server
        .set_galois_keys(&keys)
        .context("failed to install galois keys")?;

    // load the database
    let (db_bytes, db_source) = io::read_database(args.db.as_deref())?;
    server
        .setup_database(&Database::new(db_bytes))
        .with_context(|| format!("failed to set up database from '{db_source}'"))?;
    info!("Successfully loaded database from '{db_source}'");

    // query every shard
    let query_bytes = client
        .gen_query(location.query_index)
        .context("failed to generate query")?
        .to_bytes()
        .context("failed to serialize query")?;
    if let Some(dir) = &args.messages {
        io::write_message(dir, "query.bin", &query_bytes)?;
    }
    let query = Query::from_bytes(&query_bytes).context("failed to deserialize query")?;

    let cancel = match args.timeout_ms {
        Some(ms) => Cancellation::with_timeout(Duration::from_millis(ms)),
        None => Cancellation::new(),
    };
    let answers = server
        .gen_answer_with(query, &cancel)
        .context("failed to generate answers")?;

    let mut owning_answer = None;
    for (shard, answer) in answers.into_iter().enumerate() {
        let answer_bytes = answer
            .to_bytes()
            .with_context(|| format!("failed to serialize answer of shard {shard}"))?;
        if let Some(dir) = &args.messages {
            io::write_message(dir, &format!("answer_{shard}.bin"), &answer_bytes)?;
        }
        if shard == location.shard {
            owning_answer = Some(
                Answer::from_bytes(&answer_bytes)
                    .with_context(|| format!("failed to deserialize answer of shard {shard}"))?,
            );
        }
    }
    let answer = owning_answer.ok_or(anyhow!("no answer for shard {}", location.shard))?;

    // recover and write the item
    let item = client
        .recover(answer, location.offset)
        .context("failed to recover item")?;
    io::write_output(args.output.as_deref(), &item)?;
    info!("Recovered {} bytes of item {}", item.len(), args.index);

    server.free();
    client.free();
    Ok(())
}
