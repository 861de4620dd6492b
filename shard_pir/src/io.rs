//! Database, message and output I/O operations.

use std::{
    fs::{File, create_dir_all, write},
    io::{self, BufReader, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};

/// Read the database from a file.
fn read_database_from_file(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)
        .with_context(|| format!("failed to read database file '{}'", path.display()))?;
    let file_size = file
        .metadata()
        .with_context(|| {
            format!(
                "failed to get metadata for database file '{}'",
                path.display()
            )
        })?
        .len() as usize;

    let mut buffer = Vec::with_capacity(file_size);
    BufReader::new(file)
        .read_to_end(&mut buffer)
        .with_context(|| format!("failed to read database file '{}'", path.display()))?;
    Ok(buffer)
}

/// Read the database from stdin.
fn read_database_from_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .lock()
        .read_to_end(&mut buffer)
        .context("failed to read database from stdin")?;
    Ok(buffer)
}

/// Read the database from file or stdin, returning bytes and source description.
pub(crate) fn read_database(db_path: Option<&Path>) -> Result<(Vec<u8>, String)> {
    match db_path {
        Some(path) => Ok((read_database_from_file(path)?, path.display().to_string())),
        None => Ok((read_database_from_stdin()?, "stdin".to_string())),
    }
}

/// Write one serialized message into the messages directory.
pub(crate) fn write_message(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    create_dir_all(dir)
        .with_context(|| format!("failed to create messages directory '{}'", dir.display()))?;
    let path = dir.join(name);
    write(&path, bytes)
        .with_context(|| format!("failed to write message file '{}'", path.display()))
}

/// Write output bytes to a file or stdout.
pub(crate) fn write_output(output_path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output_path {
        Some(path) => {
            write(path, bytes)
                .with_context(|| format!("failed to write output file '{}'", path.display()))?;
        }
        None => {
            io::stdout()
                .write_all(bytes)
                .context("failed to write to stdout")?;
        }
    }
    Ok(())
}
