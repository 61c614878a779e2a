//! Fact graph serialization using `MessagePack`.
//!
//! Single graphs are encoded with [`to_bytes`] / [`save_to_file`]. A
//! [`MsgPackSink`] writes a stream of `{ source, graph }` records, one per
//! matched subject file, which [`read_records`] reads back.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use planardl_foundation::{Error, ErrorKind, Result};
use planardl_graph::{FactGraph, FactSink};
use serde::{Deserialize, Serialize};

fn serialization(e: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::Serialization(e.to_string()))
}

fn io(action: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::new(ErrorKind::Io(format!(
        "failed to {action} file '{}': {e}",
        path.display()
    )))
}

/// Serializes a graph to bytes using `MessagePack` format.
///
/// Uses named serialization to preserve struct field names.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(graph: &FactGraph) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(graph).map_err(serialization)
}

/// Deserializes a graph from `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid graph.
pub fn from_bytes(bytes: &[u8]) -> Result<FactGraph> {
    rmp_serde::from_slice(bytes).map_err(serialization)
}

/// Saves a graph to a file, replacing any existing file.
///
/// # Errors
///
/// Returns an error if the file cannot be written or serialization fails.
pub fn save_to_file<P: AsRef<Path>>(graph: &FactGraph, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| io("create", path, &e))?;

    let mut writer = BufWriter::new(file);
    writer
        .write_all(&to_bytes(graph)?)
        .map_err(|e| io("write to", path, &e))?;
    writer.flush().map_err(|e| io("flush", path, &e))
}

/// Loads a graph from a `MessagePack` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid graph.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<FactGraph> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io("open", path, &e))?;

    let mut bytes = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut bytes)
        .map_err(|e| io("read", path, &e))?;
    from_bytes(&bytes)
}

// =============================================================================
// Record streams
// =============================================================================

#[derive(Serialize)]
struct RecordRef<'a> {
    source: &'a str,
    graph: &'a FactGraph,
}

#[derive(Deserialize)]
struct Record {
    source: String,
    graph: FactGraph,
}

/// Writes each accepted graph as a `MessagePack` record.
#[derive(Debug)]
pub struct MsgPackSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> MsgPackSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of records written.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if flushing fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer
            .flush()
            .map_err(|e| Error::new(ErrorKind::Io(e.to_string())))?;
        Ok(self.writer)
    }
}

impl<W: Write> FactSink for MsgPackSink<W> {
    fn accept(&mut self, source: &str, graph: &FactGraph) -> Result<()> {
        let record = RecordRef { source, graph };
        rmp_serde::encode::write_named(&mut self.writer, &record).map_err(serialization)?;
        self.written += 1;
        Ok(())
    }
}

/// Reads every record written by a [`MsgPackSink`].
///
/// # Errors
///
/// Returns an error if reading fails or a record is malformed.
pub fn read_records(mut reader: impl Read) -> Result<Vec<(String, FactGraph)>> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| Error::new(ErrorKind::Io(e.to_string())))?;

    let total = bytes.len() as u64;
    let mut cursor = Cursor::new(bytes);
    let mut records = Vec::new();
    while cursor.position() < total {
        let record = Record::deserialize(&mut rmp_serde::Deserializer::new(&mut cursor))
            .map_err(serialization)?;
        records.push((record.source, record.graph));
    }
    Ok(records)
}
