//! Error types, one enum per concern.
//!
//! - [`IndexError`]: fatal at startup; nothing is served from a half-built index.
//! - [`SearchError`]: scoped to one query; the server turns it into an `Error:` line.
//! - [`ProtocolError`]: wire problems on either side of a connection.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a [`GenomeIndex`](crate::GenomeIndex).
#[derive(Debug, Error)]
pub enum IndexError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Tile size outside the range supported for the alphabet.
    #[error("{alphabet} tile size must be between {min} and {max}, got {got}")]
    BadTileSize {
        alphabet: &'static str,
        min: usize,
        max: usize,
        got: usize,
    },
    /// No targets, or only empty ones.
    #[error("no target sequence to index")]
    NoTargets,
    /// Source names feed the source table and must be unique.
    #[error("duplicate target name '{0}'")]
    DuplicateSource(String),
    /// Source names travel in one-byte-length response lines.
    #[error("target name '{name}...' is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },
    /// Concatenated coordinates are 32-bit.
    #[error("can only index up to {limit} positions, got {total}")]
    TooLarge { limit: u64, total: u64 },
    /// Overused-tile files are only meaningful for the direct layout.
    #[error("overused tile files are not supported with tile size {0} (segmented layout)")]
    OocOnSegmented(usize),
    /// Malformed overused-tile file.
    #[error("invalid ooc file '{path}': {detail}")]
    Ooc { path: PathBuf, detail: String },
}

/// Errors scoped to a single query.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The per-query allocation budget ran out.
    #[error("query exceeded its memory budget of {limit} bytes")]
    BudgetExhausted { limit: usize },
    /// The allocator refused a reservation.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },
    /// Operation not available for this index.
    #[error("{0}")]
    Unsupported(&'static str),
    /// Primer or query contained symbols that cannot be tiled.
    #[error("bad sequence: {0}")]
    BadSequence(String),
}

impl SearchError {
    /// Memory-class failures that the server recovers from with the ripcord.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            SearchError::BudgetExhausted { .. } | SearchError::AllocationFailed { .. }
        )
    }
}

/// Errors on the wire.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error (including a peer that hung up mid-write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Request did not start with the shared signature.
    #[error("missing signature")]
    NoSignature,
    /// Request line was empty or not terminated in time.
    #[error("empty or truncated request")]
    Truncated,
    /// Request or response line longer than the framing allows.
    #[error("line too long ({0} bytes)")]
    LineTooLong(usize),
    /// Command word not understood.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    /// Command argument missing or not parseable.
    #[error("malformed argument for '{command}': {detail}")]
    BadArgument {
        command: &'static str,
        detail: String,
    },
    /// Server did not acknowledge a sequence upload.
    #[error("expecting 'Y' from server, got {0:?}")]
    NoAck(u8),
    /// Server answered with an `Error:` line.
    #[error("server error: {0}")]
    Server(String),
    /// Response line did not have the expected shape.
    #[error("unexpected response: {0}")]
    BadResponse(String),
}
