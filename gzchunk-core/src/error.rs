//! Error taxonomy shared by every pipeline operation.

use std::path::PathBuf;

/// Errors raised by chunking, rebuilding, verifying and inspecting a chunk store.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The source file to chunk does not exist or is not a regular file.
    #[error("source not found: {0:?}")]
    SourceNotFound(PathBuf),

    /// A configuration value is out of range.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// An I/O operation failed.
    #[error("io error: {op} {path:?}")]
    Io {
        /// What was being attempted ("open", "write", ...).
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest document is unreadable or internally inconsistent.
    #[error("manifest malformed: {0}")]
    ManifestMalformed(String),

    /// A chunk file declared by the manifest is absent.
    #[error("chunk {index}: missing chunk file {path:?}")]
    MissingChunkFile { index: u64, path: PathBuf },

    /// Stored bytes could not be decoded back into the original chunk.
    #[error("chunk {index}: corrupt data: {reason}")]
    CorruptData { index: u64, reason: String },

    /// A recomputed digest does not match the one recorded in the manifest.
    #[error("chunk {index}: {what} hash mismatch")]
    HashMismatch { index: u64, what: &'static str },

    /// Rebuild could not produce the complete original byte stream.
    #[error("rebuild incomplete: {reason}")]
    RebuildIncomplete {
        reason: String,
        #[source]
        cause: Option<Box<ChunkError>>,
    },

    /// The chunk directory already holds a previous run.
    #[error("output directory {0:?} already contains a chunk store (use overwrite to replace it)")]
    OutputExists(PathBuf),
}

impl ChunkError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ChunkError::Io { op, path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, ChunkError>;
