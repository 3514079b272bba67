use crate::error::{ChunkError, Result};
use crate::hasher::StreamHasher;
use crate::manifest::{self, chunk_dir};
use crate::store::ChunkStore;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingFile,
    CorruptData,
    HashMismatch,
    /// The file exists but could not be read (permissions, symlink, I/O error).
    Unreadable,
}

#[derive(Serialize, Clone, Debug)]
pub struct ChunkFailure {
    pub index: u64,
    pub kind: FailureKind,
    pub detail: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct VerifyReport {
    pub chunks_total: u64,
    pub chunks_ok: u64,
    pub failures: Vec<ChunkFailure>,
    /// Whole-file digest check; `None` when a failed chunk made it impossible.
    pub source_hash_ok: Option<bool>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.source_hash_ok != Some(false)
    }

    pub fn failed_indices(&self) -> Vec<u64> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

fn classify(e: &ChunkError) -> FailureKind {
    match e {
        ChunkError::MissingChunkFile { .. } => FailureKind::MissingFile,
        ChunkError::CorruptData { .. } => FailureKind::CorruptData,
        ChunkError::HashMismatch { .. } => FailureKind::HashMismatch,
        _ => FailureKind::Unreadable,
    }
}

fn describe(e: &ChunkError) -> String {
    match e {
        ChunkError::Io { source, .. } => format!("{e}: {source}"),
        _ => e.to_string(),
    }
}

/// Check every chunk listed in the manifest against its recorded digests.
///
/// Per-chunk problems are collected into the report; only an unreadable or malformed
/// manifest is an error.
pub fn verify(manifest_path: &Path) -> Result<VerifyReport> {
    let mf = manifest::read(manifest_path)?;
    let store = ChunkStore::open(chunk_dir(manifest_path));

    let mut failures = Vec::new();
    let mut hasher = StreamHasher::new();
    for entry in &mf.chunks {
        match store.load_verified(entry) {
            Ok(bytes) => hasher.update(&bytes),
            Err(e) => {
                log::warn!("{}", e);
                failures.push(ChunkFailure { index: entry.index, kind: classify(&e), detail: describe(&e) });
            }
        }
    }
    let source_hash_ok = failures.is_empty().then(|| hasher.finalize() == mf.source_hash);
    let chunks_total = mf.chunks.len() as u64;
    let report = VerifyReport {
        chunks_total,
        chunks_ok: chunks_total - failures.len() as u64,
        failures,
        source_hash_ok,
    };
    log::info!(
        "verified {:?}: {}/{} chunk(s) ok",
        manifest_path,
        report.chunks_ok,
        report.chunks_total
    );
    Ok(report)
}
