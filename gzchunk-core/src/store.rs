use crate::compress;
use crate::error::{ChunkError, Result};
use crate::hasher;
use crate::manifest::{chunk_file_name, ChunkEntry, StorageForm};
use crate::path_safety::{self, Resolved};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Chunk files of one source, kept flat inside a single directory.
pub struct ChunkStore {
    dir: PathBuf,
    stem: String,
}

/// True when `stored` bytes save at least `min_gain` of `original` bytes.
pub fn worth_compressing(original: usize, stored: usize, min_gain: f64) -> bool {
    original > 0 && (stored as f64) <= (original as f64) * (1.0 - min_gain)
}

impl ChunkStore {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self { dir: dir.into(), stem: stem.into() }
    }

    /// Store for reading only; file names come from manifest entries.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, String::new())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hash, compress and persist one window, keeping whichever form the gain rule picks.
    pub fn store_chunk(&self, raw: &[u8], index: u64, level: u32, min_gain: f64) -> Result<ChunkEntry> {
        let hash = hasher::digest(raw);
        let compressed = compress::compress(raw, level)
            .map_err(|e| ChunkError::io("compress", &self.dir, e))?;

        let (form, payload) = if worth_compressing(raw.len(), compressed.len(), min_gain) {
            (StorageForm::Compressed, compressed.as_slice())
        } else {
            (StorageForm::Raw, raw)
        };
        log::debug!(
            "chunk {}: raw={} gz={} -> {:?}",
            index,
            raw.len(),
            compressed.len(),
            form
        );

        let file_name = chunk_file_name(&self.stem, index, form);
        let path = self.dir.join(&file_name);
        let mut f = File::create(&path).map_err(|e| ChunkError::io("create", &path, e))?;
        if let Err(e) = f.write_all(payload) {
            drop(f);
            let _ = fs::remove_file(&path);
            return Err(ChunkError::io("write", &path, e));
        }

        Ok(ChunkEntry {
            index,
            original_size: raw.len() as u64,
            stored_size: payload.len() as u64,
            form,
            hash,
            stored_hash: hasher::digest(payload),
            file_name,
        })
    }

    /// Read back the original bytes of `entry`, checking the stored digest and decoded length.
    ///
    /// The returned bytes are not compared against `entry.hash`; that is left to the caller.
    pub fn load_chunk(&self, entry: &ChunkEntry) -> Result<Vec<u8>> {
        let path = match path_safety::resolve_in(&self.dir, &entry.file_name) {
            Ok(Resolved::File(p)) => p,
            Ok(Resolved::Missing(p)) => {
                return Err(ChunkError::MissingChunkFile { index: entry.index, path: p })
            }
            Err(msg) => {
                return Err(ChunkError::ManifestMalformed(format!("chunk {}: {}", entry.index, msg)))
            }
        };
        let stored = read_file(&path, entry)?;
        if hasher::digest(&stored) != entry.stored_hash {
            return Err(ChunkError::HashMismatch { index: entry.index, what: "stored" });
        }
        let original = match entry.form {
            StorageForm::Raw => stored,
            StorageForm::Compressed => {
                compress::decompress(&stored, entry.original_size).map_err(|e| {
                    ChunkError::CorruptData { index: entry.index, reason: e.to_string() }
                })?
            }
        };
        if original.len() as u64 != entry.original_size {
            return Err(ChunkError::CorruptData {
                index: entry.index,
                reason: format!("decoded {} bytes, expected {}", original.len(), entry.original_size),
            });
        }
        Ok(original)
    }

    /// Load a chunk and check it against its original-bytes digest.
    pub fn load_verified(&self, entry: &ChunkEntry) -> Result<Vec<u8>> {
        let bytes = self.load_chunk(entry)?;
        if hasher::digest(&bytes) != entry.hash {
            return Err(ChunkError::HashMismatch { index: entry.index, what: "original" });
        }
        Ok(bytes)
    }

    /// Size on disk of the file behind `entry`, or `None` when it is absent.
    pub fn stored_len(&self, entry: &ChunkEntry) -> Option<u64> {
        match path_safety::resolve_in(&self.dir, &entry.file_name) {
            Ok(Resolved::File(p)) => fs::metadata(p).ok().map(|m| m.len()),
            _ => None,
        }
    }
}

fn read_file(path: &Path, entry: &ChunkEntry) -> Result<Vec<u8>> {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ChunkError::MissingChunkFile { index: entry.index, path: path.to_path_buf() })
        }
        Err(e) => return Err(ChunkError::io("open", path, e)),
    };
    let len = f.metadata().map(|m| m.len()).unwrap_or(0);
    let mut buf = Vec::with_capacity(len.min(entry.stored_size.saturating_add(1)) as usize);
    f.read_to_end(&mut buf).map_err(|e| ChunkError::io("read", path, e))?;
    Ok(buf)
}
