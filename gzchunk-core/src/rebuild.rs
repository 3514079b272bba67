use crate::error::{ChunkError, Result};
use crate::hasher::StreamHasher;
use crate::manifest::{self, chunk_dir, partial_sibling};
use crate::store::ChunkStore;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Reassemble the original file described by `manifest_path` into `out_path`.
///
/// Output goes to `<out_path>.partial` and is renamed into place only after the byte count
/// and whole-file digest match the manifest. On failure the partial file is removed and
/// `out_path` is left untouched. Returns the number of bytes written.
pub fn rebuild(manifest_path: &Path, out_path: &Path) -> Result<u64> {
    let mf = manifest::read(manifest_path)?;
    let store = ChunkStore::open(chunk_dir(manifest_path));

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ChunkError::io("create dir", parent, e))?;
    }
    let partial = partial_sibling(out_path);
    let res = (|| -> Result<u64> {
        let f = File::create(&partial).map_err(|e| ChunkError::io("create", &partial, e))?;
        let mut w = BufWriter::new(f);
        let mut hasher = StreamHasher::new();
        let mut written = 0u64;
        for entry in &mf.chunks {
            let bytes = store.load_verified(entry).map_err(|e| ChunkError::RebuildIncomplete {
                reason: format!("chunk {} unreadable", entry.index),
                cause: Some(Box::new(e)),
            })?;
            w.write_all(&bytes).map_err(|e| ChunkError::io("write", &partial, e))?;
            hasher.update(&bytes);
            written += bytes.len() as u64;
        }
        if written != mf.source_size {
            return Err(ChunkError::RebuildIncomplete {
                reason: format!("wrote {} bytes, manifest says {}", written, mf.source_size),
                cause: None,
            });
        }
        if hasher.finalize() != mf.source_hash {
            return Err(ChunkError::RebuildIncomplete {
                reason: "whole-file digest mismatch".into(),
                cause: None,
            });
        }
        let f = w.into_inner().map_err(|e| ChunkError::io("flush", &partial, e.into_error()))?;
        f.sync_all().map_err(|e| ChunkError::io("sync", &partial, e))?;
        Ok(written)
    })();

    match res {
        Ok(written) => {
            fs::rename(&partial, out_path).map_err(|e| {
                let _ = fs::remove_file(&partial);
                ChunkError::io("rename", out_path, e)
            })?;
            log::info!("rebuilt {:?}: {} bytes from {} chunk(s)", out_path, written, mf.chunks.len());
            Ok(written)
        }
        Err(e) => {
            log::warn!("rebuild of {:?} failed, removing partial output", out_path);
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}
