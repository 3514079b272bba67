use crate::config::{MANIFEST_FILE_NAME, MANIFEST_VERSION};
use crate::error::{ChunkError, Result};
use crate::hasher::Digest;
use crate::path_safety;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// How a chunk's bytes are kept on disk.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StorageForm {
    Raw,
    #[serde(alias = "gzip")]
    Compressed,
}

impl StorageForm {
    pub fn extension(self) -> &'static str {
        match self {
            StorageForm::Raw => "raw",
            StorageForm::Compressed => "gz",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChunkEntry {
    pub index: u64,
    pub original_size: u64,
    pub stored_size: u64,
    pub form: StorageForm,
    /// Digest of the uncompressed chunk bytes.
    pub hash: Digest,
    /// Digest of the bytes written to `file_name`.
    pub stored_hash: Digest,
    pub file_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Manifest {
    pub version: u32,
    pub created_utc: String,
    /// Base name of the chunked file. Informational only, never used as a path.
    pub source_name: String,
    pub source_size: u64,
    pub source_hash: Digest,
    pub chunk_size: u64,
    pub compression_level: u32,
    pub min_gain: f64,
    pub stored_size_total: u64,
    pub chunks: Vec<ChunkEntry>,
}

/// Deterministic chunk file name: `<stem>.partNNNNNN.<raw|gz>`.
pub fn chunk_file_name(stem: &str, index: u64, form: StorageForm) -> String {
    format!("{}.part{:06}.{}", stem, index, form.extension())
}

/// Location of the manifest inside a chunk directory.
pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE_NAME)
}

/// Directory holding the chunk files: the manifest's parent.
pub fn chunk_dir(manifest_path: &Path) -> &Path {
    manifest_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."))
}

/// Accept either a chunk directory or a manifest file path.
pub fn locate(path: &Path) -> PathBuf {
    if path.is_dir() {
        manifest_path(path)
    } else {
        path.to_path_buf()
    }
}

/// Serialize `manifest` to `path`, replacing any existing file.
///
/// The document is written to a sibling temp file and renamed, so readers never see a
/// half-written manifest.
pub fn write(manifest: &Manifest, path: &Path) -> Result<()> {
    let tmp = tmp_sibling(path);
    let res = (|| -> Result<()> {
        let f = File::create(&tmp).map_err(|e| ChunkError::io("create", &tmp, e))?;
        let mut w = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut w, manifest)
            .map_err(|e| ChunkError::io("write", &tmp, e.into()))?;
        w.write_all(b"\n").map_err(|e| ChunkError::io("write", &tmp, e))?;
        let f = w.into_inner().map_err(|e| ChunkError::io("flush", &tmp, e.into_error()))?;
        f.sync_all().map_err(|e| ChunkError::io("sync", &tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| ChunkError::io("rename", path, e))
    })();
    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res
}

/// Parse and validate the manifest at `path`.
pub fn read(path: &Path) -> Result<Manifest> {
    let f = File::open(path).map_err(|e| ChunkError::io("open", path, e))?;
    let mf: Manifest = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
        if e.is_io() {
            ChunkError::io("read", path, e.into())
        } else {
            ChunkError::ManifestMalformed(format!("{}: {}", path.display(), e))
        }
    })?;
    mf.validate()?;
    Ok(mf)
}

/// Read `manifest.json` from a chunk directory.
pub fn read_from_dir(dir: &Path) -> Result<Manifest> {
    read(&manifest_path(dir))
}

impl Manifest {
    /// Check the structural invariants rebuild and verify rely on.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(ChunkError::ManifestMalformed(msg));
        if self.version != MANIFEST_VERSION {
            return bad(format!("unsupported version {} (expected {})", self.version, MANIFEST_VERSION));
        }
        if self.chunk_size == 0 {
            return bad("chunk_size is 0".into());
        }
        let last = self.chunks.len().saturating_sub(1);
        let mut original_total = 0u64;
        let mut stored_total = 0u64;
        for (pos, c) in self.chunks.iter().enumerate() {
            if c.index != pos as u64 {
                return bad(format!("chunk at position {} has index {}", pos, c.index));
            }
            if c.original_size == 0 || c.original_size > self.chunk_size {
                return bad(format!("chunk {}: original_size {} out of range", c.index, c.original_size));
            }
            if pos != last && c.original_size != self.chunk_size {
                return bad(format!(
                    "chunk {}: only the last chunk may be shorter than chunk_size",
                    c.index
                ));
            }
            match c.form {
                StorageForm::Raw if c.stored_size != c.original_size => {
                    return bad(format!("chunk {}: raw chunk with stored_size != original_size", c.index));
                }
                StorageForm::Compressed if c.stored_size > c.original_size => {
                    return bad(format!("chunk {}: compressed chunk larger than original", c.index));
                }
                _ => {}
            }
            if let Err(msg) = path_safety::check_file_name(&c.file_name) {
                return bad(format!("chunk {}: {}", c.index, msg));
            }
            let suffix = format!(".part{:06}.{}", c.index, c.form.extension());
            if !c.file_name.ends_with(&suffix) {
                return bad(format!("chunk {}: file name {:?} does not match index/form", c.index, c.file_name));
            }
            original_total += c.original_size;
            stored_total += c.stored_size;
        }
        if original_total != self.source_size {
            return bad(format!(
                "sum of original_size {} != source_size {}",
                original_total, self.source_size
            ));
        }
        if stored_total != self.stored_size_total {
            return bad(format!(
                "sum of stored_size {} != stored_size_total {}",
                stored_total, self.stored_size_total
            ));
        }
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) fn partial_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
