use crate::config::{ChunkConfig, MANIFEST_FILE_NAME, MANIFEST_VERSION};
use crate::error::{ChunkError, Result};
use crate::hasher::StreamHasher;
use crate::manifest::{self, ChunkEntry, Manifest};
use crate::store::ChunkStore;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

/// `chunks_<stem>` next to the source file.
pub fn default_output_dir(source: &Path) -> PathBuf {
    let stem = source_stem(source);
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("chunks_{stem}"))
}

fn source_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string())
}

/// Split `source` into fixed windows, store each under `out_dir` and persist the manifest.
///
/// The manifest is written last; if any window fails, the chunk files written so far are
/// removed and no manifest appears.
pub fn chunk(source: &Path, out_dir: &Path, cfg: &ChunkConfig) -> Result<Manifest> {
    cfg.validate()?;
    let meta = fs::metadata(source).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ChunkError::SourceNotFound(source.to_path_buf()),
        _ => ChunkError::io("stat", source, e),
    })?;
    if !meta.is_file() {
        return Err(ChunkError::SourceNotFound(source.to_path_buf()));
    }

    prepare_output_dir(out_dir, cfg.overwrite)?;
    let stem = source_stem(source);
    let store = ChunkStore::new(out_dir, stem);

    let mut written: Vec<PathBuf> = Vec::new();
    let res = split_and_store(source, &store, cfg, &mut written);
    let (chunks, source_size, source_hash) = match res {
        Ok(v) => v,
        Err(e) => {
            log::warn!("chunking {:?} failed, removing {} partial chunk file(s)", source, written.len());
            for p in &written {
                let _ = fs::remove_file(p);
            }
            return Err(e);
        }
    };

    let stored_size_total = chunks.iter().map(|c| c.stored_size).sum();
    let manifest = Manifest {
        version: MANIFEST_VERSION,
        created_utc: chrono::Utc::now().to_rfc3339(),
        source_name: source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        source_size,
        source_hash,
        chunk_size: cfg.chunk_size as u64,
        compression_level: cfg.level,
        min_gain: cfg.min_gain,
        stored_size_total,
        chunks,
    };
    if let Err(e) = manifest::write(&manifest, &manifest::manifest_path(out_dir)) {
        for p in &written {
            let _ = fs::remove_file(p);
        }
        return Err(e);
    }
    log::info!(
        "chunked {:?}: {} bytes into {} chunk(s), {} bytes stored under {:?}",
        source,
        manifest.source_size,
        manifest.chunks.len(),
        manifest.stored_size_total,
        out_dir
    );
    Ok(manifest)
}

fn split_and_store(
    source: &Path,
    store: &ChunkStore,
    cfg: &ChunkConfig,
    written: &mut Vec<PathBuf>,
) -> Result<(Vec<ChunkEntry>, u64, crate::hasher::Digest)> {
    let mut f = File::open(source).map_err(|e| ChunkError::io("open", source, e))?;
    let mut hasher = StreamHasher::new();
    let mut chunks = Vec::new();
    let mut total = 0u64;
    let mut buf = Vec::new();
    let mut index = 0u64;
    loop {
        let n = read_window(&mut f, cfg.chunk_size, &mut buf).map_err(|e| ChunkError::io("read", source, e))?;
        if n == 0 {
            break;
        }
        let window = &buf[..n];
        hasher.update(window);
        let entry = store.store_chunk(window, index, cfg.level, cfg.min_gain)?;
        written.push(store.dir().join(&entry.file_name));
        chunks.push(entry);
        total += n as u64;
        index += 1;
        if n < cfg.chunk_size {
            break;
        }
    }
    Ok((chunks, total, hasher.finalize()))
}

/// Replace `buf` with the next window of at most `limit` bytes; returns its length.
///
/// The buffer only grows as bytes arrive, so `limit` may exceed the file size.
fn read_window(r: &mut impl Read, limit: usize, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    buf.clear();
    r.by_ref().take(limit as u64).read_to_end(buf)
}

/// `<anything>.partNNNNNN.<raw|gz>` with at least six index digits.
pub fn is_chunk_file_name(name: &str) -> bool {
    let Some(rest) = name.strip_suffix(".raw").or_else(|| name.strip_suffix(".gz")) else {
        return false;
    };
    let Some(pos) = rest.rfind(".part") else {
        return false;
    };
    let digits = &rest[pos + ".part".len()..];
    digits.len() >= 6 && digits.bytes().all(|b| b.is_ascii_digit())
}

fn prepare_output_dir(dir: &Path, overwrite: bool) -> Result<()> {
    match fs::read_dir(dir) {
        Ok(entries) => {
            let mut stale = Vec::new();
            for ent in entries {
                let ent = ent.map_err(|e| ChunkError::io("list", dir, e))?;
                let name = ent.file_name();
                let name = name.to_string_lossy();
                if name == MANIFEST_FILE_NAME || is_chunk_file_name(&name) {
                    stale.push(ent.path());
                }
            }
            if stale.is_empty() {
                return Ok(());
            }
            if !overwrite {
                return Err(ChunkError::OutputExists(dir.to_path_buf()));
            }
            log::info!("replacing existing chunk store in {:?} ({} file(s))", dir, stale.len());
            for p in stale {
                fs::remove_file(&p).map_err(|e| ChunkError::io("remove", &p, e))?;
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| ChunkError::io("create dir", dir, e))
        }
        Err(e) => Err(ChunkError::io("open dir", dir, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dir_sits_next_to_source() {
        assert_eq!(
            default_output_dir(Path::new("/data/movie.mkv")),
            PathBuf::from("/data/chunks_movie")
        );
        assert_eq!(default_output_dir(Path::new("notes")), PathBuf::from("chunks_notes"));
    }

    #[test]
    fn chunk_file_names_are_recognised() {
        assert!(is_chunk_file_name("movie.part000000.gz"));
        assert!(is_chunk_file_name("a.b.part1234567.raw"));
        assert!(!is_chunk_file_name("movie.part00.gz"));
        assert!(!is_chunk_file_name("movie.part000000.zip"));
        assert!(!is_chunk_file_name("readme.txt"));
    }

    #[test]
    fn read_window_fills_across_short_reads() {
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = self.0.len().min(buf.len()).min(3);
                buf[..n].copy_from_slice(&self.0[..n]);
                self.0 = &self.0[n..];
                Ok(n)
            }
        }
        let mut r = Trickle(b"abcdefghij");
        let mut buf = Vec::new();
        assert_eq!(read_window(&mut r, 8, &mut buf).unwrap(), 8);
        assert_eq!(buf, b"abcdefgh");
        assert_eq!(read_window(&mut r, 8, &mut buf).unwrap(), 2);
        assert_eq!(buf, b"ij");
        assert_eq!(read_window(&mut r, 8, &mut buf).unwrap(), 0);
    }
}
