use crate::error::Result;
use crate::manifest::{self, chunk_dir, Manifest, StorageForm};
use crate::store::ChunkStore;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormTotals {
    pub chunks: u64,
    pub original_bytes: u64,
    pub stored_bytes: u64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct StatsReport {
    pub source_name: String,
    pub source_size: u64,
    pub chunk_size: u64,
    pub compression_level: u32,
    pub min_gain: f64,
    pub total_chunks: u64,
    pub raw: FormTotals,
    pub compressed: FormTotals,
    pub stored_size_total: u64,
    /// `stored_size_total / source_size`; 0.0 for an empty source.
    pub compression_ratio: f64,
    pub avg_chunk_size: f64,
    /// Bytes of chunk files actually present on disk.
    pub on_disk_bytes: u64,
    pub missing_files: u64,
}

/// Aggregate a manifest without touching chunk contents.
pub fn summarize(mf: &Manifest) -> StatsReport {
    let mut raw = FormTotals::default();
    let mut compressed = FormTotals::default();
    for c in &mf.chunks {
        let t = match c.form {
            StorageForm::Raw => &mut raw,
            StorageForm::Compressed => &mut compressed,
        };
        t.chunks += 1;
        t.original_bytes += c.original_size;
        t.stored_bytes += c.stored_size;
    }
    let total_chunks = mf.chunks.len() as u64;
    let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    StatsReport {
        source_name: mf.source_name.clone(),
        source_size: mf.source_size,
        chunk_size: mf.chunk_size,
        compression_level: mf.compression_level,
        min_gain: mf.min_gain,
        total_chunks,
        raw,
        compressed,
        stored_size_total: mf.stored_size_total,
        compression_ratio: ratio(mf.stored_size_total, mf.source_size),
        avg_chunk_size: ratio(mf.source_size, total_chunks),
        on_disk_bytes: 0,
        missing_files: 0,
    }
}

/// Load the manifest at `manifest_path` and summarize it, including on-disk file sizes.
pub fn stats(manifest_path: &Path) -> Result<StatsReport> {
    let mf = manifest::read(manifest_path)?;
    let store = ChunkStore::open(chunk_dir(manifest_path));
    let mut report = summarize(&mf);
    for c in &mf.chunks {
        match store.stored_len(c) {
            Some(n) => report.on_disk_bytes += n,
            None => report.missing_files += 1,
        }
    }
    Ok(report)
}
