use gzchunk_core::manifest::{self, StorageForm};
use gzchunk_core::{chunk, rebuild, stats, ChunkConfig};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fs;

fn cfg(chunk_size: usize) -> ChunkConfig {
    ChunkConfig { chunk_size, ..Default::default() }
}

#[test]
fn ten_repeated_bytes_in_chunks_of_four() {
    let td = tempfile::tempdir().unwrap();
    let src = td.path().join("ten.bin");
    fs::write(&src, [b'a'; 10]).unwrap();
    let out = td.path().join("chunks_ten");

    let mf = chunk(&src, &out, &ChunkConfig { chunk_size: 4, level: 6, min_gain: 0.02, overwrite: false })
        .unwrap();
    let sizes: Vec<u64> = mf.chunks.iter().map(|c| c.original_size).collect();
    assert_eq!(sizes, vec![4, 4, 2]);

    let st = stats(&manifest::manifest_path(&out)).unwrap();
    assert_eq!(st.total_chunks, 3);
    assert_eq!(st.source_size, 10);
    assert_eq!(st.missing_files, 0);

    let rebuilt = td.path().join("ten.out");
    assert_eq!(rebuild(&manifest::manifest_path(&out), &rebuilt).unwrap(), 10);
    assert_eq!(fs::read(&rebuilt).unwrap(), [b'a'; 10]);
}

#[test]
fn repetitive_source_is_stored_gzipped() {
    let td = tempfile::tempdir().unwrap();
    let src = td.path().join("rep.bin");
    fs::write(&src, vec![b'a'; 10_000]).unwrap();
    let out = td.path().join("chunks_rep");

    let mf = chunk(&src, &out, &cfg(4096)).unwrap();
    assert_eq!(mf.chunks.len(), 3);
    assert!(mf.chunks.iter().all(|c| c.form == StorageForm::Compressed));
    assert!(out.join("rep.part000000.gz").exists());
    assert!(out.join("rep.part000002.gz").exists());

    let st = stats(&manifest::manifest_path(&out)).unwrap();
    assert_eq!(st.compressed.chunks, 3);
    assert_eq!(st.raw.chunks, 0);
    assert!(st.compression_ratio < 0.1, "ratio {}", st.compression_ratio);
    assert_eq!(st.on_disk_bytes, st.stored_size_total);
}

#[test]
fn random_source_stays_raw() {
    let td = tempfile::tempdir().unwrap();
    let src = td.path().join("rnd.bin");
    let mut rng = StdRng::seed_from_u64(7);
    let data: Vec<u8> = (0..1000).map(|_| rng.gen()).collect();
    fs::write(&src, &data).unwrap();

    for chunk_size in [100usize, 333, 1000, 4096] {
        let out = td.path().join(format!("chunks_{chunk_size}"));
        let mf = chunk(&src, &out, &cfg(chunk_size)).unwrap();
        assert!(mf.chunks.iter().all(|c| c.form == StorageForm::Raw));
        let st = stats(&manifest::manifest_path(&out)).unwrap();
        assert!((st.compression_ratio - 1.0).abs() < 1e-9, "ratio {}", st.compression_ratio);
        assert_eq!(st.raw.stored_bytes, 1000);
    }
}

#[test]
fn empty_source_yields_empty_manifest() {
    let td = tempfile::tempdir().unwrap();
    let src = td.path().join("empty.bin");
    fs::write(&src, b"").unwrap();
    let out = td.path().join("chunks_empty");

    let mf = chunk(&src, &out, &cfg(16)).unwrap();
    assert!(mf.chunks.is_empty());
    assert_eq!(mf.source_size, 0);

    let rebuilt = td.path().join("empty.out");
    assert_eq!(rebuild(&manifest::manifest_path(&out), &rebuilt).unwrap(), 0);
    assert_eq!(fs::read(&rebuilt).unwrap(), b"");
}

#[test]
fn manifest_on_disk_matches_returned_value() {
    let td = tempfile::tempdir().unwrap();
    let src = td.path().join("doc.txt");
    let text = "the quick brown fox jumps over the lazy dog\n".repeat(200);
    fs::write(&src, &text).unwrap();
    let out = td.path().join("store");

    let mf = chunk(&src, &out, &cfg(1024)).unwrap();
    let on_disk = manifest::read_from_dir(&out).unwrap();
    assert_eq!(on_disk, mf);
    assert_eq!(on_disk.source_name, "doc.txt");
    assert_eq!(on_disk.chunk_size, 1024);
    assert_eq!(on_disk.compression_level, 6);

    // Field names are part of the on-disk format.
    let v: serde_json::Value =
        serde_json::from_slice(&fs::read(manifest::manifest_path(&out)).unwrap()).unwrap();
    for key in ["source_name", "source_size", "chunk_size", "compression_level", "min_gain", "chunks"] {
        assert!(v.get(key).is_some(), "missing {key}");
    }
    let first = &v["chunks"][0];
    for key in ["index", "original_size", "stored_size", "form", "hash", "file_name"] {
        assert!(first.get(key).is_some(), "missing chunks[0].{key}");
    }
    assert_eq!(first["form"], "compressed");
}

#[test]
fn window_larger_than_memory_is_fine_for_small_files() {
    let td = tempfile::tempdir().unwrap();
    let src = td.path().join("small.bin");
    fs::write(&src, b"0123456789").unwrap();
    let out = td.path().join("chunks_small");

    let mf = chunk(&src, &out, &cfg(usize::MAX >> 1)).unwrap();
    assert_eq!(mf.chunks.len(), 1);
    assert_eq!(mf.chunks[0].original_size, 10);
    assert_eq!(mf.chunk_size, (usize::MAX >> 1) as u64);

    let rebuilt = td.path().join("small.out");
    rebuild(&manifest::manifest_path(&out), &rebuilt).unwrap();
    assert_eq!(fs::read(&rebuilt).unwrap(), b"0123456789");
}

#[test]
fn stats_counts_missing_chunk_files() {
    let td = tempfile::tempdir().unwrap();
    let src = td.path().join("gone.bin");
    let mut rng = StdRng::seed_from_u64(21);
    let mut data = vec![b'g'; 4096];
    data.extend((0..4096).map(|_| rng.gen::<u8>()));
    fs::write(&src, &data).unwrap();
    let out = td.path().join("chunks_gone");
    let mf = chunk(&src, &out, &cfg(2048)).unwrap();

    let before = stats(&manifest::manifest_path(&out)).unwrap();
    assert_eq!(before.on_disk_bytes, mf.stored_size_total);
    assert_eq!(before.missing_files, 0);

    let removed = &mf.chunks[2];
    fs::remove_file(out.join(&removed.file_name)).unwrap();

    let after = stats(&manifest::manifest_path(&out)).unwrap();
    assert_eq!(after.missing_files, 1);
    assert_eq!(after.on_disk_bytes, mf.stored_size_total - removed.stored_size);
    // manifest-derived totals are unaffected
    assert_eq!(after.stored_size_total, mf.stored_size_total);
    assert_eq!(after.total_chunks, 4);
}
