use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use gzchunk_core::config::{DEFAULT_CHUNK_SIZE, DEFAULT_LEVEL, DEFAULT_MIN_GAIN};
use gzchunk_core::manifest;
use gzchunk_core::stats::StatsReport;
use gzchunk_core::verify::VerifyReport;
use gzchunk_core::ChunkConfig;

/// Exit code for a verify run that found damaged chunks.
const EXIT_VERIFY_FAILED: u8 = 2;

#[derive(Parser)]
#[command(name = "gzchunk", version, about = "Fixed-size chunking with conditional gzip, manifest and verify")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Split a file into chunks and write manifest.json
    Chunk {
        source: PathBuf,
        /// Output directory (default: chunks_<stem> next to the source)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Chunk size in bytes
        #[arg(long = "chunk", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Gzip level
        #[arg(long, default_value_t = DEFAULT_LEVEL, value_parser = clap::value_parser!(u32).range(1..=9))]
        level: u32,
        /// Minimum fractional saving required to store a chunk gzipped
        #[arg(long, default_value_t = DEFAULT_MIN_GAIN)]
        min_gain: f64,
        /// Replace an existing chunk store in the output directory
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Check every chunk against the manifest
    Verify {
        /// Chunk directory or manifest.json path
        dir: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Reassemble the original file
    Rebuild {
        /// Chunk directory or manifest.json path
        dir: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Summarize a chunk store
    Stats {
        /// Chunk directory or manifest.json path
        dir: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Cmd::Chunk { source, out, chunk_size, level, min_gain, force } => {
            let cfg = ChunkConfig { chunk_size, level, min_gain, overwrite: force };
            log::debug!("chunk config: {:?}", cfg);
            chunk(&source, out, &cfg)?;
        }
        Cmd::Verify { dir, json } => {
            if !verify(&dir, json)? {
                return Ok(ExitCode::from(EXIT_VERIFY_FAILED));
            }
        }
        Cmd::Rebuild { dir, out } => rebuild(&dir, &out)?,
        Cmd::Stats { dir, json } => stats(&dir, json)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn chunk(source: &Path, out: Option<PathBuf>, cfg: &ChunkConfig) -> Result<()> {
    let dir = out.unwrap_or_else(|| gzchunk_core::default_output_dir(source));
    let mf = gzchunk_core::chunk(source, &dir, cfg)
        .with_context(|| format!("chunk {}", source.display()))?;
    let compressed = mf.chunks.iter().filter(|c| c.form == manifest::StorageForm::Compressed).count();
    println!(
        "OK: {} chunk(s) ({} gzip, {} raw) in {}",
        mf.chunks.len(),
        compressed,
        mf.chunks.len() - compressed,
        dir.display()
    );
    println!("OK: manifest at {}", manifest::manifest_path(&dir).display());
    Ok(())
}

fn verify(dir: &Path, json: bool) -> Result<bool> {
    let mpath = manifest::locate(dir);
    let report = gzchunk_core::verify(&mpath).with_context(|| format!("verify {}", dir.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_verify(&report);
    }
    Ok(report.passed())
}

fn print_verify(r: &VerifyReport) {
    let whole = match r.source_hash_ok {
        Some(true) => "OK",
        Some(false) => "MISMATCH",
        None => "n/a",
    };
    if r.passed() {
        println!("OK: {}/{} chunk(s) intact; file digest {}", r.chunks_ok, r.chunks_total, whole);
        return;
    }
    println!(
        "FAIL: {} of {} chunk(s) failed; file digest {}",
        r.failures.len(),
        r.chunks_total,
        whole
    );
    for f in &r.failures {
        println!("  chunk {:6}: {:?} ({})", f.index, f.kind, f.detail);
    }
}

fn rebuild(dir: &Path, out: &Path) -> Result<()> {
    let mpath = manifest::locate(dir);
    let n = gzchunk_core::rebuild(&mpath, out)
        .with_context(|| format!("rebuild {} -> {}", dir.display(), out.display()))?;
    println!("OK: rebuilt {} ({} bytes)", out.display(), n);
    Ok(())
}

fn stats(dir: &Path, json: bool) -> Result<()> {
    let mpath = manifest::locate(dir);
    let report = gzchunk_core::stats(&mpath).with_context(|| format!("stats {}", dir.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_stats(&report);
    }
    Ok(())
}

fn print_stats(r: &StatsReport) {
    println!(
        "STATS: total_chunks={} raw={} gzip={} chunk_size={} source_size={} stored_size={} ratio={:.2}",
        r.total_chunks,
        r.raw.chunks,
        r.compressed.chunks,
        r.chunk_size,
        r.source_size,
        r.stored_size_total,
        r.compression_ratio
    );
    println!(
        "  raw:  {} chunk(s), {} bytes",
        r.raw.chunks, r.raw.stored_bytes
    );
    println!(
        "  gzip: {} chunk(s), {} -> {} bytes",
        r.compressed.chunks, r.compressed.original_bytes, r.compressed.stored_bytes
    );
    println!("  avg chunk size: {:.1} bytes", r.avg_chunk_size);
    if r.missing_files > 0 {
        println!("  on disk: {} bytes, {} chunk file(s) missing", r.on_disk_bytes, r.missing_files);
    } else {
        println!("  on disk: {} bytes", r.on_disk_bytes);
    }
}
