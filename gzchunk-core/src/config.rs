use crate::error::{ChunkError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;
pub const DEFAULT_LEVEL: u32 = 6;
pub const DEFAULT_MIN_GAIN: f64 = 0.02;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

/// Parameters for a single `chunk` run.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkConfig {
    /// Fixed window size in bytes; the final window may be shorter.
    pub chunk_size: usize,
    /// Gzip effort, 1..=9.
    pub level: u32,
    /// Fraction of the raw size compression must save for a chunk to be stored gzipped.
    pub min_gain: f64,
    /// Replace an existing chunk store in the output directory.
    pub overwrite: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            level: DEFAULT_LEVEL,
            min_gain: DEFAULT_MIN_GAIN,
            overwrite: false,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkError::InvalidParameters("chunk size must be > 0".into()));
        }
        if !(1..=9).contains(&self.level) {
            return Err(ChunkError::InvalidParameters(format!(
                "compression level {} outside 1..=9",
                self.level
            )));
        }
        // NaN fails both comparisons
        if !(self.min_gain >= 0.0 && self.min_gain < 1.0) {
            return Err(ChunkError::InvalidParameters(format!(
                "min gain {} outside [0, 1)",
                self.min_gain
            )));
        }
        Ok(())
    }
}
