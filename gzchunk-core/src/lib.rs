pub mod chunk;
pub mod compress;
pub mod config;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod path_safety;
pub mod rebuild;
pub mod stats;
pub mod store;
pub mod verify;

pub use chunk::{chunk, default_output_dir};
pub use config::ChunkConfig;
pub use error::{ChunkError, Result};
pub use rebuild::rebuild;
pub use stats::stats;
pub use verify::verify;
