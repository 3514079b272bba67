use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Gzip-compress `bytes` at `level` (1 = fastest, 9 = smallest).
pub fn compress(bytes: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::with_capacity(bytes.len() / 2 + 32), Compression::new(level));
    enc.write_all(bytes)?;
    enc.finish()
}

/// Inflate a gzip member produced by [`compress`], producing at most `limit + 1` bytes.
///
/// Output past `limit` is cut off there, so an over-long member comes back one byte too
/// long instead of being inflated in full. Any framing or checksum error is returned as
/// the underlying `io::Error`; callers map it to corrupt data.
pub fn decompress(bytes: &[u8], limit: u64) -> io::Result<Vec<u8>> {
    let hint = limit.min(bytes.len() as u64 * 4) as usize;
    let mut out = Vec::with_capacity(hint);
    GzDecoder::new(bytes).take(limit.saturating_add(1)).read_to_end(&mut out)?;
    Ok(out)
}
