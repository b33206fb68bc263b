//! Payload decompression for source tiles.
//!
//! Cached vector tiles are frequently stored gzip- or zlib-compressed.
//! Compression is detected from the stream's magic bytes; uncompressed
//! payloads pass through without copying. A payload that looks compressed
//! but fails to inflate is a request-level decode error, never a skip.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::{Error, Result};

/// Check for the gzip magic bytes (`1f 8b`).
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() > 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Check for a zlib stream header (`78` followed by a valid flag byte).
pub fn is_zlib(data: &[u8]) -> bool {
    data.len() > 2
        && data[0] == 0x78
        && matches!(data[1], 0x9c | 0x01 | 0xda | 0x5e)
}

/// Check whether a payload carries a known compressed-stream signature.
pub fn is_compressed(data: &[u8]) -> bool {
    is_gzip(data) || is_zlib(data)
}

/// Decompress a tile payload if it is gzip or zlib compressed.
///
/// Uncompressed payloads are returned borrowed (zero-copy). Malformed
/// compressed data surfaces as [`Error::Decode`].
pub fn decompress(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    if is_gzip(data) {
        let mut buffer = Vec::with_capacity(data.len() * 4);
        GzDecoder::new(data)
            .read_to_end(&mut buffer)
            .map_err(|e| Error::Decode(format!("corrupt gzip payload: {}", e)))?;
        Ok(Cow::Owned(buffer))
    } else if is_zlib(data) {
        let mut buffer = Vec::with_capacity(data.len() * 4);
        ZlibDecoder::new(data)
            .read_to_end(&mut buffer)
            .map_err(|e| Error::Decode(format!("corrupt zlib payload: {}", e)))?;
        Ok(Cow::Owned(buffer))
    } else {
        Ok(Cow::Borrowed(data))
    }
}
