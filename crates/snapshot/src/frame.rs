//! Single zstd frame wrapping a whole snapshot.
//!
//! The compressor always records the decompressed size in the frame header and
//! appends the frame checksum. The decompressor trusts nothing else: it reads
//! the declared size, allocates exactly that much, and requires the payload to
//! fill it.

use std::io;

use thiserror::Error;
use zstd::zstd_safe;

/// Decompressed size above which a frame is refused before allocating.
pub const MAX_CONTENT_SIZE: u64 = 1 << 36;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame does not declare its decompressed size")]
    UnknownSize,
    #[error("decompressed size unavailable: not a zstd frame header")]
    SizeUnavailable,
    #[error("declared size {declared} exceeds limit {limit}")]
    TooLarge { declared: u64, limit: u64 },
    #[error("corrupt frame: {0}")]
    Corrupt(#[source] io::Error),
    #[error("frame expanded to {actual} bytes, header declared {declared}")]
    SizeMismatch { declared: u64, actual: u64 },
    #[error("compression failed: {0}")]
    Compress(#[source] io::Error),
}

/// Compresses `data` into one frame carrying its content size and checksum.
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>, FrameError> {
    let mut compressor = zstd::bulk::Compressor::new(level).map_err(FrameError::Compress)?;
    compressor
        .include_checksum(true)
        .map_err(FrameError::Compress)?;
    compressor
        .include_contentsize(true)
        .map_err(FrameError::Compress)?;
    compressor.compress(data).map_err(FrameError::Compress)
}

/// Decompressed size recorded in the header of `frame`.
///
/// # Errors
///
/// - [`FrameError::UnknownSize`] if the frame omits its size.
/// - [`FrameError::SizeUnavailable`] if `frame` does not start with a valid
///   frame header.
pub fn declared_size(frame: &[u8]) -> Result<u64, FrameError> {
    match zstd_safe::get_frame_content_size(frame) {
        Ok(Some(size)) => Ok(size),
        Ok(None) => Err(FrameError::UnknownSize),
        Err(_) => Err(FrameError::SizeUnavailable),
    }
}

/// Decompresses a frame produced by [`compress`].
pub fn decompress(frame: &[u8]) -> Result<Vec<u8>, FrameError> {
    decompress_limited(frame, MAX_CONTENT_SIZE)
}

/// Like [`decompress`], refusing frames that declare more than `limit` bytes.
pub fn decompress_limited(frame: &[u8], limit: u64) -> Result<Vec<u8>, FrameError> {
    let declared = declared_size(frame)?;
    if declared > limit {
        return Err(FrameError::TooLarge { declared, limit });
    }
    let capacity = usize::try_from(declared).map_err(|_| FrameError::TooLarge {
        declared,
        limit: usize::MAX as u64,
    })?;

    let data = zstd::bulk::decompress(frame, capacity).map_err(FrameError::Corrupt)?;
    if data.len() as u64 != declared {
        return Err(FrameError::SizeMismatch {
            declared,
            actual: data.len() as u64,
        });
    }
    Ok(data)
}
