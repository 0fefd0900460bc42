use crate::codec::{Decoder, Encoder, Outcome};
use crate::error::{Error, Result};
use libdeflate_sys::{
    libdeflate_alloc_compressor, libdeflate_alloc_decompressor, libdeflate_compressor,
    libdeflate_decompressor, libdeflate_free_compressor, libdeflate_free_decompressor,
    libdeflate_gzip_compress, libdeflate_gzip_compress_bound, libdeflate_gzip_decompress_ex,
    libdeflate_result, libdeflate_result_LIBDEFLATE_BAD_DATA,
    libdeflate_result_LIBDEFLATE_INSUFFICIENT_SPACE, libdeflate_result_LIBDEFLATE_SUCCESS,
};
use std::ptr::NonNull;

pub const MIN_LEVEL: i32 = 0;
pub const MAX_LEVEL: i32 = 12;
pub const DEFAULT_LEVEL: i32 = 6;

/// A libdeflate compressor producing single-member gzip streams.
pub struct GzipCompressor {
    handle: NonNull<libdeflate_compressor>,
    level: i32,
}

impl GzipCompressor {
    pub fn new(level: i32) -> Result<Self> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(Error::InvalidConfiguration(format!(
                "compression level {level} is outside {MIN_LEVEL}..={MAX_LEVEL}"
            )));
        }
        let handle = unsafe { libdeflate_alloc_compressor(level) };
        match NonNull::new(handle) {
            Some(handle) => Ok(GzipCompressor { handle, level }),
            None => Err(Error::SessionAllocation("libdeflate compressor")),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

// libdeflate handles have no thread affinity.
unsafe impl Send for GzipCompressor {}

impl Drop for GzipCompressor {
    fn drop(&mut self) {
        unsafe {
            libdeflate_free_compressor(self.handle.as_ptr());
        }
    }
}

impl Encoder for GzipCompressor {
    fn compressed_len_bound(&mut self, uncompressed_len: usize) -> usize {
        unsafe { libdeflate_gzip_compress_bound(self.handle.as_ptr(), uncompressed_len) }
    }

    fn compress(&mut self, src: &[u8], dest: &mut [u8]) -> usize {
        unsafe {
            libdeflate_gzip_compress(
                self.handle.as_ptr(),
                src.as_ptr() as *const _,
                src.len(),
                dest.as_mut_ptr() as *mut _,
                dest.len(),
            )
        }
    }
}

/// A libdeflate decompressor for gzip streams.
pub struct GzipDecompressor {
    handle: NonNull<libdeflate_decompressor>,
}

impl GzipDecompressor {
    pub fn new() -> Result<Self> {
        let handle = unsafe { libdeflate_alloc_decompressor() };
        match NonNull::new(handle) {
            Some(handle) => Ok(GzipDecompressor { handle }),
            None => Err(Error::SessionAllocation("libdeflate decompressor")),
        }
    }
}

// libdeflate handles have no thread affinity.
unsafe impl Send for GzipDecompressor {}

impl Drop for GzipDecompressor {
    fn drop(&mut self) {
        unsafe {
            libdeflate_free_decompressor(self.handle.as_ptr());
        }
    }
}

impl Decoder for GzipDecompressor {
    fn decompress(&mut self, src: &[u8], dest: &mut [u8]) -> Outcome {
        let mut consumed = 0_usize;
        let mut produced = 0_usize;
        let result = unsafe {
            libdeflate_gzip_decompress_ex(
                self.handle.as_ptr(),
                src.as_ptr() as *const _,
                src.len(),
                dest.as_mut_ptr() as *mut _,
                dest.len(),
                &mut consumed,
                &mut produced,
            )
        };
        outcome(result, consumed, produced)
    }
}

// LIBDEFLATE_SHORT_OUTPUT (2) is only reported when no output length
// pointer is passed, so `GzipDecompressor::decompress` never sees it.
fn outcome(status: libdeflate_result, consumed: usize, produced: usize) -> Outcome {
    match status {
        libdeflate_result_LIBDEFLATE_SUCCESS => Outcome::Success { consumed, produced },
        libdeflate_result_LIBDEFLATE_BAD_DATA => Outcome::BadData,
        libdeflate_result_LIBDEFLATE_INSUFFICIENT_SPACE => Outcome::InsufficientSpace,
        other => unreachable!("libdeflate_gzip_decompress_ex returned unexpected status {other}"),
    }
}
