pub mod gzip;

/// Result of one bounded decompression call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success { consumed: usize, produced: usize },
    /// Malformed input. Retrying with more space cannot help.
    BadData,
    /// The output region was too small.
    InsufficientSpace,
}

pub trait Encoder {
    fn compressed_len_bound(&mut self, uncompressed_len: usize) -> usize;

    /// Compresses all of `src` into `dest` and returns the compressed length.
    /// Zero means `dest` was too small.
    fn compress(&mut self, src: &[u8], dest: &mut [u8]) -> usize;
}

pub trait Decoder {
    fn decompress(&mut self, src: &[u8], dest: &mut [u8]) -> Outcome;
}
