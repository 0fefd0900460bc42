//! gzip compression and decompression into owned, self-sizing buffers.
//!
//! libdeflate works on flat buffers and cannot say up front how much output
//! space a call needs. [`BufferedEncoder`] and [`BufferedDecoder`] hide this by
//! retrying with a doubled scratch buffer until the call succeeds, fails for
//! good, or a caller-chosen ceiling is reached.
//!
//! ```no_run
//! use deflate_gzip::{BufferedDecoder, BufferedEncoder, DecodeOutcome};
//!
//! let mut encoder = BufferedEncoder::new(6, 4096, 1 << 20)?;
//! let mut decoder = BufferedDecoder::new(4096, 1 << 20)?;
//! assert!(encoder.compress(&[0; 1000])?);
//! let outcome = decoder.decompress(encoder.output())?;
//! assert!(matches!(outcome, DecodeOutcome::Success { .. }));
//! assert_eq!(decoder.output(), &[0_u8; 1000][..]);
//! # Ok::<(), deflate_gzip::Error>(())
//! ```

pub mod buffer;
pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod error;

pub use buffer::{GrowableBuffer, MIN_CAPACITY};
pub use codec::gzip::{GzipCompressor, GzipDecompressor, DEFAULT_LEVEL, MAX_LEVEL, MIN_LEVEL};
pub use decoder::{BufferedDecoder, DecodeOutcome};
pub use encoder::BufferedEncoder;
pub use error::{Error, Result};
