use crate::buffer::GrowableBuffer;
use crate::codec::gzip::GzipDecompressor;
use crate::codec::{Decoder, Outcome};
use crate::error::{Error, Result};
use tracing::{debug, trace};

/// Result of [`BufferedDecoder::decompress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The output is ready; `consumed` input bytes were read.
    Success { consumed: usize },
    /// The input is not a valid compressed stream.
    BadData,
    /// The decompressed data does not fit in the maximum buffer size.
    InsufficientSpace,
}

/// Decompresses whole inputs into an owned, growable scratch buffer.
pub struct BufferedDecoder<D: Decoder = GzipDecompressor> {
    buffer: GrowableBuffer,
    session: Option<D>,
    consumed: usize,
}

impl BufferedDecoder<GzipDecompressor> {
    pub fn new(initial: usize, max: usize) -> Result<Self> {
        let buffer = GrowableBuffer::new(initial, max)?;
        let session = GzipDecompressor::new()?;
        Ok(BufferedDecoder { buffer, session: Some(session), consumed: 0 })
    }
}

impl<D: Decoder> BufferedDecoder<D> {
    pub fn with_session(session: D, initial: usize, max: usize) -> Result<Self> {
        let buffer = GrowableBuffer::new(initial, max)?;
        Ok(BufferedDecoder { buffer, session: Some(session), consumed: 0 })
    }

    pub fn decompress(&mut self, input: &[u8]) -> Result<DecodeOutcome> {
        let session = self
            .session
            .as_mut()
            .ok_or(Error::ObjectDisposed("BufferedDecoder"))?;
        let buffer = &mut self.buffer;

        buffer.clear_output();
        self.consumed = 0;
        let presize = input.len().saturating_mul(2).min(buffer.max_capacity());
        buffer.ensure_length(presize)?;

        let mut attempts = 1;
        loop {
            trace!(attempt = attempts, capacity = buffer.capacity(), "decompressing");
            match session.decompress(input, buffer.view_mut()) {
                Outcome::Success { consumed, produced } => {
                    buffer.set_written(produced);
                    self.consumed = consumed;
                    return Ok(DecodeOutcome::Success { consumed });
                }
                Outcome::BadData => {
                    debug!(input_len = input.len(), "malformed compressed input");
                    return Ok(DecodeOutcome::BadData);
                }
                Outcome::InsufficientSpace => {
                    if !buffer.grow() {
                        debug!(
                            input_len = input.len(),
                            max_capacity = buffer.max_capacity(),
                            attempts,
                            "decompressed output does not fit in the maximum buffer size"
                        );
                        return Ok(DecodeOutcome::InsufficientSpace);
                    }
                }
            }
            attempts += 1;
        }
    }

    /// Output of the last successful [`decompress`](Self::decompress) call.
    pub fn output(&self) -> &[u8] {
        self.buffer.output()
    }

    /// Input bytes read by the last successful call, 0 otherwise.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.buffer.max_capacity()
    }

    /// Releases the codec session. Later calls fail with `ObjectDisposed`.
    pub fn close(&mut self) {
        self.session.take();
        self.buffer.clear_output();
        self.consumed = 0;
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Replays a fixed outcome for a given output size.
    struct Scripted {
        needed: usize,
        bad: bool,
        calls: Rc<RefCell<Vec<usize>>>,
    }

    impl Decoder for Scripted {
        fn decompress(&mut self, src: &[u8], dest: &mut [u8]) -> Outcome {
            self.calls.borrow_mut().push(dest.len());
            if self.bad {
                return Outcome::BadData;
            }
            if dest.len() < self.needed {
                return Outcome::InsufficientSpace;
            }
            dest[..self.needed].fill(0xCD);
            Outcome::Success { consumed: src.len(), produced: self.needed }
        }
    }

    fn scripted(needed: usize, bad: bool) -> (Scripted, Rc<RefCell<Vec<usize>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        (Scripted { needed, bad, calls: calls.clone() }, calls)
    }

    #[test]
    fn grows_until_success() {
        let (session, calls) = scripted(40_000, false);
        let mut dec = BufferedDecoder::with_session(session, 4096, 1 << 20).unwrap();
        let outcome = dec.decompress(&[0; 3000]).unwrap();
        assert_eq!(outcome, DecodeOutcome::Success { consumed: 3000 });
        assert_eq!(*calls.borrow(), vec![6000, 12000, 24000, 48000]);
        assert_eq!(dec.output(), &[0xCD_u8; 40_000][..]);
        assert_eq!(dec.consumed(), 3000);
    }

    #[test]
    fn bad_data_is_not_retried() {
        let (session, calls) = scripted(0, true);
        let mut dec = BufferedDecoder::with_session(session, 4096, 1 << 20).unwrap();
        assert_eq!(dec.decompress(b"junk").unwrap(), DecodeOutcome::BadData);
        assert_eq!(calls.borrow().len(), 1);
        assert!(dec.output().is_empty());
        assert_eq!(dec.consumed(), 0);
    }

    #[test]
    fn insufficient_space_at_ceiling() {
        let (session, calls) = scripted(100_000, false);
        let mut dec = BufferedDecoder::with_session(session, 4096, 50_000).unwrap();
        assert_eq!(dec.decompress(&[1; 10]).unwrap(), DecodeOutcome::InsufficientSpace);
        assert_eq!(*calls.borrow(), vec![4096, 8192, 16384, 32768, 50_000]);
        assert!(dec.output().is_empty());
        assert!(dec.capacity() <= dec.max_capacity());
    }

    #[test]
    fn previous_output_is_cleared_by_failure() {
        let (session, _) = scripted(10, false);
        let mut dec = BufferedDecoder::with_session(session, 4096, 8192).unwrap();
        assert!(matches!(dec.decompress(b"x").unwrap(), DecodeOutcome::Success { .. }));
        assert_eq!(dec.output().len(), 10);
        dec.session.as_mut().unwrap().bad = true;
        assert_eq!(dec.decompress(b"x").unwrap(), DecodeOutcome::BadData);
        assert!(dec.output().is_empty());
    }

    #[test]
    fn closed_decoder_is_disposed() {
        let (session, calls) = scripted(10, false);
        let mut dec = BufferedDecoder::with_session(session, 4096, 8192).unwrap();
        dec.close();
        assert!(dec.is_closed());
        assert_eq!(dec.decompress(b"x"), Err(Error::ObjectDisposed("BufferedDecoder")));
        assert!(calls.borrow().is_empty());
    }
}
