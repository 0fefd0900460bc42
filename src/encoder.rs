use crate::buffer::GrowableBuffer;
use crate::codec::gzip::GzipCompressor;
use crate::codec::Encoder;
use crate::error::{Error, Result};
use tracing::{debug, trace};

/// Compresses whole inputs into an owned, growable scratch buffer.
///
/// The compressor cannot predict its output size, so each call retries with a
/// doubled buffer until the output fits or `max_capacity` is reached.
pub struct BufferedEncoder<E: Encoder = GzipCompressor> {
    buffer: GrowableBuffer,
    session: Option<E>,
}

impl BufferedEncoder<GzipCompressor> {
    pub fn new(level: i32, initial: usize, max: usize) -> Result<Self> {
        let buffer = GrowableBuffer::new(initial, max)?;
        let session = GzipCompressor::new(level)?;
        Ok(BufferedEncoder { buffer, session: Some(session) })
    }
}

impl<E: Encoder> BufferedEncoder<E> {
    pub fn with_session(session: E, initial: usize, max: usize) -> Result<Self> {
        let buffer = GrowableBuffer::new(initial, max)?;
        Ok(BufferedEncoder { buffer, session: Some(session) })
    }

    /// Compresses `input` as a whole.
    ///
    /// Returns `Ok(false)` if the compressed form does not fit in
    /// `max_capacity` bytes. On success the result is available from
    /// [`output`](Self::output) until the next call.
    ///
    /// A zero-length result from the codec is always read as "out of space".
    /// gzip output always carries a header and trailer, so a real result is
    /// never empty.
    pub fn compress(&mut self, input: &[u8]) -> Result<bool> {
        let session = self
            .session
            .as_mut()
            .ok_or(Error::ObjectDisposed("BufferedEncoder"))?;
        let buffer = &mut self.buffer;

        buffer.clear_output();
        let presize = input.len().saturating_mul(2).min(buffer.max_capacity());
        buffer.ensure_length(presize)?;

        let mut attempts = 1;
        loop {
            trace!(attempt = attempts, capacity = buffer.capacity(), "compressing");
            let produced = session.compress(input, buffer.view_mut());
            if produced > 0 {
                buffer.set_written(produced);
                return Ok(true);
            }
            if !buffer.grow() {
                debug!(
                    input_len = input.len(),
                    max_capacity = buffer.max_capacity(),
                    attempts,
                    "compressed output does not fit in the maximum buffer size"
                );
                return Ok(false);
            }
            attempts += 1;
        }
    }

    /// Output of the last successful [`compress`](Self::compress) call.
    pub fn output(&self) -> &[u8] {
        self.buffer.output()
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

    /// Pretends every input compresses to `needed` bytes and records the
    /// output capacity of every attempt.
    struct Scripted {
        needed: usize,
        calls: Rc<RefCell<Vec<usize>>>,
        dropped: Rc<RefCell<usize>>,
    }

    impl Encoder for Scripted {
        fn compressed_len_bound(&mut self, _: usize) -> usize {
            self.needed
        }

        fn compress(&mut self, _src: &[u8], dest: &mut [u8]) -> usize {
            self.calls.borrow_mut().push(dest.len());
            if dest.len() < self.needed {
                return 0;
            }
            dest[..self.needed].fill(0xAB);
            self.needed
        }
    }

    impl Drop for Scripted {
        fn drop(&mut self) {
            *self.dropped.borrow_mut() += 1;
        }
    }

    fn scripted(needed: usize) -> (Scripted, Rc<RefCell<Vec<usize>>>, Rc<RefCell<usize>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let dropped = Rc::new(RefCell::new(0));
        let session = Scripted { needed, calls: calls.clone(), dropped: dropped.clone() };
        (session, calls, dropped)
    }

    #[test]
    fn first_attempt_uses_twice_the_input() {
        let (session, calls, _) = scripted(100);
        let mut enc = BufferedEncoder::with_session(session, 4096, 1 << 20).unwrap();
        assert!(enc.compress(&[0; 5000]).unwrap());
        assert_eq!(*calls.borrow(), vec![10_000]);
        assert_eq!(enc.output().len(), 100);
    }

    #[test]
    fn doubles_until_output_fits() {
        let (session, calls, _) = scripted(50_000);
        let mut enc = BufferedEncoder::with_session(session, 4096, 1 << 20).unwrap();
        assert!(enc.compress(&[0; 10]).unwrap());
        assert_eq!(*calls.borrow(), vec![4096, 8192, 16384, 32768, 65536]);
        assert_eq!(enc.output(), &[0xAB_u8; 50_000][..]);
        assert_eq!(enc.capacity(), 65536);
    }

    #[test]
    fn gives_up_at_max_capacity() {
        let (session, calls, _) = scripted(30_000);
        let mut enc = BufferedEncoder::with_session(session, 4096, 20_000).unwrap();
        assert!(!enc.compress(&[0; 10]).unwrap());
        assert_eq!(*calls.borrow(), vec![4096, 8192, 16384, 20_000]);
        assert!(enc.output().is_empty());
        assert_eq!(enc.capacity(), 20_000);
    }

    #[test]
    fn empty_input_at_ceiling_does_not_loop() {
        let (session, calls, _) = scripted(usize::MAX);
        let mut enc = BufferedEncoder::with_session(session, 4096, 4096).unwrap();
        assert!(!enc.compress(&[]).unwrap());
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn capacity_is_sticky() {
        let (session, calls, _) = scripted(9000);
        let mut enc = BufferedEncoder::with_session(session, 4096, 1 << 20).unwrap();
        assert!(enc.compress(&[1; 10]).unwrap());
        assert!(enc.compress(&[1; 10]).unwrap());
        assert_eq!(*calls.borrow(), vec![4096, 8192, 16384, 16384]);
    }

    #[test]
    fn close_releases_once_and_disposes() {
        let (session, _, dropped) = scripted(10);
        let mut enc = BufferedEncoder::with_session(session, 4096, 8192).unwrap();
        assert!(enc.compress(b"abc").unwrap());
        enc.close();
        assert!(enc.is_closed());
        assert_eq!(*dropped.borrow(), 1);
        assert_eq!(enc.compress(b"abc"), Err(Error::ObjectDisposed("BufferedEncoder")));
        assert!(enc.output().is_empty());
        enc.close();
        drop(enc);
        assert_eq!(*dropped.borrow(), 1);
    }

    #[test]
    fn drop_releases_session() {
        let (session, _, dropped) = scripted(10);
        let enc = BufferedEncoder::with_session(session, 4096, 8192).unwrap();
        drop(enc);
        assert_eq!(*dropped.borrow(), 1);
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        assert!(matches!(
            BufferedEncoder::new(6, 8192, 4096),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            BufferedEncoder::new(6, 0, 4096),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    struct Overreporting;

    impl Encoder for Overreporting {
        fn compressed_len_bound(&mut self, len: usize) -> usize {
            len
        }

        fn compress(&mut self, _src: &[u8], dest: &mut [u8]) -> usize {
            dest.len() + 1
        }
    }

    #[test]
    #[should_panic(expected = "bytes written into a 4096 byte buffer")]
    fn codec_overreporting_output_panics() {
        let mut enc = BufferedEncoder::with_session(Overreporting, 4096, 8192).unwrap();
        let _ = enc.compress(b"abc");
    }
}
