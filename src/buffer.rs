//! Owned scratch memory for a single codec call.
//!
//! The buffer is a flat region that is replaced wholesale whenever it needs
//! to get bigger. Nothing survives a failed codec attempt, so contents are
//! never copied into the new region.

use crate::error::{Error, Result};
use tracing::debug;

/// Smallest region ever allocated, regardless of the requested initial size.
pub const MIN_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    max: usize,
    written: usize,
}

impl GrowableBuffer {
    /// Allocates `clamp(initial, MIN_CAPACITY, max)` bytes.
    pub fn new(initial: usize, max: usize) -> Result<Self> {
        if initial == 0 {
            return Err(Error::InvalidConfiguration(
                "initial buffer size must be positive".to_owned(),
            ));
        }
        if max == 0 {
            return Err(Error::InvalidConfiguration(
                "maximum buffer size must be positive".to_owned(),
            ));
        }
        if initial > max {
            return Err(Error::InvalidConfiguration(format!(
                "initial buffer size {initial} exceeds maximum {max}"
            )));
        }
        let capacity = initial.max(MIN_CAPACITY).min(max);
        Ok(GrowableBuffer {
            data: vec![0; capacity],
            max,
            written: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn max_capacity(&self) -> usize {
        self.max
    }

    /// Number of valid bytes left by the last successful operation.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn output(&self) -> &[u8] {
        &self.data[..self.written]
    }

    /// Makes the buffer at least `desired` bytes long. Never shrinks.
    ///
    /// Growing discards the previous contents and any recorded output.
    pub fn ensure_length(&mut self, desired: usize) -> Result<()> {
        if desired > self.max {
            return Err(Error::InvalidConfiguration(format!(
                "requested buffer size {desired} exceeds maximum {}",
                self.max
            )));
        }
        if desired <= self.data.len() {
            return Ok(());
        }
        debug!(from = self.data.len(), to = desired, "growing buffer");
        self.data = vec![0; desired];
        self.written = 0;
        Ok(())
    }

    /// Doubles the capacity, saturating at the maximum.
    /// Returns `false` if the buffer was already at the maximum.
    pub fn grow(&mut self) -> bool {
        let current = self.data.len();
        if current >= self.max {
            return false;
        }
        let desired = current.saturating_mul(2).min(self.max);
        // desired <= max, cannot fail
        self.ensure_length(desired).is_ok()
    }

    /// Region handed to the codec. Never longer than the maximum.
    pub fn view_mut(&mut self) -> &mut [u8] {
        let len = self.data.len().min(self.max);
        &mut self.data[..len]
    }

    pub(crate) fn clear_output(&mut self) {
        self.written = 0;
    }

    /// Panics if `len` is longer than the region handed to the codec.
    pub(crate) fn set_written(&mut self, len: usize) {
        let available = self.data.len().min(self.max);
        assert!(
            len <= available,
            "codec reported {len} bytes written into a {available} byte buffer"
        );
        self.written = len;
    }
}
