//! Fixed-capacity sample ring with drop-oldest overflow.

use tracing::{trace, warn};

/// A circular buffer of f32 samples.
///
/// The ring itself is not synchronized; callers share it as
/// `Arc<parking_lot::Mutex<RingBuffer>>` and hold the lock only for the
/// copy. Overflow never blocks the writer: the oldest samples are
/// discarded to make room.
#[derive(Debug)]
pub struct RingBuffer {
    storage: Vec<f32>,
    write_index: usize,
    read_index: usize,
    available: usize,
}

impl RingBuffer {
    /// Create a ring holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            storage: vec![0.0; capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
        }
    }

    /// Append samples, discarding the oldest buffered samples on overflow.
    ///
    /// A write larger than the whole ring keeps only the trailing
    /// `capacity` samples.
    pub fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let capacity = self.storage.len();
        let samples = if samples.len() > capacity {
            warn!(
                incoming = samples.len(),
                capacity, "write exceeds ring capacity, keeping tail"
            );
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let overflow = (self.available + samples.len()).saturating_sub(capacity);
        if overflow > 0 {
            trace!(overflow, "ring full, dropping oldest samples");
            self.read_index = (self.read_index + overflow) % capacity;
            self.available -= overflow;
        }

        // At most two contiguous segments: up to the end, then wrapped.
        let first = (capacity - self.write_index).min(samples.len());
        self.storage[self.write_index..self.write_index + first].copy_from_slice(&samples[..first]);
        let wrapped = samples.len() - first;
        if wrapped > 0 {
            self.storage[..wrapped].copy_from_slice(&samples[first..]);
        }

        self.write_index = (self.write_index + samples.len()) % capacity;
        self.available += samples.len();
    }

    /// Remove and return up to `count` samples in FIFO order.
    pub fn read(&mut self, count: usize) -> Vec<f32> {
        let to_read = count.min(self.available);
        if to_read == 0 {
            return Vec::new();
        }

        let capacity = self.storage.len();
        let mut out = Vec::with_capacity(to_read);
        let first = (capacity - self.read_index).min(to_read);
        out.extend_from_slice(&self.storage[self.read_index..self.read_index + first]);
        if to_read > first {
            out.extend_from_slice(&self.storage[..to_read - first]);
        }

        self.read_index = (self.read_index + to_read) % capacity;
        self.available -= to_read;
        out
    }

    /// Samples currently buffered.
    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Forget all buffered samples. The backing storage is left as-is.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }
}
