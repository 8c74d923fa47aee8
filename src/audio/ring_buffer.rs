//! Fixed-capacity history of the conditioned input signal.
//!
//! Written block by block as the tick drains the capture queue; read as
//! "the most recent N samples" whenever an analysis window is needed.

/// Circular sample store keeping the latest `capacity` samples
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: Vec<f32>,
    write_pos: usize,
    available: usize,
}

impl RingBuffer {
    /// # Panics
    /// Panics if capacity is 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be greater than 0");
        Self {
            buffer: vec![0.0; capacity],
            write_pos: 0,
            available: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of valid samples currently held
    pub fn available(&self) -> usize {
        self.available
    }

    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.available = 0;
    }

    /// Append samples, overwriting the oldest ones once full
    pub fn write(&mut self, data: &[f32]) {
        let capacity = self.buffer.len();
        if data.len() >= capacity {
            self.buffer
                .copy_from_slice(&data[data.len() - capacity..]);
            self.write_pos = 0;
            self.available = capacity;
            return;
        }

        let end = self.write_pos + data.len();
        if end <= capacity {
            self.buffer[self.write_pos..end].copy_from_slice(data);
        } else {
            let first = capacity - self.write_pos;
            self.buffer[self.write_pos..].copy_from_slice(&data[..first]);
            self.buffer[..data.len() - first].copy_from_slice(&data[first..]);
        }

        self.write_pos = end % capacity;
        self.available = (self.available + data.len()).min(capacity);
    }

    /// Copy of the latest `n` samples, or None when fewer are held
    pub fn read(&self, n: usize) -> Option<Vec<f32>> {
        if n > self.available {
            return None;
        }
        let capacity = self.buffer.len();
        let start = (self.write_pos + capacity - n) % capacity;
        let mut out = Vec::with_capacity(n);
        if start + n <= capacity {
            out.extend_from_slice(&self.buffer[start..start + n]);
        } else {
            out.extend_from_slice(&self.buffer[start..]);
            out.extend_from_slice(&self.buffer[..n - (capacity - start)]);
        }
        Some(out)
    }

    /// Latest `n` samples, zero-padded at the front while still filling
    pub fn read_latest(&self, n: usize) -> Vec<f32> {
        if let Some(samples) = self.read(n) {
            return samples;
        }
        let mut out = vec![0.0; n];
        let have = self.available.min(n);
        if let Some(tail) = self.read(have) {
            out[n - have..].copy_from_slice(&tail);
        }
        out
    }
}
