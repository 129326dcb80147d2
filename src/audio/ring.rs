//! Bounded rolling buffer for pre-roll audio

use std::collections::VecDeque;

/// Keeps the most recent N seconds of audio, evicting the oldest samples
///
/// Fed continuously while waiting for the wake phrase so that a capture can
/// include the audio from just before the trigger fired.
#[derive(Debug)]
pub struct RollingBuffer {
    buf: VecDeque<f32>,
    capacity: usize,
}

impl RollingBuffer {
    /// Create a buffer holding `capacity_seconds` of audio at `sample_rate`
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(capacity_seconds: f32, sample_rate: u32) -> Self {
        let capacity = (capacity_seconds * sample_rate as f32).max(1.0) as usize;
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append samples, evicting the oldest once full
    pub fn extend(&mut self, samples: &[f32]) {
        for &sample in samples {
            if self.buf.len() == self.capacity {
                self.buf.pop_front();
            }
            self.buf.push_back(sample);
        }
    }

    /// Copy the current contents, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<f32> {
        self.buf.iter().copied().collect()
    }

    /// Discard all buffered audio
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
