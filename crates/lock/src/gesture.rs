//! Tap-sequence recognition on the cover surface.

use crate::pattern::SecretPattern;
use std::collections::VecDeque;

/// Sliding FIFO window of the most recent tap codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapBuffer {
    taps: VecDeque<u8>,
    capacity: usize,
}

impl TapBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            taps: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a tap, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, code: u8) {
        self.taps.push_back(code);
        while self.taps.len() > self.capacity {
            self.taps.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.taps.clear();
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, u8> {
        self.taps.iter()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.taps.iter().copied().collect()
    }
}

/// Matches the trailing tap window against the secret pattern.
///
/// There are no inter-tap timeouts: an attempt stays live until enough newer
/// taps push it out of the window.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    pattern: SecretPattern,
    buffer: TapBuffer,
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(SecretPattern::default())
    }
}

impl GestureRecognizer {
    pub fn new(pattern: SecretPattern) -> Self {
        let buffer = TapBuffer::with_capacity(pattern.len());
        Self { pattern, buffer }
    }

    pub fn pattern(&self) -> &SecretPattern {
        &self.pattern
    }

    pub fn buffer(&self) -> &TapBuffer {
        &self.buffer
    }

    /// Swap the pattern; any partial attempt is discarded.
    pub fn set_pattern(&mut self, pattern: SecretPattern) {
        self.buffer = TapBuffer::with_capacity(pattern.len());
        self.pattern = pattern;
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Record a tap. Returns `true` and clears the window on a full match.
    ///
    /// Codes outside 0-3 are recorded as-is; they occupy a slot and never match.
    pub fn on_tap(&mut self, code: u8) -> bool {
        self.buffer.push(code);
        if self.pattern.matches(self.buffer.iter()) {
            self.buffer.clear();
            return true;
        }
        false
    }
}
