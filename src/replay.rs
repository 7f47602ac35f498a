//! Experience replay buffer for the function-approximation agents
//!
//! The buffer keeps the most recent experiences in arrival order and serves
//! uniformly sampled minibatches for training. Sampling is done with
//! replacement, so a batch may contain the same experience more than once
//! and batches larger than the buffer are well defined.

use std::collections::VecDeque;

use rand::Rng;

use crate::mdp::Experience;

/// Bounded FIFO store of past experiences.
///
/// Once `capacity` experiences are held, each push evicts the oldest entry,
/// so the buffer always contains the most recent `capacity` experiences in
/// arrival order.
#[derive(Debug, Clone)]
pub struct ReplayBuffer<S> {
    buffer: VecDeque<Experience<S>>,
    capacity: usize,
    combined_replay: bool,
}

impl<S> ReplayBuffer<S> {
    /// Create an empty buffer holding at most `capacity` experiences.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "replay buffer capacity must be at least 1");
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            combined_replay: false,
        }
    }

    /// Enable or disable combined experience replay.
    ///
    /// With combined replay, every sampled batch has its last slot replaced
    /// by the most recently pushed experience, so each new experience is
    /// guaranteed to influence the very next update.
    #[must_use]
    pub fn with_combined_replay(mut self, enabled: bool) -> Self {
        self.combined_replay = enabled;
        self
    }

    /// Append an experience, evicting the oldest one at capacity.
    pub fn push(&mut self, experience: Experience<S>) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    /// Draw a uniform batch of `batch_size` experiences with replacement.
    ///
    /// With combined replay enabled the last slot of the batch is always the
    /// most recent experience.
    ///
    /// # Panics
    ///
    /// Panics when the buffer is empty and `batch_size` is non-zero.
    pub fn sample<R>(&self, rng: &mut R, batch_size: usize) -> Vec<&Experience<S>>
    where
        R: Rng + ?Sized,
    {
        if batch_size == 0 {
            return Vec::new();
        }
        assert!(!self.buffer.is_empty(), "cannot sample from an empty buffer");

        let mut batch: Vec<&Experience<S>> = (0..batch_size)
            .map(|_| &self.buffer[rng.random_range(0..self.buffer.len())])
            .collect();
        if self.combined_replay {
            batch[batch_size - 1] = self
                .buffer
                .back()
                .expect("buffer checked non-empty above");
        }
        batch
    }

    /// Most recently pushed experience, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&Experience<S>> {
        self.buffer.back()
    }

    /// Number of experiences currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer holds no experiences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Maximum number of experiences the buffer retains.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether combined experience replay is enabled.
    #[must_use]
    pub fn combined_replay(&self) -> bool {
        self.combined_replay
    }

    /// Iterate over the held experiences from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Experience<S>> {
        self.buffer.iter()
    }

    /// Remove all experiences.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
