use crate::models::PriceBar;
use std::collections::VecDeque;

/// Bounded rolling window of closed bars, newest last.
///
/// Owned by a single signal engine and fed from the strategy loop, so no
/// interior locking. Capacity is fixed at construction; pushing into a
/// full window evicts the oldest bar.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    bars: VecDeque<PriceBar>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, bar: PriceBar) {
        self.bars.push_back(bar);
        while self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bars.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.back()
    }

    /// Window contents oldest-first as a contiguous slice.
    pub fn bars(&self) -> Vec<PriceBar> {
        self.bars.iter().cloned().collect()
    }

    /// Close prices oldest-first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
