//! Two copies of a value plus an atomic index naming the current one.
//!
//! The writer fills the inactive copy and then flips the index.  Readers always observe a complete value: either the
//! previous one or the new one, never a mixture.  Writing requires `&mut self`, so today the writer and the reader are
//! the same thread; the index is atomic so that the write half can move elsewhere without changing the read path.
use crate::sync::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    current: AtomicUsize,
}

impl<T> DoubleBuffer<T> {
    /// Build a buffer whose current value is `current`.  `spare` is the scratch copy the first write goes to.
    pub fn new(current: T, spare: T) -> Self {
        DoubleBuffer {
            slots: [current, spare],
            current: AtomicUsize::new(0),
        }
    }

    /// The value readers should see right now.
    pub fn current(&self) -> &T {
        &self.slots[self.current.load(Ordering::Acquire)]
    }

    /// Index of the current slot.
    #[cfg(test)]
    fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Fill the inactive slot with `writer`, then publish it.
    pub fn write_and_publish(&mut self, writer: impl FnOnce(&mut T)) {
        let inactive = 1 - self.current.load(Ordering::Relaxed);
        writer(&mut self.slots[inactive]);
        self.current.store(inactive, Ordering::Release);
    }
}

impl<T: Clone> DoubleBuffer<T> {
    pub fn from_value(value: T) -> Self {
        Self::new(value.clone(), value)
    }
}
