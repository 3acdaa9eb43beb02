//! Accounted firmware heap.
//!
//! The shell runs inside a fixed-size heap. [`Heap`] tracks how many bytes
//! are reserved and how many allocations are still live, and can be told to
//! fail a future allocation so error paths can be exercised. Every
//! allocation is an RAII [`Reservation`]; dropping it returns the bytes.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::error::{MosError, Result};

#[derive(Debug)]
struct HeapState {
    capacity: usize,
    in_use: Cell<usize>,
    live: Cell<usize>,
    allocations: Cell<usize>,
    frees: Cell<usize>,
    peak: Cell<usize>,
    /// Allocations still allowed before the injected failure fires.
    fail_in: Cell<Option<usize>>,
}

/// Shared handle to the heap. Cloning shares the same accounting.
#[derive(Debug, Clone)]
pub struct Heap {
    state: Rc<HeapState>,
}

impl Heap {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Rc::new(HeapState {
                capacity,
                in_use: Cell::new(0),
                live: Cell::new(0),
                allocations: Cell::new(0),
                frees: Cell::new(0),
                peak: Cell::new(0),
                fail_in: Cell::new(None),
            }),
        }
    }

    /// Reserve `bytes`. Fails with `OutOfMemory` when the heap is exhausted
    /// or an injected failure is due.
    pub fn reserve(&self, bytes: usize) -> Result<Reservation> {
        let s = &self.state;
        if let Some(n) = s.fail_in.get() {
            if n == 0 {
                s.fail_in.set(None);
                log::trace!("heap: injected failure for {bytes} bytes");
                return Err(MosError::OutOfMemory);
            }
            s.fail_in.set(Some(n - 1));
        }
        let in_use = s.in_use.get();
        if bytes > s.capacity - in_use {
            return Err(MosError::OutOfMemory);
        }
        s.in_use.set(in_use + bytes);
        s.peak.set(s.peak.get().max(in_use + bytes));
        s.live.set(s.live.get() + 1);
        s.allocations.set(s.allocations.get() + 1);
        Ok(Reservation {
            state: Rc::clone(&self.state),
            bytes,
        })
    }

    /// Copy `text` into a heap-accounted string (one byte per char plus a
    /// terminator, as the firmware stores it).
    pub fn alloc_str(&self, text: &str) -> Result<HeapString> {
        let reservation = self.reserve(text.len() + 1)?;
        Ok(HeapString {
            text: text.to_string(),
            _reservation: reservation,
        })
    }

    /// Let the next `n` allocations succeed, then fail the one after.
    /// `fail_after(0)` fails the very next allocation. The trigger fires once.
    pub fn fail_after(&self, n: usize) {
        self.state.fail_in.set(Some(n));
    }

    pub fn clear_failure(&self) {
        self.state.fail_in.set(None);
    }

    /// Whether an injected failure is still pending.
    pub fn failure_pending(&self) -> bool {
        self.state.fail_in.get().is_some()
    }

    /// Allocations not yet released.
    pub fn live(&self) -> usize {
        self.state.live.get()
    }

    /// Allocations made since creation.
    pub fn total(&self) -> usize {
        self.state.allocations.get()
    }

    pub fn frees(&self) -> usize {
        self.state.frees.get()
    }

    pub fn in_use(&self) -> usize {
        self.state.in_use.get()
    }

    pub fn peak(&self) -> usize {
        self.state.peak.get()
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Largest single block that could be reserved right now.
    pub fn largest_free(&self) -> usize {
        self.state.capacity - self.state.in_use.get()
    }
}

/// A live heap block. Released on drop.
pub struct Reservation {
    state: Rc<HeapState>,
    bytes: usize,
}

impl Reservation {
    pub fn size(&self) -> usize {
        self.bytes
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let s = &self.state;
        s.in_use.set(s.in_use.get() - self.bytes);
        s.live.set(s.live.get() - 1);
        s.frees.set(s.frees.get() + 1);
    }
}

/// A string whose storage is charged to a [`Heap`].
#[derive(Debug)]
pub struct HeapString {
    text: String,
    _reservation: Reservation,
}

impl HeapString {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Deref for HeapString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for HeapString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_release() {
        let heap = Heap::new(100);
        let a = heap.reserve(40).unwrap();
        let b = heap.reserve(60).unwrap();
        assert_eq!(heap.in_use(), 100);
        assert_eq!(heap.live(), 2);
        assert_eq!(heap.largest_free(), 0);
        drop(a);
        assert_eq!(heap.in_use(), 60);
        drop(b);
        assert_eq!(heap.live(), 0);
        assert_eq!(heap.total(), 2);
        assert_eq!(heap.frees(), 2);
        assert_eq!(heap.peak(), 100);
    }

    #[test]
    fn exhaustion_is_out_of_memory() {
        let heap = Heap::new(10);
        let _a = heap.reserve(8).unwrap();
        let err = heap.reserve(3).unwrap_err();
        assert!(matches!(err, MosError::OutOfMemory));
        assert_eq!(heap.live(), 1);
    }

    #[test]
    fn injected_failure_fires_once() {
        let heap = Heap::new(1000);
        heap.fail_after(2);
        let _a = heap.reserve(1).unwrap();
        let _b = heap.reserve(1).unwrap();
        assert!(heap.reserve(1).is_err());
        assert!(!heap.failure_pending());
        assert!(heap.reserve(1).is_ok());
    }

    #[test]
    fn fail_after_zero_fails_next() {
        let heap = Heap::new(1000);
        heap.fail_after(0);
        assert!(heap.alloc_str("x").is_err());
        assert_eq!(heap.total(), 0);
    }

    #[test]
    fn heap_string_charges_terminator() {
        let heap = Heap::new(1000);
        let s = heap.alloc_str("hello").unwrap();
        assert_eq!(&*s, "hello");
        assert_eq!(heap.in_use(), 6);
        drop(s);
        assert_eq!(heap.in_use(), 0);
    }

    #[test]
    fn clones_share_accounting() {
        let heap = Heap::new(50);
        let other = heap.clone();
        let _r = other.reserve(20).unwrap();
        assert_eq!(heap.in_use(), 20);
    }
}
