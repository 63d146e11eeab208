//! `HeapAllocator` - default `Allocator` implementation.
//!
//! Each buffer is a plain `Vec<u8>` from the global allocator. Growth
//! goes through `try_reserve_exact`, so exhaustion surfaces as `None`
//! instead of aborting the process.

use std::sync::atomic::{AtomicUsize, Ordering};

use gearloop_core::traits::Allocator;

#[derive(Debug, Default)]
pub struct HeapAllocator {
    /// Buffers handed out and not yet released (diagnostics only)
    in_use: AtomicUsize,
}

impl HeapAllocator {
    pub const fn new() -> Self {
        Self {
            in_use: AtomicUsize::new(0),
        }
    }
}

impl Allocator for HeapAllocator {
    fn allocate(&self, len: usize) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).ok()?;
        buf.resize(len, 0);
        self.in_use.fetch_add(1, Ordering::Relaxed);
        Some(buf)
    }

    fn reallocate(&self, mut buf: Vec<u8>, new_len: usize) -> Option<Vec<u8>> {
        if new_len > buf.len() {
            buf.try_reserve_exact(new_len - buf.len()).ok()?;
        }
        buf.resize(new_len, 0);
        Some(buf)
    }

    fn release(&self, buf: Vec<u8>) {
        drop(buf);
        // Saturate: releasing a foreign buffer must not wrap the counter.
        let _ = self
            .in_use
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    fn name(&self) -> &'static str {
        "heap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_zeroed() {
        let alloc = HeapAllocator::new();
        let buf = alloc.allocate(32).unwrap();
        assert_eq!(buf.len(), 32);
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(alloc.in_use(), 1);

        alloc.release(buf);
        assert_eq!(alloc.in_use(), 0);
    }

    #[test]
    fn test_reallocate_keeps_prefix() {
        let alloc = HeapAllocator::new();
        let mut buf = alloc.allocate(4).unwrap();
        buf.copy_from_slice(b"gear");

        let grown = alloc.reallocate(buf, 8).unwrap();
        assert_eq!(&grown[..4], b"gear");
        assert_eq!(&grown[4..], &[0, 0, 0, 0]);

        let shrunk = alloc.reallocate(grown, 2).unwrap();
        assert_eq!(shrunk, b"ge");
        assert_eq!(alloc.in_use(), 1);
    }

    #[test]
    fn test_impossible_request_fails() {
        let alloc = HeapAllocator::new();
        assert!(alloc.allocate(usize::MAX).is_none());
        assert_eq!(alloc.in_use(), 0);
    }

    #[test]
    fn test_release_saturates() {
        let alloc = HeapAllocator::new();
        alloc.release(vec![1, 2, 3]);
        assert_eq!(alloc.in_use(), 0);
    }
}
