// crates/license-authority-scheduler/src/pool.rs
// ============================================================================
// Module: Record Buffer Pool
// Description: Reusable byte buffers for formatting task records.
// Purpose: Avoid a fresh allocation on every schedule call.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`BufferPool::checkout`] hands out a cleared buffer wrapped in a
//! [`PooledBuffer`] guard. Dropping the guard returns the buffer, so a buffer
//! cannot outlive its use. Oversized buffers are dropped instead of retained.

use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Mutex;

/// Pool of reusable byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    /// Idle buffers.
    buffers: Mutex<Vec<Vec<u8>>>,
    /// Maximum number of idle buffers kept.
    max_idle: usize,
    /// Capacity of newly allocated buffers.
    initial_capacity: usize,
    /// Buffers that grew beyond this capacity are not retained.
    max_retained_capacity: usize,
}

impl BufferPool {
    /// Creates a pool keeping at most `max_idle` buffers of `initial_capacity`.
    #[must_use]
    pub fn new(max_idle: usize, initial_capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            initial_capacity,
            max_retained_capacity: initial_capacity.saturating_mul(16).max(4096),
        }
    }

    /// Checks out a cleared buffer.
    #[must_use]
    pub fn checkout(&self) -> PooledBuffer<'_> {
        let buffer = self
            .buffers
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop())
            .unwrap_or_else(|| Vec::with_capacity(self.initial_capacity));
        PooledBuffer {
            pool: self,
            buffer,
        }
    }

    /// Returns the number of idle buffers.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.buffers.lock().map_or(0, |idle| idle.len())
    }

    /// Returns a buffer to the pool.
    fn release(&self, mut buffer: Vec<u8>) {
        if buffer.capacity() > self.max_retained_capacity {
            return;
        }
        buffer.clear();
        if let Ok(mut idle) = self.buffers.lock()
            && idle.len() < self.max_idle
        {
            idle.push(buffer);
        }
    }
}

/// Buffer checked out from a [`BufferPool`]; returned on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    /// Owning pool.
    pool: &'a BufferPool,
    /// Borrowed buffer.
    buffer: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buffer));
    }
}

#[cfg(test)]
mod tests {
    //! Buffer pool reuse tests.

    use super::*;

    #[test]
    fn buffers_are_reused_and_cleared() {
        let pool = BufferPool::new(2, 64);
        {
            let mut buffer = pool.checkout();
            buffer.extend_from_slice(b"payload");
        }
        assert_eq!(pool.idle(), 1);
        let buffer = pool.checkout();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 64);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn idle_count_is_bounded_and_large_buffers_dropped() {
        let pool = BufferPool::new(1, 8);
        let first = pool.checkout();
        let second = pool.checkout();
        drop(first);
        drop(second);
        assert_eq!(pool.idle(), 1);
        {
            let mut big = pool.checkout();
            big.resize(1 << 20, 0);
        }
        assert_eq!(pool.idle(), 0);
    }
}
