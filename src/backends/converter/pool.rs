// SPDX-License-Identifier: GPL-3.0-only

//! Output buffer pool
//!
//! Buffer headers live in the pool's idle queue until they are taken and
//! sent to the converter. A taken header is a [`PoolBuffer`]; dropping it
//! puts the header back into the idle queue, which is how a reference is
//! released after the converted contents have been consumed. Once the pool
//! is destroyed, dropped buffers simply vanish.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Describes the memory behind one pool slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHeader {
    pub index: usize,
    /// Device address the converter writes to; 0 until bound
    pub device_address: u64,
    pub alloc_size: usize,
    /// Bytes of valid data, set by the converter on completion
    pub length: usize,
}

struct PoolShared {
    idle: Mutex<VecDeque<BufferHeader>>,
    closed: AtomicBool,
}

impl PoolShared {
    fn put_back(&self, mut header: BufferHeader) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        header.length = 0;
        if let Ok(mut idle) = self.idle.lock() {
            idle.push_back(header);
        }
    }
}

pub struct OutputPool {
    shared: Arc<PoolShared>,
    capacity: usize,
}

impl OutputPool {
    /// Create `capacity` unbound headers.
    ///
    /// The pool never allocates payload memory itself; each header must be
    /// bound to externally owned memory with [`OutputPool::bind`].
    pub fn new(capacity: usize) -> Self {
        let idle = (0..capacity)
            .map(|index| BufferHeader {
                index,
                device_address: 0,
                alloc_size: 0,
                length: 0,
            })
            .collect();

        Self {
            shared: Arc::new(PoolShared {
                idle: Mutex::new(idle),
                closed: AtomicBool::new(false),
            }),
            capacity,
        }
    }

    /// Point the idle header `index` at external memory.
    ///
    /// Returns false when no idle header has that index.
    pub fn bind(&self, index: usize, device_address: u64, alloc_size: usize) -> bool {
        let Ok(mut idle) = self.shared.idle.lock() else {
            return false;
        };
        match idle.iter_mut().find(|h| h.index == index) {
            Some(header) => {
                header.device_address = device_address;
                header.alloc_size = alloc_size;
                header.length = 0;
                true
            }
            None => false,
        }
    }

    /// Take the next idle buffer, if any
    pub fn take_idle(&self) -> Option<PoolBuffer> {
        let header = self.shared.idle.lock().ok()?.pop_front()?;
        Some(PoolBuffer {
            header,
            pool: Arc::downgrade(&self.shared),
        })
    }

    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Destroy the pool. Buffers still out are discarded when dropped.
    pub fn destroy(self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Ok(mut idle) = self.shared.idle.lock() {
            debug!(idle = idle.len(), capacity = self.capacity, "Destroying output pool");
            idle.clear();
        }
    }
}

/// A buffer taken from the pool; dropping it releases it back
#[derive(Debug)]
pub struct PoolBuffer {
    header: BufferHeader,
    pool: Weak<PoolShared>,
}

impl PoolBuffer {
    pub fn header(&self) -> &BufferHeader {
        &self.header
    }

    pub fn index(&self) -> usize {
        self.header.index
    }

    pub fn device_address(&self) -> u64 {
        self.header.device_address
    }

    pub fn length(&self) -> usize {
        self.header.length
    }

    /// Record how many bytes the converter wrote
    pub fn set_length(&mut self, length: usize) {
        self.header.length = length.min(self.header.alloc_size);
    }
}

impl Drop for PoolBuffer {
    fn drop(&mut self) {
        if let Some(shared) = self.pool.upgrade() {
            shared.put_back(self.header);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_returns_to_pool() {
        let pool = OutputPool::new(1);
        assert!(pool.bind(0, 0xC000_0000, 4096));

        let mut buffer = pool.take_idle().unwrap();
        assert_eq!(pool.idle_count(), 0);
        assert!(pool.take_idle().is_none());
        assert_eq!(buffer.device_address(), 0xC000_0000);

        buffer.set_length(8192);
        assert_eq!(buffer.length(), 4096);

        drop(buffer);
        assert_eq!(pool.idle_count(), 1);
        let again = pool.take_idle().unwrap();
        assert_eq!(again.length(), 0);
        assert_eq!(again.device_address(), 0xC000_0000);
    }

    #[test]
    fn test_bind_unknown_index() {
        let pool = OutputPool::new(1);
        assert!(!pool.bind(3, 0x1000, 16));
    }

    #[test]
    fn test_buffers_outliving_pool_are_discarded() {
        let pool = OutputPool::new(1);
        let buffer = pool.take_idle().unwrap();
        pool.destroy();
        drop(buffer);
    }
}
