// SPDX-License-Identifier: MPL-2.0

//! Physical buffer allocation
//!
//! The converter writes into one physically contiguous region that the GPU
//! later imports as a dma-buf. [`PhysicalAllocator`] hides where that region
//! comes from; [`DmaHeapAllocator`] is the Linux dma-heap implementation.
//!
//! [`PhysicalBuffer`] owns one allocation together with its exported
//! descriptor and releases both exactly once, descriptor first.

mod dma_heap;

pub use dma_heap::DmaHeapAllocator;

use crate::errors::{ExportError, ExportResult};
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `DMA_BUF_IOCTL_SYNC` ioctl number
const DMA_BUF_IOCTL_SYNC: libc::c_ulong = 0x40086200;
const DMA_BUF_SYNC_READ: u64 = 1 << 0;
const DMA_BUF_SYNC_START: u64 = 0;
const DMA_BUF_SYNC_END: u64 = 1 << 2;

/// Argument of `DMA_BUF_IOCTL_SYNC`
#[repr(C)]
struct DmaBufSync {
    flags: u64,
}

/// A live allocation as seen by its allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Allocator-private handle used to free the allocation
    pub handle: u64,
    /// Address the converter writes to (bus address, or the dma-buf fd for
    /// converters that take descriptors)
    pub device_address: u64,
    pub size: usize,
}

/// Source of cross-device shareable memory
pub trait PhysicalAllocator: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Allocate `size` bytes of shareable memory
    fn allocate(&self, size: usize, label: &str) -> ExportResult<Allocation>;

    /// Export a new dma-buf descriptor referring to `allocation`
    fn export_dmabuf(&self, allocation: &Allocation) -> ExportResult<OwnedFd>;

    /// Release the allocation. Called once per successful `allocate`.
    fn free(&self, allocation: Allocation);
}

/// One allocation plus its exported dma-buf descriptor
pub struct PhysicalBuffer {
    allocator: Arc<dyn PhysicalAllocator>,
    allocation: Option<Allocation>,
    dmabuf: Option<OwnedFd>,
    size: usize,
}

impl PhysicalBuffer {
    /// Allocate and export in one step.
    ///
    /// If the export fails the allocation is freed before returning.
    pub fn allocate(
        allocator: Arc<dyn PhysicalAllocator>,
        size: usize,
        label: &str,
    ) -> ExportResult<Self> {
        if size == 0 {
            return Err(ExportError::Allocation(
                "converter reported a zero-sized output buffer".to_string(),
            ));
        }

        let allocation = allocator.allocate(size, label)?;
        let mut buffer = Self {
            allocator,
            allocation: Some(allocation),
            dmabuf: None,
            size,
        };

        let fd = match buffer.allocator.export_dmabuf(&allocation) {
            Ok(fd) => fd,
            Err(e) => {
                buffer.release();
                return Err(e);
            }
        };

        info!(
            allocator = buffer.allocator.name(),
            size,
            fd = fd.as_raw_fd(),
            "Allocated physical output buffer"
        );
        buffer.dmabuf = Some(fd);
        Ok(buffer)
    }

    pub fn fd(&self) -> Option<RawFd> {
        self.dmabuf.as_ref().map(|fd| fd.as_raw_fd())
    }

    pub fn device_address(&self) -> Option<u64> {
        self.allocation.map(|a| a.device_address)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_released(&self) -> bool {
        self.allocation.is_none() && self.dmabuf.is_none()
    }

    /// Close the descriptor, then free the allocation. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(fd) = self.dmabuf.take() {
            debug!(fd = fd.as_raw_fd(), "Closing dma-buf descriptor");
            drop(fd);
        }
        if let Some(allocation) = self.allocation.take() {
            debug!(handle = allocation.handle, "Freeing physical allocation");
            self.allocator.free(allocation);
        }
    }

    /// Map the buffer read-only and copy out its first `len` bytes.
    ///
    /// Diagnostics only; the export path never touches pixels on the CPU.
    pub fn read_prefix(&self, len: usize) -> ExportResult<Vec<u8>> {
        let fd = self.fd().ok_or(ExportError::NotInitialized)?;
        let len = len.min(self.size);

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                self.size,
                libc::PROT_READ,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error().into());
        }

        sync_dmabuf(fd, DMA_BUF_SYNC_START | DMA_BUF_SYNC_READ);
        let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) }.to_vec();
        sync_dmabuf(fd, DMA_BUF_SYNC_END | DMA_BUF_SYNC_READ);

        unsafe {
            libc::munmap(ptr, self.size);
        }
        Ok(bytes)
    }
}

/// Bracket CPU access for cache coherency. Not every exporter implements it.
fn sync_dmabuf(fd: RawFd, flags: u64) {
    let mut sync = DmaBufSync { flags };
    let result = unsafe { libc::ioctl(fd, DMA_BUF_IOCTL_SYNC as _, &mut sync as *mut DmaBufSync) };
    if result < 0 {
        debug!(fd, error = %std::io::Error::last_os_error(), "DMA_BUF_IOCTL_SYNC unsupported");
    }
}

impl Drop for PhysicalBuffer {
    fn drop(&mut self) {
        if !self.is_released() {
            warn!("PhysicalBuffer dropped without explicit release");
            self.release();
        }
    }
}

impl std::fmt::Debug for PhysicalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalBuffer")
            .field("allocator", &self.allocator.name())
            .field("allocation", &self.allocation)
            .field("fd", &self.fd())
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAllocator {
        allocs: AtomicUsize,
        frees: AtomicUsize,
        fail_export: bool,
    }

    impl PhysicalAllocator for CountingAllocator {
        fn name(&self) -> &str {
            "counting"
        }

        fn allocate(&self, size: usize, _label: &str) -> ExportResult<Allocation> {
            let n = self.allocs.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(Allocation {
                handle: n + 1,
                device_address: 0x4000_0000,
                size,
            })
        }

        fn export_dmabuf(&self, _allocation: &Allocation) -> ExportResult<OwnedFd> {
            if self.fail_export {
                return Err(ExportError::Allocation("export refused".into()));
            }
            Ok(std::fs::File::open("/dev/null")?.into())
        }

        fn free(&self, _allocation: Allocation) {
            self.frees.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let allocator = Arc::new(CountingAllocator::default());
        let mut buffer = PhysicalBuffer::allocate(allocator.clone(), 4096, "test").unwrap();
        assert!(buffer.fd().is_some());

        buffer.release();
        buffer.release();
        drop(buffer);

        assert_eq!(allocator.allocs.load(Ordering::SeqCst), 1);
        assert_eq!(allocator.frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_export_frees_allocation() {
        let allocator = Arc::new(CountingAllocator {
            fail_export: true,
            ..Default::default()
        });
        let result = PhysicalBuffer::allocate(allocator.clone(), 4096, "test");

        assert!(matches!(result, Err(ExportError::Allocation(_))));
        assert_eq!(allocator.frees.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_size_rejected() {
        let allocator = Arc::new(CountingAllocator::default());
        assert!(PhysicalBuffer::allocate(allocator.clone(), 0, "test").is_err());
        assert_eq!(allocator.allocs.load(Ordering::SeqCst), 0);
    }
}
