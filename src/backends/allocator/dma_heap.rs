// SPDX-License-Identifier: GPL-3.0-only

//! Linux dma-heap allocator
//!
//! Allocates from `/dev/dma_heap/<name>` with `DMA_HEAP_IOCTL_ALLOC`. The heap
//! hands back a dma-buf descriptor directly; that descriptor is kept here as
//! the allocation and duplicated for every export.

use super::{Allocation, PhysicalAllocator};
use crate::errors::{ExportError, ExportResult};
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// DMA_HEAP_IOCTL_ALLOC ioctl number (_IOWR('H', 0, struct dma_heap_allocation_data))
const DMA_HEAP_IOCTL_ALLOC: libc::c_ulong = 0xC0184800;

/// Argument of `DMA_HEAP_IOCTL_ALLOC`
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DmaHeapAllocationData {
    len: u64,
    fd: u32,
    fd_flags: u32,
    heap_flags: u64,
}

pub struct DmaHeapAllocator {
    path: PathBuf,
    heap: File,
    buffers: Mutex<HashMap<u64, OwnedFd>>,
    next_handle: AtomicU64,
}

impl DmaHeapAllocator {
    /// Open a dma-heap device node, e.g. `/dev/dma_heap/linux,cma`
    pub fn open(path: &Path) -> ExportResult<Self> {
        let heap = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
            .map_err(|e| {
                ExportError::Allocation(format!("cannot open dma-heap {}: {}", path.display(), e))
            })?;

        debug!(path = %path.display(), "Opened dma-heap");

        Ok(Self {
            path: path.to_path_buf(),
            heap,
            buffers: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of allocations not yet freed
    pub fn live_allocations(&self) -> usize {
        self.buffers.lock().map(|b| b.len()).unwrap_or(0)
    }
}

impl PhysicalAllocator for DmaHeapAllocator {
    fn name(&self) -> &str {
        "dma-heap"
    }

    fn allocate(&self, size: usize, label: &str) -> ExportResult<Allocation> {
        let mut data = DmaHeapAllocationData::zeroed();
        data.len = size as u64;
        data.fd_flags = (libc::O_RDWR | libc::O_CLOEXEC) as u32;

        let result = unsafe {
            libc::ioctl(
                self.heap.as_raw_fd(),
                DMA_HEAP_IOCTL_ALLOC as _,
                &mut data as *mut DmaHeapAllocationData,
            )
        };
        if result < 0 {
            let err = std::io::Error::last_os_error();
            return Err(ExportError::Allocation(format!(
                "DMA_HEAP_IOCTL_ALLOC({} bytes) on {} failed: {}",
                size,
                self.path.display(),
                err
            )));
        }

        let fd = unsafe { OwnedFd::from_raw_fd(data.fd as i32) };
        let device_address = fd.as_raw_fd() as u64;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);

        self.buffers
            .lock()
            .map_err(|_| ExportError::Allocation("dma-heap buffer table poisoned".to_string()))?
            .insert(handle, fd);

        debug!(label, size, handle, "dma-heap allocation");
        Ok(Allocation {
            handle,
            device_address,
            size,
        })
    }

    fn export_dmabuf(&self, allocation: &Allocation) -> ExportResult<OwnedFd> {
        let buffers = self
            .buffers
            .lock()
            .map_err(|_| ExportError::Allocation("dma-heap buffer table poisoned".to_string()))?;
        let fd = buffers.get(&allocation.handle).ok_or_else(|| {
            ExportError::Allocation(format!("unknown dma-heap handle {}", allocation.handle))
        })?;
        fd.try_clone()
            .map_err(|e| ExportError::Allocation(format!("dma-buf export failed: {}", e)))
    }

    fn free(&self, allocation: Allocation) {
        match self.buffers.lock() {
            Ok(mut buffers) => {
                if buffers.remove(&allocation.handle).is_none() {
                    warn!(handle = allocation.handle, "Freeing unknown dma-heap handle");
                }
            }
            Err(_) => warn!("dma-heap buffer table poisoned, leaking allocation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_data_layout() {
        assert_eq!(std::mem::size_of::<DmaHeapAllocationData>(), 24);
    }

    #[test]
    fn test_missing_heap_is_allocation_error() {
        let result = DmaHeapAllocator::open(Path::new("/nonexistent/dma_heap/none"));
        assert!(matches!(result, Err(ExportError::Allocation(_))));
    }
}
