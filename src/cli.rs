// SPDX-License-Identifier: GPL-3.0-only

//! CLI diagnostics
//!
//! This module provides command-line checks for:
//! - Physical buffer allocation from a dma-heap
//! - EGL dma-buf import capabilities

use isp_export::backends::allocator::{DmaHeapAllocator, PhysicalBuffer};
use isp_export::backends::egl::EglImageApi;
use isp_export::backends::egl::ImageImporter;
use isp_export::config::PipelineConfig;
use isp_export::constants::{MAX_SUPPORTED_RESOLUTION, OUTPUT_BUFFER_NAME, is_resolution_supported};
use isp_export::media::drm::{DRM_FORMAT_NV12, fourcc_name};
use std::path::PathBuf;
use std::sync::Arc;

/// Bytes of an unpadded NV12 frame
fn nv12_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3 / 2
}

/// Check the resolution ceiling, then allocate, export and release one buffer
pub fn probe(width: u32, height: u32, heap: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    if !is_resolution_supported(width, height) {
        return Err(format!(
            "{}x{} is not supported (maximum {})",
            width, height, MAX_SUPPORTED_RESOLUTION
        )
        .into());
    }

    let heap = heap.unwrap_or_else(|| PipelineConfig::load_or_default().dma_heap);
    println!("Using dma-heap: {}", heap.display());

    let allocator = Arc::new(DmaHeapAllocator::open(&heap)?);
    let size = nv12_size(width, height);

    let mut buffer = PhysicalBuffer::allocate(allocator.clone(), size, OUTPUT_BUFFER_NAME)?;
    println!(
        "Allocated {} buffer for {}x{}: {} bytes, dma-buf fd {}",
        fourcc_name(DRM_FORMAT_NV12),
        width,
        height,
        buffer.size(),
        buffer.fd().unwrap_or(-1)
    );

    let prefix = buffer.read_prefix(16)?;
    println!("CPU mapping ok, first bytes: {:02x?}", prefix);

    buffer.release();
    println!("Released (live allocations: {})", allocator.live_allocations());

    Ok(())
}

/// Print EGL dma-buf import support for the default display
pub fn egl_info() -> Result<(), Box<dyn std::error::Error>> {
    let api = EglImageApi::open_default()?;
    let caps = api.capabilities();

    println!("EGL_EXT_image_dma_buf_import:           {}", yes_no(caps.dma_buf_import));
    println!("EGL_EXT_image_dma_buf_import_modifiers: {}", yes_no(caps.dma_buf_modifiers));
    println!("Image entry point:                      {}", api.entry_points().name());

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nv12_size() {
        assert_eq!(nv12_size(1920, 1080), 3_110_400);
        assert_eq!(nv12_size(2, 2), 6);
    }

    #[test]
    fn test_probe_rejects_4k() {
        assert!(probe(3840, 2160, None).is_err());
    }
}
