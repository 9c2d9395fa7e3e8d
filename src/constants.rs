// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

use serde::{Deserialize, Serialize};

/// Upper bound of the fixed-function converter (1080p)
pub const MAX_SUPPORTED_RESOLUTION: Resolution = Resolution {
    width: 1920,
    height: 1080,
};

/// Number of output buffers bound to the converter.
///
/// The whole pipeline is single-buffered: one physical region is converted
/// into and then exported, over and over.
pub const OUTPUT_BUFFER_COUNT: u32 = 1;

/// Extra buffers the decoder should allocate on top of its reference frames.
///
/// Decoders commonly default to 10, which does not fit a 64 MB GPU memory
/// split. At most one frame is ever buffered here, so 2 is enough.
pub const DECODER_EXTRA_BUFFERS: u32 = 2;

/// Attribute pairs reserved for an EGL image import (key + value each)
pub const MAX_EGL_ATTRIB_PAIRS: usize = 30;

/// Default dma-heap used for the physical buffer (contiguous memory)
pub const DEFAULT_DMA_HEAP: &str = "/dev/dma_heap/linux,cma";

/// Name attached to the physical allocation for debugging
pub const OUTPUT_BUFFER_NAME: &str = "DRM Buf";

/// Bytes logged by the post-conversion debug dump
pub const DEFAULT_DEBUG_DUMP_BYTES: usize = 5;

/// Width and height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether this resolution fits inside `limit` in both dimensions
    pub fn fits_within(&self, limit: Resolution) -> bool {
        self.width <= limit.width && self.height <= limit.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Whether the converter can handle `width` x `height`.
///
/// Callers must check this before initializing a pipeline.
pub fn is_resolution_supported(width: u32, height: u32) -> bool {
    let requested = Resolution::new(width, height);
    !requested.is_empty() && requested.fits_within(MAX_SUPPORTED_RESOLUTION)
}

/// Build information
pub mod app_info {
    /// Version from `git describe`, set by the build script
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
