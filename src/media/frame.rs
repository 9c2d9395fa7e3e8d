// SPDX-License-Identifier: GPL-3.0-only

//! Frames handed over by the decoder

use super::color::ColorMetadata;

/// Decoder-owned native buffer reference.
///
/// The value is whatever the decoder's buffer header pointer or id is; this
/// crate only forwards it to the converter input port and never frees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeBufferHandle(pub usize);

/// A decoded frame whose pixels live in decoder-private memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueFrame {
    pub buffer: NativeBufferHandle,
    pub width: u32,
    pub height: u32,
    pub color: ColorMetadata,
}

impl OpaqueFrame {
    pub fn new(buffer: NativeBufferHandle, width: u32, height: u32, color: ColorMetadata) -> Self {
        Self {
            buffer,
            width,
            height,
            color,
        }
    }
}

/// Pixel format the decoder should be asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderOutputFormat {
    /// Decoder-private buffers that only the converter can read
    Opaque,
}

/// Format tag telling the renderer how to sample the exported image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPixelFormat {
    /// One opaque multi-plane dma-buf surface; do not split into per-plane textures
    DrmPrime,
}

/// Settings the decoder should be created with when feeding this pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderHints {
    pub output_format: DecoderOutputFormat,
    /// Extra buffers to request beyond the decoder's reference frames
    pub extra_buffers: u32,
    /// Start the decoder with zero width/height; the converter rejects some
    /// initial sizes but always accepts zero
    pub zero_initial_dimensions: bool,
}
