// SPDX-License-Identifier: MPL-2.0

//! Frame, color and memory layout types shared by the pipeline
//!
//! # Modules
//!
//! - [`color`]: Color space / range metadata and their import hints
//! - [`drm`]: DRM fourcc codes and modifiers
//! - [`frame`]: Opaque decoder frames and decoder/renderer format tags
//! - [`layout`]: Plane layout of the converted dma-buf

pub mod color;
pub mod drm;
pub mod frame;
pub mod layout;

// Re-export commonly used types
pub use color::{ColorMetadata, ColorRange, ColorSpace};
pub use frame::{DecoderHints, ExportPixelFormat, NativeBufferHandle, OpaqueFrame};
pub use layout::PlaneLayout;
