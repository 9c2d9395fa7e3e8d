// SPDX-License-Identifier: MPL-2.0

//! isp-export - zero-copy handoff of hardware-decoded frames to EGL
//!
//! Decoded frames in a decoder-private layout are converted to linear NV12
//! by a fixed-function converter, straight into one physically contiguous
//! buffer. That buffer is exported as a dma-buf and imported into EGL as a
//! single multi-plane image, so pixels never cross the CPU.
//!
//! # Architecture
//!
//! - [`backends`]: Converter, physical allocator and EGL import
//! - [`pipelines`]: The export pipeline tying them together
//! - [`media`]: Frame, color and plane layout types
//! - [`config`]: Runtime settings
//!
//! # Example
//!
//! ```ignore
//! let mut pipeline = ExportPipeline::new(component, allocator, importer, config)?;
//! pipeline.initialize(1920, 1080)?;
//! let image = pipeline.export_frame(&frame)?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use constants::Resolution;
pub use errors::{ExportError, ExportResult};
pub use pipelines::ExportPipeline;
