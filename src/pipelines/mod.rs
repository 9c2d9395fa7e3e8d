// SPDX-License-Identifier: MPL-2.0

//! Frame processing pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Opaque Frame │ ──▶ │  Export Pipeline  │ ──▶ │   EGLImage   │
//! │  (decoder)   │     │  - ISP convert    │     │ (NV12 dmabuf)│
//! │              │     │  - dma-buf import │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```

pub mod export;

pub use export::ExportPipeline;
