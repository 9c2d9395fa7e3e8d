// SPDX-License-Identifier: MPL-2.0

//! Hardware-facing backends
//!
//! ```text
//! ┌────────────────┐   ┌─────────────────┐   ┌──────────────────┐
//! │   converter    │──▶│    allocator    │──▶│       egl        │
//! │ opaque ─▶ NV12 │   │ physical memory │   │ dma-buf EGLImage │
//! └────────────────┘   └─────────────────┘   └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`allocator`]: Physically contiguous, dma-buf exportable memory
//! - [`converter`]: Fixed-function converter component and its output pool
//! - [`egl`]: dma-buf import into EGL images

pub mod allocator;
pub mod converter;
pub mod egl;
