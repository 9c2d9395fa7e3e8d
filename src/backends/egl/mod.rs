// SPDX-License-Identifier: MPL-2.0

//! GPU image export over EGL
//!
//! # Modules
//!
//! - [`attribs`]: `EGL_EXT_image_dma_buf_import` attribute lists
//! - [`manager`]: Current-image cache keyed by color metadata
//! - [`api`]: Runtime-loaded libEGL importer

pub mod api;
pub mod attribs;
pub mod manager;

pub use api::{EglImageApi, ImageEntryPoints};
pub use attribs::build_image_attribs;
pub use manager::{EglCapabilities, ImageExportManager, ImageHandle, ImageImporter};
