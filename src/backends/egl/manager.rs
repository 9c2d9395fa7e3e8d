// SPDX-License-Identifier: GPL-3.0-only

//! Image export manager
//!
//! Keeps at most one GPU image alive for the physical buffer. The image is
//! reused for as long as incoming frames carry the color metadata it was
//! built with and rebuilt whenever that metadata changes.

use super::attribs::build_image_attribs;
use crate::errors::{ExportError, ExportResult};
use crate::media::{ColorMetadata, PlaneLayout};
use std::num::NonZeroUsize;
use tracing::{debug, error, info};

/// Driver capabilities relevant to dma-buf import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EglCapabilities {
    /// `EGL_EXT_image_dma_buf_import`
    pub dma_buf_import: bool,
    /// `EGL_EXT_image_dma_buf_import_modifiers`
    pub dma_buf_modifiers: bool,
}

impl EglCapabilities {
    /// Parse a space-separated EGL extension string
    pub fn from_extensions(extensions: &str) -> Self {
        let has = |name: &str| extensions.split_ascii_whitespace().any(|ext| ext == name);
        Self {
            dma_buf_import: has("EGL_EXT_image_dma_buf_import"),
            dma_buf_modifiers: has("EGL_EXT_image_dma_buf_import_modifiers"),
        }
    }
}

/// Non-null handle of an imported GPU image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(NonZeroUsize);

impl ImageHandle {
    /// `None` for the null image
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    pub fn as_raw(self) -> usize {
        self.0.get()
    }
}

/// GPU-side entry points for creating and destroying dma-buf images
pub trait ImageImporter {
    fn capabilities(&self) -> EglCapabilities;

    /// Import an image from an `EGL_NONE`-terminated attribute list.
    ///
    /// On failure returns the native error code reported right after the call.
    fn create_image(&mut self, attribs: &[isize]) -> Result<ImageHandle, i32>;

    fn destroy_image(&mut self, image: ImageHandle);
}

pub struct ImageExportManager<I: ImageImporter> {
    importer: I,
    current: Option<(ImageHandle, ColorMetadata)>,
}

impl<I: ImageImporter> ImageExportManager<I> {
    /// Fails when the driver cannot import dma-bufs at all
    pub fn new(importer: I) -> ExportResult<Self> {
        let caps = importer.capabilities();
        if !caps.dma_buf_import {
            error!("EGL_EXT_image_dma_buf_import is not supported");
            return Err(ExportError::Configuration(
                "EGL driver lacks EGL_EXT_image_dma_buf_import".to_string(),
            ));
        }
        info!(modifiers = caps.dma_buf_modifiers, "EGL dma-buf import available");

        Ok(Self {
            importer,
            current: None,
        })
    }

    /// Import `layout` as a new image tagged with `color`.
    ///
    /// Does not touch the current image; see [`get_or_rebuild`](Self::get_or_rebuild).
    pub fn build_image(
        &mut self,
        layout: &PlaneLayout,
        color: &ColorMetadata,
    ) -> ExportResult<ImageHandle> {
        let attribs =
            build_image_attribs(layout, color, self.importer.capabilities().dma_buf_modifiers);

        match self.importer.create_image(&attribs) {
            Ok(image) => {
                debug!(image = image.as_raw(), %layout, %color, "Created EGLImage");
                Ok(image)
            }
            Err(code) => {
                error!(code = %format!("{:#x}", code), %layout, %color, "eglCreateImage() failed");
                Err(ExportError::ImageCreation {
                    code,
                    message: "eglCreateImage() returned no image".to_string(),
                })
            }
        }
    }

    /// Destroy the current image, if any. Calling it again is a no-op.
    pub fn destroy_image(&mut self) {
        if let Some((image, _)) = self.current.take() {
            debug!(image = image.as_raw(), "Destroying EGLImage");
            self.importer.destroy_image(image);
        }
    }

    /// Return the current image if it was built for `color`, otherwise
    /// replace it with a freshly built one.
    ///
    /// If the rebuild fails no image is current afterwards.
    pub fn get_or_rebuild(
        &mut self,
        layout: &PlaneLayout,
        color: &ColorMetadata,
    ) -> ExportResult<ImageHandle> {
        if let Some((image, built_for)) = self.current {
            if built_for == *color {
                return Ok(image);
            }
            debug!(from = %built_for, to = %color, "Color metadata changed, rebuilding EGLImage");
        }

        self.destroy_image();
        let image = self.build_image(layout, color)?;
        self.current = Some((image, *color));
        Ok(image)
    }

    pub fn current_image(&self) -> Option<ImageHandle> {
        self.current.map(|(image, _)| image)
    }

    /// Color metadata the current image was built with
    pub fn current_color(&self) -> Option<ColorMetadata> {
        self.current.map(|(_, color)| color)
    }

    pub fn importer(&self) -> &I {
        &self.importer
    }
}

impl<I: ImageImporter> Drop for ImageExportManager<I> {
    fn drop(&mut self) {
        self.destroy_image();
    }
}
