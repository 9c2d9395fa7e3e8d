// SPDX-License-Identifier: GPL-3.0-only

//! Frame export pipeline
//!
//! Drives one opaque decoder frame through the converter and hands back an
//! EGL image of the converted buffer. Frames are processed strictly one at a
//! time; the physical buffer and the image are reused across frames.

use crate::backends::allocator::PhysicalAllocator;
use crate::backends::converter::{ConverterComponent, ConverterStage};
use crate::backends::egl::{ImageExportManager, ImageHandle, ImageImporter};
use crate::config::PipelineConfig;
use crate::constants::{
    DECODER_EXTRA_BUFFERS, MAX_SUPPORTED_RESOLUTION, Resolution, is_resolution_supported,
};
use crate::errors::{ExportError, ExportResult};
use crate::media::frame::DecoderOutputFormat;
use crate::media::{DecoderHints, ExportPixelFormat, OpaqueFrame, PlaneLayout};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ExportPipeline<I: ImageImporter> {
    config: PipelineConfig,
    stage: ConverterStage,
    images: ImageExportManager<I>,
    resolution: Option<Resolution>,
    frames_exported: u64,
}

impl<I: ImageImporter> ExportPipeline<I> {
    /// Wire the pipeline together. Fails if `importer` cannot import dma-bufs.
    pub fn new(
        component: Box<dyn ConverterComponent>,
        allocator: Arc<dyn PhysicalAllocator>,
        importer: I,
        config: PipelineConfig,
    ) -> ExportResult<Self> {
        let images = ImageExportManager::new(importer)?;
        Ok(Self {
            config,
            stage: ConverterStage::new(component, allocator),
            images,
            resolution: None,
            frames_exported: 0,
        })
    }

    /// Configure the converter for `width` x `height` frames.
    ///
    /// Anything above 1080p is refused before the converter is touched.
    pub fn initialize(&mut self, width: u32, height: u32) -> ExportResult<()> {
        let resolution = Resolution::new(width, height);
        if !is_resolution_supported(width, height) {
            warn!(%resolution, max = %MAX_SUPPORTED_RESOLUTION, "Unsupported resolution");
            return Err(ExportError::ResolutionUnsupported { width, height });
        }
        if self.stage.is_initialized() {
            return Err(ExportError::Configuration(
                "pipeline is already initialized".to_string(),
            ));
        }

        self.stage.initialize(width, height)?;
        self.resolution = Some(resolution);
        info!(%resolution, "Export pipeline initialized");
        Ok(())
    }

    /// Convert `frame` and return an image of the result.
    ///
    /// Blocks until the converter is done (bounded by the configured
    /// timeout, if any). The same handle is returned for as long as the
    /// frame color metadata does not change.
    pub fn export_frame(&mut self, frame: &OpaqueFrame) -> ExportResult<ImageHandle> {
        if !self.stage.is_initialized() {
            return Err(ExportError::NotInitialized);
        }

        self.stage.submit_frame(frame)?;
        let converted = self.stage.wait_for_completion(self.config.completion_timeout())?;

        if self.config.debug_dump {
            match self.stage.dump_output(self.config.debug_dump_bytes) {
                Ok(bytes) => debug!(length = converted.length(), bytes = ?bytes, "Converted buffer"),
                Err(e) => warn!(error = %e, "Debug dump failed"),
            }
        }
        // Pixels stay in the physical buffer; the pool slot can be reused
        drop(converted);

        let layout = self.stage.layout().ok_or(ExportError::NotInitialized)?;
        let image = self.images.get_or_rebuild(layout, &frame.color)?;
        self.frames_exported += 1;
        Ok(image)
    }

    /// The first frame after initialization must be a real decoded frame
    pub fn needs_validation_frame(&self) -> bool {
        true
    }

    pub fn decoder_hints(&self) -> DecoderHints {
        DecoderHints {
            output_format: DecoderOutputFormat::Opaque,
            extra_buffers: DECODER_EXTRA_BUFFERS,
            zero_initial_dimensions: true,
        }
    }

    pub fn export_pixel_format(&self) -> ExportPixelFormat {
        ExportPixelFormat::DrmPrime
    }

    /// Called by the renderer when it is done with exported images.
    ///
    /// The image stays owned by the pipeline and is reused for the next frame.
    pub fn release_images(&mut self) {}

    pub fn is_initialized(&self) -> bool {
        self.stage.is_initialized()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn plane_layout(&self) -> Option<&PlaneLayout> {
        self.stage.layout()
    }

    pub fn current_image(&self) -> Option<ImageHandle> {
        self.images.current_image()
    }

    pub fn frames_exported(&self) -> u64 {
        self.frames_exported
    }

    pub fn importer(&self) -> &I {
        self.images.importer()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Release the converter side first, then the image. Safe to call
    /// repeatedly and after a failed `initialize`.
    pub fn teardown(&mut self) {
        self.stage.teardown();
        self.images.destroy_image();
        self.resolution = None;
    }
}

impl<I: ImageImporter> Drop for ExportPipeline<I> {
    fn drop(&mut self) {
        if self.stage.is_initialized() || self.images.current_image().is_some() {
            debug!(frames = self.frames_exported, "Tearing down export pipeline");
        }
        self.teardown();
    }
}
