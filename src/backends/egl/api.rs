// SPDX-License-Identifier: GPL-3.0-only

//! EGL image entry points resolved at runtime
//!
//! `eglCreateImage` (EGL 1.5) takes `EGLAttrib` values while the older
//! `eglCreateImageKHR` takes `EGLint`. Both are looked up through
//! `eglGetProcAddress`; the core pair wins when the driver exposes both.

use super::attribs::EGL_LINUX_DMA_BUF_EXT;
use super::manager::{EglCapabilities, ImageHandle, ImageImporter};
use crate::errors::{ExportError, ExportResult};
use khronos_egl::{self as egl, EGL1_4};
use std::ffi::c_void;
use tracing::{debug, error, info, warn};

/// `EGL_BAD_ATTRIBUTE`, reported when an attribute cannot be narrowed
const EGL_BAD_ATTRIBUTE: i32 = 0x3004;

type CreateImageFn = unsafe extern "system" fn(
    display: *mut c_void,
    context: *mut c_void,
    target: u32,
    buffer: *mut c_void,
    attribs: *const isize,
) -> *mut c_void;

type CreateImageKhrFn = unsafe extern "system" fn(
    display: *mut c_void,
    context: *mut c_void,
    target: u32,
    buffer: *mut c_void,
    attribs: *const i32,
) -> *mut c_void;

type DestroyImageFn = unsafe extern "system" fn(display: *mut c_void, image: *mut c_void) -> u32;

/// The create/destroy pair in use
#[derive(Clone, Copy)]
pub enum ImageEntryPoints {
    Core {
        create: CreateImageFn,
        destroy: DestroyImageFn,
    },
    Khr {
        create: CreateImageKhrFn,
        destroy: DestroyImageFn,
    },
}

impl ImageEntryPoints {
    pub fn name(&self) -> &'static str {
        match self {
            ImageEntryPoints::Core { .. } => "eglCreateImage",
            ImageEntryPoints::Khr { .. } => "eglCreateImageKHR",
        }
    }
}

impl std::fmt::Debug for ImageEntryPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Narrow `EGLAttrib` values to `EGLint` for the KHR entry point.
///
/// dma-buf attributes (fds, offsets, pitches, 32-bit modifier halves) always fit.
pub fn narrow_attribs(attribs: &[isize]) -> Option<Vec<i32>> {
    attribs.iter().map(|&v| i32::try_from(v).ok()).collect()
}

/// Importer backed by a live EGL display
pub struct EglImageApi {
    instance: egl::DynamicInstance<EGL1_4>,
    display: egl::Display,
    capabilities: EglCapabilities,
    entry_points: ImageEntryPoints,
}

impl EglImageApi {
    /// Load libEGL, initialize the default display and resolve the image
    /// entry points.
    pub fn open_default() -> ExportResult<Self> {
        let instance = unsafe { egl::DynamicInstance::<EGL1_4>::load_required() }
            .map_err(|e| ExportError::Configuration(format!("cannot load libEGL: {}", e)))?;

        let display = unsafe { instance.get_display(egl::DEFAULT_DISPLAY) }
            .ok_or_else(|| ExportError::Configuration("no default EGL display".to_string()))?;

        let (major, minor) = instance
            .initialize(display)
            .map_err(|e| ExportError::Configuration(format!("eglInitialize() failed: {}", e)))?;
        info!(major, minor, "Initialized EGL display");

        Self::load(instance, display)
    }

    /// Query capabilities and resolve entry points on an initialized display
    pub fn load(instance: egl::DynamicInstance<EGL1_4>, display: egl::Display) -> ExportResult<Self> {
        let extensions = instance
            .query_string(Some(display), egl::EXTENSIONS)
            .map_err(|e| {
                ExportError::Configuration(format!("eglQueryString(EGL_EXTENSIONS) failed: {}", e))
            })?
            .to_string_lossy()
            .into_owned();

        let capabilities = EglCapabilities::from_extensions(&extensions);
        if !capabilities.dma_buf_import {
            error!("EGL_EXT_image_dma_buf_import unsupported");
            return Err(ExportError::Configuration(
                "EGL driver lacks EGL_EXT_image_dma_buf_import".to_string(),
            ));
        }

        let entry_points = Self::resolve_entry_points(&instance)?;
        info!(
            entry_point = entry_points.name(),
            modifiers = capabilities.dma_buf_modifiers,
            "EGL image import ready"
        );

        Ok(Self {
            instance,
            display,
            capabilities,
            entry_points,
        })
    }

    fn resolve_entry_points(instance: &egl::DynamicInstance<EGL1_4>) -> ExportResult<ImageEntryPoints> {
        let create = instance.get_proc_address("eglCreateImage");
        let destroy = instance.get_proc_address("eglDestroyImage");
        if let (Some(create), Some(destroy)) = (create, destroy) {
            // SAFETY: signatures fixed by the EGL 1.5 registry
            return Ok(unsafe {
                ImageEntryPoints::Core {
                    create: std::mem::transmute::<extern "system" fn(), CreateImageFn>(create),
                    destroy: std::mem::transmute::<extern "system" fn(), DestroyImageFn>(destroy),
                }
            });
        }

        let create = instance.get_proc_address("eglCreateImageKHR");
        let destroy = instance.get_proc_address("eglDestroyImageKHR");
        if let (Some(create), Some(destroy)) = (create, destroy) {
            debug!("Falling back to eglCreateImageKHR()");
            // SAFETY: signatures fixed by EGL_KHR_image_base
            return Ok(unsafe {
                ImageEntryPoints::Khr {
                    create: std::mem::transmute::<extern "system" fn(), CreateImageKhrFn>(create),
                    destroy: std::mem::transmute::<extern "system" fn(), DestroyImageFn>(destroy),
                }
            });
        }

        error!("Missing eglCreateImage()/eglDestroyImage() in EGL driver");
        Err(ExportError::Configuration(
            "EGL driver exposes neither eglCreateImage nor eglCreateImageKHR".to_string(),
        ))
    }

    pub fn entry_points(&self) -> ImageEntryPoints {
        self.entry_points
    }

    /// Error code of the last failed EGL call on this thread
    fn last_error(&self) -> i32 {
        self.instance.get_error().map(|e| e.native()).unwrap_or(0)
    }
}

impl ImageImporter for EglImageApi {
    fn capabilities(&self) -> EglCapabilities {
        self.capabilities
    }

    fn create_image(&mut self, attribs: &[isize]) -> Result<ImageHandle, i32> {
        let display = self.display.as_ptr();

        let image = match self.entry_points {
            ImageEntryPoints::Core { create, .. } => unsafe {
                create(
                    display,
                    std::ptr::null_mut(),
                    EGL_LINUX_DMA_BUF_EXT,
                    std::ptr::null_mut(),
                    attribs.as_ptr(),
                )
            },
            ImageEntryPoints::Khr { create, .. } => {
                let narrowed = narrow_attribs(attribs).ok_or_else(|| {
                    warn!("Attribute does not fit in EGLint");
                    EGL_BAD_ATTRIBUTE
                })?;
                unsafe {
                    create(
                        display,
                        std::ptr::null_mut(),
                        EGL_LINUX_DMA_BUF_EXT,
                        std::ptr::null_mut(),
                        narrowed.as_ptr(),
                    )
                }
            }
        };

        ImageHandle::from_raw(image as usize).ok_or_else(|| self.last_error())
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        let display = self.display.as_ptr();
        let destroy = match self.entry_points {
            ImageEntryPoints::Core { destroy, .. } | ImageEntryPoints::Khr { destroy, .. } => destroy,
        };

        let ok = unsafe { destroy(display, image.as_raw() as *mut c_void) };
        if ok == 0 {
            warn!(
                image = image.as_raw(),
                code = %format!("{:#x}", self.last_error()),
                "eglDestroyImage() failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::egl::attribs::{
        EGL_DMA_BUF_PLANE0_MODIFIER_HI_EXT, EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT, build_image_attribs,
    };
    use crate::media::layout::DmaBufObject;
    use crate::media::{ColorMetadata, PlaneLayout};

    #[test]
    fn test_narrow_attribs() {
        assert_eq!(
            narrow_attribs(&[0x3271, 0x3231564e, 0x3038]),
            Some(vec![0x3271, 0x3231564e, 0x3038])
        );
    }

    #[test]
    fn test_narrow_keeps_modifier_low_word_bits() {
        let object = DmaBufObject {
            fd: 9,
            size: 1920 * 1088 * 3 / 2,
            modifier: 0x0700_0000_8000_0004,
        };
        let layout = PlaneLayout::nv12(object, 1920, 1088, 1920, 1080);
        let attribs = build_image_attribs(&layout, &ColorMetadata::default(), true);

        let narrowed = narrow_attribs(&attribs).unwrap();
        assert_eq!(narrowed.len(), attribs.len());
        let lo = narrowed
            .chunks(2)
            .find(|pair| pair[0] == EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT)
            .map(|pair| pair[1]);
        assert_eq!(lo.map(|v| v as u32), Some(0x8000_0004));
        let hi = narrowed
            .chunks(2)
            .find(|pair| pair[0] == EGL_DMA_BUF_PLANE0_MODIFIER_HI_EXT)
            .map(|pair| pair[1]);
        assert_eq!(hi, Some(0x0700_0000));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_narrow_rejects_wide_values() {
        assert_eq!(narrow_attribs(&[0x3443, 1 << 40]), None);
    }
}
