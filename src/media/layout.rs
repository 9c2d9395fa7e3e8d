// SPDX-License-Identifier: GPL-3.0-only

//! Plane layout of the converted buffer
//!
//! Describes how the bytes of the physical buffer map onto image planes, in
//! the object/layer/plane shape dma-buf importers expect. The layout is
//! derived once when the converter output format is committed and never
//! changes afterwards.

use super::drm::{DRM_FORMAT_NV12, fourcc_name};
use std::os::unix::io::RawFd;

/// Most planes a dma-buf import can describe
pub const MAX_PLANES: usize = 4;

/// One physical memory object (a dma-buf)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaBufObject {
    /// Descriptor owned by the physical buffer; borrowed here
    pub fd: RawFd,
    /// Size of the whole object in bytes
    pub size: usize,
    pub modifier: u64,
}

/// Placement of one image plane inside an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    pub object_index: usize,
    /// Byte offset of the first row
    pub offset: u32,
    /// Row stride in bytes
    pub pitch: u32,
}

/// A group of planes forming one image of a given DRM format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub format: u32,
    pub planes: Vec<Plane>,
}

/// Built through [`PlaneLayout::nv12`], which always yields exactly one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneLayout {
    width: u32,
    height: u32,
    objects: Vec<DmaBufObject>,
    layers: Vec<Layer>,
}

impl PlaneLayout {
    /// NV12 layout inside a single object.
    ///
    /// `plane_height` is the committed (possibly aligned) height of the luma
    /// plane; the chroma plane starts right after it with the same pitch.
    pub fn nv12(object: DmaBufObject, pitch: u32, plane_height: u32, width: u32, height: u32) -> Self {
        let luma = Plane {
            object_index: 0,
            offset: 0,
            pitch,
        };
        let chroma = Plane {
            object_index: 0,
            offset: pitch * plane_height,
            pitch,
        };

        Self {
            width,
            height,
            objects: vec![object],
            layers: vec![Layer {
                format: DRM_FORMAT_NV12,
                planes: vec![luma, chroma],
            }],
        }
    }

    /// Visible width of the image
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Visible height of the image
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn objects(&self) -> &[DmaBufObject] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The layer that gets exported. The converter only ever produces one.
    pub fn primary_layer(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn plane_count(&self) -> usize {
        self.primary_layer().planes.len()
    }

    pub fn format(&self) -> u32 {
        self.primary_layer().format
    }

    /// Planes of the primary layer paired with the object backing each one
    pub fn planes(&self) -> impl Iterator<Item = (&Plane, &DmaBufObject)> + '_ {
        self.primary_layer()
            .planes
            .iter()
            .map(|plane| (plane, &self.objects[plane.object_index]))
    }
}

impl std::fmt::Display for PlaneLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}x{}", fourcc_name(self.format()), self.width, self.height)?;
        for (i, plane) in self.primary_layer().planes.iter().enumerate() {
            write!(f, " p{}@{}/{}", i, plane.offset, plane.pitch)?;
        }
        Ok(())
    }
}
