// SPDX-License-Identifier: GPL-3.0-only

//! Attribute lists for `EGL_LINUX_DMA_BUF_EXT` image imports
//!
//! Values come from `EGL_EXT_image_dma_buf_import` and
//! `EGL_EXT_image_dma_buf_import_modifiers`.

use crate::constants::MAX_EGL_ATTRIB_PAIRS;
use crate::media::PlaneLayout;
use crate::media::color::{ColorMetadata, SampleRangeHint, YuvColorSpaceHint};
use crate::media::drm::DRM_FORMAT_MOD_INVALID;
use crate::media::layout::MAX_PLANES;

pub const EGL_NONE: i32 = 0x3038;
pub const EGL_WIDTH: i32 = 0x3057;
pub const EGL_HEIGHT: i32 = 0x3056;

pub const EGL_LINUX_DMA_BUF_EXT: u32 = 0x3270;
pub const EGL_LINUX_DRM_FOURCC_EXT: i32 = 0x3271;

pub const EGL_DMA_BUF_PLANE0_FD_EXT: i32 = 0x3272;
pub const EGL_DMA_BUF_PLANE0_OFFSET_EXT: i32 = 0x3273;
pub const EGL_DMA_BUF_PLANE0_PITCH_EXT: i32 = 0x3274;
pub const EGL_DMA_BUF_PLANE1_FD_EXT: i32 = 0x3275;
pub const EGL_DMA_BUF_PLANE1_OFFSET_EXT: i32 = 0x3276;
pub const EGL_DMA_BUF_PLANE1_PITCH_EXT: i32 = 0x3277;
pub const EGL_DMA_BUF_PLANE2_FD_EXT: i32 = 0x3278;
pub const EGL_DMA_BUF_PLANE2_OFFSET_EXT: i32 = 0x3279;
pub const EGL_DMA_BUF_PLANE2_PITCH_EXT: i32 = 0x327A;
pub const EGL_DMA_BUF_PLANE3_FD_EXT: i32 = 0x3440;
pub const EGL_DMA_BUF_PLANE3_OFFSET_EXT: i32 = 0x3441;
pub const EGL_DMA_BUF_PLANE3_PITCH_EXT: i32 = 0x3442;

pub const EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT: i32 = 0x3443;
pub const EGL_DMA_BUF_PLANE0_MODIFIER_HI_EXT: i32 = 0x3444;
pub const EGL_DMA_BUF_PLANE1_MODIFIER_LO_EXT: i32 = 0x3445;
pub const EGL_DMA_BUF_PLANE1_MODIFIER_HI_EXT: i32 = 0x3446;
pub const EGL_DMA_BUF_PLANE2_MODIFIER_LO_EXT: i32 = 0x3447;
pub const EGL_DMA_BUF_PLANE2_MODIFIER_HI_EXT: i32 = 0x3448;
pub const EGL_DMA_BUF_PLANE3_MODIFIER_LO_EXT: i32 = 0x3449;
pub const EGL_DMA_BUF_PLANE3_MODIFIER_HI_EXT: i32 = 0x344A;

pub const EGL_YUV_COLOR_SPACE_HINT_EXT: i32 = 0x327B;
pub const EGL_SAMPLE_RANGE_HINT_EXT: i32 = 0x327C;
pub const EGL_ITU_REC601_EXT: i32 = 0x327F;
pub const EGL_ITU_REC709_EXT: i32 = 0x3280;
pub const EGL_ITU_REC2020_EXT: i32 = 0x3281;
pub const EGL_YUV_FULL_RANGE_EXT: i32 = 0x3282;
pub const EGL_YUV_NARROW_RANGE_EXT: i32 = 0x3283;

/// Per-plane attribute names, indexed by plane number
struct PlaneAttribs {
    fd: i32,
    offset: i32,
    pitch: i32,
    modifier_lo: i32,
    modifier_hi: i32,
}

const PLANE_ATTRIBS: [PlaneAttribs; MAX_PLANES] = [
    PlaneAttribs {
        fd: EGL_DMA_BUF_PLANE0_FD_EXT,
        offset: EGL_DMA_BUF_PLANE0_OFFSET_EXT,
        pitch: EGL_DMA_BUF_PLANE0_PITCH_EXT,
        modifier_lo: EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT,
        modifier_hi: EGL_DMA_BUF_PLANE0_MODIFIER_HI_EXT,
    },
    PlaneAttribs {
        fd: EGL_DMA_BUF_PLANE1_FD_EXT,
        offset: EGL_DMA_BUF_PLANE1_OFFSET_EXT,
        pitch: EGL_DMA_BUF_PLANE1_PITCH_EXT,
        modifier_lo: EGL_DMA_BUF_PLANE1_MODIFIER_LO_EXT,
        modifier_hi: EGL_DMA_BUF_PLANE1_MODIFIER_HI_EXT,
    },
    PlaneAttribs {
        fd: EGL_DMA_BUF_PLANE2_FD_EXT,
        offset: EGL_DMA_BUF_PLANE2_OFFSET_EXT,
        pitch: EGL_DMA_BUF_PLANE2_PITCH_EXT,
        modifier_lo: EGL_DMA_BUF_PLANE2_MODIFIER_LO_EXT,
        modifier_hi: EGL_DMA_BUF_PLANE2_MODIFIER_HI_EXT,
    },
    PlaneAttribs {
        fd: EGL_DMA_BUF_PLANE3_FD_EXT,
        offset: EGL_DMA_BUF_PLANE3_OFFSET_EXT,
        pitch: EGL_DMA_BUF_PLANE3_PITCH_EXT,
        modifier_lo: EGL_DMA_BUF_PLANE3_MODIFIER_LO_EXT,
        modifier_hi: EGL_DMA_BUF_PLANE3_MODIFIER_HI_EXT,
    },
];

impl YuvColorSpaceHint {
    pub fn egl_value(self) -> i32 {
        match self {
            YuvColorSpaceHint::Rec601 => EGL_ITU_REC601_EXT,
            YuvColorSpaceHint::Rec709 => EGL_ITU_REC709_EXT,
            YuvColorSpaceHint::Rec2020 => EGL_ITU_REC2020_EXT,
        }
    }
}

impl SampleRangeHint {
    pub fn egl_value(self) -> i32 {
        match self {
            SampleRangeHint::Full => EGL_YUV_FULL_RANGE_EXT,
            SampleRangeHint::Narrow => EGL_YUV_NARROW_RANGE_EXT,
        }
    }
}

/// Split a modifier into the low and high `EGLint` words, bits kept as is
fn modifier_words(modifier: u64) -> (isize, isize) {
    let lo = modifier as u32 as i32;
    let hi = (modifier >> 32) as u32 as i32;
    (lo as isize, hi as isize)
}

/// Build the `EGL_NONE`-terminated attribute list importing `layout` with
/// the color hints of `color`.
///
/// Modifier pairs are only emitted when the driver supports them and the
/// object carries a real modifier; `DRM_FORMAT_MOD_INVALID` means "implicit".
pub fn build_image_attribs(
    layout: &PlaneLayout,
    color: &ColorMetadata,
    modifiers_supported: bool,
) -> Vec<isize> {
    let mut attribs: Vec<isize> = Vec::with_capacity(MAX_EGL_ATTRIB_PAIRS * 2 + 1);
    let mut push = |key: i32, value: isize| {
        attribs.push(key as isize);
        attribs.push(value);
    };

    push(EGL_LINUX_DRM_FOURCC_EXT, layout.format() as isize);
    push(EGL_WIDTH, layout.width() as isize);
    push(EGL_HEIGHT, layout.height() as isize);

    for ((plane, object), names) in layout.planes().zip(PLANE_ATTRIBS.iter()) {
        push(names.fd, object.fd as isize);
        push(names.offset, plane.offset as isize);
        push(names.pitch, plane.pitch as isize);

        if modifiers_supported && object.modifier != DRM_FORMAT_MOD_INVALID {
            let (lo, hi) = modifier_words(object.modifier);
            push(names.modifier_lo, lo);
            push(names.modifier_hi, hi);
        }
    }

    if let Some(hint) = color.space.yuv_hint() {
        push(EGL_YUV_COLOR_SPACE_HINT_EXT, hint.egl_value() as isize);
    }
    if let Some(hint) = color.range.sample_range_hint() {
        push(EGL_SAMPLE_RANGE_HINT_EXT, hint.egl_value() as isize);
    }

    attribs.push(EGL_NONE as isize);
    debug_assert!(attribs.len() <= MAX_EGL_ATTRIB_PAIRS * 2 + 1);
    attribs
}

/// Look up the value following `key` in a terminated attribute list
pub fn attrib_value(attribs: &[isize], key: i32) -> Option<isize> {
    attribs
        .chunks(2)
        .take_while(|pair| pair[0] != EGL_NONE as isize)
        .find(|pair| pair.len() == 2 && pair[0] == key as isize)
        .map(|pair| pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::color::{ColorRange, ColorSpace};
    use crate::media::drm::{DRM_FORMAT_MOD_LINEAR, DRM_FORMAT_NV12};
    use crate::media::layout::DmaBufObject;

    fn layout(modifier: u64) -> PlaneLayout {
        PlaneLayout::nv12(
            DmaBufObject {
                fd: 42,
                size: 1920 * 1088 * 3 / 2,
                modifier,
            },
            1920,
            1088,
            1920,
            1080,
        )
    }

    #[test]
    fn test_nv12_attribs() {
        let color = ColorMetadata::new(ColorSpace::Bt709, ColorRange::Limited);
        let attribs = build_image_attribs(&layout(DRM_FORMAT_MOD_INVALID), &color, true);

        assert_eq!(attribs.last(), Some(&(EGL_NONE as isize)));
        assert_eq!(attrib_value(&attribs, EGL_LINUX_DRM_FOURCC_EXT), Some(DRM_FORMAT_NV12 as isize));
        assert_eq!(attrib_value(&attribs, EGL_WIDTH), Some(1920));
        assert_eq!(attrib_value(&attribs, EGL_HEIGHT), Some(1080));
        assert_eq!(attrib_value(&attribs, EGL_DMA_BUF_PLANE0_FD_EXT), Some(42));
        assert_eq!(attrib_value(&attribs, EGL_DMA_BUF_PLANE1_FD_EXT), Some(42));
        assert_eq!(attrib_value(&attribs, EGL_DMA_BUF_PLANE0_OFFSET_EXT), Some(0));
        assert_eq!(
            attrib_value(&attribs, EGL_DMA_BUF_PLANE1_OFFSET_EXT),
            Some(1920 * 1088)
        );
        assert_eq!(attrib_value(&attribs, EGL_DMA_BUF_PLANE2_FD_EXT), None);

        assert_eq!(
            attrib_value(&attribs, EGL_YUV_COLOR_SPACE_HINT_EXT),
            Some(EGL_ITU_REC709_EXT as isize)
        );
        assert_eq!(
            attrib_value(&attribs, EGL_SAMPLE_RANGE_HINT_EXT),
            Some(EGL_YUV_NARROW_RANGE_EXT as isize)
        );

        // Invalid modifier means implicit layout, never sent
        assert_eq!(attrib_value(&attribs, EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT), None);
    }

    #[test]
    fn test_unspecified_color_has_no_hints() {
        let attribs = build_image_attribs(
            &layout(DRM_FORMAT_MOD_INVALID),
            &ColorMetadata::default(),
            false,
        );
        assert_eq!(attrib_value(&attribs, EGL_YUV_COLOR_SPACE_HINT_EXT), None);
        assert_eq!(attrib_value(&attribs, EGL_SAMPLE_RANGE_HINT_EXT), None);
        // fourcc, width, height, 2 x (fd, offset, pitch), terminator
        assert_eq!(attribs.len(), 9 * 2 + 1);
    }

    #[test]
    fn test_explicit_modifier_only_when_supported() {
        let modifier = 0x0100_0000_0000_0004;
        let color = ColorMetadata::new(ColorSpace::Bt2020Ncl, ColorRange::Full);

        let with = build_image_attribs(&layout(modifier), &color, true);
        assert_eq!(attrib_value(&with, EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT), Some(4));
        assert_eq!(
            attrib_value(&with, EGL_DMA_BUF_PLANE0_MODIFIER_HI_EXT),
            Some(0x0100_0000)
        );
        assert_eq!(attrib_value(&with, EGL_DMA_BUF_PLANE1_MODIFIER_LO_EXT), Some(4));

        let without = build_image_attribs(&layout(modifier), &color, false);
        assert_eq!(attrib_value(&without, EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT), None);

        let linear = build_image_attribs(&layout(DRM_FORMAT_MOD_LINEAR), &color, true);
        assert_eq!(attrib_value(&linear, EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT), Some(0));
        assert!(linear.len() <= MAX_EGL_ATTRIB_PAIRS * 2 + 1);
    }

    #[test]
    fn test_modifier_words_keep_high_bit() {
        let color = ColorMetadata::default();
        let with = build_image_attribs(&layout(0x8000_0001_8000_0004), &color, true);
        assert_eq!(
            attrib_value(&with, EGL_DMA_BUF_PLANE0_MODIFIER_LO_EXT),
            Some(i32::MIN as isize + 4)
        );
        assert_eq!(
            attrib_value(&with, EGL_DMA_BUF_PLANE0_MODIFIER_HI_EXT),
            Some(i32::MIN as isize + 1)
        );
    }
}
