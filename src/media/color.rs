// SPDX-License-Identifier: GPL-3.0-only

//! Color metadata carried by decoded frames
//!
//! The mappings to import hints are total functions of the enum value; there
//! is no shared table to keep in sync.

use serde::{Deserialize, Serialize};

/// YUV matrix coefficients signalled by the bitstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    Rgb,
    Bt709,
    #[default]
    Unspecified,
    Fcc,
    Bt470bg,
    Smpte170m,
    Smpte240m,
    Ycgco,
    Bt2020Ncl,
    Bt2020Cl,
}

/// Sample value range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorRange {
    #[default]
    Unspecified,
    /// 16-235 luma (MPEG range)
    Limited,
    /// 0-255 luma (JPEG range)
    Full,
}

/// YUV matrix the GPU importer should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YuvColorSpaceHint {
    Rec601,
    Rec709,
    Rec2020,
}

/// Sample range the GPU importer should assume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRangeHint {
    Full,
    Narrow,
}

impl ColorSpace {
    /// Importer hint for this color space, `None` to let the driver choose
    pub fn yuv_hint(self) -> Option<YuvColorSpaceHint> {
        match self {
            ColorSpace::Bt2020Cl | ColorSpace::Bt2020Ncl => Some(YuvColorSpaceHint::Rec2020),
            ColorSpace::Smpte170m | ColorSpace::Bt470bg | ColorSpace::Fcc => {
                Some(YuvColorSpaceHint::Rec601)
            }
            ColorSpace::Bt709 => Some(YuvColorSpaceHint::Rec709),
            ColorSpace::Rgb
            | ColorSpace::Unspecified
            | ColorSpace::Smpte240m
            | ColorSpace::Ycgco => None,
        }
    }
}

impl ColorRange {
    /// Importer hint for this range, `None` when unspecified
    pub fn sample_range_hint(self) -> Option<SampleRangeHint> {
        match self {
            ColorRange::Full => Some(SampleRangeHint::Full),
            ColorRange::Limited => Some(SampleRangeHint::Narrow),
            ColorRange::Unspecified => None,
        }
    }
}

/// Color space and range of one frame.
///
/// An exported image is only valid for the metadata it was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ColorMetadata {
    pub space: ColorSpace,
    pub range: ColorRange,
}

impl ColorMetadata {
    pub const fn new(space: ColorSpace, range: ColorRange) -> Self {
        Self { space, range }
    }
}

impl std::fmt::Display for ColorMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{:?}", self.space, self.range)
    }
}
