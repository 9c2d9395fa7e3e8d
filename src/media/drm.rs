// SPDX-License-Identifier: GPL-3.0-only

//! DRM format codes (fourcc) and modifiers used for dma-buf import

/// Build a little-endian fourcc code
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

/// 2-plane YUV 4:2:0, interleaved CbCr
pub const DRM_FORMAT_NV12: u32 = fourcc(b'N', b'V', b'1', b'2');

/// Linear modifier (no tiling)
pub const DRM_FORMAT_MOD_LINEAR: u64 = 0;
/// Invalid modifier: the layout is implied by the allocator
pub const DRM_FORMAT_MOD_INVALID: u64 = 0x00ff_ffff_ffff_ffff;

/// Human readable fourcc, e.g. "NV12"
pub fn fourcc_name(code: u32) -> String {
    code.to_le_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}
