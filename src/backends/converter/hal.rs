// SPDX-License-Identifier: GPL-3.0-only

//! Hardware abstraction for the fixed-function image converter
//!
//! The converter is modelled as a component with one input and one output
//! port. Buffers are sent to a port and come back through the callback
//! bound when the port was enabled. Callbacks run on a thread owned by the
//! implementation, never on the thread that sent the buffer.

use super::pool::PoolBuffer;
use crate::media::NativeBufferHandle;
use std::fmt;

/// Which side of the converter a port is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// Pixel encoding of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Decoder-private layout, only meaningful to the converter
    Opaque,
    /// 2-plane YUV 4:2:0, interleaved chroma
    Nv12,
}

impl Encoding {
    /// Luma row stride in bytes for a committed width
    pub fn stride_for_width(self, width: u32) -> u32 {
        match self {
            Encoding::Opaque => 0,
            Encoding::Nv12 => width,
        }
    }
}

/// Crop rectangle inside the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Format descriptor of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortFormat {
    pub encoding: Encoding,
    pub width: u32,
    pub height: u32,
    pub crop: CropRect,
    /// Buffers the port expects to cycle
    pub buffer_num: u32,
}

impl PortFormat {
    /// Opaque frames of `width` x `height`, cropped to the whole frame
    pub fn opaque_full_frame(width: u32, height: u32) -> Self {
        Self {
            encoding: Encoding::Opaque,
            width,
            height,
            crop: CropRect {
                x: 0,
                y: 0,
                width,
                height,
            },
            buffer_num: 1,
        }
    }

    /// Same geometry, different encoding and buffer count
    pub fn converted_to(&self, encoding: Encoding, buffer_num: u32) -> Self {
        Self {
            encoding,
            buffer_num,
            ..*self
        }
    }
}

/// What the component settled on after a format commit.
///
/// Width and height may be rounded up to the hardware's alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedFormat {
    pub format: PortFormat,
    /// Bytes needed for one buffer in this format
    pub buffer_size: usize,
}

/// Failure status reported by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalStatus {
    OutOfMemory,
    OutOfResources,
    InvalidArgument,
    NotImplemented,
    NotFound,
    Io,
    Again,
    Corrupt,
    NotReady,
    InvalidConfig,
    Busy,
    Disabled,
}

impl HalStatus {
    /// Numeric status code, for log lines
    pub fn code(self) -> u32 {
        match self {
            HalStatus::OutOfMemory => 1,
            HalStatus::OutOfResources => 2,
            HalStatus::InvalidArgument => 3,
            HalStatus::NotImplemented => 4,
            HalStatus::NotFound => 5,
            HalStatus::Io => 7,
            HalStatus::Again => 14,
            HalStatus::Corrupt => 15,
            HalStatus::NotReady => 16,
            HalStatus::InvalidConfig => 17,
            HalStatus::Busy => 18,
            HalStatus::Disabled => 19,
        }
    }
}

impl fmt::Display for HalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HalStatus::OutOfMemory => "out of memory",
            HalStatus::OutOfResources => "out of resources",
            HalStatus::InvalidArgument => "invalid argument",
            HalStatus::NotImplemented => "function not implemented",
            HalStatus::NotFound => "no such file or directory",
            HalStatus::Io => "i/o error",
            HalStatus::Again => "resource temporarily unavailable",
            HalStatus::Corrupt => "data is corrupt",
            HalStatus::NotReady => "component is not ready",
            HalStatus::InvalidConfig => "component is not configured",
            HalStatus::Busy => "port is already in use",
            HalStatus::Disabled => "port is disabled",
        };
        write!(f, "{:x} ({})", self.code(), text)
    }
}

impl std::error::Error for HalStatus {}

pub type HalResult<T> = Result<T, HalStatus>;

/// Called when the converter is done reading an input buffer
pub type InputCallback = Box<dyn Fn(NativeBufferHandle) + Send + Sync + 'static>;

/// Called when the converter has filled an output buffer
pub type OutputCallback = Box<dyn Fn(PoolBuffer) + Send + Sync + 'static>;

/// A fixed-function converter with one input and one output port.
///
/// Dropping the component destroys it; implementations must stop invoking
/// callbacks before their `Drop` returns.
pub trait ConverterComponent: Send {
    /// Component name for logging, e.g. "vc.ril.isp"
    fn name(&self) -> &str;

    /// Apply `format` to a port
    fn commit_format(&mut self, port: PortDirection, format: &PortFormat)
    -> HalResult<CommittedFormat>;

    fn enable_input(&mut self, callback: InputCallback) -> HalResult<()>;

    fn enable_output(&mut self, callback: OutputCallback) -> HalResult<()>;

    /// Disable a port. Buffers the port still holds are handed back by dropping them.
    fn disable_port(&mut self, port: PortDirection);

    /// Queue a decoder buffer for conversion
    fn send_input(&mut self, buffer: NativeBufferHandle) -> HalResult<()>;

    /// Give the converter an output buffer to write into
    fn send_output(&mut self, buffer: PoolBuffer) -> HalResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_crop() {
        let format = PortFormat::opaque_full_frame(1920, 1080);
        assert_eq!(format.crop.x, 0);
        assert_eq!(format.crop.y, 0);
        assert_eq!((format.crop.width, format.crop.height), (1920, 1080));

        let nv12 = format.converted_to(Encoding::Nv12, 1);
        assert_eq!(nv12.encoding, Encoding::Nv12);
        assert_eq!(nv12.crop, format.crop);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(HalStatus::Busy.to_string(), "12 (port is already in use)");
        assert_eq!(HalStatus::OutOfMemory.to_string(), "1 (out of memory)");
    }
}
