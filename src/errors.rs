// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the conversion and export pipeline

use std::fmt;
use std::time::Duration;

/// Result type alias using ExportError
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors raised by the converter stage, the image export manager and the
/// pipeline orchestrator.
///
/// Every error is returned synchronously to the call that triggered it.
/// Nothing in this crate retries on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Port format, port enable or EGL capability setup was rejected.
    /// The pipeline is unusable afterwards.
    Configuration(String),
    /// The converter input port rejected a frame (busy or disabled)
    Submission(String),
    /// EGL refused to import the dma-buf
    ImageCreation {
        /// Native EGL error code reported right after the failed call
        code: i32,
        /// Which entry point failed
        message: String,
    },
    /// Physical buffer or dma-buf descriptor allocation failed
    Allocation(String),
    /// A frame was submitted while the previous conversion was still undrained
    ConversionInFlight,
    /// The converter did not report completion within the configured timeout
    ConversionTimeout(Duration),
    /// Requested size is above what the converter can handle
    ResolutionUnsupported { width: u32, height: u32 },
    /// An operation needed a fully initialized pipeline
    NotInitialized,
    /// Configuration file or device node I/O failure
    Io(String),
}

impl ExportError {
    /// Whether the pipeline must be discarded after this error.
    ///
    /// Frame-scoped failures (submission, image creation, timeout) leave the
    /// pipeline in a state where the caller may decide what to do next.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExportError::Configuration(_)
                | ExportError::Allocation(_)
                | ExportError::ResolutionUnsupported { .. }
                | ExportError::NotInitialized
        )
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ExportError::Submission(msg) => write!(f, "Frame submission failed: {}", msg),
            ExportError::ImageCreation { code, message } => {
                write!(f, "Image creation failed: {} (EGL error 0x{:x})", message, code)
            }
            ExportError::Allocation(msg) => write!(f, "Allocation failed: {}", msg),
            ExportError::ConversionInFlight => {
                write!(f, "A conversion is already in flight; frames must be exported one at a time")
            }
            ExportError::ConversionTimeout(timeout) => {
                write!(f, "Conversion did not complete within {} ms", timeout.as_millis())
            }
            ExportError::ResolutionUnsupported { width, height } => {
                write!(f, "Resolution {}x{} is not supported by the converter", width, height)
            }
            ExportError::NotInitialized => write!(f, "Pipeline is not initialized"),
            ExportError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Io(format!("invalid configuration: {}", err))
    }
}
