// SPDX-License-Identifier: MPL-2.0

//! Fixed-function converter stage
//!
//! Turns decoder-private opaque frames into linear NV12 inside a single
//! physical buffer that is shared with the GPU.
//!
//! ```text
//! decoder ──(opaque buffer)──▶ input port ─▶ converter ─▶ output port
//!                                                             │
//!                          completion queue ◀── callback ─────┘
//!                                 │
//!                     wait_for_completion() ──▶ caller
//! ```
//!
//! # Modules
//!
//! - [`hal`]: Component/port abstraction over the converter hardware
//! - [`pool`]: Output buffer pool bound to externally owned memory
//! - [`completion`]: Bounded handoff from the callback thread
//! - [`stage`]: Configuration, submission and teardown

pub mod completion;
pub mod hal;
pub mod pool;
pub mod stage;

pub use completion::{CompletionReceiver, CompletionSender, completion_queue};
pub use hal::{
    CommittedFormat, ConverterComponent, CropRect, Encoding, HalResult, HalStatus, InputCallback,
    OutputCallback, PortDirection, PortFormat,
};
pub use pool::{BufferHeader, OutputPool, PoolBuffer};
pub use stage::{ConverterPort, ConverterStage};
