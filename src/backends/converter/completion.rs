// SPDX-License-Identifier: GPL-3.0-only

//! Completion queue between the converter callback thread and the caller
//!
//! A bounded single-producer/single-consumer channel. The producer side is
//! moved into the output port callback; the consumer side stays with the
//! converter stage. The channel also orders the converter's writes to the
//! buffer before the consumer's reads.

use super::pool::PoolBuffer;
use crate::errors::{ExportError, ExportResult};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;
use tracing::{debug, warn};

/// Create a completion queue holding at most `capacity` finished buffers
pub fn completion_queue(capacity: usize) -> (CompletionSender, CompletionReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (CompletionSender { tx }, CompletionReceiver { rx })
}

/// Producer half, used from the converter callback context
#[derive(Clone)]
pub struct CompletionSender {
    tx: SyncSender<PoolBuffer>,
}

impl CompletionSender {
    /// Hand a converted buffer to the waiting caller. Never blocks.
    ///
    /// A buffer that cannot be queued is dropped, which returns it to its pool.
    pub fn push(&self, buffer: PoolBuffer) {
        match self.tx.try_send(buffer) {
            Ok(()) => {}
            Err(TrySendError::Full(buffer)) => {
                warn!(index = buffer.index(), "Completion queue full, dropping converted buffer");
            }
            Err(TrySendError::Disconnected(buffer)) => {
                debug!(index = buffer.index(), "Completion queue closed, dropping converted buffer");
            }
        }
    }
}

/// Consumer half, used from the thread calling `export_frame`
pub struct CompletionReceiver {
    rx: Receiver<PoolBuffer>,
}

impl CompletionReceiver {
    /// Block until a converted buffer is available.
    ///
    /// Fails only when every producer is gone (the converter was destroyed).
    pub fn wait_and_take(&self) -> ExportResult<PoolBuffer> {
        self.rx.recv().map_err(|_| {
            ExportError::Submission("converter went away before completing the frame".to_string())
        })
    }

    /// Like [`wait_and_take`](Self::wait_and_take) but gives up after `timeout`
    pub fn wait_and_take_timeout(&self, timeout: Duration) -> ExportResult<PoolBuffer> {
        match self.rx.recv_timeout(timeout) {
            Ok(buffer) => Ok(buffer),
            Err(RecvTimeoutError::Timeout) => Err(ExportError::ConversionTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(ExportError::Submission(
                "converter went away before completing the frame".to_string(),
            )),
        }
    }

    /// Take a completion if one is already queued
    pub fn try_take(&self) -> Option<PoolBuffer> {
        self.rx.try_recv().ok()
    }

    /// Discard everything still queued; returns how many entries were dropped
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "Discarded pending completions");
        }
        dropped
    }
}
