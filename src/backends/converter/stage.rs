// SPDX-License-Identifier: GPL-3.0-only

//! Converter stage: owns the converter component, its ports, the one-buffer
//! output pool and the physical buffer that pool is bound to.

use super::completion::{CompletionReceiver, CompletionSender, completion_queue};
use super::hal::{
    CommittedFormat, ConverterComponent, Encoding, HalStatus, PortDirection, PortFormat,
};
use super::pool::{OutputPool, PoolBuffer};
use crate::backends::allocator::{PhysicalAllocator, PhysicalBuffer};
use crate::constants::{OUTPUT_BUFFER_COUNT, OUTPUT_BUFFER_NAME};
use crate::errors::{ExportError, ExportResult};
use crate::media::OpaqueFrame;
use crate::media::drm::DRM_FORMAT_MOD_INVALID;
use crate::media::layout::{DmaBufObject, PlaneLayout};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// State of one converter port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterPort {
    pub direction: PortDirection,
    /// Last committed format, `None` before the first successful commit
    pub format: Option<CommittedFormat>,
    pub enabled: bool,
}

impl ConverterPort {
    fn new(direction: PortDirection) -> Self {
        Self {
            direction,
            format: None,
            enabled: false,
        }
    }
}

/// Log a rejected HAL call and turn it into a configuration error
fn configuration_error(call: &str, status: HalStatus) -> ExportError {
    error!(call, status = %status, "Converter rejected configuration");
    ExportError::Configuration(format!("{} failed: {}", call, status))
}

pub struct ConverterStage {
    component: Option<Box<dyn ConverterComponent>>,
    allocator: Arc<dyn PhysicalAllocator>,
    input: ConverterPort,
    output: ConverterPort,
    pool: Option<OutputPool>,
    buffer: Option<PhysicalBuffer>,
    layout: Option<PlaneLayout>,
    completions: CompletionReceiver,
    /// Moved into the output callback when the output port is enabled
    completion_sender: Option<CompletionSender>,
    in_flight: bool,
    /// The outstanding conversion outlived a bounded wait
    timed_out: bool,
}

impl ConverterStage {
    pub fn new(component: Box<dyn ConverterComponent>, allocator: Arc<dyn PhysicalAllocator>) -> Self {
        let (sender, completions) = completion_queue(OUTPUT_BUFFER_COUNT as usize);
        Self {
            component: Some(component),
            allocator,
            input: ConverterPort::new(PortDirection::Input),
            output: ConverterPort::new(PortDirection::Output),
            pool: None,
            buffer: None,
            layout: None,
            completions,
            completion_sender: Some(sender),
            in_flight: false,
            timed_out: false,
        }
    }

    /// Configure both ports for `width` x `height` opaque input and NV12
    /// output, bind the output pool to a freshly allocated physical buffer
    /// and derive the plane layout.
    ///
    /// Any rejection is returned as is; a failed stage must be torn down.
    pub fn initialize(&mut self, width: u32, height: u32) -> ExportResult<()> {
        let component = self.component.as_mut().ok_or(ExportError::NotInitialized)?;
        info!(component = component.name(), width, height, "Initializing converter stage");

        let input_format = PortFormat::opaque_full_frame(width, height);
        let committed_input = component
            .commit_format(PortDirection::Input, &input_format)
            .map_err(|s| configuration_error("commit_format(input)", s))?;
        self.input.format = Some(committed_input);

        let output_format = input_format.converted_to(Encoding::Nv12, OUTPUT_BUFFER_COUNT);
        let committed_output = component
            .commit_format(PortDirection::Output, &output_format)
            .map_err(|s| configuration_error("commit_format(output)", s))?;
        self.output.format = Some(committed_output);

        if committed_output.format.buffer_num != OUTPUT_BUFFER_COUNT {
            error!(
                buffer_num = committed_output.format.buffer_num,
                "Converter insists on more than one output buffer"
            );
            return Err(ExportError::Configuration(format!(
                "output port wants {} buffers, only {} can be provided",
                committed_output.format.buffer_num, OUTPUT_BUFFER_COUNT
            )));
        }

        component
            .enable_input(Box::new(|buffer| {
                // The decoder keeps ownership of the opaque buffer
                trace!(buffer = buffer.0, "Converter consumed input buffer");
            }))
            .map_err(|s| configuration_error("enable_port(input)", s))?;
        self.input.enabled = true;

        let pool = OutputPool::new(OUTPUT_BUFFER_COUNT as usize);

        let buffer = PhysicalBuffer::allocate(
            Arc::clone(&self.allocator),
            committed_output.buffer_size,
            OUTPUT_BUFFER_NAME,
        )?;
        let (Some(fd), Some(device_address)) = (buffer.fd(), buffer.device_address()) else {
            return Err(ExportError::Allocation(
                "physical buffer has no descriptor".to_string(),
            ));
        };
        pool.bind(0, device_address, committed_output.buffer_size);
        self.pool = Some(pool);
        self.buffer = Some(buffer);

        let sender = self
            .completion_sender
            .take()
            .ok_or_else(|| ExportError::Configuration("output port already bound".to_string()))?;
        component
            .enable_output(Box::new(move |buffer: PoolBuffer| sender.push(buffer)))
            .map_err(|s| configuration_error("enable_port(output)", s))?;
        self.output.enabled = true;

        let pitch = committed_output
            .format
            .encoding
            .stride_for_width(committed_output.format.width);
        let layout = PlaneLayout::nv12(
            DmaBufObject {
                fd,
                size: committed_output.buffer_size,
                modifier: DRM_FORMAT_MOD_INVALID,
            },
            pitch,
            committed_output.format.height,
            width,
            height,
        );
        info!(layout = %layout, size = committed_output.buffer_size, "Converter stage ready");
        self.layout = Some(layout);

        Ok(())
    }

    /// Give the converter its output buffer back and queue `frame` for conversion.
    ///
    /// Only one conversion may be outstanding; submitting again before the
    /// previous one was collected with [`wait_for_completion`](Self::wait_for_completion)
    /// fails with [`ExportError::ConversionInFlight`]. The one exception is a
    /// conversion whose wait timed out: if it has completed since, it is
    /// discarded and the new frame goes ahead.
    pub fn submit_frame(&mut self, frame: &OpaqueFrame) -> ExportResult<()> {
        if self.in_flight {
            if !self.timed_out {
                return Err(ExportError::ConversionInFlight);
            }
            match self.completions.try_take() {
                Some(late) => {
                    warn!(index = late.index(), "Collected late conversion before new submission");
                    self.in_flight = false;
                    self.timed_out = false;
                }
                None => return Err(ExportError::ConversionInFlight),
            }
        }

        if !(self.input.enabled && self.output.enabled) {
            return Err(ExportError::NotInitialized);
        }
        let (Some(component), Some(pool)) = (self.component.as_mut(), self.pool.as_ref()) else {
            return Err(ExportError::NotInitialized);
        };

        while let Some(buffer) = pool.take_idle() {
            component.send_output(buffer).map_err(|s| {
                error!(status = %s, "Converter rejected output buffer");
                ExportError::Submission(format!("send_buffer(output) failed: {}", s))
            })?;
        }

        component.send_input(frame.buffer).map_err(|s| {
            error!(status = %s, buffer = frame.buffer.0, "Converter rejected input buffer");
            ExportError::Submission(format!("send_buffer(input) failed: {}", s))
        })?;

        self.in_flight = true;
        debug!(buffer = frame.buffer.0, "Submitted frame for conversion");
        Ok(())
    }

    /// Block until the outstanding conversion completes.
    ///
    /// The returned buffer goes back to the pool when dropped. On timeout the
    /// conversion stays outstanding.
    pub fn wait_for_completion(&mut self, timeout: Option<Duration>) -> ExportResult<PoolBuffer> {
        if !self.in_flight {
            return Err(ExportError::Submission(
                "no conversion has been submitted".to_string(),
            ));
        }

        let result = match timeout {
            Some(timeout) => self.completions.wait_and_take_timeout(timeout),
            None => self.completions.wait_and_take(),
        };
        let buffer = match result {
            Ok(buffer) => buffer,
            Err(err @ ExportError::ConversionTimeout(_)) => {
                self.timed_out = true;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        self.in_flight = false;
        self.timed_out = false;

        trace!(index = buffer.index(), length = buffer.length(), "Conversion complete");
        Ok(buffer)
    }

    /// Copy the first `len` bytes of the converted buffer (diagnostics)
    pub fn dump_output(&self, len: usize) -> ExportResult<Vec<u8>> {
        self.buffer
            .as_ref()
            .ok_or(ExportError::NotInitialized)?
            .read_prefix(len)
    }

    pub fn is_initialized(&self) -> bool {
        self.input.enabled && self.output.enabled && self.layout.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn layout(&self) -> Option<&PlaneLayout> {
        self.layout.as_ref()
    }

    pub fn input_port(&self) -> &ConverterPort {
        &self.input
    }

    pub fn output_port(&self) -> &ConverterPort {
        &self.output
    }

    pub fn physical_buffer(&self) -> Option<&PhysicalBuffer> {
        self.buffer.as_ref()
    }

    /// Idle buffers sitting in the output pool
    pub fn idle_output_buffers(&self) -> usize {
        self.pool.as_ref().map(OutputPool::idle_count).unwrap_or(0)
    }

    /// Disable ports, destroy the pool and the component, drop queued
    /// completions, then release the physical buffer.
    ///
    /// Each step is skipped if it never happened; calling this twice is harmless.
    pub fn teardown(&mut self) {
        if let Some(component) = self.component.as_mut() {
            if self.input.enabled {
                component.disable_port(PortDirection::Input);
                self.input.enabled = false;
            }
            if self.output.enabled {
                component.disable_port(PortDirection::Output);
                self.output.enabled = false;
            }
        }

        if let Some(pool) = self.pool.take() {
            pool.destroy();
        }

        if let Some(component) = self.component.take() {
            debug!(component = component.name(), "Destroying converter component");
            drop(component);
        }

        self.completions.drain();
        self.completion_sender = None;

        if let Some(mut buffer) = self.buffer.take() {
            buffer.release();
        }

        self.layout = None;
        self.in_flight = false;
        self.timed_out = false;
    }
}

impl Drop for ConverterStage {
    fn drop(&mut self) {
        self.teardown();
    }
}
