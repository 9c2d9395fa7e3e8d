// SPDX-License-Identifier: MPL-2.0

//! Test doubles for the converter, the physical allocator and EGL

#![allow(dead_code)]

use isp_export::backends::allocator::{Allocation, PhysicalAllocator};
use isp_export::backends::converter::{
    CommittedFormat, ConverterComponent, Encoding, HalResult, HalStatus, InputCallback,
    OutputCallback, PoolBuffer, PortDirection, PortFormat,
};
use isp_export::backends::egl::{EglCapabilities, ImageHandle, ImageImporter};
use isp_export::errors::{ExportError, ExportResult};
use isp_export::media::{ColorMetadata, NativeBufferHandle, OpaqueFrame};
use std::os::unix::io::{FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Ordered record of teardown-relevant calls across all doubles
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &EventLog, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn align_up(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

/// How the scripted converter misbehaves
#[derive(Debug, Clone, Copy, Default)]
pub struct Script {
    /// Reject the output format commit
    pub fail_output_commit: Option<HalStatus>,
    /// Ask for this many output buffers instead of the requested count
    pub output_buffer_num: Option<u32>,
    /// Reject every input buffer
    pub fail_send_input: Option<HalStatus>,
    /// Accept input but never complete the conversion
    pub hang: bool,
    /// Complete conversions only after this long
    pub completion_delay: Option<Duration>,
    /// Reject enabling the input port
    pub fail_enable_input: Option<HalStatus>,
    /// Reject enabling the output port
    pub fail_enable_output: Option<HalStatus>,
}

/// Converter double that completes conversions on its own threads.
///
/// NV12 output is aligned to 32x16 like the real ISP.
pub struct ScriptedConverter {
    script: Script,
    log: EventLog,
    input_callback: Option<Arc<dyn Fn(NativeBufferHandle) + Send + Sync>>,
    output_callback: Option<Arc<dyn Fn(PoolBuffer) + Send + Sync>>,
    held_output: Vec<PoolBuffer>,
    workers: Vec<JoinHandle<()>>,
    pub inputs_sent: Arc<AtomicUsize>,
}

impl ScriptedConverter {
    pub fn new(log: EventLog) -> Self {
        Self::with_script(log, Script::default())
    }

    pub fn with_script(log: EventLog, script: Script) -> Self {
        Self {
            script,
            log,
            input_callback: None,
            output_callback: None,
            held_output: Vec::new(),
            workers: Vec::new(),
            inputs_sent: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ConverterComponent for ScriptedConverter {
    fn name(&self) -> &str {
        "scripted.isp"
    }

    fn commit_format(
        &mut self,
        port: PortDirection,
        format: &PortFormat,
    ) -> HalResult<CommittedFormat> {
        match port {
            PortDirection::Input => Ok(CommittedFormat {
                format: *format,
                buffer_size: 128,
            }),
            PortDirection::Output => {
                if let Some(status) = self.script.fail_output_commit {
                    return Err(status);
                }
                if format.encoding != Encoding::Nv12 {
                    return Err(HalStatus::InvalidArgument);
                }
                let width = align_up(format.width, 32);
                let height = align_up(format.height, 16);
                let mut committed = *format;
                committed.width = width;
                committed.height = height;
                committed.buffer_num = self.script.output_buffer_num.unwrap_or(format.buffer_num);
                Ok(CommittedFormat {
                    format: committed,
                    buffer_size: width as usize * height as usize * 3 / 2,
                })
            }
        }
    }

    fn enable_input(&mut self, callback: InputCallback) -> HalResult<()> {
        if let Some(status) = self.script.fail_enable_input {
            return Err(status);
        }
        if self.input_callback.is_some() {
            return Err(HalStatus::Busy);
        }
        self.input_callback = Some(Arc::from(callback));
        record(&self.log, "enable input");
        Ok(())
    }

    fn enable_output(&mut self, callback: OutputCallback) -> HalResult<()> {
        if let Some(status) = self.script.fail_enable_output {
            return Err(status);
        }
        if self.output_callback.is_some() {
            return Err(HalStatus::Busy);
        }
        self.output_callback = Some(Arc::from(callback));
        record(&self.log, "enable output");
        Ok(())
    }

    fn disable_port(&mut self, port: PortDirection) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        match port {
            PortDirection::Input => self.input_callback = None,
            PortDirection::Output => {
                self.output_callback = None;
                self.held_output.clear();
            }
        }
        record(&self.log, format!("disable {}", port));
    }

    fn send_input(&mut self, buffer: NativeBufferHandle) -> HalResult<()> {
        if let Some(status) = self.script.fail_send_input {
            return Err(status);
        }
        let (Some(input_cb), Some(output_cb)) =
            (self.input_callback.clone(), self.output_callback.clone())
        else {
            return Err(HalStatus::Disabled);
        };
        self.inputs_sent.fetch_add(1, Ordering::SeqCst);

        if self.script.hang {
            return Ok(());
        }
        let Some(mut output) = self.held_output.pop() else {
            return Err(HalStatus::Again);
        };

        let delay = self.script.completion_delay;
        self.workers.push(std::thread::spawn(move || {
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            input_cb(buffer);
            let length = output.header().alloc_size;
            output.set_length(length);
            output_cb(output);
        }));
        Ok(())
    }

    fn send_output(&mut self, buffer: PoolBuffer) -> HalResult<()> {
        if self.output_callback.is_none() {
            return Err(HalStatus::Disabled);
        }
        self.held_output.push(buffer);
        Ok(())
    }
}

impl Drop for ScriptedConverter {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        self.held_output.clear();
        record(&self.log, "destroy component");
    }
}

/// Allocator handing out memfds, counting every call
pub struct CountingAllocator {
    log: EventLog,
    pub allocs: AtomicUsize,
    pub exports: AtomicUsize,
    pub frees: AtomicUsize,
    memfds: Mutex<Vec<(u64, OwnedFd)>>,
}

impl CountingAllocator {
    pub fn new(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            allocs: AtomicUsize::new(0),
            exports: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            memfds: Mutex::new(Vec::new()),
        })
    }

    pub fn live(&self) -> usize {
        self.memfds.lock().unwrap().len()
    }
}

impl PhysicalAllocator for CountingAllocator {
    fn name(&self) -> &str {
        "counting"
    }

    fn allocate(&self, size: usize, _label: &str) -> ExportResult<Allocation> {
        let fd = unsafe { libc::memfd_create(c"isp-export-test".as_ptr(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            return Err(ExportError::Allocation("memfd_create failed".to_string()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        let file = std::fs::File::from(fd);
        file.set_len(size as u64)?;

        let handle = self.allocs.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        self.memfds.lock().unwrap().push((handle, file.into()));
        Ok(Allocation {
            handle,
            device_address: 0xC000_0000 + handle * 0x0100_0000,
            size,
        })
    }

    fn export_dmabuf(&self, allocation: &Allocation) -> ExportResult<OwnedFd> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        let memfds = self.memfds.lock().unwrap();
        let (_, fd) = memfds
            .iter()
            .find(|(handle, _)| *handle == allocation.handle)
            .ok_or_else(|| ExportError::Allocation("unknown handle".to_string()))?;
        Ok(fd.try_clone()?)
    }

    fn free(&self, allocation: Allocation) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        self.memfds
            .lock()
            .unwrap()
            .retain(|(handle, _)| *handle != allocation.handle);
        record(&self.log, "free allocation");
    }
}

#[derive(Default)]
pub struct ImporterState {
    pub created: Vec<(ImageHandle, Vec<isize>)>,
    pub destroyed: Vec<ImageHandle>,
    /// Fail the next create with this EGL error code
    pub fail_next: Option<i32>,
    next: usize,
}

/// EGL importer double recording every create and destroy
pub struct RecordingImporter {
    pub caps: EglCapabilities,
    pub state: Arc<Mutex<ImporterState>>,
    log: EventLog,
}

impl RecordingImporter {
    pub fn new(log: EventLog) -> (Self, Arc<Mutex<ImporterState>>) {
        let state = Arc::new(Mutex::new(ImporterState::default()));
        let importer = Self {
            caps: EglCapabilities {
                dma_buf_import: true,
                dma_buf_modifiers: true,
            },
            state: Arc::clone(&state),
            log,
        };
        (importer, state)
    }
}

impl ImageImporter for RecordingImporter {
    fn capabilities(&self) -> EglCapabilities {
        self.caps
    }

    fn create_image(&mut self, attribs: &[isize]) -> Result<ImageHandle, i32> {
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.fail_next.take() {
            return Err(code);
        }
        state.next += 1;
        let image = ImageHandle::from_raw(0x5000 + state.next).unwrap();
        state.created.push((image, attribs.to_vec()));
        Ok(image)
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        self.state.lock().unwrap().destroyed.push(image);
        record(&self.log, "destroy image");
    }
}

pub fn frame(width: u32, height: u32, color: ColorMetadata) -> OpaqueFrame {
    OpaqueFrame::new(NativeBufferHandle(0xdead_0000), width, height, color)
}
