//! CPAL audio backend
//!
//! Opens real input and output devices through cpal.
//!
//! # Threading
//!
//! ```text
//! ┌────────────────┐  open()   ┌──────────────────────┐
//! │ Control thread │──────────►│ Stream owner thread  │  builds + plays the
//! │  or recovery   │◄──────────│ (one per stream)     │  cpal::Stream, then
//! │    worker      │  result   └──────────┬───────────┘  parks until closed
//! └───────┬────────┘                      │
//!         │ close()                       │ data callback
//!         └──────── shutdown ────────────►│ (cpal audio thread)
//! ```
//!
//! `cpal::Stream` is not `Send`, so each stream lives on its own owner
//! thread for its whole lifetime. The build/play result is reported back
//! synchronously, so `open_*` still returns a real error on failure.
//!
//! The engine's channel count may differ from the device's. The data
//! callbacks map between the two: matching channels are copied, a mono
//! source is duplicated to every channel, and any other extra channel is
//! silent.

use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize};
use crossbeam::channel::{bounded, Receiver, Sender};

use super::backend::{AudioBackend, StreamDirection, StreamHandle, StreamRequest};
use super::callbacks::{CaptureCallback, RenderCallback};
use super::config::{PerformanceMode, SharingMode};
use super::error::{AudioError, AudioResult};
use super::recovery::DisconnectNotifier;

/// Frames per chunk when the engine and device channel counts differ.
const SCRATCH_FRAMES: usize = 4096;

/// Information about an audio input device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the default input device.
    pub is_default: bool,
    /// Index in the device list (for selection).
    pub index: usize,
}

/// Audio backend on the default cpal host.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    /// Create a backend using the platform's default host.
    pub fn new() -> Self {
        Self
    }

    /// Get information about all available input devices.
    ///
    /// The `index` of each entry is what the engine's preferred input device
    /// id refers to.
    pub fn enumerate_input_devices(&self) -> Vec<DeviceInfo> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        host.input_devices()
            .map(|devices| {
                devices
                    .enumerate()
                    .filter_map(|(index, device)| {
                        device.name().ok().map(|name| DeviceInfo {
                            is_default: Some(&name) == default_name.as_ref(),
                            name,
                            index,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl AudioBackend for CpalBackend {
    fn open_output(
        &self,
        request: &StreamRequest,
        render: RenderCallback,
        notifier: DisconnectNotifier,
    ) -> AudioResult<Box<dyn StreamHandle>> {
        let request = request.clone();
        let handle = CpalStreamHandle::spawn(StreamDirection::Output, move || {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(AudioError::NoOutputDevice)?;
            build_output_stream(&device, &request, render, notifier)
        })?;
        Ok(Box::new(handle))
    }

    fn open_input(
        &self,
        request: &StreamRequest,
        capture: CaptureCallback,
        notifier: DisconnectNotifier,
    ) -> AudioResult<Box<dyn StreamHandle>> {
        let request = request.clone();
        let handle = CpalStreamHandle::spawn(StreamDirection::Input, move || {
            let device = find_input_device(request.device_index)?;
            build_input_stream(&device, &request, capture, notifier)
        })?;
        Ok(Box::new(handle))
    }
}

/// Keeps a stream's owner thread alive. Closing or dropping it stops the
/// stream and joins the thread.
pub struct CpalStreamHandle {
    direction: StreamDirection,
    shutdown_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl CpalStreamHandle {
    /// Runs `open` on a new owner thread and waits for its result.
    fn spawn<F>(direction: StreamDirection, open: F) -> AudioResult<Self>
    where
        F: FnOnce() -> AudioResult<cpal::Stream> + Send + 'static,
    {
        let (ready_tx, ready_rx) = bounded::<AudioResult<()>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let thread = thread::Builder::new()
            .name(format!("mic-monitor-{}", direction))
            .spawn(move || run_stream_thread(direction, open, ready_tx, shutdown_rx))
            .map_err(|e| AudioError::BackendThread(e.to_string()))?;

        let mut handle = Self {
            direction,
            shutdown_tx,
            thread: Some(thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                handle.shutdown();
                Err(e)
            }
            Err(_) => {
                handle.shutdown();
                Err(AudioError::BackendThread(format!(
                    "{} stream thread exited before opening",
                    direction
                )))
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            // Fails only if the thread already exited.
            let _ = self.shutdown_tx.send(());
            if thread.join().is_err() {
                log::error!("{} stream thread panicked", self.direction);
            }
        }
    }
}

impl StreamHandle for CpalStreamHandle {
    fn close(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for CpalStreamHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_stream_thread<F>(
    direction: StreamDirection,
    open: F,
    ready_tx: Sender<AudioResult<()>>,
    shutdown_rx: Receiver<()>,
) where
    F: FnOnce() -> AudioResult<cpal::Stream>,
{
    let stream = match open() {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::StreamPlayError(e.to_string())));
        return;
    }

    log::info!("Audio {} stream started", direction);
    let _ = ready_tx.send(Ok(()));

    // Park until closed.
    let _ = shutdown_rx.recv();

    if let Err(e) = stream.pause() {
        log::warn!("Failed to pause {} stream: {}", direction, e);
    }
    drop(stream);
    log::info!("Audio {} stream closed", direction);
}

/// Select an input device by index, falling back to the default device.
fn find_input_device(index: Option<usize>) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();

    if let Some(index) = index {
        match host.input_devices() {
            Ok(mut devices) => {
                if let Some(device) = devices.nth(index) {
                    return Ok(device);
                }
                log::warn!(
                    "Input device {} not found, falling back to default",
                    index
                );
            }
            Err(e) => {
                log::warn!(
                    "Failed to enumerate input devices: {}, falling back to default",
                    e
                );
            }
        }
    }

    host.default_input_device().ok_or(AudioError::NoInputDevice)
}

/// Pick an f32 configuration at the requested sample rate, preferring the
/// requested channel count.
///
/// The sample rate is a hard requirement: input and output share one DSP
/// context, so there is no resampling between the two devices. In
/// low-latency mode the block size is requested as a fixed buffer, clamped
/// to what the device reports; a device that reports no range gets the
/// default buffer size.
fn negotiate_config<I>(ranges: I, request: &StreamRequest) -> AudioResult<StreamConfig>
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
    let rate = request.sample_rate;
    let candidates: Vec<_> = ranges
        .filter(|range| range.sample_format() == SampleFormat::F32)
        .filter(|range| rate >= range.min_sample_rate().0 && rate <= range.max_sample_rate().0)
        .collect();

    let best = candidates
        .iter()
        .find(|range| range.channels() as usize == request.channels)
        .or_else(|| candidates.iter().max_by_key(|range| range.channels()))
        .ok_or_else(|| {
            AudioError::ConfigError(format!(
                "no f32 {} configuration at {}Hz",
                request.direction, rate
            ))
        })?;

    let buffer_size = match (request.performance_mode, best.buffer_size()) {
        (PerformanceMode::LowLatency, SupportedBufferSize::Range { min, max }) => {
            BufferSize::Fixed((request.block_size as u32).clamp(*min, *max))
        }
        _ => BufferSize::Default,
    };

    Ok(StreamConfig {
        channels: best.channels(),
        sample_rate: SampleRate(rate),
        buffer_size,
    })
}

fn log_negotiated(device: &cpal::Device, request: &StreamRequest, config: &StreamConfig) {
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!(
        "Audio {} device: {} ({} channels, {}Hz, {:?})",
        request.direction,
        name,
        config.channels,
        config.sample_rate.0,
        config.buffer_size
    );
    if request.sharing_mode == SharingMode::Exclusive {
        log::debug!("Exclusive sharing requested; cpal opens devices in shared mode");
    }
    if config.channels as usize != request.channels {
        log::warn!(
            "Audio {} device has {} channels, mapping from {}",
            request.direction,
            config.channels,
            request.channels
        );
    }
}

/// Error callback shared by both directions.
fn error_callback(notifier: DisconnectNotifier) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| match err {
        cpal::StreamError::DeviceNotAvailable => {
            log::warn!("Audio {} device disconnected", notifier.direction());
            notifier.notify();
        }
        other => log::error!("Audio {} stream error: {}", notifier.direction(), other),
    }
}

fn build_output_stream(
    device: &cpal::Device,
    request: &StreamRequest,
    render: RenderCallback,
    notifier: DisconnectNotifier,
) -> AudioResult<cpal::Stream> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    let config = negotiate_config(ranges, request)?;
    log_negotiated(device, request, &config);

    let mut output = OutputAdapter::new(render, request.channels, config.channels as usize);
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| output.process(data),
            error_callback(notifier),
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

fn build_input_stream(
    device: &cpal::Device,
    request: &StreamRequest,
    capture: CaptureCallback,
    notifier: DisconnectNotifier,
) -> AudioResult<cpal::Stream> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    let config = negotiate_config(ranges, request)?;
    log_negotiated(device, request, &config);

    let mut input = InputAdapter::new(capture, request.channels, config.channels as usize);
    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| input.process(data),
            error_callback(notifier),
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

/// Copy frames between channel layouts.
///
/// Destination channel `c` takes source channel `c` if it exists, the only
/// source channel if the source is mono, and silence otherwise.
fn map_channels(src: &[f32], src_channels: usize, dst: &mut [f32], dst_channels: usize) {
    if src_channels == 0 || dst_channels == 0 {
        return;
    }
    for (src_frame, dst_frame) in src
        .chunks_exact(src_channels)
        .zip(dst.chunks_exact_mut(dst_channels))
    {
        for (c, out) in dst_frame.iter_mut().enumerate() {
            *out = if c < src_channels {
                src_frame[c]
            } else if src_channels == 1 {
                src_frame[0]
            } else {
                0.0
            };
        }
    }
}

/// Render callback plus the scratch space to remap its channels.
struct OutputAdapter {
    render: RenderCallback,
    engine_channels: usize,
    device_channels: usize,
    scratch: Vec<f32>,
}

impl OutputAdapter {
    fn new(render: RenderCallback, engine_channels: usize, device_channels: usize) -> Self {
        let scratch = if engine_channels == device_channels {
            Vec::new()
        } else {
            vec![0.0; SCRATCH_FRAMES * engine_channels]
        };
        Self {
            render,
            engine_channels,
            device_channels,
            scratch,
        }
    }

    fn process(&mut self, data: &mut [f32]) {
        if self.engine_channels == self.device_channels {
            self.render.on_audio(data);
            return;
        }
        if self.device_channels == 0 {
            return;
        }
        for chunk in data.chunks_mut(SCRATCH_FRAMES * self.device_channels) {
            let frames = chunk.len() / self.device_channels;
            let block = &mut self.scratch[..frames * self.engine_channels];
            self.render.on_audio(block);
            map_channels(block, self.engine_channels, chunk, self.device_channels);
        }
    }
}

/// Capture callback plus the scratch space to remap its channels.
struct InputAdapter {
    capture: CaptureCallback,
    engine_channels: usize,
    device_channels: usize,
    scratch: Vec<f32>,
}

impl InputAdapter {
    fn new(capture: CaptureCallback, engine_channels: usize, device_channels: usize) -> Self {
        let scratch = if engine_channels == device_channels {
            Vec::new()
        } else {
            vec![0.0; SCRATCH_FRAMES * engine_channels]
        };
        Self {
            capture,
            engine_channels,
            device_channels,
            scratch,
        }
    }

    fn process(&mut self, data: &[f32]) {
        if self.engine_channels == self.device_channels {
            self.capture.on_audio(data);
            return;
        }
        if self.device_channels == 0 {
            return;
        }
        for chunk in data.chunks(SCRATCH_FRAMES * self.device_channels) {
            let frames = chunk.len() / self.device_channels;
            let block = &mut self.scratch[..frames * self.engine_channels];
            map_channels(chunk, self.device_channels, block, self.engine_channels);
            self.capture.on_audio(block);
        }
    }
}
