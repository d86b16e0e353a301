//! Offline audio backend
//!
//! An in-process backend with no devices. "Streams" are callback slots that
//! the host drives by calling [`OfflineBackend::pump`], one block at a time.
//! Useful for tests, benchmarks and rendering files.
//!
//! The backend is a cheap handle: clone it, give one clone to the engine and
//! keep the other to pump audio, simulate device disconnects and inject
//! open failures.

use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::{AudioBackend, StreamDirection, StreamHandle, StreamRequest};
use super::callbacks::{CaptureCallback, RenderCallback};
use super::error::{AudioError, AudioResult};
use super::recovery::DisconnectNotifier;

struct OpenStream<C> {
    id: u64,
    callback: C,
    notifier: DisconnectNotifier,
}

#[derive(Default)]
struct DirectionStats {
    opens: usize,
    closes: usize,
    fail_next: Option<AudioError>,
    last_request: Option<StreamRequest>,
}

#[derive(Default)]
struct OfflineState {
    next_id: u64,
    output: Option<OpenStream<RenderCallback>>,
    input: Option<OpenStream<CaptureCallback>>,
    output_stats: DirectionStats,
    input_stats: DirectionStats,
}

impl OfflineState {
    fn stats(&mut self, direction: StreamDirection) -> &mut DirectionStats {
        match direction {
            StreamDirection::Input => &mut self.input_stats,
            StreamDirection::Output => &mut self.output_stats,
        }
    }

    /// Records an open attempt and returns the id for the new stream, or
    /// the injected failure.
    fn begin_open(&mut self, request: &StreamRequest) -> AudioResult<u64> {
        let stats = self.stats(request.direction);
        stats.last_request = Some(request.clone());
        if let Some(error) = stats.fail_next.take() {
            return Err(error);
        }
        stats.opens += 1;
        self.next_id += 1;
        Ok(self.next_id)
    }
}

/// Backend whose streams are driven by the caller.
#[derive(Clone, Default)]
pub struct OfflineBackend {
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineBackend {
    /// Create a backend with no open streams.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, OfflineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs one block: `input` through the capture callback, then `output`
    /// through the render callback.
    ///
    /// Either side is skipped if its stream is not open; `output` is then
    /// left untouched. Returns true if both streams were open.
    pub fn pump(&self, input: &[f32], output: &mut [f32]) -> bool {
        let mut state = self.lock();
        let mut both = true;

        match state.input.as_mut() {
            Some(stream) => stream.callback.on_audio(input),
            None => both = false,
        }
        match state.output.as_mut() {
            Some(stream) => stream.callback.on_audio(output),
            None => both = false,
        }
        both
    }

    /// Reports a lost device on the open stream in `direction`, the way a
    /// platform error callback would. Returns false if no such stream is
    /// open.
    pub fn simulate_disconnect(&self, direction: StreamDirection) -> bool {
        let notifier = {
            let state = self.lock();
            match direction {
                StreamDirection::Input => state.input.as_ref().map(|s| s.notifier.clone()),
                StreamDirection::Output => state.output.as_ref().map(|s| s.notifier.clone()),
            }
        };
        match notifier {
            Some(notifier) => notifier.notify(),
            None => false,
        }
    }

    /// Makes the next open in `direction` fail with `error`.
    pub fn fail_next_open(&self, direction: StreamDirection, error: AudioError) {
        self.lock().stats(direction).fail_next = Some(error);
    }

    /// Whether a stream in `direction` is currently open.
    pub fn is_open(&self, direction: StreamDirection) -> bool {
        let state = self.lock();
        match direction {
            StreamDirection::Input => state.input.is_some(),
            StreamDirection::Output => state.output.is_some(),
        }
    }

    /// Number of successful opens in `direction`.
    pub fn open_count(&self, direction: StreamDirection) -> usize {
        self.lock().stats(direction).opens
    }

    /// Number of closes in `direction`.
    pub fn close_count(&self, direction: StreamDirection) -> usize {
        self.lock().stats(direction).closes
    }

    /// The most recent open request in `direction`, successful or not.
    pub fn last_request(&self, direction: StreamDirection) -> Option<StreamRequest> {
        self.lock().stats(direction).last_request.clone()
    }
}

impl AudioBackend for OfflineBackend {
    fn open_output(
        &self,
        request: &StreamRequest,
        render: RenderCallback,
        notifier: DisconnectNotifier,
    ) -> AudioResult<Box<dyn StreamHandle>> {
        let mut state = self.lock();
        let id = state.begin_open(request)?;
        state.output = Some(OpenStream {
            id,
            callback: render,
            notifier,
        });
        Ok(Box::new(OfflineStreamHandle {
            state: Arc::clone(&self.state),
            direction: StreamDirection::Output,
            id,
            closed: false,
        }))
    }

    fn open_input(
        &self,
        request: &StreamRequest,
        capture: CaptureCallback,
        notifier: DisconnectNotifier,
    ) -> AudioResult<Box<dyn StreamHandle>> {
        let mut state = self.lock();
        let id = state.begin_open(request)?;
        state.input = Some(OpenStream {
            id,
            callback: capture,
            notifier,
        });
        Ok(Box::new(OfflineStreamHandle {
            state: Arc::clone(&self.state),
            direction: StreamDirection::Input,
            id,
            closed: false,
        }))
    }
}

struct OfflineStreamHandle {
    state: Arc<Mutex<OfflineState>>,
    direction: StreamDirection,
    id: u64,
    closed: bool,
}

impl OfflineStreamHandle {
    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = self.id;
        // Only clear the slot if it still holds this stream.
        let removed = match self.direction {
            StreamDirection::Input => take_if_id(&mut state.input, id).is_some(),
            StreamDirection::Output => take_if_id(&mut state.output, id).is_some(),
        };
        if removed {
            state.stats(self.direction).closes += 1;
        }
    }
}

fn take_if_id<C>(slot: &mut Option<OpenStream<C>>, id: u64) -> Option<OpenStream<C>> {
    if slot.as_ref().map(|stream| stream.id) == Some(id) {
        slot.take()
    } else {
        None
    }
}

impl StreamHandle for OfflineStreamHandle {
    fn close(mut self: Box<Self>) {
        self.release();
    }
}

impl Drop for OfflineStreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}
