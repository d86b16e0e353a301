//! Monitor Engine
//!
//! Owns the capture and render streams, the ring buffer between them, the
//! DSP chain and the start/stop/restart-on-disconnect state machine.
//!
//! The audio callbacks run on platform threads and must be real-time safe.
//! Everything here runs on the control thread or the recovery worker.
//!
//! ```text
//! mic ─► CaptureCallback ─► SampleRing ─► RenderCallback ─► DspChain ─► speaker
//!              │                                               ▲
//!              ▼                                               │ add_node /
//!          LevelMeter ◄── input_level()        control thread ─┘ set_param
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crossbeam::channel::Sender;

use super::backend::{AudioBackend, StreamDirection, StreamHandle, StreamRequest};
use super::callbacks::{CaptureCallback, LevelMeter, RenderCallback};
use super::config::EngineConfig;
use super::error::{AudioError, AudioResult};
use super::events::{
    event_channel, EngineEvent, EngineEvents, EventSender, DEFAULT_EVENT_BUFFER_SIZE,
};
use super::recovery::{
    recovery_channel, DisconnectNotifier, RecoveryMessage, RecoveryRequest, RecoveryWorker,
};
use super::ring_buffer::SampleRing;
use crate::dsp::{DspChain, DspContext, NodeRegistry};
use crate::nodes::create_node_registry;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Starting,
            2 => EngineState::Running,
            3 => EngineState::Stopping,
            _ => EngineState::Stopped,
        }
    }
}

/// Both open streams of a running session.
struct Streams {
    output: Box<dyn StreamHandle>,
    input: Box<dyn StreamHandle>,
}

/// State only touched with the lifecycle lock held.
struct Lifecycle {
    streams: Option<Streams>,
    /// Incremented on every successful start.
    session: u64,
    preferred_input_device: i32,
    events: EventSender,
}

/// State shared between the engine handle and the recovery worker.
struct EngineShared {
    config: EngineConfig,
    backend: Box<dyn AudioBackend>,
    registry: NodeRegistry,
    ring: Arc<SampleRing>,
    chain: Arc<DspChain>,
    meter: Arc<LevelMeter>,
    /// Mirror of the lifecycle state for lock-free reads.
    state: AtomicU8,
    lifecycle: Mutex<Lifecycle>,
    recovery_tx: Sender<RecoveryMessage>,
}

impl EngineShared {
    fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notifier(&self, session: u64, direction: StreamDirection) -> DisconnectNotifier {
        DisconnectNotifier::new(self.recovery_tx.clone(), session, direction)
    }

    /// Opens output then input. On failure everything opened so far is
    /// closed and the engine is left stopped.
    fn start_locked(&self, lifecycle: &mut Lifecycle) -> AudioResult<()> {
        if self.state() != EngineState::Stopped {
            return Ok(());
        }
        self.set_state(EngineState::Starting);

        let session = lifecycle.session + 1;
        let context = self.config.context();
        self.chain.prepare(context);
        self.ring.clear();
        self.meter.reset();

        let render = RenderCallback::new(
            Arc::clone(&self.ring),
            Arc::clone(&self.chain),
            self.config.channels,
        );
        let output = match self.backend.open_output(
            &StreamRequest::output(&self.config),
            render,
            self.notifier(session, StreamDirection::Output),
        ) {
            Ok(output) => output,
            Err(e) => return Err(self.fail_start(lifecycle, e)),
        };

        let capture = CaptureCallback::new(Arc::clone(&self.ring), Arc::clone(&self.meter));
        let input = match self.backend.open_input(
            &StreamRequest::input(&self.config, lifecycle.preferred_input_device),
            capture,
            self.notifier(session, StreamDirection::Input),
        ) {
            Ok(input) => input,
            Err(e) => {
                output.close();
                return Err(self.fail_start(lifecycle, e));
            }
        };

        lifecycle.session = session;
        lifecycle.streams = Some(Streams { output, input });
        self.set_state(EngineState::Running);

        log::info!(
            "Monitor engine started: {}Hz, {} channels, {} frames (session {})",
            context.sample_rate,
            context.channels,
            context.block_size,
            session
        );
        lifecycle.events.send_lossy(EngineEvent::Started {
            sample_rate: context.sample_rate,
            channels: context.channels,
        });
        Ok(())
    }

    fn fail_start(&self, lifecycle: &mut Lifecycle, error: AudioError) -> AudioError {
        self.ring.clear();
        self.set_state(EngineState::Stopped);
        log::error!("Monitor engine failed to start: {}", error);
        lifecycle
            .events
            .send_lossy(EngineEvent::StartFailed(error.clone()));
        error
    }

    /// Closes both streams and clears the ring. No-op when stopped.
    fn stop_locked(&self, lifecycle: &mut Lifecycle) {
        if self.state() == EngineState::Stopped {
            return;
        }
        self.set_state(EngineState::Stopping);

        if let Some(streams) = lifecycle.streams.take() {
            streams.input.close();
            streams.output.close();
        }
        self.ring.clear();
        self.meter.reset();

        self.set_state(EngineState::Stopped);
        log::info!("Monitor engine stopped (session {})", lifecycle.session);
        lifecycle.events.send_lossy(EngineEvent::Stopped);
    }

    /// Handles a disconnect on the recovery worker.
    fn recover(&self, request: RecoveryRequest) {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.session != request.session || self.state() != EngineState::Running {
            log::debug!(
                "Ignoring {} disconnect from session {} (current session {}, {:?})",
                request.direction,
                request.session,
                lifecycle.session,
                self.state()
            );
            return;
        }

        log::warn!("Audio {} stream lost, restarting", request.direction);
        lifecycle
            .events
            .send_lossy(EngineEvent::Disconnected(request.direction));

        self.stop_locked(&mut lifecycle);
        match self.start_locked(&mut lifecycle) {
            Ok(()) => {
                log::info!("Monitor engine restarted after {} disconnect", request.direction);
                lifecycle.events.send_lossy(EngineEvent::Restarted);
            }
            Err(e) => {
                log::error!("Restart after disconnect failed: {}", e);
                lifecycle.events.send_lossy(EngineEvent::RestartFailed(e));
            }
        }
    }
}

/// Full-duplex microphone monitor.
///
/// Captures from an input device, processes through a [`DspChain`] and plays
/// back on an output device. All methods take `&self` and are safe to call
/// while audio is running; start and stop are serialized internally.
///
/// # Example
///
/// ```ignore
/// let engine = MonitorEngine::new(EngineConfig::default(), Box::new(CpalBackend::new()))?;
/// engine.start()?;
/// let gain = engine.add_node("gain").unwrap();
/// engine.set_param(gain, GainNode::PARAM_GAIN, 1.5);
/// ```
pub struct MonitorEngine {
    shared: Arc<EngineShared>,
    worker: RecoveryWorker,
    events: Mutex<Option<EngineEvents>>,
}

impl MonitorEngine {
    /// Create an engine with the built-in node registry.
    pub fn new(config: EngineConfig, backend: Box<dyn AudioBackend>) -> AudioResult<Self> {
        Self::with_registry(config, backend, create_node_registry())
    }

    /// Create an engine with a custom node registry.
    ///
    /// Fails if `config` does not validate or the recovery thread cannot be
    /// spawned.
    pub fn with_registry(
        config: EngineConfig,
        backend: Box<dyn AudioBackend>,
        registry: NodeRegistry,
    ) -> AudioResult<Self> {
        config
            .validate()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?;

        let (recovery_tx, recovery_rx) = recovery_channel();
        let (event_tx, events) = event_channel(DEFAULT_EVENT_BUFFER_SIZE);

        let shared = Arc::new(EngineShared {
            ring: Arc::new(SampleRing::new(config.ring_capacity())),
            chain: Arc::new(DspChain::new()),
            meter: Arc::new(LevelMeter::new()),
            state: AtomicU8::new(EngineState::Stopped as u8),
            lifecycle: Mutex::new(Lifecycle {
                streams: None,
                session: 0,
                preferred_input_device: config.preferred_input_device,
                events: event_tx,
            }),
            recovery_tx: recovery_tx.clone(),
            config,
            backend,
            registry,
        });

        let weak: Weak<EngineShared> = Arc::downgrade(&shared);
        let worker = RecoveryWorker::spawn(recovery_tx, recovery_rx, move |request| {
            match weak.upgrade() {
                Some(shared) => {
                    shared.recover(request);
                    true
                }
                None => false,
            }
        })?;

        Ok(Self {
            shared,
            worker,
            events: Mutex::new(Some(events)),
        })
    }

    /// Open both streams and begin monitoring.
    ///
    /// Returns `Ok` without doing anything if already running. On failure
    /// nothing is left open and the engine is stopped.
    pub fn start(&self) -> AudioResult<()> {
        let mut lifecycle = self.shared.lock_lifecycle();
        self.shared.start_locked(&mut lifecycle)
    }

    /// Close both streams. Idempotent.
    pub fn stop(&self) {
        let mut lifecycle = self.shared.lock_lifecycle();
        self.shared.stop_locked(&mut lifecycle);
    }

    /// Remove every node from the chain.
    pub fn clear_chain(&self) {
        self.shared.chain.clear();
        log::debug!("Chain cleared");
    }

    /// Append a node of the registered type `name`.
    ///
    /// Returns its index in the chain, or `None` for an unknown type.
    pub fn add_node(&self, name: &str) -> Option<usize> {
        let Some(node) = self.shared.registry.create(name) else {
            log::warn!("Unknown node type '{}'", name);
            return None;
        };
        let index = self.shared.chain.add(node);
        log::debug!("Added node '{}' at index {}", name, index);
        Some(index)
    }

    /// Set a parameter on the node at `index`. Ignored for a bad index or
    /// parameter id.
    pub fn set_param(&self, index: usize, param_id: usize, value: f32) {
        if !self.shared.chain.set_param(index, param_id, value) {
            log::debug!("set_param ignored: no node at index {}", index);
        }
    }

    /// Read a parameter from the node at `index`.
    pub fn param(&self, index: usize, param_id: usize) -> Option<f32> {
        self.shared.chain.param(index, param_id)
    }

    /// Smoothed peak level of the captured signal.
    pub fn input_level(&self) -> f32 {
        self.shared.meter.level()
    }

    /// Select the input device used on the next input open. -1 selects the
    /// system default.
    pub fn set_preferred_input_device_id(&self, device_id: i32) {
        self.shared.lock_lifecycle().preferred_input_device = device_id;
        log::info!("Preferred input device set to {}", device_id);
    }

    /// The currently preferred input device id.
    pub fn preferred_input_device_id(&self) -> i32 {
        self.shared.lock_lifecycle().preferred_input_device
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Check if both streams are running.
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Number of nodes in the chain.
    pub fn chain_len(&self) -> usize {
        self.shared.chain.size()
    }

    /// Registry keys of the nodes in the chain, in processing order.
    pub fn chain_node_names(&self) -> Vec<&'static str> {
        self.shared.chain.node_names()
    }

    /// Context the chain was last prepared with, if the engine ever started.
    pub fn context(&self) -> Option<DspContext> {
        self.shared.chain.context()
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Registry keys of every node type `add_node` accepts.
    pub fn available_node_types(&self) -> Vec<&'static str> {
        self.shared
            .registry
            .list_nodes()
            .iter()
            .map(|info| info.id)
            .collect()
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn take_events(&self) -> Option<EngineEvents> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl Drop for MonitorEngine {
    fn drop(&mut self) {
        self.stop();
        self.worker.shutdown();
    }
}
