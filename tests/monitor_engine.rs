//! End-to-end tests of the public engine API on the offline backend.

use std::time::{Duration, Instant};

use mic_monitor::engine::{
    AudioError, EngineConfig, EngineEvent, EngineState, MonitorEngine, OfflineBackend,
    StreamDirection,
};
use mic_monitor::monitor::{MicPreset, SpeechMonitor};
use mic_monitor::nodes::{DelayNode, GainNode, LimiterNode};

fn engine() -> (MonitorEngine, OfflineBackend) {
    let backend = OfflineBackend::new();
    let engine = MonitorEngine::new(EngineConfig::default(), Box::new(backend.clone())).unwrap();
    (engine, backend)
}

#[test]
fn test_gain_then_limiter_chain() {
    let (engine, backend) = engine();
    let gain = engine.add_node("gain").unwrap();
    let limiter = engine.add_node("limiter").unwrap();
    engine.set_param(gain, GainNode::PARAM_GAIN, 2.0);
    engine.set_param(limiter, LimiterNode::PARAM_THRESHOLD, 0.9);
    engine.set_param(limiter, LimiterNode::PARAM_RATIO, 1.0);
    engine.start().unwrap();

    let mut output = [0.0f32; 2];
    assert!(backend.pump(&[0.6, 0.2], &mut output));
    assert!((output[0] - 1.0).abs() < 1e-6);
    assert!((output[1] - 0.4).abs() < 1e-6);
}

#[test]
fn test_delay_echo_through_engine() {
    let (engine, backend) = engine();
    let delay = engine.add_node("delay").unwrap();
    engine.set_param(delay, DelayNode::PARAM_TIME_MS, 1.0);
    engine.set_param(delay, DelayNode::PARAM_FEEDBACK, 0.0);
    engine.set_param(delay, DelayNode::PARAM_MIX, 1.0);
    engine.start().unwrap();

    // 1 ms at 48 kHz is 48 frames.
    let mut input = vec![0.0f32; 96];
    input[0] = 1.0;
    let mut output = vec![0.0f32; 96];
    backend.pump(&input, &mut output);

    assert_eq!(output[0], 0.0);
    assert!((output[48] - 1.0).abs() < 1e-6);
    assert!(output.iter().enumerate().all(|(i, s)| i == 48 || *s == 0.0));
}

#[test]
fn test_lifecycle_events() {
    let (engine, backend) = engine();
    let mut events = engine.take_events().unwrap();

    backend.fail_next_open(StreamDirection::Input, AudioError::NoInputDevice);
    assert!(engine.start().is_err());
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(!backend.is_open(StreamDirection::Output));

    engine.start().unwrap();
    engine.stop();

    let events: Vec<_> = events.drain_events().collect();
    assert_eq!(
        events,
        vec![
            EngineEvent::StartFailed(AudioError::NoInputDevice),
            EngineEvent::Started {
                sample_rate: 48000,
                channels: 1
            },
            EngineEvent::Stopped,
        ]
    );
}

#[test]
fn test_recovers_from_disconnect() {
    let (engine, backend) = engine();
    engine.add_node("gain").unwrap();
    engine.start().unwrap();

    assert!(backend.simulate_disconnect(StreamDirection::Output));
    let deadline = Instant::now() + Duration::from_secs(2);
    while backend.open_count(StreamDirection::Input) < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(backend.open_count(StreamDirection::Input), 2);
    assert_eq!(backend.open_count(StreamDirection::Output), 2);

    // The chain survives a restart.
    assert_eq!(engine.chain_len(), 1);
    let mut output = [0.0f32; 1];
    let deadline = Instant::now() + Duration::from_secs(2);
    while !engine.is_running() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(backend.pump(&[0.25], &mut output));
    assert!((output[0] - 0.25).abs() < 1e-6);
}

#[test]
fn test_speech_monitor_session() {
    let backend = OfflineBackend::new();
    let engine = MonitorEngine::new(EngineConfig::default(), Box::new(backend.clone())).unwrap();
    let mut monitor = SpeechMonitor::new(engine);

    monitor.set_mic_preset(MicPreset::Smooth);
    monitor.start().unwrap();
    assert_eq!(
        monitor.engine().chain_node_names(),
        vec!["gain", "noise_gate", "delay", "faf_pitch"]
    );

    // Smooth preset scales the voice by 0.8, everything else is dry.
    let mut output = [0.0f32; 4];
    backend.pump(&[0.5, 0.5, 0.5, 0.5], &mut output);
    for sample in output {
        assert!((sample - 0.4).abs() < 1e-6);
    }

    monitor.stop();
    assert!(!backend.is_open(StreamDirection::Input));
}

#[test]
fn test_config_from_json() {
    let config = EngineConfig::from_json_str(r#"{ "sample_rate": 44100, "channels": 2 }"#).unwrap();
    let backend = OfflineBackend::new();
    let engine = MonitorEngine::new(config, Box::new(backend.clone())).unwrap();
    engine.start().unwrap();

    let request = backend.last_request(StreamDirection::Output).unwrap();
    assert_eq!(request.sample_rate, 44100);
    assert_eq!(request.channels, 2);
    assert_eq!(engine.context().map(|c| c.channels), Some(2));
}
