//! Mic Monitor - low-latency microphone monitor
//!
//! Entry point for the command-line monitor.
//!
//! ```text
//! mic_monitor [--config engine.json] [--seconds 30] [--device 1]
//!             [--preset smooth] [--delay 120] [--pitch 1.1] [--pitch-mix 0.5]
//!             [--noise-suppression] [--list-devices] [--list-nodes]
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use mic_monitor::dsp::ParameterDefinition;
use mic_monitor::engine::{CpalBackend, EngineConfig, MonitorEngine};
use mic_monitor::monitor::{MicPreset, SpeechMonitor};
use mic_monitor::nodes::create_node_registry;

/// How often the level meter is printed.
const METER_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    seconds: Option<f32>,
    device: Option<i32>,
    preset: Option<MicPreset>,
    delay_ms: Option<u32>,
    pitch_ratio: Option<f32>,
    pitch_mix: Option<f32>,
    noise_suppression: bool,
    list_devices: bool,
    list_nodes: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Options, String> {
    fn value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
        let value = value.ok_or_else(|| format!("{} needs a value", flag))?;
        value
            .parse()
            .map_err(|_| format!("invalid value '{}' for {}", value, flag))
    }

    let mut options = Options::default();
    let mut args = args.skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => options.config = Some(value("--config", args.next())?),
            "--seconds" => options.seconds = Some(value("--seconds", args.next())?),
            "--device" => options.device = Some(value("--device", args.next())?),
            "--preset" => options.preset = Some(value("--preset", args.next())?),
            "--delay" => options.delay_ms = Some(value("--delay", args.next())?),
            "--pitch" => options.pitch_ratio = Some(value("--pitch", args.next())?),
            "--pitch-mix" => options.pitch_mix = Some(value("--pitch-mix", args.next())?),
            "--noise-suppression" => options.noise_suppression = true,
            "--list-devices" => options.list_devices = true,
            "--list-nodes" => options.list_nodes = true,
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }
    Ok(options)
}

fn main() {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let options = match parse_args(std::env::args()) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("mic_monitor: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(options) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

/// One line of the `--list-nodes` listing.
fn describe_parameter(index: usize, definition: &ParameterDefinition) -> String {
    let unit = definition.display.unit();
    let unit = if unit.is_empty() {
        String::new()
    } else {
        format!(" {}", unit)
    };
    let scale = if definition.display.is_logarithmic() {
        " (log)"
    } else {
        ""
    };
    format!(
        "  {}: {} [{} .. {}{}]{} default {}",
        index, definition.name, definition.min, definition.max, unit, scale, definition.default
    )
}

fn list_nodes() {
    let registry = create_node_registry();
    for info in registry.list_nodes() {
        println!("{} ({}): {}", info.id, info.name, info.description);
        if let Some(node) = registry.create(info.id) {
            for (index, definition) in node.parameters().iter().enumerate() {
                println!("{}", describe_parameter(index, definition));
            }
        }
    }
}

fn run(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    if options.list_nodes {
        list_nodes();
        return Ok(());
    }

    let backend = CpalBackend::new();

    if options.list_devices {
        for device in backend.enumerate_input_devices() {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}: {}{}", device.index, device.name, marker);
        }
        return Ok(());
    }

    let config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    log::info!("mic_monitor starting up");
    let engine = MonitorEngine::new(config, Box::new(backend))?;
    let mut monitor = SpeechMonitor::new(engine);
    let mut events = monitor.take_events();

    if let Some(device) = options.device {
        monitor.set_preferred_input_device_id(device)?;
    }
    if let Some(preset) = options.preset {
        monitor.set_mic_preset(preset);
    }
    if let Some(delay_ms) = options.delay_ms {
        monitor.set_feedback_mode(true);
        monitor.set_delay_ms(delay_ms);
    }
    if let Some(ratio) = options.pitch_ratio {
        monitor.set_pitch_ratio(ratio);
        monitor.set_pitch_mix(options.pitch_mix.unwrap_or(1.0));
    }
    monitor.set_noise_suppression(options.noise_suppression);

    monitor.start()?;
    println!("Monitoring... press Ctrl+C to quit");

    let deadline = options
        .seconds
        .map(|seconds| Instant::now() + Duration::from_secs_f32(seconds.max(0.0)));
    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        std::thread::sleep(METER_INTERVAL);

        if let Some(events) = events.as_mut() {
            for event in events.drain_events() {
                log::info!("Engine event: {:?}", event);
            }
        }

        let level = monitor.mic_input_level();
        let bars = (level * 40.0).round() as usize;
        print!("\r[{:<40}] {:.3}", "#".repeat(bars), level);
        std::io::stdout().flush()?;
    }
    println!();

    monitor.stop();
    Ok(())
}
