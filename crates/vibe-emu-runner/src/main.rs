use clap::Parser;
use log::{debug, info, warn};
use serde::de::{DeserializeOwned, IntoDeserializer};
use std::path::PathBuf;
use thiserror::Error;

use vibe_emu_output::blend::BlendMode;
use vibe_emu_output::host::HostIo;
use vibe_emu_output::pipeline::{Pipeline, PipelineError};
use vibe_emu_output::resampler::ResamplerKind;
use vibe_emu_output::speed::SpeedInput;
use vibe_emu_runner::audio_queue::audio_queue;
use vibe_emu_runner::config::{self, RunnerConfig, SaveError};
use vibe_emu_runner::host::{DeviceDrain, HeadlessEnv, HeadlessVideo};
use vibe_emu_runner::tone::ToneCore;

#[derive(Error, Debug)]
enum RunnerError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to save config: {0}")]
    Save(#[from] SaveError),
}

/// Parse a kebab-case enum value the same way the config file does.
fn parse_kebab<T: DeserializeOwned>(s: &str) -> Result<T, serde::de::value::Error> {
    T::deserialize(s.into_deserializer())
}

#[derive(Parser)]
struct Args {
    /// Path to runner config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of host ticks to run
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Resampler backend (sinc or cosine)
    #[arg(long, value_parser = parse_kebab::<ResamplerKind>)]
    resampler: Option<ResamplerKind>,

    /// Interframe blending (none, mix, ghosting-accurate, ghosting-fast)
    #[arg(long, value_parser = parse_kebab::<BlendMode>)]
    blend: Option<BlendMode>,

    /// Ticks at which the fast-forward chord is pressed
    #[arg(long, value_delimiter = ',')]
    fast_forward_at: Vec<u64>,

    /// Ticks at which the slow-motion chord is pressed
    #[arg(long, value_delimiter = ',')]
    slow_motion_at: Vec<u64>,

    /// First tick of the host fast-forward override
    #[arg(long)]
    override_from: Option<u64>,

    /// Tick at which the host fast-forward override is released
    #[arg(long)]
    override_to: Option<u64>,

    /// Stretch every Nth frame to 1.5x its length
    #[arg(long)]
    long_frame_every: Option<u32>,

    /// Stereo pairs the simulated device consumes per tick
    #[arg(long)]
    sink_frames_per_tick: Option<usize>,

    /// Simulate a host that cannot repeat frames
    #[arg(long)]
    no_dupe: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Write the effective config back to the config file
    #[arg(long)]
    save_config: bool,

    /// Play the output on the default audio device in real time
    #[cfg(feature = "cpal-output")]
    #[arg(long)]
    play: bool,
}

impl Args {
    fn apply_to(&self, cfg: &mut RunnerConfig) {
        if let Some(kind) = self.resampler {
            cfg.pipeline.resampler = kind;
        }
        if let Some(mode) = self.blend {
            cfg.pipeline.blend = mode;
        }
        if self.long_frame_every.is_some() {
            cfg.host.long_frame_every = self.long_frame_every;
        }
        if self.sink_frames_per_tick.is_some() {
            cfg.host.device_frames_per_tick = self.sink_frames_per_tick;
        }
        if self.no_dupe {
            cfg.host.can_dupe = false;
        }
    }

    fn input_for(&self, tick: u64) -> SpeedInput {
        let overriding = match (self.override_from, self.override_to) {
            (Some(from), Some(to)) => (from..to).contains(&tick),
            (Some(from), None) => tick >= from,
            _ => false,
        };
        SpeedInput {
            fast_forward_chord: self.fast_forward_at.contains(&tick),
            slow_motion_chord: self.slow_motion_at.contains(&tick),
            fast_forward_override: overriding,
        }
    }
}

fn run(args: &Args) -> Result<(), RunnerError> {
    let path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_from_file(&path);
    args.apply_to(&mut cfg);
    if args.save_config {
        config::save_to_file(&path, &cfg)?;
        info!("Saved config to {}", path.display());
    }

    let mut env = HeadlessEnv::new(cfg.host.can_dupe);
    let mut pipeline = Pipeline::new(cfg.pipeline.clone(), &mut env)?;
    let effective = pipeline.config().clone();
    info!(
        "Pipeline ready: {} resampler at {} Hz, blend {}, speed {}",
        pipeline.resampler_kind(),
        pipeline.output_rate(),
        effective.blend,
        pipeline.speed_state()
    );

    let mut core = ToneCore::new(
        effective.native_sample_rate,
        effective.samples_per_frame,
        cfg.host.tone_hz,
    )
    .with_long_frames(cfg.host.long_frame_every);
    let (mut producer, consumer) = audio_queue(cfg.host.queue_frames);
    let mut video = HeadlessVideo::default();

    // A real device drains the queue itself; otherwise simulate one.
    #[cfg(feature = "cpal-output")]
    let (_stream, mut device) = if args.play {
        let rate = pipeline.output_rate().round() as u32;
        let stream = vibe_emu_runner::audio::start_stream(consumer, rate);
        if stream.is_none() {
            warn!("Audio playback unavailable; audio output is discarded by the full queue");
        }
        (stream, None)
    } else {
        (None, Some(DeviceDrain::new(consumer)))
    };
    #[cfg(not(feature = "cpal-output"))]
    let mut device = Some(DeviceDrain::new(consumer));

    let started = std::time::Instant::now();

    for tick in 0..args.ticks {
        let report = pipeline.run_tick(
            &mut core,
            HostIo {
                audio: &mut producer,
                video: &mut video,
                env: &mut env,
            },
            args.input_for(tick),
        );
        debug!(
            "tick {tick}: {:?}, {} native, {} resampled, {} delivered",
            report.outcome, report.native_samples, report.resampled, report.drain.delivered
        );

        let info = env.av_info.unwrap_or_else(|| pipeline.av_info());
        match device.as_mut() {
            Some(drain) => {
                let frames = cfg.host.device_frames_per_tick.unwrap_or_else(|| {
                    DeviceDrain::frames_per_tick(info.timing.sample_rate, info.timing.fps)
                });
                drain.pull(frames);
            }
            None => std::thread::sleep(std::time::Duration::from_secs_f64(1.0 / info.timing.fps)),
        }
    }

    let stats = pipeline.stats();
    let counters = pipeline.counters();
    println!("Ran {} ticks in {:.2?}", args.ticks, started.elapsed());
    println!(
        "Frames: {} core, {} fresh, {} dupes ({} pacing, {} skipped ticks)",
        core.frames(),
        video.fresh,
        video.dupes,
        stats.pacing_dupes,
        stats.skipped_ticks
    );
    println!(
        "Pacer: {} samples, {} frames counted",
        counters.samples_count, counters.frames_count
    );
    println!(
        "Audio: {} native -> {} resampled, {} delivered, {} muted, {} rejected",
        stats.native_samples,
        stats.resampled_samples,
        stats.delivered_samples,
        stats.muted_samples,
        stats.rejected_samples
    );
    if let Some(drain) = &device {
        println!(
            "Device: {} consumed, {} underruns ({} pairs short), {} still queued",
            drain.consumed,
            drain.underruns,
            drain.missing,
            drain.queued()
        );
        if drain.underruns > 0 {
            warn!("Simulated device underran {} times", drain.underruns);
        }
    }
    if stats.overflow_events > 0 || stats.stalled_runs > 0 || stats.resampler_fallbacks > 0 {
        println!(
            "Faults: {} overflows ({} samples dropped), {} stalls, {} resampler fallbacks",
            stats.overflow_events,
            stats.dropped_samples,
            stats.stalled_runs,
            stats.resampler_fallbacks
        );
    }
    if let Some(hash) = video.last_hash {
        println!("Last frame hash: {hash:016x}");
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&args) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
