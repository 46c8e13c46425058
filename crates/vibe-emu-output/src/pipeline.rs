use log::{debug, error, info, warn};
use thiserror::Error;

use crate::blend::BlendState;
use crate::config::PipelineConfig;
use crate::frame::FrameBuffer;
use crate::host::{AudioSink, HostEnvironment, HostIo, Notice, NoticeLevel, VideoSink};
use crate::output_buffer::{DrainReport, OutputBuffer};
use crate::pacer::{FramePacer, PaceCounters};
use crate::producer::{SampleProducer, SampleScratch, StereoSample};
use crate::resampler::{self, Resampler, ResamplerError, ResamplerKind};
use crate::speed::{SpeedController, SpeedInput, SpeedState, TickPlan};
use crate::timing::{AvInfo, VIDEO_REFRESH_RATE};

pub const SINC_FALLBACK_NOTICE: &str = "Sinc resampler unsupported on this platform - using Cosine";
pub const SINC_FALLBACK_NOTICE_MS: u32 = 2000;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no usable resampler: {0}")]
    Resampler(#[from] ResamplerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupeReason {
    /// The sample clock ran a frame ahead of the frame count.
    Pacing,
    /// Slow motion off-tick.
    SlowMotion,
    /// The core did not reach a frame boundary this tick.
    NoFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameOutcome {
    #[default]
    Fresh,
    Dupe(DupeReason),
}

impl FrameOutcome {
    pub fn is_dupe(self) -> bool {
        matches!(self, Self::Dupe(_))
    }
}

/// What one [`Pipeline::run_tick`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub outcome: FrameOutcome,
    /// New speed state if this tick's input caused a transition.
    pub transition: Option<SpeedState>,
    /// Emulation steps executed (0 for dupe-only ticks).
    pub iterations: u32,
    /// Native samples the core reported.
    pub native_samples: u64,
    /// Host-rate pairs produced by the resampler.
    pub resampled: usize,
    pub drain: DrainReport,
    /// Host-rate pairs dropped because audio was muted.
    pub muted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub ticks: u64,
    pub fresh_frames: u64,
    pub dupe_frames: u64,
    pub pacing_dupes: u64,
    pub skipped_ticks: u64,
    pub native_samples: u64,
    pub resampled_samples: u64,
    pub delivered_samples: u64,
    pub muted_samples: u64,
    pub rejected_samples: u64,
    pub overflow_events: u64,
    pub dropped_samples: u64,
    /// `run_for` calls that made no progress at all.
    pub stalled_runs: u64,
    pub resampler_fallbacks: u64,
    /// Resampled blocks lost to output buffer allocation failures.
    pub write_failures: u64,
}

/// Resampler plus the host-rate queue it feeds.
struct AudioPath {
    resampler: Box<dyn Resampler>,
    output: Option<OutputBuffer>,
}

impl AudioPath {
    fn new(resampler: Box<dyn Resampler>) -> Self {
        Self {
            resampler,
            output: None,
        }
    }

    fn rate(&self) -> f64 {
        self.resampler.output_rate()
    }

    fn push(&mut self, samples: &[StereoSample], stats: &mut PipelineStats) -> usize {
        self.resampler.push_samples(samples);
        if self.resampler.available() >= self.resampler.high_water_mark().max(1) {
            self.collect(stats)
        } else {
            0
        }
    }

    /// Move every finished pair from the resampler into the output buffer.
    fn collect(&mut self, stats: &mut PipelineStats) -> usize {
        let available = self.resampler.available();
        if available == 0 {
            return 0;
        }

        if self.output.is_none() {
            match OutputBuffer::for_rate(self.rate(), VIDEO_REFRESH_RATE) {
                Ok(buf) => self.output = Some(buf),
                Err(err) => {
                    warn!("{err}; dropping {available} resampled samples");
                    return discard_unread(self.resampler.as_mut(), stats);
                }
            }
        }
        let Some(output) = self.output.as_mut() else {
            return 0;
        };

        match output.reserve_tail(available) {
            Ok(tail) => {
                let read = self.resampler.read(tail);
                output.commit(read);
                stats.resampled_samples += read as u64;
                read
            }
            Err(err) => {
                warn!("{err}; dropping {available} resampled samples");
                discard_unread(self.resampler.as_mut(), stats)
            }
        }
    }

    fn flush(
        &mut self,
        sink: &mut dyn AudioSink,
        muted: bool,
        stats: &mut PipelineStats,
    ) -> (DrainReport, usize) {
        let Some(output) = self.output.as_mut() else {
            return (DrainReport::default(), 0);
        };

        if muted {
            let dropped = output.discard();
            stats.muted_samples += dropped as u64;
            return (DrainReport::default(), dropped);
        }

        let report = output.drain_to(sink);
        stats.delivered_samples += report.delivered as u64;
        stats.rejected_samples += report.rejected as u64;
        (report, 0)
    }

    fn reset(&mut self) {
        self.resampler.reset();
        if let Some(output) = self.output.as_mut() {
            output.discard();
        }
    }
}

fn discard_unread(resampler: &mut dyn Resampler, stats: &mut PipelineStats) -> usize {
    let mut scratch = [[0i16; 2]; 256];
    while resampler.read(&mut scratch) > 0 {}
    stats.write_failures += 1;
    0
}

/// Build the configured backend, falling back to cosine when the sinc
/// design is rejected. Updates `config.resampler` to the backend in use.
fn select_resampler(
    config: &mut PipelineConfig,
    env: &mut dyn HostEnvironment,
    fallback_notified: &mut bool,
    stats: &mut PipelineStats,
) -> Result<Box<dyn Resampler>, ResamplerError> {
    let built = resampler::build(
        config.resampler,
        &config.sinc,
        config.cosine_decimation,
        config.native_sample_rate,
    );

    let backend = match built {
        Ok(backend) => backend,
        Err(err) if config.resampler == ResamplerKind::Sinc => {
            warn!("Sinc resampler unavailable ({err}); falling back to cosine");
            if !*fallback_notified {
                env.notify(&Notice {
                    text: SINC_FALLBACK_NOTICE.to_string(),
                    duration_ms: SINC_FALLBACK_NOTICE_MS,
                    level: NoticeLevel::Warn,
                });
                *fallback_notified = true;
            }
            stats.resampler_fallbacks += 1;

            let backend = resampler::build(
                ResamplerKind::Cosine,
                &config.sinc,
                config.cosine_decimation,
                config.native_sample_rate,
            )?;
            config.resampler = ResamplerKind::Cosine;
            if !env.set_option("resampler", ResamplerKind::Cosine.as_str()) {
                debug!("Host did not take the resampler option update");
            }
            backend
        }
        Err(err) => return Err(err),
    };

    info!(
        "Using {} resampler at {} Hz",
        backend.kind(),
        backend.output_rate()
    );
    Ok(backend)
}

/// The whole output side of one loaded session.
///
/// Everything the pipeline needs between ticks lives here; hosts hold one
/// value and call [`run_tick`](Self::run_tick) once per display refresh.
pub struct Pipeline {
    config: PipelineConfig,
    audio: AudioPath,
    scratch: SampleScratch,
    frame: FrameBuffer,
    blend: BlendState,
    pacer: FramePacer,
    speed: SpeedController,
    can_dupe: bool,
    fallback_notified: bool,
    /// Backend the host asked for; `config.resampler` is the one in use.
    requested_resampler: ResamplerKind,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        env: &mut dyn HostEnvironment,
    ) -> Result<Self, PipelineError> {
        let mut config = config.sanitized();
        let mut stats = PipelineStats::default();
        let mut fallback_notified = false;
        let requested_resampler = config.resampler;
        let backend = select_resampler(&mut config, env, &mut fallback_notified, &mut stats)?;

        let can_dupe = env.can_dupe();
        if !can_dupe {
            error!("Host cannot repeat frames; duplicate frames will re-send the last image");
        }

        let mut speed = SpeedController::new(config.fast_forward_levels);
        speed.set_fast_forward_enabled(config.fast_forward_enabled);
        speed.set_slow_motion_enabled(config.slow_motion_enabled);

        Ok(Self {
            audio: AudioPath::new(backend),
            scratch: SampleScratch::new(config.sample_cap),
            frame: FrameBuffer::gameboy(config.pixel_format),
            blend: BlendState::new(config.blend, config.lcd_response_time),
            pacer: FramePacer::new(config.samples_per_frame),
            speed,
            can_dupe,
            fallback_notified,
            requested_resampler,
            stats,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn resampler_kind(&self) -> ResamplerKind {
        self.audio.resampler.kind()
    }

    pub fn output_rate(&self) -> f64 {
        self.audio.rate()
    }

    pub fn counters(&self) -> PaceCounters {
        self.pacer.counters()
    }

    pub fn speed_state(&self) -> SpeedState {
        self.speed.state()
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn blend(&self) -> &BlendState {
        &self.blend
    }

    pub fn can_dupe(&self) -> bool {
        self.can_dupe
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            overflow_events: self.scratch.overflow_events(),
            dropped_samples: self.scratch.dropped_samples(),
            ..self.stats
        }
    }

    /// Current session metadata: fixed geometry, nominal fps scaled by the
    /// fast-forward multiplier, and the active backend's sample rate.
    pub fn av_info(&self) -> AvInfo {
        AvInfo::new(
            VIDEO_REFRESH_RATE * self.speed.state().fps_multiplier(),
            self.audio.rate(),
        )
    }

    fn push_av_info(&self, env: &mut dyn HostEnvironment) {
        let info = self.av_info();
        if !env.set_av_info(&info) {
            debug!(
                "Host did not accept AV info ({:.3} fps, {} Hz)",
                info.timing.fps, info.timing.sample_rate
            );
        }
    }

    /// Run one host tick: speed input, pacing, emulation, blending, frame
    /// delivery, then audio delivery.
    pub fn run_tick(
        &mut self,
        producer: &mut dyn SampleProducer,
        io: HostIo<'_>,
        input: SpeedInput,
    ) -> TickReport {
        let HostIo { audio, video, env } = io;
        let mut report = TickReport::default();
        self.stats.ticks += 1;

        if let Some(state) = self.speed.update(input) {
            info!("Playback speed changed to {state}");
            report.transition = Some(state);
            self.push_av_info(env);
        }

        if self.pacer.needs_dupe() {
            self.pacer
                .record_dupe(u64::from(self.speed.state().iterations()));
            self.stats.pacing_dupes += 1;
            self.send_dupe(video);
            report.outcome = FrameOutcome::Dupe(DupeReason::Pacing);
            return report;
        }

        let (iterations, skip_intermediate) = match self.speed.plan_tick() {
            TickPlan::Skip => {
                self.stats.skipped_ticks += 1;
                self.send_dupe(video);
                report.outcome = FrameOutcome::Dupe(DupeReason::SlowMotion);
                return report;
            }
            TickPlan::Run {
                iterations,
                skip_intermediate,
            } => (iterations, skip_intermediate),
        };

        let mut frame_ready = false;
        for step in 0..iterations {
            let render = !skip_intermediate || step + 1 == iterations;
            frame_ready = self.run_step(producer, render, &mut report);
        }
        report.iterations = iterations;

        if frame_ready {
            self.blend.apply(&mut self.frame);
            video.refresh(
                Some(self.frame.pixels()),
                self.frame.width(),
                self.frame.height(),
                self.frame.pitch(),
            );
            self.stats.fresh_frames += 1;
            report.outcome = FrameOutcome::Fresh;
        } else {
            self.send_dupe(video);
            report.outcome = FrameOutcome::Dupe(DupeReason::NoFrame);
        }
        self.pacer.record_frames(u64::from(iterations));

        report.resampled += self.audio.collect(&mut self.stats);
        let muted = self.speed.audio_muted(self.config.audio_during_speed_change);
        let (drain, dropped) = self.audio.flush(audio, muted, &mut self.stats);
        report.drain = drain;
        report.muted = dropped;
        report
    }

    /// One emulation step: call the core until it reaches a frame boundary,
    /// produces a frame's worth of samples, or stops making progress.
    fn run_step(
        &mut self,
        producer: &mut dyn SampleProducer,
        render: bool,
        report: &mut TickReport,
    ) -> bool {
        let frame_samples = u64::from(self.config.samples_per_frame);
        let requested = self.config.samples_per_run.min(self.scratch.cap());
        let mut produced = 0u64;

        loop {
            let video = if render { Some(&mut self.frame) } else { None };
            let outcome = producer.run_for(video, self.scratch.buffer_mut(), requested);

            let reported = outcome.samples as u64;
            self.pacer.record_samples(reported);
            self.stats.native_samples += reported;
            report.native_samples += reported;
            produced += reported;

            let accepted = self.scratch.accept(outcome.samples);
            report.resampled += self.audio.push(accepted, &mut self.stats);

            if outcome.frame_complete {
                return true;
            }
            if outcome.samples == 0 {
                self.stats.stalled_runs += 1;
                debug!("Sample producer made no progress; ending step early");
                return false;
            }
            if produced >= frame_samples {
                return false;
            }
        }
    }

    fn send_dupe(&mut self, video: &mut dyn VideoSink) {
        self.stats.dupe_frames += 1;
        let (width, height, pitch) = (self.frame.width(), self.frame.height(), self.frame.pitch());
        if self.can_dupe {
            video.refresh(None, width, height, pitch);
        } else {
            video.refresh(Some(self.frame.pixels()), width, height, pitch);
        }
    }

    /// Apply a changed configuration mid-session.
    pub fn apply_config(
        &mut self,
        config: PipelineConfig,
        env: &mut dyn HostEnvironment,
    ) -> Result<(), PipelineError> {
        let mut config = config.sanitized();
        let mut av_changed = false;

        let requested = config.resampler;
        let rebuild = config.backend_params_changed(&self.config)
            || (requested != self.requested_resampler && requested != self.resampler_kind());
        self.requested_resampler = requested;

        if rebuild {
            let backend = select_resampler(
                &mut config,
                env,
                &mut self.fallback_notified,
                &mut self.stats,
            )?;
            self.audio = AudioPath::new(backend);
            av_changed = true;
        } else {
            config.resampler = self.resampler_kind();
        }

        if config.pixel_format != self.config.pixel_format {
            self.frame = FrameBuffer::gameboy(config.pixel_format);
        }

        if self.blend.configure(config.blend, config.lcd_response_time) {
            info!("Interframe blending set to {}", config.blend);
        }

        // Later setters see the state left by earlier ones; keep the last change.
        let speed_change = [
            self.speed
                .set_fast_forward_levels(config.fast_forward_levels),
            self.speed
                .set_fast_forward_enabled(config.fast_forward_enabled),
            self.speed.set_slow_motion_enabled(config.slow_motion_enabled),
        ]
        .into_iter()
        .flatten()
        .last();
        if let Some(state) = speed_change {
            info!("Playback speed changed to {state}");
            av_changed = true;
        }

        if config.samples_per_frame != self.config.samples_per_frame {
            self.pacer = FramePacer::new(config.samples_per_frame);
        }
        if config.sample_cap != self.config.sample_cap {
            self.scratch = SampleScratch::new(config.sample_cap);
        }

        self.config = config;
        if av_changed {
            self.push_av_info(env);
        }
        Ok(())
    }

    /// Start over for a new game or a reset.
    pub fn reset_session(&mut self) {
        self.pacer.reset();
        self.speed.reset();
        self.audio.reset();
        self.blend.reset();
        info!("Output session reset");
    }

    /// Release the output and blend buffers. They come back on the next tick.
    pub fn shutdown(&mut self) {
        self.audio.output = None;
        self.blend.release();
        debug!("Output buffers released");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
