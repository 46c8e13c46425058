use vibe_emu_output::config::PipelineConfig;
use vibe_emu_output::frame::{FrameBuffer, PixelFormat};
use vibe_emu_output::host::HostIo;
use vibe_emu_output::pipeline::Pipeline;
use vibe_emu_output::producer::SampleProducer;
use vibe_emu_output::resampler::ResamplerKind;
use vibe_emu_output::speed::SpeedInput;
use vibe_emu_output::timing::{NATIVE_SAMPLE_RATE, SAMPLES_PER_FRAME};
use vibe_emu_runner::audio_queue::{AudioProducer, audio_queue};
use vibe_emu_runner::host::{DeviceDrain, HeadlessEnv, HeadlessVideo};
use vibe_emu_runner::tone::ToneCore;

struct Rig {
    pipeline: Pipeline,
    core: ToneCore,
    producer: AudioProducer,
    drain: DeviceDrain,
    video: HeadlessVideo,
    env: HeadlessEnv,
}

impl Rig {
    fn new(long_frame_every: Option<u32>, can_dupe: bool) -> Self {
        let mut env = HeadlessEnv::new(can_dupe);
        let config = PipelineConfig {
            resampler: ResamplerKind::Cosine,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config, &mut env).unwrap();
        let core = ToneCore::new(NATIVE_SAMPLE_RATE, SAMPLES_PER_FRAME, 440)
            .with_long_frames(long_frame_every);
        let (producer, consumer) = audio_queue(8192);
        Self {
            pipeline,
            core,
            producer,
            drain: DeviceDrain::new(consumer),
            video: HeadlessVideo::default(),
            env,
        }
    }

    fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.pipeline.run_tick(
                &mut self.core,
                HostIo {
                    audio: &mut self.producer,
                    video: &mut self.video,
                    env: &mut self.env,
                },
                SpeedInput::default(),
            );
            let info = self.pipeline.av_info();
            self.drain.pull(DeviceDrain::frames_per_tick(
                info.timing.sample_rate,
                info.timing.fps,
            ));
        }
    }
}

#[test]
fn steady_frames_never_dupe() {
    let mut rig = Rig::new(None, true);
    rig.run(60);

    assert_eq!(rig.video.fresh, 60);
    assert_eq!(rig.video.dupes, 0);
    assert_eq!(rig.core.frames(), 60);
    assert!(rig.video.last_hash.is_some());

    let stats = rig.pipeline.stats();
    assert_eq!(stats.native_samples, 60 * u64::from(SAMPLES_PER_FRAME));
    assert_eq!(stats.resampled_samples, stats.native_samples / 32);
}

#[test]
fn long_frames_are_covered_by_dupes() {
    let mut rig = Rig::new(Some(3), true);
    rig.run(120);

    assert_eq!(rig.video.fresh + rig.video.dupes, 120);
    assert!(rig.video.dupes > 0);
    assert_eq!(rig.pipeline.stats().dupe_frames, rig.video.dupes);
    assert_eq!(rig.pipeline.counters().frames_count, 120);
}

#[test]
fn device_receives_everything_delivered() {
    let mut rig = Rig::new(Some(4), true);
    rig.run(90);

    let stats = rig.pipeline.stats();
    assert!(stats.delivered_samples > 0);
    assert_eq!(
        rig.drain.consumed + rig.drain.queued() as u64,
        stats.delivered_samples
    );
}

#[test]
fn hosts_without_dupe_get_full_frames() {
    let mut rig = Rig::new(Some(2), false);
    rig.run(40);

    assert_eq!(rig.video.dupes, 0);
    assert_eq!(rig.video.fresh, 40);
    assert!(rig.pipeline.stats().dupe_frames > 0);
}

#[test]
fn tone_core_renders_only_when_given_video() {
    let mut core = ToneCore::new(NATIVE_SAMPLE_RATE, 100, 440);
    let mut frame = FrameBuffer::gameboy(PixelFormat::Xrgb8888);
    let mut audio = vec![[0i16; 2]; 256];

    let out = core.run_for(None, &mut audio, 256);
    assert_eq!(out.samples, 100);
    assert!(out.frame_complete);
    assert!(frame.pixels().iter().all(|&px| px == 0));

    let out = core.run_for(Some(&mut frame), &mut audio, 60);
    assert_eq!(out.samples, 60);
    assert!(!out.frame_complete);
    let out = core.run_for(Some(&mut frame), &mut audio, 256);
    assert_eq!(out.samples, 40);
    assert!(out.frame_complete);
    assert!(frame.pixels().iter().any(|&px| px != 0));
    assert_eq!(core.frames(), 2);
}

#[test]
fn queue_takes_only_what_fits() {
    use vibe_emu_output::host::AudioSink;

    let (mut producer, consumer) = audio_queue(5);
    assert_eq!(producer.upload(&[[1, 1]; 8]), 5);
    assert_eq!(producer.upload(&[[2, 2]; 2]), 0);
    assert_eq!(consumer.pop_stereo(), Some([1, 1]));
    assert_eq!(producer.upload(&[[2, 2]; 2]), 1);
    assert_eq!(consumer.len(), 5);
}
