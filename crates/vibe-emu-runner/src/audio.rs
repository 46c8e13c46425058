use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info};

use crate::audio_queue::AudioConsumer;

/// Start playback on the default output device at `sample_rate`, draining
/// `queue`.
///
/// The pipeline's output rate is fixed by the resampler, so the device is
/// asked to run at that rate rather than its preferred one. Underruns play
/// silence. Returns the active [`cpal::Stream`] if successful.
pub fn start_stream(queue: AudioConsumer, sample_rate: u32) -> Option<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;
    let supported = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            error!("No supported output config: {e}");
            return None;
        }
    };
    let sample_format = supported.sample_format();
    let mut config: cpal::StreamConfig = supported.into();
    config.sample_rate = cpal::SampleRate(sample_rate);
    let channels = usize::from(config.channels).max(1);
    let err_fn = |err| error!("cpal stream error: {err}");
    info!(
        "Audio device running at {} Hz, {channels} channel(s)",
        config.sample_rate.0
    );

    let built = match sample_format {
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _| {
                for frame in data.chunks_mut(channels) {
                    let [left, right] = queue.pop_stereo().unwrap_or([0, 0]);
                    frame[0] = left;
                    if channels > 1 {
                        frame[1] = right;
                    }
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_output_stream(
            &config,
            move |data: &mut [u16], _| {
                for frame in data.chunks_mut(channels) {
                    let [left, right] = queue.pop_stereo().unwrap_or([0, 0]);
                    frame[0] = (left as i32 + 32768) as u16;
                    if channels > 1 {
                        frame[1] = (right as i32 + 32768) as u16;
                    }
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _| {
                for frame in data.chunks_mut(channels) {
                    let [left, right] = queue.pop_stereo().unwrap_or([0, 0]);
                    frame[0] = left as f32 / 32768.0;
                    if channels > 1 {
                        frame[1] = right as f32 / 32768.0;
                    }
                }
            },
            err_fn,
            None,
        ),
        other => {
            error!("Unsupported sample format {other:?}");
            return None;
        }
    };

    let stream = match built {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build output stream: {e}");
            return None;
        }
    };
    if let Err(e) = stream.play() {
        error!("Failed to start output stream: {e}");
        return None;
    }
    Some(stream)
}
