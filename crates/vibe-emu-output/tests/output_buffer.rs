mod common;

use common::RecordingAudio;
use vibe_emu_output::output_buffer::{DEFAULT_BATCH_MAX, OutputBuffer};
use vibe_emu_output::producer::StereoSample;

fn ramp(start: i16, len: usize) -> Vec<StereoSample> {
    (0..len as i16).map(|i| [start + i, -(start + i)]).collect()
}

#[test]
fn growth_keeps_undelivered_samples() {
    let mut buf = OutputBuffer::with_capacity(8).unwrap();
    let first = ramp(0, 5);
    let second = ramp(100, 40);
    buf.write(&first).unwrap();
    buf.write(&second).unwrap();
    assert!(buf.capacity() >= 45);

    let mut sink = RecordingAudio::default();
    let report = buf.drain_to(&mut sink);

    let expected: Vec<_> = first.iter().chain(&second).copied().collect();
    assert_eq!(sink.received, expected);
    assert_eq!(report.delivered, 45);
    assert!(buf.is_empty());
}

#[test]
fn initial_capacity_covers_two_frames() {
    let buf = OutputBuffer::for_rate(32_768.0, 4_194_304.0 / 70_224.0).unwrap();
    // 32768 / 59.73 = 548.6 -> (548 + 1) * 2
    assert_eq!(buf.capacity(), 1098);
    assert_eq!(buf.batch_max(), DEFAULT_BATCH_MAX);
}

#[test]
fn short_acceptance_becomes_the_new_ceiling() {
    let mut buf = OutputBuffer::with_capacity(16).unwrap();
    buf.write(&ramp(0, 1000)).unwrap();

    let mut sink = RecordingAudio::limited(300);
    let report = buf.drain_to(&mut sink);

    assert_eq!(report.delivered, 1000);
    assert_eq!(report.rejected, 0);
    assert_eq!(buf.batch_max(), 300);
    assert_eq!(sink.offered, vec![1000, 300, 300, 100]);
    assert_eq!(sink.received, ramp(0, 1000));
}

#[test]
fn ceiling_persists_across_drains() {
    let mut buf = OutputBuffer::with_capacity(16).unwrap();
    let mut sink = RecordingAudio::limited(64);
    buf.write(&ramp(0, 100)).unwrap();
    buf.drain_to(&mut sink);

    sink.limit = None;
    sink.offered.clear();
    buf.write(&ramp(0, 150)).unwrap();
    let report = buf.drain_to(&mut sink);
    assert_eq!(sink.offered, vec![64, 64, 22]);
    assert_eq!(report.batches, 3);
}

#[test]
fn stuck_sink_ends_the_drain() {
    let mut buf = OutputBuffer::with_capacity(16).unwrap();
    buf.write(&ramp(0, 10)).unwrap();

    let mut sink = RecordingAudio::limited(0);
    let report = buf.drain_to(&mut sink);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.rejected, 10);
    assert_eq!(report.batches, 1);
    assert!(buf.is_empty());
    assert_eq!(buf.batch_max(), DEFAULT_BATCH_MAX);
}

#[test]
fn reserve_tail_and_commit() {
    let mut buf = OutputBuffer::with_capacity(4).unwrap();
    buf.write(&ramp(0, 3)).unwrap();
    let tail = buf.reserve_tail(10).unwrap();
    assert_eq!(tail.len(), 10);
    tail[..4].copy_from_slice(&ramp(3, 4));
    buf.commit(4);
    assert_eq!(buf.as_slice(), ramp(0, 7).as_slice());
    assert_eq!(buf.discard(), 7);
    assert!(buf.is_empty());
}
