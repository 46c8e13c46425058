use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use vibe_emu_output::host::AudioSink;
use vibe_emu_output::producer::StereoSample;

/// Single-producer / single-consumer ring of host-rate stereo pairs.
///
/// The pipeline pushes through [`AudioProducer`] (its [`AudioSink`]); a device
/// callback or the simulated device clock pops through [`AudioConsumer`].
/// Pushing never blocks: when the ring fills up, only what fits is taken.
pub struct AudioConsumer {
    inner: Arc<Inner>,
}

pub struct AudioProducer {
    inner: Arc<Inner>,
}

struct Inner {
    // One extra slot so head == tail is unambiguously empty.
    buf: Box<[UnsafeCell<MaybeUninit<StereoSample>>]>,
    cap: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Only the producer writes slots in [head, tail) and only the consumer reads
// slots in [tail, head); the indices are published with release/acquire.
unsafe impl Sync for Inner {}

impl Inner {
    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            (self.cap - tail) + head
        }
    }

    fn capacity_frames(&self) -> usize {
        self.cap.saturating_sub(1)
    }

    #[inline]
    fn next_index(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next == self.cap { 0 } else { next }
    }
}

pub fn audio_queue(capacity_frames: usize) -> (AudioProducer, AudioConsumer) {
    let cap = capacity_frames.saturating_add(1).max(2);
    let buf = (0..cap)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let inner = Arc::new(Inner {
        buf,
        cap,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });

    (
        AudioProducer {
            inner: Arc::clone(&inner),
        },
        AudioConsumer { inner },
    )
}

impl AudioProducer {
    #[inline]
    pub fn push_stereo(&self, sample: StereoSample) -> bool {
        let head = self.inner.head.load(Ordering::Relaxed);
        let next = self.inner.next_index(head);
        let tail = self.inner.tail.load(Ordering::Acquire);
        if next == tail {
            return false;
        }

        unsafe {
            (*self.inner.buf[head].get()).write(sample);
        }
        self.inner.head.store(next, Ordering::Release);
        true
    }

    /// Push as many leading pairs of `samples` as fit. Returns the count taken.
    pub fn push_slice(&self, samples: &[StereoSample]) -> usize {
        let n = samples.len().min(self.free());
        let mut head = self.inner.head.load(Ordering::Relaxed);
        for &sample in &samples[..n] {
            unsafe {
                (*self.inner.buf[head].get()).write(sample);
            }
            head = self.inner.next_index(head);
        }
        self.inner.head.store(head, Ordering::Release);
        n
    }

    pub fn free(&self) -> usize {
        self.inner.capacity_frames() - self.inner.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.inner.capacity_frames()
    }
}

impl AudioSink for AudioProducer {
    fn upload(&mut self, samples: &[StereoSample]) -> usize {
        self.push_slice(samples)
    }
}

impl AudioConsumer {
    #[inline]
    pub fn pop_stereo(&self) -> Option<StereoSample> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let sample = unsafe { (*self.inner.buf[tail].get()).assume_init_read() };
        let next = self.inner.next_index(tail);
        self.inner.tail.store(next, Ordering::Release);
        Some(sample)
    }

    /// Pop into `out` until it is full or the ring is empty.
    pub fn pop_into(&self, out: &mut [StereoSample]) -> usize {
        let mut n = 0;
        for slot in out.iter_mut() {
            match self.pop_stereo() {
                Some(sample) => *slot = sample,
                None => break,
            }
            n += 1;
        }
        n
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.inner.capacity_frames()
    }
}
