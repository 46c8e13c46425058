use log::warn;
use thiserror::Error;

use crate::host::AudioSink;
use crate::producer::StereoSample;

/// Initial batch ceiling, in stereo pairs, before the sink has pushed back.
pub const DEFAULT_BATCH_MAX: usize = 1 << 16;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("failed to grow audio output buffer to {requested} samples")]
    Allocation { requested: usize },
}

/// What one [`OutputBuffer::drain_to`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Pairs the sink accepted.
    pub delivered: usize,
    /// Pairs left over after the sink stopped accepting anything.
    pub rejected: usize,
    /// Number of `upload` calls made.
    pub batches: usize,
}

/// Host-rate PCM waiting to be handed to the sink.
///
/// `data.len()` is the capacity; `pos` is the write cursor. Everything before
/// the cursor is undelivered output.
pub struct OutputBuffer {
    data: Vec<StereoSample>,
    pos: usize,
    batch_max: usize,
}

impl OutputBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| BufferError::Allocation {
                requested: capacity,
            })?;
        data.resize(capacity, [0, 0]);
        Ok(Self {
            data,
            pos: 0,
            batch_max: DEFAULT_BATCH_MAX,
        })
    }

    /// Size for one frame of output at `sample_rate`, doubled: the core tends to
    /// emit short bursts of high sample counts.
    pub fn for_rate(sample_rate: f64, fps: f64) -> Result<Self, BufferError> {
        let samples_per_frame = (sample_rate / fps) as usize;
        Self::with_capacity((samples_per_frame + 1) * 2)
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn batch_max(&self) -> usize {
        self.batch_max
    }

    pub fn as_slice(&self) -> &[StereoSample] {
        &self.data[..self.pos]
    }

    /// Make sure `additional` more pairs fit after the cursor, growing by more
    /// than the immediate deficit.
    fn reserve(&mut self, additional: usize) -> Result<(), BufferError> {
        let free = self.data.len() - self.pos;
        if free >= additional {
            return Ok(());
        }

        let mut new_len = self.data.len() + (additional - free);
        new_len = (new_len << 1) - (new_len >> 1);

        self.data
            .try_reserve_exact(new_len - self.data.len())
            .map_err(|_| BufferError::Allocation { requested: new_len })?;
        self.data.resize(new_len, [0, 0]);
        Ok(())
    }

    pub fn write(&mut self, samples: &[StereoSample]) -> Result<(), BufferError> {
        self.reserve(samples.len())?;
        self.data[self.pos..self.pos + samples.len()].copy_from_slice(samples);
        self.pos += samples.len();
        Ok(())
    }

    /// Writable space of exactly `len` pairs after the cursor. Follow with
    /// [`commit`](Self::commit) for however many were filled.
    pub fn reserve_tail(&mut self, len: usize) -> Result<&mut [StereoSample], BufferError> {
        self.reserve(len)?;
        Ok(&mut self.data[self.pos..self.pos + len])
    }

    pub fn commit(&mut self, filled: usize) {
        self.pos = (self.pos + filled).min(self.data.len());
    }

    /// Drop everything buffered without delivering it.
    pub fn discard(&mut self) -> usize {
        std::mem::take(&mut self.pos)
    }

    /// Hand all buffered pairs to `sink` in batches no larger than the current
    /// ceiling. A short acceptance lowers the ceiling and the rest is retried
    /// immediately; a sink that accepts nothing ends the drain. The cursor
    /// always returns to zero.
    pub fn drain_to(&mut self, sink: &mut dyn AudioSink) -> DrainReport {
        let mut report = DrainReport::default();
        let mut offset = 0;
        let mut remaining = self.pos;

        while remaining > 0 {
            let offered = remaining.min(self.batch_max);
            let accepted = sink
                .upload(&self.data[offset..offset + offered])
                .min(offered);
            report.batches += 1;

            if accepted == 0 {
                warn!("Audio sink accepted no samples; dropping {remaining} buffered samples");
                report.rejected = remaining;
                break;
            }
            if accepted < offered {
                self.batch_max = accepted;
            }

            offset += accepted;
            remaining -= accepted;
            report.delivered += accepted;
        }

        self.pos = 0;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_is_geometric() {
        let mut buf = OutputBuffer::with_capacity(4).unwrap();
        buf.write(&[[1, 1]; 3]).unwrap();
        // free = 1, deficit = 5, new = 4 + 5 = 9 -> 18 - 4 = 14
        buf.write(&[[2, 2]; 6]).unwrap();
        assert_eq!(buf.capacity(), 14);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn commit_never_passes_capacity() {
        let mut buf = OutputBuffer::with_capacity(2).unwrap();
        buf.commit(10);
        assert_eq!(buf.len(), 2);
    }
}
