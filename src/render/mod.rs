//! Per-stream render path: ring buffer bytes in, target-rate stereo f32 out

mod convert;
mod fifo;
mod resampler;
mod underrun;

pub use convert::{decode_frames, decode_sample, int_sample_scale};
pub use resampler::{LinearResampler, PolynomialResampler, StreamResampler};
pub use underrun::UnderrunState;

use crate::config::RetroSonicEngineDesc;
use crate::error::{Result, RetroSonicError};
use crate::source::{AudioSourceDescriptor, RingBufferReader};
use fifo::FrameFifo;

/// Largest per-stream source queue, in bytes
const MAX_QUEUE_BYTES: usize = 1 << 28;

/// Change in a stream's starvation state during one render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Starvation {
    Unchanged,
    /// The stream could not fill the whole request
    Started,
    /// A previously starving stream filled a whole request again
    Recovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Output frames produced from real source data; the rest was underrun fill
    pub frames_from_source: usize,
    pub starvation: Starvation,
}

/// Render state for one emulation audio stream.
///
/// Owns the read end of the stream's ring buffer together with every buffer
/// the render path needs, all allocated at construction. [`RenderContext::render`]
/// never allocates, locks or blocks.
pub struct RenderContext {
    index: usize,
    descriptor: AudioSourceDescriptor,
    reader: Box<dyn RingBufferReader>,
    bytes: Vec<u8>,
    fifo: FrameFifo,
    resampler: StreamResampler,
    underrun: UnderrunState,
    starved: bool,
}

impl RenderContext {
    /// Wraps `reader`, discarding whatever it currently holds
    pub fn new(
        index: usize,
        descriptor: AudioSourceDescriptor,
        mut reader: Box<dyn RingBufferReader>,
        desc: &RetroSonicEngineDesc,
    ) -> Result<Self> {
        let resampler = StreamResampler::new(
            desc.resampler_type,
            descriptor.sample_rate(),
            desc.sample_rate,
            desc.resampler_chunk,
        )?;

        let queue_frames = desc.source_queue_frames.max(
            resampler.source_frames_wanted(desc.max_frames_per_render.saturating_add(1)),
        );
        let queue_bytes = queue_frames
            .checked_mul(descriptor.bytes_per_frame())
            .filter(|&bytes| bytes <= MAX_QUEUE_BYTES)
            .ok_or_else(|| {
                RetroSonicError::AudioFormat(format!(
                    "Source queue of {} frames at {} Hz exceeds {} bytes",
                    queue_frames,
                    descriptor.sample_rate(),
                    MAX_QUEUE_BYTES
                ))
            })?;

        reader.reset();

        log::debug!(
            "Render context {}: {} ch, {}-bit {:?}, {} Hz, queue {} frames",
            index,
            descriptor.channels(),
            descriptor.bit_depth().bits(),
            descriptor.encoding(),
            descriptor.sample_rate(),
            queue_frames
        );

        Ok(Self {
            index,
            descriptor,
            reader,
            bytes: vec![0; queue_bytes],
            fifo: FrameFifo::with_capacity(queue_frames),
            resampler,
            underrun: UnderrunState::new(desc.underrun_policy),
            starved: false,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn descriptor(&self) -> &AudioSourceDescriptor {
        &self.descriptor
    }

    /// Source frames converted and waiting to be resampled
    pub fn queued_frames(&self) -> usize {
        self.fifo.len()
    }

    /// Renders exactly `min(left.len(), right.len())` frames at the target rate
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> RenderOutcome {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);

        self.pull_source(self.resampler.source_frames_wanted(frames));
        let produced = self.resampler.render(&mut self.fifo, left, right);

        if produced > 0 {
            self.underrun.track(left[produced - 1], right[produced - 1]);
        }
        if produced < frames {
            self.underrun
                .fill(&mut left[produced..], &mut right[produced..]);
        }

        let starved = produced < frames;
        let starvation = match (self.starved, starved) {
            (false, true) => Starvation::Started,
            (true, false) => Starvation::Recovered,
            _ => Starvation::Unchanged,
        };
        self.starved = starved;

        RenderOutcome {
            frames_from_source: produced,
            starvation,
        }
    }

    /// Moves whole frames from the ring buffer into the frame queue.
    ///
    /// Reads at most what the reader reports available, so the producer's write
    /// cursor is never overtaken.
    fn pull_source(&mut self, frames_wanted: usize) {
        let missing = frames_wanted
            .saturating_sub(self.fifo.len())
            .min(self.fifo.free());
        if missing == 0 {
            return;
        }

        let bytes_per_frame = self.descriptor.bytes_per_frame();
        let requested = missing * bytes_per_frame;
        let available = self.reader.available_bytes();
        let to_read = requested.min(available) / bytes_per_frame * bytes_per_frame;
        if to_read == 0 {
            return;
        }

        let read = self.reader.read(&mut self.bytes[..to_read]);
        let (left, right) = self.fifo.write_slices(read / bytes_per_frame);
        let frames = decode_frames(&self.bytes[..read], &self.descriptor, left, right);
        self.fifo.commit(frames);
    }

    /// Drops all queued audio and resampler history
    pub fn reset(&mut self) {
        self.reader.reset();
        self.fifo.clear();
        self.resampler.reset();
        self.underrun.reset();
        self.starved = false;
    }
}
