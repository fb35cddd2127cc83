use crate::config::{OutputLayout, RetroSonicEngineDesc};
use crate::events::RetroSonicEvent;
use crate::mixer::{self, GainRamp, MixScratch, SharedControls};
use crate::render::RenderContext;
use crossbeam_channel::Sender;
use std::sync::Arc;

/// Format of the buffers a [`PullAdapter`] fills: always 32-bit float stereo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub layout: OutputLayout,
}

impl OutputFormat {
    pub fn stereo(sample_rate: u32, layout: OutputLayout) -> Self {
        Self {
            sample_rate,
            channels: 2,
            layout,
        }
    }

    pub fn from_desc(desc: &RetroSonicEngineDesc) -> Self {
        Self::stereo(desc.sample_rate, desc.layout)
    }
}

/// A source of output audio driven by the platform's render callback.
///
/// `render` runs on the realtime audio thread. Implementations must fill the
/// whole buffer and must not block, allocate, or panic.
pub trait PullAdapter: Send {
    fn format(&self) -> OutputFormat;

    /// Fills `out` (laid out per [`OutputFormat::layout`]) and returns the
    /// number of frames written, which is always `out.len() / channels`.
    fn render(&mut self, out: &mut [f32]) -> usize;
}

/// The production [`PullAdapter`]: every stream's render context, the output
/// bus, and the post-processing stages.
///
/// Owning the contexts here means whoever owns the renderer (the platform
/// stream) decides their lifetime; dropping the stream releases them.
pub struct StreamRenderer {
    format: OutputFormat,
    contexts: Vec<RenderContext>,
    scratch: MixScratch,
    gain: GainRamp,
    controls: Arc<SharedControls>,
    events: Sender<RetroSonicEvent>,
}

impl StreamRenderer {
    pub fn new(
        format: OutputFormat,
        contexts: Vec<RenderContext>,
        max_frames_per_render: usize,
        controls: Arc<SharedControls>,
        events: Sender<RetroSonicEvent>,
    ) -> Self {
        let gain = GainRamp::new(controls.volume());
        Self {
            format,
            contexts,
            scratch: MixScratch::new(max_frames_per_render),
            gain,
            controls,
            events,
        }
    }

    pub fn stream_count(&self) -> usize {
        self.contexts.len()
    }

    fn render_block(&mut self, frames: usize) {
        let result =
            mixer::mix_render_contexts(&mut self.contexts, &mut self.scratch, frames, &self.events);
        if result.underruns_started > 0 {
            self.controls.add_underruns(result.underruns_started);
        }

        let left = &mut self.scratch.bus_left[..frames];
        let right = &mut self.scratch.bus_right[..frames];
        if self.controls.is_mono() {
            mixer::downmix_mono(left, right);
        }
        self.gain.apply(self.controls.volume(), left, right);
    }
}

impl PullAdapter for StreamRenderer {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn render(&mut self, out: &mut [f32]) -> usize {
        let channels = self.format.channels as usize;
        let frames = out.len() / channels;
        // a trailing partial frame is never valid output
        out[frames * channels..].fill(0.0);

        if self.controls.is_paused() {
            out.fill(0.0);
            return frames;
        }

        let max_frames = self.scratch.max_frames();
        let mut offset = 0;
        while offset < frames {
            let block = (frames - offset).min(max_frames);
            self.render_block(block);
            mixer::write_output(
                self.format.layout,
                &self.scratch.bus_left[..block],
                &self.scratch.bus_right[..block],
                &mut out[..frames * channels],
                offset,
                frames,
            );
            offset += block;
        }

        self.controls.add_frames_rendered(frames);
        frames
    }
}
