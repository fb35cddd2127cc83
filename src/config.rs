//! Configuration for RetroSonic

use crate::error::{Result, RetroSonicError};

/// Sample layout of the rendered output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// `[L0, R0, L1, R1, ...]`
    #[default]
    Interleaved,
    /// `[L0, L1, ..., Ln, R0, R1, ..., Rn]`: left half then right half of the same slice
    NonInterleaved,
}

/// Resampling algorithm used to convert source streams to the target rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplerType {
    /// Streaming linear interpolation - cheap, no added latency
    #[default]
    Linear,
    /// Cubic polynomial interpolation via rubato - smoother, adds one chunk of latency
    Polynomial,
}

/// What the renderer emits when a source has no data left for the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderrunPolicy {
    /// Abrupt silence
    ZeroFill,
    /// Ramp from the last emitted frame down to silence over `frames` frames
    FadeOut { frames: usize },
}

impl Default for UnderrunPolicy {
    fn default() -> Self {
        Self::FadeOut { frames: 32 }
    }
}

/// Configuration descriptor for a RetroSonic engine
#[derive(Debug, Clone)]
pub struct RetroSonicEngineDesc {
    /// Output sample rate requested from the platform
    pub sample_rate: u32,
    /// Preferred number of frames per platform callback
    pub block_size: usize,
    /// Largest number of frames rendered in one pass. Bigger callbacks are split.
    pub max_frames_per_render: usize,
    /// Capacity, in source frames, of each stream's converted-sample queue
    pub source_queue_frames: usize,
    pub layout: OutputLayout,
    pub resampler_type: ResamplerType,
    /// Output chunk size of the polynomial resampler
    pub resampler_chunk: usize,
    pub underrun_policy: UnderrunPolicy,
    /// Initial output gain, clamped to [0.0, 1.0]
    pub volume: f32,
    /// Start with the mono downmix enabled
    pub mono: bool,
    /// Output device to open (None uses the host default)
    pub device_name: Option<String>,
    /// Capacity of the engine event queue
    pub event_capacity: usize,
}

impl Default for RetroSonicEngineDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            max_frames_per_render: 4096,
            source_queue_frames: 8192,
            layout: OutputLayout::Interleaved,
            resampler_type: ResamplerType::Linear,
            resampler_chunk: 128,
            underrun_policy: UnderrunPolicy::default(),
            volume: 1.0,
            mono: false,
            device_name: None,
            event_capacity: 64,
        }
    }
}

impl RetroSonicEngineDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn max_frames_per_render(mut self, frames: usize) -> Self {
        self.max_frames_per_render = frames;
        self
    }

    pub fn source_queue_frames(mut self, frames: usize) -> Self {
        self.source_queue_frames = frames;
        self
    }

    pub fn layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn resampler_type(mut self, resampler_type: ResamplerType) -> Self {
        self.resampler_type = resampler_type;
        self
    }

    pub fn resampler_chunk(mut self, frames: usize) -> Self {
        self.resampler_chunk = frames;
        self
    }

    pub fn underrun_policy(mut self, policy: UnderrunPolicy) -> Self {
        self.underrun_policy = policy;
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn mono(mut self, mono: bool) -> Self {
        self.mono = mono;
        self
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Checks that every size and rate is usable
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(RetroSonicError::Configuration(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if self.block_size == 0 || self.max_frames_per_render == 0 {
            return Err(RetroSonicError::Configuration(
                "Block size and max frames per render must be greater than 0".to_string(),
            ));
        }
        if self.resampler_chunk == 0 {
            return Err(RetroSonicError::Configuration(
                "Resampler chunk must be greater than 0".to_string(),
            ));
        }
        // The queue must hold at least one full render pass worth of source audio
        if self.source_queue_frames < self.max_frames_per_render {
            return Err(RetroSonicError::Configuration(format!(
                "Source queue ({} frames) is smaller than max frames per render ({})",
                self.source_queue_frames, self.max_frames_per_render
            )));
        }
        Ok(())
    }
}
