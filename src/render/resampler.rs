use super::fifo::FrameFifo;
use crate::config::ResamplerType;
use crate::error::{Result, RetroSonicError};
use rubato::{FastFixedOut, PolynomialDegree, Resampler};

/// Streaming linear interpolator.
///
/// Keeps one frame of lookback (`prev`) and one of lookahead (`next`) across
/// calls, so block boundaries are seamless. `position` is the fractional read
/// position between them; at 1.0 or more the next source frame is needed.
pub struct LinearResampler {
    step: f64,
    position: f64,
    prev: [f32; 2],
    next: [f32; 2],
}

impl LinearResampler {
    pub fn new(source_sample_rate: f64, target_sample_rate: u32) -> Self {
        Self {
            step: source_sample_rate / target_sample_rate as f64,
            position: 1.0,
            prev: [0.0; 2],
            next: [0.0; 2],
        }
    }

    fn render(&mut self, fifo: &mut FrameFifo, left: &mut [f32], right: &mut [f32]) -> usize {
        let frames = left.len().min(right.len());
        for i in 0..frames {
            while self.position >= 1.0 {
                let Some(frame) = fifo.pop() else {
                    return i;
                };
                self.prev = self.next;
                self.next = frame;
                self.position -= 1.0;
            }

            let t = self.position as f32;
            left[i] = self.prev[0] + (self.next[0] - self.prev[0]) * t;
            right[i] = self.prev[1] + (self.next[1] - self.prev[1]) * t;
            self.position += self.step;
        }
        frames
    }

    fn source_frames_wanted(&self, frames: usize) -> usize {
        // float to usize casts saturate
        ((self.position + frames as f64 * self.step).ceil() as usize).saturating_add(1)
    }

    fn reset(&mut self) {
        self.position = 1.0;
        self.prev = [0.0; 2];
        self.next = [0.0; 2];
    }
}

/// Cubic resampler built on rubato's fixed-output-size resampler.
///
/// rubato works in whole chunks, so finished output is queued in `out_left` /
/// `out_right` and handed out across render calls of any size.
pub struct PolynomialResampler {
    resampler: FastFixedOut<f32>,
    out_left: Vec<f32>,
    out_right: Vec<f32>,
    out_pos: usize,
    out_len: usize,
}

impl PolynomialResampler {
    pub fn new(source_sample_rate: f64, target_sample_rate: u32, chunk: usize) -> Result<Self> {
        // target/source (output/input)
        let ratio = target_sample_rate as f64 / source_sample_rate;
        let resampler = FastFixedOut::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, chunk, 2)
            .map_err(|e| {
                RetroSonicError::Resampler(format!("Failed to create polynomial resampler: {}", e))
            })?;

        Ok(Self {
            resampler,
            out_left: vec![0.0; chunk],
            out_right: vec![0.0; chunk],
            out_pos: 0,
            out_len: 0,
        })
    }

    fn render(&mut self, fifo: &mut FrameFifo, left: &mut [f32], right: &mut [f32]) -> usize {
        let frames = left.len().min(right.len());
        let mut written = 0;

        while written < frames {
            if self.out_pos == self.out_len {
                let needed = self.resampler.input_frames_next();
                if fifo.len() < needed {
                    break;
                }

                let (in_left, in_right) = fifo.readable();
                let input = [&in_left[..needed], &in_right[..needed]];
                let mut output = [&mut self.out_left[..], &mut self.out_right[..]];
                let Ok((consumed, produced)) =
                    self.resampler
                        .process_into_buffer(&input[..], &mut output[..], None)
                else {
                    break;
                };

                fifo.consume(consumed);
                self.out_pos = 0;
                self.out_len = produced;
                if produced == 0 {
                    break;
                }
            }

            let n = (frames - written).min(self.out_len - self.out_pos);
            left[written..written + n]
                .copy_from_slice(&self.out_left[self.out_pos..self.out_pos + n]);
            right[written..written + n]
                .copy_from_slice(&self.out_right[self.out_pos..self.out_pos + n]);
            written += n;
            self.out_pos += n;
        }

        written
    }

    fn source_frames_wanted(&self, frames: usize) -> usize {
        let queued = self.out_len - self.out_pos;
        let missing = frames.saturating_sub(queued);
        let chunk = self.out_left.len();
        missing
            .div_ceil(chunk)
            .saturating_mul(self.resampler.input_frames_max())
    }

    fn reset(&mut self) {
        self.resampler.reset();
        self.out_pos = 0;
        self.out_len = 0;
    }
}

/// Converts one source stream to the target rate, pulling from its frame queue
pub enum StreamResampler {
    Linear(LinearResampler),
    Polynomial(PolynomialResampler),
}

impl StreamResampler {
    pub fn new(
        resampler_type: ResamplerType,
        source_sample_rate: f64,
        target_sample_rate: u32,
        chunk: usize,
    ) -> Result<Self> {
        if !source_sample_rate.is_finite() || source_sample_rate <= 0.0 || target_sample_rate == 0 {
            return Err(RetroSonicError::Resampler(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        log::info!(
            "Creating {:?} resampler: {} Hz -> {} Hz",
            resampler_type,
            source_sample_rate,
            target_sample_rate
        );

        Ok(match resampler_type {
            ResamplerType::Linear => {
                Self::Linear(LinearResampler::new(source_sample_rate, target_sample_rate))
            }
            ResamplerType::Polynomial => Self::Polynomial(PolynomialResampler::new(
                source_sample_rate,
                target_sample_rate,
                chunk,
            )?),
        })
    }

    /// Fills `left`/`right` from `fifo`, returning how many frames were produced.
    ///
    /// Fewer frames than requested means the queue ran dry.
    pub(crate) fn render(
        &mut self,
        fifo: &mut FrameFifo,
        left: &mut [f32],
        right: &mut [f32],
    ) -> usize {
        match self {
            Self::Linear(r) => r.render(fifo, left, right),
            Self::Polynomial(r) => r.render(fifo, left, right),
        }
    }

    /// Upper bound on source frames consumed by rendering `frames` output frames
    pub fn source_frames_wanted(&self, frames: usize) -> usize {
        match self {
            Self::Linear(r) => r.source_frames_wanted(frames),
            Self::Polynomial(r) => r.source_frames_wanted(frames),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Linear(r) => r.reset(),
            Self::Polynomial(r) => r.reset(),
        }
    }
}
