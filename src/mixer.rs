// Mixer module - sums the per-stream render contexts onto the output bus and
// applies the post-processing stages (mono downmix, output gain)

use crate::config::OutputLayout;
use crate::events::RetroSonicEvent;
use crate::render::{RenderContext, Starvation};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Scalars shared between the control thread and the render thread.
///
/// Everything is a plain atomic so the render thread never waits on the
/// control thread.
#[derive(Debug)]
pub struct SharedControls {
    volume_bits: AtomicU32,
    mono: AtomicBool,
    paused: AtomicBool,
    frames_rendered: AtomicU64,
    underruns: AtomicU64,
}

impl SharedControls {
    pub fn new(volume: f32, mono: bool) -> Self {
        Self {
            volume_bits: AtomicU32::new(clamp_volume(volume).to_bits()),
            mono: AtomicBool::new(mono),
            paused: AtomicBool::new(false),
            frames_rendered: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    /// Sets the output gain, clamped to [0.0, 1.0]. NaN mutes.
    pub fn set_volume(&self, volume: f32) {
        self.volume_bits
            .store(clamp_volume(volume).to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_mono(&self, mono: bool) {
        self.mono.store(mono, Ordering::Relaxed);
    }

    pub fn is_mono(&self) -> bool {
        self.mono.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub(crate) fn add_frames_rendered(&self, frames: usize) {
        self.frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_underruns(&self, count: usize) {
        self.underruns.fetch_add(count as u64, Ordering::Relaxed);
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Preallocated planar buffers for one mix pass
pub struct MixScratch {
    pub bus_left: Vec<f32>,
    pub bus_right: Vec<f32>,
    stream_left: Vec<f32>,
    stream_right: Vec<f32>,
}

impl MixScratch {
    pub fn new(max_frames: usize) -> Self {
        Self {
            bus_left: vec![0.0; max_frames],
            bus_right: vec![0.0; max_frames],
            stream_left: vec![0.0; max_frames],
            stream_right: vec![0.0; max_frames],
        }
    }

    pub fn max_frames(&self) -> usize {
        self.bus_left.len()
    }
}

/// Result of mixing one block
pub struct MixResult {
    /// Streams that ran dry during this block
    pub underruns_started: usize,
}

/// Renders every context for `frames` frames and sums them onto the bus.
///
/// Each stream is rendered independently into its own scratch buffers before
/// being added, so streams never see each other's samples. Starvation changes
/// are forwarded to `events`; a full event queue drops them.
pub fn mix_render_contexts(
    contexts: &mut [RenderContext],
    scratch: &mut MixScratch,
    frames: usize,
    events: &Sender<RetroSonicEvent>,
) -> MixResult {
    let frames = frames.min(scratch.max_frames());
    let bus_left = &mut scratch.bus_left[..frames];
    let bus_right = &mut scratch.bus_right[..frames];
    bus_left.fill(0.0);
    bus_right.fill(0.0);

    let mut result = MixResult {
        underruns_started: 0,
    };

    for context in contexts.iter_mut() {
        let left = &mut scratch.stream_left[..frames];
        let right = &mut scratch.stream_right[..frames];
        let outcome = context.render(left, right);

        for (bus, sample) in bus_left.iter_mut().zip(left.iter()) {
            *bus += *sample;
        }
        for (bus, sample) in bus_right.iter_mut().zip(right.iter()) {
            *bus += *sample;
        }

        match outcome.starvation {
            Starvation::Started => {
                result.underruns_started += 1;
                let _ = events.try_send(RetroSonicEvent::BufferUnderrun {
                    buffer: context.index(),
                });
            }
            Starvation::Recovered => {
                let _ = events.try_send(RetroSonicEvent::BufferRecovered {
                    buffer: context.index(),
                });
            }
            Starvation::Unchanged => {}
        }
    }

    result
}

/// Replaces both channels with their average
pub fn downmix_mono(left: &mut [f32], right: &mut [f32]) {
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        let mono = (*l + *r) * 0.5;
        *l = mono;
        *r = mono;
    }
}

/// Output gain that glides to a new target over one block instead of jumping
pub struct GainRamp {
    current: f32,
}

impl GainRamp {
    pub fn new(gain: f32) -> Self {
        Self { current: gain }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn apply(&mut self, target: f32, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if frames == 0 {
            return;
        }

        if self.current == target {
            if target != 1.0 {
                left.iter_mut().for_each(|s| *s *= target);
                right.iter_mut().for_each(|s| *s *= target);
            }
            return;
        }

        let step = (target - self.current) / frames as f32;
        for i in 0..frames {
            let gain = self.current + step * (i + 1) as f32;
            left[i] *= gain;
            right[i] *= gain;
        }
        self.current = target;
    }
}

/// Copies planar bus audio into a platform buffer laid out as `layout`.
///
/// `out` holds `frames_total` frames; this block goes at frame `offset`.
pub fn write_output(
    layout: OutputLayout,
    left: &[f32],
    right: &[f32],
    out: &mut [f32],
    offset: usize,
    frames_total: usize,
) {
    match layout {
        OutputLayout::Interleaved => {
            let dst = &mut out[offset * 2..(offset + left.len()) * 2];
            for (frame, (l, r)) in dst.chunks_exact_mut(2).zip(left.iter().zip(right.iter())) {
                frame[0] = *l;
                frame[1] = *r;
            }
        }
        OutputLayout::NonInterleaved => {
            let (out_left, out_right) = out.split_at_mut(frames_total);
            out_left[offset..offset + left.len()].copy_from_slice(left);
            out_right[offset..offset + right.len()].copy_from_slice(right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_is_clamped() {
        let controls = SharedControls::new(3.0, false);
        assert_eq!(controls.volume(), 1.0);
        controls.set_volume(-1.0);
        assert_eq!(controls.volume(), 0.0);
        controls.set_volume(0.25);
        assert_eq!(controls.volume(), 0.25);
        controls.set_volume(f32::NAN);
        assert_eq!(controls.volume(), 0.0);
    }

    #[test]
    fn test_downmix_mono_averages_channels() {
        let mut left = [0.5, -1.0, 0.3];
        let mut right = [0.1, 1.0, 0.3];
        downmix_mono(&mut left, &mut right);
        assert_eq!(left, right);
        assert!((left[0] - 0.3).abs() < 1.0e-6);
        assert_eq!(left[1], 0.0);
        assert!((left[2] - 0.3).abs() < 1.0e-6);
    }

    #[test]
    fn test_gain_ramp_reaches_target_in_one_block() {
        let mut ramp = GainRamp::new(1.0);
        let mut left = [1.0; 4];
        let mut right = [1.0; 4];
        ramp.apply(0.0, &mut left, &mut right);
        assert_eq!(left, [0.75, 0.5, 0.25, 0.0]);
        assert_eq!(ramp.current(), 0.0);

        let mut left = [1.0; 4];
        let mut right = [1.0; 4];
        ramp.apply(0.0, &mut left, &mut right);
        assert_eq!(left, [0.0; 4]);
    }

    #[test]
    fn test_write_output_layouts() {
        let left = [1.0, 2.0];
        let right = [-1.0, -2.0];

        let mut interleaved = [0.0; 6];
        write_output(OutputLayout::Interleaved, &left, &right, &mut interleaved, 1, 3);
        assert_eq!(interleaved, [0.0, 0.0, 1.0, -1.0, 2.0, -2.0]);

        let mut planar = [0.0; 6];
        write_output(OutputLayout::NonInterleaved, &left, &right, &mut planar, 1, 3);
        assert_eq!(planar, [0.0, 1.0, 2.0, 0.0, -1.0, -2.0]);
    }
}
