use crate::config::UnderrunPolicy;

/// Per-stream state used to cover underruns without clicks.
///
/// Tracks the last frame emitted from real source data. When the source runs
/// dry the fill ramps from that frame down to silence, and the ramp continues
/// across render calls until it reaches zero.
pub struct UnderrunState {
    policy: UnderrunPolicy,
    last: [f32; 2],
    faded: usize,
}

impl UnderrunState {
    pub fn new(policy: UnderrunPolicy) -> Self {
        Self {
            policy,
            last: [0.0; 2],
            faded: 0,
        }
    }

    /// Records the final frame of a run of real audio
    pub fn track(&mut self, left: f32, right: f32) {
        self.last = [left, right];
        self.faded = 0;
    }

    /// Fills an underrun region
    pub fn fill(&mut self, left: &mut [f32], right: &mut [f32]) {
        let fade_frames = match self.policy {
            UnderrunPolicy::ZeroFill => 0,
            UnderrunPolicy::FadeOut { frames } => frames,
        };

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.faded < fade_frames {
                self.faded += 1;
                let gain = 1.0 - self.faded as f32 / fade_frames as f32;
                *l = self.last[0] * gain;
                *r = self.last[1] * gain;
            } else {
                *l = 0.0;
                *r = 0.0;
            }
        }

        if self.faded >= fade_frames {
            self.last = [0.0; 2];
        }
    }

    pub fn reset(&mut self) {
        self.last = [0.0; 2];
        self.faded = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_fill() {
        let mut state = UnderrunState::new(UnderrunPolicy::ZeroFill);
        state.track(0.8, -0.8);

        let mut left = [1.0; 8];
        let mut right = [1.0; 8];
        state.fill(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn test_fade_reaches_silence_across_calls() {
        let mut state = UnderrunState::new(UnderrunPolicy::FadeOut { frames: 32 });
        state.track(1.0, -0.5);

        let mut out = Vec::new();
        for _ in 0..5 {
            let mut left = [9.0; 10];
            let mut right = [9.0; 10];
            state.fill(&mut left, &mut right);
            out.extend(left.iter().zip(right.iter()).map(|(&l, &r)| (l, r)));
        }

        // monotonically decreasing magnitude, silent from frame 31 on
        for pair in out.windows(2) {
            assert!(pair[1].0.abs() <= pair[0].0.abs());
            assert!(pair[1].1.abs() <= pair[0].1.abs());
        }
        assert!(out[0].0 < 1.0 && out[0].0 > 0.9);
        assert!(out[31..].iter().all(|&(l, r)| l == 0.0 && r == 0.0));
    }

    #[test]
    fn test_new_audio_restarts_fade() {
        let mut state = UnderrunState::new(UnderrunPolicy::FadeOut { frames: 4 });
        state.track(1.0, 1.0);

        let mut left = [0.0; 8];
        let mut right = [0.0; 8];
        state.fill(&mut left, &mut right);
        assert_eq!(left[3], 0.0);

        state.track(0.5, 0.5);
        state.fill(&mut left[..1], &mut right[..1]);
        assert_eq!(left[0], 0.375);
    }
}
