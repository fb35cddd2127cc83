/// Fixed-capacity queue of converted stereo frames, stored planar.
///
/// All storage is allocated up front. The readable region is always contiguous
/// so it can be handed to the resampler as plain slices; [`FrameFifo::compact`]
/// moves it back to the start before new frames are written.
pub(crate) struct FrameFifo {
    left: Vec<f32>,
    right: Vec<f32>,
    start: usize,
    end: usize,
}

impl FrameFifo {
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
            start: 0,
            end: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn capacity(&self) -> usize {
        self.left.len()
    }

    /// Frames that can be written after a compaction
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.left.copy_within(self.start..self.end, 0);
        self.right.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;
    }

    /// Write region behind the readable frames, up to `frames` long.
    ///
    /// Call [`FrameFifo::commit`] with the number of frames actually written.
    pub fn write_slices(&mut self, frames: usize) -> (&mut [f32], &mut [f32]) {
        self.compact();
        let stop = (self.end + frames).min(self.capacity());
        (&mut self.left[self.end..stop], &mut self.right[self.end..stop])
    }

    pub fn commit(&mut self, frames: usize) {
        self.end = (self.end + frames).min(self.capacity());
    }

    pub fn pop(&mut self) -> Option<[f32; 2]> {
        if self.is_empty() {
            return None;
        }
        let frame = [self.left[self.start], self.right[self.start]];
        self.start += 1;
        Some(frame)
    }

    pub fn readable(&self) -> (&[f32], &[f32]) {
        (
            &self.left[self.start..self.end],
            &self.right[self.start..self.end],
        )
    }

    pub fn consume(&mut self, frames: usize) {
        self.start = (self.start + frames).min(self.end);
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }
}
