use super::{AudioBackend, OutputStream, StreamRequest};
use crate::adapter::{PullAdapter, StreamRenderer};
use crate::error::{PlatformStatus, Result, RetroSonicError};
use crate::events::RetroSonicEvent;
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct OfflineSlot {
    renderer: Option<StreamRenderer>,
    playing: bool,
    fail_next_open: Option<PlatformStatus>,
    fail_next_play: Option<PlatformStatus>,
}

fn lock(slot: &Mutex<OfflineSlot>) -> MutexGuard<'_, OfflineSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Backend without a device: audio is rendered only when the caller asks for it.
///
/// Render calls are made from the caller's thread through [`OfflineStream`] and
/// serialize with stream teardown through a mutex, so this backend is meant for
/// tests and headless rendering, not realtime output.
#[derive(Clone, Default)]
pub struct OfflineBackend {
    slot: Arc<Mutex<OfflineSlot>>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for pulling audio from whichever stream is currently open
    pub fn stream(&self) -> OfflineStream {
        OfflineStream {
            slot: self.slot.clone(),
        }
    }

    /// Makes the next `open_stream` fail with `status`, as a missing device would
    pub fn fail_next_open(&self, status: PlatformStatus) {
        lock(&self.slot).fail_next_open = Some(status);
    }

    /// Makes the next `play` fail with `status`, as a device might
    pub fn fail_next_play(&self, status: PlatformStatus) {
        lock(&self.slot).fail_next_play = Some(status);
    }
}

impl AudioBackend for OfflineBackend {
    fn open_stream(
        &mut self,
        renderer: StreamRenderer,
        _request: &StreamRequest,
        _events: Sender<RetroSonicEvent>,
    ) -> Result<Box<dyn OutputStream>> {
        let mut slot = lock(&self.slot);
        if let Some(status) = slot.fail_next_open.take() {
            return Err(RetroSonicError::FailedToSetOutputDevice {
                status,
                message: "Offline output device unavailable".into(),
            });
        }
        slot.renderer = Some(renderer);
        slot.playing = false;
        Ok(Box::new(OfflineOutput {
            slot: self.slot.clone(),
        }))
    }
}

struct OfflineOutput {
    slot: Arc<Mutex<OfflineSlot>>,
}

impl OutputStream for OfflineOutput {
    fn play(&mut self) -> Result<()> {
        let mut slot = lock(&self.slot);
        if let Some(status) = slot.fail_next_play.take() {
            return Err(RetroSonicError::EngineFailedToStart {
                status,
                message: "Offline stream refused to start".into(),
            });
        }
        slot.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        lock(&self.slot).playing = false;
        Ok(())
    }
}

impl Drop for OfflineOutput {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        slot.renderer = None;
        slot.playing = false;
    }
}

/// Pull side of an [`OfflineBackend`]
#[derive(Clone)]
pub struct OfflineStream {
    slot: Arc<Mutex<OfflineSlot>>,
}

impl OfflineStream {
    /// Plays one render tick into `out`, like a platform callback would.
    ///
    /// Returns the frames rendered. A stream that is closed or not playing
    /// leaves `out` silent and returns 0.
    pub fn render(&self, out: &mut [f32]) -> usize {
        let mut slot = lock(&self.slot);
        let playing = slot.playing;
        match slot.renderer.as_mut() {
            Some(renderer) if playing => renderer.render(out),
            _ => {
                out.fill(0.0);
                0
            }
        }
    }

    pub fn is_open(&self) -> bool {
        lock(&self.slot).renderer.is_some()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.slot).playing
    }
}
