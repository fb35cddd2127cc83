//! Platform audio output behind a small trait seam
//!
//! [`CpalBackend`] drives a real output device. [`OfflineBackend`] lets the
//! caller pull rendered audio on its own thread, for headless use and tests.

mod cpal_backend;
mod offline;

pub use cpal_backend::CpalBackend;
pub use offline::{OfflineBackend, OfflineStream};

use crate::adapter::StreamRenderer;
use crate::error::Result;
use crate::events::RetroSonicEvent;
use crossbeam_channel::Sender;

/// Status codes attached to platform errors
pub mod status {
    use crate::error::PlatformStatus;

    pub const DEVICE_NOT_AVAILABLE: PlatformStatus = -1;
    pub const STREAM_CONFIG_NOT_SUPPORTED: PlatformStatus = -2;
    pub const INVALID_ARGUMENT: PlatformStatus = -3;
    pub const STREAM_ID_OVERFLOW: PlatformStatus = -4;
    pub const BACKEND_SPECIFIC: PlatformStatus = -5;
    pub const DEVICE_NOT_FOUND: PlatformStatus = -6;
    pub const UNSUPPORTED_SAMPLE_FORMAT: PlatformStatus = -7;
    pub const NO_AUDIO_BUFFERS: PlatformStatus = -8;
    pub const UNSUPPORTED_LAYOUT: PlatformStatus = -9;
}

/// Parameters for opening an output stream
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Preferred frames per callback
    pub block_size: usize,
    /// Largest block the callback converts in one pass
    pub max_frames_per_render: usize,
    pub device_name: Option<String>,
}

/// Creates platform output streams.
pub trait AudioBackend {
    /// Opens a stream that pulls from `renderer`, initially paused.
    ///
    /// The stream takes ownership of the renderer; dropping the returned stream
    /// must stop all callbacks before returning.
    fn open_stream(
        &mut self,
        renderer: StreamRenderer,
        request: &StreamRequest,
        events: Sender<RetroSonicEvent>,
    ) -> Result<Box<dyn OutputStream>>;
}

/// A platform stream that has been opened by an [`AudioBackend`]
pub trait OutputStream {
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;
}
