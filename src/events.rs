//! Event types for RetroSonic

/// Events emitted by the engine and its render thread.
///
/// Render-side events are edge-triggered: a starving stream produces one
/// `BufferUnderrun` when it runs dry and one `BufferRecovered` when data returns,
/// not one event per callback.
#[derive(Debug, Clone, PartialEq)]
pub enum RetroSonicEvent {
    BufferUnderrun { buffer: usize },
    BufferRecovered { buffer: usize },
    EngineStarted,
    EnginePaused,
    EngineStopped,
    StreamError { message: String },
}

impl RetroSonicEvent {
    /// Source buffer the event refers to, for render-side events
    pub fn buffer(&self) -> Option<usize> {
        match self {
            Self::BufferUnderrun { buffer } | Self::BufferRecovered { buffer } => Some(*buffer),
            _ => None,
        }
    }

    /// Platform failures only; underruns are recovered and never count as errors
    pub fn is_error(&self) -> bool {
        matches!(self, Self::StreamError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underrun_is_not_an_error() {
        let underrun = RetroSonicEvent::BufferUnderrun { buffer: 2 };
        assert!(!underrun.is_error());
        assert_eq!(underrun.buffer(), Some(2));

        let stream_error = RetroSonicEvent::StreamError {
            message: "device unplugged".into(),
        };
        assert!(stream_error.is_error());
        assert_eq!(stream_error.buffer(), None);
        assert_eq!(RetroSonicEvent::EngineStarted.buffer(), None);
    }
}
