use crate::adapter::{OutputFormat, StreamRenderer};
use crate::backend::{AudioBackend, CpalBackend, OutputStream, StreamRequest, status};
use crate::config::RetroSonicEngineDesc;
use crate::error::{Result, RetroSonicError};
use crate::events::RetroSonicEvent;
use crate::mixer::SharedControls;
use crate::render::RenderContext;
use crate::source::AudioDataSource;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

/// Lifecycle of the engine's audio graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No graph. `setup_audio_graph` is the only way forward.
    Uninitialized,
    /// Graph built and stream open, not yet started
    Configured,
    Running,
    Paused,
}

/// Audio engine that pulls emulation core audio into a platform output stream
///
/// All methods run on the control thread. The render thread only sees the ring
/// buffers and the atomics in [`SharedControls`].
pub struct RetroSonicEngine {
    desc: RetroSonicEngineDesc,
    backend: Box<dyn AudioBackend>,
    state: EngineState,
    stream: Option<Box<dyn OutputStream>>,
    stream_count: usize,
    controls: Arc<SharedControls>,
    event_sender: Sender<RetroSonicEvent>,
    event_receiver: Receiver<RetroSonicEvent>,
}

impl RetroSonicEngine {
    /// Create an engine that outputs through cpal
    pub fn new(desc: RetroSonicEngineDesc) -> Result<Self> {
        Self::with_backend(desc, CpalBackend::new())
    }

    pub fn with_backend<B>(desc: RetroSonicEngineDesc, backend: B) -> Result<Self>
    where
        B: AudioBackend + 'static,
    {
        desc.validate()?;

        let (event_sender, event_receiver) = crossbeam_channel::bounded(desc.event_capacity.max(1));
        let controls = Arc::new(SharedControls::new(desc.volume, desc.mono));
        controls.set_paused(true);

        Ok(Self {
            desc,
            backend: Box::new(backend),
            state: EngineState::Uninitialized,
            stream: None,
            stream_count: 0,
            controls,
            event_sender,
            event_receiver,
        })
    }

    /// Wraps every usable buffer of `source` and opens the output stream, paused.
    ///
    /// Buffers that cannot be obtained or have an unusable format are logged and
    /// skipped. Fails with [`RetroSonicError::EngineFailedToCreate`] if none are
    /// left, and with a configuration error unless the engine is uninitialized.
    pub fn setup_audio_graph(&mut self, source: &mut dyn AudioDataSource) -> Result<()> {
        if self.state != EngineState::Uninitialized {
            return Err(RetroSonicError::Configuration(format!(
                "Audio graph already set up (state: {:?}); stop audio before reconfiguring",
                self.state
            )));
        }

        let buffer_count = source.audio_buffer_count();
        let mut contexts = Vec::with_capacity(buffer_count);
        let mut last_failure = None;

        for index in 0..buffer_count {
            let descriptor = match source.descriptor(index) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    log::warn!("Skipping audio buffer {}: {}", index, e);
                    last_failure = Some(e.to_string());
                    continue;
                }
            };

            let Some(reader) = source.ring_buffer(index) else {
                log::warn!("Skipping audio buffer {}: ring buffer unavailable", index);
                last_failure = Some(format!("Ring buffer {} unavailable", index));
                continue;
            };

            match RenderContext::new(index, descriptor, reader, &self.desc) {
                Ok(context) => contexts.push(context),
                Err(e) => {
                    log::warn!("Skipping audio buffer {}: {}", index, e);
                    last_failure = Some(e.to_string());
                }
            }
        }

        if contexts.is_empty() {
            return Err(RetroSonicError::EngineFailedToCreate {
                status: status::NO_AUDIO_BUFFERS,
                message: match last_failure {
                    Some(reason) => format!("No usable audio buffers (last failure: {})", reason),
                    None => "Data source has no audio buffers".to_string(),
                },
            });
        }

        self.stream_count = contexts.len();
        self.controls.set_paused(true);

        let renderer = StreamRenderer::new(
            OutputFormat::from_desc(&self.desc),
            contexts,
            self.desc.max_frames_per_render,
            self.controls.clone(),
            self.event_sender.clone(),
        );

        let request = StreamRequest {
            block_size: self.desc.block_size,
            max_frames_per_render: self.desc.max_frames_per_render,
            device_name: self.desc.device_name.clone(),
        };
        let stream = self
            .backend
            .open_stream(renderer, &request, self.event_sender.clone())?;

        self.stream = Some(stream);
        self.state = EngineState::Configured;

        log::info!(
            "Audio graph set up: {} of {} buffers, {} Hz stereo {:?}",
            self.stream_count,
            buffer_count,
            self.desc.sample_rate,
            self.desc.layout
        );

        Ok(())
    }

    /// Start or resume rendering
    pub fn start_audio(&mut self) -> Result<()> {
        match self.state {
            EngineState::Running => return Ok(()),
            EngineState::Uninitialized => {
                return Err(RetroSonicError::Configuration(
                    "start_audio called before setup_audio_graph".into(),
                ));
            }
            EngineState::Configured | EngineState::Paused => {}
        }

        let stream = self.stream.as_mut().ok_or_else(|| {
            RetroSonicError::Configuration("Audio graph has no output stream".into())
        })?;
        stream.play()?;

        self.controls.set_paused(false);
        self.state = EngineState::Running;
        self.emit(RetroSonicEvent::EngineStarted);
        log::info!("Audio engine started");

        Ok(())
    }

    /// Suspend rendering, keeping the graph so `start_audio` can resume it
    pub fn pause_audio(&mut self) {
        if self.state != EngineState::Running {
            return;
        }

        self.controls.set_paused(true);
        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.pause() {
                // the paused flag already silences the renderer
                log::warn!("Failed to pause output stream: {}", e);
            }
        }

        self.state = EngineState::Paused;
        self.emit(RetroSonicEvent::EnginePaused);
    }

    /// Stop rendering and release the audio graph.
    ///
    /// Safe to call in any state and any number of times. When it returns, the
    /// platform stream is gone and no render call can reach the released buffers.
    pub fn stop_audio(&mut self) {
        self.controls.set_paused(true);
        // Dropping the stream stops its callbacks and frees the renderer
        drop(self.stream.take());
        self.stream_count = 0;

        if self.state != EngineState::Uninitialized {
            self.state = EngineState::Uninitialized;
            self.emit(RetroSonicEvent::EngineStopped);
            log::info!("Audio engine stopped");
        }
    }

    pub fn tear_down(&mut self) {
        self.stop_audio();
    }

    /// Sets the output gain, clamped to [0.0, 1.0]. Applies from the next render tick.
    pub fn set_volume(&self, volume: f32) {
        self.controls.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.controls.volume()
    }

    /// Enables or disables the mono downmix. Applies from the next render tick.
    pub fn set_mono(&self, mono: bool) {
        self.controls.set_mono(mono);
    }

    pub fn is_mono(&self) -> bool {
        self.controls.is_mono()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    /// Number of source streams in the current graph
    pub fn stream_count(&self) -> usize {
        self.stream_count
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_desc(&self.desc)
    }

    /// Get the number of output frames rendered since the engine was created
    pub fn frames_rendered(&self) -> u64 {
        self.controls.frames_rendered()
    }

    /// Number of times a stream ran dry
    pub fn underrun_count(&self) -> u64 {
        self.controls.underrun_count()
    }

    /// Drains pending events
    pub fn poll_events(&self) -> Vec<RetroSonicEvent> {
        self.event_receiver.try_iter().collect()
    }

    /// Get the engine configuration
    pub fn config(&self) -> &RetroSonicEngineDesc {
        &self.desc
    }

    fn emit(&self, event: RetroSonicEvent) {
        if self.event_sender.try_send(event).is_err() {
            log::debug!("Event queue full, dropping event");
        }
    }
}

impl Drop for RetroSonicEngine {
    fn drop(&mut self) {
        self.stop_audio();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::source::RingBufferSource;
    use ringbuf::traits::Producer;

    fn engine() -> (RetroSonicEngine, OfflineBackend) {
        let backend = OfflineBackend::new();
        let engine =
            RetroSonicEngine::with_backend(RetroSonicEngineDesc::default(), backend.clone())
                .expect("Failed to create engine");
        (engine, backend)
    }

    #[test]
    fn test_state_machine() {
        let (mut engine, backend) = engine();
        let mut source = RingBufferSource::new(16);
        let _producer = source.add_stream(2, 44100.0, 4096);

        assert_eq!(engine.state(), EngineState::Uninitialized);
        engine.setup_audio_graph(&mut source).unwrap();
        assert_eq!(engine.state(), EngineState::Configured);
        assert!(backend.stream().is_open());
        assert!(!backend.stream().is_playing());

        engine.start_audio().unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        engine.start_audio().unwrap();
        assert!(backend.stream().is_playing());

        engine.pause_audio();
        assert_eq!(engine.state(), EngineState::Paused);
        assert!(!backend.stream().is_playing());

        engine.start_audio().unwrap();
        assert_eq!(engine.state(), EngineState::Running);

        engine.stop_audio();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(!backend.stream().is_open());

        let events = engine.poll_events();
        assert_eq!(
            events,
            vec![
                RetroSonicEvent::EngineStarted,
                RetroSonicEvent::EnginePaused,
                RetroSonicEvent::EngineStarted,
                RetroSonicEvent::EngineStopped,
            ]
        );
    }

    #[test]
    fn test_reconfigure_requires_teardown() {
        let (mut engine, _backend) = engine();
        let mut first = RingBufferSource::new(16);
        let _p1 = first.add_stream(2, 44100.0, 4096);
        engine.setup_audio_graph(&mut first).unwrap();

        let mut second = RingBufferSource::new(16);
        let _p2 = second.add_stream(1, 32000.0, 4096);
        assert!(matches!(
            engine.setup_audio_graph(&mut second),
            Err(RetroSonicError::Configuration(_))
        ));

        engine.stop_audio();
        engine.setup_audio_graph(&mut second).unwrap();
        assert_eq!(engine.stream_count(), 1);
    }

    #[test]
    fn test_bad_buffers_are_skipped() {
        let (mut engine, _backend) = engine();
        let mut source = RingBufferSource::new(16);
        let _bad_channels = source.add_stream(6, 44100.0, 4096);
        let _good = source.add_stream(2, 44100.0, 4096);
        let _bad_rate = source.add_stream(2, 0.0, 4096);

        engine.setup_audio_graph(&mut source).unwrap();
        assert_eq!(engine.stream_count(), 1);
    }

    #[test]
    fn test_no_usable_buffers_fails_to_create() {
        let (mut engine, _backend) = engine();

        let mut empty = RingBufferSource::new(16);
        let err = engine.setup_audio_graph(&mut empty).unwrap_err();
        assert!(matches!(err, RetroSonicError::EngineFailedToCreate { .. }));
        assert_eq!(err.status(), Some(status::NO_AUDIO_BUFFERS));

        let mut bad_depth = RingBufferSource::new(24);
        let _producer = bad_depth.add_stream(2, 44100.0, 4096);
        assert!(matches!(
            engine.setup_audio_graph(&mut bad_depth),
            Err(RetroSonicError::EngineFailedToCreate { .. })
        ));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_start_failure_carries_status() {
        let (mut engine, backend) = engine();
        let mut source = RingBufferSource::new(16);
        let _producer = source.add_stream(2, 44100.0, 4096);
        engine.setup_audio_graph(&mut source).unwrap();

        backend.fail_next_play(-42);
        let err = engine.start_audio().unwrap_err();
        assert!(matches!(err, RetroSonicError::EngineFailedToStart { .. }));
        assert_eq!(err.status(), Some(-42));
        assert_eq!(engine.state(), EngineState::Configured);

        engine.start_audio().unwrap();
        assert!(engine.is_running());
    }

    #[test]
    fn test_setup_can_be_retried_after_open_failure() {
        let (mut engine, backend) = engine();
        let mut source = RingBufferSource::new(16);
        let _producer = source.add_stream(2, 44100.0, 4096);

        backend.fail_next_open(status::DEVICE_NOT_FOUND);
        let err = engine.setup_audio_graph(&mut source).unwrap_err();
        assert!(matches!(err, RetroSonicError::FailedToSetOutputDevice { .. }));
        assert_eq!(err.status(), Some(status::DEVICE_NOT_FOUND));
        assert_eq!(engine.state(), EngineState::Uninitialized);

        engine.setup_audio_graph(&mut source).unwrap();
        assert_eq!(engine.stream_count(), 1);
        engine.start_audio().unwrap();
    }

    #[test]
    fn test_same_source_can_be_set_up_after_stop() {
        let (mut engine, backend) = engine();
        let mut source = RingBufferSource::new(16);
        let mut producer = source.add_stream(2, 48000.0, 4096);

        engine.setup_audio_graph(&mut source).unwrap();
        engine.start_audio().unwrap();
        engine.stop_audio();

        engine.setup_audio_graph(&mut source).unwrap();
        engine.start_audio().unwrap();

        for _ in 0..64 {
            producer.push_slice(&16384i16.to_ne_bytes());
            producer.push_slice(&16384i16.to_ne_bytes());
        }
        let mut out = vec![0.0; 32 * 2];
        assert_eq!(backend.stream().render(&mut out), 32);
        assert!((out[out.len() - 1] - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn test_out_of_range_rate_is_skipped() {
        let (mut engine, _backend) = engine();
        let mut source = RingBufferSource::new(16);
        let _huge = source.add_stream(2, 1.0e30, 4096);
        let _good = source.add_stream(2, 32000.0, 4096);

        engine.setup_audio_graph(&mut source).unwrap();
        assert_eq!(engine.stream_count(), 1);

        engine.stop_audio();
        let mut only_huge = RingBufferSource::new(16);
        let _producer = only_huge.add_stream(1, 1.0e30, 4096);
        let err = engine.setup_audio_graph(&mut only_huge).unwrap_err();
        assert_eq!(err.status(), Some(status::NO_AUDIO_BUFFERS));
    }

    #[test]
    fn test_volume_and_mono_controls() {
        let (engine, _backend) = engine();
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(1.5);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(0.3);
        assert_eq!(engine.volume(), 0.3);

        assert!(!engine.is_mono());
        engine.set_mono(true);
        assert!(engine.is_mono());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let desc = RetroSonicEngineDesc::default().sample_rate(0);
        assert!(RetroSonicEngine::with_backend(desc, OfflineBackend::new()).is_err());
    }
}
