//! # RetroSonic
//!
//! A real-time safe audio pull adapter for emulator frontends.
//!
//! An emulation core pushes raw PCM into lock-free single-producer/single-consumer
//! byte ring buffers, one per audio stream. The platform audio API pulls fixed-size
//! blocks of output on its own realtime thread. RetroSonic sits between the two:
//! it drains each ring buffer, converts 8/16/32-bit PCM to f32, resamples every
//! stream to the output rate, sums the streams, and applies the mono downmix and
//! output gain.
//!
//! ## Quick Start
//!
//! ```no_run
//! use retrosonic::*;
//! use ringbuf::traits::Producer;
//!
//! // One 16-bit stereo stream at the core's native rate
//! let mut source = RingBufferSource::new(16);
//! let mut producer = source.add_stream(2, 32040.0, 1 << 16);
//!
//! let mut engine = RetroSonicEngine::new(RetroSonicEngineDesc::default())?;
//! engine.setup_audio_graph(&mut source)?;
//! engine.start_audio()?;
//!
//! // On the core thread, every emulated frame:
//! let samples: Vec<i16> = vec![0; 1068];
//! for sample in &samples {
//!     producer.push_slice(&sample.to_ne_bytes());
//! }
//!
//! engine.set_volume(0.8);
//! engine.set_mono(true);
//!
//! for event in engine.poll_events() {
//!     if let RetroSonicEvent::BufferUnderrun { buffer } = event {
//!         log::warn!("buffer {} starved", buffer);
//!     }
//! }
//!
//! engine.stop_audio();
//! # Ok::<(), RetroSonicError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`RetroSonicEngine`]**: lifecycle (`setup_audio_graph`, `start_audio`,
//!   `pause_audio`, `stop_audio`) and the volume/mono controls
//! - **[`AudioDataSource`]**: what the emulation core exposes; [`RingBufferSource`]
//!   is a ready-made implementation over `ringbuf`
//! - **[`RenderContext`](render::RenderContext)**: per-stream conversion, resampling
//!   and underrun handling
//! - **[`StreamRenderer`]**: the [`PullAdapter`] handed to the platform callback
//! - **[`AudioBackend`](backend::AudioBackend)**: cpal output or offline rendering
//!
//! ## Threading
//!
//! 1. **Core thread**: writes PCM bytes into the ring buffers
//! 2. **Control thread**: owns the engine, changes volume and mono through atomics
//! 3. **Audio callback**: owns the renderer; reads the ring buffers without locks or
//!    allocation and never blocks
//!
//! Underruns are covered by a short fade to silence and reported as events, never
//! as errors.

pub mod adapter;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod mixer;
pub mod render;
pub mod source;

pub use adapter::{OutputFormat, PullAdapter, StreamRenderer};
pub use backend::{CpalBackend, OfflineBackend, OfflineStream};
pub use config::{OutputLayout, ResamplerType, RetroSonicEngineDesc, UnderrunPolicy};
pub use engine::{EngineState, RetroSonicEngine};
pub use error::{PlatformStatus, RetroSonicError};
pub use events::RetroSonicEvent;
pub use source::{AudioDataSource, AudioSourceDescriptor, RingBufferReader, RingBufferSource};

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::HeapProd;
    use ringbuf::traits::Producer;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn push_sine(producer: &mut HeapProd<u8>, frames: usize, rate: f32, phase: &mut f32) {
        for _ in 0..frames {
            let value = ((*phase * std::f32::consts::TAU).sin() * 16000.0) as i16;
            *phase = (*phase + 440.0 / rate).fract();
            producer.push_slice(&value.to_ne_bytes());
            producer.push_slice(&(value / 2).to_ne_bytes());
        }
    }

    fn running_engine(
        desc: RetroSonicEngineDesc,
        source: &mut RingBufferSource,
    ) -> (RetroSonicEngine, OfflineStream) {
        let backend = OfflineBackend::new();
        let stream = backend.stream();
        let mut engine =
            RetroSonicEngine::with_backend(desc, backend).expect("Failed to create engine");
        engine
            .setup_audio_graph(source)
            .expect("Failed to set up audio graph");
        engine.start_audio().expect("Failed to start engine");
        (engine, stream)
    }

    #[test]
    fn test_render_22050_stereo_to_48000() {
        let mut source = RingBufferSource::new(16);
        let mut producer = source.add_stream(2, 22050.0, 1 << 16);
        let (engine, stream) = running_engine(RetroSonicEngineDesc::default(), &mut source);

        let mut phase = 0.0;
        push_sine(&mut producer, 2048, 22050.0, &mut phase);

        let mut out = vec![f32::NAN; 512 * 2];
        assert_eq!(stream.render(&mut out), 512);
        assert!(out.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        assert!(out.iter().any(|&s| s != 0.0));
        assert_eq!(engine.frames_rendered(), 512);
        assert_eq!(engine.output_format(), OutputFormat::stereo(48000, OutputLayout::Interleaved));
    }

    #[test]
    fn test_start_before_setup_is_a_configuration_error() {
        let mut engine =
            RetroSonicEngine::with_backend(RetroSonicEngineDesc::default(), OfflineBackend::new())
                .unwrap();
        assert!(matches!(
            engine.start_audio(),
            Err(RetroSonicError::Configuration(_))
        ));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_stop_twice() {
        let mut source = RingBufferSource::new(16);
        let _producer = source.add_stream(2, 44100.0, 4096);
        let (mut engine, stream) = running_engine(RetroSonicEngineDesc::default(), &mut source);

        engine.stop_audio();
        engine.stop_audio();
        engine.tear_down();
        assert_eq!(engine.state(), EngineState::Uninitialized);

        let mut out = vec![1.0; 64];
        assert_eq!(stream.render(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_underrun_fades_to_silence() {
        let mut source = RingBufferSource::new(16);
        let mut producer = source.add_stream(2, 48000.0, 1 << 16);
        let (engine, stream) = running_engine(RetroSonicEngineDesc::default(), &mut source);

        // constant full-scale-ish signal, then the core stops producing
        for _ in 0..256 {
            producer.push_slice(&20000i16.to_ne_bytes());
            producer.push_slice(&(-20000i16).to_ne_bytes());
        }
        let mut out = vec![0.0; 128 * 2];
        stream.render(&mut out);
        stream.render(&mut out);

        let mut tail = Vec::new();
        for _ in 0..10 {
            let mut out = vec![0.0; 64 * 2];
            assert_eq!(stream.render(&mut out), 64);
            tail.extend_from_slice(&out);
        }

        assert!(tail.iter().all(|s| s.is_finite()));
        // first empty block starts the fade from the last real frame
        assert!(tail[0].abs() > 0.5);
        assert!(tail[0].abs() < 20000.0 / 32768.0);
        // silent within the 32 frame fade window, and stays silent
        assert!(tail[2 * 32..].iter().all(|&s| s == 0.0));

        assert_eq!(engine.underrun_count(), 1);
        let events = engine.poll_events();
        assert!(events.contains(&RetroSonicEvent::BufferUnderrun { buffer: 0 }));
    }

    #[test]
    fn test_mono_output_is_channel_average() {
        let mut source = RingBufferSource::new(16);
        let mut producer = source.add_stream(2, 48000.0, 1 << 16);
        let (engine, stream) = running_engine(RetroSonicEngineDesc::default(), &mut source);
        engine.set_mono(true);

        for _ in 0..128 {
            producer.push_slice(&12000i16.to_ne_bytes());
            producer.push_slice(&(-4000i16).to_ne_bytes());
        }
        let mut out = vec![0.0; 64 * 2];
        stream.render(&mut out);

        let expected = (12000.0 / 32768.0 + -4000.0 / 32768.0) / 2.0;
        for frame in out[2..].chunks_exact(2) {
            assert!((frame[0] - expected).abs() < 1.0e-6);
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_mono_toggle_mid_stream() {
        let mut source = RingBufferSource::new(16);
        let mut producer = source.add_stream(2, 32000.0, 1 << 18);
        let (engine, stream) = running_engine(
            RetroSonicEngineDesc::default().resampler_type(ResamplerType::Polynomial),
            &mut source,
        );

        let mut phase = 0.0;
        push_sine(&mut producer, 32000, 32000.0, &mut phase);

        let done = Arc::new(AtomicBool::new(false));
        let render_thread = {
            let done = done.clone();
            std::thread::spawn(move || {
                let mut out = vec![0.0; 256 * 2];
                let mut ticks = 0;
                while !done.load(Ordering::Relaxed) || ticks < 50 {
                    assert_eq!(stream.render(&mut out), 256);
                    assert!(out.iter().all(|s| s.is_finite()));
                    ticks += 1;
                }
                ticks
            })
        };

        for i in 0..100 {
            engine.set_mono(i % 2 == 0);
            std::thread::yield_now();
        }
        engine.set_mono(false);
        done.store(true, Ordering::Relaxed);

        let ticks = render_thread.join().expect("render thread panicked");
        assert!(ticks >= 50);
        assert!(!engine.is_mono());
        assert!(engine.frames_rendered() >= 50 * 256);
    }

    #[test]
    fn test_multiple_buffers_with_mixed_formats() {
        let mut source = RingBufferSource::new(16);
        let mut stereo = source.add_stream(2, 44100.0, 1 << 16);
        let mut mono = source.add_stream(1, 22050.0, 1 << 16);
        let (engine, stream) = running_engine(RetroSonicEngineDesc::default(), &mut source);
        assert_eq!(engine.stream_count(), 2);

        for _ in 0..1024 {
            stereo.push_slice(&8192i16.to_ne_bytes());
            stereo.push_slice(&8192i16.to_ne_bytes());
            mono.push_slice(&(-4096i16).to_ne_bytes());
        }

        let mut out = vec![0.0; 256 * 2];
        assert_eq!(stream.render(&mut out), 256);
        // 0.25 + -0.125 on both channels once both streams are past warm-up
        assert!(out[20..].iter().all(|&s| (s - 0.125).abs() < 1.0e-5));
    }
}
