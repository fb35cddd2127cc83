use retrosonic::{RetroSonicEngine, RetroSonicEngineDesc, RetroSonicEvent, RingBufferSource};
use ringbuf::traits::{Observer, Producer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Native rate of the pretend core, the SNES APU rate
const CORE_SAMPLE_RATE: f64 = 32040.0;
/// Samples per emulated video frame at ~60 fps
const FRAMES_PER_TICK: usize = 534;

/// Plays a synthetic 16-bit stereo core stream through the default output device
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut source = RingBufferSource::new(16);
    let mut producer = source.add_stream(2, CORE_SAMPLE_RATE, 1 << 16);

    let desc = RetroSonicEngineDesc::default().sample_rate(48000).block_size(512);
    let mut engine = RetroSonicEngine::new(desc)?;
    engine.setup_audio_graph(&mut source)?;

    // Emulation thread: one tick of audio per emulated frame, paced by free space
    let running = Arc::new(AtomicBool::new(true));
    let core = {
        let running = running.clone();
        std::thread::spawn(move || {
            let mut phase = 0.0f64;
            let mut bytes = Vec::with_capacity(FRAMES_PER_TICK * 4);
            while running.load(Ordering::Relaxed) {
                if producer.vacant_len() < FRAMES_PER_TICK * 4 {
                    std::thread::sleep(Duration::from_millis(2));
                    continue;
                }

                bytes.clear();
                for _ in 0..FRAMES_PER_TICK {
                    let left = ((phase * std::f64::consts::TAU).sin() * 8000.0) as i16;
                    let right = if phase < 0.5 { 3000i16 } else { -3000 };
                    bytes.extend_from_slice(&left.to_ne_bytes());
                    bytes.extend_from_slice(&right.to_ne_bytes());
                    phase = (phase + 220.0 / CORE_SAMPLE_RATE).fract();
                }
                producer.push_slice(&bytes);
            }
        })
    };

    engine.start_audio()?;
    log::info!("Playing stereo stream for 2 seconds...");
    std::thread::sleep(Duration::from_secs(2));

    log::info!("Mono downmix on");
    engine.set_mono(true);
    std::thread::sleep(Duration::from_secs(2));

    log::info!("Mono off, volume down");
    engine.set_mono(false);
    engine.set_volume(0.3);
    std::thread::sleep(Duration::from_secs(2));

    log::info!("Paused");
    engine.pause_audio();
    std::thread::sleep(Duration::from_secs(1));

    engine.start_audio()?;
    std::thread::sleep(Duration::from_secs(1));

    running.store(false, Ordering::Relaxed);
    let _ = core.join();

    // the core has stopped, so the stream fades out and starves
    std::thread::sleep(Duration::from_millis(200));
    engine.stop_audio();

    for event in engine.poll_events() {
        if event.is_error() {
            log::error!("Event: {:?}", event);
        } else if let RetroSonicEvent::BufferUnderrun { buffer } = event {
            log::warn!("Buffer {} underran", buffer);
        } else {
            log::info!("Event: {:?}", event);
        }
    }
    log::info!(
        "Rendered {} frames, {} underruns",
        engine.frames_rendered(),
        engine.underrun_count()
    );

    Ok(())
}
