use super::{AudioBackend, OutputStream, StreamRequest, status};
use crate::adapter::{PullAdapter, StreamRenderer};
use crate::config::OutputLayout;
use crate::error::{PlatformStatus, Result, RetroSonicError};
use crate::events::RetroSonicEvent;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::Sender;

/// Output through the default cpal host
pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Finds the output device by name, or the host default when `name` is `None`
    fn select_device(&self, name: Option<&str>) -> Result<cpal::Device> {
        let Some(name) = name else {
            return self.host.default_output_device().ok_or_else(|| {
                RetroSonicError::FailedToSetOutputDevice {
                    status: status::DEVICE_NOT_FOUND,
                    message: "No default output device available".into(),
                }
            });
        };

        let devices = self.host.output_devices().map_err(|e| {
            RetroSonicError::FailedToSetOutputDevice {
                status: status::BACKEND_SPECIFIC,
                message: format!("Failed to enumerate output devices: {}", e),
            }
        })?;

        find_named(devices, name, |device| device.name().ok())
    }
}

/// First device whose name is `name`
fn find_named<D, I, F>(devices: I, name: &str, device_name: F) -> Result<D>
where
    I: IntoIterator<Item = D>,
    F: Fn(&D) -> Option<String>,
{
    devices
        .into_iter()
        .find(|device| device_name(device).is_some_and(|n| n == name))
        .ok_or_else(|| RetroSonicError::FailedToSetOutputDevice {
            status: status::DEVICE_NOT_FOUND,
            message: format!("Output device '{}' not found", name),
        })
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn open_stream(
        &mut self,
        renderer: StreamRenderer,
        request: &StreamRequest,
        events: Sender<RetroSonicEvent>,
    ) -> Result<Box<dyn OutputStream>> {
        let format = renderer.format();
        if format.layout != OutputLayout::Interleaved {
            return Err(RetroSonicError::EngineFailedToCreate {
                status: status::UNSUPPORTED_LAYOUT,
                message: "cpal streams are interleaved".into(),
            });
        }

        let device = self.select_device(request.device_name.as_deref())?;
        if let Ok(name) = device.name() {
            log::info!("Using output device: {}", name);
        }

        let default_config = device.default_output_config().map_err(|e| {
            let status = if matches!(e, cpal::DefaultStreamConfigError::DeviceNotAvailable) {
                status::DEVICE_NOT_AVAILABLE
            } else {
                status::BACKEND_SPECIFIC
            };
            RetroSonicError::FailedToSetOutputDevice {
                status,
                message: format!("Failed to get default config: {}", e),
            }
        })?;

        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(request.block_size as u32),
        };
        let max_frames = request.max_frames_per_render;

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, renderer, events, max_frames)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, renderer, events, max_frames)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, renderer, events, max_frames)?
            }
            other => {
                return Err(RetroSonicError::EngineFailedToCreate {
                    status: status::UNSUPPORTED_SAMPLE_FORMAT,
                    message: format!("Unsupported sample format: {:?}", other),
                });
            }
        };

        // Some hosts start streams as soon as they are built
        if let Err(e) = stream.pause() {
            log::debug!("Stream could not be paused after creation: {}", e);
        }

        Ok(Box::new(CpalStream { stream }))
    }
}

fn build_status(e: &cpal::BuildStreamError) -> PlatformStatus {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => status::DEVICE_NOT_AVAILABLE,
        cpal::BuildStreamError::StreamConfigNotSupported => status::STREAM_CONFIG_NOT_SUPPORTED,
        cpal::BuildStreamError::InvalidArgument => status::INVALID_ARGUMENT,
        cpal::BuildStreamError::StreamIdOverflow => status::STREAM_ID_OVERFLOW,
        _ => status::BACKEND_SPECIFIC,
    }
}

fn play_status(e: &cpal::PlayStreamError) -> PlatformStatus {
    if matches!(e, cpal::PlayStreamError::DeviceNotAvailable) {
        status::DEVICE_NOT_AVAILABLE
    } else {
        status::BACKEND_SPECIFIC
    }
}

/// Create a typed audio stream that converts from the renderer's f32 output
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut renderer: StreamRenderer,
    events: Sender<RetroSonicEvent>,
    max_frames: usize,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch = vec![0.0f32; max_frames * channels];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(scratch.len()) {
                    let buffer = &mut scratch[..chunk.len()];
                    renderer.render(buffer);
                    for (dst, &src) in chunk.iter_mut().zip(buffer.iter()) {
                        *dst = T::from_sample(src);
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
                let _ = events.try_send(RetroSonicEvent::StreamError {
                    message: err.to_string(),
                });
            },
            None,
        )
        .map_err(|e| RetroSonicError::EngineFailedToCreate {
            status: build_status(&e),
            message: format!("Failed to build stream: {}", e),
        })
}

struct CpalStream {
    stream: cpal::Stream,
}

impl OutputStream for CpalStream {
    fn play(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| RetroSonicError::EngineFailedToStart {
                status: play_status(&e),
                message: format!("Failed to start stream: {}", e),
            })
    }

    fn pause(&mut self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| RetroSonicError::EngineFailedToStart {
                status: status::BACKEND_SPECIFIC,
                message: format!("Failed to pause stream: {}", e),
            })
    }
}
