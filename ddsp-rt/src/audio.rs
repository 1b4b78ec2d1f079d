use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig};

use ddsp_engine_rs::pipeline::InferencePipeline;

/// Owns the cpal output stream; audio stops when this is dropped.
pub struct AudioOutput {
    _stream: Stream,
    pub sample_rate: u32,
    pub buffer_size: u32,
}

/// Query the output device's sample rate without opening a stream, so the
/// pipeline can be prepared before audio starts.
pub fn default_output_rate(device_name: Option<&str>) -> Result<u32> {
    let host = cpal::default_host();
    let device = find_output_device(&host, device_name)?;
    let config = device
        .default_output_config()
        .context("no default output config")?;
    Ok(config.sample_rate().0)
}

/// Open a mono f32 output stream that drains the pipeline.
///
/// The callback only calls `pop`, which zero-fills on underrun; the audio
/// thread never blocks on the render worker.
pub fn start(
    device_name: Option<&str>,
    buffer_size: u32,
    pipeline: Arc<InferencePipeline>,
) -> Result<AudioOutput> {
    let host = cpal::default_host();
    let device = find_output_device(&host, device_name)?;

    let sample_rate = device
        .default_output_config()
        .context("no default output config")?
        .sample_rate();

    let config = StreamConfig {
        channels: 1,
        sample_rate,
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                pipeline.pop(data);
            },
            |err| {
                log::error!("output stream error: {err}");
            },
            None,
        )
        .context("failed to build output stream")?;

    stream.play().context("failed to start output stream")?;

    Ok(AudioOutput {
        _stream: stream,
        sample_rate: sample_rate.0,
        buffer_size,
    })
}

/// Enumerate output devices that can do f32.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.output_devices() {
        for device in devices {
            if let Ok(name) = device.name() {
                if supports_f32_output(&device) {
                    names.push(name);
                }
            }
        }
    }
    names
}

fn find_output_device(host: &Host, name: Option<&str>) -> Result<Device> {
    if let Some(name) = name {
        if let Ok(devices) = host.output_devices() {
            for device in devices {
                if device.name().ok().as_deref() == Some(name) {
                    return Ok(device);
                }
            }
        }
        bail!("output device '{name}' not found");
    }
    host.default_output_device()
        .context("no default output device")
}

fn supports_f32_output(device: &Device) -> bool {
    device
        .supported_output_configs()
        .map(|configs| {
            configs
                .into_iter()
                .any(|c| c.sample_format() == SampleFormat::F32)
        })
        .unwrap_or(false)
}
