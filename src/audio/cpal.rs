// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;
use tracing::{error, info, span, Level};

use crate::audio::{priority, Device as AudioDevice, DeviceError, OutputHandle};
use crate::graph::{OutputBus, BLOCK_FRAMES};

/// Samples per rendered block, interleaved stereo.
const BLOCK_SAMPLES: usize = BLOCK_FRAMES * 2;

/// Blocks buffered between the render thread and the stream callback. Eight
/// blocks is roughly 93 ms at 44.1 kHz, enough to ride out scheduling
/// hiccups without adding audible control latency.
const QUEUE_BLOCKS: usize = 8;

/// A small wrapper around a cpal::Device, carrying what the engine needs to
/// know about it up front.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of output channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The sample rate the device will be driven at.
    sample_rate: u32,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, DeviceError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, DeviceError> {
        // Suppress noisy probe output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };

                let mut max_channels = 0;
                for output_config in output_configs {
                    if max_channels < output_config.channels() {
                        max_channels = output_config.channels();
                    }
                }
                if max_channels == 0 {
                    continue;
                }

                let Ok(default_config) = device.default_output_config() else {
                    continue;
                };

                devices.push(Device {
                    name: device.name()?,
                    max_channels,
                    host_id,
                    device,
                    sample_rate: default_config.sample_rate(),
                });
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(name: &str) -> Result<Device, DeviceError> {
        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }
}

impl AudioDevice for Device {
    /// Renders the bus block by block on a producer thread and streams the
    /// blocks out through cpal. The stream lives on its own thread because
    /// cpal streams cannot move between threads.
    fn start(&self, mut bus: OutputBus) -> Result<OutputHandle, DeviceError> {
        let span = span!(Level::INFO, "output (cpal)");
        let _enter = span.enter();

        if self.max_channels < 2 {
            return Err(DeviceError::NoStereo(self.name.clone()));
        }

        info!(
            device = self.name,
            sample_rate = self.sample_rate,
            "Starting output stream."
        );

        let (block_tx, block_rx) = crossbeam_channel::bounded::<Vec<f32>>(QUEUE_BLOCKS);
        let done = Arc::new(AtomicBool::new(false));

        // The bounded send paces the producer: it renders ahead until the
        // queue is full, then blocks until the callback drains a block.
        let producer = {
            let done = Arc::clone(&done);
            thread::spawn(move || {
                priority::promote_render_thread(
                    priority::render_thread_priority(),
                    priority::rt_audio_enabled(),
                );

                loop {
                    let mut block = vec![0.0f32; BLOCK_SAMPLES];
                    let connected = bus.render(&mut block);
                    if block_tx.send(block).is_err() || !connected {
                        break;
                    }
                }

                done.store(true, Ordering::Release);
            })
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), DeviceError>>(1);
        let stream_thread = {
            let device = self.device.clone();
            let config = cpal::StreamConfig {
                channels: 2,
                sample_rate: self.sample_rate,
                buffer_size: cpal::BufferSize::Default,
            };
            let sample_format = match self.device.default_output_config() {
                Ok(default_config) => default_config.sample_format(),
                Err(e) => return Err(e.into()),
            };

            thread::spawn(move || {
                let built = match sample_format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, block_rx),
                    cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, block_rx),
                    cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, block_rx),
                    other => Err(DeviceError::UnsupportedFormat(other)),
                };

                let stream = match built {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // The stream lives as long as this thread. Once the
                // producer finishes there is nothing left to play.
                while !done.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(100));
                }
            })
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(OutputHandle::new(vec![producer, stream_thread])),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::StreamThread),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Builds an output stream that drains rendered blocks, converting to the
/// device's sample type. Shortfalls are zero-filled; the callback never
/// locks or allocates.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    blocks: Receiver<Vec<f32>>,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut pending: Vec<f32> = Vec::new();
    let mut offset = 0usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut filled = 0;
            while filled < data.len() {
                if offset >= pending.len() {
                    match blocks.try_recv() {
                        Ok(block) => {
                            pending = block;
                            offset = 0;
                        }
                        Err(_) => break,
                    }
                }

                let take = (pending.len() - offset).min(data.len() - filled);
                for (slot, sample) in data[filled..filled + take]
                    .iter_mut()
                    .zip(&pending[offset..offset + take])
                {
                    *slot = T::from_sample(*sample);
                }
                offset += take;
                filled += take;
            }

            for slot in data[filled..].iter_mut() {
                *slot = T::from_sample(0.0f32);
            }
        },
        |err| error!("cpal output stream error: {}", err),
        None,
    )?;

    Ok(stream)
}
