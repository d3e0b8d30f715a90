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
//! Output devices. A device takes ownership of an `OutputBus` and renders it
//! on its own threads until every bus handle is gone.

use std::{fmt, sync::Arc, thread};

use thiserror::Error;

use crate::graph::OutputBus;

pub mod cpal;
pub mod mock;
pub mod priority;

/// Errors from device discovery and startup.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no output device found with name {0}")]
    NotFound(String),
    #[error("unable to enumerate audio hosts: {0}")]
    Host(#[from] ::cpal::HostUnavailable),
    #[error("unable to enumerate devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),
    #[error("unable to read device name: {0}")]
    Name(#[from] ::cpal::DeviceNameError),
    #[error("unable to query output configs: {0}")]
    Configs(#[from] ::cpal::SupportedStreamConfigsError),
    #[error("unable to read default output config: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),
    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(::cpal::SampleFormat),
    #[error("device {0} has no stereo output")]
    NoStereo(String),
    #[error("unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),
    #[error("unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),
    #[error("output stream thread exited before the stream came up")]
    StreamThread,
    #[error("unable to gag device probing noise: {0}")]
    Gag(#[from] std::io::Error),
}

/// An audio output.
pub trait Device: fmt::Display + Send + Sync {
    /// Starts rendering the bus through this output. Rendering continues
    /// until every handle onto the bus has been dropped.
    fn start(&self, bus: OutputBus) -> Result<OutputHandle, DeviceError>;

    /// The sample rate the device renders at.
    fn sample_rate(&self) -> u32;
}

/// Keeps a started output alive. Dropping the handle detaches the render
/// threads; they exit on their own once the bus disconnects.
pub struct OutputHandle {
    _threads: Vec<thread::JoinHandle<()>>,
}

impl OutputHandle {
    pub(crate) fn new(threads: Vec<thread::JoinHandle<()>>) -> OutputHandle {
        OutputHandle { _threads: threads }
    }
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, DeviceError> {
    cpal::Device::list()
}

/// Gets a device with the given name. Names starting with "mock" resolve to
/// mock devices; everything else is looked up through cpal.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, DeviceError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    }

    Ok(Arc::new(cpal::Device::get(name)?))
}
