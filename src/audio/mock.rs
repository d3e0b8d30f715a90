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
use std::{fmt, sync::Arc, thread, time::Instant};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use crate::graph::{OutputBus, BLOCK_FRAMES};

use super::{DeviceError, OutputHandle};

/// The rate mock devices pretend to render at.
const MOCK_SAMPLE_RATE: u32 = 44100;

/// A mock output: a consumer thread paces the bus at the real block rate
/// without touching any hardware, and keeps everything it renders. The
/// capture grows without bound, which is fine for the tests and offline
/// renders it exists for.
#[derive(Clone)]
pub struct Device {
    name: String,
    captured: Arc<Mutex<Vec<f32>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Everything the device has rendered so far, interleaved stereo.
    pub fn captured(&self) -> Vec<f32> {
        self.captured.lock().clone()
    }
}

impl super::Device for Device {
    fn start(&self, mut bus: OutputBus) -> Result<OutputHandle, DeviceError> {
        let span = span!(Level::INFO, "output (mock)");
        let name = self.name.clone();
        let captured = Arc::clone(&self.captured);
        let period = std::time::Duration::from_secs_f64(
            BLOCK_FRAMES as f64 / f64::from(MOCK_SAMPLE_RATE),
        );

        let consumer = thread::spawn(move || {
            let _enter = span.enter();
            info!(device = name, "Mock output running.");

            let mut out = vec![0.0f32; BLOCK_FRAMES * 2];
            loop {
                let started = Instant::now();
                if !bus.render(&mut out) {
                    break;
                }
                captured.lock().extend_from_slice(&out);
                spin_sleep::sleep(period.saturating_sub(started.elapsed()));
            }

            info!(device = name, "Mock output finished.");
        });

        Ok(OutputHandle::new(vec![consumer]))
    }

    fn sample_rate(&self) -> u32 {
        MOCK_SAMPLE_RATE
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
