// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::{f32::consts::PI, sync::Arc};

use parking_lot::Mutex;
use realfft::{RealFftPlanner, RealToComplex};

/// Analysis window size in samples. 128 usable magnitude bins come out of
/// the 256 point real transform.
pub const WINDOW_SIZE: usize = 256;

/// Number of frequency bins a snapshot reports.
pub const BIN_COUNT: usize = WINDOW_SIZE / 2;

struct Inner {
    /// The most recent post-compressor samples, as a ring.
    ring: Vec<f32>,
    write: usize,
    /// Exponentially smoothed magnitudes from previous snapshots.
    smoothed: Vec<f32>,
    frame: Vec<f32>,
    spectrum: Vec<realfft::num_complex::Complex<f32>>,
}

struct Shared {
    inner: Mutex<Inner>,
    forward: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    smoothing: f32,
}

/// The bus-side half of the analyser: receives rendered blocks.
pub struct AnalyserTap {
    shared: Arc<Shared>,
}

/// A cloneable, read-only view of the analysed output. Pulling a snapshot
/// never affects playback; it only reads the sample ring the render thread
/// maintains.
#[derive(Clone)]
pub struct AnalyserHandle {
    shared: Arc<Shared>,
}

/// Creates a connected tap/handle pair. `smoothing` blends each snapshot
/// with the previous one (0 = no smoothing, values near 1 = slow decay).
pub fn analyser(smoothing: f32) -> (AnalyserTap, AnalyserHandle) {
    let forward = RealFftPlanner::<f32>::new().plan_fft_forward(WINDOW_SIZE);
    let window: Vec<f32> = (0..WINDOW_SIZE)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / WINDOW_SIZE as f32).cos()))
        .collect();

    let inner = Inner {
        ring: vec![0.0; WINDOW_SIZE],
        write: 0,
        smoothed: vec![0.0; BIN_COUNT],
        frame: forward.make_input_vec(),
        spectrum: forward.make_output_vec(),
    };
    let shared = Arc::new(Shared {
        inner: Mutex::new(inner),
        forward,
        window,
        smoothing: smoothing.clamp(0.0, 0.999),
    });

    (
        AnalyserTap {
            shared: Arc::clone(&shared),
        },
        AnalyserHandle { shared },
    )
}

impl AnalyserTap {
    /// Publishes a block of mono samples from the render thread. One short
    /// lock per block, never per sample.
    pub fn write_block(&self, samples: &[f32]) {
        let mut inner = self.shared.inner.lock();
        let Inner { ring, write, .. } = &mut *inner;
        let len = ring.len();
        for &sample in samples {
            ring[*write] = sample;
            *write = (*write + 1) % len;
        }
    }
}

impl AnalyserHandle {
    /// Computes the current frequency-magnitude snapshot: a Hann windowed
    /// real FFT over the latest samples, smoothed against prior snapshots.
    pub fn snapshot(&self) -> Vec<f32> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        let Inner {
            ring,
            write,
            smoothed,
            frame,
            spectrum,
        } = &mut *inner;

        // Unroll the ring into time order and apply the window.
        let len = ring.len();
        let start = *write;
        for (i, value) in frame.iter_mut().enumerate() {
            *value = ring[(start + i) % len] * shared.window[i];
        }

        shared
            .forward
            .process(frame, spectrum)
            .expect("analysis fft sized by planner");

        let scale = 1.0 / WINDOW_SIZE as f32;
        let smoothing = shared.smoothing;
        for (bin, value) in smoothed.iter_mut().zip(spectrum.iter()) {
            let magnitude = value.norm() * scale;
            *bin = smoothing * *bin + (1.0 - smoothing) * magnitude;
        }

        smoothed.clone()
    }
}
