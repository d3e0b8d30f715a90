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
use std::f64::consts::PI;

/// Waveform shapes used by the synthesis voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
}

/// A band-limited oscillator. Sawtooth discontinuities are smoothed with a
/// PolyBLEP correction; sine and triangle are generated directly from phase.
/// Phase is kept in [0, 1) and the frequency may be changed between samples
/// without a phase glitch, which is how frequency sweeps are rendered.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    /// Creates an oscillator at the given frequency.
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: u32) -> Oscillator {
        Oscillator {
            waveform,
            frequency,
            phase: 0.0,
            sample_rate: f64::from(sample_rate),
        }
    }

    /// Updates the oscillator frequency. Takes effect on the next sample.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    /// Generates the next sample.
    pub fn next_sample(&mut self) -> f32 {
        let inc = self.frequency / self.sample_rate;
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
            Waveform::Sawtooth => 2.0 * self.phase - 1.0 - poly_blep(self.phase, inc),
        };

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample as f32
    }
}

/// PolyBLEP correction for the sample just before or after a waveform
/// discontinuity. `t` is the phase in [0, 1), `dt` the phase increment.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}
