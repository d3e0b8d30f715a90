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

/// The filter responses voices use: lowpass shapes the drone, arpeggio and
/// bass timbres; bandpass shapes clap noise bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Lowpass,
    Bandpass,
}

/// A second order IIR filter, Direct Form II Transposed, with coefficients
/// from the Audio EQ Cookbook (Robert Bristow-Johnson). Parameters are fixed
/// per voice, so coefficients are computed once at construction.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// Creates a filter with the given cutoff (or center) frequency and Q.
    pub fn new(mode: FilterMode, frequency: f64, q: f64, sample_rate: u32) -> Biquad {
        // Keep the frequency inside the representable range so the
        // coefficients stay stable for any configured energy value.
        let nyquist = f64::from(sample_rate) / 2.0;
        let frequency = frequency.clamp(1.0, nyquist * 0.99);

        let w0 = 2.0 * PI * frequency / f64::from(sample_rate);
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2) = match mode {
            FilterMode::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterMode::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Biquad {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Processes a single sample.
    pub fn process(&mut self, input: f32) -> f32 {
        let input = f64::from(input);
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output as f32
    }
}
