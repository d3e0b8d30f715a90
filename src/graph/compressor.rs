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
use crate::config::CompressorConfig;

/// A feed-forward stereo dynamics compressor: peak envelope follower with
/// attack/release smoothing, soft knee with quadratic interpolation. Sits at
/// the end of the master bus to keep layered voices from clipping.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f64,
    knee_db: f64,
    ratio: f64,
    attack_coefficient: f64,
    release_coefficient: f64,
    envelope: f64,
}

impl Compressor {
    /// Creates a compressor from the configured parameters.
    pub fn new(config: &CompressorConfig, sample_rate: u32) -> Compressor {
        let sample_rate = f64::from(sample_rate);
        Compressor {
            threshold_db: config.threshold_db(),
            knee_db: config.knee_db(),
            ratio: config.ratio().max(1.0),
            attack_coefficient: smoothing_coefficient(config.attack_seconds(), sample_rate),
            release_coefficient: smoothing_coefficient(config.release_seconds(), sample_rate),
            envelope: 0.0,
        }
    }

    /// Processes a stereo sample pair.
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let input_level = f64::from(left.abs().max(right.abs()));

        let coefficient = if input_level > self.envelope {
            self.attack_coefficient
        } else {
            self.release_coefficient
        };
        self.envelope = coefficient * self.envelope + (1.0 - coefficient) * input_level;

        let gain = db_to_linear(self.gain_reduction_db(linear_to_db(self.envelope))) as f32;
        (left * gain, right * gain)
    }

    /// Gain reduction in dB (non-positive) for the given input level.
    fn gain_reduction_db(&self, input_db: f64) -> f64 {
        let half_knee = self.knee_db / 2.0;
        let slope = 1.0 - 1.0 / self.ratio;

        if input_db <= self.threshold_db - half_knee {
            0.0
        } else if input_db >= self.threshold_db + half_knee {
            (self.threshold_db - input_db) * slope
        } else {
            let over = input_db - (self.threshold_db - half_knee);
            let knee_factor = over / self.knee_db;
            -knee_factor * knee_factor * slope * half_knee
        }
    }
}

fn smoothing_coefficient(time_seconds: f64, sample_rate: f64) -> f64 {
    (-1.0 / (time_seconds.max(1.0e-4) * sample_rate)).exp()
}

fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

fn db_to_linear(db: f64) -> f64 {
    10.0f64.powf(db / 20.0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn compressor() -> Compressor {
        Compressor::new(&CompressorConfig::default(), 44100)
    }

    #[test]
    fn test_quiet_signals_pass_through() {
        let mut compressor = compressor();

        // -40 dB sits below the bottom of the knee (-24 - 15 dB).
        let mut output = (0.0, 0.0);
        for _ in 0..5000 {
            output = compressor.process(0.01, 0.01);
        }
        assert!((output.0 - 0.01).abs() < 0.002, "got {}", output.0);
    }

    #[test]
    fn test_loud_signals_are_reduced() {
        let mut compressor = compressor();

        let mut output = (0.0, 0.0);
        for _ in 0..10000 {
            output = compressor.process(1.0, 1.0);
        }

        // 0 dBFS against a -24 dB threshold at 12:1 leaves roughly -22 dB
        // of reduction once the envelope has settled.
        assert!(output.0 < 0.2, "expected strong reduction, got {}", output.0);
        assert!(output.0 > 0.01, "over-compressed: {}", output.0);
    }

    #[test]
    fn test_attack_lets_first_samples_through() {
        let mut compressor = compressor();

        let (first, _) = compressor.process(1.0, 1.0);
        for _ in 0..2000 {
            compressor.process(1.0, 1.0);
        }
        let (settled, _) = compressor.process(1.0, 1.0);

        assert!(
            first > settled,
            "attack should trail the input: first {} settled {}",
            first,
            settled
        );
    }

    #[test]
    fn test_release_recovers_gain() {
        let mut compressor = compressor();

        for _ in 0..5000 {
            compressor.process(1.0, 1.0);
        }
        let (ducked, _) = compressor.process(0.05, 0.05);

        // 250 ms release at 44.1 kHz needs a while to recover.
        for _ in 0..44100 {
            compressor.process(0.05, 0.05);
        }
        let (recovered, _) = compressor.process(0.05, 0.05);

        assert!(
            recovered > ducked,
            "release should recover gain: ducked {} recovered {}",
            ducked,
            recovered
        );
    }

    #[test]
    fn test_stereo_channels_share_gain() {
        let mut compressor = compressor();

        for _ in 0..5000 {
            compressor.process(1.0, 0.25);
        }
        let (left, right) = compressor.process(1.0, 0.25);

        // The louder channel drives the envelope; both are scaled equally.
        assert!((left / 1.0 - right / 0.25).abs() < 1.0e-6);
    }
}
