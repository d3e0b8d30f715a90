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
use std::{collections::VecDeque, sync::Arc};

use rand::Rng;
use realfft::{num_complex::Complex, ComplexToReal, RealFftPlanner, RealToComplex};

/// RMS level the impulse is scaled to. Matches the equal-power calibration
/// convolution reverbs apply, so the wet return sits near unit level for a
/// sustained input no matter how long the impulse is.
const IMPULSE_CALIBRATION_RMS: f32 = 0.00125;

/// Floor on the measured RMS before the calibration divide.
const MIN_IMPULSE_RMS: f32 = 0.000125;

/// A synthetic stereo impulse response: white noise under a squared taper,
/// approximating a decaying room response. Regenerated on every graph
/// initialization, so the shape is deterministic while the content is not.
pub struct ImpulseResponse {
    channels: [Vec<f32>; 2],
}

impl ImpulseResponse {
    /// Builds a decaying noise impulse of the given length, scaled to the
    /// calibration RMS.
    pub fn decaying_noise(seconds: f32, sample_rate: u32) -> ImpulseResponse {
        let length = (f64::from(seconds) * f64::from(sample_rate)).round() as usize;
        let mut rng = rand::thread_rng();

        let mut render = || -> Vec<f32> {
            (0..length)
                .map(|i| {
                    let taper = 1.0 - i as f32 / length as f32;
                    rng.gen_range(-1.0..=1.0) * taper * taper
                })
                .collect()
        };

        let mut left = render();
        let mut right = render();

        let power: f32 = left.iter().chain(right.iter()).map(|s| s * s).sum();
        let rms = (power / (length * 2).max(1) as f32).sqrt();
        let scale = IMPULSE_CALIBRATION_RMS / rms.max(MIN_IMPULSE_RMS);
        for sample in left.iter_mut().chain(right.iter_mut()) {
            *sample *= scale;
        }

        ImpulseResponse {
            channels: [left, right],
        }
    }

    #[cfg(test)]
    fn from_channels(left: Vec<f32>, right: Vec<f32>) -> ImpulseResponse {
        ImpulseResponse {
            channels: [left, right],
        }
    }

    /// Length of the impulse in samples.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    /// Whether the impulse is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }
}

/// Uniform partitioned convolution (overlap-save with a frequency domain
/// delay line). The mono reverb send is convolved against both impulse
/// channels to produce the stereo wet signal; output trails the input by one
/// partition, which just pushes the reverb onset back by ~12 ms.
pub struct Convolver {
    partition: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,

    /// Per channel, per partition: the impulse spectrum.
    impulse_spectra: [Vec<Vec<Complex<f32>>>; 2],
    /// Ring of recent input spectra; `head` is the most recent.
    input_spectra: Vec<Vec<Complex<f32>>>,
    head: usize,

    /// Input samples accumulated toward the next partition. The analysis
    /// frame in `time_input` is [previous partition | newest partition].
    pending: Vec<f32>,
    time_input: Vec<f32>,
    frame_scratch: Vec<f32>,
    accumulator: Vec<Complex<f32>>,
    time_output: Vec<f32>,
    wet_scratch: [Vec<f32>; 2],

    /// Rendered wet sample pairs not yet consumed.
    ready: VecDeque<(f32, f32)>,
}

impl Convolver {
    /// Creates a convolver for the given impulse with the given partition
    /// size in frames.
    pub fn new(impulse: &ImpulseResponse, partition: usize) -> Convolver {
        let fft_len = partition * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let partition_count = impulse.len().div_ceil(partition).max(1);
        let mut time_input = forward.make_input_vec();

        let mut spectra_for = |samples: &[f32]| -> Vec<Vec<Complex<f32>>> {
            (0..partition_count)
                .map(|k| {
                    let start = (k * partition).min(samples.len());
                    let end = (start + partition).min(samples.len());
                    time_input.fill(0.0);
                    time_input[..end - start].copy_from_slice(&samples[start..end]);
                    let mut spectrum = forward.make_output_vec();
                    forward
                        .process(&mut time_input, &mut spectrum)
                        .expect("impulse fft sized by planner");
                    spectrum
                })
                .collect()
        };

        let left = spectra_for(&impulse.channels[0]);
        let right = spectra_for(&impulse.channels[1]);
        time_input.fill(0.0);

        Convolver {
            partition,
            impulse_spectra: [left, right],
            input_spectra: vec![forward.make_output_vec(); partition_count],
            head: 0,
            pending: Vec::with_capacity(partition),
            frame_scratch: forward.make_input_vec(),
            accumulator: forward.make_output_vec(),
            time_output: inverse.make_output_vec(),
            wet_scratch: [vec![0.0; partition], vec![0.0; partition]],
            ready: VecDeque::with_capacity(partition),
            time_input,
            forward,
            inverse,
        }
    }

    /// Feeds one dry sample and returns the current wet sample pair, one
    /// partition behind the input.
    pub fn tick(&mut self, dry: f32) -> (f32, f32) {
        let wet = self.ready.pop_front().unwrap_or((0.0, 0.0));

        self.pending.push(dry);
        if self.pending.len() == self.partition {
            self.render_partition();
        }
        wet
    }

    fn render_partition(&mut self) {
        let partition = self.partition;
        self.time_input.copy_within(partition.., 0);
        self.time_input[partition..].copy_from_slice(&self.pending);
        self.pending.clear();

        // The forward transform consumes its input as scratch, so feed it a
        // copy and keep time_input intact for the next frame's overlap.
        self.frame_scratch.copy_from_slice(&self.time_input);
        self.head = (self.head + 1) % self.input_spectra.len();
        self.forward
            .process(&mut self.frame_scratch, &mut self.input_spectra[self.head])
            .expect("input fft sized by planner");

        let scale = 1.0 / (partition * 2) as f32;
        let count = self.input_spectra.len();
        for channel in 0..2 {
            self.accumulator.fill(Complex::new(0.0, 0.0));
            for (k, impulse_spectrum) in self.impulse_spectra[channel].iter().enumerate() {
                let input_spectrum = &self.input_spectra[(self.head + count - k) % count];
                for (accumulated, (a, b)) in self
                    .accumulator
                    .iter_mut()
                    .zip(impulse_spectrum.iter().zip(input_spectrum.iter()))
                {
                    *accumulated += a * b;
                }
            }

            // Products of real-signal spectra keep these bins real; clear
            // any residue so the inverse transform accepts them.
            let last = self.accumulator.len() - 1;
            self.accumulator[0].im = 0.0;
            self.accumulator[last].im = 0.0;

            self.inverse
                .process(&mut self.accumulator, &mut self.time_output)
                .expect("inverse fft sized by planner");

            // Overlap-save: the valid half of the circular convolution is
            // the second half of the frame.
            for (wet, sample) in self.wet_scratch[channel]
                .iter_mut()
                .zip(&self.time_output[partition..])
            {
                *wet = sample * scale;
            }
        }

        for i in 0..partition {
            self.ready
                .push_back((self.wet_scratch[0][i], self.wet_scratch[1][i]));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_impulse_length() {
        let impulse = ImpulseResponse::decaying_noise(2.0, 44100);
        assert_eq!(impulse.len(), 88200);
    }

    #[test]
    fn test_impulse_taper_bound() {
        let impulse = ImpulseResponse::decaying_noise(1.0, 22050);
        let length = impulse.len() as f32;
        for channel in 0..2 {
            for (i, sample) in impulse.channel(channel).iter().enumerate() {
                let taper = 1.0 - i as f32 / length;
                assert!(
                    sample.abs() <= taper * taper + 1.0e-6,
                    "sample {} exceeds taper bound",
                    i
                );
            }
        }
    }

    #[test]
    fn test_impulse_is_calibrated() {
        let impulse = ImpulseResponse::decaying_noise(2.0, 44100);
        let power: f32 = (0..2)
            .flat_map(|c| impulse.channel(c))
            .map(|s| s * s)
            .sum();
        let rms = (power / (impulse.len() * 2) as f32).sqrt();
        assert!(
            (rms - IMPULSE_CALIBRATION_RMS).abs() / IMPULSE_CALIBRATION_RMS < 1.0e-3,
            "impulse rms {} should match the calibration level",
            rms
        );
    }

    #[test]
    fn test_impulse_channels_are_independent() {
        let impulse = ImpulseResponse::decaying_noise(0.1, 44100);
        assert_ne!(impulse.channel(0), impulse.channel(1));
    }

    #[test]
    fn test_convolver_reproduces_delta_impulse() {
        // Convolving with a unit impulse reproduces the input, delayed by
        // one partition of pipeline latency.
        let partition = 64;
        let mut left = vec![0.0; 128];
        left[0] = 1.0;
        let mut right = vec![0.0; 128];
        right[3] = 1.0;
        let impulse = ImpulseResponse::from_channels(left, right);
        let mut convolver = Convolver::new(&impulse, partition);

        let input: Vec<f32> = (0..512).map(|i| ((i % 37) as f32) / 37.0 - 0.5).collect();
        let output: Vec<(f32, f32)> = input.iter().map(|&s| convolver.tick(s)).collect();

        for i in 0..(512 - partition - 3) {
            let (l, r) = output[i + partition];
            assert!(
                (l - input[i]).abs() < 1.0e-4,
                "left sample {} mismatch: {} vs {}",
                i,
                l,
                input[i]
            );
            if i >= 3 {
                assert!(
                    (r - input[i - 3]).abs() < 1.0e-4,
                    "right sample {} should be delayed by 3",
                    i
                );
            }
        }
    }

    #[test]
    fn test_convolver_produces_tail() {
        let impulse = ImpulseResponse::decaying_noise(0.25, 8000);
        let mut convolver = Convolver::new(&impulse, 128);

        // A single click should ring for the impulse duration.
        let mut outputs = Vec::new();
        outputs.push(convolver.tick(1.0));
        for _ in 0..4000 {
            outputs.push(convolver.tick(0.0));
        }

        let early: f32 = outputs[128..256].iter().map(|(l, _)| l.abs()).sum();
        let mid: f32 = outputs[1000..1128].iter().map(|(l, _)| l.abs()).sum();
        assert!(early > 0.0, "tail should start after pipeline latency");
        assert!(mid > 0.0, "tail should still ring mid-impulse");
        assert!(early > mid, "tail should decay");
    }

    #[test]
    fn test_convolver_is_silent_before_input() {
        let impulse = ImpulseResponse::decaying_noise(0.1, 8000);
        let mut convolver = Convolver::new(&impulse, 64);

        for _ in 0..1000 {
            let (l, r) = convolver.tick(0.0);
            assert_eq!(l, 0.0);
            assert_eq!(r, 0.0);
        }
    }
}
