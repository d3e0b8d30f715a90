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
use rand::Rng;

/// Generates a uniform white noise buffer covering the given duration.
pub fn noise_buffer(duration_seconds: f32, sample_rate: u32) -> Vec<f32> {
    let length = (f64::from(duration_seconds) * f64::from(sample_rate)).round() as usize;
    let mut rng = rand::thread_rng();

    (0..length).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}
