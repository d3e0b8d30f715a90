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

#[cfg(test)]
use std::{
    thread,
    time::{Duration, SystemTime},
};

#[cfg(test)]
use crate::{
    config::Config,
    graph::{analyser::AnalyserHandle, BusHandle, OutputBus, BLOCK_FRAMES},
};

#[cfg(test)]
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// A config with transparent dynamics and a dead reverb send, so tests can
/// reason about the dry path sample by sample.
#[cfg(test)]
pub fn transparent_config() -> Config {
    serde_yml::from_str(
        "
reverb_send_level: 0
reverb_seconds: 0.05
compressor:
  ratio: 1
",
    )
    .expect("valid yaml")
}

/// Builds a bus suitable for offline rendering in tests.
#[cfg(test)]
pub fn test_bus() -> (OutputBus, BusHandle, AnalyserHandle) {
    OutputBus::new(TEST_SAMPLE_RATE, &transparent_config())
}

/// Renders whole blocks covering at least the given duration and returns the
/// interleaved stereo output.
#[cfg(test)]
pub fn render_seconds(bus: &mut OutputBus, seconds: f64) -> Vec<f32> {
    let frames = (seconds * f64::from(TEST_SAMPLE_RATE)).ceil() as usize;
    let blocks = frames.div_ceil(BLOCK_FRAMES);

    let mut out = Vec::with_capacity(blocks * BLOCK_FRAMES * 2);
    for _ in 0..blocks {
        let mut block = vec![0.0f32; BLOCK_FRAMES * 2];
        bus.render(&mut block);
        out.extend_from_slice(&block);
    }
    out
}

/// RMS level of a set of samples.
#[cfg(test)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Wait for the given predicate to return true or fail.
#[inline]
#[cfg(test)]
pub fn eventually<F>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Wait for the given async predicate to return true or fail.
#[inline]
#[cfg(test)]
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(tick).await;
    }
}
