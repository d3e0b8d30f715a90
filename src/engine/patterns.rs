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
//! The beat drivers. Each one walks an absolute sample grid anchored where
//! it launched, so beat positions never drift with timer jitter. Cancellation
//! is cooperative: a driver that wakes to a stopped session or a stale
//! generation exits without emitting, and the bus discards any spawn that was
//! already in flight when the generation moved.

use std::{sync::Arc, time::Duration};

use rand::Rng;
use tracing::debug;

use crate::{
    graph::{BusHandle, BLOCK_FRAMES},
    synth,
};

use super::{
    motion::{Archetype, PatternStyle},
    session::Session,
};

/// The six-note major scale the melodic arpeggio walks.
const MAJOR_SCALE: [f64; 6] = [261.63, 293.66, 329.63, 392.00, 440.00, 523.25];

/// A driver waiting on a frozen clock still re-checks liveness this often.
const MAX_NAP: Duration = Duration::from_millis(250);

/// Starts the driver for the given style. Percussion, melodic, and bass
/// drivers run as tasks that re-arm themselves beat by beat; the ambient
/// drone spawns its long-lived voices up front and needs no driver.
pub(crate) fn launch(
    handle: &BusHandle,
    session: &Arc<Session>,
    style: PatternStyle,
    tempo: f64,
    energy: f32,
) {
    let beat_seconds = 60.0 / tempo;

    // The pinned handle stamps every spawn with the generation current at
    // launch, so nothing a driver emits can outlive a later stop.
    let handle = handle.pinned();

    match style.archetype {
        Archetype::Percussion => {
            tokio::spawn(percussion(
                handle,
                Arc::clone(session),
                style.beat_pattern,
                beat_seconds,
                energy,
            ));
        }
        Archetype::Ambient => synth::drone_pair(&handle, handle.now(), energy),
        Archetype::Melodic => {
            tokio::spawn(melodic(handle, Arc::clone(session), beat_seconds, energy));
        }
        Archetype::Bass => {
            tokio::spawn(bass(
                handle,
                Arc::clone(session),
                style.beat_pattern,
                beat_seconds,
                energy,
            ));
        }
    }
}

/// Sixteenth-note drums: kick on the beat, snare on the backbeat, hi-hat
/// anywhere else the velocity grid is nonzero.
async fn percussion(
    handle: BusHandle,
    session: Arc<Session>,
    pattern: &'static [f32],
    beat_seconds: f64,
    energy: f32,
) {
    let origin = handle.now();
    let step = handle.samples(beat_seconds / 4.0);

    let mut beat: u64 = 0;
    loop {
        let target = origin + beat * step;
        if !wait_until(&handle, &session, target).await {
            return;
        }
        if handle.generation() != handle.stamp() {
            debug!("Percussion driver cancelled.");
            return;
        }

        let velocity = pattern[beat as usize % pattern.len()];
        if velocity > 0.0 {
            match beat % 4 {
                0 => synth::kick(&handle, target, velocity, energy),
                2 => synth::snare(&handle, target, velocity, energy),
                _ => synth::hihat(&handle, target, velocity, energy),
            }
        }

        beat += 1;
    }
}

/// The arpeggio walks the scale at eighth-note spacing, stepping up one or
/// two positions each note with a touch of random detune.
async fn melodic(handle: BusHandle, session: Arc<Session>, beat_seconds: f64, energy: f32) {
    let origin = handle.now();
    let step = handle.samples(beat_seconds / 2.0);

    let mut index: usize = 0;
    let mut note: u64 = 0;
    loop {
        let target = origin + note * step;
        if !wait_until(&handle, &session, target).await {
            return;
        }
        if handle.generation() != handle.stamp() {
            debug!("Melodic driver cancelled.");
            return;
        }

        let detune = 1.0 + rand::thread_rng().gen_range(0.0..0.02);
        let frequency = MAJOR_SCALE[index % MAJOR_SCALE.len()] * detune;
        synth::arpeggio_note(&handle, target, frequency, energy, beat_seconds);

        index = (index + 1 + rand::thread_rng().gen_range(0..2)) % MAJOR_SCALE.len();
        note += 1;
    }
}

/// The bass alternates the root and its fifth every beat, velocities taken
/// from the style's grid.
async fn bass(
    handle: BusHandle,
    session: Arc<Session>,
    pattern: &'static [f32],
    beat_seconds: f64,
    energy: f32,
) {
    let origin = handle.now();
    let step = handle.samples(beat_seconds);

    let mut beat: u64 = 0;
    loop {
        let target = origin + beat * step;
        if !wait_until(&handle, &session, target).await {
            return;
        }
        if handle.generation() != handle.stamp() {
            debug!("Bass driver cancelled.");
            return;
        }

        let velocity = pattern[beat as usize % pattern.len()];
        if velocity > 0.0 {
            let frequency = if beat % 2 == 0 { 55.0 } else { 82.5 };
            synth::bass_note(&handle, target, frequency, velocity, energy, beat_seconds);
        }

        beat += 1;
    }
}

/// Sleeps until the bus clock is within one block of the target sample, so
/// the spawn is queued by the time the render thread reaches it. Returns
/// false once the session stops.
async fn wait_until(handle: &BusHandle, session: &Session, target: u64) -> bool {
    let lead = BLOCK_FRAMES as u64;
    loop {
        if !session.is_playing() {
            return false;
        }

        let now = handle.now();
        if now + lead >= target {
            return true;
        }

        let seconds = (target - now - lead) as f64 / f64::from(handle.sample_rate());
        let nap = Duration::from_secs_f64(seconds).min(MAX_NAP);
        tokio::time::sleep(nap).await;
    }
}
