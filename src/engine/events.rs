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
//! One-shot event sounds, transition cues, and the synthesized backdrop
//! loops. None of this rides the beat grid; everything here is fired
//! straight at the bus and ends by its own decay or an explicit stop.

use std::f64::consts::TAU;

use tracing::debug;

use crate::{graph::BusHandle, synth};

/// A sparse motion event reported by the host's analysis layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Collision,
    Gesture,
    Jump,
    Clap,
}

impl EventKind {
    /// Resolves a wire name. Unknown names are `None` so the caller can
    /// drop them instead of guessing.
    pub fn resolve(name: &str) -> Option<EventKind> {
        match name {
            "collision" => Some(EventKind::Collision),
            "gesture" => Some(EventKind::Gesture),
            "jump" => Some(EventKind::Jump),
            "clap" => Some(EventKind::Clap),
            _ => None,
        }
    }

    /// How long the sound lasts.
    pub fn seconds(self) -> f64 {
        match self {
            EventKind::Collision => 0.2,
            EventKind::Gesture => 0.3,
            EventKind::Jump => 0.15,
            EventKind::Clap => 0.05,
        }
    }

    /// Tone frequency, or the band-pass center for the clap.
    pub fn frequency(self) -> f64 {
        match self {
            EventKind::Collision => 100.0,
            EventKind::Gesture => 800.0,
            EventKind::Jump => 60.0,
            EventKind::Clap => 2000.0,
        }
    }
}

/// Schedules an event sound `delay_seconds` past the current clock.
pub(crate) fn play(handle: &BusHandle, kind: EventKind, delay_seconds: f32) {
    let at = handle.now() + handle.samples(f64::from(delay_seconds.max(0.0)));
    debug!(kind = ?kind, at, "Firing event sound.");

    match kind {
        EventKind::Collision => {
            synth::collision_pair(handle, at, kind.frequency(), kind.seconds())
        }
        EventKind::Gesture => {
            synth::event_tone(handle, at, "gesture", kind.frequency(), kind.seconds())
        }
        EventKind::Jump => synth::event_tone(handle, at, "jump", kind.frequency(), kind.seconds()),
        EventKind::Clap => synth::clap_burst(handle, at, kind.frequency(), kind.seconds()),
    }
}

/// A one-shot UI transition cue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CueKind {
    Click,
    Whoosh,
    Impact,
    Transition,
}

/// Fires a cue at the given level.
pub(crate) fn play_cue(handle: &BusHandle, kind: CueKind, level: f32) {
    let at = handle.now();
    debug!(kind = ?kind, level, "Firing cue.");

    match kind {
        CueKind::Click => synth::cue_tone(handle, at, "click", level, 1000.0, None, 0.1),
        CueKind::Whoosh => synth::cue_tone(handle, at, "whoosh", level, 200.0, Some(1000.0), 0.3),
        CueKind::Impact => synth::cue_tone(handle, at, "impact", level, 50.0, None, 0.5),
        CueKind::Transition => {
            synth::cue_tone(handle, at, "transition", level, 500.0, Some(2000.0), 0.2)
        }
    }
}

/// A synthesized looping backdrop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackdropStyle {
    Ambient,
    Cinematic,
    Upbeat,
    Dramatic,
    Peaceful,
}

impl BackdropStyle {
    /// Resolves a wire name. Unknown names are `None`.
    pub fn resolve(name: &str) -> Option<BackdropStyle> {
        match name {
            "ambient" => Some(BackdropStyle::Ambient),
            "cinematic" => Some(BackdropStyle::Cinematic),
            "upbeat" => Some(BackdropStyle::Upbeat),
            "dramatic" => Some(BackdropStyle::Dramatic),
            "peaceful" => Some(BackdropStyle::Peaceful),
            _ => None,
        }
    }
}

/// Seconds of material in one loop pass.
const BACKDROP_SECONDS: f64 = 10.0;

/// Starts a backdrop loop, replacing any backdrop already playing.
pub(crate) fn start_backdrop(handle: &BusHandle, style: BackdropStyle, level: f32) {
    stop_backdrop(handle);
    debug!(style = ?style, level, "Starting backdrop.");

    let channel = backdrop_channel(style, handle.sample_rate());
    synth::backdrop_loop(handle, handle.now(), level, channel.clone(), channel);
}

/// Stops whatever backdrop is playing. A no-op when there is none.
pub(crate) fn stop_backdrop(handle: &BusHandle) {
    let ids = handle.registry().live_ids_tagged(synth::BACKDROP_TAG);
    if !ids.is_empty() {
        debug!(voices = ids.len(), "Stopping backdrop.");
        handle.stop_voices(ids);
    }
}

/// Synthesizes one channel of a backdrop loop. Both channels carry the same
/// material; width comes from the shared reverb.
fn backdrop_channel(style: BackdropStyle, sample_rate: u32) -> Vec<f32> {
    let len = (BACKDROP_SECONDS * f64::from(sample_rate)) as usize;
    let rate = f64::from(sample_rate);
    let quarter = (rate * 0.25) as usize;

    let mut samples = Vec::with_capacity(len);
    for i in 0..len {
        let t = i as f64 / rate;
        let sample = match style {
            BackdropStyle::Ambient => (TAU * 440.0 * t).sin() * 0.1 * (TAU * 0.1 * t).sin(),
            BackdropStyle::Cinematic => (TAU * 60.0 * t).sin() * 0.15 * (TAU * 0.05 * t).sin(),
            BackdropStyle::Upbeat => {
                let gate = ((i / quarter) % 2) as f64;
                (TAU * 880.0 * t).sin() * 0.1 * gate
            }
            BackdropStyle::Dramatic => (TAU * 220.0 * t).sin() * (i as f64 / len as f64) * 0.2,
            BackdropStyle::Peaceful => (TAU * 330.0 * t).sin() * 0.05 * (TAU * 0.2 * t).cos(),
        };
        samples.push(sample as f32);
    }
    samples
}
