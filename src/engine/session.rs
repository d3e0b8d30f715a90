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
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::motion::PatternStyle;

/// Playback state shared between the engine facade and the pattern drivers.
/// The playing flag is the drivers' fast path; the generation stamp on the
/// bus is what actually closes the stop race.
pub(crate) struct Session {
    playing: AtomicBool,
    state: Mutex<SessionState>,
}

/// What a relaunch needs to reproduce the current pattern.
#[derive(Clone, Copy, Default)]
pub(crate) struct SessionState {
    pub tempo: f64,
    pub energy: f32,
    pub style: Option<PatternStyle>,
}

impl Session {
    pub fn new() -> Session {
        Session {
            playing: AtomicBool::new(false),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Records the new pattern and marks the session live. Called before the
    /// drivers launch so their first wake sees a playing session.
    pub fn begin(&self, style: PatternStyle, tempo: f64, energy: f32) {
        {
            let mut state = self.state.lock();
            state.tempo = tempo;
            state.energy = energy;
            state.style = Some(style);
        }
        self.playing.store(true, Ordering::Release);
    }

    /// Marks the session stopped. The stored pattern survives so a
    /// continuous update can relaunch it.
    pub fn stop(&self) {
        self.playing.store(false, Ordering::Release);
    }

    pub fn tempo(&self) -> f64 {
        self.state.lock().tempo
    }

    pub fn snapshot(&self) -> SessionState {
        *self.state.lock()
    }
}
