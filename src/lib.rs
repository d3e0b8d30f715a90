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
//! Motion driven procedural audio.
//!
//! The crate turns classified motion descriptions into sound: an [`Engine`]
//! owns an output device and a block-rendered signal bus, and maps motion
//! onto scheduled pattern sessions, one-shot event sounds, transition cues,
//! and looping backdrops. Everything is synthesized; there are no samples.

pub mod audio;
pub mod config;
pub mod engine;
pub mod graph;
pub mod synth;
mod testutil;

pub use config::Config;
pub use engine::Engine;
