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
//! The fixed tables translating motion descriptions into synthesis
//! parameters. Unknown names resolve to a documented default rather than an
//! error so the engine keeps playing whatever the upstream analysis emits.

const PERCUSSION_PATTERN: &[f32] = &[1.0, 0.0, 0.5, 0.0, 1.0, 0.0, 0.5, 0.0];
const BASS_PATTERN: &[f32] = &[1.0, 0.5, 1.0, 0.5];

/// The five motion intensity classes recognized by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntensityClass {
    Static,
    Minimal,
    Moderate,
    Active,
    Intense,
}

impl IntensityClass {
    /// Resolves an intensity class from its wire name. Unknown names map to
    /// moderate.
    pub fn from_name(name: &str) -> IntensityClass {
        match name {
            "static" => IntensityClass::Static,
            "minimal" => IntensityClass::Minimal,
            "moderate" => IntensityClass::Moderate,
            "active" => IntensityClass::Active,
            "intense" => IntensityClass::Intense,
            _ => IntensityClass::Moderate,
        }
    }

    /// The synthesis parameters for this class.
    pub fn profile(self) -> MotionProfile {
        match self {
            IntensityClass::Static => MotionProfile {
                tempo: 60.0,
                volume: 0.3,
                energy: 0.1,
            },
            IntensityClass::Minimal => MotionProfile {
                tempo: 80.0,
                volume: 0.4,
                energy: 0.3,
            },
            IntensityClass::Moderate => MotionProfile {
                tempo: 100.0,
                volume: 0.5,
                energy: 0.5,
            },
            IntensityClass::Active => MotionProfile {
                tempo: 120.0,
                volume: 0.7,
                energy: 0.7,
            },
            IntensityClass::Intense => MotionProfile {
                tempo: 140.0,
                volume: 0.9,
                energy: 0.9,
            },
        }
    }
}

/// Synthesis parameters derived from an intensity class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionProfile {
    /// Base tempo in beats per minute.
    pub tempo: f64,
    /// Master bus volume.
    pub volume: f32,
    /// Drives filter brightness and most voice levels, in [0, 1].
    pub energy: f32,
}

/// The motion pattern classes recognized by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternName {
    Rhythmic,
    Continuous,
    Variable,
    Steady,
}

impl PatternName {
    /// Resolves a pattern from its wire name. Unknown names map to steady.
    pub fn from_name(name: &str) -> PatternName {
        match name {
            "rhythmic" => PatternName::Rhythmic,
            "continuous" => PatternName::Continuous,
            "variable" => PatternName::Variable,
            "steady" => PatternName::Steady,
            _ => PatternName::Steady,
        }
    }

    /// The playing style for this pattern.
    pub fn style(self) -> PatternStyle {
        match self {
            PatternName::Rhythmic => PatternStyle {
                archetype: Archetype::Percussion,
                beat_pattern: PERCUSSION_PATTERN,
                voice_set: &["kick", "hihat", "snare", "snare-noise"],
            },
            PatternName::Continuous => PatternStyle {
                archetype: Archetype::Ambient,
                beat_pattern: &[],
                voice_set: &["drone"],
            },
            PatternName::Variable => PatternStyle {
                archetype: Archetype::Melodic,
                beat_pattern: &[],
                voice_set: &["arpeggio"],
            },
            PatternName::Steady => PatternStyle {
                archetype: Archetype::Bass,
                beat_pattern: BASS_PATTERN,
                voice_set: &["bass"],
            },
        }
    }
}

/// The four pattern generation algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Archetype {
    Percussion,
    Ambient,
    Melodic,
    Bass,
}

/// How a pattern plays: the archetype that drives it, the velocity grid it
/// follows, and the registry tags it can spawn.
#[derive(Clone, Copy, Debug)]
pub struct PatternStyle {
    pub archetype: Archetype,
    pub beat_pattern: &'static [f32],
    pub voice_set: &'static [&'static str],
}
