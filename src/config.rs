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
use std::{fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_MASTER_GAIN: f32 = 0.5;
const DEFAULT_REVERB_SEND_LEVEL: f32 = 0.2;
const DEFAULT_REVERB_SECONDS: f32 = 2.0;
const DEFAULT_RHYTHMIC_TEMPO_MULTIPLIER: f64 = 1.2;
const DEFAULT_TEMPO_UPDATE_THRESHOLD: f64 = 10.0;
const DEFAULT_PAN_DEADBAND: f32 = 0.1;
const DEFAULT_ANALYSER_SMOOTHING: f32 = 0.8;

const DEFAULT_COMPRESSOR_THRESHOLD_DB: f64 = -24.0;
const DEFAULT_COMPRESSOR_KNEE_DB: f64 = 30.0;
const DEFAULT_COMPRESSOR_RATIO: f64 = 12.0;
const DEFAULT_COMPRESSOR_ATTACK_SECONDS: f64 = 0.003;
const DEFAULT_COMPRESSOR_RELEASE_SECONDS: f64 = 0.25;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// A YAML representation of the engine tuning. All fields are optional;
/// the defaults reproduce the stock sound.
#[derive(Deserialize, Clone, Default)]
pub struct Config {
    /// Initial master bus gain.
    master_gain: Option<f32>,

    /// Level of the master tap feeding the convolution reverb.
    reverb_send_level: Option<f32>,

    /// Length of the synthesized reverb impulse, in seconds.
    reverb_seconds: Option<f32>,

    /// Tempo multiplier applied when the motion pattern is rhythmic.
    rhythmic_tempo_multiplier: Option<f64>,

    /// Minimum tempo difference, in BPM, before a continuous update
    /// restarts the pattern.
    tempo_update_threshold: Option<f64>,

    /// Directional vector magnitudes at or below this are treated as
    /// centered and skip the pan stage.
    pan_deadband: Option<f32>,

    /// Smoothing factor blended into successive analyser snapshots.
    analyser_smoothing: Option<f32>,

    /// Master bus compressor settings.
    compressor: Option<CompressorConfig>,
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&contents)?)
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.unwrap_or(DEFAULT_MASTER_GAIN)
    }

    pub fn reverb_send_level(&self) -> f32 {
        self.reverb_send_level.unwrap_or(DEFAULT_REVERB_SEND_LEVEL)
    }

    pub fn reverb_seconds(&self) -> f32 {
        self.reverb_seconds
            .unwrap_or(DEFAULT_REVERB_SECONDS)
            .max(0.05)
    }

    pub fn rhythmic_tempo_multiplier(&self) -> f64 {
        self.rhythmic_tempo_multiplier
            .unwrap_or(DEFAULT_RHYTHMIC_TEMPO_MULTIPLIER)
    }

    pub fn tempo_update_threshold(&self) -> f64 {
        self.tempo_update_threshold
            .unwrap_or(DEFAULT_TEMPO_UPDATE_THRESHOLD)
    }

    pub fn pan_deadband(&self) -> f32 {
        self.pan_deadband.unwrap_or(DEFAULT_PAN_DEADBAND)
    }

    pub fn analyser_smoothing(&self) -> f32 {
        self.analyser_smoothing
            .unwrap_or(DEFAULT_ANALYSER_SMOOTHING)
    }

    pub fn compressor(&self) -> CompressorConfig {
        self.compressor.clone().unwrap_or_default()
    }
}

/// Compressor settings for the master bus.
#[derive(Deserialize, Clone, Default)]
pub struct CompressorConfig {
    threshold_db: Option<f64>,
    knee_db: Option<f64>,
    ratio: Option<f64>,
    attack_seconds: Option<f64>,
    release_seconds: Option<f64>,
}

impl CompressorConfig {
    pub fn threshold_db(&self) -> f64 {
        self.threshold_db.unwrap_or(DEFAULT_COMPRESSOR_THRESHOLD_DB)
    }

    pub fn knee_db(&self) -> f64 {
        self.knee_db.unwrap_or(DEFAULT_COMPRESSOR_KNEE_DB)
    }

    pub fn ratio(&self) -> f64 {
        self.ratio.unwrap_or(DEFAULT_COMPRESSOR_RATIO)
    }

    pub fn attack_seconds(&self) -> f64 {
        self.attack_seconds
            .unwrap_or(DEFAULT_COMPRESSOR_ATTACK_SECONDS)
    }

    pub fn release_seconds(&self) -> f64 {
        self.release_seconds
            .unwrap_or(DEFAULT_COMPRESSOR_RELEASE_SECONDS)
    }
}
