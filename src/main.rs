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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;

use msynth::audio::{self, Device as _};
use msynth::engine::events::BackdropStyle;
use msynth::engine::{Engine, MotionInput, Vector};
use msynth::Config;

/// Level the CLI runs backdrop loops at.
const BACKDROP_LEVEL: f32 = 0.2;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A motion-driven procedural audio engine."
)]
struct Cli {
    /// The path to an engine tuning file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays a motion-derived session through an output device.
    Play {
        /// The device name to play through.
        #[arg(long)]
        device: String,
        /// The motion intensity class.
        #[arg(short, long, default_value = "moderate")]
        intensity: String,
        /// The motion pattern name.
        #[arg(short, long, default_value = "steady")]
        pattern: String,
        /// How long to play.
        #[arg(short, long, default_value = "10s")]
        duration: String,
        /// Horizontal pan position, -1 to 1.
        #[arg(long)]
        pan: Option<f32>,
        /// A backdrop style to loop under the session.
        #[arg(short, long)]
        backdrop: Option<String>,
    },
    /// Renders a motion-derived session to a stereo WAV file.
    Render {
        /// The output WAV path.
        #[arg(short, long)]
        output: PathBuf,
        /// The motion intensity class.
        #[arg(short, long, default_value = "moderate")]
        intensity: String,
        /// The motion pattern name.
        #[arg(short, long, default_value = "steady")]
        pattern: String,
        /// How long to render.
        #[arg(short, long, default_value = "10s")]
        duration: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            device,
            intensity,
            pattern,
            duration,
            pan,
            backdrop,
        } => {
            let backdrop = match backdrop {
                Some(name) => match BackdropStyle::resolve(&name) {
                    Some(style) => Some(style),
                    None => return Err(format!("unknown backdrop style '{}'", name).into()),
                },
                None => None,
            };
            let duration: Duration = DurationString::from_string(duration)?.into();

            let engine = Engine::new(audio::get_device(&device)?, config);
            engine.initialize()?;

            engine.generate_from_motion(
                &MotionInput {
                    intensity_class: intensity,
                    pattern,
                    vector: pan.map(|x| Vector { x, y: 0.0 }),
                },
                None,
            );
            if let Some(style) = backdrop {
                engine.start_backdrop(style, BACKDROP_LEVEL);
            }

            tokio::time::sleep(duration).await;
            engine.stop_all();
        }
        Commands::Render {
            output,
            intensity,
            pattern,
            duration,
        } => {
            let duration: Duration = DurationString::from_string(duration)?.into();

            let device = audio::mock::Device::get("mock");
            let engine = Engine::new(Arc::new(device.clone()), config);
            engine.initialize()?;

            engine.generate_from_motion(
                &MotionInput {
                    intensity_class: intensity,
                    pattern,
                    vector: None,
                },
                None,
            );

            tokio::time::sleep(duration).await;
            engine.stop_all();

            write_wav(&output, &device.captured(), device.sample_rate())?;
            println!("Wrote {}.", output.display());
        }
    }

    Ok(())
}

/// Writes an interleaved stereo capture as a 16-bit WAV file.
fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_wav_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.wav");

        let samples: Vec<f32> = (0..88200).map(|i| (i % 100) as f32 / 1000.0).collect();
        write_wav(&path, &samples, 44100).expect("wav written");

        let mut reader = hound::WavReader::open(&path).expect("wav opens");
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);

        let read: Vec<i16> = reader
            .samples::<i16>()
            .map(|s| s.expect("sample"))
            .collect();
        assert_eq!(read.len(), 88200);
        assert_eq!(read[0], 0);
        assert_eq!(read[50], (0.05f32 * f32::from(i16::MAX)) as i16);
    }

    #[test]
    fn test_write_wav_clamps_overdriven_samples() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("hot.wav");

        write_wav(&path, &[2.0, -2.0], 44100).expect("wav written");

        let read: Vec<i16> = hound::WavReader::open(&path)
            .expect("wav opens")
            .samples::<i16>()
            .map(|s| s.expect("sample"))
            .collect();
        assert_eq!(read, vec![i16::MAX, i16::MIN + 1]);
    }
}
