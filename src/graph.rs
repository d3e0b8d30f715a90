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
use std::{
    f32::consts::PI,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::debug;

use crate::config::Config;

pub mod analyser;
pub mod automation;
pub mod compressor;
pub mod filter;
pub mod noise;
pub mod oscillator;
pub mod reverb;
pub mod voice;

use analyser::{AnalyserHandle, AnalyserTap};
use automation::Automation;
use compressor::Compressor;
use reverb::{Convolver, ImpulseResponse};
use voice::{Voice, VoiceId, VoiceRegistry};

/// Frames rendered per block. Commands are applied and finished voices are
/// retired at block boundaries, so this is also the scheduling granularity.
pub const BLOCK_FRAMES: usize = 512;

/// Mutations applied to the bus at the next block boundary.
enum Command {
    /// Adds a voice; discarded if the generation is stale by the time the
    /// render thread sees it.
    Spawn { voice: Box<Voice>, generation: u64 },
    /// Force-stops voices. Unknown ids are ignored.
    Stop { ids: Vec<VoiceId> },
    /// Retargets the master gain, ramping over `ramp_seconds` (0 = now).
    SetMasterGain { value: f32, ramp_seconds: f32 },
    /// Moves the stereo pan position, pre-clamped to [-1, 1] here.
    SetPan { value: f32 },
}

/// The caller-side handle to a running bus: allocates voice ids, stamps
/// commands, and publishes the render clock. Cheap to clone; dropping every
/// clone shuts the render loop down.
#[derive(Clone)]
pub struct BusHandle {
    tx: Sender<Command>,
    clock: Arc<AtomicU64>,
    generation: Arc<AtomicU64>,
    pinned_generation: Option<u64>,
    next_voice_id: Arc<AtomicU64>,
    registry: VoiceRegistry,
    sample_rate: u32,
}

impl BusHandle {
    /// The bus clock: samples rendered so far.
    pub fn now(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Converts a duration in seconds to a sample count.
    pub fn samples(&self, seconds: f64) -> u64 {
        (seconds * f64::from(self.sample_rate)).round() as u64
    }

    /// Allocates an id for a voice to be spawned on this bus.
    pub fn allocate_voice_id(&self) -> VoiceId {
        VoiceId(self.next_voice_id.fetch_add(1, Ordering::Relaxed))
    }

    /// The live generation stamp.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Invalidates all in-flight scheduled work and returns the new
    /// generation.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// A clone whose spawns are stamped with the generation that is current
    /// right now. A driver holding a pinned handle cannot leak a voice into
    /// a later generation no matter how its last emission races a stop.
    pub fn pinned(&self) -> BusHandle {
        let mut handle = self.clone();
        handle.pinned_generation = Some(self.generation());
        handle
    }

    /// The generation this handle stamps onto spawns.
    pub fn stamp(&self) -> u64 {
        self.pinned_generation.unwrap_or_else(|| self.generation())
    }

    /// Registers and schedules a voice. The voice is visible in the registry
    /// immediately; the render thread picks it up at the next block.
    pub fn spawn(&self, voice: Voice) {
        let id = voice.id();
        self.registry.register(id, voice.tag());
        let command = Command::Spawn {
            voice: Box::new(voice),
            generation: self.stamp(),
        };
        if self.tx.send(command).is_err() {
            debug!(voice = %id, "Bus is gone; dropping voice.");
            self.registry.retire(id);
        }
    }

    /// Force-stops the given voices.
    pub fn stop_voices(&self, ids: Vec<VoiceId>) {
        let _ = self.tx.send(Command::Stop { ids });
    }

    /// Retargets the master gain.
    pub fn set_master_gain(&self, value: f32, ramp_seconds: f32) {
        let _ = self.tx.send(Command::SetMasterGain {
            value,
            ramp_seconds,
        });
    }

    /// Moves the pan position. Out-of-range values are clamped.
    pub fn set_pan(&self, value: f32) {
        let _ = self.tx.send(Command::SetPan {
            value: value.clamp(-1.0, 1.0),
        });
    }

    /// The registry of live voices on this bus.
    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }
}

/// The render-side owner of the signal path:
///
/// voices → master gain → pan → compressor → analyser tap → out
///                │
///                └→ send gain → convolver ───────────────→ out
///
/// Rendered by the device's producer thread in `BLOCK_FRAMES` chunks. The
/// reverb send taps the master-gained mix before the pan stage, so panning
/// never detaches the wet path.
pub struct OutputBus {
    rx: Receiver<Command>,
    voices: Vec<Voice>,
    master_gain: Automation,
    pan: f32,
    compressor: Compressor,
    convolver: Convolver,
    send_level: f32,
    analyser_tap: AnalyserTap,
    analyser_scratch: Vec<f32>,
    registry: VoiceRegistry,
    sample_rate: u32,
    clock: u64,
    shared_clock: Arc<AtomicU64>,
    generation: Arc<AtomicU64>,
    disconnected: bool,
}

impl OutputBus {
    /// Builds a bus and its handle, including the freshly synthesized
    /// reverb impulse.
    pub fn new(sample_rate: u32, config: &Config) -> (OutputBus, BusHandle, AnalyserHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let clock = Arc::new(AtomicU64::new(0));
        let generation = Arc::new(AtomicU64::new(0));
        let registry = VoiceRegistry::new();
        let (analyser_tap, analyser_handle) = analyser::analyser(config.analyser_smoothing());

        let impulse = ImpulseResponse::decaying_noise(config.reverb_seconds(), sample_rate);
        let convolver = Convolver::new(&impulse, BLOCK_FRAMES);

        let handle = BusHandle {
            tx,
            clock: Arc::clone(&clock),
            generation: Arc::clone(&generation),
            pinned_generation: None,
            next_voice_id: Arc::new(AtomicU64::new(1)),
            registry: registry.clone(),
            sample_rate,
        };

        let bus = OutputBus {
            rx,
            voices: Vec::new(),
            master_gain: Automation::new(config.master_gain()),
            pan: 0.0,
            compressor: Compressor::new(&config.compressor(), sample_rate),
            convolver,
            send_level: config.reverb_send_level(),
            analyser_tap,
            analyser_scratch: Vec::with_capacity(BLOCK_FRAMES),
            registry,
            sample_rate,
            clock: 0,
            shared_clock: clock,
            generation,
            disconnected: false,
        };

        (bus, handle, analyser_handle)
    }

    /// Renders one interleaved stereo block. Returns false once every
    /// handle is gone and the device should wind down.
    pub fn render(&mut self, out: &mut [f32]) -> bool {
        self.apply_commands();

        let frames = out.len() / 2;
        self.analyser_scratch.clear();

        for frame in 0..frames {
            let clock = self.clock + frame as u64;

            let mut left = 0.0f32;
            let mut right = 0.0f32;
            for voice in self.voices.iter_mut() {
                let (l, r) = voice.next_frame(clock);
                left += l;
                right += r;
            }

            let gain = self.master_gain.value_at(clock);
            left *= gain;
            right *= gain;

            let send = (left + right) * 0.5 * self.send_level;
            let (wet_left, wet_right) = self.convolver.tick(send);

            let (left, right) = pan_frame(left, right, self.pan);
            let (left, right) = self.compressor.process(left, right);
            self.analyser_scratch.push((left + right) * 0.5);

            out[frame * 2] = left + wet_left;
            out[frame * 2 + 1] = right + wet_right;
        }

        self.clock += frames as u64;
        self.shared_clock.store(self.clock, Ordering::Release);
        self.analyser_tap.write_block(&self.analyser_scratch);
        self.retire_finished();

        !self.disconnected
    }

    fn apply_commands(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(Command::Spawn { voice, generation }) => {
                    if generation != self.generation.load(Ordering::Acquire) {
                        // A stop landed between scheduling and pickup; the
                        // voice must not sound.
                        debug!(voice = %voice.id(), "Discarding stale voice.");
                        self.registry.retire(voice.id());
                        continue;
                    }
                    self.voices.push(*voice);
                }
                Ok(Command::Stop { ids }) => {
                    let registry = &self.registry;
                    self.voices.retain(|voice| {
                        if ids.contains(&voice.id()) {
                            registry.retire(voice.id());
                            false
                        } else {
                            true
                        }
                    });
                }
                Ok(Command::SetMasterGain {
                    value,
                    ramp_seconds,
                }) => {
                    let ramp = (f64::from(ramp_seconds) * f64::from(self.sample_rate)) as u64;
                    self.master_gain
                        .linear_ramp_from_current(value, self.clock, self.clock + ramp.max(1));
                }
                Ok(Command::SetPan { value }) => self.pan = value,
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    return;
                }
            }
        }
    }

    fn retire_finished(&mut self) {
        let clock = self.clock;
        let registry = &self.registry;
        self.voices.retain(|voice| {
            if voice.is_finished(clock) {
                registry.retire(voice.id());
                false
            } else {
                true
            }
        });
    }
}

/// The Web Audio stereo pan law: constant power, with the opposite channel
/// folded across as the position moves off center.
fn pan_frame(left: f32, right: f32, pan: f32) -> (f32, f32) {
    if pan == 0.0 {
        return (left, right);
    }

    if pan < 0.0 {
        let x = (pan + 1.0) * PI / 2.0;
        (left + right * x.cos(), right * x.sin())
    } else {
        let x = pan * PI / 2.0;
        (left * x.cos(), right + left * x.sin())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use super::voice::VoiceSource;

    const SAMPLE_RATE: u32 = 44100;

    /// Transparent dynamics and a dead reverb send so assertions can do
    /// exact math on the dry path.
    fn test_config() -> Config {
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

    /// A voice holding both channels at a constant level until stopped.
    fn spawn_steady(handle: &BusHandle, level: f32) -> VoiceId {
        let id = handle.allocate_voice_id();
        let source = VoiceSource::Loop {
            left: vec![level; 4],
            right: vec![level; 4],
            position: 0,
        };
        handle.spawn(Voice::new(id, "steady", 0, source));
        id
    }

    fn render_block(bus: &mut OutputBus) -> Vec<f32> {
        let mut out = vec![0.0f32; BLOCK_FRAMES * 2];
        bus.render(&mut out);
        out
    }

    fn peak(out: &[f32]) -> f32 {
        out.iter().fold(0.0f32, |acc, sample| acc.max(sample.abs()))
    }

    fn left_at(out: &[f32], frame: usize) -> f32 {
        out[frame * 2]
    }

    fn right_at(out: &[f32], frame: usize) -> f32 {
        out[frame * 2 + 1]
    }

    #[test]
    fn test_spawned_voice_is_audible_and_retires_at_stop() {
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        let id = handle.allocate_voice_id();
        let source = VoiceSource::Loop {
            left: vec![0.8; 4],
            right: vec![0.8; 4],
            position: 0,
        };
        handle.spawn(Voice::new(id, "steady", 0, source).with_stop_at(BLOCK_FRAMES as u64));
        assert_eq!(handle.registry().live_count(), 1);

        // Default master gain is 0.5.
        let out = render_block(&mut bus);
        assert!((left_at(&out, 0) - 0.4).abs() < 1.0e-6);

        // The stop point coincides with the end of the first block.
        assert_eq!(handle.registry().live_count(), 0);
        let out = render_block(&mut bus);
        assert_eq!(peak(&out), 0.0);
    }

    #[test]
    fn test_stale_spawn_is_discarded() {
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        spawn_steady(&handle, 0.8);
        assert_eq!(handle.registry().live_count(), 1);

        // The stop landed before the render thread picked the voice up.
        handle.advance_generation();

        let out = render_block(&mut bus);
        assert_eq!(peak(&out), 0.0);
        assert_eq!(handle.registry().live_count(), 0);
    }

    #[test]
    fn test_pinned_handle_keeps_its_launch_stamp() {
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        let pinned = handle.pinned();
        handle.advance_generation();
        assert_ne!(pinned.stamp(), handle.stamp());

        // The pinned spawn carries the old stamp even though the live
        // generation has already moved on by the time it is sent.
        spawn_steady(&pinned, 0.8);
        let out = render_block(&mut bus);
        assert_eq!(peak(&out), 0.0);
        assert_eq!(handle.registry().live_count(), 0);
    }

    #[test]
    fn test_stop_command_retires_voice() {
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        let id = spawn_steady(&handle, 0.8);
        let out = render_block(&mut bus);
        assert!(peak(&out) > 0.1);
        assert_eq!(handle.registry().live_count(), 1);

        handle.stop_voices(vec![id]);
        let out = render_block(&mut bus);
        assert_eq!(peak(&out), 0.0);
        assert_eq!(handle.registry().live_count(), 0);

        // Stopping again is a no-op.
        handle.stop_voices(vec![id]);
        render_block(&mut bus);
        assert_eq!(handle.registry().live_count(), 0);
    }

    #[test]
    fn test_master_gain_set_and_ramp() {
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        spawn_steady(&handle, 0.8);
        let out = render_block(&mut bus);
        assert!((left_at(&out, 0) - 0.4).abs() < 1.0e-6);

        // A zero-length ramp lands by the second frame of the next block.
        handle.set_master_gain(1.0, 0.0);
        let out = render_block(&mut bus);
        assert!((left_at(&out, BLOCK_FRAMES - 1) - 0.8).abs() < 1.0e-6);

        // 0.005 s is 220 samples; the ramp completes inside one block.
        handle.set_master_gain(0.0, 0.005);
        let out = render_block(&mut bus);
        assert!((left_at(&out, 0) - 0.8).abs() < 1.0e-6);
        assert!((left_at(&out, 110) - 0.4).abs() < 1.0e-6);
        assert_eq!(left_at(&out, BLOCK_FRAMES - 1), 0.0);
    }

    #[test]
    fn test_pan_positions_silence_opposite_channel() {
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        spawn_steady(&handle, 0.8);

        // Centered: both channels carry the dry level.
        let out = render_block(&mut bus);
        assert!((left_at(&out, 0) - 0.4).abs() < 1.0e-6);
        assert!((right_at(&out, 0) - 0.4).abs() < 1.0e-6);

        // Hard left folds the right channel across.
        handle.set_pan(-1.0);
        let out = render_block(&mut bus);
        assert!((left_at(&out, 0) - 0.8).abs() < 1.0e-6);
        assert_eq!(right_at(&out, 0), 0.0);

        // Out-of-range positions clamp to hard right.
        handle.set_pan(7.5);
        let out = render_block(&mut bus);
        assert_eq!(left_at(&out, 0), 0.0);
        assert!((right_at(&out, 0) - 0.8).abs() < 1.0e-6);
    }

    #[test]
    fn test_pan_law() {
        assert_eq!(pan_frame(0.3, 0.7, 0.0), (0.3, 0.7));

        let (left, right) = pan_frame(0.3, 0.7, -1.0);
        assert!((left - 1.0).abs() < 1.0e-6);
        assert_eq!(right, 0.0);

        let (left, right) = pan_frame(0.3, 0.7, 1.0);
        assert_eq!(left, 0.0);
        assert!((right - 1.0).abs() < 1.0e-6);

        // Half left: the right channel attenuates by cos(pi/4) and bleeds
        // into the left by the same factor.
        let (left, right) = pan_frame(0.0, 1.0, -0.5);
        let expected = (PI / 4.0).cos();
        assert!((left - expected).abs() < 1.0e-6);
        assert!((right - expected).abs() < 1.0e-6);
    }

    #[test]
    fn test_reverb_send_produces_tail() {
        let config: Config = serde_yml::from_str(
            "
reverb_send_level: 1.0
reverb_seconds: 0.05
compressor:
  ratio: 1
",
        )
        .expect("valid yaml");
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &config);

        // A burst that dies within the first block.
        let id = handle.allocate_voice_id();
        let source = VoiceSource::Noise {
            buffer: vec![0.5; 64],
            position: 0,
        };
        handle.spawn(Voice::new(id, "burst", 0, source));

        render_block(&mut bus);
        assert_eq!(handle.registry().live_count(), 0);

        // The wet path keeps ringing after the dry voice has finished.
        render_block(&mut bus);
        let out = render_block(&mut bus);
        assert!(peak(&out) > 0.0);
    }

    #[test]
    fn test_analyser_sees_rendered_audio() {
        let (mut bus, handle, analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        assert!(analyser.snapshot().iter().all(|bin| *bin == 0.0));

        spawn_steady(&handle, 0.8);
        render_block(&mut bus);

        let energy: f32 = analyser.snapshot().iter().sum();
        assert!(energy > 0.0);
    }

    #[test]
    fn test_render_stops_after_handles_drop() {
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        let mut out = vec![0.0f32; BLOCK_FRAMES * 2];
        assert!(bus.render(&mut out));

        drop(handle);
        assert!(!bus.render(&mut out));
    }

    #[test]
    fn test_clock_advances_per_block() {
        let (mut bus, handle, _analyser) = OutputBus::new(SAMPLE_RATE, &test_config());

        assert_eq!(handle.now(), 0);
        render_block(&mut bus);
        assert_eq!(handle.now(), BLOCK_FRAMES as u64);
        render_block(&mut bus);
        assert_eq!(handle.now(), 2 * BLOCK_FRAMES as u64);
    }
}
