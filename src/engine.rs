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
//! The motion driven synthesis engine.
//!
//! [`Engine`] is the facade over the crate: it owns the output device and
//! the bus handle, and it maps classified motion onto pattern sessions,
//! one-shot event sounds, transition cues, and backdrop loops.

pub mod events;
pub mod motion;
mod patterns;
mod session;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, span, warn, Level, Span};

use crate::audio;
use crate::config::Config;
use crate::graph::{analyser::AnalyserHandle, BusHandle, OutputBus};
use crate::synth;

use events::{BackdropStyle, CueKind, EventKind};
use motion::{Archetype, IntensityClass, PatternName};
use session::Session;

/// Seconds a detected clap is deferred before its sound fires.
const CLAP_DELAY_SECONDS: f32 = 0.1;

/// Seconds a detected jump is deferred before its sound fires.
const JUMP_DELAY_SECONDS: f32 = 0.05;

/// Ramp length for the master volume move when a new session starts.
const GENERATE_VOLUME_RAMP_SECONDS: f32 = 0.01;

/// Continuous updates sit under the session's master level by this factor.
const UPDATE_VOLUME_SCALE: f32 = 0.5;

/// Ramp length for continuous volume updates.
const UPDATE_VOLUME_RAMP_SECONDS: f32 = 0.1;

/// An error initializing the engine.
#[derive(Debug, Error)]
pub enum InitError {
    /// No usable output device. The engine stays uninitialized and
    /// playback calls become no-ops.
    #[error("unable to start output device: {0}")]
    NoDevice(#[from] audio::DeviceError),
}

/// Externally visible engine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Ready,
    Playing,
}

/// A dominant motion direction in screen space, `x` positive to the right.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

/// A classified description of recent motion.
#[derive(Clone, Debug, Default)]
pub struct MotionInput {
    /// One of the five intensity class names. Unknown names map to
    /// moderate.
    pub intensity_class: String,
    /// One of the four pattern names. Unknown names map to steady.
    pub pattern: String,
    /// Dominant motion direction, if the analysis produced one.
    pub vector: Option<Vector>,
}

/// Optional frame analysis accompanying a motion description.
#[derive(Clone, Debug, Default)]
pub struct AnalysisInput {
    pub motion_analysis: Option<MotionAnalysis>,
}

/// Discrete happenings detected in the analysed motion.
#[derive(Clone, Debug, Default)]
pub struct MotionAnalysis {
    /// Whether a collision was detected.
    pub collision_events: Option<bool>,
    /// Names of detected gestures.
    pub gesture_detected: Option<Vec<String>>,
    /// The analyser's description of the dominant action.
    pub primary_action: Option<String>,
}

/// A lightweight continuous adjustment to a playing session.
#[derive(Clone, Copy, Debug)]
pub struct MotionSummary {
    /// Tempo the session should move toward, in BPM.
    pub suggested_tempo: f64,
    /// Master level the session should move toward.
    pub suggested_volume: f32,
}

/// What the engine holds once the device is up.
enum EngineState {
    Uninitialized,
    Ready {
        handle: BusHandle,
        analyser: AnalyserHandle,
        /// Keeps the device output threads alive.
        _output: audio::OutputHandle,
    },
}

/// Maps motion descriptions onto the synthesis graph.
pub struct Engine {
    /// The device playback renders through.
    device: Arc<dyn audio::Device>,
    /// Engine tuning.
    config: Config,
    /// The bus handle and running output, once initialized.
    state: Mutex<EngineState>,
    /// Playback state shared with the pattern drivers.
    session: Arc<Session>,
    /// The logging span.
    span: Span,
}

impl Engine {
    /// Creates an engine that plays through the given device. Pattern
    /// drivers are spawned tokio tasks, so the playback methods must be
    /// called from within a runtime.
    pub fn new(device: Arc<dyn audio::Device>, config: Config) -> Engine {
        Engine {
            device,
            config,
            state: Mutex::new(EngineState::Uninitialized),
            session: Arc::new(Session::new()),
            span: span!(Level::INFO, "engine"),
        }
    }

    /// Starts the output device and builds the signal graph behind it.
    /// Idempotent; a second call leaves the running graph alone.
    pub fn initialize(&self) -> Result<(), InitError> {
        let _enter = self.span.enter();

        let mut state = self.state.lock();
        if let EngineState::Ready { .. } = &*state {
            return Ok(());
        }

        let (bus, handle, analyser) = OutputBus::new(self.device.sample_rate(), &self.config);
        let output = self.device.start(bus)?;
        info!(device = %self.device, "Engine initialized.");

        *state = EngineState::Ready {
            handle,
            analyser,
            _output: output,
        };
        Ok(())
    }

    /// Replaces whatever is playing with a session derived from the motion
    /// description, then fires any one-shot events the analysis reports and
    /// applies the directional vector to the pan stage. Initializes the
    /// engine on first use; if that fails the call is a warn-and-return.
    pub fn generate_from_motion(&self, motion: &MotionInput, analysis: Option<&AnalysisInput>) {
        if let Err(e) = self.initialize() {
            let _enter = self.span.enter();
            warn!(err = e.to_string(), "Engine unavailable, ignoring motion.");
            return;
        }

        let _enter = self.span.enter();
        let state = self.state.lock();
        let EngineState::Ready { handle, .. } = &*state else {
            return;
        };

        self.stop_session(handle);

        let profile = IntensityClass::from_name(&motion.intensity_class).profile();
        let style = PatternName::from_name(&motion.pattern).style();
        let mut tempo = profile.tempo;
        if style.archetype == Archetype::Percussion {
            tempo *= self.config.rhythmic_tempo_multiplier();
        }

        info!(
            intensity = %motion.intensity_class,
            pattern = %motion.pattern,
            tempo,
            "Generating session from motion."
        );

        handle.set_master_gain(profile.volume, GENERATE_VOLUME_RAMP_SECONDS);

        // Playing is flagged before the drivers launch so their first wake
        // sees a live session.
        self.session.begin(style, tempo, profile.energy);
        patterns::launch(handle, &self.session, style, tempo, profile.energy);

        if let Some(analysis) = analysis {
            self.dispatch_analysis(handle, analysis);
        }
        if let Some(vector) = motion.vector {
            self.apply_spatial(handle, vector);
        }
    }

    /// Adjusts a playing session in place. The tempo moves only when the
    /// suggestion differs from the current tempo by more than the update
    /// threshold, in which case the same pattern relaunches at the new
    /// tempo. The master level always follows the suggestion. A no-op
    /// unless a session is playing.
    pub fn update_from_motion(&self, summary: &MotionSummary) {
        let _enter = self.span.enter();

        let state = self.state.lock();
        let EngineState::Ready { handle, .. } = &*state else {
            return;
        };
        if !self.session.is_playing() {
            return;
        }

        // max() also maps a NaN suggestion to the floor.
        let tempo = summary.suggested_tempo.max(1.0);
        let snapshot = self.session.snapshot();
        if (snapshot.tempo - tempo).abs() > self.config.tempo_update_threshold() {
            if let Some(style) = snapshot.style {
                info!(from = snapshot.tempo, to = tempo, "Retiming session.");

                // The backdrop is an independent layer; it rides through
                // the relaunch.
                handle.advance_generation();
                handle.stop_voices(handle.registry().live_ids_excluding(synth::BACKDROP_TAG));
                self.session.begin(style, tempo, snapshot.energy);
                patterns::launch(handle, &self.session, style, tempo, snapshot.energy);
            }
        }

        handle.set_master_gain(
            summary.suggested_volume * UPDATE_VOLUME_SCALE,
            UPDATE_VOLUME_RAMP_SECONDS,
        );
    }

    /// Stops the session and every live voice, backdrops included. Safe to
    /// call in any state.
    pub fn stop_all(&self) {
        let _enter = self.span.enter();

        let state = self.state.lock();
        match &*state {
            EngineState::Ready { handle, .. } => {
                info!("Stopping all sound.");
                self.stop_session(handle);
            }
            EngineState::Uninitialized => self.session.stop(),
        }
    }

    /// Fires a one-shot event sound after the given delay.
    pub fn play_event(&self, kind: EventKind, delay_seconds: f32) {
        let _enter = self.span.enter();

        let state = self.state.lock();
        let EngineState::Ready { handle, .. } = &*state else {
            warn!("Engine not initialized, ignoring event.");
            return;
        };
        events::play(handle, kind, delay_seconds);
    }

    /// Fires a one-shot event sound by wire name. Unknown names are
    /// ignored.
    pub fn play_event_named(&self, name: &str, delay_seconds: f32) {
        match EventKind::resolve(name) {
            Some(kind) => self.play_event(kind, delay_seconds),
            None => {
                let _enter = self.span.enter();
                warn!(name, "Unknown event name, ignoring.");
            }
        }
    }

    /// Plays a transition cue at the given level.
    pub fn play_cue(&self, kind: CueKind, level: f32) {
        let _enter = self.span.enter();

        let state = self.state.lock();
        let EngineState::Ready { handle, .. } = &*state else {
            warn!("Engine not initialized, ignoring cue.");
            return;
        };
        events::play_cue(handle, kind, level);
    }

    /// Starts a backdrop loop, replacing any backdrop already running. The
    /// backdrop plays independently of the pattern session.
    pub fn start_backdrop(&self, style: BackdropStyle, level: f32) {
        let _enter = self.span.enter();

        let state = self.state.lock();
        let EngineState::Ready { handle, .. } = &*state else {
            warn!("Engine not initialized, ignoring backdrop.");
            return;
        };
        events::start_backdrop(handle, style, level);
    }

    /// Stops the backdrop loop, if one is running.
    pub fn stop_backdrop(&self) {
        let _enter = self.span.enter();

        let state = self.state.lock();
        if let EngineState::Ready { handle, .. } = &*state {
            events::stop_backdrop(handle);
        }
    }

    /// A handle onto the output spectrum, or None while uninitialized.
    pub fn analyser(&self) -> Option<AnalyserHandle> {
        match &*self.state.lock() {
            EngineState::Ready { analyser, .. } => Some(analyser.clone()),
            EngineState::Uninitialized => None,
        }
    }

    /// The externally visible engine state.
    pub fn state(&self) -> State {
        match &*self.state.lock() {
            EngineState::Uninitialized => State::Uninitialized,
            EngineState::Ready { .. } if self.session.is_playing() => State::Playing,
            EngineState::Ready { .. } => State::Ready,
        }
    }

    /// Whether a pattern session is currently playing.
    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    /// The current session tempo in BPM.
    pub fn current_tempo(&self) -> f64 {
        self.session.tempo()
    }

    /// Number of voices live on the bus.
    pub fn active_voice_count(&self) -> usize {
        match &*self.state.lock() {
            EngineState::Ready { handle, .. } => handle.registry().live_count(),
            EngineState::Uninitialized => 0,
        }
    }

    /// Tags of the live voices, sorted.
    pub fn voice_tags(&self) -> Vec<&'static str> {
        match &*self.state.lock() {
            EngineState::Ready { handle, .. } => handle.registry().live_tags(),
            EngineState::Uninitialized => Vec::new(),
        }
    }

    /// How many voices with this tag have ever been spawned.
    pub fn spawned_total(&self, tag: &str) -> u64 {
        match &*self.state.lock() {
            EngineState::Ready { handle, .. } => handle.registry().spawned_total(tag),
            EngineState::Uninitialized => 0,
        }
    }

    /// Stops the session, cancels in-flight spawns, and force-stops every
    /// live voice.
    fn stop_session(&self, handle: &BusHandle) {
        self.session.stop();
        handle.advance_generation();
        handle.stop_voices(handle.registry().live_ids());
    }

    /// Routes the analysis details to their event sounds.
    fn dispatch_analysis(&self, handle: &BusHandle, analysis: &AnalysisInput) {
        let Some(motion_analysis) = &analysis.motion_analysis else {
            return;
        };

        if motion_analysis.collision_events == Some(true) {
            events::play(handle, EventKind::Collision, 0.0);
        }
        if let Some(gestures) = &motion_analysis.gesture_detected {
            if gestures.iter().any(|gesture| gesture == "clap") {
                events::play(handle, EventKind::Clap, CLAP_DELAY_SECONDS);
            }
        }
        if let Some(action) = &motion_analysis.primary_action {
            if action.contains("jump") {
                events::play(handle, EventKind::Jump, JUMP_DELAY_SECONDS);
            }
        }
    }

    /// Moves the pan stage to the vector's horizontal position. Non-finite
    /// values and values inside the deadband leave the pan untouched.
    fn apply_spatial(&self, handle: &BusHandle, vector: Vector) {
        if !vector.x.is_finite() || vector.x.abs() <= self.config.pan_deadband() {
            return;
        }
        handle.set_pan(vector.x.clamp(-1.0, 1.0));
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.session.stop();
        if let EngineState::Ready { handle, .. } = &*self.state.lock() {
            // Drivers exit on their next wake and drop their handle clones;
            // once the last one is gone the bus disconnects and the device
            // output winds down.
            handle.advance_generation();
            handle.stop_voices(handle.registry().live_ids());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::fmt;
    use std::time::Duration;

    use crate::audio::mock;
    use crate::audio::{DeviceError, OutputHandle};
    use crate::graph::OutputBus;
    use crate::testutil::{eventually, eventually_async, rms, transparent_config};

    /// A device that always fails to start, for exercising the degraded
    /// path.
    struct BrokenDevice;

    impl fmt::Display for BrokenDevice {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "broken")
        }
    }

    impl audio::Device for BrokenDevice {
        fn start(&self, _bus: OutputBus) -> Result<OutputHandle, DeviceError> {
            Err(DeviceError::NotFound(String::from("broken")))
        }

        fn sample_rate(&self) -> u32 {
            44100
        }
    }

    fn test_engine() -> (mock::Device, Engine) {
        let device = mock::Device::get("mock");
        let engine = Engine::new(Arc::new(device.clone()), transparent_config());
        (device, engine)
    }

    fn motion(intensity: &str, pattern: &str) -> MotionInput {
        MotionInput {
            intensity_class: String::from(intensity),
            pattern: String::from(pattern),
            vector: None,
        }
    }

    /// RMS of one channel of an interleaved stereo capture.
    fn channel_rms(samples: &[f32], channel: usize) -> f32 {
        let one: Vec<f32> = samples
            .iter()
            .skip(channel)
            .step_by(2)
            .copied()
            .collect();
        rms(&one)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_broken_device_degrades_to_no_ops() {
        let engine = Engine::new(Arc::new(BrokenDevice), transparent_config());

        assert!(engine.initialize().is_err());
        assert_eq!(engine.state(), State::Uninitialized);
        assert!(engine.analyser().is_none());

        // Playback calls land as no-ops, not panics.
        engine.generate_from_motion(&motion("intense", "rhythmic"), None);
        engine.update_from_motion(&MotionSummary {
            suggested_tempo: 120.0,
            suggested_volume: 0.5,
        });
        engine.play_event(EventKind::Gesture, 0.0);
        engine.play_cue(CueKind::Click, 0.5);
        engine.start_backdrop(BackdropStyle::Ambient, 0.2);
        engine.stop_backdrop();
        engine.stop_all();

        assert_eq!(engine.state(), State::Uninitialized);
        assert_eq!(engine.active_voice_count(), 0);
        assert!(engine.voice_tags().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_initialize_is_idempotent() {
        let (_device, engine) = test_engine();

        engine.initialize().expect("mock device starts");
        assert_eq!(engine.state(), State::Ready);

        engine.generate_from_motion(&motion("moderate", "continuous"), None);
        assert_eq!(engine.state(), State::Playing);

        // A second initialize leaves the running graph alone.
        engine.initialize().expect("second initialize is a no-op");
        assert_eq!(engine.state(), State::Playing);
        assert!(engine.is_playing());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_intense_rhythmic_plays_percussion() {
        let (device, engine) = test_engine();

        engine.generate_from_motion(&motion("intense", "rhythmic"), None);

        // 140 BPM under the 1.2 rhythmic multiplier.
        assert_eq!(engine.current_tempo(), 168.0);
        assert_eq!(engine.state(), State::Playing);

        eventually(
            || engine.spawned_total("kick") >= 2 && engine.spawned_total("snare") >= 1,
            "percussion never established its grid",
        );
        eventually(
            || rms(&device.captured()) > 0.001,
            "percussion never became audible",
        );

        for tag in engine.voice_tags() {
            assert!(
                PatternName::Rhythmic.style().voice_set.contains(&tag),
                "unexpected voice {tag}",
            );
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_static_continuous_holds_a_drone_pair() {
        let (_device, engine) = test_engine();

        engine.generate_from_motion(&motion("static", "continuous"), None);

        assert_eq!(engine.current_tempo(), 60.0);
        eventually(
            || engine.voice_tags() == ["drone", "drone"],
            "drone pair never settled",
        );
        assert_eq!(engine.spawned_total("drone"), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_generate_replaces_the_session() {
        let (_device, engine) = test_engine();

        engine.generate_from_motion(&motion("moderate", "steady"), None);
        eventually(
            || engine.spawned_total("bass") >= 1,
            "bass session never started",
        );

        engine.generate_from_motion(&motion("moderate", "continuous"), None);
        eventually(
            || engine.voice_tags() == ["drone", "drone"],
            "drone session never replaced the bass",
        );

        // The stale bass driver wakes within one beat and must exit
        // without emitting.
        let spawned = engine.spawned_total("bass");
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(engine.spawned_total("bass"), spawned);
        assert_eq!(engine.voice_tags(), ["drone", "drone"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_all_drains_the_bus() {
        let (_device, engine) = test_engine();

        engine.generate_from_motion(&motion("active", "continuous"), None);
        eventually(|| engine.active_voice_count() == 2, "drones never started");

        engine.stop_all();
        assert!(!engine.is_playing());
        assert_eq!(engine.state(), State::Ready);
        eventually(
            || engine.active_voice_count() == 0,
            "voices survived stop_all",
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spatial_vector_clamps_to_full_right() {
        let (device, engine) = test_engine();

        let mut input = motion("active", "continuous");
        input.vector = Some(Vector { x: 5.0, y: 0.0 });
        engine.generate_from_motion(&input, None);

        eventually(
            || channel_rms(&device.captured(), 1) > 0.005,
            "right channel never became audible",
        );

        let captured = device.captured();
        let left = channel_rms(&captured, 0);
        let right = channel_rms(&captured, 1);
        assert!(
            left < right / 1000.0,
            "pan should hard-right the mix: left {left}, right {right}",
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_vector_inside_deadband_is_ignored() {
        let (device, engine) = test_engine();

        let mut input = motion("active", "continuous");
        input.vector = Some(Vector { x: 0.05, y: 0.0 });
        engine.generate_from_motion(&input, None);

        eventually(
            || channel_rms(&device.captured(), 0) > 0.005,
            "drone never became audible",
        );

        // Centered: both channels carry the drone.
        let captured = device.captured();
        let left = channel_rms(&captured, 0);
        let right = channel_rms(&captured, 1);
        assert!((left - right).abs() < left * 0.1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_retimes_the_running_session() {
        let (_device, engine) = test_engine();

        engine.generate_from_motion(&motion("moderate", "steady"), None);
        eventually(
            || engine.spawned_total("bass") >= 1,
            "bass session never started",
        );

        let before = engine.spawned_total("bass");
        engine.update_from_motion(&MotionSummary {
            suggested_tempo: 200.0,
            suggested_volume: 0.4,
        });

        assert_eq!(engine.current_tempo(), 200.0);
        assert!(engine.is_playing());
        eventually(
            || engine.spawned_total("bass") > before,
            "relaunched bass never played",
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_below_threshold_keeps_the_tempo() {
        let (_device, engine) = test_engine();

        engine.generate_from_motion(&motion("moderate", "steady"), None);
        engine.update_from_motion(&MotionSummary {
            suggested_tempo: 105.0,
            suggested_volume: 0.5,
        });

        // Inside the 10 BPM hysteresis window.
        assert_eq!(engine.current_tempo(), 100.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_is_ignored_when_stopped() {
        let (_device, engine) = test_engine();

        engine.generate_from_motion(&motion("moderate", "steady"), None);
        engine.stop_all();

        engine.update_from_motion(&MotionSummary {
            suggested_tempo: 200.0,
            suggested_volume: 0.4,
        });
        assert_eq!(engine.current_tempo(), 100.0);
        assert!(!engine.is_playing());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_collision_fires_one_layered_event() {
        let (_device, engine) = test_engine();

        let analysis = AnalysisInput {
            motion_analysis: Some(MotionAnalysis {
                collision_events: Some(true),
                gesture_detected: None,
                primary_action: None,
            }),
        };
        engine.generate_from_motion(&motion("moderate", "steady"), Some(&analysis));

        eventually(
            || engine.spawned_total("collision") == 1,
            "collision never fired",
        );
        assert_eq!(engine.spawned_total("collision-noise"), 1);

        // One detection, one sound.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.spawned_total("collision"), 1);
        assert_eq!(engine.spawned_total("collision-noise"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_gesture_and_action_dispatch() {
        let (_device, engine) = test_engine();

        let analysis = AnalysisInput {
            motion_analysis: Some(MotionAnalysis {
                collision_events: Some(false),
                gesture_detected: Some(vec![String::from("wave"), String::from("clap")]),
                primary_action: Some(String::from("jumping high")),
            }),
        };
        engine.generate_from_motion(&motion("minimal", "variable"), Some(&analysis));

        eventually_async(
            || async {
                engine.spawned_total("clap") == 1 && engine.spawned_total("jump") == 1
            },
            "clap and jump never fired",
        )
        .await;
        assert_eq!(engine.spawned_total("collision"), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_backdrop_rides_through_update_but_not_generate() {
        let (_device, engine) = test_engine();

        engine.generate_from_motion(&motion("moderate", "steady"), None);
        engine.start_backdrop(BackdropStyle::Peaceful, 0.2);
        eventually(
            || engine.voice_tags().contains(&"backdrop"),
            "backdrop never started",
        );
        // Let the render thread pick the loop up before the update bumps
        // the generation.
        tokio::time::sleep(Duration::from_millis(50)).await;

        engine.update_from_motion(&MotionSummary {
            suggested_tempo: 200.0,
            suggested_volume: 0.4,
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(engine.voice_tags().contains(&"backdrop"));

        engine.generate_from_motion(&motion("moderate", "continuous"), None);
        eventually(
            || !engine.voice_tags().contains(&"backdrop"),
            "generate should reset the backdrop",
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_named_events_and_cues() {
        let (_device, engine) = test_engine();
        engine.initialize().expect("mock device starts");

        engine.play_event_named("gesture", 0.0);
        engine.play_event_named("warp", 0.0);
        engine.play_cue(CueKind::Click, 0.5);

        eventually(
            || engine.spawned_total("gesture") == 1 && engine.spawned_total("click") == 1,
            "event and cue never fired",
        );

        // The unknown name resolved to nothing.
        assert_eq!(engine.spawned_total("warp"), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_analyser_sees_the_playing_session() {
        let (_device, engine) = test_engine();

        engine.generate_from_motion(&motion("active", "continuous"), None);
        let analyser = engine.analyser().expect("engine is initialized");

        eventually(
            || analyser.snapshot().iter().sum::<f32>() > 0.0,
            "spectrum never registered the drone",
        );
    }
}
