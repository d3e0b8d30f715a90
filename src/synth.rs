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
//! Voice recipes: pattern hits, event one-shots, transition cues, and the
//! backdrop loop. Each function builds its voices at an absolute position on
//! the bus clock and hands them to the bus; lifecycle from there on is the
//! bus's problem.

use crate::graph::{
    automation::Automation,
    filter::{Biquad, FilterMode},
    noise::noise_buffer,
    oscillator::{Oscillator, Waveform},
    voice::{Voice, VoiceSource},
    BusHandle,
};

/// Exponential envelopes decay to this floor rather than zero so the curve
/// stays defined.
pub(crate) const ENVELOPE_FLOOR: f32 = 0.001;

/// How long a single drum hit lasts.
const DRUM_SECONDS: f64 = 0.1;

/// Length of the noise layered under a snare hit.
const SNARE_NOISE_SECONDS: f32 = 0.05;

/// Hits scale velocity and energy by this factor.
const HIT_GAIN: f32 = 0.3;

/// The ambient drone fades in over this long.
const DRONE_FADE_SECONDS: f64 = 2.0;

/// Attack time of a melodic note.
const NOTE_ATTACK_SECONDS: f64 = 0.01;

/// Decay time of a melodic note, after which the release begins.
const NOTE_DECAY_SECONDS: f64 = 0.1;

/// Peak gain of an event tone.
const EVENT_GAIN: f32 = 0.3;

/// Peak gain of a clap burst.
const CLAP_GAIN: f32 = 0.5;

/// Length of the noise layered under a collision.
const EVENT_NOISE_SECONDS: f32 = 0.05;

/// Cues decay to this floor and ring there until their stop point.
const CUE_FLOOR: f32 = 0.01;

/// Every cue voice lives this long regardless of its decay time.
const CUE_LIFETIME_SECONDS: f64 = 0.5;

/// Registry tag shared by backdrop voices so they can be stopped as a
/// group.
pub(crate) const BACKDROP_TAG: &str = "backdrop";

/// A kick drum: a sine at 60 Hz sweeping down an octave as it decays.
pub fn kick(handle: &BusHandle, at: u64, velocity: f32, energy: f32) {
    let stop = at + handle.samples(DRUM_SECONDS);

    let mut frequency = Automation::new(60.0);
    frequency.set_value_at(60.0, at);
    frequency.exponential_ramp_to(30.0, stop);

    let voice = Voice::new(
        handle.allocate_voice_id(),
        "kick",
        at,
        VoiceSource::Oscillator {
            oscillator: Oscillator::new(Waveform::Sine, 60.0, handle.sample_rate()),
            frequency,
        },
    )
    .with_gain(hit_envelope(velocity * energy * HIT_GAIN, at, stop))
    .with_stop_at(stop);

    handle.spawn(voice);
}

/// A snare: a 200 Hz tone with a short noise burst layered under it. The
/// burst shares the tone's envelope and runs out on its own.
pub fn snare(handle: &BusHandle, at: u64, velocity: f32, energy: f32) {
    let stop = at + handle.samples(DRUM_SECONDS);
    let envelope = hit_envelope(velocity * energy * HIT_GAIN, at, stop);

    let tone = Voice::new(
        handle.allocate_voice_id(),
        "snare",
        at,
        VoiceSource::Oscillator {
            oscillator: Oscillator::new(Waveform::Sine, 200.0, handle.sample_rate()),
            frequency: Automation::new(200.0),
        },
    )
    .with_gain(envelope.clone())
    .with_stop_at(stop);
    handle.spawn(tone);

    let burst = Voice::new(
        handle.allocate_voice_id(),
        "snare-noise",
        at,
        VoiceSource::Noise {
            buffer: noise_buffer(SNARE_NOISE_SECONDS, handle.sample_rate()),
            position: 0,
        },
    )
    .with_gain(envelope);
    handle.spawn(burst);
}

/// A hi-hat: a bare tone high enough to read as metal once it decays fast.
pub fn hihat(handle: &BusHandle, at: u64, velocity: f32, energy: f32) {
    let stop = at + handle.samples(DRUM_SECONDS);

    let voice = Voice::new(
        handle.allocate_voice_id(),
        "hihat",
        at,
        VoiceSource::Oscillator {
            oscillator: Oscillator::new(Waveform::Sine, 8000.0, handle.sample_rate()),
            frequency: Automation::new(8000.0),
        },
    )
    .with_gain(hit_envelope(velocity * energy * HIT_GAIN, at, stop))
    .with_stop_at(stop);

    handle.spawn(voice);
}

/// The sustained pair behind continuous motion: a sine and a triangle a
/// perfect fifth up, low-passed for warmth and faded in slowly. The voices
/// run until force-stopped.
pub fn drone_pair(handle: &BusHandle, at: u64, energy: f32) {
    let base_frequency = f64::from(110.0 * (1.0 + energy * 0.5));
    let cutoff = f64::from(800.0 + energy * 1200.0);
    let fade_end = at + handle.samples(DRONE_FADE_SECONDS);

    for (waveform, frequency) in [
        (Waveform::Sine, base_frequency),
        (Waveform::Triangle, base_frequency * 1.5),
    ] {
        let mut gain = Automation::new(0.0);
        gain.set_value_at(0.0, at);
        gain.linear_ramp_to(energy * 0.2, fade_end);

        let voice = Voice::new(
            handle.allocate_voice_id(),
            "drone",
            at,
            VoiceSource::Oscillator {
                oscillator: Oscillator::new(waveform, frequency, handle.sample_rate()),
                frequency: Automation::new(frequency as f32),
            },
        )
        .with_filter(Biquad::new(
            FilterMode::Lowpass,
            cutoff,
            2.0,
            handle.sample_rate(),
        ))
        .with_gain(gain);

        handle.spawn(voice);
    }
}

/// One note of the melodic arpeggio: a sawtooth through a bright low-pass,
/// with a fast attack, a drop to a sustain level, and a release spanning the
/// rest of the beat.
pub fn arpeggio_note(handle: &BusHandle, at: u64, frequency: f64, energy: f32, beat_seconds: f64) {
    let stop = at + handle.samples(beat_seconds);

    let mut gain = Automation::new(0.0);
    gain.set_value_at(0.0, at);
    gain.linear_ramp_to(energy * 0.15, at + handle.samples(NOTE_ATTACK_SECONDS));
    gain.exponential_ramp_to(energy * 0.08, at + handle.samples(NOTE_DECAY_SECONDS));
    gain.exponential_ramp_to(ENVELOPE_FLOOR, stop);

    let voice = Voice::new(
        handle.allocate_voice_id(),
        "arpeggio",
        at,
        VoiceSource::Oscillator {
            oscillator: Oscillator::new(Waveform::Sawtooth, frequency, handle.sample_rate()),
            frequency: Automation::new(frequency as f32),
        },
    )
    .with_filter(Biquad::new(
        FilterMode::Lowpass,
        f64::from(2000.0 + energy * 2000.0),
        5.0,
        handle.sample_rate(),
    ))
    .with_gain(gain)
    .with_stop_at(stop);

    handle.spawn(voice);
}

/// One bass hit: a sawtooth under a narrow low-pass, decaying over most of
/// the beat.
pub fn bass_note(
    handle: &BusHandle,
    at: u64,
    frequency: f64,
    velocity: f32,
    energy: f32,
    beat_seconds: f64,
) {
    let stop = at + handle.samples(beat_seconds);

    let mut gain = Automation::new(0.0);
    gain.set_value_at(velocity * energy * HIT_GAIN, at);
    gain.exponential_ramp_to(ENVELOPE_FLOOR, at + handle.samples(beat_seconds * 0.9));

    let voice = Voice::new(
        handle.allocate_voice_id(),
        "bass",
        at,
        VoiceSource::Oscillator {
            oscillator: Oscillator::new(Waveform::Sawtooth, frequency, handle.sample_rate()),
            frequency: Automation::new(frequency as f32),
        },
    )
    .with_filter(Biquad::new(
        FilterMode::Lowpass,
        f64::from(200.0 + energy * 100.0),
        10.0,
        handle.sample_rate(),
    ))
    .with_gain(gain)
    .with_stop_at(stop);

    handle.spawn(voice);
}

/// A one-shot event tone: a sine at the event's frequency, decaying fast.
pub fn event_tone(handle: &BusHandle, at: u64, tag: &'static str, frequency: f64, seconds: f64) {
    let stop = at + handle.samples(seconds);

    let voice = Voice::new(
        handle.allocate_voice_id(),
        tag,
        at,
        VoiceSource::Oscillator {
            oscillator: Oscillator::new(Waveform::Sine, frequency, handle.sample_rate()),
            frequency: Automation::new(frequency as f32),
        },
    )
    .with_gain(hit_envelope(EVENT_GAIN, at, stop))
    .with_stop_at(stop);

    handle.spawn(voice);
}

/// A collision: the event tone with a short noise burst layered under it,
/// both riding the same envelope.
pub fn collision_pair(handle: &BusHandle, at: u64, frequency: f64, seconds: f64) {
    let stop = at + handle.samples(seconds);
    let envelope = hit_envelope(EVENT_GAIN, at, stop);

    let tone = Voice::new(
        handle.allocate_voice_id(),
        "collision",
        at,
        VoiceSource::Oscillator {
            oscillator: Oscillator::new(Waveform::Sine, frequency, handle.sample_rate()),
            frequency: Automation::new(frequency as f32),
        },
    )
    .with_gain(envelope.clone())
    .with_stop_at(stop);
    handle.spawn(tone);

    let burst = Voice::new(
        handle.allocate_voice_id(),
        "collision-noise",
        at,
        VoiceSource::Noise {
            buffer: noise_buffer(EVENT_NOISE_SECONDS, handle.sample_rate()),
            position: 0,
        },
    )
    .with_gain(envelope);
    handle.spawn(burst);
}

/// A clap: a noise burst squeezed through a narrow band-pass. Ends when the
/// buffer runs out.
pub fn clap_burst(handle: &BusHandle, at: u64, center: f64, seconds: f64) {
    let stop = at + handle.samples(seconds);

    let voice = Voice::new(
        handle.allocate_voice_id(),
        "clap",
        at,
        VoiceSource::Noise {
            buffer: noise_buffer(seconds as f32, handle.sample_rate()),
            position: 0,
        },
    )
    .with_filter(Biquad::new(
        FilterMode::Bandpass,
        center,
        10.0,
        handle.sample_rate(),
    ))
    .with_gain(hit_envelope(CLAP_GAIN, at, stop));

    handle.spawn(voice);
}

/// A transition cue: a sine that may sweep upward while it decays, then
/// rings at the cue floor until its half-second lifetime ends.
pub fn cue_tone(
    handle: &BusHandle,
    at: u64,
    tag: &'static str,
    level: f32,
    start_hz: f64,
    end_hz: Option<f64>,
    decay_seconds: f64,
) {
    let decay_end = at + handle.samples(decay_seconds);
    let stop = at + handle.samples(CUE_LIFETIME_SECONDS);

    let mut frequency = Automation::new(start_hz as f32);
    if let Some(end_hz) = end_hz {
        frequency.set_value_at(start_hz as f32, at);
        frequency.exponential_ramp_to(end_hz as f32, decay_end);
    }

    let mut gain = Automation::new(0.0);
    gain.set_value_at(level, at);
    gain.exponential_ramp_to(CUE_FLOOR, decay_end);

    let voice = Voice::new(
        handle.allocate_voice_id(),
        tag,
        at,
        VoiceSource::Oscillator {
            oscillator: Oscillator::new(Waveform::Sine, start_hz, handle.sample_rate()),
            frequency,
        },
    )
    .with_gain(gain)
    .with_stop_at(stop);

    handle.spawn(voice);
}

/// The backdrop: a stereo buffer looped at a fixed level until stopped.
pub fn backdrop_loop(handle: &BusHandle, at: u64, level: f32, left: Vec<f32>, right: Vec<f32>) {
    let voice = Voice::new(
        handle.allocate_voice_id(),
        BACKDROP_TAG,
        at,
        VoiceSource::Loop {
            left,
            right,
            position: 0,
        },
    )
    .with_gain(Automation::new(level));

    handle.spawn(voice);
}

fn hit_envelope(peak: f32, at: u64, stop: u64) -> Automation {
    let mut gain = Automation::new(0.0);
    gain.set_value_at(peak, at);
    gain.exponential_ramp_to(ENVELOPE_FLOOR, stop);
    gain
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{render_seconds, rms, test_bus};

    fn left_channel(out: &[f32]) -> Vec<f32> {
        out.iter().step_by(2).copied().collect()
    }

    #[test]
    fn test_kick_is_audible_and_stops() {
        let (mut bus, handle, _analyser) = test_bus();

        kick(&handle, 0, 1.0, 0.9);
        assert_eq!(handle.registry().live_count(), 1);

        let out = left_channel(&render_seconds(&mut bus, 0.2));
        assert!(rms(&out[..2205]) > 0.01);

        // The hit stops itself at 0.1 s and leaves nothing behind.
        assert_eq!(handle.registry().live_count(), 0);
        assert!(out[5000..].iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn test_snare_layers_tone_and_noise() {
        let (mut bus, handle, _analyser) = test_bus();

        snare(&handle, 0, 1.0, 0.5);
        assert_eq!(
            handle.registry().live_tags(),
            vec!["snare", "snare-noise"]
        );

        let out = left_channel(&render_seconds(&mut bus, 0.15));
        assert!(rms(&out[..2205]) > 0.005);

        // Tone stops at 0.1 s; the burst ran out at 0.05 s.
        assert_eq!(handle.registry().live_count(), 0);
    }

    #[test]
    fn test_drone_fades_in_and_sustains() {
        let (mut bus, handle, _analyser) = test_bus();

        drone_pair(&handle, 0, 0.5);
        assert_eq!(handle.registry().live_count(), 2);

        let out = left_channel(&render_seconds(&mut bus, 2.5));
        let early = rms(&out[..4410]);
        let settled = rms(&out[out.len() - 4410..]);
        assert!(
            early < settled * 0.2,
            "fade-in should start quiet: early {} settled {}",
            early,
            settled
        );

        // Drones have no natural end.
        assert_eq!(handle.registry().live_count(), 2);
    }

    #[test]
    fn test_drone_base_frequency_tracks_energy() {
        // Low energy keeps the drone close to 110 Hz.
        let base = 110.0 * (1.0 + 0.1f32 * 0.5);
        assert!((base - 115.5).abs() < 1.0e-4);
        assert!((base * 1.5 - 173.25).abs() < 1.0e-4);
    }

    #[test]
    fn test_arpeggio_note_peaks_early_then_releases() {
        let (mut bus, handle, _analyser) = test_bus();

        arpeggio_note(&handle, 0, 440.0, 0.9, 0.5);
        let out = left_channel(&render_seconds(&mut bus, 0.6));

        let attack = rms(&out[441..4410]);
        let tail = rms(&out[17640..19845]);
        assert!(
            attack > tail * 2.0,
            "note should decay: attack {} tail {}",
            attack,
            tail
        );

        // The note stops itself at the full beat.
        assert_eq!(handle.registry().live_count(), 0);
    }

    #[test]
    fn test_bass_note_is_audible_and_stops() {
        let (mut bus, handle, _analyser) = test_bus();

        bass_note(&handle, 0, 55.0, 1.0, 0.7, 0.5);
        let out = left_channel(&render_seconds(&mut bus, 0.6));

        assert!(rms(&out[..8820]) > 0.005);
        assert_eq!(handle.registry().live_count(), 0);
    }

    #[test]
    fn test_hits_scheduled_ahead_stay_silent_until_start() {
        let (mut bus, handle, _analyser) = test_bus();

        // Half a second out; the first blocks must carry nothing.
        hihat(&handle, 22050, 1.0, 0.9);
        let out = render_seconds(&mut bus, 0.25);
        assert!(out.iter().all(|sample| *sample == 0.0));

        let out = render_seconds(&mut bus, 0.5);
        assert!(rms(&left_channel(&out)) > 0.0);
    }
}
