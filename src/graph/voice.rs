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
use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex;

use super::automation::Automation;
use super::filter::Biquad;
use super::oscillator::Oscillator;

/// Identifies one scheduled voice on a bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub(crate) u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice-{}", self.0)
    }
}

/// What a voice reads its raw signal from.
pub enum VoiceSource {
    /// An oscillator whose frequency may be automated (drum pitch sweeps,
    /// cue sweeps).
    Oscillator {
        oscillator: Oscillator,
        frequency: Automation,
    },
    /// A one-shot buffer; the voice finishes when the buffer runs out.
    Noise { buffer: Vec<f32>, position: usize },
    /// A stereo buffer looped until the voice is force-stopped.
    Loop {
        left: Vec<f32>,
        right: Vec<f32>,
        position: usize,
    },
}

/// One independently scheduled sound: a source, an optional filter, a gain
/// envelope, and absolute start/stop stamps on the bus clock. Mono sources
/// are duplicated to both channels; the pan stage downstream handles
/// placement.
pub struct Voice {
    id: VoiceId,
    tag: &'static str,
    start: u64,
    stop_at: Option<u64>,
    source: VoiceSource,
    filter: Option<Biquad>,
    gain: Automation,
}

impl Voice {
    pub fn new(id: VoiceId, tag: &'static str, start: u64, source: VoiceSource) -> Voice {
        Voice {
            id,
            tag,
            start,
            stop_at: None,
            source,
            filter: None,
            gain: Automation::new(1.0),
        }
    }

    /// Sets the gain envelope.
    pub fn with_gain(mut self, gain: Automation) -> Voice {
        self.gain = gain;
        self
    }

    /// Routes the source through a filter. Only meaningful for mono sources.
    pub fn with_filter(mut self, filter: Biquad) -> Voice {
        self.filter = Some(filter);
        self
    }

    /// Stops the voice at an absolute sample position.
    pub fn with_stop_at(mut self, stop_at: u64) -> Voice {
        self.stop_at = Some(stop_at);
        self
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Renders the next stereo frame for the given clock position.
    pub fn next_frame(&mut self, clock: u64) -> (f32, f32) {
        if clock < self.start {
            return (0.0, 0.0);
        }

        let gain = self.gain.value_at(clock);
        match &mut self.source {
            VoiceSource::Oscillator {
                oscillator,
                frequency,
            } => {
                oscillator.set_frequency(f64::from(frequency.value_at(clock)));
                let mut sample = oscillator.next_sample();
                if let Some(filter) = &mut self.filter {
                    sample = filter.process(sample);
                }
                let sample = sample * gain;
                (sample, sample)
            }
            VoiceSource::Noise { buffer, position } => {
                let Some(&raw) = buffer.get(*position) else {
                    return (0.0, 0.0);
                };
                *position += 1;
                let mut sample = raw;
                if let Some(filter) = &mut self.filter {
                    sample = filter.process(sample);
                }
                let sample = sample * gain;
                (sample, sample)
            }
            VoiceSource::Loop {
                left,
                right,
                position,
            } => {
                if left.is_empty() {
                    return (0.0, 0.0);
                }
                let frame = (left[*position] * gain, right[*position] * gain);
                *position = (*position + 1) % left.len();
                frame
            }
        }
    }

    /// Whether the voice has reached its natural end.
    pub fn is_finished(&self, clock: u64) -> bool {
        if let Some(stop_at) = self.stop_at {
            if clock >= stop_at {
                return true;
            }
        }

        match &self.source {
            VoiceSource::Noise { buffer, position } => *position >= buffer.len(),
            VoiceSource::Oscillator { .. } | VoiceSource::Loop { .. } => false,
        }
    }
}

/// Tracks the voices currently alive on the bus, plus cumulative spawn
/// counts per tag. The engine registers a voice when it sends the spawn
/// command; the render thread retires it on natural decay or force-stop, so
/// a stopped session drains within one render block.
#[derive(Clone, Default)]
pub struct VoiceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    live: HashMap<VoiceId, &'static str>,
    spawned: HashMap<&'static str, u64>,
}

impl VoiceRegistry {
    pub fn new() -> VoiceRegistry {
        VoiceRegistry::default()
    }

    /// Records a voice as live. Called before the spawn command is sent so
    /// observers never miss a voice that is already audible.
    pub(crate) fn register(&self, id: VoiceId, tag: &'static str) {
        let mut inner = self.inner.lock();
        inner.live.insert(id, tag);
        *inner.spawned.entry(tag).or_insert(0) += 1;
    }

    /// Removes a voice. Retiring an unknown id is a no-op, which is what
    /// makes double stops harmless.
    pub(crate) fn retire(&self, id: VoiceId) {
        self.inner.lock().live.remove(&id);
    }

    /// Ids of all live voices.
    pub fn live_ids(&self) -> Vec<VoiceId> {
        self.inner.lock().live.keys().copied().collect()
    }

    /// Ids of the live voices carrying the given tag.
    pub fn live_ids_tagged(&self, tag: &str) -> Vec<VoiceId> {
        self.inner
            .lock()
            .live
            .iter()
            .filter(|(_, live_tag)| **live_tag == tag)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of the live voices not carrying the given tag.
    pub fn live_ids_excluding(&self, tag: &str) -> Vec<VoiceId> {
        self.inner
            .lock()
            .live
            .iter()
            .filter(|(_, live_tag)| **live_tag != tag)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of live voices.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Tags of all live voices, sorted for stable assertions and logs.
    pub fn live_tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.inner.lock().live.values().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// How many voices with this tag have ever been spawned.
    pub fn spawned_total(&self, tag: &str) -> u64 {
        self.inner.lock().spawned.get(tag).copied().unwrap_or(0)
    }
}
