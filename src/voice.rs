// src/voice.rs
//
// Boundary between the scheduler and whatever actually makes sound.

use crate::event::{BridgeStart, NoteTrigger};

/// Error reported by a voice system for a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerError {
    /// The voice system refused this note.
    Rejected { layer: usize, reason: String },

    /// No voice could be allocated.
    VoiceUnavailable { layer: usize },
}

impl std::fmt::Display for TriggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerError::Rejected { layer, reason } => {
                write!(f, "Layer {} note rejected: {}", layer, reason)
            }
            TriggerError::VoiceUnavailable { layer } => {
                write!(f, "No voice available for layer {}", layer)
            }
        }
    }
}

impl std::error::Error for TriggerError {}

/// The audio-voice system the scheduler drives.
///
/// Implementations must not block: they are called from inside a
/// scheduler pass and only need to queue work for `start_time`.
pub trait VoiceSink<N> {
    /// Start a note at `trigger.start_time`.
    fn trigger(&mut self, trigger: &NoteTrigger<'_, N>) -> Result<(), TriggerError>;

    /// Start holding a note until it is explicitly released.
    fn start_bridge(&mut self, bridge: &BridgeStart<'_, N>) -> Result<(), TriggerError>;

    /// Release a held note at `at_time`.
    fn release_bridge(&mut self, layer: usize, at_time: f64);
}

impl<N, V: VoiceSink<N> + ?Sized> VoiceSink<N> for Box<V> {
    fn trigger(&mut self, trigger: &NoteTrigger<'_, N>) -> Result<(), TriggerError> {
        (**self).trigger(trigger)
    }

    fn start_bridge(&mut self, bridge: &BridgeStart<'_, N>) -> Result<(), TriggerError> {
        (**self).start_bridge(bridge)
    }

    fn release_bridge(&mut self, layer: usize, at_time: f64) {
        (**self).release_bridge(layer, at_time)
    }
}

//
// ===============================
// MARK: Recorded voice commands
// ===============================
//

/// Owned copy of a voice request, for hosts that drain requests in batches.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCommand<N> {
    Trigger {
        layer: usize,
        note_index: usize,
        divisor: u32,
        note: N,
        start_time: f64,
        duration_seconds: f64,
        tick: i64,
    },

    BridgeStart {
        layer: usize,
        note: N,
        start_time: f64,
        release_tick: i64,
        release_time: f64,
    },

    BridgeRelease {
        layer: usize,
        time: f64,
    },
}

impl<N> VoiceCommand<N> {
    pub fn layer(&self) -> usize {
        match self {
            VoiceCommand::Trigger { layer, .. }
            | VoiceCommand::BridgeStart { layer, .. }
            | VoiceCommand::BridgeRelease { layer, .. } => *layer,
        }
    }
}

/// Number of `f64` slots per flattened record.
pub const RECORD_LEN: usize = 7;

pub const RECORD_TRIGGER: f64 = 0.0;
pub const RECORD_BRIDGE_START: f64 = 1.0;
pub const RECORD_BRIDGE_RELEASE: f64 = 2.0;

impl VoiceCommand<f64> {
    /// Flatten for hosts that only understand numeric buffers.
    ///
    /// Layout: `[kind, layer, note_index, note, start_time, length_or_release, tick]`.
    /// Unused slots are 0.
    pub fn to_record(&self) -> [f64; RECORD_LEN] {
        match *self {
            VoiceCommand::Trigger {
                layer,
                note_index,
                note,
                start_time,
                duration_seconds,
                tick,
                ..
            } => [
                RECORD_TRIGGER,
                layer as f64,
                note_index as f64,
                note,
                start_time,
                duration_seconds,
                tick as f64,
            ],
            VoiceCommand::BridgeStart {
                layer,
                note,
                start_time,
                release_tick,
                release_time,
            } => [
                RECORD_BRIDGE_START,
                layer as f64,
                0.0,
                note,
                start_time,
                release_time,
                release_tick as f64,
            ],
            VoiceCommand::BridgeRelease { layer, time } => {
                [RECORD_BRIDGE_RELEASE, layer as f64, 0.0, 0.0, time, 0.0, 0.0]
            }
        }
    }
}

/// Voice sink that records every request instead of playing it.
#[derive(Debug, Clone)]
pub struct RecordingSink<N> {
    commands: Vec<VoiceCommand<N>>,
}

impl<N> Default for RecordingSink<N> {
    fn default() -> Self {
        Self {
            commands: Vec::with_capacity(64),
        }
    }
}

impl<N> RecordingSink<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[VoiceCommand<N>] {
        &self.commands
    }

    /// Take every recorded command, oldest first.
    pub fn drain(&mut self) -> std::vec::Drain<'_, VoiceCommand<N>> {
        self.commands.drain(..)
    }

    /// Take at most `max` commands, oldest first. The rest stay queued.
    pub fn drain_up_to(&mut self, max: usize) -> std::vec::Drain<'_, VoiceCommand<N>> {
        let count = max.min(self.commands.len());
        self.commands.drain(..count)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Recorded note triggers as `(layer, tick)` pairs.
    pub fn trigger_ticks(&self) -> Vec<(usize, i64)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                VoiceCommand::Trigger { layer, tick, .. } => Some((*layer, *tick)),
                _ => None,
            })
            .collect()
    }
}

impl<N: Clone> VoiceSink<N> for RecordingSink<N> {
    fn trigger(&mut self, trigger: &NoteTrigger<'_, N>) -> Result<(), TriggerError> {
        self.commands.push(VoiceCommand::Trigger {
            layer: trigger.layer,
            note_index: trigger.note_index,
            divisor: trigger.divisor,
            note: trigger.note.clone(),
            start_time: trigger.start_time,
            duration_seconds: trigger.duration_seconds,
            tick: trigger.tick,
        });
        Ok(())
    }

    fn start_bridge(&mut self, bridge: &BridgeStart<'_, N>) -> Result<(), TriggerError> {
        self.commands.push(VoiceCommand::BridgeStart {
            layer: bridge.layer,
            note: bridge.note.clone(),
            start_time: bridge.start_time,
            release_tick: bridge.release_tick,
            release_time: bridge.release_time,
        });
        Ok(())
    }

    fn release_bridge(&mut self, layer: usize, at_time: f64) {
        self.commands
            .push(VoiceCommand::BridgeRelease { layer, time: at_time });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        let note = 440.0;

        sink.trigger(&NoteTrigger {
            note: &note,
            duration_seconds: 0.5,
            layer: 1,
            divisor: 3,
            note_index: 2,
            start_time: 1.0,
            tick: 42,
        })
        .unwrap();
        sink.release_bridge(0, 1.5);

        assert_eq!(sink.trigger_ticks(), vec![(1, 42)]);
        assert_eq!(sink.commands()[1].layer(), 0);
        assert_eq!(sink.drain_up_to(1).count(), 1);
        assert_eq!(sink.commands().len(), 1);
        assert_eq!(sink.drain().count(), 1);
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_flattened_record_layout() {
        let cmd = VoiceCommand::Trigger {
            layer: 2,
            note_index: 1,
            divisor: 3,
            note: 220.0,
            start_time: 3.25,
            duration_seconds: 0.5,
            tick: 1333,
        };
        assert_eq!(cmd.to_record(), [0.0, 2.0, 1.0, 220.0, 3.25, 0.5, 1333.0]);

        let release = VoiceCommand::<f64>::BridgeRelease { layer: 3, time: 9.0 };
        assert_eq!(release.to_record()[0], RECORD_BRIDGE_RELEASE);
        assert_eq!(release.to_record()[4], 9.0);
    }

    #[test]
    fn test_trigger_error_display() {
        let err = TriggerError::VoiceUnavailable { layer: 2 };
        assert_eq!(err.to_string(), "No voice available for layer 2");
    }
}
