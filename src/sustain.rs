// src/sustain.rs
//
// Bridge voices: hold the most recently started note across a retune until
// the re-anchored scheduler reaches that layer's next real note.
//
// Only armed with legato off and the full note scale selected. Any other
// mode clears pending bridge state.

use crate::event::BridgeStart;
use crate::state::{BridgeVoice, TransportState};
use crate::voice::VoiceSink;

/// The last note heard before a retune, captured in the old tick space.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestNote<N> {
    pub layer: usize,
    pub tick: i64,
    pub note: N,
}

/// Why a bridge was or was not armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// A new held voice was requested.
    Started { layer: usize, release_tick: i64 },

    /// An already-held voice got a new release tick.
    Extended { layer: usize, release_tick: i64 },

    NotRunning,
    Legato,
    PartialScale,
    NoHistory,

    /// The layer's next note starts right now or the layer went silent.
    NothingToBridge,

    /// The voice system refused the held voice.
    Failed,
}

/// Capture the layer whose last note started most recently.
///
/// A held bridge voice counts as its layer's latest note. History is
/// cleared on every re-anchor, so anything left in it started after the
/// bridge and takes precedence.
///
/// Must run before the transport is re-anchored.
pub fn capture_latest<N: Clone>(state: &TransportState<N>, now: f64) -> Option<LatestNote<N>> {
    if !state.is_running() {
        return None;
    }
    let current = state.current_tick(now);

    if let Some((layer, played)) = state.history.latest_started(current) {
        return Some(LatestNote {
            layer,
            tick: played.tick,
            note: played.note.clone(),
        });
    }

    state
        .bridges
        .iter()
        .enumerate()
        .filter_map(|(layer, bridge)| bridge.as_ref().map(|b| (layer, b)))
        .max_by(|(_, a), (_, b)| a.started_at.total_cmp(&b.started_at))
        .map(|(layer, bridge)| LatestNote {
            layer,
            tick: state.clock.time_to_abs_tick(bridge.started_at),
            note: bridge.note.clone(),
        })
}

/// Arm (or clear) the bridge after the transport was re-anchored at `now`.
pub fn arm_bridge<N, V>(
    state: &mut TransportState<N>,
    latest: Option<LatestNote<N>>,
    now: f64,
    voices: &mut V,
) -> BridgeOutcome
where
    N: Clone,
    V: VoiceSink<N> + ?Sized,
{
    let blocked = if !state.is_running() {
        Some(BridgeOutcome::NotRunning)
    } else if state.legato {
        Some(BridgeOutcome::Legato)
    } else if !state.full_scale {
        Some(BridgeOutcome::PartialScale)
    } else if latest.is_none() {
        Some(BridgeOutcome::NoHistory)
    } else {
        None
    };

    let latest = match (blocked, latest) {
        (None, Some(latest)) => latest,
        (reason, _) => {
            clear_bridges(state, now, voices);
            return reason.unwrap_or(BridgeOutcome::NoHistory);
        }
    };

    let layer = latest.layer;
    let current = state.current_tick(now);

    // Bridges on other layers belong to the old tick space.
    release_except(state, layer, now, voices);

    let release_tick = match state.compiled.next_start_from(layer, current) {
        Some(tick) if tick > current => tick,
        _ => {
            release_layer(state, layer, now, voices);
            return BridgeOutcome::NothingToBridge;
        }
    };

    if let Some(bridge) = state.bridges[layer].as_mut() {
        bridge.release_tick = release_tick;
        log::debug!(
            "Bridge on layer {} extended to tick {}",
            layer,
            release_tick
        );
        return BridgeOutcome::Extended {
            layer,
            release_tick,
        };
    }

    let request = BridgeStart {
        layer,
        note: &latest.note,
        start_time: now,
        release_tick,
        release_time: state.clock.abs_tick_to_time(release_tick),
    };

    match voices.start_bridge(&request) {
        Ok(()) => {
            log::debug!(
                "Bridge on layer {} holds until tick {}",
                layer,
                release_tick
            );
            state.bridges[layer] = Some(BridgeVoice {
                note: latest.note,
                release_tick,
                started_at: now,
            });
            BridgeOutcome::Started {
                layer,
                release_tick,
            }
        }
        Err(e) => {
            log::warn!("Bridge voice for layer {} refused: {}", layer, e);
            BridgeOutcome::Failed
        }
    }
}

/// Release every held bridge voice at `now`.
pub fn clear_bridges<N, V>(state: &mut TransportState<N>, now: f64, voices: &mut V)
where
    V: VoiceSink<N> + ?Sized,
{
    for layer in 0..state.bridges.len() {
        release_layer(state, layer, now, voices);
    }
}

fn release_except<N, V>(state: &mut TransportState<N>, keep: usize, now: f64, voices: &mut V)
where
    V: VoiceSink<N> + ?Sized,
{
    for layer in 0..state.bridges.len() {
        if layer != keep {
            release_layer(state, layer, now, voices);
        }
    }
}

fn release_layer<N, V>(state: &mut TransportState<N>, layer: usize, now: f64, voices: &mut V)
where
    V: VoiceSink<N> + ?Sized,
{
    if state.bridges[layer].take().is_some() {
        voices.release_bridge(layer, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::state::{LayerConfig, PlayedNote, RunState};
    use crate::voice::{RecordingSink, VoiceCommand};

    fn state_at(anchor_tick: i64) -> TransportState<f64> {
        let mut state = TransportState::new(TransportConfig::default(), 4.0);
        state.set_layers(vec![
            LayerConfig::new(4, vec![100.0]),
            LayerConfig::new(3, vec![200.0]),
        ]);
        state.clock.anchor(anchor_tick, 10.0);
        state.last_scheduled_tick = anchor_tick;
        state.run_state = RunState::Running;
        state
    }

    fn latest(layer: usize) -> Option<LatestNote<f64>> {
        Some(LatestNote {
            layer,
            tick: 0,
            note: 555.0,
        })
    }

    #[test]
    fn test_capture_picks_most_recent_layer() {
        let mut state = state_at(0);
        state.history.record(0, PlayedNote { tick: 0, note_index: 0, note: 100.0 });
        state.history.record(1, PlayedNote { tick: 1333, note_index: 1, note: 200.0 });
        state.history.record(0, PlayedNote { tick: 2000, note_index: 2, note: 100.0 });

        // tick 1500 at device time 11.5
        let captured = capture_latest(&state, 11.5).expect("latest");
        assert_eq!(captured.layer, 1);
        assert_eq!(captured.note, 200.0);
    }

    #[test]
    fn test_capture_falls_back_to_held_bridge() {
        let mut state = state_at(1500);
        let mut sink = RecordingSink::new();
        arm_bridge(&mut state, latest(0), 10.0, &mut sink);

        // No history since the anchor; the held voice is the latest note
        let captured = capture_latest(&state, 10.1).expect("bridge note");
        assert_eq!(captured.layer, 0);
        assert_eq!(captured.note, 555.0);
        assert_eq!(captured.tick, 1500);

        // A note started after the bridge wins
        state.history.record(1, PlayedNote { tick: 1550, note_index: 0, note: 200.0 });
        assert_eq!(capture_latest(&state, 10.1).map(|l| l.layer), Some(1));
    }

    #[test]
    fn test_arm_starts_bridge_until_next_note() {
        let mut state = state_at(1500);
        let mut sink = RecordingSink::new();

        let outcome = arm_bridge(&mut state, latest(0), 10.0, &mut sink);

        assert_eq!(
            outcome,
            BridgeOutcome::Started {
                layer: 0,
                release_tick: 2000
            }
        );
        assert_eq!(state.bridge(0).map(|b| b.release_tick), Some(2000));
        match &sink.commands()[0] {
            VoiceCommand::BridgeStart {
                note, release_time, ..
            } => {
                assert_eq!(*note, 555.0);
                assert!((release_time - 10.5).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_existing_bridge_is_not_retriggered() {
        let mut state = state_at(1500);
        let mut sink = RecordingSink::new();
        arm_bridge(&mut state, latest(0), 10.0, &mut sink);

        state.clock.anchor(2500, 11.0);
        let outcome = arm_bridge(&mut state, latest(0), 11.0, &mut sink);

        assert_eq!(
            outcome,
            BridgeOutcome::Extended {
                layer: 0,
                release_tick: 3000
            }
        );
        assert_eq!(sink.commands().len(), 1);
    }

    #[test]
    fn test_legato_clears_bridge() {
        let mut state = state_at(1500);
        let mut sink = RecordingSink::new();
        arm_bridge(&mut state, latest(0), 10.0, &mut sink);

        state.legato = true;
        let outcome = arm_bridge(&mut state, latest(0), 10.2, &mut sink);

        assert_eq!(outcome, BridgeOutcome::Legato);
        assert!(state.bridge(0).is_none());
        assert_eq!(
            sink.commands().last(),
            Some(&VoiceCommand::BridgeRelease { layer: 0, time: 10.2 })
        );
    }

    #[test]
    fn test_partial_scale_and_no_history_do_not_arm() {
        let mut state = state_at(1500);
        let mut sink = RecordingSink::new();

        state.full_scale = false;
        assert_eq!(
            arm_bridge(&mut state, latest(0), 10.0, &mut sink),
            BridgeOutcome::PartialScale
        );

        state.full_scale = true;
        assert_eq!(
            arm_bridge(&mut state, None, 10.0, &mut sink),
            BridgeOutcome::NoHistory
        );
        assert!(sink.commands().is_empty());
    }

    #[test]
    fn test_note_starting_now_needs_no_bridge() {
        let mut state = state_at(2000);
        let mut sink = RecordingSink::new();

        assert_eq!(
            arm_bridge(&mut state, latest(0), 10.0, &mut sink),
            BridgeOutcome::NothingToBridge
        );
        assert!(state.bridge(0).is_none());
    }

    #[test]
    fn test_other_layer_bridge_released() {
        let mut state = state_at(1500);
        let mut sink = RecordingSink::new();
        arm_bridge(&mut state, latest(0), 10.0, &mut sink);

        arm_bridge(&mut state, latest(1), 10.1, &mut sink);

        assert!(state.bridge(0).is_none());
        assert!(state.bridge(1).is_some());
        assert!(sink
            .commands()
            .contains(&VoiceCommand::BridgeRelease { layer: 0, time: 10.1 }));
    }
}
