// src/retune.rs
//
// Live retune: cycle-length and tempo changes while playing.
//
// A changed `cycle_ticks` or `seconds_per_tick` invalidates old absolute
// ticks, so the transport is re-anchored by phase: wherever in the loop we
// were, we continue from the equivalent place in the new loop.

use crate::event::PhaseChange;
use crate::state::TransportState;
use crate::sustain::{self, BridgeOutcome};
use crate::voice::VoiceSink;

/// Result of a retune.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetuneOutcome {
    /// Notification for phase listeners.
    pub phase: PhaseChange,

    /// The tick the transport was re-anchored at, if it is running.
    pub anchor_tick: Option<i64>,

    pub bridge: BridgeOutcome,
}

/// Change the cycle length, keeping the phase ratio.
pub fn change_cycle_duration<N, V>(
    state: &mut TransportState<N>,
    seconds: f64,
    now: f64,
    voices: &mut V,
) -> RetuneOutcome
where
    N: Clone,
    V: VoiceSink<N> + ?Sized,
{
    let running = state.is_running();
    let latest = sustain::capture_latest(state, now);

    let phase_ratio = if running {
        let prev_cycle = state.cycle_ticks.max(1);
        state.current_tick(now).rem_euclid(prev_cycle) as f64 / prev_cycle as f64
    } else {
        0.0
    };

    state.set_cycle_seconds(seconds);

    let anchor_tick = running.then(|| {
        let cycle = state.cycle_ticks;
        let tick = ((phase_ratio * cycle as f64).round() as i64).rem_euclid(cycle);
        reanchor(state, tick, now);
        tick
    });

    log::debug!(
        "Cycle retuned to {}s ({} ticks), phase ratio {:.4}, anchor {:?}",
        state.cycle_seconds,
        state.cycle_ticks,
        phase_ratio,
        anchor_tick
    );

    let bridge = sustain::arm_bridge(state, latest, now, voices);

    RetuneOutcome {
        phase: state.phase_change(now),
        anchor_tick,
        bridge,
    }
}

/// Change the tempo multiplier.
///
/// The phase to continue from is `phase_ms` when given, otherwise the
/// current phase. Non-positive tempos are clamped.
pub fn change_tempo<N, V>(
    state: &mut TransportState<N>,
    tempo: f64,
    phase_ms: Option<f64>,
    now: f64,
    voices: &mut V,
) -> RetuneOutcome
where
    N: Clone,
    V: VoiceSink<N> + ?Sized,
{
    let running = state.is_running();
    let latest = sustain::capture_latest(state, now);
    let cycle = state.cycle_ticks.max(1);

    let phase_tick = match phase_ms {
        Some(ms) => state.clock.phase_ms_to_tick(ms),
        None if running => state.current_tick(now),
        None => 0,
    }
    .rem_euclid(cycle);

    let tempo = state.config.clamp_tempo(tempo);
    state.clock.set_tempo(tempo);

    let anchor_tick = running.then(|| {
        reanchor(state, phase_tick, now);
        phase_tick
    });

    log::debug!(
        "Tempo retuned to {}, anchor {:?}",
        state.clock.tempo(),
        anchor_tick
    );

    let bridge = sustain::arm_bridge(state, latest, now, voices);

    RetuneOutcome {
        phase: state.phase_change(now),
        anchor_tick,
        bridge,
    }
}

/// Pin `tick` to `now` and restart the scheduling window there.
///
/// Play history is in the old tick space and is discarded.
fn reanchor<N>(state: &mut TransportState<N>, tick: i64, now: f64) {
    state.clock.anchor(tick, now);
    state.last_scheduled_tick = tick;
    state.history.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MIN_TEMPO, TransportConfig};
    use crate::state::{LayerConfig, PlayedNote, RunState};
    use crate::voice::RecordingSink;

    fn running(cycle_seconds: f64, anchor_tick: i64, at: f64) -> TransportState<f64> {
        let mut state = TransportState::new(TransportConfig::default(), cycle_seconds);
        state.set_layers(vec![LayerConfig::new(4, vec![1.0, 2.0, 3.0, 4.0])]);
        state.clock.anchor(anchor_tick, at);
        state.last_scheduled_tick = anchor_tick;
        state.run_state = RunState::Running;
        state
    }

    #[test]
    fn test_cycle_change_preserves_phase_ratio() {
        // 4s cycle, now at absolute tick 9000 -> phase 1000/4000 = 0.25
        let mut state = running(4.0, 0, 0.0);
        let mut sink = RecordingSink::new();

        let outcome = change_cycle_duration(&mut state, 6.0, 9.0, &mut sink);

        assert_eq!(state.cycle_ticks(), 6000);
        assert_eq!(outcome.anchor_tick, Some(1500));
        assert_eq!(state.last_scheduled_tick(), 1500);
        assert_eq!(state.current_tick(9.0), 1500);
        assert!((outcome.phase.phase_ms - 1500.0).abs() < 1e-9);
        assert_eq!(outcome.phase.cycle_duration_ms, 6000.0);
    }

    #[test]
    fn test_phase_ratio_within_rounding() {
        for (c1, c2, t) in [(4.0, 3.0, 12_345), (1.7, 9.3, 777), (7.0, 0.5, 69_999)] {
            let mut state = running(c1, 0, 0.0);
            let mut sink = RecordingSink::new();
            let now = t as f64 / 1000.0;
            let before = state.current_tick(now).rem_euclid(state.cycle_ticks()) as f64
                / state.cycle_ticks() as f64;

            let outcome = change_cycle_duration(&mut state, c2, now, &mut sink);
            let c2_ticks = state.cycle_ticks() as f64;
            let after = outcome.anchor_tick.unwrap() as f64 / c2_ticks;

            let diff = (after - before).abs();
            assert!(diff <= 0.5 / c2_ticks + 1e-9 || (1.0 - diff) <= 0.5 / c2_ticks + 1e-9);
        }
    }

    #[test]
    fn test_cycle_change_while_stopped() {
        let mut state = running(4.0, 0, 0.0);
        state.run_state = RunState::Stopped;
        let mut sink = RecordingSink::new();

        let outcome = change_cycle_duration(&mut state, 2.0, 5.0, &mut sink);

        assert_eq!(outcome.anchor_tick, None);
        assert_eq!(outcome.phase.phase_ms, 0.0);
        assert_eq!(outcome.bridge, BridgeOutcome::NotRunning);
        assert_eq!(state.compiled().layer(0)[1].start_tick, 500);
    }

    #[test]
    fn test_tempo_change_keeps_current_phase() {
        let mut state = running(4.0, 0, 0.0);
        let mut sink = RecordingSink::new();

        // tick 5000 -> phase 1000
        let outcome = change_tempo(&mut state, 2.0, None, 5.0, &mut sink);

        assert_eq!(outcome.anchor_tick, Some(1000));
        assert_eq!(state.clock().tempo(), 2.0);
        // half a second later at double tempo is 1000 ticks on
        assert_eq!(state.current_tick(5.5), 2000);
    }

    #[test]
    fn test_tempo_change_with_explicit_phase() {
        let mut state = running(4.0, 0, 0.0);
        let mut sink = RecordingSink::new();

        let outcome = change_tempo(&mut state, 1.0, Some(3500.0), 5.0, &mut sink);

        assert_eq!(outcome.anchor_tick, Some(3500));
        assert!((outcome.phase.phase_ms - 3500.0).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_clamped() {
        let mut state = running(4.0, 0, 0.0);
        let mut sink = RecordingSink::new();

        change_tempo(&mut state, 0.0, None, 1.0, &mut sink);
        assert!(state.clock().tempo() >= MIN_TEMPO);
        change_tempo(&mut state, -5.0, None, 1.0, &mut sink);
        assert!(state.clock().tempo() >= MIN_TEMPO);
        assert!(state.ensure_consistent().is_ok());
    }

    #[test]
    fn test_retune_arms_bridge_from_history() {
        let mut state = running(4.0, 0, 0.0);
        state.history.record(
            0,
            PlayedNote {
                tick: 1000,
                note_index: 1,
                note: 2.0,
            },
        );
        let mut sink = RecordingSink::new();

        // tick 1500, phase 0.375 -> new cycle 8000, anchor 3000, next note 4000
        let outcome = change_cycle_duration(&mut state, 8.0, 1.5, &mut sink);

        assert_eq!(outcome.anchor_tick, Some(3000));
        assert_eq!(
            outcome.bridge,
            BridgeOutcome::Started {
                layer: 0,
                release_tick: 4000
            }
        );
        assert!(state.history().is_empty());
    }
}
