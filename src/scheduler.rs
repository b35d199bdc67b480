// src/scheduler.rs

use crate::event::{LAYER_COUNT, NoteTrigger};
use crate::state::{PlayedNote, TransportState};
use crate::voice::VoiceSink;

/// Fatal scheduling error. Indicates a broken invariant, not bad input.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// Tick/time conversion would be meaningless.
    AnchorInconsistent { cycle_ticks: i64, seconds_per_tick: f64 },
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::AnchorInconsistent {
                cycle_ticks,
                seconds_per_tick,
            } => write!(
                f,
                "Transport anchor inconsistent: cycle_ticks={}, seconds_per_tick={}",
                cycle_ticks, seconds_per_tick
            ),
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Inclusive start of the scheduled tick window
    pub window_start: i64,

    /// Exclusive end of the scheduled tick window
    pub window_end: i64,

    /// Occurrences accepted by the voice system
    pub triggered: usize,

    /// Occurrences the voice system failed
    pub dropped: usize,

    /// Bridge voices released in this pass
    pub released_bridges: usize,
}

impl PassReport {
    fn idle(at: i64) -> Self {
        Self {
            window_start: at,
            window_end: at,
            ..Self::default()
        }
    }
}

/// Walks the compiled layer timelines one lookahead window at a time.
///
/// This struct owns no timing state. Everything it advances lives in
/// the [`TransportState`] it is handed.
#[derive(Debug)]
pub struct Scheduler {
    lookahead_seconds: f64,
}

impl Scheduler {
    pub fn new(lookahead_seconds: f64) -> Self {
        Self { lookahead_seconds }
    }

    #[inline]
    pub fn lookahead_seconds(&self) -> f64 {
        self.lookahead_seconds
    }

    /// Schedule every occurrence starting in
    /// `[last_scheduled_tick, tick(now + lookahead))`.
    ///
    /// Consecutive passes tile the tick axis: each window starts where the
    /// previous one ended. Does nothing when the transport is stopped.
    pub fn run_pass<N, V>(
        &mut self,
        state: &mut TransportState<N>,
        now: f64,
        voices: &mut V,
    ) -> Result<PassReport, SchedulerError>
    where
        N: Clone,
        V: VoiceSink<N> + ?Sized,
    {
        if !state.is_running() {
            return Ok(PassReport::idle(state.last_scheduled_tick));
        }

        state.ensure_consistent()?;

        let clock = state.clock;
        let cycle = state.cycle_ticks;
        let window_start = state.last_scheduled_tick;
        let window_end = clock
            .time_to_abs_tick(now + self.lookahead_seconds)
            .max(window_start);

        state.history.prune(clock.time_to_abs_tick(now));

        let mut report = PassReport {
            window_start,
            window_end,
            ..PassReport::default()
        };

        if window_end == window_start {
            return Ok(report);
        }

        // Held notes hand over to the real note at the same tick.
        for layer in 0..LAYER_COUNT {
            let due = matches!(&state.bridges[layer], Some(b) if b.release_tick < window_end);
            if due {
                if let Some(bridge) = state.bridges[layer].take() {
                    voices.release_bridge(layer, clock.abs_tick_to_time(bridge.release_tick));
                    report.released_bridges += 1;
                }
            }
        }

        // Arc clones; the history is mutated while walking.
        let compiled = state.compiled.clone();

        for layer in 0..LAYER_COUNT {
            let divisor = compiled.divisor(layer);

            for event in compiled.layer(layer) {
                let mut tick = first_occurrence(event.start_tick, cycle, window_start);

                while tick < window_end {
                    let trigger = NoteTrigger {
                        note: &event.note,
                        duration_seconds: clock.ticks_to_seconds(event.duration_ticks),
                        layer,
                        divisor,
                        note_index: event.note_index,
                        start_time: clock.abs_tick_to_time(tick),
                        tick,
                    };

                    match voices.trigger(&trigger) {
                        Ok(()) => {
                            report.triggered += 1;
                            state.history.record(
                                layer,
                                PlayedNote {
                                    tick,
                                    note_index: event.note_index,
                                    note: event.note.clone(),
                                },
                            );
                        }
                        Err(e) => {
                            log::warn!("Dropping layer {} note at tick {}: {}", layer, tick, e);
                            report.dropped += 1;
                        }
                    }

                    tick += cycle;
                }
            }
        }

        state.last_scheduled_tick = window_end;
        state.dropped_triggers += report.dropped as u64;

        Ok(report)
    }
}

/// First tick `>= from` congruent to `start_tick` modulo `cycle`.
#[inline]
fn first_occurrence(start_tick: i64, cycle: i64, from: i64) -> i64 {
    let offset = (from - start_tick).rem_euclid(cycle);
    if offset == 0 { from } else { from + (cycle - offset) }
}
