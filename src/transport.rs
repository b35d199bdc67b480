// src/transport.rs
//
// Transport facade: the lifecycle entry points collaborators call.
//
// Every mutation of timing state goes through here, and every entry point
// completes all related field updates before returning.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::config::TransportConfig;
use crate::event::{LAYER_COUNT, PhaseChange};
use crate::retune;
use crate::scheduler::{PassReport, Scheduler, SchedulerError};
use crate::state::{EngineReadback, LayerConfig, RunState, TransportState};
use crate::sustain;
use crate::timer::PassTimer;
use crate::voice::VoiceSink;

/// Polyrhythm transport driving a voice system.
///
/// This struct:
/// - owns the single [`TransportState`]
/// - is polled by a host timer (thread, JS interval, audio callback)
/// - never blocks
pub struct Transport<N, V> {
    state: TransportState<N>,

    scheduler: Scheduler,

    timer: PassTimer,

    /// The audio-voice system notes are handed to
    voices: V,

    /// Phase listeners; dropped receivers are pruned on publish
    listeners: Vec<Sender<PhaseChange>>,

    last_report: PassReport,
}

impl<N, V> Transport<N, V>
where
    N: Clone,
    V: VoiceSink<N>,
{
    pub fn new(config: TransportConfig, cycle_seconds: f64, voices: V) -> Self {
        let state = TransportState::new(config, cycle_seconds);
        let config = *state.config();

        Self {
            state,
            scheduler: Scheduler::new(config.lookahead_seconds),
            timer: PassTimer::new(config.poll_interval_seconds),
            voices,
            listeners: Vec::new(),
            last_report: PassReport::default(),
        }
    }

    // ═════════════════════════════════════════════════════════════
    // Lifecycle
    // ═════════════════════════════════════════════════════════════

    /// Start playback `phase_ms` into the cycle.
    ///
    /// Starting while running re-anchors at the given phase.
    pub fn start(&mut self, phase_ms: f64, now: f64) -> PhaseChange {
        sustain::clear_bridges(&mut self.state, now, &mut self.voices);
        self.state.history.clear();

        let tick = self
            .state
            .clock
            .configure(phase_ms, self.state.cycle_ticks, now);
        self.state.last_scheduled_tick = tick;
        self.state.run_state = RunState::Running;
        self.timer.start(now);

        log::info!(
            "Transport started at tick {} (cycle {} ticks, tempo {})",
            tick,
            self.state.cycle_ticks,
            self.state.clock.tempo()
        );

        let change = self.state.phase_change(now);
        self.publish(change);
        change
    }

    /// Stop playback. No pass runs after this returns.
    pub fn stop(&mut self, now: f64) {
        if !self.state.is_running() {
            return;
        }

        self.timer.cancel();
        self.state.run_state = RunState::Stopped;
        sustain::clear_bridges(&mut self.state, now, &mut self.voices);
        self.state.history.clear();

        log::info!("Transport stopped");
    }

    // ═════════════════════════════════════════════════════════════
    // Retune
    // ═════════════════════════════════════════════════════════════

    pub fn change_cycle_duration(&mut self, seconds: f64, now: f64) -> PhaseChange {
        let outcome =
            retune::change_cycle_duration(&mut self.state, seconds, now, &mut self.voices);
        self.after_retune(outcome.phase, now)
    }

    pub fn change_tempo(&mut self, tempo: f64, phase_ms: Option<f64>, now: f64) -> PhaseChange {
        let outcome =
            retune::change_tempo(&mut self.state, tempo, phase_ms, now, &mut self.voices);
        self.after_retune(outcome.phase, now)
    }

    /// Jump to `phase_ms` at the current tempo.
    pub fn seek(&mut self, phase_ms: f64, now: f64) -> PhaseChange {
        let tempo = self.state.clock.tempo();
        self.change_tempo(tempo, Some(phase_ms), now)
    }

    fn after_retune(&mut self, change: PhaseChange, now: f64) -> PhaseChange {
        // A pass queued against the old anchor must not run.
        if self.state.is_running() {
            self.timer.restart(now);
        }
        self.publish(change);
        change
    }

    // ═════════════════════════════════════════════════════════════
    // Rhythm data
    // ═════════════════════════════════════════════════════════════

    /// Replace per-layer pulse counts and notes, then recompile.
    pub fn set_layers(&mut self, layers: Vec<LayerConfig<N>>) {
        self.state.set_layers(layers);
    }

    /// Replace a single layer, keeping the others.
    pub fn set_layer(&mut self, index: usize, layer: LayerConfig<N>) {
        if index >= LAYER_COUNT {
            log::warn!("Ignoring layer {} (only {} layers)", index, LAYER_COUNT);
            return;
        }
        let mut layers = self.state.layers().to_vec();
        layers.resize_with(LAYER_COUNT, LayerConfig::silent);
        layers[index] = layer;
        self.state.set_layers(layers);
    }

    pub fn recompile_layer_events(&mut self) {
        self.state.recompile();
    }

    pub fn set_legato(&mut self, legato: bool, now: f64) {
        self.state.legato = legato;
        if legato {
            sustain::clear_bridges(&mut self.state, now, &mut self.voices);
        }
    }

    pub fn set_full_scale(&mut self, full_scale: bool, now: f64) {
        self.state.full_scale = full_scale;
        if !full_scale {
            sustain::clear_bridges(&mut self.state, now, &mut self.voices);
        }
    }

    // ═════════════════════════════════════════════════════════════
    // Scheduling
    // ═════════════════════════════════════════════════════════════

    /// Run a scheduler pass if one is due at `now`.
    ///
    /// Returns `Ok(None)` when stopped or not yet due. An inconsistent
    /// anchor stops the transport and is returned as an error.
    pub fn poll(&mut self, now: f64) -> Result<Option<PassReport>, SchedulerError> {
        if !self.state.is_running() || !self.timer.take_due(now) {
            return Ok(None);
        }

        match self
            .scheduler
            .run_pass(&mut self.state, now, &mut self.voices)
        {
            Ok(report) => {
                self.last_report = report;
                Ok(Some(report))
            }
            Err(e) => {
                log::error!("{}; stopping transport", e);
                self.stop(now);
                Err(e)
            }
        }
    }

    // ═════════════════════════════════════════════════════════════
    // Listeners
    // ═════════════════════════════════════════════════════════════

    /// Receive a [`PhaseChange`] after every start, retune and seek.
    pub fn subscribe(&mut self) -> Receiver<PhaseChange> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    fn publish(&mut self, change: PhaseChange) {
        self.listeners.retain(|tx| tx.send(change).is_ok());
    }
}

impl<N, V> Transport<N, V> {
    // ═════════════════════════════════════════════════════════════
    // Readback
    // ═════════════════════════════════════════════════════════════

    pub fn state(&self) -> &TransportState<N> {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut TransportState<N> {
        &mut self.state
    }

    pub fn voices(&self) -> &V {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut V {
        &mut self.voices
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    #[inline]
    pub fn tempo(&self) -> f64 {
        self.state.clock.tempo()
    }

    #[inline]
    pub fn cycle_seconds(&self) -> f64 {
        self.state.cycle_seconds
    }

    pub fn current_tick(&self, now: f64) -> i64 {
        self.state.current_tick(now)
    }

    pub fn phase_ms(&self, now: f64) -> f64 {
        self.state.phase_ms(now)
    }

    #[inline]
    pub fn dropped_triggers(&self) -> u64 {
        self.state.dropped_triggers
    }

    pub fn last_report(&self) -> PassReport {
        self.last_report
    }

    pub fn readback(&self, now: f64) -> EngineReadback {
        EngineReadback {
            running: self.state.is_running(),
            tempo: self.state.clock.tempo(),
            cycle_seconds: self.state.cycle_seconds,
            current_tick: if self.state.is_running() {
                self.state.current_tick(now)
            } else {
                self.state.last_scheduled_tick
            },
            phase_ms: self.state.phase_ms(now),
            dropped_triggers: self.state.dropped_triggers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{RecordingSink, VoiceCommand};

    fn transport() -> Transport<f64, RecordingSink<f64>> {
        let mut t = Transport::new(TransportConfig::default(), 4.0, RecordingSink::new());
        t.set_layers(vec![LayerConfig::new(4, vec![1.0, 2.0, 3.0, 4.0])]);
        t
    }

    #[test]
    fn test_poll_before_start_does_nothing() {
        let mut t = transport();
        assert_eq!(t.poll(0.0), Ok(None));
        assert!(t.voices().commands().is_empty());
    }

    #[test]
    fn test_no_pass_after_stop() {
        let mut t = transport();
        t.start(0.0, 0.0);
        assert!(t.poll(0.0).unwrap().is_some());
        let before = t.voices().commands().len();

        t.stop(0.01);
        for i in 1..100 {
            assert_eq!(t.poll(i as f64 * 0.025), Ok(None));
        }
        assert_eq!(t.voices().commands().len(), before);
        assert!(!t.readback(1.0).running);
    }

    #[test]
    fn test_publishes_phase_changes() {
        let mut t = transport();
        let rx = t.subscribe();

        t.start(1000.0, 2.0);
        t.change_tempo(2.0, None, 2.5);

        let start = rx.try_recv().unwrap();
        assert_eq!(start.phase_ms, 1000.0);
        assert_eq!(start.cycle_duration_ms, 4000.0);

        let retune = rx.try_recv().unwrap();
        assert_eq!(retune.tempo, 2.0);
        assert!((retune.phase_ms - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let mut t = transport();
        drop(t.subscribe());
        let _kept = t.subscribe();
        t.start(0.0, 0.0);
        assert_eq!(t.listeners.len(), 1);
    }

    #[test]
    fn test_retune_restarts_pass_loop() {
        let mut t = transport();
        t.start(0.0, 0.0);
        t.poll(0.0).unwrap();

        // Not due yet by the timer, but the retune forces an immediate pass
        t.change_cycle_duration(8.0, 0.01);
        let report = t.poll(0.01).unwrap().expect("pass");
        assert_eq!(report.window_start, t.state().clock().start_tick());
    }

    #[test]
    fn test_legato_releases_bridge() {
        let mut t = transport();
        t.start(0.0, 0.0);
        t.poll(0.0).unwrap();
        t.poll(1.09).unwrap();

        // Last note at tick 1000; retune at tick 1100
        t.change_tempo(1.0, None, 1.1);
        assert!(t.state().bridge(0).is_some());

        t.set_legato(true, 1.15);
        assert!(t.state().bridge(0).is_none());
        assert!(matches!(
            t.voices().commands().last(),
            Some(VoiceCommand::BridgeRelease { layer: 0, .. })
        ));
    }

    #[test]
    fn test_set_layer_keeps_others() {
        let mut t = transport();
        t.set_layer(2, LayerConfig::new(3, vec![9.0]));
        t.set_layer(7, LayerConfig::new(3, vec![9.0]));

        let compiled = t.state().compiled();
        assert_eq!(compiled.layer(0).len(), 4);
        assert_eq!(compiled.layer(2).len(), 3);
        assert!(compiled.is_silent(1));
    }

    #[test]
    fn test_seek_keeps_tempo() {
        let mut t = transport();
        t.start(0.0, 0.0);
        t.change_tempo(1.5, None, 0.0);

        let change = t.seek(3000.0, 1.0);
        assert_eq!(change.tempo, 1.5);
        assert_eq!(t.current_tick(1.0), 3000);
    }
}
