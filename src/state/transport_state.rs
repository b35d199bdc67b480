// src/state/transport_state.rs
//
// The single mutable record shared by the scheduler, the retune controller
// and the sustain bridge.

use crate::clock::TickClock;
use crate::compile::{CompiledLayers, compile};
use crate::config::TransportConfig;
use crate::event::{LAYER_COUNT, PhaseChange};
use crate::scheduler::SchedulerError;

use super::{BridgeVoice, LayerConfig, PlayHistory};

/// Whether scheduler passes may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// Timing, cycle and layer state for one transport.
///
/// Fields are crate-private: only the transport entry points mutate them,
/// and each entry point finishes all related updates before returning.
#[derive(Debug)]
pub struct TransportState<N> {
    pub(crate) config: TransportConfig,

    pub(crate) clock: TickClock,

    /// User-facing cycle length, seconds at tempo 1.0
    pub(crate) cycle_seconds: f64,

    /// Derived: round(cycle_seconds * ticks_per_second), at least 1
    pub(crate) cycle_ticks: i64,

    pub(crate) layers: [LayerConfig<N>; LAYER_COUNT],

    pub(crate) compiled: CompiledLayers<N>,

    /// Exclusive upper bound of everything already scheduled
    pub(crate) last_scheduled_tick: i64,

    pub(crate) run_state: RunState,

    pub(crate) legato: bool,

    pub(crate) full_scale: bool,

    pub(crate) history: PlayHistory<N>,

    pub(crate) bridges: [Option<BridgeVoice<N>>; LAYER_COUNT],

    pub(crate) dropped_triggers: u64,
}

impl<N: Clone> TransportState<N> {
    pub fn new(config: TransportConfig, cycle_seconds: f64) -> Self {
        let config = config.sanitized();
        let cycle_seconds = config.clamp_cycle_seconds(cycle_seconds);
        let cycle_ticks = config.cycle_ticks_for(cycle_seconds);

        Self {
            config,
            clock: TickClock::new(config.ticks_per_second),
            cycle_seconds,
            cycle_ticks,
            layers: std::array::from_fn(|_| LayerConfig::silent()),
            compiled: CompiledLayers::empty(cycle_ticks),
            last_scheduled_tick: 0,
            run_state: RunState::Stopped,
            legato: false,
            full_scale: true,
            history: PlayHistory::default(),
            bridges: std::array::from_fn(|_| None),
            dropped_triggers: 0,
        }
    }

    // -------------------------------
    // MARK: Crate-internal mutators
    // -------------------------------

    /// Set the cycle length and everything derived from it.
    pub(crate) fn set_cycle_seconds(&mut self, seconds: f64) {
        self.cycle_seconds = self.config.clamp_cycle_seconds(seconds);
        self.cycle_ticks = self.config.cycle_ticks_for(self.cycle_seconds);
        self.recompile();
    }

    pub(crate) fn set_layers(&mut self, layers: Vec<LayerConfig<N>>) {
        if layers.len() > LAYER_COUNT {
            log::warn!(
                "{} layers supplied, keeping the first {}",
                layers.len(),
                LAYER_COUNT
            );
        }
        let mut incoming = layers.into_iter();
        self.layers = std::array::from_fn(|_| incoming.next().unwrap_or_else(LayerConfig::silent));
        self.recompile();
    }

    /// Rebuild every layer's event list for the current cycle.
    pub(crate) fn recompile(&mut self) {
        self.compiled = compile(self.cycle_ticks, &self.layers);
    }

    /// Check the invariants every tick/time conversion relies on.
    pub(crate) fn ensure_consistent(&self) -> Result<(), SchedulerError> {
        if self.cycle_ticks < 1
            || self.compiled.cycle_ticks() != self.cycle_ticks
            || !self.clock.is_consistent()
        {
            return Err(SchedulerError::AnchorInconsistent {
                cycle_ticks: self.cycle_ticks,
                seconds_per_tick: self.clock.seconds_per_tick(),
            });
        }
        Ok(())
    }
}

impl<N> TransportState<N> {
    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    #[inline]
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    #[inline]
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    #[inline]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    #[inline]
    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    #[inline]
    pub fn cycle_seconds(&self) -> f64 {
        self.cycle_seconds
    }

    #[inline]
    pub fn cycle_ticks(&self) -> i64 {
        self.cycle_ticks
    }

    #[inline]
    pub fn compiled(&self) -> &CompiledLayers<N> {
        &self.compiled
    }

    pub fn layers(&self) -> &[LayerConfig<N>] {
        &self.layers
    }

    #[inline]
    pub fn last_scheduled_tick(&self) -> i64 {
        self.last_scheduled_tick
    }

    #[inline]
    pub fn legato(&self) -> bool {
        self.legato
    }

    #[inline]
    pub fn full_scale(&self) -> bool {
        self.full_scale
    }

    pub fn bridge(&self, layer: usize) -> Option<&BridgeVoice<N>> {
        self.bridges.get(layer)?.as_ref()
    }

    pub fn history(&self) -> &PlayHistory<N> {
        &self.history
    }

    #[inline]
    pub fn dropped_triggers(&self) -> u64 {
        self.dropped_triggers
    }

    // -------------------------------
    // MARK: Phase
    // -------------------------------

    /// Absolute tick sounding at `now`.
    #[inline]
    pub fn current_tick(&self, now: f64) -> i64 {
        self.clock.time_to_abs_tick(now)
    }

    /// Position inside the cycle at `now`, in ticks. 0 when stopped.
    pub fn phase_ticks(&self, now: f64) -> i64 {
        if !self.is_running() {
            return 0;
        }
        self.current_tick(now).rem_euclid(self.cycle_ticks.max(1))
    }

    /// Position inside the cycle at `now`, in milliseconds at tempo 1.0.
    pub fn phase_ms(&self, now: f64) -> f64 {
        self.clock.ticks_to_ms(self.phase_ticks(now))
    }

    /// Snapshot for phase listeners.
    pub fn phase_change(&self, now: f64) -> PhaseChange {
        PhaseChange {
            cycle_duration_ms: self.cycle_seconds * 1000.0,
            tempo: self.clock.tempo(),
            phase_ms: self.phase_ms(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_stopped_and_silent() {
        let state: TransportState<f64> = TransportState::new(TransportConfig::default(), 4.0);

        assert_eq!(state.run_state(), RunState::Stopped);
        assert_eq!(state.cycle_ticks(), 4000);
        assert!((0..LAYER_COUNT).all(|i| state.compiled().is_silent(i)));
        assert!(state.ensure_consistent().is_ok());
    }

    #[test]
    fn test_cycle_change_recompiles() {
        let mut state = TransportState::new(TransportConfig::default(), 4.0);
        state.set_layers(vec![LayerConfig::new(4, vec![1.0_f64])]);
        assert_eq!(state.compiled().layer(0)[1].start_tick, 1000);

        state.set_cycle_seconds(2.0);
        assert_eq!(state.cycle_ticks(), 2000);
        assert_eq!(state.compiled().cycle_ticks(), 2000);
        assert_eq!(state.compiled().layer(0)[1].start_tick, 500);
    }

    #[test]
    fn test_out_of_range_cycle_is_clamped() {
        let mut state: TransportState<f64> = TransportState::new(TransportConfig::default(), 4.0);
        state.set_cycle_seconds(-3.0);
        assert_eq!(state.cycle_seconds(), state.config().min_cycle_seconds);
        assert!(state.cycle_ticks() >= 1);
    }

    #[test]
    fn test_extra_layers_are_dropped() {
        let mut state = TransportState::new(TransportConfig::default(), 4.0);
        state.set_layers((2..8).map(|d| LayerConfig::new(d, vec![0u8])).collect());
        assert_eq!(state.layers().len(), LAYER_COUNT);
        assert_eq!(state.layers()[3].divisor, 5);
    }

    #[test]
    fn test_phase_is_zero_when_stopped() {
        let state: TransportState<f64> = TransportState::new(TransportConfig::default(), 4.0);
        assert_eq!(state.phase_ms(123.0), 0.0);
        assert_eq!(state.phase_change(123.0).cycle_duration_ms, 4000.0);
    }
}
