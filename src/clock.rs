// src/clock.rs
//
// Tick clock: device time <-> absolute tick under a live tempo multiplier.

use crate::config::MIN_TEMPO;

/// Fraction of a tick absorbed before flooring, so that converting a tick
/// to a time and back lands on the same tick despite float error.
const TICK_EPSILON: f64 = 1e-6;

/// Translates audio-device time (seconds) into absolute ticks.
///
/// This struct:
/// - is copyable
/// - holds a single anchor (`start_tick` at `start_time`)
/// - is only mutated by the transport entry points
///
/// Absolute ticks are meaningful only relative to the current anchor.
/// A re-anchor (retune, seek) keeps the cycle phase, not the tick count.
#[derive(Debug, Copy, Clone)]
pub struct TickClock {
    /// Ticks per second at tempo 1.0
    ticks_per_second: f64,

    /// Live tempo multiplier (> 0)
    tempo: f64,

    /// Derived: 1 / (ticks_per_second * tempo)
    seconds_per_tick: f64,

    /// Absolute tick at the anchor
    start_tick: i64,

    /// Device time at the anchor, in seconds
    start_time: f64,
}

impl TickClock {
    pub fn new(ticks_per_second: f64) -> Self {
        let mut clock = Self {
            ticks_per_second,
            tempo: 1.0,
            seconds_per_tick: 0.0,
            start_tick: 0,
            start_time: 0.0,
        };
        clock.recompute();
        clock
    }

    // -------------------------------
    // MARK: Anchoring
    // -------------------------------

    /// Pin the anchor to `now` at the tick matching `start_phase_ms`
    /// within a cycle of `cycle_ticks`.
    ///
    /// Returns the anchored tick.
    pub fn configure(&mut self, start_phase_ms: f64, cycle_ticks: i64, now: f64) -> i64 {
        let tick = self.phase_ms_to_tick(start_phase_ms).rem_euclid(cycle_ticks.max(1));
        self.anchor(tick, now);
        tick
    }

    /// Re-anchor so that `tick` sounds at device time `time`.
    #[inline]
    pub fn anchor(&mut self, tick: i64, time: f64) {
        self.start_tick = tick;
        self.start_time = time;
    }

    // -------------------------------
    // MARK: Conversions
    // -------------------------------

    /// Absolute tick at device time `time`.
    ///
    /// Floors after adding 1e-6 tick, so a time computed from an integer
    /// tick maps back to that tick despite float error. A time up to 1e-6
    /// tick before a boundary therefore already reads as the next tick.
    ///
    /// Monotonic non-decreasing in `time` for a fixed anchor.
    #[inline]
    pub fn time_to_abs_tick(&self, time: f64) -> i64 {
        let elapsed = (time - self.start_time) / self.seconds_per_tick;
        self.start_tick + (elapsed + TICK_EPSILON).floor() as i64
    }

    /// Device time at which `abs_tick` sounds.
    #[inline]
    pub fn abs_tick_to_time(&self, abs_tick: i64) -> f64 {
        self.start_time + (abs_tick - self.start_tick) as f64 * self.seconds_per_tick
    }

    /// Tick offset for a phase expressed in milliseconds at tempo 1.0.
    #[inline]
    pub fn phase_ms_to_tick(&self, phase_ms: f64) -> i64 {
        if !phase_ms.is_finite() {
            return 0;
        }
        (phase_ms / 1000.0 * self.ticks_per_second).round() as i64
    }

    /// Milliseconds (at tempo 1.0) covered by `ticks`.
    #[inline]
    pub fn ticks_to_ms(&self, ticks: i64) -> f64 {
        ticks as f64 / self.ticks_per_second * 1000.0
    }

    /// Wall-clock seconds covered by `ticks` at the current tempo.
    #[inline]
    pub fn ticks_to_seconds(&self, ticks: i64) -> f64 {
        ticks as f64 * self.seconds_per_tick
    }

    // -------------------------------
    // MARK: Tempo
    // -------------------------------

    /// Set the tempo multiplier. Values at or below zero fall back to
    /// [`MIN_TEMPO`].
    pub fn set_tempo(&mut self, tempo: f64) {
        self.tempo = if tempo.is_finite() && tempo > 0.0 {
            tempo.max(MIN_TEMPO)
        } else {
            MIN_TEMPO
        };
        self.recompute();
    }

    fn recompute(&mut self) {
        self.seconds_per_tick = 1.0 / (self.ticks_per_second * self.tempo);
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    #[inline]
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    #[inline]
    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    #[inline]
    pub fn seconds_per_tick(&self) -> f64 {
        self.seconds_per_tick
    }

    #[inline]
    pub fn start_tick(&self) -> i64 {
        self.start_tick
    }

    #[inline]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// `seconds_per_tick` is finite and positive.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.seconds_per_tick.is_finite() && self.seconds_per_tick > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_integer_ticks() {
        let mut clock = TickClock::new(1000.0);
        clock.set_tempo(1.37);
        clock.anchor(1234, 17.25);

        for t in -500..5000 {
            let time = clock.abs_tick_to_time(t);
            assert_eq!(clock.time_to_abs_tick(time), t, "tick {t}");
        }
    }

    #[test]
    fn test_boundary_tolerance_is_one_microtick() {
        let mut clock = TickClock::new(1000.0);
        clock.anchor(0, 0.0);

        // 1 ms per tick: 0.5e-9 s is half a microtick, 2e-9 s is two
        assert_eq!(clock.time_to_abs_tick(1.0 - 0.5e-9), 1000);
        assert_eq!(clock.time_to_abs_tick(1.0 - 2e-9), 999);
        assert_eq!(clock.time_to_abs_tick(1.0), 1000);
    }

    #[test]
    fn test_monotonic_in_time() {
        let mut clock = TickClock::new(1000.0);
        clock.set_tempo(0.73);
        clock.anchor(10, 3.0);

        let mut last = clock.time_to_abs_tick(3.0);
        for i in 0..10_000 {
            let tick = clock.time_to_abs_tick(3.0 + i as f64 * 0.000_37);
            assert!(tick >= last);
            last = tick;
        }
    }

    #[test]
    fn test_configure_wraps_phase() {
        let mut clock = TickClock::new(1000.0);
        assert_eq!(clock.configure(2000.0, 4000, 5.0), 2000);
        assert_eq!(clock.start_time(), 5.0);
        assert_eq!(clock.configure(9000.0, 4000, 5.0), 1000);
        assert_eq!(clock.configure(-1000.0, 4000, 5.0), 3000);
    }

    #[test]
    fn test_tempo_scales_seconds_per_tick() {
        let mut clock = TickClock::new(1000.0);
        clock.set_tempo(2.0);
        assert!((clock.seconds_per_tick() - 0.0005).abs() < 1e-12);
        assert_eq!(clock.time_to_abs_tick(1.0), 2000);
    }

    #[test]
    fn test_non_positive_tempo_is_clamped() {
        let mut clock = TickClock::new(1000.0);
        clock.set_tempo(0.0);
        assert_eq!(clock.tempo(), MIN_TEMPO);
        clock.set_tempo(-5.0);
        assert_eq!(clock.tempo(), MIN_TEMPO);
        assert!(clock.is_consistent());
    }
}
