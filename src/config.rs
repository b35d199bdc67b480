// src/config.rs
//
// Transport timing configuration.

/// Default tick rate. Ticks are tempo-independent.
pub const DEFAULT_TICKS_PER_SECOND: f64 = 1000.0;

/// Default forward window the scheduler fills on each pass.
pub const DEFAULT_LOOKAHEAD_SECONDS: f64 = 0.1;

/// Default wall-clock spacing between scheduler passes.
pub const DEFAULT_POLL_INTERVAL_SECONDS: f64 = 0.025;

pub const MIN_CYCLE_SECONDS: f64 = 0.25;
pub const MAX_CYCLE_SECONDS: f64 = 600.0;

/// Tempo multipliers at or below zero are raised to this.
pub const MIN_TEMPO: f64 = 0.0001;
pub const MAX_TEMPO: f64 = 64.0;

/// Static timing configuration for a [`Transport`](crate::Transport).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportConfig {
    /// Ticks per second at tempo 1.0.
    pub ticks_per_second: f64,

    /// How far ahead of "now" each pass schedules, in seconds.
    pub lookahead_seconds: f64,

    /// Wall-clock spacing between passes, in seconds.
    pub poll_interval_seconds: f64,

    pub min_cycle_seconds: f64,
    pub max_cycle_seconds: f64,

    pub min_tempo: f64,
    pub max_tempo: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            lookahead_seconds: DEFAULT_LOOKAHEAD_SECONDS,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            min_cycle_seconds: MIN_CYCLE_SECONDS,
            max_cycle_seconds: MAX_CYCLE_SECONDS,
            min_tempo: MIN_TEMPO,
            max_tempo: MAX_TEMPO,
        }
    }
}

impl TransportConfig {
    /// Create a configuration with custom tick rate and window sizes.
    pub fn with_values(
        ticks_per_second: f64,
        lookahead_seconds: f64,
        poll_interval_seconds: f64,
    ) -> Self {
        Self {
            ticks_per_second,
            lookahead_seconds,
            poll_interval_seconds,
            ..Self::default()
        }
    }

    /// Return a copy with every field forced into a usable range.
    ///
    /// The lookahead is raised to at least one polling interval so that
    /// consecutive passes never leave a gap.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let mut out = self;

        if !(out.ticks_per_second.is_finite() && out.ticks_per_second >= 1.0) {
            log::warn!(
                "ticks_per_second {} out of range, using {}",
                out.ticks_per_second,
                defaults.ticks_per_second
            );
            out.ticks_per_second = defaults.ticks_per_second;
        }

        if !(out.poll_interval_seconds.is_finite() && out.poll_interval_seconds > 0.0) {
            log::warn!(
                "poll_interval_seconds {} out of range, using {}",
                out.poll_interval_seconds,
                defaults.poll_interval_seconds
            );
            out.poll_interval_seconds = defaults.poll_interval_seconds;
        }

        if !out.lookahead_seconds.is_finite() || out.lookahead_seconds < out.poll_interval_seconds
        {
            log::warn!(
                "lookahead_seconds {} shorter than poll interval, raising to {}",
                out.lookahead_seconds,
                out.poll_interval_seconds
            );
            out.lookahead_seconds = out.poll_interval_seconds;
        }

        if !(out.min_tempo.is_finite() && out.min_tempo > 0.0) {
            out.min_tempo = defaults.min_tempo;
        }
        if !(out.max_tempo.is_finite() && out.max_tempo >= out.min_tempo) {
            out.max_tempo = defaults.max_tempo.max(out.min_tempo);
        }

        if !(out.min_cycle_seconds.is_finite() && out.min_cycle_seconds > 0.0) {
            out.min_cycle_seconds = defaults.min_cycle_seconds;
        }
        if !(out.max_cycle_seconds.is_finite() && out.max_cycle_seconds >= out.min_cycle_seconds) {
            out.max_cycle_seconds = defaults.max_cycle_seconds.max(out.min_cycle_seconds);
        }

        out
    }

    /// Clamp a tempo multiplier into `[min_tempo, max_tempo]`.
    ///
    /// NaN maps to 1.0.
    pub fn clamp_tempo(&self, tempo: f64) -> f64 {
        if tempo.is_nan() {
            log::warn!("tempo multiplier is NaN, using 1.0");
            return 1.0_f64.clamp(self.min_tempo, self.max_tempo);
        }
        let clamped = tempo.clamp(self.min_tempo, self.max_tempo);
        if clamped != tempo {
            log::warn!("tempo multiplier {} clamped to {}", tempo, clamped);
        }
        clamped
    }

    /// Clamp a cycle duration into `[min_cycle_seconds, max_cycle_seconds]`.
    pub fn clamp_cycle_seconds(&self, seconds: f64) -> f64 {
        if seconds.is_nan() {
            log::warn!("cycle duration is NaN, using minimum");
            return self.min_cycle_seconds;
        }
        let clamped = seconds.clamp(self.min_cycle_seconds, self.max_cycle_seconds);
        if clamped != seconds {
            log::warn!("cycle duration {}s clamped to {}s", seconds, clamped);
        }
        clamped
    }

    /// Ticks in one cycle of the given duration. Always at least 1.
    #[inline]
    pub fn cycle_ticks_for(&self, seconds: f64) -> i64 {
        ((seconds * self.ticks_per_second).round() as i64).max(1)
    }
}
