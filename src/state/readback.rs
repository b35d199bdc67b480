// src/state/readback.rs

/// Read-only transport state for UI display.
///
/// This is published by the scheduler side and read by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineReadback {
    /// Whether passes are running.
    pub running: bool,

    /// Current tempo multiplier.
    pub tempo: f64,

    /// Current cycle length in seconds.
    pub cycle_seconds: f64,

    /// Absolute tick at the last poll.
    pub current_tick: i64,

    /// Position in the cycle at the last poll, in milliseconds.
    pub phase_ms: f64,

    /// Voice triggers dropped because the voice system failed them.
    pub dropped_triggers: u64,
}
