// src/event.rs

/// Number of independent rhythm layers.
pub const LAYER_COUNT: usize = 4;

/// ===============================
/// Compiled layer events
/// ===============================

/// One note of a layer, positioned inside a single cycle.
///
/// These events:
/// - are produced only by the compiler
/// - are immutable once compiled
/// - repeat every `cycle_ticks`
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEvent<N> {
    /// Offset from cycle start, `0 <= start_tick < cycle_ticks`
    pub start_tick: i64,

    /// Nominal length, at least 1
    pub duration_ticks: i64,

    /// Position of this note in the layer's pulse sequence
    pub note_index: usize,

    /// Opaque payload forwarded to the voice system
    pub note: N,
}

/// ===============================
/// Outbound voice payloads
/// ===============================

/// A due note occurrence handed to the voice system.
#[derive(Debug)]
pub struct NoteTrigger<'a, N> {
    pub note: &'a N,

    /// Nominal length at the current tempo
    pub duration_seconds: f64,

    pub layer: usize,

    /// Pulse count of the layer this note belongs to
    pub divisor: u32,

    pub note_index: usize,

    /// Device time the note must start at
    pub start_time: f64,

    /// Absolute tick of this occurrence
    pub tick: i64,
}

/// Request to hold a layer's last note until `release_time`.
#[derive(Debug)]
pub struct BridgeStart<'a, N> {
    pub layer: usize,
    pub note: &'a N,
    pub start_time: f64,
    pub release_tick: i64,
    pub release_time: f64,
}

/// ===============================
/// Listener notifications
/// ===============================

/// Broadcast after start, retune and seek so that visualizations can
/// resynchronize with the audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseChange {
    pub cycle_duration_ms: f64,
    pub tempo: f64,
    pub phase_ms: f64,
}
