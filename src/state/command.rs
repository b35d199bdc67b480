// Commands from UI to the transport.
//
// Commands are the ONLY way the UI can mutate transport state.
// They are queued and applied on the scheduler thread before the next pass.

use super::LayerConfig;

/// A command from the UI to the transport.
///
/// Commands are:
/// - Immutable once created
/// - Processed in order by the engine bridge
/// - Applied atomically (all-or-nothing)
#[derive(Debug, Clone)]
pub enum Command<N> {
    // ═══════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════
    /// Start playback at a phase offset within the cycle.
    Start { phase_ms: f64 },

    /// Stop playback.
    Stop,

    // ═══════════════════════════════════════════
    // Retune
    // ═══════════════════════════════════════════
    /// Change the cycle length in seconds.
    ChangeCycleDuration { seconds: f64 },

    /// Change the tempo multiplier, optionally at an explicit phase.
    ChangeTempo { tempo: f64, phase_ms: Option<f64> },

    /// Jump to a phase without changing tempo.
    Seek { phase_ms: f64 },

    // ═══════════════════════════════════════════
    // Rhythm data
    // ═══════════════════════════════════════════
    /// Replace the per-layer pulse counts and note arrays.
    SetLayers { layers: Vec<LayerConfig<N>> },

    /// Rebuild the compiled event lists from the current layers.
    RecompileLayerEvents,

    // ═══════════════════════════════════════════
    // Voicing mode
    // ═══════════════════════════════════════════
    SetLegato { legato: bool },

    /// Whether the whole note scale is selected (no deselected notes).
    SetFullScale { full_scale: bool },
}
