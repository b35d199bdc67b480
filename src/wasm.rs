//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! The browser owns both the timer and the voices: JS calls `poll` from a
//! `setInterval` with `audioContext.currentTime`, and plays the returned
//! voice records on its own synths.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { collider_init, ColliderTransport } from './collider.js';
//!
//! await init();
//! collider_init();
//!
//! const transport = new ColliderTransport(4.0);
//! transport.set_layer(0, 4, new Float64Array([220, 330, 440, 550]));
//! transport.start(0, ctx.currentTime);
//!
//! setInterval(() => {
//!   const records = transport.poll(ctx.currentTime);
//!   for (let i = 0; i < records.length; i += 7) playRecord(records.subarray(i, i + 7));
//! }, 25);
//! ```

use wasm_bindgen::prelude::*;

use crate::config::TransportConfig;
use crate::state::{EngineReadback, LayerConfig};
use crate::transport::Transport;
use crate::voice::{RECORD_LEN, RecordingSink};

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn collider_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

/// Number of f64 values per voice record returned by `poll`.
#[wasm_bindgen]
pub fn collider_record_len() -> u32 {
    RECORD_LEN as u32
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Timing configuration for a transport.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct ColliderConfig {
    /// Ticks per second at tempo 1.0.
    pub ticks_per_second: f64,
    /// Scheduling window ahead of now, in seconds.
    pub lookahead_seconds: f64,
    /// Expected spacing of `poll` calls, in seconds.
    pub poll_interval_seconds: f64,
}

#[wasm_bindgen]
impl ColliderConfig {
    /// Create a new configuration with default values.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with custom values.
    pub fn with_values(
        ticks_per_second: f64,
        lookahead_seconds: f64,
        poll_interval_seconds: f64,
    ) -> Self {
        Self {
            ticks_per_second,
            lookahead_seconds,
            poll_interval_seconds,
        }
    }
}

impl Default for ColliderConfig {
    fn default() -> Self {
        let config = TransportConfig::default();
        Self {
            ticks_per_second: config.ticks_per_second,
            lookahead_seconds: config.lookahead_seconds,
            poll_interval_seconds: config.poll_interval_seconds,
        }
    }
}

impl From<ColliderConfig> for TransportConfig {
    fn from(c: ColliderConfig) -> Self {
        TransportConfig::with_values(
            c.ticks_per_second,
            c.lookahead_seconds,
            c.poll_interval_seconds,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Readback Data
// ═══════════════════════════════════════════════════════════════════════════

/// Transport state for UI displays.
#[wasm_bindgen]
#[derive(Clone, Copy, Default)]
pub struct ColliderReadback {
    pub running: bool,
    pub tempo: f64,
    pub cycle_seconds: f64,
    pub current_tick: f64,
    pub phase_ms: f64,
    pub dropped_triggers: f64,
}

impl From<EngineReadback> for ColliderReadback {
    fn from(r: EngineReadback) -> Self {
        Self {
            running: r.running,
            tempo: r.tempo,
            cycle_seconds: r.cycle_seconds,
            current_tick: r.current_tick as f64,
            phase_ms: r.phase_ms,
            dropped_triggers: r.dropped_triggers as f64,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Transport
// ═══════════════════════════════════════════════════════════════════════════

/// Polyrhythm transport. Notes are frequencies (or any f64 payload).
#[wasm_bindgen]
pub struct ColliderTransport {
    inner: Transport<f64, RecordingSink<f64>>,
}

#[wasm_bindgen]
impl ColliderTransport {
    /// Create a transport with default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(cycle_seconds: f64) -> ColliderTransport {
        Self::new_with_config(cycle_seconds, ColliderConfig::default())
    }

    /// Create a transport with custom configuration.
    pub fn new_with_config(cycle_seconds: f64, config: ColliderConfig) -> ColliderTransport {
        ColliderTransport {
            inner: Transport::new(config.into(), cycle_seconds, RecordingSink::new()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    pub fn start(&mut self, phase_ms: f64, now: f64) {
        self.inner.start(phase_ms, now);
    }

    pub fn stop(&mut self, now: f64) {
        self.inner.stop(now);
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Retune
    // ─────────────────────────────────────────────────────────────────────────

    pub fn change_cycle_duration(&mut self, seconds: f64, now: f64) {
        self.inner.change_cycle_duration(seconds, now);
    }

    /// Change tempo. Pass `undefined` for `phase_ms` to keep the current phase.
    pub fn change_tempo(&mut self, tempo: f64, phase_ms: Option<f64>, now: f64) {
        self.inner.change_tempo(tempo, phase_ms, now);
    }

    pub fn seek(&mut self, phase_ms: f64, now: f64) {
        self.inner.seek(phase_ms, now);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rhythm data
    // ─────────────────────────────────────────────────────────────────────────

    /// Set one layer's pulse count and notes.
    pub fn set_layer(&mut self, index: u32, divisor: u32, notes: Vec<f64>) {
        self.inner
            .set_layer(index as usize, LayerConfig::new(divisor, notes));
    }

    pub fn recompile_layer_events(&mut self) {
        self.inner.recompile_layer_events();
    }

    pub fn set_legato(&mut self, legato: bool, now: f64) {
        self.inner.set_legato(legato, now);
    }

    pub fn set_full_scale(&mut self, full_scale: bool, now: f64) {
        self.inner.set_full_scale(full_scale, now);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a pass if due and return every voice command produced since the
    /// last call, flattened into records of `collider_record_len()` values.
    ///
    /// Bridge commands from retunes are included.
    pub fn poll(&mut self, now: f64) -> Result<Vec<f64>, JsError> {
        self.inner
            .poll(now)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(self.drain_records())
    }

    /// Voice commands produced outside `poll` (retunes, stop).
    pub fn drain_records(&mut self) -> Vec<f64> {
        self.inner
            .voices_mut()
            .drain()
            .flat_map(|cmd| cmd.to_record())
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Readback
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_readback(&self, now: f64) -> ColliderReadback {
        self.inner.readback(now).into()
    }

    pub fn get_tempo(&self) -> f64 {
        self.inner.tempo()
    }

    pub fn get_cycle_seconds(&self) -> f64 {
        self.inner.cycle_seconds()
    }

    pub fn get_phase_ms(&self, now: f64) -> f64 {
        self.inner.phase_ms(now)
    }
}
