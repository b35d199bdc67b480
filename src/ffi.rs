// C-compatible FFI bindings for Swift/iOS integration.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - Caller must call the corresponding _destroy function for each _create
//
// The session handle is used from the UI thread; the engine handle from
// whichever thread runs the scheduling timer.

use log::{LevelFilter, debug, error, info, warn};
use oslog::OsLogger;

use crate::bridge::{EngineHandle, SessionHandle, create_bridge};
use crate::config::TransportConfig;
use crate::event::LAYER_COUNT;
use crate::state::{Command, EngineReadback, LayerConfig};
use crate::transport::Transport;
use crate::voice::{RECORD_LEN, RecordingSink};

// Logger subsystem identifier
const LOG_SUBSYSTEM: &str = "com.collider.transport";

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup, before any other FFI function. Log
/// output appears in Console.app and Xcode's debug console.
#[unsafe(no_mangle)]
pub extern "C" fn collider_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to the SessionHandle (UI-side).
pub struct ColliderSession {
    inner: SessionHandle<f64>,
}

/// Opaque handle to the EngineHandle (timer-side).
pub struct ColliderEngine {
    inner: EngineHandle<f64, RecordingSink<f64>>,
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Result Types
// ═══════════════════════════════════════════════════════════════════════════

/// Timing configuration.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ColliderConfig {
    pub ticks_per_second: f64,
    pub lookahead_seconds: f64,
    pub poll_interval_seconds: f64,
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

/// Transport state for UI displays.
#[repr(C)]
pub struct ColliderReadback {
    pub running: bool,
    pub tempo: f64,
    pub cycle_seconds: f64,
    pub current_tick: i64,
    pub phase_ms: f64,
    pub dropped_triggers: u64,
}

impl From<EngineReadback> for ColliderReadback {
    fn from(r: EngineReadback) -> Self {
        Self {
            running: r.running,
            tempo: r.tempo,
            cycle_seconds: r.cycle_seconds,
            current_tick: r.current_tick,
            phase_ms: r.phase_ms,
            dropped_triggers: r.dropped_triggers,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

/// Get the default configuration values.
#[unsafe(no_mangle)]
pub extern "C" fn collider_default_config() -> ColliderConfig {
    ColliderConfig::default()
}

/// Number of f64 values per voice record written by `engine_poll`.
#[unsafe(no_mangle)]
pub extern "C" fn collider_record_len() -> u32 {
    RECORD_LEN as u32
}

/// Create a session and engine pair.
///
/// Returns a session handle. The engine handle is returned via `out_engine`.
/// Both handles must be destroyed with their respective destroy functions.
///
/// # Safety
/// - `config` must be a valid pointer to a ColliderConfig or NULL for defaults
/// - `out_engine` must be a valid pointer to store the engine handle
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_create(
    cycle_seconds: f64,
    config: *const ColliderConfig,
    out_engine: *mut *mut ColliderEngine,
) -> *mut ColliderSession {
    let cfg = if config.is_null() {
        ColliderConfig::default()
    } else {
        unsafe { std::ptr::read(config) }
    };

    let transport = Transport::new(
        TransportConfig::with_values(
            cfg.ticks_per_second,
            cfg.lookahead_seconds,
            cfg.poll_interval_seconds,
        ),
        cycle_seconds,
        RecordingSink::new(),
    );
    let (session_handle, engine_handle) = create_bridge(transport);

    if out_engine.is_null() {
        warn!("session_create called without out_engine; engine dropped");
    } else {
        unsafe {
            *out_engine = Box::into_raw(Box::new(ColliderEngine {
                inner: engine_handle,
            }));
        }
    }

    info!("Collider session created ({}s cycle)", cycle_seconds);

    Box::into_raw(Box::new(ColliderSession {
        inner: session_handle,
    }))
}

/// Destroy a session handle.
///
/// # Safety
/// `session` must be a valid pointer returned by `session_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_destroy(session: *mut ColliderSession) {
    if !session.is_null() {
        unsafe { drop(Box::from_raw(session)) };
    }
}

/// Destroy an engine handle.
///
/// # Safety
/// `engine` must be a valid pointer returned via `session_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn engine_destroy(engine: *mut ColliderEngine) {
    if !engine.is_null() {
        unsafe { drop(Box::from_raw(engine)) };
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Session - Transport
// ═══════════════════════════════════════════════════════════════════════════

/// Start playback `phase_ms` into the cycle.
///
/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_start(session: *mut ColliderSession, phase_ms: f64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.start(phase_ms) };
}

/// Stop playback.
///
/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_stop(session: *mut ColliderSession) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.stop() };
}

/// Change the cycle length in seconds.
///
/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_change_cycle_duration(session: *mut ColliderSession, seconds: f64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.change_cycle_duration(seconds) };
}

/// Change the tempo multiplier.
///
/// A negative or NaN `phase_ms` keeps the current phase.
///
/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_change_tempo(
    session: *mut ColliderSession,
    tempo: f64,
    phase_ms: f64,
) {
    if session.is_null() {
        return;
    }
    let phase_ms = (phase_ms >= 0.0).then_some(phase_ms);
    unsafe { (*session).inner.change_tempo(tempo, phase_ms) };
}

/// Jump to a phase at the current tempo.
///
/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_seek(session: *mut ColliderSession, phase_ms: f64) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.seek(phase_ms) };
}

// ═══════════════════════════════════════════════════════════════════════════
// Session - Rhythm Data
// ═══════════════════════════════════════════════════════════════════════════

/// Replace all four layers.
///
/// `divisors` holds 4 pulse counts. `notes` holds `notes_len` notes per
/// layer back to back (4 * notes_len values); notes wrap per layer.
///
/// # Safety
/// - `divisors` must point to 4 u32 values
/// - `notes` must point to `4 * notes_len` f64 values, or be NULL when
///   `notes_len` is 0
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_set_layers(
    session: *mut ColliderSession,
    divisors: *const u32,
    notes: *const f64,
    notes_len: usize,
) {
    if session.is_null() || divisors.is_null() || (notes.is_null() && notes_len > 0) {
        error!("session_set_layers: null pointer");
        return;
    }

    let divisors = unsafe { std::slice::from_raw_parts(divisors, LAYER_COUNT) };
    let notes: &[f64] = if notes_len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(notes, LAYER_COUNT * notes_len) }
    };

    let layers = divisors
        .iter()
        .enumerate()
        .map(|(i, &divisor)| {
            let layer_notes = notes
                .get(i * notes_len..(i + 1) * notes_len)
                .unwrap_or(&[])
                .to_vec();
            LayerConfig::new(divisor, layer_notes)
        })
        .collect();

    debug!("session_set_layers: divisors {:?}", divisors);
    unsafe { (*session).inner.set_layers(layers) };
}

/// Rebuild compiled layer events.
///
/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_recompile_layer_events(session: *mut ColliderSession) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.send(Command::RecompileLayerEvents) };
}

/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_set_legato(session: *mut ColliderSession, legato: bool) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.set_legato(legato) };
}

/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_set_full_scale(session: *mut ColliderSession, full_scale: bool) {
    if session.is_null() {
        return;
    }
    unsafe { (*session).inner.set_full_scale(full_scale) };
}

// ═══════════════════════════════════════════════════════════════════════════
// Session - Readback
// ═══════════════════════════════════════════════════════════════════════════

/// Get the state published by the last engine poll.
///
/// # Safety
/// `session` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn session_get_readback(session: *const ColliderSession) -> ColliderReadback {
    if session.is_null() {
        return EngineReadback::default().into();
    }
    unsafe { (*session).inner.readback().into() }
}

// ═══════════════════════════════════════════════════════════════════════════
// Engine - Scheduling
// ═══════════════════════════════════════════════════════════════════════════

/// Apply pending commands, run a pass if due, and copy voice records out.
///
/// Writes whole records of `collider_record_len()` values into `out` and
/// returns how many records were written. Records that do not fit stay
/// queued for the next call. Returns -1 if the pass failed (the transport
/// has stopped itself).
///
/// # Safety
/// - `engine` must be a valid pointer
/// - `out` must point to `capacity` writable f64 values
#[unsafe(no_mangle)]
pub unsafe extern "C" fn engine_poll(
    engine: *mut ColliderEngine,
    now: f64,
    out: *mut f64,
    capacity: usize,
) -> i32 {
    if engine.is_null() || (out.is_null() && capacity > 0) {
        return 0;
    }
    let engine = unsafe { &mut (*engine).inner };

    if let Err(e) = engine.poll(now) {
        error!("engine_poll: {}", e);
        return -1;
    }

    let max_records = capacity / RECORD_LEN;
    if max_records == 0 {
        return 0;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(out, max_records * RECORD_LEN) };

    let mut written = 0;
    for (cmd, chunk) in engine
        .transport_mut()
        .voices_mut()
        .drain_up_to(max_records)
        .zip(out.chunks_exact_mut(RECORD_LEN))
    {
        chunk.copy_from_slice(&cmd.to_record());
        written += 1;
    }
    written
}

/// Stop the transport immediately, bypassing the command queue.
///
/// # Safety
/// `engine` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn engine_stop(engine: *mut ColliderEngine, now: f64) {
    if engine.is_null() {
        return;
    }
    unsafe { (*engine).inner.stop(now) };
}

/// Number of voice records waiting to be copied out.
///
/// # Safety
/// `engine` must be a valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn engine_pending_records(engine: *const ColliderEngine) -> u32 {
    if engine.is_null() {
        return 0;
    }
    unsafe { (*engine).inner.transport().voices().commands().len() as u32 }
}
