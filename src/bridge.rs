//! Thread-safe bridge between the UI and the scheduler thread.
//!
//! This module lets the UI thread drive a [`Transport`] that lives on
//! another thread (a driver thread, an audio callback).
//!
//! # Architecture
//!
//! - **UI thread** owns [`SessionHandle`]
//! - **Scheduler thread** owns [`EngineHandle`] with the [`Transport`]
//! - Communication uses MPSC channels for commands and atomics for readback
//!
//! # Usage
//!
//! ```ignore
//! let (session, engine) = create_bridge(transport);
//!
//! // UI thread: send commands
//! session.change_tempo(1.5, None);
//!
//! // Scheduler thread: apply commands and run due passes
//! engine.poll(clock.now())?;
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
    mpsc::{self, Receiver, Sender},
};

use crate::event::PhaseChange;
use crate::scheduler::{PassReport, SchedulerError};
use crate::state::{Command, EngineReadback, LayerConfig};
use crate::transport::Transport;
use crate::voice::VoiceSink;

/// Handle for the UI thread to control the transport.
///
/// All methods are non-blocking and safe to call from the main thread.
pub struct SessionHandle<N> {
    /// Channel to send commands to the scheduler thread.
    command_tx: Sender<Command<N>>,

    /// Shared readback state (written by the engine, read by the UI).
    readback: Arc<SharedReadback>,
}

/// Handle for the scheduler thread, owning the transport.
pub struct EngineHandle<N, V> {
    transport: Transport<N, V>,

    /// Channel to receive commands from the UI.
    command_rx: Receiver<Command<N>>,

    /// Shared readback state (written here).
    readback: Arc<SharedReadback>,
}

/// Lock-free shared state for engine -> UI readback.
///
/// f64 values are stored as bits (no AtomicF64 in std).
struct SharedReadback {
    running: AtomicBool,
    tempo_bits: AtomicU64,
    cycle_seconds_bits: AtomicU64,
    current_tick: AtomicI64,
    phase_ms_bits: AtomicU64,
    dropped_triggers: AtomicU64,
}

impl SharedReadback {
    fn new(initial: EngineReadback) -> Self {
        Self {
            running: AtomicBool::new(initial.running),
            tempo_bits: AtomicU64::new(initial.tempo.to_bits()),
            cycle_seconds_bits: AtomicU64::new(initial.cycle_seconds.to_bits()),
            current_tick: AtomicI64::new(initial.current_tick),
            phase_ms_bits: AtomicU64::new(initial.phase_ms.to_bits()),
            dropped_triggers: AtomicU64::new(initial.dropped_triggers),
        }
    }

    fn store(&self, readback: EngineReadback) {
        self.running.store(readback.running, Ordering::Relaxed);
        self.tempo_bits
            .store(readback.tempo.to_bits(), Ordering::Relaxed);
        self.cycle_seconds_bits
            .store(readback.cycle_seconds.to_bits(), Ordering::Relaxed);
        self.current_tick
            .store(readback.current_tick, Ordering::Relaxed);
        self.phase_ms_bits
            .store(readback.phase_ms.to_bits(), Ordering::Relaxed);
        self.dropped_triggers
            .store(readback.dropped_triggers, Ordering::Relaxed);
    }

    fn load(&self) -> EngineReadback {
        EngineReadback {
            running: self.running.load(Ordering::Relaxed),
            tempo: f64::from_bits(self.tempo_bits.load(Ordering::Relaxed)),
            cycle_seconds: f64::from_bits(self.cycle_seconds_bits.load(Ordering::Relaxed)),
            current_tick: self.current_tick.load(Ordering::Relaxed),
            phase_ms: f64::from_bits(self.phase_ms_bits.load(Ordering::Relaxed)),
            dropped_triggers: self.dropped_triggers.load(Ordering::Relaxed),
        }
    }
}

/// Create a linked pair of handles for UI and scheduler communication.
///
/// The transport is owned by the returned `EngineHandle`.
pub fn create_bridge<N, V>(transport: Transport<N, V>) -> (SessionHandle<N>, EngineHandle<N, V>) {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let readback = Arc::new(SharedReadback::new(transport.readback(0.0)));

    let session_handle = SessionHandle {
        command_tx: cmd_tx,
        readback: Arc::clone(&readback),
    };

    let engine_handle = EngineHandle {
        transport,
        command_rx: cmd_rx,
        readback,
    };

    (session_handle, engine_handle)
}

// ═══════════════════════════════════════════════════════════════════
// SessionHandle - UI Thread API
// ═══════════════════════════════════════════════════════════════════

impl<N> SessionHandle<N> {
    /// Send a command to the scheduler thread.
    ///
    /// Returns `false` if the engine side has been dropped.
    pub fn send(&self, cmd: Command<N>) -> bool {
        self.command_tx.send(cmd).is_ok()
    }

    /// Get the readback published after the last engine poll.
    pub fn readback(&self) -> EngineReadback {
        self.readback.load()
    }

    // ───────────────────────────────────────────────────────────────
    // Convenience methods
    // ───────────────────────────────────────────────────────────────

    pub fn start(&self, phase_ms: f64) {
        self.send(Command::Start { phase_ms });
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn change_cycle_duration(&self, seconds: f64) {
        self.send(Command::ChangeCycleDuration { seconds });
    }

    pub fn change_tempo(&self, tempo: f64, phase_ms: Option<f64>) {
        self.send(Command::ChangeTempo { tempo, phase_ms });
    }

    pub fn seek(&self, phase_ms: f64) {
        self.send(Command::Seek { phase_ms });
    }

    /// Replace all layers. Recompiles on the engine side.
    pub fn set_layers(&self, layers: Vec<LayerConfig<N>>) {
        self.send(Command::SetLayers { layers });
    }

    pub fn recompile_layer_events(&self) {
        self.send(Command::RecompileLayerEvents);
    }

    pub fn set_legato(&self, legato: bool) {
        self.send(Command::SetLegato { legato });
    }

    pub fn set_full_scale(&self, full_scale: bool) {
        self.send(Command::SetFullScale { full_scale });
    }
}

impl<N> Clone for SessionHandle<N> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            readback: Arc::clone(&self.readback),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// EngineHandle - Scheduler Thread API
// ═══════════════════════════════════════════════════════════════════

impl<N, V> EngineHandle<N, V>
where
    N: Clone,
    V: VoiceSink<N>,
{
    // ───────────────────────────────────────────────────────────────
    // Command Processing
    // ───────────────────────────────────────────────────────────────

    /// Apply all pending UI commands at device time `now`.
    ///
    /// Returns the number of commands applied.
    pub fn process_commands(&mut self, now: f64) -> usize {
        let mut applied = 0;

        while let Ok(cmd) = self.command_rx.try_recv() {
            self.apply(cmd, now);
            applied += 1;
        }

        if applied > 0 {
            self.sync_readback(now);
        }
        applied
    }

    fn apply(&mut self, cmd: Command<N>, now: f64) {
        let transport = &mut self.transport;

        match cmd {
            // ═════════════════════════════════════════════════════════════
            // Lifecycle
            // ═════════════════════════════════════════════════════════════
            Command::Start { phase_ms } => {
                transport.start(phase_ms, now);
            }
            Command::Stop => transport.stop(now),

            // ═════════════════════════════════════════════════════════════
            // Retune
            // ═════════════════════════════════════════════════════════════
            Command::ChangeCycleDuration { seconds } => {
                transport.change_cycle_duration(seconds, now);
            }
            Command::ChangeTempo { tempo, phase_ms } => {
                transport.change_tempo(tempo, phase_ms, now);
            }
            Command::Seek { phase_ms } => {
                transport.seek(phase_ms, now);
            }

            // ═════════════════════════════════════════════════════════════
            // Rhythm data
            // ═════════════════════════════════════════════════════════════
            Command::SetLayers { layers } => transport.set_layers(layers),
            Command::RecompileLayerEvents => transport.recompile_layer_events(),

            // ═════════════════════════════════════════════════════════════
            // Voicing mode
            // ═════════════════════════════════════════════════════════════
            Command::SetLegato { legato } => transport.set_legato(legato, now),
            Command::SetFullScale { full_scale } => transport.set_full_scale(full_scale, now),
        }
    }

    /// Apply pending commands, then run a scheduler pass if one is due.
    ///
    /// Call this from the host timer at roughly the poll interval.
    pub fn poll(&mut self, now: f64) -> Result<Option<PassReport>, SchedulerError> {
        self.process_commands(now);
        let result = self.transport.poll(now);
        self.sync_readback(now);
        result
    }

    /// Stop the transport directly, bypassing the command queue.
    pub fn stop(&mut self, now: f64) {
        self.transport.stop(now);
        self.sync_readback(now);
    }

    pub fn subscribe(&mut self) -> Receiver<PhaseChange> {
        self.transport.subscribe()
    }
}

impl<N, V> EngineHandle<N, V> {
    // ───────────────────────────────────────────────────────────────
    // Transport Access
    // ───────────────────────────────────────────────────────────────

    pub fn transport(&self) -> &Transport<N, V> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<N, V> {
        &mut self.transport
    }

    // ───────────────────────────────────────────────────────────────
    // Readback Updates (for UI synchronization)
    // ───────────────────────────────────────────────────────────────

    /// Publish the transport's state at `now` to the UI.
    pub fn sync_readback(&self, now: f64) {
        self.readback.store(self.transport.readback(now));
    }
}
