// src/lib.rs
//
// Library entry point for Rust, FFI (iOS/Swift) and wasm consumers.

mod bridge;
mod clock;
mod compile;
mod config;
mod driver;
mod event;
mod retune;
mod scheduler;
mod state;
mod sustain;
mod timer;
mod transport;
mod voice;

#[cfg(feature = "ios")]
pub mod ffi;

#[cfg(feature = "web")]
mod wasm;


// Re-export key types for Rust consumers
pub use bridge::{EngineHandle, SessionHandle, create_bridge};
pub use clock::TickClock;
pub use compile::{CompiledLayers, compile, compile_layer};
pub use config::*;
pub use driver::{AudioClock, DriverHandle, SystemClock, spawn_driver};
pub use event::{BridgeStart, LAYER_COUNT, LayerEvent, NoteTrigger, PhaseChange};
pub use retune::{RetuneOutcome, change_cycle_duration, change_tempo};
pub use scheduler::{PassReport, Scheduler, SchedulerError};
pub use state::{
    BridgeVoice, Command, EngineReadback, LayerConfig, PlayHistory, PlayedNote, RunState,
    TransportState,
};
pub use sustain::{BridgeOutcome, LatestNote, arm_bridge, capture_latest, clear_bridges};
pub use timer::PassTimer;
pub use transport::Transport;
pub use voice::{
    RECORD_BRIDGE_RELEASE, RECORD_BRIDGE_START, RECORD_LEN, RECORD_TRIGGER, RecordingSink,
    TriggerError, VoiceCommand, VoiceSink,
};
