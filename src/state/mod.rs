// src/state/mod.rs
//
// Transport state and the declarative inputs that drive it.
//
// Key principles:
// - TransportState is the only mutable timing record
// - Only the transport entry points mutate it
// - The UI talks to it exclusively through Commands

mod command;
mod layer;
mod readback;
mod transport_state;

pub use command::*;
pub use layer::*;
pub use readback::*;
pub use transport_state::*;
