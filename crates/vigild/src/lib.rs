//! vigild — the Vigil sensor node daemon.
//!
//! The binary in `main.rs` wires these together; they are a library so
//! the integration tests can run a node in-process.

pub mod capture;
pub mod control;
pub mod dispatch;
pub mod source;
pub mod tick;
pub mod udp;
