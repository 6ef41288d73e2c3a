//! vigil-core — shared types for the Vigil sensor node.
//! Configuration, the frame model, node identity, the telemetry wire
//! format and the sink trait. Every other Vigil crate depends on this one.

pub mod config;
pub mod frame;
pub mod identity;
pub mod sink;
pub mod telemetry;

pub use config::NodeConfig;
pub use frame::{Frame, Pixels};
pub use identity::NodeIdentity;
pub use sink::{SinkError, TelemetrySink};
pub use telemetry::{Telemetry, TelemetryBody};
