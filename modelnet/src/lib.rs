//! The model-net simulation engine: a demultiplexing and scheduling base LP that sits between
//! workload producers and pluggable network fabrics, plus the torus fabric itself.
//!
//! Every forward event handler in this crate has an exact reverse handler, driven by the
//! per-event [`BitField`](warpnet_core::BitField) and by scalar save slots carried on the event.
//! The host PDES engine replays reverse handlers to roll back speculative execution; after a
//! reverse, LP state (including random-stream position) is identical to the pre-forward state.

mod base;
mod engine;
mod errors;
mod message;
mod registry;
mod sched;
mod stats;

pub mod torus;

// RE-EXPORTS
// ================================================================================================

pub use base::BaseLp;
pub use engine::{BaseParams, ModelNet};
pub use errors::{SetupError, SimulationError};
pub use message::{Body, FabricMessage, Payload, Request, SimEvent, WrappedMessage};
pub use registry::{Fabric, FabricLp, NetId, PacketEventArgs};
pub use sched::{SchedOutcome, SchedRc, Scheduler, SchedulerKind};
pub use stats::{CategoryStats, StatsTable};
