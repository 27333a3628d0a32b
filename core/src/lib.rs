//! Core substrate shared by the warpnet simulation crates: virtual time, LP
//! identifiers, the per-event reverse-computation bitfield, and the contracts
//! the host PDES engine, the LP-mapping service, and the configuration loader
//! are expected to fulfill.

mod bitfield;
mod config;
mod ids;
mod kernel;
mod mapping;
mod time;

// RE-EXPORTS
// ================================================================================================

pub use bitfield::BitField;
pub use config::{ConfigError, ConfigSource};
pub use ids::Gid;
pub use kernel::Lp;
pub use mapping::{LpInfo, Mapping, MappingError};
pub use time::SimTime;
