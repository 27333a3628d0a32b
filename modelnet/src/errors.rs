use warpnet_core::{ConfigError, Gid, MappingError};

use crate::torus::Direction;

// SETUP ERROR
// ================================================================================================

/// A configure-time failure.
///
/// All of these are fatal: the simulation refuses to start on a malformed configuration rather
/// than guessing at intent.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("configuration error")]
    Config(#[from] ConfigError),
    #[error("unknown value for PARAMS:modelnet_scheduler: '{name}'")]
    UnknownScheduler { name: String },
    #[error("fabric '{fabric}' has no implementation in this build")]
    UnsupportedFabric { fabric: &'static str },
    #[error("missing required parameter PARAMS:{key} for fabric '{fabric}'")]
    MissingFabricParameter { fabric: &'static str, key: &'static str },
    #[error("invalid value '{value}' for PARAMS:{key} of fabric '{fabric}'")]
    InvalidFabricParameter { fabric: &'static str, key: &'static str, value: String },
}

// SIMULATION ERROR
// ================================================================================================

/// A fatal runtime condition observed by a forward or reverse handler.
///
/// There is no local recovery: the host engine terminates the simulation with the diagnostic.
/// Integrity violations (bad magic, misdirected events, reverse calls with no saved forward
/// state) indicate a host-engine or plugin bug; buffer overflow indicates an undersized
/// configuration.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(
        "event magic {actual:#010x} does not match the model-net base magic {expected:#010x} at LP {gid}"
    )]
    BadMagic { gid: Gid, expected: u32, actual: u32 },
    #[error("LP {gid} received an event for a fabric it does not run")]
    MisdirectedEvent { gid: Gid },
    #[error(
        "virtual channel buffer overflow at LP {gid}: dim {dim} dir {dir} holds \
         {occupancy}/{capacity} chunks, packet destined to LP {dest}"
    )]
    BufferOverflow {
        gid: Gid,
        dim: usize,
        dir: Direction,
        occupancy: u32,
        capacity: u32,
        dest: Gid,
    },
    #[error("credit for an empty virtual channel buffer at LP {gid}: dim {dim} dir {dir}")]
    BufferUnderflow { gid: Gid, dim: usize, dir: Direction },
    #[error("mapping lookup failed")]
    Mapping(#[from] MappingError),
    #[error("no model-net parameters configured for annotation {annotation:?} at LP {gid}")]
    MissingParams { gid: Gid, annotation: Option<String> },
    #[error("LP type '{type_name}' is not a registered model-net fabric")]
    UnknownLpType { type_name: String },
    #[error("fabric '{fabric}' is not in the method registry")]
    FabricNotConfigured { fabric: &'static str },
    #[error("scheduler reverse with no saved forward state at LP {gid}")]
    EmptySchedulerReverse { gid: Gid },
}
