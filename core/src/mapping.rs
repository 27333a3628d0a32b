use crate::Gid;

// LP MAPPING SERVICE
// ================================================================================================

/// Placement record of a single LP, as maintained by the host's mapping service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LpInfo {
    /// Configuration group the LP belongs to.
    pub group: String,
    /// Index of the group in the configuration.
    pub group_id: u32,
    /// Index of the LP type within the group.
    pub type_id: u32,
    /// Name of the LP type (e.g. `modelnet_torus`).
    pub type_name: String,
    /// Repetition index within the group.
    pub rep: u32,
    /// Offset of this LP among same-typed LPs of the repetition.
    pub offset: u32,
    /// Configuration annotation attached to the LP type, if any.
    pub annotation: Option<String>,
}

/// Contract with the host's LP-to-GID mapping service.
///
/// The mapping is built at configure time and immutable afterwards, so lookups may be issued from
/// any handler without synchronization concerns.
pub trait Mapping {
    /// Resolves a global LP id into its placement record.
    fn lp_info(&self, gid: Gid) -> Result<LpInfo, MappingError>;

    /// Resolves `(group, type_name, rep, offset)` into a global LP id.
    fn lp_id(&self, group: &str, type_name: &str, rep: u32, offset: u32)
    -> Result<Gid, MappingError>;
}

// ERRORS
// ================================================================================================

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("no LP registered with global id {gid}")]
    UnknownLp { gid: Gid },
    #[error("no LP type named '{type_name}' in group '{group}'")]
    UnknownLpType { group: String, type_name: String },
    #[error("repetition {rep} offset {offset} out of range for type '{type_name}' in group '{group}'")]
    PlacementOutOfRange { group: String, type_name: String, rep: u32, offset: u32 },
}
