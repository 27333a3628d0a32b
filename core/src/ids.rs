use core::fmt::{self, Display};

// GLOBAL LP ID
// ================================================================================================

/// Global identifier of a logical process.
///
/// Assigned by the host engine; resolved to and from (group, type, repetition, offset) tuples by
/// the [`Mapping`](crate::Mapping) service.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Gid(u64);

impl Gid {
    /// Returns a new [Gid] from a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Gid {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<Gid> for u64 {
    fn from(gid: Gid) -> Self {
        gid.0
    }
}

impl Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
