use warpnet_core::{Gid, LpInfo, Mapping, MappingError};

// TEST MAPPING
// ================================================================================================

/// A single-group mapping service with a fixed repetition layout.
///
/// Global ids are dense: repetition `r` occupies the id range
/// `[r * lps_per_rep, (r + 1) * lps_per_rep)`, with the configured LP types laid out in
/// declaration order inside each repetition. This is the layout the torus model assumes when it
/// equates `rep + offset` with the flat node index.
#[derive(Clone, Debug)]
pub struct TestMapping {
    group: String,
    reps: u32,
    types: Vec<TypeSlot>,
}

#[derive(Clone, Debug)]
struct TypeSlot {
    name: String,
    count: u32,
    start: u32,
    annotation: Option<String>,
}

impl TestMapping {
    /// Returns a new mapping for `reps` repetitions of an (initially empty) group.
    pub fn new(group: impl Into<String>, reps: u32) -> Self {
        Self { group: group.into(), reps, types: Vec::new() }
    }

    /// Adds `count` LPs of the given type to every repetition.
    pub fn with_lp_type(self, name: impl Into<String>, count: u32) -> Self {
        self.with_annotated_lp_type(name, count, None)
    }

    /// Adds `count` LPs of the given type, carrying a configuration annotation.
    pub fn with_annotated_lp_type(
        mut self,
        name: impl Into<String>,
        count: u32,
        annotation: Option<&str>,
    ) -> Self {
        let start = self.lps_per_rep();
        self.types.push(TypeSlot {
            name: name.into(),
            count,
            start,
            annotation: annotation.map(Into::into),
        });
        self
    }

    /// Returns the group name.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Returns the total number of LPs in the mapping.
    pub fn num_lps(&self) -> u64 {
        u64::from(self.reps) * u64::from(self.lps_per_rep())
    }

    /// Convenience lookup that panics on bad placement; for building test scenarios only.
    pub fn gid_of(&self, type_name: &str, rep: u32, offset: u32) -> Gid {
        self.lp_id(&self.group, type_name, rep, offset).expect("bad test placement")
    }

    fn lps_per_rep(&self) -> u32 {
        self.types.iter().map(|slot| slot.count).sum()
    }
}

impl Mapping for TestMapping {
    fn lp_info(&self, gid: Gid) -> Result<LpInfo, MappingError> {
        let per_rep = u64::from(self.lps_per_rep());
        let id = gid.as_u64();
        if per_rep == 0 || id >= self.num_lps() {
            return Err(MappingError::UnknownLp { gid });
        }

        let rep = (id / per_rep) as u32;
        let within = (id % per_rep) as u32;
        let (type_id, slot) = self
            .types
            .iter()
            .enumerate()
            .find(|(_, slot)| within >= slot.start && within < slot.start + slot.count)
            .expect("type slots cover every offset");

        Ok(LpInfo {
            group: self.group.clone(),
            group_id: 0,
            type_id: type_id as u32,
            type_name: slot.name.clone(),
            rep,
            offset: within - slot.start,
            annotation: slot.annotation.clone(),
        })
    }

    fn lp_id(
        &self,
        group: &str,
        type_name: &str,
        rep: u32,
        offset: u32,
    ) -> Result<Gid, MappingError> {
        let slot = self
            .types
            .iter()
            .find(|slot| group == self.group && slot.name == type_name)
            .ok_or_else(|| MappingError::UnknownLpType {
                group: group.into(),
                type_name: type_name.into(),
            })?;
        if rep >= self.reps || offset >= slot.count {
            return Err(MappingError::PlacementOutOfRange {
                group: group.into(),
                type_name: type_name.into(),
                rep,
                offset,
            });
        }
        let gid = u64::from(rep) * u64::from(self.lps_per_rep())
            + u64::from(slot.start)
            + u64::from(offset);
        Ok(Gid::new(gid))
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use warpnet_core::{Gid, Mapping};

    use super::TestMapping;

    fn mapping() -> TestMapping {
        TestMapping::new("MODELNET_GRP", 4)
            .with_lp_type("server", 1)
            .with_lp_type("modelnet_torus", 1)
    }

    #[test]
    fn round_trip() {
        let mapping = mapping();
        for rep in 0..4 {
            let gid = mapping.lp_id("MODELNET_GRP", "modelnet_torus", rep, 0).unwrap();
            let info = mapping.lp_info(gid).unwrap();
            assert_eq!(info.type_name, "modelnet_torus");
            assert_eq!(info.rep, rep);
            assert_eq!(info.offset, 0);
        }
    }

    #[test]
    fn dense_layout() {
        let mapping = mapping();
        assert_eq!(mapping.gid_of("server", 0, 0), Gid::new(0));
        assert_eq!(mapping.gid_of("modelnet_torus", 0, 0), Gid::new(1));
        assert_eq!(mapping.gid_of("server", 2, 0), Gid::new(4));
        assert_eq!(mapping.gid_of("modelnet_torus", 3, 0), Gid::new(7));
    }

    #[test]
    fn rejects_bad_placement() {
        let mapping = mapping();
        assert!(mapping.lp_id("MODELNET_GRP", "modelnet_torus", 4, 0).is_err());
        assert!(mapping.lp_id("MODELNET_GRP", "modelnet_dragonfly", 0, 0).is_err());
        assert!(mapping.lp_info(Gid::new(99)).is_err());
    }
}
