use std::collections::BTreeMap;

use warpnet_core::ConfigSource;

// TEST CONFIG
// ================================================================================================

/// A table-backed [`ConfigSource`].
///
/// Annotated lookups fall back to the unannotated entry, matching the loader the simulator runs
/// against.
#[derive(Clone, Debug)]
pub struct TestConfig {
    values: BTreeMap<(String, String, Option<String>), String>,
    annotations: Vec<Option<String>>,
}

impl TestConfig {
    /// Returns an empty config with a single unannotated LP-type entry.
    pub fn new() -> Self {
        Self { values: BTreeMap::new(), annotations: vec![None] }
    }

    /// Adds an unannotated value.
    pub fn with(self, section: &str, key: &str, value: &str) -> Self {
        self.with_annotated(section, key, None, value)
    }

    /// Adds a value under the given annotation.
    pub fn with_annotated(
        mut self,
        section: &str,
        key: &str,
        annotation: Option<&str>,
        value: &str,
    ) -> Self {
        self.values
            .insert((section.into(), key.into(), annotation.map(Into::into)), value.into());
        self
    }

    /// Replaces the annotation list reported for `modelnet_*` LP types.
    pub fn with_annotations(mut self, annotations: Vec<Option<String>>) -> Self {
        self.annotations = annotations;
        self
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for TestConfig {
    fn get_str(&self, section: &str, key: &str, annotation: Option<&str>) -> Option<String> {
        let annotated =
            self.values.get(&(section.into(), key.into(), annotation.map(Into::into)));
        annotated
            .or_else(|| self.values.get(&(section.into(), key.into(), None)))
            .cloned()
    }

    fn lp_annotations(&self, _prefix: &str) -> Vec<Option<String>> {
        self.annotations.clone()
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use warpnet_core::ConfigSource;

    use super::TestConfig;

    #[test]
    fn annotated_lookup_falls_back() {
        let cfg = TestConfig::new()
            .with("PARAMS", "packet_size", "512")
            .with_annotated("PARAMS", "packet_size", Some("fast"), "64");

        assert_eq!(cfg.get_str("PARAMS", "packet_size", Some("fast")).unwrap(), "64");
        assert_eq!(cfg.get_str("PARAMS", "packet_size", Some("slow")).unwrap(), "512");
        assert_eq!(cfg.get_str("PARAMS", "packet_size", None).unwrap(), "512");
        assert!(cfg.get_str("PARAMS", "chunk_size", None).is_none());
    }
}
