// CONFIGURATION SOURCE
// ================================================================================================

/// Contract with the host's configuration loader.
///
/// Values are addressed by `(section, key)` and optionally qualified by a per-LP-type annotation;
/// sources are expected to fall back to the unannotated entry when an annotated one is absent.
/// The typed getters parse on top of [`ConfigSource::get_str`] and report malformed values as
/// [`ConfigError::InvalidValue`] with the full key location, per the fail-loudly policy for
/// configuration mistakes.
pub trait ConfigSource {
    /// Returns the raw string value at `(section, key)` under the given annotation, if present.
    fn get_str(&self, section: &str, key: &str, annotation: Option<&str>) -> Option<String>;

    /// Returns the distinct annotations (including the unannotated entry, as `None`) of every
    /// configured LP type whose name starts with `prefix`.
    fn lp_annotations(&self, prefix: &str) -> Vec<Option<String>>;

    /// Returns the value at `(section, key)` parsed as `u64`.
    fn get_u64(
        &self,
        section: &str,
        key: &str,
        annotation: Option<&str>,
    ) -> Result<Option<u64>, ConfigError> {
        parse_value(self.get_str(section, key, annotation), section, key, annotation)
    }

    /// Returns the value at `(section, key)` parsed as `f64`.
    fn get_f64(
        &self,
        section: &str,
        key: &str,
        annotation: Option<&str>,
    ) -> Result<Option<f64>, ConfigError> {
        parse_value(self.get_str(section, key, annotation), section, key, annotation)
    }

    /// Returns the value at `(section, key)` parsed as a whitespace-separated list of `u64`s.
    fn get_u64_list(
        &self,
        section: &str,
        key: &str,
        annotation: Option<&str>,
    ) -> Result<Option<Vec<u64>>, ConfigError> {
        let Some(raw) = self.get_str(section, key, annotation) else {
            return Ok(None);
        };
        raw.split_whitespace()
            .map(|item| {
                item.parse().map_err(|_| ConfigError::invalid(section, key, annotation, &raw))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn parse_value<T: core::str::FromStr>(
    raw: Option<String>,
    section: &str,
    key: &str,
    annotation: Option<&str>,
) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(section, key, annotation, &raw)),
    }
}

// ERRORS
// ================================================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {section}:{key}{}", annotation_suffix(.annotation))]
    InvalidValue { section: String, key: String, annotation: Option<String>, value: String },
    #[error("missing required parameter {section}:{key}{}", annotation_suffix(.annotation))]
    Missing { section: String, key: String, annotation: Option<String> },
}

impl ConfigError {
    /// Returns an [`ConfigError::InvalidValue`] for the given key location.
    pub fn invalid(section: &str, key: &str, annotation: Option<&str>, value: &str) -> Self {
        Self::InvalidValue {
            section: section.into(),
            key: key.into(),
            annotation: annotation.map(Into::into),
            value: value.into(),
        }
    }

    /// Returns a [`ConfigError::Missing`] for the given key location.
    pub fn missing(section: &str, key: &str, annotation: Option<&str>) -> Self {
        Self::Missing {
            section: section.into(),
            key: key.into(),
            annotation: annotation.map(Into::into),
        }
    }
}

fn annotation_suffix(annotation: &Option<String>) -> String {
    match annotation {
        Some(anno) => format!("@{anno}"),
        None => String::new(),
    }
}

// TESTS
// ================================================================================================
