use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::statistics::TimeResolution;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Advisor settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Watch patterns (`db.coll`, `db.*`, `db` or `*`). Empty watches
    /// everything.
    pub namespaces: Vec<String>,
    pub time_resolution: TimeResolution,
    /// Consult explain plans for the multikey flag of nested queries.
    pub use_explain: bool,
    /// Finalize collections on the rayon pool.
    pub parallel_finalize: bool,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            time_resolution: TimeResolution::default(),
            use_explain: false,
            parallel_finalize: true,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl AdvisorConfig {
    /// Load from a JSON file and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("JSON parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Unknown log level {:?}, expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        for pattern in &self.namespaces {
            let valid = pattern == "*"
                || (!pattern.is_empty() && !pattern.contains('.'))
                || pattern
                    .strip_suffix(".*")
                    .is_some_and(|db| !db.is_empty() && !db.contains('.'))
                || Namespace::parse(pattern).is_ok();
            if !valid {
                return Err(Error::Config(format!("Invalid namespace pattern {:?}", pattern)));
            }
        }
        Ok(())
    }

    /// Whether operations on `namespace` should be analyzed.
    pub fn watches(&self, namespace: &Namespace) -> bool {
        self.namespaces.is_empty()
            || self
                .namespaces
                .iter()
                .any(|pattern| namespace.matches_pattern(pattern))
    }
}
