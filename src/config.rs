//! Assembly configuration.
//!
//! [`AssemblyConfig`] is an explicit value threaded into each assembly call;
//! there is no process-wide configuration. A config can be built in code,
//! or loaded from a TOML file:
//!
//! ```toml
//! version = "B"
//! file_prefix = "ods"
//! recency_field = "ods_produced_utc"
//! el_limit_deg = 0.0
//! reference_time = "2026-03-01T12:00:00"
//! post_to = "/data/ods/ods_assembled.json"
//! ```
//!
//! Every key is optional; omitted keys take the defaults below.

use crate::models::time::OdsTime;
use crate::services::merge::{MergeOptions, RecencyRule, PRODUCED_FIELD};
use crate::standard::StandardVersion;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a directory assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Target standard version every input is normalized to.
    pub version: StandardVersion,
    /// Candidate files must be named `<file_prefix>*.json`.
    pub file_prefix: String,
    /// Record-internal timestamp field for duplicate recency; an empty
    /// string selects pure insertion order (later file wins).
    pub recency_field: String,
    /// Sources below this elevation (degrees) are culled when an elevation
    /// provider is supplied.
    pub el_limit_deg: f64,
    /// Reference time for culling; `None` means the invocation time.
    pub reference_time: Option<OdsTime>,
    /// When set, the assembled instance is also written to this path.
    pub post_to: Option<PathBuf>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            version: StandardVersion::latest(),
            file_prefix: "ods".to_string(),
            recency_field: PRODUCED_FIELD.to_string(),
            el_limit_deg: 0.0,
            reference_time: None,
            post_to: None,
        }
    }
}

impl AssemblyConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// The merge options this configuration selects.
    pub fn merge_options(&self) -> MergeOptions {
        let recency = if self.recency_field.is_empty() {
            RecencyRule::InsertionOrder
        } else {
            RecencyRule::ProducedField(self.recency_field.clone())
        };
        MergeOptions { recency }
    }
}
