//! Public API surface for the ODS engine.
//!
//! This file consolidates the shared value types and re-exports the types
//! callers work with, so `use ods_rust::api::*` brings in the whole
//! read → validate → merge → cull → write pipeline.

pub use crate::config::AssemblyConfig;
pub use crate::error::{
    AssemblyError, CapabilityError, ParseError, SchemaError, ValidationError,
};
pub use crate::models::instance::{Defaults, Instance};
pub use crate::models::record::{DuplicateKey, RawRecord, Record};
pub use crate::models::time::{generate_observation_times, OdsTime};
pub use crate::services::assembly::{assemble, Assembly, AssemblyReport};
pub use crate::services::merge::{
    merge, MergeOptions, MergeReport, RecencyRule, PRODUCED_FIELD,
};
pub use crate::services::visibility::{
    active_records, continuity, coverage, cull_by_elevation, cull_by_time, AdjustEdge, Coverage,
    CullPolicy, CullReport, ElevationProvider,
};
pub use crate::standard::{
    FieldKind, FieldSpec, Standard, StandardVersion, ValueCheck, DATA_KEY, LATEST,
};

use serde::{Deserialize, Serialize};

/// Geographic location (latitude, longitude, elevation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeographicLocation {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180)
    pub longitude: f64,
    /// Elevation in meters above sea level (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
}

impl GeographicLocation {
    pub fn new(latitude: f64, longitude: f64, elevation_m: Option<f64>) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err("Latitude must be between -90 and 90 degrees".to_string());
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err("Longitude must be between -180 and 180 degrees".to_string());
        }
        Ok(Self {
            latitude,
            longitude,
            elevation_m,
        })
    }
}

/// One rejected record from a batch ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position of the record in its input sequence.
    pub index: usize,
    /// Source identifier, when the record carried one.
    pub src_id: Option<String>,
    /// Every validation failure found in the record.
    pub messages: Vec<String>,
}

/// Outcome of the last batch ingest into an instance.
///
/// "Ignore on incompleteness" is the batch policy, but silence must stay
/// observable: every skipped record is counted and kept here with its
/// failure messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Records accepted into the instance.
    pub accepted: usize,
    /// Records rejected, with reasons.
    pub rejected: Vec<RejectedRecord>,
}

impl ValidationSummary {
    /// Records examined in total.
    pub fn total(&self) -> usize {
        self.accepted + self.rejected.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn is_all_valid(&self) -> bool {
        self.rejected.is_empty()
    }
}
