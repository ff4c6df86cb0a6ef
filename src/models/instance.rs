//! ODS instances and caller-supplied defaults.
//!
//! An [`Instance`] is a named, ordered sequence of validated records sharing
//! one standard version. It is a value: merging copies records, nothing
//! refers back to the source file. The file format is JSON with a single
//! top-level `ods_data` key; a bare record list is also accepted on read.
//! Unrecognized record keys survive a read/write round-trip verbatim.

use crate::api::{RejectedRecord, ValidationSummary};
use crate::error::{ParseError, ValidationError};
use crate::models::record::{RawRecord, Record};
use crate::standard::{Standard, StandardVersion};
use anyhow::Context;
use log::{info, warn};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;

/// A named, ordered collection of records under one standard version.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    name: String,
    standard: Standard,
    records: Vec<Record>,
    checksum: Option<String>,
    summary: ValidationSummary,
}

impl Instance {
    /// Empty instance for the given standard version.
    pub fn new(name: impl Into<String>, version: StandardVersion) -> Self {
        Self {
            name: name.into(),
            standard: Standard::new(version),
            records: Vec::new(),
            checksum: None,
            summary: ValidationSummary::default(),
        }
    }

    /// Parse an instance from ODS JSON text.
    ///
    /// Accepts either the `{ "ods_data": [...] }` envelope or a bare record
    /// list. Records failing validation are skipped and counted, since one bad
    /// record must not block ingestion of the rest. `name` labels the
    /// instance and any parse errors.
    pub fn from_json_str(
        name: impl Into<String>,
        version: StandardVersion,
        text: &str,
    ) -> Result<Self, ParseError> {
        let name = name.into();
        let payload: Value =
            serde_json::from_str(text).map_err(|e| ParseError::json(name.clone(), e))?;
        let entries = match payload {
            Value::Object(mut map) => match map.shift_remove(Standard::new(version).data_key()) {
                Some(Value::Array(entries)) => entries,
                Some(_) => {
                    return Err(ParseError::shape(name, "ods_data is not a list"));
                }
                None => {
                    return Err(ParseError::shape(name, "missing ods_data key"));
                }
            },
            Value::Array(entries) => entries,
            _ => {
                return Err(ParseError::shape(name, "expected an object or a list"));
            }
        };

        let raw_records = entries
            .into_iter()
            .map(|entry| match entry {
                Value::Object(map) => Ok(map),
                other => Err(format!("{other} is not a record mapping")),
            })
            .collect::<Vec<_>>();

        let mut instance = Self::new(name, version);
        instance.checksum = Some(checksum_of(text));
        for raw in raw_records {
            match raw {
                Ok(map) => instance.ingest_raw(map),
                Err(msg) => instance.reject(None, vec![msg]),
            }
        }
        instance.report_ingest();
        Ok(instance)
    }

    /// Read an instance from an ODS JSON file; the file name becomes the
    /// instance name.
    pub fn read_path(path: &Path, version: StandardVersion) -> Result<Self, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|e| ParseError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_json_str(name, version, &text)
    }

    /// Ingest a batch of raw records with skip-and-continue semantics.
    pub fn from_raw_records(
        name: impl Into<String>,
        version: StandardVersion,
        raws: Vec<RawRecord>,
    ) -> Self {
        let mut instance = Self::new(name, version);
        for raw in raws {
            instance.ingest_raw(raw);
        }
        instance.report_ingest();
        instance
    }

    /// Add one record: defaults are applied under the explicit fields, the
    /// result is validated, and, unlike batch ingestion, any validation
    /// failure is returned to the caller instead of being absorbed.
    pub fn add(&mut self, entry: RawRecord, defaults: &Defaults) -> Result<(), ValidationError> {
        let merged = self.layer_defaults(entry, defaults);
        let record = Record::validate(merged, &self.standard)?;
        self.records.push(record);
        self.summary.accepted += 1;
        Ok(())
    }

    /// Compose `defaults ⊕ explicit` in standard field order, explicit
    /// fields winning on collision; extra keys from either side follow in
    /// their original order.
    fn layer_defaults(&self, explicit: RawRecord, defaults: &Defaults) -> RawRecord {
        let mut merged = RawRecord::new();
        for spec in self.standard.fields() {
            if let Some(value) = explicit.get(spec.name).or_else(|| defaults.get(spec.name)) {
                merged.insert(spec.name.to_string(), value.clone());
            }
        }
        for (key, value) in &explicit {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in defaults.map() {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    fn ingest_raw(&mut self, raw: RawRecord) {
        match Record::validate(raw, &self.standard) {
            Ok(record) => {
                self.records.push(record);
                self.summary.accepted += 1;
            }
            Err(err) => self.reject(err.src_id.clone(), err.messages),
        }
    }

    fn reject(&mut self, src_id: Option<String>, messages: Vec<String>) {
        let index = self.summary.total();
        warn!(
            "{}: skipping record {index}: {}",
            self.name,
            messages.join("; ")
        );
        self.summary.rejected.push(RejectedRecord {
            index,
            src_id,
            messages,
        });
    }

    fn report_ingest(&self) {
        let summary = &self.summary;
        if summary.total() > 0 && summary.accepted == 0 {
            warn!("{}: all {} records were invalid", self.name, summary.total());
        } else if !summary.is_all_valid() {
            warn!(
                "{}: {} / {} records were not valid",
                self.name,
                summary.rejected_count(),
                summary.total()
            );
        } else {
            info!("{}: {} records, all valid", self.name, summary.accepted);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn version(&self) -> StandardVersion {
        self.standard.version()
    }

    pub fn standard(&self) -> &Standard {
        &self.standard
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn first_record(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// SHA-256 of the source text this instance was read from, when it came
    /// from a file or string.
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Outcome of the last batch ingest.
    pub fn summary(&self) -> &ValidationSummary {
        &self.summary
    }

    /// Sort records by start time, source identifier, then the remaining
    /// standard fields.
    pub fn sort_by_time(&mut self) {
        let standard = self.standard;
        self.records.sort_by_cached_key(|r| r.sort_key(&standard));
    }

    /// Append an already-validated record of the same version.
    pub(crate) fn push_record(&mut self, record: Record) {
        debug_assert_eq!(record.version(), self.standard.version());
        self.records.push(record);
        self.summary.accepted += 1;
    }

    /// The instance as an ODS JSON value: `{ "ods_data": [...] }` with every
    /// record's full field map, unrecognized keys included.
    pub fn to_json(&self) -> Value {
        let entries = self
            .records
            .iter()
            .map(|r| Value::Object(r.fields().clone()))
            .collect();
        let mut envelope = serde_json::Map::new();
        envelope.insert(self.standard.data_key().to_string(), Value::Array(entries));
        Value::Object(envelope)
    }

    /// Write the instance as an ODS JSON file (2-space indent).
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        if self.is_empty() {
            warn!("{}: writing an empty ODS file", self.name);
        }
        let mut payload = serde_json::to_string_pretty(&self.to_json())
            .context("failed to serialize ODS instance")?;
        payload.push('\n');
        std::fs::write(path, payload)
            .with_context(|| format!("failed to write ODS file {}", path.display()))?;
        Ok(())
    }

    /// Export the instance as a delimited text file: one header line with
    /// the standard's fields, one row per record.
    pub fn export_delimited(&self, path: &Path, sep: &str) -> anyhow::Result<()> {
        if self.is_empty() {
            warn!("{}: exporting an empty ODS instance", self.name);
        }
        let header: Vec<&str> = self.standard.fields().iter().map(|f| f.name).collect();
        let mut out = header.join(sep);
        out.push('\n');
        for record in &self.records {
            let row: Vec<String> = header
                .iter()
                .map(|name| match record.field(name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
                .collect();
            out.push_str(&row.join(sep));
            out.push('\n');
        }
        std::fs::write(path, out)
            .with_context(|| format!("failed to write data file {}", path.display()))?;
        Ok(())
    }
}

/// Compute the hex-encoded SHA-256 checksum of instance source text.
fn checksum_of(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Caller-owned default field values, applied under explicit fields when
/// adding records. Never mutated by use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults(RawRecord);

impl Defaults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(map: RawRecord) -> Self {
        Self(map)
    }

    /// Load defaults from a JSON file: either a flat field map or a full
    /// ODS envelope, in which case the first record supplies the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|e| ParseError::io(path, e))?;
        let label = path.display().to_string();
        let payload: Value =
            serde_json::from_str(&text).map_err(|e| ParseError::json(label.clone(), e))?;
        match payload {
            Value::Object(mut map) => match map.shift_remove(crate::standard::DATA_KEY) {
                Some(Value::Array(entries)) => match entries.into_iter().next() {
                    Some(Value::Object(first)) => Ok(Self(first)),
                    Some(_) => Err(ParseError::shape(label, "ods_data entry is not a mapping")),
                    None => Ok(Self::empty()),
                },
                Some(_) => Err(ParseError::shape(label, "ods_data is not a list")),
                None => Ok(Self(map)),
            },
            _ => Err(ParseError::shape(label, "expected a field mapping")),
        }
    }

    /// Derive defaults from an existing instance's first record.
    pub fn from_instance_first_record(instance: &Instance) -> Self {
        match instance.first_record() {
            Some(record) => Self(record.fields().clone()),
            None => Self::empty(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn map(&self) -> &RawRecord {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standard::StandardVersion;
    use serde_json::json;

    fn record_json(src_id: &str, start: &str, end: &str) -> Value {
        json!({
            "site_id": "hcro",
            "site_lat_deg": 40.8173,
            "site_lon_deg": -121.4695,
            "site_el_m": 1019.0,
            "src_id": src_id,
            "corr_integ_time_sec": 10.0,
            "src_ra_j2000_deg": 69.3162,
            "src_dec_j2000_deg": -47.2525,
            "src_start_utc": start,
            "src_end_utc": end,
            "slew_sec": 30.0,
            "trk_rate_dec_deg_per_sec": 0.0,
            "trk_rate_ra_deg_per_sec": 0.0,
            "freq_lower_hz": 1.0e9,
            "freq_upper_hz": 2.0e9,
            "version": "B",
            "dish_diameter_m": 6.1,
            "subarray": 1
        })
    }

    fn as_map(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_from_json_str_envelope() {
        let payload = json!({
            "ods_data": [record_json("src1", "2026-03-01T00:00:00", "2026-03-01T01:00:00")]
        });
        let instance =
            Instance::from_json_str("test", StandardVersion::B, &payload.to_string()).unwrap();
        assert_eq!(instance.len(), 1);
        assert!(instance.summary().is_all_valid());
        assert!(instance.checksum().is_some());
    }

    #[test]
    fn test_from_json_str_bare_list() {
        let payload =
            json!([record_json("src1", "2026-03-01T00:00:00", "2026-03-01T01:00:00")]);
        let instance =
            Instance::from_json_str("test", StandardVersion::B, &payload.to_string()).unwrap();
        assert_eq!(instance.len(), 1);
    }

    #[test]
    fn test_from_json_str_rejects_non_ods_shapes() {
        let err = Instance::from_json_str("test", StandardVersion::B, "42").unwrap_err();
        assert!(err.to_string().contains("expected an object or a list"));

        let err =
            Instance::from_json_str("test", StandardVersion::B, "{\"other\": []}").unwrap_err();
        assert!(err.to_string().contains("missing ods_data"));

        assert!(Instance::from_json_str("test", StandardVersion::B, "not json {").is_err());
    }

    #[test]
    fn test_skip_and_continue_on_invalid_record() {
        let mut bad = record_json("src2", "2026-03-01T02:00:00", "2026-03-01T03:00:00");
        bad.as_object_mut().unwrap().remove("site_id");
        let payload = json!({ "ods_data": [
            record_json("src1", "2026-03-01T00:00:00", "2026-03-01T01:00:00"),
            bad,
            record_json("src3", "2026-03-01T04:00:00", "2026-03-01T05:00:00"),
        ]});
        let instance =
            Instance::from_json_str("test", StandardVersion::B, &payload.to_string()).unwrap();
        assert_eq!(instance.len(), 2);
        assert_eq!(instance.summary().rejected_count(), 1);
        assert_eq!(instance.summary().rejected[0].index, 1);
        assert_eq!(instance.summary().rejected[0].src_id.as_deref(), Some("src2"));
    }

    #[test]
    fn test_non_mapping_entry_is_counted() {
        let payload = json!({ "ods_data": [
            record_json("src1", "2026-03-01T00:00:00", "2026-03-01T01:00:00"),
            "stray string",
        ]});
        let instance =
            Instance::from_json_str("test", StandardVersion::B, &payload.to_string()).unwrap();
        assert_eq!(instance.len(), 1);
        assert_eq!(instance.summary().rejected_count(), 1);
    }

    #[test]
    fn test_add_applies_defaults_under_explicit_fields() {
        let mut defaults_map = as_map(record_json(
            "default-src",
            "2026-03-01T00:00:00",
            "2026-03-01T01:00:00",
        ));
        defaults_map.remove("src_id");
        let defaults = Defaults::from_map(defaults_map);

        let mut instance = Instance::new("test", StandardVersion::B);
        let explicit = as_map(json!({
            "src_id": "explicit-src",
            "src_ra_j2000_deg": 120.0,
        }));
        instance.add(explicit, &defaults).unwrap();

        let record = instance.first_record().unwrap();
        assert_eq!(record.src_id(), "explicit-src");
        assert!((record.ra_j2000_deg() - 120.0).abs() < 1e-9);
        // fields not overridden come from the defaults
        assert!((record.dec_j2000_deg() + 47.2525).abs() < 1e-9);
    }

    #[test]
    fn test_add_fails_fast_on_incomplete_record() {
        let mut instance = Instance::new("test", StandardVersion::B);
        let err = instance
            .add(as_map(json!({"src_id": "lonely"})), &Defaults::empty())
            .unwrap_err();
        assert!(err.messages.iter().any(|m| m.contains("site_id")));
        assert!(instance.is_empty());
    }

    #[test]
    fn test_defaults_do_not_mutate_under_use() {
        let defaults = Defaults::from_map(as_map(record_json(
            "default-src",
            "2026-03-01T00:00:00",
            "2026-03-01T01:00:00",
        )));
        let before = defaults.clone();
        let mut instance = Instance::new("test", StandardVersion::B);
        instance
            .add(as_map(json!({"src_id": "explicit"})), &defaults)
            .unwrap();
        assert_eq!(defaults, before);
    }

    #[test]
    fn test_sort_by_time() {
        let payload = json!({ "ods_data": [
            record_json("bbb", "2026-03-01T02:00:00", "2026-03-01T03:00:00"),
            record_json("aaa", "2026-03-01T00:00:00", "2026-03-01T01:00:00"),
            record_json("aaa", "2026-03-01T02:00:00", "2026-03-01T03:00:00"),
        ]});
        let mut instance =
            Instance::from_json_str("test", StandardVersion::B, &payload.to_string()).unwrap();
        instance.sort_by_time();
        let ids: Vec<&str> = instance.records().iter().map(|r| r.src_id()).collect();
        assert_eq!(ids, vec!["aaa", "aaa", "bbb"]);
        assert_eq!(
            instance.records()[1].start_utc().to_iso_seconds(),
            "2026-03-01T02:00:00"
        );
    }

    #[test]
    fn test_write_round_trip_preserves_unknown_keys() {
        let mut entry = record_json("src1", "2026-03-01T00:00:00", "2026-03-01T01:00:00");
        entry
            .as_object_mut()
            .unwrap()
            .insert("operator_note".to_string(), json!("keep me"));
        let payload = json!({ "ods_data": [entry] });
        let instance =
            Instance::from_json_str("test", StandardVersion::B, &payload.to_string()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ods_out.json");
        instance.write(&path).unwrap();

        let reread = Instance::read_path(&path, StandardVersion::B).unwrap();
        assert_eq!(reread.len(), 1);
        assert_eq!(
            reread.records()[0].field("operator_note"),
            Some(&json!("keep me"))
        );
        assert_eq!(reread.name(), "ods_out.json");
    }

    #[test]
    fn test_export_delimited() {
        let payload = json!({ "ods_data": [
            record_json("src1", "2026-03-01T00:00:00", "2026-03-01T01:00:00"),
        ]});
        let instance =
            Instance::from_json_str("test", StandardVersion::B, &payload.to_string()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ods.csv");
        instance.export_delimited(&path, ",").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("site_id,site_lat_deg"));
        let row = lines.next().unwrap();
        assert!(row.contains("src1"));
        assert!(row.contains("2026-03-01T00:00:00"));
    }

    #[test]
    fn test_defaults_from_instance_first_record() {
        let payload = json!({ "ods_data": [
            record_json("src1", "2026-03-01T00:00:00", "2026-03-01T01:00:00"),
            record_json("src2", "2026-03-01T02:00:00", "2026-03-01T03:00:00"),
        ]});
        let instance =
            Instance::from_json_str("test", StandardVersion::B, &payload.to_string()).unwrap();
        let defaults = Defaults::from_instance_first_record(&instance);
        assert_eq!(defaults.get("src_id"), Some(&json!("src1")));

        let empty = Instance::new("empty", StandardVersion::B);
        assert!(Defaults::from_instance_first_record(&empty).is_empty());
    }

    #[test]
    fn test_defaults_from_file_flat_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defaults.json");
        std::fs::write(&path, r#"{"site_id": "hcro", "site_lat_deg": 40.8173}"#).unwrap();
        let defaults = Defaults::from_file(&path).unwrap();
        assert_eq!(defaults.get("site_id"), Some(&json!("hcro")));
    }

    #[test]
    fn test_defaults_from_file_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defaults.json");
        let payload = json!({ "ods_data": [
            record_json("src1", "2026-03-01T00:00:00", "2026-03-01T01:00:00"),
        ]});
        std::fs::write(&path, payload.to_string()).unwrap();
        let defaults = Defaults::from_file(&path).unwrap();
        assert_eq!(defaults.get("src_id"), Some(&json!("src1")));
    }

    #[test]
    fn test_read_path_missing_file() {
        let err =
            Instance::read_path(Path::new("/nonexistent/ods_a.json"), StandardVersion::B)
                .unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
