//! Validated ODS records.
//!
//! A [`Record`] can only be built through [`Record::validate`], so any record
//! held by an [`Instance`](crate::models::instance::Instance) is known to be
//! complete and type-valid for its standard version. Core logic reads typed
//! accessors; the full ordered field map (including keys the standard does
//! not recognize) is preserved verbatim for round-trip.
//!
//! Records are immutable after acceptance: duplicate conflicts are resolved
//! by whole-record replacement, never by field-level patching.

use crate::api::GeographicLocation;
use crate::error::ValidationError;
use crate::models::time::OdsTime;
use crate::standard::{self, Standard, StandardVersion};
use serde_json::{Map, Value};

/// An unvalidated record: an ordered field-name → value mapping, exactly as
/// parsed from JSON.
pub type RawRecord = Map<String, Value>;

/// One observation's complete field set under a given standard version.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    version: StandardVersion,
    src_id: String,
    ra_deg: f64,
    dec_deg: f64,
    start: OdsTime,
    end: Option<OdsTime>,
    fields: RawRecord,
}

impl Record {
    /// Validate a raw record against a standard and build the typed record.
    ///
    /// Every required field of the standard must be present and pass its
    /// type/range check; all failures are collected and reported together.
    /// Fields the standard does not recognize are preserved and never affect
    /// the outcome. Time fields are rewritten to the canonical ISO-8601
    /// seconds form so equality and output are stable.
    pub fn validate(raw: RawRecord, std: &Standard) -> Result<Self, ValidationError> {
        let mut messages = Vec::new();
        for spec in std.fields() {
            match raw.get(spec.name) {
                None => messages.push(format!("missing ODS field {}", spec.name)),
                Some(value) => {
                    if let Err(msg) = spec.validate_value(value) {
                        messages.push(msg);
                    }
                }
            }
        }
        if !messages.is_empty() {
            let src_id = raw
                .get(standard::SRC_ID)
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(ValidationError::new(src_id, messages));
        }

        let mut fields = raw;
        let mut times = [None, None];
        for (slot, &name) in std.time_fields().iter().enumerate() {
            if let Some(value) = fields.get(name) {
                // Validated above, so the string parses.
                let parsed = value
                    .as_str()
                    .and_then(|s| OdsTime::parse(s).ok())
                    .expect("time field validated");
                fields.insert(name.to_string(), Value::String(parsed.to_iso_seconds()));
                times[slot] = Some(parsed);
            }
        }

        let src_id = fields
            .get(standard::SRC_ID)
            .and_then(Value::as_str)
            .expect("src_id validated")
            .to_string();
        let ra_deg = fields
            .get(standard::SRC_RA)
            .and_then(standard::coerce_f64)
            .expect("src_ra_j2000_deg validated");
        let dec_deg = fields
            .get(standard::SRC_DEC)
            .and_then(standard::coerce_f64)
            .expect("src_dec_j2000_deg validated");

        Ok(Self {
            version: std.version(),
            src_id,
            ra_deg,
            dec_deg,
            start: times[0].expect("src_start_utc validated"),
            end: times[1],
            fields,
        })
    }

    pub fn version(&self) -> StandardVersion {
        self.version
    }

    pub fn src_id(&self) -> &str {
        &self.src_id
    }

    /// Right ascension, J2000 degrees.
    pub fn ra_j2000_deg(&self) -> f64 {
        self.ra_deg
    }

    /// Declination, J2000 degrees.
    pub fn dec_j2000_deg(&self) -> f64 {
        self.dec_deg
    }

    pub fn start_utc(&self) -> OdsTime {
        self.start
    }

    /// Observation end; `None` means open-ended.
    pub fn end_utc(&self) -> Option<OdsTime> {
        self.end
    }

    /// The full ordered field map, unrecognized keys included.
    pub fn fields(&self) -> &RawRecord {
        &self.fields
    }

    /// Look up any field by name, recognized by the standard or not.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read a named field as a timestamp, if present and parseable.
    pub fn time_field(&self, name: &str) -> Option<OdsTime> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .and_then(|s| OdsTime::parse(s).ok())
    }

    /// Observing site described by the record's own site fields.
    pub fn site(&self) -> Option<GeographicLocation> {
        let lat = self.fields.get(standard::SITE_LAT).and_then(standard::coerce_f64)?;
        let lon = self.fields.get(standard::SITE_LON).and_then(standard::coerce_f64)?;
        let el = self.fields.get(standard::SITE_EL).and_then(standard::coerce_f64);
        GeographicLocation::new(lat, lon, el).ok()
    }

    /// The equality key for deduplication: same source, same window, same
    /// position means "the same observation" even when other fields differ.
    pub fn duplicate_key(&self) -> DuplicateKey {
        DuplicateKey {
            src_id: self.src_id.clone(),
            start: self.start.to_iso_seconds(),
            end: self.end.map(|t| t.to_iso_seconds()),
            ra_bits: self.ra_deg.to_bits(),
            dec_bits: self.dec_deg.to_bits(),
        }
    }

    /// Canonical string per sort-key field, used for deterministic ordering.
    /// Time fields hold ISO-8601 strings, so string order is time order.
    pub(crate) fn sort_key(&self, std: &Standard) -> Vec<String> {
        std.sort_order_time()
            .iter()
            .map(|name| match self.fields.get(*name) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            })
            .collect()
    }

    /// Replacement copy with a different observation window.
    pub(crate) fn with_window(&self, start: OdsTime, end: Option<OdsTime>) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(
            standard::SRC_START.to_string(),
            Value::String(start.to_iso_seconds()),
        );
        match end {
            Some(t) => {
                fields.insert(
                    standard::SRC_END.to_string(),
                    Value::String(t.to_iso_seconds()),
                );
            }
            None => {
                fields.shift_remove(standard::SRC_END);
            }
        }
        Self {
            start,
            end,
            fields,
            ..self.clone()
        }
    }
}

/// Derived field subset that identifies "the same observation".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    src_id: String,
    start: String,
    end: Option<String>,
    ra_bits: u64,
    dec_bits: u64,
}
