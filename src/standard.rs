//! ODS standard registry.
//!
//! Two published versions of the ODS record standard are supported: version
//! `A` (deprecated) and version `B` (current, Sept 2025). For each version
//! the registry answers:
//!
//! - the ordered list of required fields with their type and unit/range
//!   constraints
//! - the time fields and the time-ordered sort key
//! - the top-level data key of the file format (`ods_data`)
//! - defaults defined by the standard itself (distinct from caller-supplied
//!   defaults)
//!
//! A [`Standard`] only answers for its own version; there is no
//! cross-version field leakage. Unknown version tags fail with
//! [`SchemaError`].

use crate::error::SchemaError;
use crate::models::time::OdsTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Top-level key of an ODS JSON file.
pub const DATA_KEY: &str = "ods_data";

/// Field names used by core logic (identical across published versions).
pub const SRC_ID: &str = "src_id";
pub const SRC_RA: &str = "src_ra_j2000_deg";
pub const SRC_DEC: &str = "src_dec_j2000_deg";
pub const SRC_START: &str = "src_start_utc";
pub const SRC_END: &str = "src_end_utc";
pub const SITE_LAT: &str = "site_lat_deg";
pub const SITE_LON: &str = "site_lon_deg";
pub const SITE_EL: &str = "site_el_m";

/// Published ODS standard versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardVersion {
    /// Deprecated standard.
    A,
    /// Current standard.
    B,
}

/// The version `latest` resolves to.
pub const LATEST: StandardVersion = StandardVersion::B;

impl StandardVersion {
    pub fn latest() -> Self {
        LATEST
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StandardVersion::A => "A",
            StandardVersion::B => "B",
        }
    }
}

impl fmt::Display for StandardVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardVersion {
    type Err = SchemaError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim() {
            "A" | "a" => Ok(StandardVersion::A),
            "B" | "b" => Ok(StandardVersion::B),
            "latest" => Ok(StandardVersion::latest()),
            other => Err(SchemaError::unknown(other)),
        }
    }
}

impl Serialize for StandardVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StandardVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Value type of an ODS field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Float,
    Int,
    Bool,
    Time,
}

impl FieldKind {
    /// Type name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Str => "string",
            FieldKind::Float => "float",
            FieldKind::Int => "int",
            FieldKind::Bool => "bool",
            FieldKind::Time => "UTC time",
        }
    }
}

/// Unit/range constraint attached to a field beyond its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCheck {
    /// Any value of the right type.
    Any,
    /// Non-empty string.
    NonEmpty,
    /// Right ascension, J2000 degrees in [0, 360).
    RaDeg,
    /// Declination, J2000 degrees in [-90, 90].
    DecDeg,
    /// Geographic latitude in degrees, [-90, 90].
    LatDeg,
    /// Geographic longitude in degrees, [-180, 180].
    LonDeg,
    /// Non-negative quantity (durations, frequencies, diameters).
    NonNegative,
}

/// One required field of a standard version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub check: ValueCheck,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind, check: ValueCheck) -> Self {
        Self { name, kind, check }
    }

    /// Check a JSON value against this field's type and range constraint.
    ///
    /// Numeric coercion mirrors what observers actually send: an integer
    /// literal satisfies a float field, a float with no fractional part
    /// satisfies an int field, and numeric strings are accepted for numeric
    /// fields. The stored value is left untouched; coercion exists only for
    /// the check.
    pub fn validate_value(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Err(format!("value for {} is null", self.name));
        }
        match self.kind {
            FieldKind::Str => match value.as_str() {
                Some(s) => self.check_str(s),
                None => Err(self.type_error(value)),
            },
            FieldKind::Float => match coerce_f64(value) {
                Some(x) => self.check_f64(x),
                None => Err(self.type_error(value)),
            },
            FieldKind::Int => match coerce_i64(value) {
                Some(x) => self.check_f64(x as f64),
                None => Err(self.type_error(value)),
            },
            FieldKind::Bool => match coerce_bool(value) {
                Some(_) => Ok(()),
                None => Err(self.type_error(value)),
            },
            FieldKind::Time => match value.as_str() {
                Some(s) => OdsTime::parse(s)
                    .map(|_| ())
                    .map_err(|_| format!("{s} is not a valid UTC time for {}", self.name)),
                None => Err(self.type_error(value)),
            },
        }
    }

    fn check_str(&self, s: &str) -> Result<(), String> {
        match self.check {
            ValueCheck::NonEmpty if s.trim().is_empty() => {
                Err(format!("{} must not be empty", self.name))
            }
            _ => Ok(()),
        }
    }

    fn check_f64(&self, x: f64) -> Result<(), String> {
        let ok = match self.check {
            ValueCheck::RaDeg => (0.0..360.0).contains(&x),
            ValueCheck::DecDeg | ValueCheck::LatDeg => (-90.0..=90.0).contains(&x),
            ValueCheck::LonDeg => (-180.0..=180.0).contains(&x),
            ValueCheck::NonNegative => x >= 0.0,
            ValueCheck::Any | ValueCheck::NonEmpty => true,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{x} is out of range for {}", self.name))
        }
    }

    fn type_error(&self, value: &Value) -> String {
        format!(
            "{value} is wrong type for {} (expected {})",
            self.name,
            self.kind.name()
        )
    }
}

pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|x| x.fract() == 0.0).map(|x| x as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" | "True" => Some(true),
            "false" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

use FieldKind::{Bool, Float, Int, Str, Time};
use ValueCheck::{Any, DecDeg, LatDeg, LonDeg, NonEmpty, NonNegative, RaDeg};

const FIELDS_A: &[FieldSpec] = &[
    FieldSpec::new("site_id", Str, NonEmpty),
    FieldSpec::new("site_lat_deg", Float, LatDeg),
    FieldSpec::new("site_lon_deg", Float, LonDeg),
    FieldSpec::new("site_el_m", Float, Any),
    FieldSpec::new("src_id", Str, NonEmpty),
    FieldSpec::new("src_is_pulsar_bool", Bool, Any),
    FieldSpec::new("corr_integ_time_sec", Float, NonNegative),
    FieldSpec::new("src_ra_j2000_deg", Float, RaDeg),
    FieldSpec::new("src_dec_j2000_deg", Float, DecDeg),
    FieldSpec::new("src_radius", Float, NonNegative),
    FieldSpec::new("src_start_utc", Time, Any),
    FieldSpec::new("src_end_utc", Time, Any),
    FieldSpec::new("slew_sec", Float, NonNegative),
    FieldSpec::new("trk_rate_dec_deg_per_sec", Float, Any),
    FieldSpec::new("trk_rate_ra_deg_per_sec", Float, Any),
    FieldSpec::new("freq_lower_hz", Float, NonNegative),
    FieldSpec::new("freq_upper_hz", Float, NonNegative),
    FieldSpec::new("notes", Str, Any),
];

const FIELDS_B: &[FieldSpec] = &[
    FieldSpec::new("site_id", Str, NonEmpty),
    FieldSpec::new("site_lat_deg", Float, LatDeg),
    FieldSpec::new("site_lon_deg", Float, LonDeg),
    FieldSpec::new("site_el_m", Float, Any),
    FieldSpec::new("src_id", Str, NonEmpty),
    FieldSpec::new("corr_integ_time_sec", Float, NonNegative),
    FieldSpec::new("src_ra_j2000_deg", Float, RaDeg),
    FieldSpec::new("src_dec_j2000_deg", Float, DecDeg),
    FieldSpec::new("src_start_utc", Time, Any),
    FieldSpec::new("src_end_utc", Time, Any),
    FieldSpec::new("slew_sec", Float, NonNegative),
    FieldSpec::new("trk_rate_dec_deg_per_sec", Float, Any),
    FieldSpec::new("trk_rate_ra_deg_per_sec", Float, Any),
    FieldSpec::new("freq_lower_hz", Float, NonNegative),
    FieldSpec::new("freq_upper_hz", Float, NonNegative),
    FieldSpec::new("version", Str, NonEmpty),
    FieldSpec::new("dish_diameter_m", Float, NonNegative),
    FieldSpec::new("subarray", Int, NonNegative),
];

// Deterministic output ordering: start time first, then source identifier
// as the tie-break, then the remaining fields for a total order.
const SORT_ORDER_A: &[&str] = &[
    "src_start_utc",
    "src_id",
    "src_end_utc",
    "site_id",
    "site_lat_deg",
    "site_lon_deg",
    "site_el_m",
    "src_is_pulsar_bool",
    "corr_integ_time_sec",
    "src_ra_j2000_deg",
    "src_dec_j2000_deg",
    "src_radius",
    "slew_sec",
    "trk_rate_dec_deg_per_sec",
    "trk_rate_ra_deg_per_sec",
    "freq_lower_hz",
    "freq_upper_hz",
    "notes",
];

const SORT_ORDER_B: &[&str] = &[
    "src_start_utc",
    "src_id",
    "src_end_utc",
    "site_id",
    "site_lat_deg",
    "site_lon_deg",
    "site_el_m",
    "corr_integ_time_sec",
    "src_ra_j2000_deg",
    "src_dec_j2000_deg",
    "slew_sec",
    "trk_rate_dec_deg_per_sec",
    "trk_rate_ra_deg_per_sec",
    "freq_lower_hz",
    "freq_upper_hz",
    "version",
    "dish_diameter_m",
    "subarray",
];

const TIME_FIELDS: &[&str] = &[SRC_START, SRC_END];

/// One version of the ODS standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standard {
    version: StandardVersion,
}

impl Standard {
    pub fn new(version: StandardVersion) -> Self {
        Self { version }
    }

    /// Resolve a version tag (`"A"`, `"B"`, `"latest"`).
    pub fn from_tag(tag: &str) -> Result<Self, SchemaError> {
        Ok(Self::new(tag.parse()?))
    }

    pub fn version(&self) -> StandardVersion {
        self.version
    }

    /// Required fields in standard order.
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self.version {
            StandardVersion::A => FIELDS_A,
            StandardVersion::B => FIELDS_B,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn is_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Key order for time-sorted output.
    pub fn sort_order_time(&self) -> &'static [&'static str] {
        match self.version {
            StandardVersion::A => SORT_ORDER_A,
            StandardVersion::B => SORT_ORDER_B,
        }
    }

    pub fn time_fields(&self) -> &'static [&'static str] {
        TIME_FIELDS
    }

    pub fn start_field(&self) -> &'static str {
        SRC_START
    }

    pub fn end_field(&self) -> &'static str {
        SRC_END
    }

    pub fn data_key(&self) -> &'static str {
        DATA_KEY
    }

    /// Default values defined by the standard itself.
    ///
    /// These apply during version upgrades and before caller-supplied
    /// defaults; version B declares its own `version` tag, version A
    /// declares nothing.
    pub fn standard_defaults(&self) -> Map<String, Value> {
        let mut defaults = Map::new();
        if self.version == StandardVersion::B {
            defaults.insert(
                "version".to_string(),
                Value::String(StandardVersion::B.as_str().to_string()),
            );
        }
        defaults
    }
}
