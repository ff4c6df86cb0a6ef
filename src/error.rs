//! Error types for the ODS engine.
//!
//! Each pipeline concern gets its own error type so callers can tell a
//! misconfigured standard apart from a bad record, a bad file, or a failing
//! external collaborator:
//!
//! - [`SchemaError`]: unknown or unsupported standard version (fatal to the
//!   requesting operation)
//! - [`ValidationError`]: a single record failed required-field or type/unit
//!   checks (skipped in batch contexts, raised on single-record adds)
//! - [`ParseError`]: a candidate ODS file is not well-formed (the file is
//!   skipped, the batch continues)
//! - [`CapabilityError`]: an external collaborator such as the elevation
//!   provider failed
//! - [`AssemblyError`]: the assembly run itself cannot proceed

use std::path::Path;

/// Unknown or unsupported ODS standard version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{version} is not an available ODS standard version")]
pub struct SchemaError {
    /// The version tag that was requested.
    pub version: String,
}

impl SchemaError {
    pub fn unknown(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

/// A record failed validation against its standard.
///
/// The whole record is rejected as a unit; `messages` lists every problem
/// found (missing fields by name, type mismatches, out-of-range values), not
/// just the first one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ODS record{}: {}", src_label(.src_id), join_messages(.messages))]
pub struct ValidationError {
    /// Source identifier of the offending record, when one was present.
    pub src_id: Option<String>,
    /// One message per failed check.
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn new(src_id: Option<String>, messages: Vec<String>) -> Self {
        Self { src_id, messages }
    }
}

fn src_label(src_id: &Option<String>) -> String {
    match src_id {
        Some(id) => format!(" (src_id {id})"),
        None => String::new(),
    }
}

fn join_messages(messages: &[String]) -> String {
    messages.join("; ")
}

/// A candidate ODS file could not be read or parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON.
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The JSON is well-formed but not shaped like an ODS payload.
    #[error("{path} is not an ODS payload: {detail}")]
    Shape { path: String, detail: String },
}

impl ParseError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn json(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub fn shape(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Shape {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// An external collaborator (elevation provider, transport) failed.
///
/// Visibility filtering treats this as "visibility unknown" and retains the
/// record; transport failures propagate to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{capability} capability failed: {detail}")]
pub struct CapabilityError {
    /// Name of the capability that failed (e.g. "elevation").
    pub capability: String,
    /// Collaborator-supplied failure description.
    pub detail: String,
}

impl CapabilityError {
    pub fn elevation(detail: impl Into<String>) -> Self {
        Self {
            capability: "elevation".to_string(),
            detail: detail.into(),
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            capability: "transport".to_string(),
            detail: detail.into(),
        }
    }
}

/// A directory assembly run failed.
///
/// Per-file problems are absorbed into the assembly report; only an
/// unreadable source directory or a failed publish is fatal.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// The source directory could not be enumerated.
    #[error("cannot read ODS source directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the assembled instance to its publish target failed.
    #[error("failed to publish assembled ODS to {path}: {detail}")]
    Publish { path: String, detail: String },
}

impl AssemblyError {
    pub fn directory(path: &Path, source: std::io::Error) -> Self {
        Self::Directory {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn publish(path: &Path, detail: impl Into<String>) -> Self {
        Self::Publish {
            path: path.display().to_string(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::unknown("C");
        assert_eq!(err.to_string(), "C is not an available ODS standard version");
    }

    #[test]
    fn test_validation_error_joins_messages() {
        let err = ValidationError::new(
            Some("J0437".to_string()),
            vec!["missing ODS field site_id".to_string(), "400 is out of range for src_ra_j2000_deg".to_string()],
        );
        let text = err.to_string();
        assert!(text.contains("src_id J0437"));
        assert!(text.contains("missing ODS field site_id"));
        assert!(text.contains("out of range"));
    }

    #[test]
    fn test_validation_error_without_src_id() {
        let err = ValidationError::new(None, vec!["missing ODS field src_id".to_string()]);
        assert_eq!(
            err.to_string(),
            "invalid ODS record: missing ODS field src_id"
        );
    }

    #[test]
    fn test_capability_error_constructors() {
        let err = CapabilityError::elevation("ephemeris unavailable");
        assert_eq!(err.capability, "elevation");
        assert!(err.to_string().contains("ephemeris unavailable"));

        let err = CapabilityError::transport("connection refused");
        assert_eq!(err.capability, "transport");
    }

    #[test]
    fn test_parse_error_shape_display() {
        let err = ParseError::shape("ods_x.json", "expected an object or a list");
        assert!(err.to_string().contains("ods_x.json"));
        assert!(err.to_string().contains("expected an object or a list"));
    }

    #[test]
    fn test_assembly_error_publish_display() {
        let err = AssemblyError::publish(Path::new("/data/ods.json"), "disk full");
        assert!(err.to_string().contains("/data/ods.json"));
        assert!(err.to_string().contains("disk full"));
    }
}
