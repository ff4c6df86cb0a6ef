//! Directory assembly orchestration.
//!
//! `assemble` turns a holding directory of per-observer ODS files into one
//! publishable instance: SCAN the directory for candidate files, VALIDATE
//! every record of every file (skip-and-continue), MERGE the surviving
//! instances into one deduplicated collection, CULL stale and non-visible
//! records, and optionally PUBLISH the result.
//!
//! A single bad file or record never fails the run; everything absorbed
//! along the way is counted in the [`AssemblyReport`]. The only fatal
//! conditions are an unreadable source directory and a failed publish.

use crate::config::AssemblyConfig;
use crate::error::{AssemblyError, ParseError};
use crate::models::instance::Instance;
use crate::models::time::OdsTime;
use crate::services::merge::{merge, MergeReport};
use crate::services::visibility::{
    cull_by_elevation, cull_by_time, CullPolicy, CullReport, ElevationProvider,
};
use crate::standard::{StandardVersion, DATA_KEY};
use log::{info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Result of a directory assembly run.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    /// The assembled, deduplicated, culled instance.
    pub instance: Instance,
    /// Everything that happened along the way.
    pub report: AssemblyReport,
}

/// Counters and per-file outcomes from one assembly run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    /// Candidate files matching the naming convention.
    pub files_found: usize,
    /// Files parsed into instances.
    pub files_parsed: usize,
    /// Files skipped as unreadable or malformed: `(file name, reason)`.
    pub files_skipped: Vec<(String, String)>,
    /// Per-file invalid-record counts: `(file name, rejects)`.
    pub file_rejects: Vec<(String, usize)>,
    /// What the merge stage did.
    pub merge: MergeReport,
    /// What the stale-time cull did.
    pub time_cull: CullReport,
    /// What the elevation cull did, when a provider was supplied.
    pub elevation_cull: Option<CullReport>,
    /// Reference time the culls ran against.
    pub reference_time: OdsTime,
    /// Where the result was published, when requested.
    pub published_to: Option<PathBuf>,
}

impl AssemblyReport {
    /// Records rejected anywhere in the run: per-file validation rejects
    /// plus merge-stage upgrade rejects.
    pub fn rejected_records(&self) -> usize {
        let file_rejects: usize = self.file_rejects.iter().map(|(_, n)| n).sum();
        file_rejects + self.merge.upgrade_rejected.len()
    }
}

/// Assemble one instance from every ODS file in a directory.
///
/// Candidate files match `<file_prefix>*.json` (per the config); passing a
/// path to a JSON file uses that file's directory, mirroring how holding
/// directories are usually addressed. Files are processed in name order so
/// identical directory contents give identical output.
///
/// # Errors
///
/// [`AssemblyError::Directory`] when the directory cannot be enumerated;
/// [`AssemblyError::Publish`] when a requested publish write fails.
pub fn assemble(
    directory: &Path,
    config: &AssemblyConfig,
    elevation: Option<&dyn ElevationProvider>,
) -> Result<Assembly, AssemblyError> {
    let directory = resolve_directory(directory);
    let candidates = scan(directory, &config.file_prefix)?;
    info!(
        "found {} ODS files in {}",
        candidates.len(),
        directory.display()
    );

    let mut files_skipped = Vec::new();
    let mut file_rejects = Vec::new();
    let mut instances = Vec::new();
    for path in &candidates {
        let label = file_label(path);
        match read_instance(path, config.version) {
            Ok(instance) => {
                file_rejects.push((label, instance.summary().rejected_count()));
                instances.push(instance);
            }
            Err(err) => {
                warn!("skipping {label}: {err}");
                files_skipped.push((label, err.to_string()));
            }
        }
    }

    let (mut merged, merge_report) = merge(&instances, config.version, &config.merge_options());
    merged.set_name("assembly");

    let reference_time = config.reference_time.unwrap_or_else(OdsTime::now);
    let (culled, time_cull) = cull_by_time(&merged, reference_time, CullPolicy::Stale);
    let (instance, elevation_cull) = match elevation {
        Some(provider) => {
            let (instance, report) =
                cull_by_elevation(&culled, reference_time, provider, config.el_limit_deg);
            (instance, Some(report))
        }
        None => (culled, None),
    };

    let mut report = AssemblyReport {
        files_found: candidates.len(),
        files_parsed: instances.len(),
        files_skipped,
        file_rejects,
        merge: merge_report,
        time_cull,
        elevation_cull,
        reference_time,
        published_to: None,
    };

    if let Some(post_to) = &config.post_to {
        instance
            .write(post_to)
            .map_err(|e| AssemblyError::publish(post_to, e.to_string()))?;
        info!("posted assembled ODS to {}", post_to.display());
        report.published_to = Some(post_to.clone());
    }

    Ok(Assembly { instance, report })
}

/// A JSON file path addresses its holding directory.
fn resolve_directory(directory: &Path) -> &Path {
    if directory.extension().is_some_and(|e| e == "json") {
        match directory.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    } else {
        directory
    }
}

/// Candidate files in name order.
fn scan(directory: &Path, prefix: &str) -> Result<Vec<PathBuf>, AssemblyError> {
    let entries =
        std::fs::read_dir(directory).map_err(|e| AssemblyError::directory(directory, e))?;
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AssemblyError::directory(directory, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(prefix) && name.ends_with(".json") && path.is_file() {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_instance(path: &Path, fallback: StandardVersion) -> Result<Instance, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|e| ParseError::io(path, e))?;
    let version = sniff_version(&text).unwrap_or(fallback);
    Instance::from_json_str(file_label(path), version, &text)
}

/// Guess a file's standard version from its first record.
///
/// Version B records are required to carry a `version` field; version A has
/// no such field, so a first record without one reads as A. Files whose
/// version cannot be guessed (empty, malformed) fall back to the configured
/// target; malformed files still fail properly during the real parse.
fn sniff_version(text: &str) -> Option<StandardVersion> {
    let payload: Value = serde_json::from_str(text).ok()?;
    let entries = match &payload {
        Value::Object(map) => map.get(DATA_KEY)?.as_array()?,
        Value::Array(entries) => entries,
        _ => return None,
    };
    let first = entries.first()?.as_object()?;
    match first.get("version").and_then(Value::as_str) {
        Some(tag) => tag.parse().ok(),
        None => Some(StandardVersion::A),
    }
}
