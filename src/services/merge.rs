//! Cross-instance merging and deduplication.
//!
//! `merge` concatenates the records of many instances, normalizes everything
//! to one target standard version, resolves duplicates so exactly one record
//! survives per observation, and emits a deterministically ordered result.
//!
//! Version normalization runs first: records already at the target version
//! pass through; deprecated-version records are upgraded using the target
//! standard's own defaults plus any matching values the record carried among
//! its preserved extra fields. An upgrade that still lacks a required target
//! field rejects the record; it is counted, never silently padded.
//!
//! Duplicate resolution is "most recently produced wins": recency is read
//! from a designated record-internal timestamp field when both contenders
//! carry one, and falls back to insertion order (the later input instance
//! wins) otherwise. The rule is configurable through [`MergeOptions`].

use crate::api::RejectedRecord;
use crate::error::ValidationError;
use crate::models::instance::Instance;
use crate::models::record::{DuplicateKey, RawRecord, Record};
use crate::models::time::OdsTime;
use crate::standard::{Standard, StandardVersion};
use log::{info, warn};
use std::collections::HashMap;

/// Record-internal timestamp field consulted by the default recency rule.
pub const PRODUCED_FIELD: &str = "ods_produced_utc";

/// How conflicting duplicates pick a winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecencyRule {
    /// Compare the named timestamp field; records lacking a parseable value
    /// fall back to insertion order.
    ProducedField(String),
    /// Pure insertion order: the later input instance wins.
    InsertionOrder,
}

impl Default for RecencyRule {
    fn default() -> Self {
        RecencyRule::ProducedField(PRODUCED_FIELD.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub recency: RecencyRule,
}

/// What happened during a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Records across all input instances.
    pub input_records: usize,
    /// Deprecated-version records successfully upgraded to the target.
    pub upgraded: usize,
    /// Records whose upgrade was impossible; indices count across the
    /// concatenated inputs.
    pub upgrade_rejected: Vec<RejectedRecord>,
    /// Records dropped by duplicate resolution.
    pub duplicates_removed: usize,
    /// Records in the merged output.
    pub output_records: usize,
}

/// Merge many instances into one deduplicated, time-sorted instance.
///
/// Output ordering is start time ascending, ties broken by source
/// identifier, then the remaining standard fields. The result is identical for identical
/// inputs regardless of how the input list is ordered. Re-merging an
/// already-merged instance is a no-op.
pub fn merge(
    instances: &[Instance],
    target: StandardVersion,
    options: &MergeOptions,
) -> (Instance, MergeReport) {
    let target_std = Standard::new(target);
    let mut report = MergeReport::default();

    let mut normalized: Vec<Record> = Vec::new();
    for instance in instances {
        for record in instance.records() {
            let index = report.input_records;
            report.input_records += 1;
            if record.version() == target {
                normalized.push(record.clone());
            } else {
                match upgrade_record(record, &target_std) {
                    Ok(upgraded) => {
                        report.upgraded += 1;
                        normalized.push(upgraded);
                    }
                    Err(err) => {
                        warn!(
                            "dropping record {index} of {}: cannot upgrade to version {target}: {err}",
                            instance.name()
                        );
                        report.upgrade_rejected.push(RejectedRecord {
                            index,
                            src_id: err.src_id.clone(),
                            messages: err.messages,
                        });
                    }
                }
            }
        }
    }

    let mut winners: HashMap<DuplicateKey, (Option<OdsTime>, usize, Record)> = HashMap::new();
    for (index, record) in normalized.into_iter().enumerate() {
        let key = record.duplicate_key();
        let produced = recency_of(&record, &options.recency);
        match winners.get(&key) {
            None => {
                winners.insert(key, (produced, index, record));
            }
            Some((held_produced, _, _)) => {
                report.duplicates_removed += 1;
                let newcomer_wins = match (produced, held_produced) {
                    // Both carry a produced timestamp: the more recent wins;
                    // equal timestamps fall through to insertion order.
                    (Some(new), Some(old)) => new >= *old,
                    // Otherwise insertion order: the newcomer is later.
                    _ => true,
                };
                if newcomer_wins {
                    winners.insert(key, (produced, index, record));
                }
            }
        }
    }

    let mut survivors: Vec<Record> = winners.into_values().map(|(_, _, r)| r).collect();
    survivors.sort_by_cached_key(|r| r.sort_key(&target_std));

    let mut merged = Instance::new("merged", target);
    for record in survivors {
        merged.push_record(record);
    }
    report.output_records = merged.len();

    info!(
        "merged {} instances: {} records in, {} out, {} duplicates removed, {} upgrade rejects",
        instances.len(),
        report.input_records,
        report.output_records,
        report.duplicates_removed,
        report.upgrade_rejected.len()
    );
    (merged, report)
}

fn recency_of(record: &Record, rule: &RecencyRule) -> Option<OdsTime> {
    match rule {
        RecencyRule::ProducedField(name) => record.time_field(name),
        RecencyRule::InsertionOrder => None,
    }
}

/// Rebuild a record under the target standard.
///
/// Target fields take their value from the record itself (shared fields and
/// anything it carried as an extra) or from the target standard's defaults;
/// all remaining original fields are preserved as extras. The result must
/// pass full target validation.
fn upgrade_record(record: &Record, target_std: &Standard) -> Result<Record, ValidationError> {
    let standard_defaults = target_std.standard_defaults();
    let mut raw = RawRecord::new();
    for spec in target_std.fields() {
        if let Some(value) = record.field(spec.name).or_else(|| standard_defaults.get(spec.name)) {
            raw.insert(spec.name.to_string(), value.clone());
        }
    }
    for (key, value) in record.fields() {
        if !raw.contains_key(key) {
            raw.insert(key.clone(), value.clone());
        }
    }
    Record::validate(raw, target_std)
}
