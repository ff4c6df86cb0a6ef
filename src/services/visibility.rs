//! Time and visibility culling.
//!
//! This module removes records that are no longer worth publishing:
//!
//! - expired records, whose observation window ended before a reference time
//! - records whose source sits below the site horizon at the reference time
//!
//! Elevation comes from an [`ElevationProvider`] capability implemented
//! outside the core (an ephemeris library, a site service). A provider
//! failure means "visibility unknown": the record is retained and the
//! failure counted, so a computation fault never silently loses data.
//!
//! Also here: window-overlap continuity adjustment and time-coverage
//! reporting over an instance.

use crate::error::CapabilityError;
use crate::models::instance::Instance;
use crate::models::record::Record;
use crate::models::time::OdsTime;
use log::{info, warn};

/// Which records a time cull removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullPolicy {
    /// Drop records whose end time is strictly before the reference time.
    Stale,
    /// Drop stale records and records that have not started yet, leaving
    /// only those active at the reference time.
    Inactive,
}

/// Counters from a cull pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullReport {
    /// Records examined.
    pub examined: usize,
    /// Records dropped because their window ended before the reference.
    pub dropped_stale: usize,
    /// Records dropped because their window had not started (Inactive only).
    pub dropped_pending: usize,
    /// Records dropped because the source was below the elevation limit.
    pub dropped_below_horizon: usize,
    /// Records retained because elevation could not be evaluated.
    pub elevation_unknown: usize,
}

/// Remove expired (and optionally not-yet-started) records.
///
/// A record with no end time is open-ended and is never culled as stale.
/// The comparison is strict: a record ending exactly at `reference` is
/// retained.
pub fn cull_by_time(
    instance: &Instance,
    reference: OdsTime,
    policy: CullPolicy,
) -> (Instance, CullReport) {
    let mut report = CullReport::default();
    let mut culled = Instance::new(instance.name().to_string(), instance.version());
    for record in instance.records() {
        report.examined += 1;
        if let Some(end) = record.end_utc() {
            if end < reference {
                report.dropped_stale += 1;
                continue;
            }
        }
        if policy == CullPolicy::Inactive && record.start_utc() > reference {
            report.dropped_pending += 1;
            continue;
        }
        culled.push_record(record.clone());
    }
    info!(
        "{}: time cull at {reference} retained {} of {}",
        instance.name(),
        culled.len(),
        report.examined
    );
    (culled, report)
}

/// Elevation capability consumed by the elevation cull.
///
/// The provider embodies the observing site; given a J2000 position and a
/// UTC instant it answers the source elevation above the horizon in
/// degrees, or fails with a [`CapabilityError`].
pub trait ElevationProvider {
    fn elevation_deg(&self, ra_deg: f64, dec_deg: f64, at: OdsTime)
        -> Result<f64, CapabilityError>;
}

/// Remove records whose source is below `el_limit_deg` at the reference
/// time.
///
/// Provider failures are surfaced, not swallowed: the record is treated as
/// "visibility unknown", retained, and counted in the report.
pub fn cull_by_elevation(
    instance: &Instance,
    reference: OdsTime,
    provider: &dyn ElevationProvider,
    el_limit_deg: f64,
) -> (Instance, CullReport) {
    let mut report = CullReport::default();
    let mut culled = Instance::new(instance.name().to_string(), instance.version());
    for record in instance.records() {
        report.examined += 1;
        match provider.elevation_deg(record.ra_j2000_deg(), record.dec_j2000_deg(), reference) {
            Ok(elevation) if elevation < el_limit_deg => {
                report.dropped_below_horizon += 1;
            }
            Ok(_) => culled.push_record(record.clone()),
            Err(err) => {
                warn!(
                    "{}: retaining {} with unknown visibility: {err}",
                    instance.name(),
                    record.src_id()
                );
                report.elevation_unknown += 1;
                culled.push_record(record.clone());
            }
        }
    }
    info!(
        "{}: elevation cull at {reference} retained {} of {}",
        instance.name(),
        culled.len(),
        report.examined
    );
    (culled, report)
}

/// Indices of records whose observation window contains `at`.
pub fn active_records(instance: &Instance, at: OdsTime) -> Vec<usize> {
    instance
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            record.start_utc() <= at && record.end_utc().map_or(true, |end| at <= end)
        })
        .map(|(index, _)| index)
        .collect()
}

/// Time coverage of an instance's bounded observation windows.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    /// Seconds covered by at least one record.
    pub covered_sec: i64,
    /// Seconds from the earliest start to the latest end.
    pub span_sec: i64,
    /// The merged, non-overlapping windows.
    pub windows: Vec<(OdsTime, OdsTime)>,
}

impl Coverage {
    /// Fraction of the span covered by at least one record.
    pub fn fraction(&self) -> f64 {
        if self.span_sec == 0 {
            1.0
        } else {
            self.covered_sec as f64 / self.span_sec as f64
        }
    }
}

/// Merge every bounded observation window and report how much of the
/// overall span they cover. Open-ended records are skipped; `None` when no
/// bounded window exists.
pub fn coverage(instance: &Instance) -> Option<Coverage> {
    let mut windows: Vec<(OdsTime, OdsTime)> = instance
        .records()
        .iter()
        .filter_map(|r| r.end_utc().map(|end| (r.start_utc(), end)))
        .collect();
    if windows.is_empty() {
        return None;
    }
    windows.sort();

    let mut merged: Vec<(OdsTime, OdsTime)> = Vec::new();
    for (start, end) in windows {
        match merged.last_mut() {
            Some(last) if start <= last.1 => {
                if end > last.1 {
                    last.1 = end;
                }
            }
            _ => merged.push((start, end)),
        }
    }

    let covered_sec = merged.iter().map(|(s, e)| s.seconds_until(e)).sum();
    let span_sec = merged[0].0.seconds_until(&merged[merged.len() - 1].1);
    Some(Coverage {
        covered_sec,
        span_sec,
        windows: merged,
    })
}

/// Which window edge continuity adjustment moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustEdge {
    /// Push the later record's start after the earlier record's end.
    Start,
    /// Pull the earlier record's end before the later record's start.
    Stop,
}

/// Separate overlapping neighbor windows by `gap_sec`.
///
/// Records are time-sorted first; each overlapping pair is resolved by
/// replacing one record with a window-shifted copy (records are never
/// mutated in place). Open-ended records are left alone.
pub fn continuity(instance: &Instance, gap_sec: i64, adjust: AdjustEdge) -> Instance {
    let mut sorted = instance.clone();
    sorted.sort_by_time();
    let mut records: Vec<Record> = sorted.records().to_vec();

    for i in 0..records.len().saturating_sub(1) {
        let Some(this_end) = records[i].end_utc() else {
            continue;
        };
        let next_start = records[i + 1].start_utc();
        if next_start >= this_end {
            continue;
        }
        match adjust {
            AdjustEdge::Start => {
                let moved_start = this_end.offset_seconds(gap_sec);
                let next_end = records[i + 1].end_utc();
                records[i + 1] = records[i + 1].with_window(moved_start, next_end);
                if next_end.is_some_and(|end| moved_start > end) {
                    warn!(
                        "{}: adjusted start of {} passes its end",
                        instance.name(),
                        records[i + 1].src_id()
                    );
                }
            }
            AdjustEdge::Stop => {
                let moved_end = next_start.offset_seconds(-gap_sec);
                let this_start = records[i].start_utc();
                records[i] = records[i].with_window(this_start, Some(moved_end));
                if moved_end < this_start {
                    warn!(
                        "{}: adjusted end of {} passes its start",
                        instance.name(),
                        records[i].src_id()
                    );
                }
            }
        }
    }

    let mut adjusted = Instance::new(instance.name().to_string(), instance.version());
    for record in records {
        adjusted.push_record(record);
    }
    adjusted
}
