//! Property tests for the merge stage: idempotence, determinism under
//! input permutation, and at-most-one-record-per-observation.

use ods_rust::api::*;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;

fn base_time() -> OdsTime {
    OdsTime::parse("2026-03-01T00:00:00").unwrap()
}

fn raw_record(src: u8, start_hour: u32, produced_min: Option<u32>) -> RawRecord {
    let start = base_time().offset_seconds(i64::from(start_hour) * 3600);
    let end = start.offset_seconds(1800);
    let mut value = json!({
        "site_id": "hcro",
        "site_lat_deg": 40.8173,
        "site_lon_deg": -121.4695,
        "site_el_m": 1019.0,
        "src_id": format!("src{src}"),
        "corr_integ_time_sec": 10.0,
        "src_ra_j2000_deg": 69.3162,
        "src_dec_j2000_deg": -47.2525,
        "src_start_utc": start.to_iso_seconds(),
        "src_end_utc": end.to_iso_seconds(),
        "slew_sec": 30.0,
        "trk_rate_dec_deg_per_sec": 0.0,
        "trk_rate_ra_deg_per_sec": 0.0,
        "freq_lower_hz": 1.0e9,
        "freq_upper_hz": 2.0e9,
        "version": "B",
        "dish_diameter_m": 6.1,
        "subarray": 1
    });
    if let Some(minutes) = produced_min {
        let produced = base_time().offset_seconds(-i64::from(minutes) * 60);
        value.as_object_mut().unwrap().insert(
            "ods_produced_utc".to_string(),
            json!(produced.to_iso_seconds()),
        );
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

prop_compose! {
    fn arb_raw_record()(
        src in 0u8..4,
        start_hour in 0u32..8,
        produced_min in proptest::option::of(0u32..120),
    ) -> RawRecord {
        raw_record(src, start_hour, produced_min)
    }
}

fn arb_raw_records() -> impl Strategy<Value = Vec<RawRecord>> {
    proptest::collection::vec(arb_raw_record(), 0..12)
}

/// Records guaranteed to have pairwise-distinct duplicate keys.
fn arb_distinct_raw_records() -> impl Strategy<Value = Vec<RawRecord>> {
    proptest::collection::btree_set(0u32..200, 0..10).prop_map(|hours| {
        hours
            .into_iter()
            .map(|hour| raw_record(0, hour, Some(hour)))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_merge_is_idempotent(raws in arb_raw_records()) {
        let input = Instance::from_raw_records("input", StandardVersion::B, raws);
        let (once, _) = merge(&[input], StandardVersion::B, &MergeOptions::default());
        let (twice, report) = merge(
            &[once.clone()],
            StandardVersion::B,
            &MergeOptions::default(),
        );
        prop_assert_eq!(once.records(), twice.records());
        prop_assert_eq!(report.duplicates_removed, 0);
    }

    #[test]
    fn prop_merge_order_independent_for_distinct_records(
        raws in arb_distinct_raw_records(),
        split in 0usize..10,
    ) {
        let split = split.min(raws.len());
        let first = Instance::from_raw_records(
            "first",
            StandardVersion::B,
            raws[..split].to_vec(),
        );
        let second = Instance::from_raw_records(
            "second",
            StandardVersion::B,
            raws[split..].to_vec(),
        );
        let (forward, _) = merge(
            &[first.clone(), second.clone()],
            StandardVersion::B,
            &MergeOptions::default(),
        );
        let (backward, _) = merge(
            &[second, first],
            StandardVersion::B,
            &MergeOptions::default(),
        );
        prop_assert_eq!(forward.records(), backward.records());
    }

    #[test]
    fn prop_merged_output_has_unique_duplicate_keys(raws in arb_raw_records()) {
        let input_len = raws.len();
        let input = Instance::from_raw_records("input", StandardVersion::B, raws);
        let (merged, report) = merge(&[input], StandardVersion::B, &MergeOptions::default());

        let keys: HashSet<DuplicateKey> =
            merged.records().iter().map(|r| r.duplicate_key()).collect();
        prop_assert_eq!(keys.len(), merged.len());
        prop_assert_eq!(merged.len() + report.duplicates_removed, input_len);
    }

    #[test]
    fn prop_merged_output_is_sorted(raws in arb_raw_records()) {
        let input = Instance::from_raw_records("input", StandardVersion::B, raws);
        let (merged, _) = merge(&[input], StandardVersion::B, &MergeOptions::default());
        let order: Vec<(OdsTime, String)> = merged
            .records()
            .iter()
            .map(|r| (r.start_utc(), r.src_id().to_string()))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();
        prop_assert_eq!(order, sorted);
    }
}
