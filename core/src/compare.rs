//! Version comparison
//!
//! Pure read-side analysis of two resolved versions: a unified diff of
//! their configs, per-metric deltas, and row-set overlap of their
//! processed data. Nothing here mutates the repository.

use crate::canonical;
use crate::data::Table;
use crate::error::Result;
use crate::hash;
use crate::model::{ComparisonReport, DataOverlap, MetricDelta, VersionInfo};
use crate::repository::{Artifact, Repository};
use indexmap::IndexMap;
use serde_json::Value;
use similar::TextDiff;
use std::collections::BTreeSet;

/// How many differing rows to surface per side in the report.
const MAX_EXAMPLES: usize = 5;

/// Metrics-document keys that are identity bookkeeping, not metrics.
const BOOKKEEPING_KEYS: &[&str] = &[
    "version_hash",
    "raw_hash",
    "config_hash",
    "created_at",
    "created_by",
];

/// Compare two versions (hashes or tags) of a repository.
pub fn compare(repo: &Repository, left: &str, right: &str) -> Result<ComparisonReport> {
    let left_info = repo.resolve(left)?;
    let right_info = repo.resolve(right)?;
    let left_table = repo.load_table(&left_info.hash, Artifact::Processed)?;
    let right_table = repo.load_table(&right_info.hash, Artifact::Processed)?;

    let config_diff = config_diff(&left_info, &right_info);
    let metrics_diff = metrics_diff(&left_info.metrics, &right_info.metrics);
    let data_overlap = data_overlap(&left_table, &right_table);

    Ok(ComparisonReport {
        left: left_info,
        right: right_info,
        config_diff,
        metrics_diff,
        data_overlap,
    })
}

/// Unified diff over the sorted pretty rendering of both pipelines.
fn config_diff(left: &VersionInfo, right: &VersionInfo) -> String {
    let left_doc = pipeline_doc(left);
    let right_doc = pipeline_doc(right);
    if left_doc == right_doc {
        return String::new();
    }
    TextDiff::from_lines(&left_doc, &right_doc)
        .unified_diff()
        .header("left/config.json", "right/config.json")
        .to_string()
}

fn pipeline_doc(info: &VersionInfo) -> String {
    let value = serde_json::to_value(&info.pipeline).unwrap_or(Value::Null);
    let mut doc = canonical::pretty_sorted_json(&value);
    doc.push('\n');
    doc
}

/// Per-metric deltas over the union of both versions' metric keys.
///
/// Every key present in either version is reported, including unchanged
/// ones (zero delta), so absence of a key always means "metric absent",
/// never "metric equal". Numeric metrics get an absolute delta and, when
/// the old value is nonzero, a percent delta. Keys present on only one
/// side show up with the other side absent. Swapping the arguments flips
/// every delta's sign.
fn metrics_diff(
    left: &IndexMap<String, Value>,
    right: &IndexMap<String, Value>,
) -> IndexMap<String, MetricDelta> {
    let mut keys: Vec<&String> = left.keys().collect();
    for key in right.keys() {
        if !left.contains_key(key) {
            keys.push(key);
        }
    }

    let mut diff = IndexMap::new();
    for key in keys {
        if BOOKKEEPING_KEYS.contains(&key.as_str()) {
            continue;
        }
        let old = left.get(key).cloned();
        let new = right.get(key).cloned();
        let old_num = old.as_ref().and_then(Value::as_f64);
        let new_num = new.as_ref().and_then(Value::as_f64);
        let absolute = match (old_num, new_num) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        };
        let percent = match (old_num, absolute) {
            // Undefined when the old value is zero, reported as absent
            (Some(a), Some(change)) if a != 0.0 => Some(change / a * 100.0),
            _ => None,
        };
        diff.insert(
            key.clone(),
            MetricDelta {
                old,
                new,
                absolute,
                percent,
            },
        );
    }
    diff
}

/// Jaccard overlap of the two tables' row fingerprints.
///
/// A row's fingerprint is the SHA-256 of its `text` field, so overlap is
/// insensitive to row order and duplicate rows.
fn data_overlap(left: &Table, right: &Table) -> DataOverlap {
    let left_rows: BTreeSet<&str> = left.rows().iter().map(|r| r.text()).collect();
    let right_rows: BTreeSet<&str> = right.rows().iter().map(|r| r.text()).collect();

    let left_prints: BTreeSet<String> =
        left_rows.iter().map(|t| hash::hash_bytes(t.as_bytes())).collect();
    let right_prints: BTreeSet<String> =
        right_rows.iter().map(|t| hash::hash_bytes(t.as_bytes())).collect();

    let common = left_prints.intersection(&right_prints).count();
    let union = left_prints.union(&right_prints).count();
    let only_left = left_prints.difference(&right_prints).count();
    let only_right = right_prints.difference(&left_prints).count();

    // Both-empty row sets are identical by definition
    let jaccard = if union == 0 {
        1.0
    } else {
        common as f64 / union as f64
    };

    // BTreeSet iteration keeps the samples deterministic
    let examples_only_left: Vec<String> = left_rows
        .difference(&right_rows)
        .take(MAX_EXAMPLES)
        .map(|t| t.to_string())
        .collect();
    let examples_only_right: Vec<String> = right_rows
        .difference(&left_rows)
        .take(MAX_EXAMPLES)
        .map(|t| t.to_string())
        .collect();

    DataOverlap {
        jaccard_similarity: jaccard,
        common_rows: common,
        only_in_left: only_left,
        only_in_right: only_right,
        examples_only_left,
        examples_only_right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use indexmap::IndexMap as Fields;
    use serde_json::json;

    fn table_of(texts: &[&str]) -> Table {
        let rows = texts
            .iter()
            .map(|t| {
                let mut fields = Fields::new();
                fields.insert("text".to_string(), t.to_string());
                Row::new(fields)
            })
            .collect();
        Table::new(vec!["text".to_string()], rows).unwrap()
    }

    fn metrics_of(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_metrics_diff_deltas_and_percent() {
        let left = metrics_of(&[("num_samples", json!(100))]);
        let right = metrics_of(&[("num_samples", json!(80))]);
        let diff = metrics_diff(&left, &right);
        let delta = &diff["num_samples"];
        assert_eq!(delta.absolute, Some(-20.0));
        assert_eq!(delta.percent, Some(-20.0));
    }

    #[test]
    fn test_metrics_diff_percent_undefined_at_zero() {
        let left = metrics_of(&[("vocab_size", json!(0))]);
        let right = metrics_of(&[("vocab_size", json!(50))]);
        let diff = metrics_diff(&left, &right);
        let delta = &diff["vocab_size"];
        assert_eq!(delta.absolute, Some(50.0));
        assert_eq!(delta.percent, None);
    }

    #[test]
    fn test_metrics_diff_reports_additions_and_removals() {
        let left = metrics_of(&[("class_distribution", json!({"a": 1}))]);
        let right = metrics_of(&[("num_samples", json!(1))]);
        let diff = metrics_diff(&left, &right);
        assert!(diff["class_distribution"].new.is_none());
        assert!(diff["num_samples"].old.is_none());
    }

    #[test]
    fn test_metrics_diff_antisymmetric() {
        let left = metrics_of(&[("num_samples", json!(10)), ("vocab_size", json!(4))]);
        let right = metrics_of(&[("num_samples", json!(15)), ("vocab_size", json!(2))]);
        let forward = metrics_diff(&left, &right);
        let backward = metrics_diff(&right, &left);
        for (key, delta) in &forward {
            assert_eq!(delta.absolute.unwrap(), -backward[key].absolute.unwrap());
        }
    }

    #[test]
    fn test_metrics_diff_reports_unchanged_keys_with_zero_delta() {
        let left = metrics_of(&[("num_samples", json!(10)), ("raw_hash", json!("aa"))]);
        let right = metrics_of(&[("num_samples", json!(10)), ("raw_hash", json!("bb"))]);
        let diff = metrics_diff(&left, &right);
        // Bookkeeping keys are not metrics and stay out of the diff
        assert!(diff.get("raw_hash").is_none());
        // An unchanged metric is still reported, with zero change
        let delta = &diff["num_samples"];
        assert_eq!(delta.old, Some(json!(10)));
        assert_eq!(delta.new, Some(json!(10)));
        assert_eq!(delta.absolute, Some(0.0));
        assert_eq!(delta.percent, Some(0.0));
    }

    #[test]
    fn test_overlap_identical_sets() {
        let overlap = data_overlap(&table_of(&["a", "b"]), &table_of(&["b", "a"]));
        assert_eq!(overlap.jaccard_similarity, 1.0);
        assert_eq!(overlap.common_rows, 2);
        assert_eq!(overlap.only_in_left, 0);
        assert_eq!(overlap.only_in_right, 0);
    }

    #[test]
    fn test_overlap_partial() {
        let overlap = data_overlap(&table_of(&["a", "b", "c"]), &table_of(&["b", "c", "d"]));
        assert_eq!(overlap.common_rows, 2);
        assert_eq!(overlap.only_in_left, 1);
        assert_eq!(overlap.only_in_right, 1);
        assert!((overlap.jaccard_similarity - 0.5).abs() < 1e-9);
        assert_eq!(overlap.examples_only_left, vec!["a".to_string()]);
        assert_eq!(overlap.examples_only_right, vec!["d".to_string()]);
    }

    #[test]
    fn test_overlap_both_empty_is_full_similarity() {
        let overlap = data_overlap(&table_of(&[]), &table_of(&[]));
        assert_eq!(overlap.jaccard_similarity, 1.0);
        assert_eq!(overlap.common_rows, 0);
    }

    #[test]
    fn test_overlap_symmetric_similarity() {
        let a = table_of(&["x", "y", "z"]);
        let b = table_of(&["y", "q"]);
        let forward = data_overlap(&a, &b);
        let backward = data_overlap(&b, &a);
        assert_eq!(forward.jaccard_similarity, backward.jaccard_similarity);
        assert_eq!(forward.only_in_left, backward.only_in_right);
    }

    #[test]
    fn test_overlap_duplicates_count_once() {
        let overlap = data_overlap(&table_of(&["a", "a", "b"]), &table_of(&["a", "b"]));
        assert_eq!(overlap.jaccard_similarity, 1.0);
    }
}
