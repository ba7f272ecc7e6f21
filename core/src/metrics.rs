//! Dataset metrics computation
//!
//! Summary statistics over a processed table, persisted in the version's
//! metrics document.

use crate::data::{Table, LABEL_COLUMN};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

/// Compute the standard metric set for a processed table.
///
/// `is_tokenized` switches `avg_text_length` from characters to tokens,
/// matching how tokenized text is stored (space-separated tokens).
pub fn compute_metrics(table: &Table, is_tokenized: bool) -> IndexMap<String, Value> {
    let mut metrics = IndexMap::new();

    metrics.insert("num_samples".to_string(), json!(table.len()));

    let unique: HashSet<&str> = table.rows().iter().map(|r| r.text()).collect();
    metrics.insert("num_unique_texts".to_string(), json!(unique.len()));

    let mut vocab: HashSet<&str> = HashSet::new();
    for row in table.rows() {
        vocab.extend(row.text().split_whitespace());
    }
    metrics.insert("vocab_size".to_string(), json!(vocab.len()));

    let avg_length = if table.is_empty() {
        0.0
    } else {
        let total: usize = table
            .rows()
            .iter()
            .map(|r| {
                if is_tokenized {
                    r.text().split_whitespace().count()
                } else {
                    r.text().chars().count()
                }
            })
            .sum();
        total as f64 / table.len() as f64
    };
    metrics.insert("avg_text_length".to_string(), json!(avg_length));

    if table.has_column(LABEL_COLUMN) {
        let mut distribution: BTreeMap<String, u64> = BTreeMap::new();
        for row in table.rows() {
            let label = row.get(LABEL_COLUMN).unwrap_or("");
            *distribution.entry(label.to_string()).or_insert(0) += 1;
        }
        metrics.insert("class_distribution".to_string(), json!(distribution));
    }

    log::info!(
        "Metrics computed: {} samples, {} unique texts, vocab={}, avg_len={:.2}",
        table.len(),
        unique.len(),
        vocab.len(),
        avg_length
    );

    metrics
}
