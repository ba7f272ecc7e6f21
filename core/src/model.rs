//! Version and comparison value types

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One step of a preprocessing pipeline: a name plus free-form params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub step: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, Value>,
}

impl PipelineStep {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            params: serde_json::Map::new(),
        }
    }
}

/// Persisted metrics document (`metrics.json`) for one version.
///
/// Carries enough identity (raw/config/version hashes) for a version
/// directory to be integrity-checked on its own, plus authorship and the
/// computed dataset metrics. Written once at creation, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version_hash: String,
    pub raw_hash: String,
    pub config_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    /// Metric name -> numeric or categorical value.
    #[serde(flatten)]
    pub metrics: IndexMap<String, Value>,
}

/// Identity and metadata for one immutable dataset version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    /// 64-char hex SHA-256 version identity.
    pub hash: String,
    pub raw_hash: String,
    pub config_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    /// The exact preprocessing configuration applied.
    pub pipeline: Vec<PipelineStep>,
    /// Metric name -> numeric or categorical value.
    pub metrics: IndexMap<String, Value>,
    /// Tags currently resolving to this hash.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl VersionInfo {
    /// Shortened hash for display.
    pub fn short_hash(&self) -> &str {
        &self.hash[..12.min(self.hash.len())]
    }

    /// Look up a metric as f64, if present and numeric.
    pub fn metric_f64(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(Value::as_f64)
    }

    /// Human-readable multi-line summary.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Version: {}", self.hash),
            format!("  Raw Hash:    {}", self.raw_hash),
            format!("  Config Hash: {}", self.config_hash),
            format!("  Created At:  {}", self.created_at.to_rfc3339()),
        ];
        if let Some(author) = &self.created_by {
            lines.push(format!("  Created By:  {author}"));
        }
        if !self.tags.is_empty() {
            lines.push(format!("  Tags:        {}", self.tags.join(", ")));
        }
        if !self.pipeline.is_empty() {
            let steps: Vec<&str> = self.pipeline.iter().map(|s| s.step.as_str()).collect();
            lines.push(format!("  Pipeline:    {}", steps.join(" -> ")));
        }
        for (name, value) in &self.metrics {
            lines.push(format!("  {:<12} {value}", format!("{name}:")));
        }
        lines.join("\n")
    }
}

/// Change in a single metric between two versions.
#[derive(Debug, Clone, Serialize)]
pub struct MetricDelta {
    pub old: Option<Value>,
    pub new: Option<Value>,
    /// Absolute change, when both sides are numeric.
    pub absolute: Option<f64>,
    /// Percent change; undefined (None) when the old value is zero or
    /// either side is missing or non-numeric.
    pub percent: Option<f64>,
}

/// Row-set overlap between two versions' processed data.
#[derive(Debug, Clone, Serialize)]
pub struct DataOverlap {
    /// |intersection| / |union| of row fingerprints; 1.0 when both empty.
    pub jaccard_similarity: f64,
    pub common_rows: usize,
    pub only_in_left: usize,
    pub only_in_right: usize,
    /// Bounded samples of differing rows, for human inspection.
    pub examples_only_left: Vec<String>,
    pub examples_only_right: Vec<String>,
}

/// Result of comparing two versions. Built on demand, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub left: VersionInfo,
    pub right: VersionInfo,
    /// Unified diff over the canonical config rendering; empty if identical.
    pub config_diff: String,
    pub metrics_diff: IndexMap<String, MetricDelta>,
    pub data_overlap: DataOverlap,
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "flux version comparison")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Left:  {}", self.left.hash)?;
        writeln!(f, "Right: {}", self.right.hash)?;
        writeln!(f)?;
        writeln!(f, "--- Configuration Diff ---")?;
        if self.config_diff.is_empty() {
            writeln!(f, "(identical)")?;
        } else {
            writeln!(f, "{}", self.config_diff.trim_end())?;
        }
        writeln!(f)?;
        writeln!(f, "--- Metrics Diff ---")?;
        if self.metrics_diff.is_empty() {
            writeln!(f, "  (identical)")?;
        }
        for (name, delta) in &self.metrics_diff {
            writeln!(f, "  {name}:")?;
            writeln!(f, "    left:  {}", render_opt(&delta.old))?;
            writeln!(f, "    right: {}", render_opt(&delta.new))?;
            if let Some(abs) = delta.absolute {
                writeln!(f, "    change: {abs}")?;
            }
            if let Some(pct) = delta.percent {
                writeln!(f, "    pct_change: {pct:.2}%")?;
            }
        }
        writeln!(f)?;
        writeln!(f, "--- Data Overlap ---")?;
        let ov = &self.data_overlap;
        writeln!(f, "  Jaccard Similarity: {:.4}", ov.jaccard_similarity)?;
        writeln!(f, "  Common Rows:        {}", ov.common_rows)?;
        writeln!(f, "  Only in Left:       {}", ov.only_in_left)?;
        writeln!(f, "  Only in Right:      {}", ov.only_in_right)?;
        if !ov.examples_only_left.is_empty() {
            writeln!(f, "  Example rows only in left:")?;
            for ex in &ov.examples_only_left {
                writeln!(f, "    - {ex}")?;
            }
        }
        if !ov.examples_only_right.is_empty() {
            writeln!(f, "  Example rows only in right:")?;
            for ex in &ov.examples_only_right {
                writeln!(f, "    - {ex}")?;
            }
        }
        write!(f, "{}", "=".repeat(60))
    }
}

fn render_opt(value: &Option<Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(absent)".to_string(),
    }
}
