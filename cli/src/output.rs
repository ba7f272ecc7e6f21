//! Output formatting utilities

use flux_core::error::Result;
use flux_core::model::{ComparisonReport, VersionInfo};
use serde_json::Value;
use std::collections::BTreeMap;

/// Pretty printer for flux output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print a version list, oldest first
    pub fn print_version_list(versions: &[VersionInfo]) {
        if versions.is_empty() {
            println!("No versions found.");
            return;
        }

        println!("📚 Versions ({}):", versions.len());
        for (i, version) in versions.iter().enumerate() {
            let prefix = if i == versions.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            let tags = if version.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", version.tags.join(", "))
            };
            println!(
                "{} {} {} {}{}",
                prefix,
                version.short_hash(),
                version.created_at.format("%Y-%m-%d %H:%M:%S"),
                version
                    .metric_f64("num_samples")
                    .map(|n| format!("{n} samples"))
                    .unwrap_or_default(),
                tags
            );
        }
    }

    /// Print one version's metadata and metrics
    pub fn print_version(version: &VersionInfo) {
        println!("📸 Version: {}", version.hash);
        println!("├─ Raw hash:    {}", version.raw_hash);
        println!("├─ Config hash: {}", version.config_hash);
        println!("├─ Created:     {}", version.created_at.to_rfc3339());
        if let Some(author) = &version.created_by {
            println!("├─ Author:      {author}");
        }
        if !version.tags.is_empty() {
            println!("├─ Tags:        {}", version.tags.join(", "));
        }
        if version.pipeline.is_empty() {
            println!("├─ Pipeline:    (none)");
        } else {
            let steps: Vec<&str> = version.pipeline.iter().map(|s| s.step.as_str()).collect();
            println!("├─ Pipeline:    {}", steps.join(" → "));
        }
        let metrics: Vec<(&String, &Value)> = version.metrics.iter().collect();
        for (i, (name, value)) in metrics.iter().enumerate() {
            let prefix = if i == metrics.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!("{prefix} {name}: {}", format_metric(value));
        }
        if metrics.is_empty() {
            println!("└─ (no metrics)");
        }
    }

    /// Print the tag index
    pub fn print_tags(tags: &BTreeMap<String, String>) {
        if tags.is_empty() {
            println!("No tags found.");
            return;
        }

        println!("🏷️  Tags:");
        for (i, (name, hash)) in tags.iter().enumerate() {
            let prefix = if i == tags.len() - 1 { "└─" } else { "├─" };
            println!("{} {} -> {}", prefix, name, &hash[..12.min(hash.len())]);
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format one version as JSON
    pub fn format_version(version: &VersionInfo) -> Result<String> {
        Ok(serde_json::to_string_pretty(version)?)
    }

    /// Format a version list as JSON
    pub fn format_version_list(versions: &[VersionInfo]) -> Result<String> {
        Ok(serde_json::to_string_pretty(versions)?)
    }

    /// Format a comparison report as JSON
    pub fn format_comparison(report: &ComparisonReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

/// Render a metric value compactly: bare numbers and strings unquoted,
/// structured values as single-line JSON
fn format_metric(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
