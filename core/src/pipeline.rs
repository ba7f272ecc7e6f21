//! Text preprocessing pipeline
//!
//! The repository consumes preprocessing through the [`Preprocess`] trait
//! so the built-in steps can be swapped for an external implementation.
//! Determinism is part of the contract: identical (rows, pipeline) inputs
//! must produce identical output, or content addressing loses meaning.

use crate::data::{Row, Table};
use crate::error::{FluxError, Result};
use crate::model::PipelineStep;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Seam between the repository and the preprocessing implementation.
pub trait Preprocess: Send + Sync {
    /// Apply a pipeline to a table, producing the processed table.
    fn apply(&self, table: Table, pipeline: &[PipelineStep]) -> Result<Table>;
}

/// Built-in pipeline with the standard text preprocessing steps.
#[derive(Debug, Default)]
pub struct TextPipeline;

impl Preprocess for TextPipeline {
    fn apply(&self, mut table: Table, pipeline: &[PipelineStep]) -> Result<Table> {
        for (i, step) in pipeline.iter().enumerate() {
            log::info!("Applying step {i}: {} (params={:?})", step.step, step.params);
            table = match step.step.as_str() {
                "lowercase" => step_lowercase(table),
                "tokenize" => step_tokenize(table, &step.params)?,
                "filter_by_length" => step_filter_by_length(table, &step.params)?,
                "remove_stopwords" => step_remove_stopwords(table, &step.params)?,
                "deduplicate" => step_deduplicate(table, &step.params)?,
                other => {
                    return Err(FluxError::config(format!(
                        "unknown preprocessing step: '{other}'"
                    )))
                }
            };
            log::debug!("After step {i} ({}): {} rows", step.step, table.len());
        }
        Ok(table)
    }
}

/// True if any step in the pipeline tokenizes the text.
pub fn is_tokenizing(pipeline: &[PipelineStep]) -> bool {
    pipeline.iter().any(|s| s.step == "tokenize")
}

fn step_lowercase(mut table: Table) -> Table {
    for row in table.rows_mut() {
        let lowered = row.text().to_lowercase();
        row.set_text(lowered);
    }
    table
}

fn step_tokenize(mut table: Table, params: &serde_json::Map<String, Value>) -> Result<Table> {
    let method = str_param(params, "method")?.unwrap_or("whitespace");
    match method {
        "whitespace" => {
            for row in table.rows_mut() {
                let joined = row.text().split_whitespace().collect::<Vec<_>>().join(" ");
                row.set_text(joined);
            }
        }
        "regex" => {
            let word = Regex::new(r"[a-zA-Z0-9]+")
                .map_err(|e| FluxError::preprocessing("tokenize", e.to_string()))?;
            for row in table.rows_mut() {
                let tokens: Vec<&str> = word.find_iter(row.text()).map(|m| m.as_str()).collect();
                let joined = tokens.join(" ");
                row.set_text(joined);
            }
        }
        other => {
            return Err(FluxError::config(format!(
                "unknown tokenization method: '{other}'"
            )))
        }
    }
    Ok(table)
}

fn step_filter_by_length(mut table: Table, params: &serde_json::Map<String, Value>) -> Result<Table> {
    let min_tokens = u64_param(params, "min_tokens")?.unwrap_or(0) as usize;
    let max_tokens = u64_param(params, "max_tokens")?.unwrap_or(u64::MAX) as usize;
    table.rows_mut().retain(|row| {
        let count = row.text().split_whitespace().count();
        count >= min_tokens && count <= max_tokens
    });
    Ok(table)
}

fn step_remove_stopwords(mut table: Table, params: &serde_json::Map<String, Value>) -> Result<Table> {
    let mut stop_set: HashSet<String> = HashSet::new();

    if let Some(language) = str_param(params, "language")? {
        match language {
            "english" => stop_set.extend(ENGLISH_STOPWORDS.iter().map(|s| s.to_string())),
            other => {
                return Err(FluxError::config(format!(
                    "unknown stopword language: '{other}' (available: english)"
                )))
            }
        }
    }
    if let Some(custom) = params.get("custom_list") {
        let words = custom.as_array().ok_or_else(|| {
            FluxError::config("'custom_list' must be an array of strings".to_string())
        })?;
        for word in words {
            let word = word.as_str().ok_or_else(|| {
                FluxError::config("'custom_list' must be an array of strings".to_string())
            })?;
            stop_set.insert(word.to_string());
        }
    }

    if stop_set.is_empty() {
        log::warn!("No stopwords specified; step has no effect");
        return Ok(table);
    }

    for row in table.rows_mut() {
        let kept: Vec<&str> = row
            .text()
            .split_whitespace()
            .filter(|t| !stop_set.contains(&t.to_lowercase()))
            .collect();
        let joined = kept.join(" ");
        row.set_text(joined);
    }
    Ok(table)
}

fn step_deduplicate(mut table: Table, params: &serde_json::Map<String, Value>) -> Result<Table> {
    let keep = str_param(params, "keep")?.unwrap_or("first");
    let subset: Vec<String> = match params.get("subset") {
        None => vec![crate::data::TEXT_COLUMN.to_string()],
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    FluxError::config("'subset' must be a column name or list of names".to_string())
                })
            })
            .collect::<Result<_>>()?,
        Some(_) => {
            return Err(FluxError::config(
                "'subset' must be a column name or list of names".to_string(),
            ))
        }
    };

    for column in &subset {
        if !table.has_column(column) {
            return Err(FluxError::config(format!(
                "column '{column}' not found for deduplication, available: {:?}",
                table.headers()
            )));
        }
    }

    let key_of = |row: &Row| -> Vec<String> {
        subset
            .iter()
            .map(|c| row.get(c).unwrap_or("").to_string())
            .collect()
    };

    match keep {
        "first" => {
            let mut seen: HashSet<Vec<String>> = HashSet::new();
            table.rows_mut().retain(|row| seen.insert(key_of(row)));
        }
        "last" => {
            let mut last_index: HashMap<Vec<String>, usize> = HashMap::new();
            for (i, row) in table.rows().iter().enumerate() {
                last_index.insert(key_of(row), i);
            }
            let mut i = 0;
            table.rows_mut().retain(|row| {
                let keep_row = last_index.get(&key_of(row)) == Some(&i);
                i += 1;
                keep_row
            });
        }
        other => {
            return Err(FluxError::config(format!(
                "'keep' must be 'first' or 'last', got '{other}'"
            )))
        }
    }
    Ok(table)
}

fn str_param<'a>(
    params: &'a serde_json::Map<String, Value>,
    name: &str,
) -> Result<Option<&'a str>> {
    match params.get(name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(FluxError::config(format!(
            "param '{name}' must be a string, got {other}"
        ))),
    }
}

fn u64_param(params: &serde_json::Map<String, Value>, name: &str) -> Result<Option<u64>> {
    match params.get(name) {
        None => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            FluxError::config(format!(
                "param '{name}' must be a non-negative integer, got {value}"
            ))
        }),
    }
}

/// Small built-in English stopword list.
const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "shall", "can", "need", "dare",
    "ought", "used", "it", "its", "this", "that", "these", "those", "i", "me", "my", "mine", "we",
    "us", "our", "ours", "you", "your", "yours", "he", "him", "his", "she", "her", "hers", "they",
    "them", "their", "theirs", "what", "which", "who", "whom", "whose", "not", "no", "nor", "so",
    "too", "very", "just", "about", "above", "after", "again", "all", "also", "am", "any",
    "because", "before", "below", "between", "both", "each", "few", "further", "here", "how",
    "if", "into", "more", "most", "much", "must", "now", "only", "other", "out", "over", "own",
    "same", "some", "such", "than", "then", "there", "through", "under", "until", "up", "when",
    "where", "while", "why", "down", "during", "off",
];
