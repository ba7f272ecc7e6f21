//! Tabular data loading and saving
//!
//! The core treats a dataset as an ordered sequence of records with a
//! required `text` field and arbitrary additional fields. Storage format
//! is CSV with a header row.

use crate::error::{FluxError, Result};
use indexmap::IndexMap;
use std::path::Path;

pub const TEXT_COLUMN: &str = "text";
pub const LABEL_COLUMN: &str = "label";

/// One record of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: IndexMap<String, String>,
}

impl Row {
    pub fn new(fields: IndexMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn text(&self) -> &str {
        self.fields.get(TEXT_COLUMN).map(String::as_str).unwrap_or("")
    }

    pub fn set_text(&mut self, text: String) {
        self.fields.insert(TEXT_COLUMN.to_string(), text);
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// An in-memory table: ordered rows sharing one header set.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table, checking that the required `text` column exists.
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        if !headers.iter().any(|h| h == TEXT_COLUMN) {
            return Err(FluxError::data_format(format!(
                "table must have a '{TEXT_COLUMN}' column, found: {headers:?}"
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Load a CSV file with a header row.
    pub fn load_csv(path: &Path) -> Result<Table> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let fields = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            rows.push(Row::new(fields));
        }
        log::debug!("Loaded {} rows from {}", rows.len(), path.display());
        Table::new(headers, rows)
    }

    /// Write the table as CSV, fields in header order.
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            let record: Vec<&str> = self
                .headers
                .iter()
                .map(|h| row.get(h).unwrap_or(""))
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_csv_preserves_order_and_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "data.csv", "text,label\nHello World,pos\nBye,neg\n");
        let table = Table::load_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].text(), "Hello World");
        assert_eq!(table.rows()[1].get(LABEL_COLUMN), Some("neg"));
    }

    #[test]
    fn test_missing_text_column_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "data.csv", "body,label\nHello,pos\n");
        let err = Table::load_csv(&path).unwrap_err();
        assert!(matches!(err, FluxError::DataFormat { .. }));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "data.csv", "text,label\na b,x\nc,y\n");
        let table = Table::load_csv(&path).unwrap();
        let out = dir.path().join("out.csv");
        table.save_csv(&out).unwrap();
        let back = Table::load_csv(&out).unwrap();
        assert_eq!(back.rows(), table.rows());
    }
}
