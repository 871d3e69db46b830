//! Dataset loaders.
//!
//! Supported formats:
//! * `.json`            – `[["a", "a", "b"], ["b", "b"], ...]`, one inner array per item
//! * `.jsonl`/`.ndjson` – one JSON array per line
//! * `.csv`/`.tsv`      – one record per item, records may differ in length
//!
//! JSON `null` and blank CSV cells mean "no label from this annotator" and
//! are skipped.

use super::error::DatasetError;
use crate::models::{Dataset, Label};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Input format selection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Pick by file extension
    #[default]
    Auto,
    /// Array of label arrays
    Json,
    /// One label array per line
    Jsonl,
    /// One record per item
    Csv,
}

/// Options controlling how a dataset file is read.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Requested format, `Auto` to detect from the extension.
    pub format: InputFormat,
    /// CSV field delimiter. Defaults to tab for `.tsv`, comma otherwise.
    pub delimiter: Option<u8>,
    /// Whether the first CSV record is a header.
    pub has_headers: bool,
}

impl TryFrom<&crate::config::InputConfig> for LoadOptions {
    type Error = DatasetError;

    fn try_from(config: &crate::config::InputConfig) -> Result<Self, DatasetError> {
        Ok(Self {
            format: config.format,
            delimiter: config.delimiter.map(delimiter_byte).transpose()?,
            has_headers: config.has_headers,
        })
    }
}

/// Convert a delimiter character to the single byte the CSV reader splits on.
pub fn delimiter_byte(c: char) -> Result<u8, DatasetError> {
    match u8::try_from(c) {
        Ok(b) if b.is_ascii() => Ok(b),
        _ => Err(DatasetError::InvalidDelimiter(c)),
    }
}

/// Concrete reader chosen for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Json,
    Jsonl,
    Csv { delimiter: u8 },
}

fn resolve_source(path: &Path, options: &LoadOptions) -> Result<SourceKind, DatasetError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let default_delimiter = if ext == "tsv" { b'\t' } else { b',' };
    let csv = SourceKind::Csv {
        delimiter: options.delimiter.unwrap_or(default_delimiter),
    };

    match options.format {
        InputFormat::Json => Ok(SourceKind::Json),
        InputFormat::Jsonl => Ok(SourceKind::Jsonl),
        InputFormat::Csv => Ok(csv),
        InputFormat::Auto => match ext.as_str() {
            "json" => Ok(SourceKind::Json),
            "jsonl" | "ndjson" => Ok(SourceKind::Jsonl),
            "csv" | "tsv" => Ok(csv),
            "" => Err(DatasetError::UnsupportedFormat(
                "file has no extension; pass --input-format".to_string(),
            )),
            other => Err(DatasetError::UnsupportedFormat(format!(".{other}"))),
        },
    }
}

/// Load a dataset from a file.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let source = resolve_source(path, options)?;
    debug!("Reading {} as {:?}", path.display(), source);

    let rows = match source {
        SourceKind::Json => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            rows_from_json(&text)?
        }
        SourceKind::Jsonl => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            rows_from_jsonl(&text)?
        }
        SourceKind::Csv { delimiter } => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            rows_from_csv(file, delimiter, options.has_headers)?
        }
    };

    info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(Dataset::new(path.display().to_string(), rows))
}

/// Parse a JSON document holding an array of label arrays.
pub fn rows_from_json(text: &str) -> Result<Vec<Vec<Label>>> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array of rows")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        rows.push(json_row(record, i + 1)?);
    }

    Ok(rows)
}

/// Parse JSON Lines: one label array per non-blank line.
///
/// Row numbers in errors are line numbers.
pub fn rows_from_jsonl(text: &str) -> Result<Vec<Vec<Label>>> {
    let mut rows = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: JsonValue = serde_json::from_str(line)
            .with_context(|| format!("parsing JSON on line {}", i + 1))?;
        rows.push(json_row(&value, i + 1)?);
    }

    Ok(rows)
}

/// Parse CSV records into rows. Blank fields are skipped.
pub fn rows_from_csv<R: Read>(reader: R, delimiter: u8, has_headers: bool) -> Result<Vec<Vec<Label>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (i, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("reading CSV record {}", i + 1))?;
        rows.push(
            record
                .iter()
                .filter(|field| !field.is_empty())
                .map(field_label)
                .collect(),
        );
    }

    Ok(rows)
}

fn json_row(value: &JsonValue, row: usize) -> Result<Vec<Label>, DatasetError> {
    let items = value.as_array().ok_or_else(|| DatasetError::InvalidRow {
        row,
        reason: format!("expected an array of labels, found {}", json_kind(value)),
    })?;

    let mut labels = Vec::with_capacity(items.len());
    for (j, item) in items.iter().enumerate() {
        let label = json_label(item).map_err(|kind| DatasetError::InvalidLabelType {
            row,
            position: j + 1,
            kind,
        })?;
        if let Some(label) = label {
            labels.push(label);
        }
    }

    Ok(labels)
}

/// Convert one JSON value to a label. `Ok(None)` for a missing label,
/// `Err(kind)` for values that cannot be categories.
fn json_label(value: &JsonValue) -> Result<Option<Label>, &'static str> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Bool(b) => Ok(Some(Label::Bool(*b))),
        JsonValue::String(s) => Ok(Some(Label::Text(s.clone()))),
        JsonValue::Number(n) => Ok(Some(number_label(n))),
        JsonValue::Array(_) => Err("array"),
        JsonValue::Object(_) => Err("object"),
    }
}

fn number_label(n: &serde_json::Number) -> Label {
    if let Some(i) = n.as_i64() {
        return Label::Int(i);
    }
    match n.as_f64() {
        Some(f) => float_label(f).unwrap_or_else(|| Label::Real(n.to_string())),
        None => Label::Real(n.to_string()),
    }
}

/// Integral floats in `i64` range collapse to `Int`; other finite values
/// become `Real`, spelled the way `serde_json` prints them. `None` for NaN
/// or infinity.
fn float_label(f: f64) -> Option<Label> {
    let number = serde_json::Number::from_f64(f)?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Label::Int(f as i64))
    } else {
        Some(Label::Real(number.to_string()))
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// CSV fields follow the JSON number rules. Only plain decimal notation
/// counts as a number, so `nan`, `inf` and `true` stay text.
fn field_label(field: &str) -> Label {
    if let Ok(i) = field.parse::<i64>() {
        return Label::Int(i);
    }
    let numeric = field
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
    if numeric && field.bytes().any(|b| b.is_ascii_digit()) {
        if let Some(label) = field.parse::<f64>().ok().and_then(float_label) {
            return label;
        }
    }
    Label::Text(field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn text(s: &str) -> Label {
        Label::Text(s.to_string())
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_json_mixed_labels() {
        let rows = rows_from_json(r#"[[0, 0, 1.0], ["a", true, 0.5], [], [null, "b"]]"#).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![Label::Int(0), Label::Int(0), Label::Int(1)]);
        assert_eq!(
            rows[1],
            vec![text("a"), Label::Bool(true), Label::Real("0.5".to_string())]
        );
        assert!(rows[2].is_empty());
        assert_eq!(rows[3], vec![text("b")]);
    }

    #[test]
    fn test_json_invalid_label_type() {
        let err = rows_from_json(r#"[["a", "b"], ["a", ["nested"]]]"#).unwrap_err();

        match err.downcast_ref::<DatasetError>() {
            Some(DatasetError::InvalidLabelType {
                row,
                position,
                kind,
            }) => {
                assert_eq!(*row, 2);
                assert_eq!(*position, 2);
                assert_eq!(*kind, "array");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_json_object_label_rejected() {
        let err = rows_from_json(r#"[[{"label": "a"}]]"#).unwrap_err();
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn test_json_row_must_be_array() {
        let err = rows_from_json(r#"[["a"], "b"]"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::InvalidRow { row: 2, .. })
        ));
    }

    #[test]
    fn test_json_top_level_must_be_array() {
        assert!(rows_from_json(r#"{"rows": []}"#).is_err());
        assert!(rows_from_json("not json").is_err());
    }

    #[test]
    fn test_jsonl_skips_blank_lines() {
        let rows = rows_from_jsonl("[1, 1]\n\n  [\"x\"]\n").unwrap();
        assert_eq!(rows, vec![vec![Label::Int(1), Label::Int(1)], vec![text("x")]]);
    }

    #[test]
    fn test_jsonl_reports_line_number() {
        let err = rows_from_jsonl("[1]\n\n[{}]\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::InvalidLabelType { row: 3, .. })
        ));
    }

    #[test]
    fn test_csv_variable_length_rows() {
        let data = "pos, pos ,neg\nneg,,\n7,x\n";
        let rows = rows_from_csv(data.as_bytes(), b',', false).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![text("pos"), text("pos"), text("neg")]);
        assert_eq!(rows[1], vec![text("neg")]);
        assert_eq!(rows[2], vec![Label::Int(7), text("x")]);
    }

    #[test]
    fn test_csv_with_headers() {
        let data = "a1,a2,a3\nx,x,y\n";
        let rows = rows_from_csv(data.as_bytes(), b',', true).unwrap();
        assert_eq!(rows, vec![vec![text("x"), text("x"), text("y")]]);
    }

    #[test]
    fn test_load_file_by_extension() {
        let dir = TempDir::new().unwrap();

        let json = write_file(&dir, "labels.json", "[[1, 1], [2]]");
        let dataset = load_file(&json, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows.len(), 2);
        assert!(dataset.source.ends_with("labels.json"));

        let tsv = write_file(&dir, "labels.tsv", "a\ta\tb\n");
        let dataset = load_file(&tsv, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows, vec![vec![text("a"), text("a"), text("b")]]);

        let jsonl = write_file(&dir, "labels.ndjson", "[\"a\"]\n[\"b\", \"b\"]\n");
        let dataset = load_file(&jsonl, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows.len(), 2);
    }

    #[test]
    fn test_load_file_format_override() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "labels.txt", "a;b;b\n");

        assert!(load_file(&path, &LoadOptions::default()).is_err());

        let options = LoadOptions {
            format: InputFormat::Csv,
            delimiter: Some(b';'),
            has_headers: false,
        };
        let dataset = load_file(&path, &options).unwrap();
        assert_eq!(dataset.rows, vec![vec![text("a"), text("b"), text("b")]]);
    }

    #[test]
    fn test_csv_numbers_match_json() {
        let from_csv = rows_from_csv("1.0,1,0.5,2e0,true,nan,1.5.2\n".as_bytes(), b',', false)
            .unwrap();
        let from_json = rows_from_json(r#"[[1.0, 1, 0.5, 2e0]]"#).unwrap();

        assert_eq!(from_csv[0][..4], from_json[0][..]);
        assert_eq!(
            from_csv[0],
            vec![
                Label::Int(1),
                Label::Int(1),
                Label::Real("0.5".to_string()),
                Label::Int(2),
                text("true"),
                text("nan"),
                text("1.5.2"),
            ]
        );
    }

    #[test]
    fn test_config_delimiter_must_be_ascii() {
        let config: crate::config::InputConfig = toml::from_str("delimiter = \"ĺ\"").unwrap();
        let err = LoadOptions::try_from(&config).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidDelimiter('ĺ')));

        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "labels.csv", "x:y:y\n");
        let dataset = load_file(&path, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows, vec![vec![text("x:y:y")]]);

        let config: crate::config::InputConfig = toml::from_str("delimiter = \":\"").unwrap();
        let options = LoadOptions::try_from(&config).unwrap();
        assert_eq!(options.delimiter, Some(b':'));
        assert_eq!(delimiter_byte('\t').unwrap(), b'\t');
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        let err = load_file(&path, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
