//! Source table loading and dataset manifests.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{DashboardError, Result};

/// Sensor fields the resolver reads, plus the quality label.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "Drill_Pressure",
    "Drilling_Surf_Quality",
    "Drilling_Speed",
    "Milling_Gear_Depth",
    "Milling_Circle_Diameter",
    "Turning_Cut_Speed",
    "Turning_Cut_Depth",
    "class",
];

pub const CLASS_COLUMN: &str = "class";

static MISSING: RawValue = RawValue::Missing;

const MISSING_MARKERS: [&str; 7] = ["", "NaN", "nan", "NA", "N/A", "null", "NULL"];

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Missing,
}

impl RawValue {
    pub fn parse(cell: &str) -> Self {
        let cell = unquote(cell.trim());
        if MISSING_MARKERS.contains(&cell) {
            return RawValue::Missing;
        }
        match cell.parse::<f64>() {
            Ok(v) if v.is_finite() => RawValue::Number(v),
            Ok(_) => RawValue::Missing,
            Err(_) => RawValue::Text(cell.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }
}

/// One sampling instant as read from the source, without a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub fields: Vec<RawValue>,
}

impl RawRecord {
    /// Short rows read as missing.
    pub fn get(&self, idx: usize) -> &RawValue {
        self.fields.get(idx).unwrap_or(&MISSING)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub rows: u64,
    pub bad_rows: u64,
    pub missing_by_column: BTreeMap<String, u64>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub hash_sha256: String,
    pub delimiter: String,
    pub row_count: u64,
    pub bad_rows: u64,
    pub columns: Vec<String>,
    pub missing_required: Vec<String>,
    pub missing_by_column: BTreeMap<String, u64>,
    pub warnings: Vec<String>,
    pub generated_at_epoch: u64,
}

pub fn load_table(path: &Path, delimiter: char) -> Result<(RawTable, LoadReport)> {
    let mut text = String::new();
    File::open(path)?.read_to_string(&mut text)?;
    parse_table(&text, delimiter)
}

pub fn parse_table(text: &str, delimiter: char) -> Result<(RawTable, LoadReport)> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let headers: Vec<String> = match lines.next() {
        Some((_, line)) => split_line(line, delimiter)
            .map(|h| unquote(h.trim()).to_string())
            .collect(),
        None => return Err(DashboardError::Schema("missing header".into())),
    };
    for (i, name) in headers.iter().enumerate() {
        if headers[..i].contains(name) {
            return Err(DashboardError::Schema(format!("duplicate column {}", name)));
        }
    }

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for (lineno, line) in lines {
        let fields: Vec<RawValue> = split_line(line, delimiter).map(RawValue::parse).collect();
        if fields.len() != headers.len() {
            report.bad_rows += 1;
            report.warnings.push(format!(
                "bad_row: line {} has {} fields, expected {}",
                lineno + 1,
                fields.len(),
                headers.len()
            ));
            continue;
        }
        for (name, value) in headers.iter().zip(&fields) {
            if value.is_missing() {
                *report.missing_by_column.entry(name.clone()).or_insert(0) += 1;
            }
        }
        rows.push(RawRecord { fields });
    }
    report.rows = rows.len() as u64;

    Ok((RawTable { headers, rows }, report))
}

pub fn missing_required(headers: &[String]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect()
}

pub fn analyze_dataset(path: &Path, delimiter: char, now_ts: u64) -> Result<DatasetManifest> {
    let hash = file_sha256(path)?;
    let (table, report) = load_table(path, delimiter)?;
    Ok(DatasetManifest {
        path: path.display().to_string(),
        hash_sha256: hash,
        delimiter: delimiter.to_string(),
        row_count: report.rows,
        bad_rows: report.bad_rows,
        missing_required: missing_required(&table.headers),
        columns: table.headers,
        missing_by_column: report.missing_by_column,
        warnings: report.warnings,
        generated_at_epoch: now_ts,
    })
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

fn split_line(line: &str, delimiter: char) -> impl Iterator<Item = &str> {
    line.trim_end_matches('\r').split(delimiter)
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cells() {
        assert_eq!(RawValue::parse(" 1.5 "), RawValue::Number(1.5));
        assert_eq!(RawValue::parse("\"OK\""), RawValue::Text("OK".into()));
        assert_eq!(RawValue::parse(""), RawValue::Missing);
        assert_eq!(RawValue::parse("NaN"), RawValue::Missing);
        assert_eq!(RawValue::parse("NA"), RawValue::Missing);
    }

    #[test]
    fn skips_rows_with_wrong_field_count() {
        let text = "a;b;class\n1;2;OK\n3;4\n5;;NOK\n";
        let (table, report) = parse_table(text, ';').unwrap();
        assert_eq!(table.headers, vec!["a", "b", "class"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(report.bad_rows, 1);
        assert_eq!(report.missing_by_column.get("b"), Some(&1));
        assert!(report.warnings[0].contains("line 3"));
    }

    #[test]
    fn empty_input_is_schema_error() {
        assert!(matches!(parse_table("\n\n", ';'), Err(DashboardError::Schema(_))));
    }

    #[test]
    fn duplicate_header_is_schema_error() {
        match parse_table("a;a;class\n1;2;OK\n", ';') {
            Err(DashboardError::Schema(msg)) => assert_eq!(msg, "duplicate column a"),
            other => panic!("expected Schema, got {:?}", other),
        }
    }

    #[test]
    fn reports_missing_required_columns() {
        let headers = vec!["Drill_Pressure".to_string(), "class".to_string()];
        let missing = missing_required(&headers);
        assert_eq!(missing.len(), 6);
        assert!(!missing.contains(&"class".to_string()));
        assert!(missing.contains(&"Turning_Cut_Depth".to_string()));
    }

    #[test]
    fn manifest_path_sits_next_to_dataset() {
        let p = default_manifest_path(Path::new("/data/line.csv"));
        assert_eq!(p, PathBuf::from("/data/line.csv.manifest.json"));
    }
}
