//! Dataset preparation: synthetic time index, mean imputation, and the
//! derived per-row color.
//!
//! Runs once at startup. The returned `PreparedDataset` is never mutated
//! afterwards and is shared read-only behind an `Arc`.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::collections::BTreeMap;

use crate::chart::Color;
use crate::data::{missing_required, RawTable, RawValue, CLASS_COLUMN, REQUIRED_COLUMNS};
use crate::error::{DashboardError, Result};
use crate::logging::{self, obj, v_int, v_str, Domain, ProfileScope};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Categorical(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedColumn {
    pub name: String,
    pub data: ColumnData,
    /// Cells that were missing and replaced by `mean`.
    pub imputed: usize,
    pub mean: Option<f64>,
}

impl PreparedColumn {
    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }
}

#[derive(Debug, Clone)]
pub struct PreparedDataset {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<PreparedColumn>,
    colors: Vec<Color>,
    prepared_at: DateTime<Utc>,
}

impl PreparedDataset {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn columns(&self) -> &[PreparedColumn] {
        &self.columns
    }

    pub fn prepared_at(&self) -> DateTime<Utc> {
        self.prepared_at
    }

    pub fn column(&self, name: &str) -> Option<&PreparedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        match &self.column(name)?.data {
            ColumnData::Numeric(v) => Some(v),
            ColumnData::Categorical(_) => None,
        }
    }

    pub fn categorical(&self, name: &str) -> Option<&[Option<String>]> {
        match &self.column(name)?.data {
            ColumnData::Categorical(v) => Some(v),
            ColumnData::Numeric(_) => None,
        }
    }

    pub fn imputed_cells(&self) -> BTreeMap<String, usize> {
        self.columns
            .iter()
            .filter(|c| c.imputed > 0)
            .map(|c| (c.name.clone(), c.imputed))
            .collect()
    }
}

/// Prepares `raw` with the current wall clock as the last timestamp.
pub fn prepare(raw: &RawTable, window: usize) -> Result<PreparedDataset> {
    prepare_at(raw, window, Utc::now())
}

/// Keeps the first `window` rows of `raw` and prepares them. The last row is
/// stamped `now` (truncated to whole seconds), earlier rows one second apart.
pub fn prepare_at(raw: &RawTable, window: usize, now: DateTime<Utc>) -> Result<PreparedDataset> {
    let _scope = ProfileScope::with_context(Domain::Data, "prepare", &[("window", v_int(window as u64))]);

    let missing = missing_required(&raw.headers);
    if !missing.is_empty() {
        return Err(DashboardError::MissingFields { missing });
    }

    let retained = &raw.rows[..window.min(raw.rows.len())];
    let n = retained.len();

    let mut columns = Vec::with_capacity(raw.headers.len());
    for (idx, name) in raw.headers.iter().enumerate() {
        let cells: Vec<&RawValue> = retained.iter().map(|r| r.get(idx)).collect();
        let column = build_column(name, &cells)?;
        if REQUIRED_COLUMNS.contains(&name.as_str()) && name != CLASS_COLUMN && !column.is_numeric() {
            return Err(DashboardError::Schema(format!("column {} is not numeric", name)));
        }
        columns.push(column);
    }

    let colors = match columns.iter().find(|c| c.name == CLASS_COLUMN).map(|c| &c.data) {
        Some(ColumnData::Categorical(labels)) => labels.iter().map(|l| Color::from_class(l.as_deref())).collect(),
        _ => vec![Color::Red; n],
    };

    let anchor = now.trunc_subsecs(0);
    let timestamps = (0..n)
        .map(|i| anchor - Duration::seconds((n - 1 - i) as i64))
        .collect();

    let dataset = PreparedDataset {
        timestamps,
        columns,
        colors,
        prepared_at: anchor,
    };

    let imputed: u64 = dataset.columns.iter().map(|c| c.imputed as u64).sum();
    logging::info(
        Domain::Data,
        "data.prepared",
        obj(&[
            ("rows", v_int(n as u64)),
            ("source_rows", v_int(raw.rows.len() as u64)),
            ("columns", v_int(dataset.columns.len() as u64)),
            ("imputed_cells", v_int(imputed)),
            ("last_ts", v_str(&anchor.to_rfc3339())),
        ]),
    );
    Ok(dataset)
}

fn build_column(name: &str, cells: &[&RawValue]) -> Result<PreparedColumn> {
    let categorical = name == CLASS_COLUMN || cells.iter().any(|c| matches!(c, RawValue::Text(_)));
    if categorical {
        let labels = cells
            .iter()
            .map(|c| match c {
                RawValue::Text(s) => Some(s.clone()),
                RawValue::Number(v) => Some(v.to_string()),
                RawValue::Missing => None,
            })
            .collect();
        return Ok(PreparedColumn {
            name: name.to_string(),
            data: ColumnData::Categorical(labels),
            imputed: 0,
            mean: None,
        });
    }

    let (sum, observed) = cells.iter().fold((0.0, 0usize), |(sum, n), c| match c {
        RawValue::Number(v) => (sum + v, n + 1),
        _ => (sum, n),
    });
    let imputed = cells.len() - observed;
    if observed == 0 && !cells.is_empty() {
        return Err(DashboardError::EmptyColumn(name.to_string()));
    }
    let mean = (observed > 0).then(|| sum / observed as f64);
    let fill = mean.unwrap_or(0.0);
    let values = cells
        .iter()
        .map(|c| match c {
            RawValue::Number(v) => *v,
            _ => fill,
        })
        .collect();

    Ok(PreparedColumn {
        name: name.to_string(),
        data: ColumnData::Numeric(values),
        imputed,
        mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_table;
    use chrono::TimeZone;

    const HEADER: &str = "Drill_Pressure;Drilling_Surf_Quality;Drilling_Speed;Milling_Gear_Depth;Milling_Circle_Diameter;Turning_Cut_Speed;Turning_Cut_Depth;class";

    fn table(rows: &[&str]) -> RawTable {
        let mut text = HEADER.to_string();
        for r in rows {
            text.push('\n');
            text.push_str(r);
        }
        parse_table(&text, ';').unwrap().0
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn imputes_with_column_mean() {
        let raw = table(&["1;1;1;1;1;1;1;OK", ";2;2;2;2;2;2;NOK", "3;3;3;3;3;3;3;OK"]);
        let ds = prepare_at(&raw, 10, now()).unwrap();
        assert_eq!(ds.numeric("Drill_Pressure").unwrap(), &[1.0, 2.0, 3.0]);
        let col = ds.column("Drill_Pressure").unwrap();
        assert_eq!(col.imputed, 1);
        assert_eq!(col.mean, Some(2.0));
        assert_eq!(ds.imputed_cells().get("Drill_Pressure"), Some(&1));
    }

    #[test]
    fn mean_uses_retained_rows_only() {
        let raw = table(&["2;1;1;1;1;1;1;OK", ";1;1;1;1;1;1;OK", "100;1;1;1;1;1;1;OK"]);
        let ds = prepare_at(&raw, 2, now()).unwrap();
        assert_eq!(ds.numeric("Drill_Pressure").unwrap(), &[2.0, 2.0]);
    }

    #[test]
    fn timestamps_end_at_now_one_second_apart() {
        let raw = table(&["1;1;1;1;1;1;1;OK", "2;2;2;2;2;2;2;OK", "3;3;3;3;3;3;3;OK"]);
        let ds = prepare_at(&raw, 10, now() + Duration::milliseconds(750)).unwrap();
        let ts = ds.timestamps();
        assert_eq!(ts.len(), 3);
        assert_eq!(*ts.last().unwrap(), now());
        assert_eq!(ts[0], now() - Duration::seconds(2));
        assert!(ts.windows(2).all(|w| w[1] - w[0] == Duration::seconds(1)));
    }

    #[test]
    fn truncates_to_window() {
        let raw = table(&["1;1;1;1;1;1;1;OK", "2;2;2;2;2;2;2;NOK", "3;3;3;3;3;3;3;OK"]);
        let ds = prepare_at(&raw, 2, now()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.numeric("Turning_Cut_Depth").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn colors_follow_class() {
        let raw = table(&["1;1;1;1;1;1;1;OK", "2;2;2;2;2;2;2;NOK", "3;3;3;3;3;3;3;"]);
        let ds = prepare_at(&raw, 10, now()).unwrap();
        assert_eq!(ds.colors(), &[Color::Green, Color::Red, Color::Red]);
    }

    #[test]
    fn missing_required_field_is_schema_error() {
        let (raw, _) = parse_table("Drill_Pressure;class\n1;OK", ';').unwrap();
        match prepare_at(&raw, 10, now()) {
            Err(DashboardError::MissingFields { missing }) => {
                assert_eq!(missing.len(), 6);
                assert!(missing.contains(&"Drilling_Speed".to_string()));
            }
            other => panic!("expected MissingFields, got {:?}", other),
        }
    }

    #[test]
    fn fully_missing_column_is_rejected() {
        let raw = table(&[";1;1;1;1;1;1;OK", ";2;2;2;2;2;2;OK"]);
        assert!(matches!(
            prepare_at(&raw, 10, now()),
            Err(DashboardError::EmptyColumn(c)) if c == "Drill_Pressure"
        ));
    }

    #[test]
    fn non_numeric_sensor_is_schema_error() {
        let raw = table(&["high;1;1;1;1;1;1;OK"]);
        assert!(matches!(prepare_at(&raw, 10, now()), Err(DashboardError::Schema(_))));
    }

    #[test]
    fn empty_source_prepares_empty_dataset() {
        let raw = table(&[]);
        let ds = prepare_at(&raw, 10, now()).unwrap();
        assert!(ds.is_empty());
        assert!(ds.colors().is_empty());
    }

    #[test]
    fn preparation_is_repeatable() {
        let raw = table(&["1;;1;1;1;1;1;OK", "2;5;2;2;2;;2;NOK"]);
        let a = prepare_at(&raw, 10, now()).unwrap();
        let b = prepare_at(&raw, 10, now()).unwrap();
        assert_eq!(a.columns(), b.columns());
        assert_eq!(a.timestamps(), b.timestamps());
    }
}
