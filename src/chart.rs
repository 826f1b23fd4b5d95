//! Renderer-agnostic chart specifications.
//!
//! A `ChartSpec` is built once per resolution and never mutated; the HTTP
//! boundary serializes it as JSON for whatever draws the page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUBSYSTEM_CHART_HEIGHT: u32 = 820;
pub const SCATTER_CHART_HEIGHT: u32 = 800;
pub const BACKGROUND: &str = "white";

/// Per-row quality color derived from the `class` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Red,
}

impl Color {
    pub fn from_class(class: Option<&str>) -> Self {
        match class {
            Some("OK") => Color::Green,
            _ => Color::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Red => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Line,
    Markers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesX {
    Time(Vec<DateTime<Utc>>),
    Values(Vec<f64>),
}

impl SeriesX {
    pub fn len(&self) -> usize {
        match self {
            SeriesX::Time(v) => v.len(),
            SeriesX::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    pub x: SeriesX,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_colors: Option<Vec<Color>>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis_title: Option<String>,
    pub plot_background: String,
    pub paper_background: String,
    pub height: u32,
}

impl Layout {
    pub fn titled(title: impl Into<String>, height: u32) -> Self {
        Self {
            title: title.into(),
            x_axis_title: None,
            y_axis_title: None,
            plot_background: BACKGROUND.to_string(),
            paper_background: BACKGROUND.to_string(),
            height,
        }
    }

    pub fn with_axes(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_axis_title = Some(x.into());
        self.y_axis_title = Some(y.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub id: String,
    pub series: Vec<Series>,
    pub layout: Layout,
}

impl ChartSpec {
    pub fn series_names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.name.as_str()).collect()
    }
}
