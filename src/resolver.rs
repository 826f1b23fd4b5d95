//! Selection → chart resolution.
//!
//! Both views are pure functions over the prepared dataset. The subsystem
//! table is fixed: which sensors belong to which machine is domain knowledge,
//! not configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::chart::{ChartSpec, Layout, Series, SeriesKind, SeriesX, SCATTER_CHART_HEIGHT, SUBSYSTEM_CHART_HEIGHT};
use crate::error::{DashboardError, Result};
use crate::prepare::PreparedDataset;
use crate::registry::{ColumnRegistry, MenuOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subsystem {
    Drilling,
    Milling,
    Turning,
}

pub const SUBSYSTEMS: [Subsystem; 3] = [Subsystem::Drilling, Subsystem::Milling, Subsystem::Turning];

impl Subsystem {
    pub fn label(&self) -> &'static str {
        match self {
            Subsystem::Drilling => "Drilling",
            Subsystem::Milling => "Milling",
            Subsystem::Turning => "Turning",
        }
    }

    /// Value sent by the subsystem menu.
    pub fn menu_value(&self) -> &'static str {
        match self {
            Subsystem::Drilling => "1",
            Subsystem::Milling => "2",
            Subsystem::Turning => "3",
        }
    }

    pub fn sensors(&self) -> &'static [&'static str] {
        match self {
            Subsystem::Drilling => &["Drill_Pressure", "Drilling_Surf_Quality", "Drilling_Speed"],
            Subsystem::Milling => &["Milling_Gear_Depth", "Milling_Circle_Diameter"],
            Subsystem::Turning => &["Turning_Cut_Speed", "Turning_Cut_Depth"],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Subsystem::Drilling => "Drilling Machine Sensor Values",
            Subsystem::Milling => "Milling Machine Sensor Values",
            Subsystem::Turning => "Turning Sensor Graph",
        }
    }

    fn chart_id(&self) -> &'static str {
        match self {
            Subsystem::Drilling => "Drilling Sensors",
            Subsystem::Milling => "Milling Sensors",
            Subsystem::Turning => "Turning Sensors",
        }
    }

    pub fn menu() -> Vec<MenuOption> {
        SUBSYSTEMS
            .iter()
            .map(|s| MenuOption { label: s.label().to_string(), value: s.menu_value().to_string() })
            .collect()
    }
}

/// A subsystem selection as received from the menu. Keys outside the
/// enumeration are kept as `Unmatched` and resolve to no chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemKey {
    Known(Subsystem),
    Unmatched(String),
}

impl SubsystemKey {
    pub fn parse(raw: &str) -> Self {
        let key = raw.trim();
        SUBSYSTEMS
            .iter()
            .find(|s| key == s.menu_value() || key.eq_ignore_ascii_case(s.label()))
            .map(|s| SubsystemKey::Known(*s))
            .unwrap_or_else(|| SubsystemKey::Unmatched(raw.to_string()))
    }
}

impl From<Subsystem> for SubsystemKey {
    fn from(s: Subsystem) -> Self {
        SubsystemKey::Known(s)
    }
}

impl fmt::Display for SubsystemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsystemKey::Known(s) => f.write_str(s.label()),
            SubsystemKey::Unmatched(raw) => write!(f, "unmatched({})", raw),
        }
    }
}

/// Line chart of the subsystem's sensors against the time index, or `None`
/// for an unmatched key.
pub fn resolve_subsystem(dataset: &PreparedDataset, key: &SubsystemKey) -> Option<ChartSpec> {
    let subsystem = match key {
        SubsystemKey::Known(s) => *s,
        SubsystemKey::Unmatched(_) => return None,
    };

    let mut series = Vec::with_capacity(subsystem.sensors().len());
    for name in subsystem.sensors() {
        // present and numeric after a successful prepare
        let values = dataset.numeric(name)?;
        series.push(Series {
            name: name.to_string(),
            kind: SeriesKind::Line,
            x: SeriesX::Time(dataset.timestamps().to_vec()),
            y: values.to_vec(),
            marker_colors: None,
        });
    }

    Some(ChartSpec {
        id: subsystem.chart_id().to_string(),
        series,
        layout: Layout::titled(subsystem.title(), SUBSYSTEM_CHART_HEIGHT),
    })
}

/// Scatter of `x` against `y`, one point per row, colored by the row's class.
pub fn resolve_scatter(dataset: &PreparedDataset, registry: &ColumnRegistry, x: &str, y: &str) -> Result<ChartSpec> {
    for name in [x, y] {
        if !registry.contains(name) {
            return Err(DashboardError::UnknownColumn(name.to_string()));
        }
    }
    let xs = dataset
        .numeric(x)
        .ok_or_else(|| DashboardError::UnknownColumn(x.to_string()))?;
    let ys = dataset
        .numeric(y)
        .ok_or_else(|| DashboardError::UnknownColumn(y.to_string()))?;

    Ok(ChartSpec {
        id: "scatter".to_string(),
        series: vec![Series {
            name: "Scatter Plot".to_string(),
            kind: SeriesKind::Markers,
            x: SeriesX::Values(xs.to_vec()),
            y: ys.to_vec(),
            marker_colors: Some(dataset.colors().to_vec()),
        }],
        layout: Layout::titled(format!("{} vs {} Scatter Plot", x, y), SCATTER_CHART_HEIGHT).with_axes(x, y),
    })
}

/// Prepared dataset plus its registry, shared by every slot.
#[derive(Debug, Clone)]
pub struct ViewResolver {
    dataset: Arc<PreparedDataset>,
    registry: Arc<ColumnRegistry>,
}

impl ViewResolver {
    pub fn new(dataset: Arc<PreparedDataset>) -> Self {
        let registry = Arc::new(ColumnRegistry::from_dataset(&dataset));
        Self { dataset, registry }
    }

    pub fn dataset(&self) -> &PreparedDataset {
        &self.dataset
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    pub fn subsystem(&self, key: &SubsystemKey) -> Option<ChartSpec> {
        resolve_subsystem(&self.dataset, key)
    }

    pub fn scatter(&self, x: &str, y: &str) -> Result<ChartSpec> {
        resolve_scatter(&self.dataset, &self.registry, x, y)
    }
}
