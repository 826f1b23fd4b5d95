//! Sensor dashboard core for a drilling / milling / turning line.
//!
//! The dataset is prepared once at startup and then only read. Selections
//! arrive as events, are resolved against the prepared data, and leave as
//! `ChartSpec`s for whatever renders the page.

pub mod chart;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod prepare;
pub mod registry;
pub mod resolver;
pub mod server;

pub use chart::{ChartSpec, Color};
pub use error::{DashboardError, Result};
pub use prepare::{prepare, prepare_at, PreparedDataset};
pub use registry::ColumnRegistry;
pub use resolver::{resolve_scatter, resolve_subsystem, Subsystem, SubsystemKey, ViewResolver};
