use crate::error::{DashboardError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub dataset_path: String,
    pub delimiter: char,
    /// Number of leading rows kept from the source file.
    pub window: usize,
    pub bind_addr: String,
    pub port: u16,
    pub debug: bool,
    pub scatter_x: String,
    pub scatter_y: String,
    pub dispatch_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: "summerschool_dataset.csv".to_string(),
            delimiter: ';',
            window: 10_000,
            bind_addr: "127.0.0.1".to_string(),
            port: 8051,
            debug: false,
            scatter_x: "Drill_Pressure".to_string(),
            scatter_y: "Drilling_Speed".to_string(),
            dispatch_capacity: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            dataset_path: std::env::var("DATASET_PATH").unwrap_or(d.dataset_path),
            delimiter: std::env::var("DATASET_DELIMITER").ok().and_then(|v| v.chars().next()).unwrap_or(d.delimiter),
            window: std::env::var("WINDOW").ok().and_then(|v| v.parse().ok()).unwrap_or(d.window),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(d.bind_addr),
            port: std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.port),
            debug: std::env::var("DEBUG").map(|v| parse_flag(&v)).unwrap_or(d.debug),
            scatter_x: std::env::var("SCATTER_X").unwrap_or(d.scatter_x),
            scatter_y: std::env::var("SCATTER_Y").unwrap_or(d.scatter_y),
            dispatch_capacity: std::env::var("DISPATCH_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(d.dispatch_capacity),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(DashboardError::Config("WINDOW must be at least 1".into()));
        }
        if self.dispatch_capacity == 0 {
            return Err(DashboardError::Config("DISPATCH_CAPACITY must be at least 1".into()));
        }
        if self.delimiter == '"' || self.delimiter == '\n' {
            return Err(DashboardError::Config(format!("unusable delimiter {:?}", self.delimiter)));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
