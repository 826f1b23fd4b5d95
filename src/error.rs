use thiserror::Error;

/// Errors raised while loading, preparing, or viewing the dataset.
///
/// `Schema`, `EmptyColumn` and `Config` are startup failures: the process must
/// not serve views after one of them. `UnknownColumn` is recoverable and only
/// faults the slot that asked for the column.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("schema error: missing required fields {missing:?}")]
    MissingFields { missing: Vec<String> },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("column {0} has no observed values to impute from")]
    EmptyColumn(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("dispatcher is no longer running")]
    DispatcherClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    /// Startup errors halt the process; everything else is isolated to a slot
    /// or a request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DashboardError::MissingFields { .. }
                | DashboardError::Schema(_)
                | DashboardError::EmptyColumn(_)
                | DashboardError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_column_is_recoverable() {
        assert!(!DashboardError::UnknownColumn("x".into()).is_fatal());
        assert!(DashboardError::EmptyColumn("x".into()).is_fatal());
        assert!(DashboardError::MissingFields { missing: vec!["class".into()] }.is_fatal());
    }

    #[test]
    fn missing_fields_message_lists_names() {
        let err = DashboardError::MissingFields {
            missing: vec!["class".into(), "Drill_Pressure".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("class"));
        assert!(msg.contains("Drill_Pressure"));
    }
}
