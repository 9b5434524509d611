// Boundary validation for imported dashboard documents.
//
// Malformed imports are rejected here, before they can touch in-memory
// state: the caller only replaces its document once `parse_dashboard`
// has returned a fully validated value.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::types::Dashboard;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid dashboard JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dashboard name must not be empty")]
    EmptyName,
    #[error("layout must have at least one column")]
    InvalidLayout,
    #[error("widget {id} has a zero-area rectangle")]
    InvalidRect { id: Uuid },
    #[error("duplicate widget id {id}")]
    DuplicateWidget { id: Uuid },
}

/// Parse and validate a dashboard document from JSON.
///
/// Shape checks beyond what serde enforces: non-empty name, at least one
/// grid column, every widget rectangle at least 1×1, and unique widget ids.
pub fn parse_dashboard(json: &str) -> Result<Dashboard, ImportError> {
    let dashboard: Dashboard = serde_json::from_str(json)?;
    validate_dashboard(&dashboard)?;
    Ok(dashboard)
}

/// Validate an already-deserialized dashboard (e.g. one built in memory).
pub fn validate_dashboard(dashboard: &Dashboard) -> Result<(), ImportError> {
    if dashboard.name.trim().is_empty() {
        return Err(ImportError::EmptyName);
    }
    if dashboard.layout.columns == 0 {
        return Err(ImportError::InvalidLayout);
    }

    let mut seen = HashSet::with_capacity(dashboard.widgets.len());
    for widget in &dashboard.widgets {
        if widget.position.is_empty() {
            return Err(ImportError::InvalidRect { id: widget.id });
        }
        if !seen.insert(widget.id) {
            return Err(ImportError::DuplicateWidget { id: widget.id });
        }
    }

    Ok(())
}
