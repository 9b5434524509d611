// Builder action taxonomy: every history entry is tagged with the
// operation that produced it.

use serde::{Deserialize, Serialize};

/// The mutating operation that produced a history entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuilderAction {
    AddWidget,
    RemoveWidget,
    UpdateWidget,
    MoveWidget,
    ResizeWidget,
    UpdateDashboard,
    ImportDashboard,
    ClearDashboard,
}

impl BuilderAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddWidget => "add_widget",
            Self::RemoveWidget => "remove_widget",
            Self::UpdateWidget => "update_widget",
            Self::MoveWidget => "move_widget",
            Self::ResizeWidget => "resize_widget",
            Self::UpdateDashboard => "update_dashboard",
            Self::ImportDashboard => "import_dashboard",
            Self::ClearDashboard => "clear_dashboard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add_widget" => Some(Self::AddWidget),
            "remove_widget" => Some(Self::RemoveWidget),
            "update_widget" => Some(Self::UpdateWidget),
            "move_widget" => Some(Self::MoveWidget),
            "resize_widget" => Some(Self::ResizeWidget),
            "update_dashboard" => Some(Self::UpdateDashboard),
            "import_dashboard" => Some(Self::ImportDashboard),
            "clear_dashboard" => Some(Self::ClearDashboard),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BuilderAction; 8] = [
        BuilderAction::AddWidget,
        BuilderAction::RemoveWidget,
        BuilderAction::UpdateWidget,
        BuilderAction::MoveWidget,
        BuilderAction::ResizeWidget,
        BuilderAction::UpdateDashboard,
        BuilderAction::ImportDashboard,
        BuilderAction::ClearDashboard,
    ];

    #[test]
    fn action_round_trips_through_as_str() {
        for action in ALL {
            assert_eq!(BuilderAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn parse_returns_none_for_unknown() {
        assert_eq!(BuilderAction::parse("rotate_widget"), None);
        assert_eq!(BuilderAction::parse(""), None);
    }

    #[test]
    fn serde_tag_matches_as_str() {
        for action in ALL {
            let json = serde_json::to_string(&action).expect("action should serialize");
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }
}
