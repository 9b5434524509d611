// Builder facade: widget-level operations over the dashboard document,
// composing the grid placement engine, the history log, and the auto-save
// scheduler.
//
// Every mutating operation applies the change (bumping the document
// version), pushes a tagged history entry, and marks the scheduler dirty.
// Operations on a missing widget id are silent no-ops — the view layer may
// hold stale references during concurrent edits, and resilience beats
// strict surfacing there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use tabula_common::action::BuilderAction;
use tabula_common::import::{parse_dashboard, ImportError};
use tabula_common::types::{Dashboard, GridPos, Widget, WidgetConfig};

use crate::autosave::{AutoSavePolicy, SaveKind, SaveScheduler, SaveStatus};
use crate::history::{HistoryLog, DEFAULT_MAX_HISTORY_STEPS};
use crate::placement::{place, DEFAULT_MAX_SCAN_ROWS};

/// Default size, in grid cells, for widgets added without a position.
pub const DEFAULT_WIDGET_W: u32 = 4;
pub const DEFAULT_WIDGET_H: u32 = 3;

/// Partial widget update: only the present fields are applied.
#[derive(Debug, Clone, Default)]
pub struct WidgetPatch {
    pub config: Option<WidgetConfig>,
    pub position: Option<GridPos>,
}

/// View-facing snapshot of the builder's edit state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuilderStatus {
    pub save: SaveStatus,
    pub dirty: bool,
    pub saving: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub save_error: Option<String>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub history_len: usize,
    pub document_version: u64,
}

/// Owns the live dashboard document and its edit-state machinery.
///
/// Single-threaded by design: callers serialize mutations (the runtime
/// driver wraps this in a lock), and each operation runs to completion.
pub struct DashboardBuilder {
    dashboard: Dashboard,
    history: HistoryLog,
    scheduler: SaveScheduler,
    max_scan_rows: u32,
}

impl DashboardBuilder {
    pub fn new(dashboard: Dashboard, policy: AutoSavePolicy) -> Self {
        Self::with_limits(dashboard, policy, DEFAULT_MAX_HISTORY_STEPS, DEFAULT_MAX_SCAN_ROWS)
    }

    pub fn with_limits(
        dashboard: Dashboard,
        policy: AutoSavePolicy,
        max_history_steps: usize,
        max_scan_rows: u32,
    ) -> Self {
        let history = HistoryLog::new(
            dashboard.clone(),
            BuilderAction::ImportDashboard,
            "dashboard loaded",
            max_history_steps,
        );
        Self { dashboard, history, scheduler: SaveScheduler::new(policy), max_scan_rows }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    // ── Widget operations ───────────────────────────────────────────

    /// Add a widget. Without an explicit position, the placement engine
    /// picks the first free 4×3 slot (appending below existing content
    /// when the scan exhausts). Returns the new widget's id.
    pub fn add_widget(&mut self, config: WidgetConfig, position: Option<GridPos>) -> Uuid {
        self.add_widget_at(Instant::now(), config, position)
    }

    pub fn add_widget_at(
        &mut self,
        now: Instant,
        config: WidgetConfig,
        position: Option<GridPos>,
    ) -> Uuid {
        let position = position.unwrap_or_else(|| {
            place(
                &self.dashboard.widgets,
                DEFAULT_WIDGET_W,
                DEFAULT_WIDGET_H,
                self.dashboard.layout.columns,
                self.max_scan_rows,
            )
        });
        let widget = Widget::new(config, position);
        let id = widget.id;
        let kind = widget.kind();
        self.dashboard.widgets.push(widget);
        self.commit(now, BuilderAction::AddWidget, format!("add {kind:?} widget"));
        debug!(widget_id = %id, ?position, "widget added");
        id
    }

    /// Remove a widget. A missing id is a silent no-op: no version bump,
    /// no history entry.
    pub fn remove_widget(&mut self, id: Uuid) -> bool {
        self.remove_widget_at(Instant::now(), id)
    }

    pub fn remove_widget_at(&mut self, now: Instant, id: Uuid) -> bool {
        let before = self.dashboard.widgets.len();
        self.dashboard.widgets.retain(|widget| widget.id != id);
        if self.dashboard.widgets.len() == before {
            debug!(widget_id = %id, "remove_widget: id not found, ignoring");
            return false;
        }
        self.commit(now, BuilderAction::RemoveWidget, "remove widget");
        true
    }

    /// Apply a partial update to a widget, bumping its own version.
    /// A missing id is a silent no-op.
    pub fn update_widget(&mut self, id: Uuid, patch: WidgetPatch) -> bool {
        self.patch_widget_at(Instant::now(), id, patch, BuilderAction::UpdateWidget)
    }

    /// Move a widget to a new grid position. Delegates to the same patch
    /// path as `update_widget`, tagged distinctly for history readability.
    pub fn move_widget(&mut self, id: Uuid, position: GridPos) -> bool {
        self.patch_widget_at(
            Instant::now(),
            id,
            WidgetPatch { position: Some(position), ..Default::default() },
            BuilderAction::MoveWidget,
        )
    }

    /// Resize a widget (a position change, tagged as a resize).
    pub fn resize_widget(&mut self, id: Uuid, position: GridPos) -> bool {
        self.patch_widget_at(
            Instant::now(),
            id,
            WidgetPatch { position: Some(position), ..Default::default() },
            BuilderAction::ResizeWidget,
        )
    }

    pub fn patch_widget_at(
        &mut self,
        now: Instant,
        id: Uuid,
        patch: WidgetPatch,
        action: BuilderAction,
    ) -> bool {
        if let Some(position) = patch.position {
            if position.is_empty() {
                warn!(widget_id = %id, ?position, "rejecting zero-area widget rectangle");
                return false;
            }
        }

        let Some(widget) = self.dashboard.widget_mut(id) else {
            debug!(widget_id = %id, action = action.as_str(), "widget not found, ignoring");
            return false;
        };

        if let Some(config) = patch.config {
            widget.config = config;
        }
        if let Some(position) = patch.position {
            widget.position = position;
        }
        widget.version += 1;

        let description = match action {
            BuilderAction::MoveWidget => "move widget",
            BuilderAction::ResizeWidget => "resize widget",
            _ => "update widget",
        };
        self.commit(now, action, description);
        true
    }

    // ── Dashboard-level operations ──────────────────────────────────

    /// Rename the dashboard.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.rename_at(Instant::now(), name)
    }

    pub fn rename_at(&mut self, now: Instant, name: impl Into<String>) {
        self.dashboard.name = name.into();
        self.commit(now, BuilderAction::UpdateDashboard, "rename dashboard");
    }

    /// Remove every widget.
    pub fn clear_widgets(&mut self) {
        self.clear_widgets_at(Instant::now())
    }

    pub fn clear_widgets_at(&mut self, now: Instant) {
        self.dashboard.widgets.clear();
        self.commit(now, BuilderAction::ClearDashboard, "clear dashboard");
    }

    /// Replace the document with a validated import. On rejection the
    /// in-memory state is left unchanged.
    pub fn import_json(&mut self, json: &str) -> Result<(), ImportError> {
        self.import_json_at(Instant::now(), json)
    }

    pub fn import_json_at(&mut self, now: Instant, json: &str) -> Result<(), ImportError> {
        let imported = parse_dashboard(json)?;
        self.dashboard = imported;
        self.commit(now, BuilderAction::ImportDashboard, "import dashboard");
        Ok(())
    }

    /// Serialize the live document (the built-in JSON export arm).
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.dashboard)
    }

    // ── Undo / redo ─────────────────────────────────────────────────

    /// Restore the previous history snapshot verbatim. A no-op at the
    /// start of the timeline. Restoring marks the document dirty (it now
    /// diverges from what was last persisted) but does not bump the
    /// version, so undo→redo round-trips are bit-identical.
    pub fn undo(&mut self) -> bool {
        self.undo_at(Instant::now())
    }

    pub fn undo_at(&mut self, now: Instant) -> bool {
        let Some(entry) = self.history.undo() else {
            return false;
        };
        self.dashboard = entry.dashboard.clone();
        self.scheduler.mark_dirty_at(now);
        true
    }

    /// Restore the next history snapshot. A no-op at the tail.
    pub fn redo(&mut self) -> bool {
        self.redo_at(Instant::now())
    }

    pub fn redo_at(&mut self, now: Instant) -> bool {
        let Some(entry) = self.history.redo() else {
            return false;
        };
        self.dashboard = entry.dashboard.clone();
        self.scheduler.mark_dirty_at(now);
        true
    }

    /// Collapse history to the current state.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    // ── Save scheduling pass-throughs ───────────────────────────────

    /// Advance the auto-save timer chain; when a scheduled save begins,
    /// returns the snapshot to persist (taken at this moment).
    pub fn poll_autosave_at(&mut self, now: Instant) -> Option<Dashboard> {
        self.scheduler.poll_at(now).then(|| self.dashboard.clone())
    }

    /// Begin a manual save, bypassing the timer chain. `None` when the
    /// document is clean or another save is in flight.
    pub fn begin_manual_save(&mut self) -> Option<Dashboard> {
        self.scheduler.begin_manual().then(|| self.dashboard.clone())
    }

    /// Begin a forced save regardless of dirty state. `None` only while
    /// another save is in flight.
    pub fn begin_force_save(&mut self) -> Option<Dashboard> {
        self.scheduler.begin_force().then(|| self.dashboard.clone())
    }

    /// Report the outcome of an in-flight save.
    pub fn complete_save(&mut self, outcome: Result<(), String>, kind: SaveKind) {
        self.scheduler.complete(outcome, kind);
    }

    pub fn complete_save_at(
        &mut self,
        now: Instant,
        outcome: Result<(), String>,
        kind: SaveKind,
    ) {
        self.scheduler.complete_at(now, outcome, kind);
    }

    pub fn next_autosave_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn pause_autosave(&mut self) {
        self.scheduler.pause();
    }

    pub fn resume_autosave(&mut self) {
        self.scheduler.resume();
    }

    pub fn set_autosave_enabled(&mut self, enabled: bool) {
        self.scheduler.set_enabled_at(Instant::now(), enabled);
    }

    pub fn scheduler(&self) -> &SaveScheduler {
        &self.scheduler
    }

    // ── Status ──────────────────────────────────────────────────────

    pub fn status(&self) -> BuilderStatus {
        BuilderStatus {
            save: self.scheduler.status(),
            dirty: self.scheduler.is_dirty(),
            saving: self.scheduler.is_saving(),
            last_saved: self.scheduler.last_saved(),
            save_error: self.scheduler.save_error().map(String::from),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            history_len: self.history.len(),
            document_version: self.dashboard.version,
        }
    }

    fn commit(&mut self, now: Instant, action: BuilderAction, description: impl Into<String>) {
        self.dashboard.touch();
        self.history.push(self.dashboard.clone(), action, description);
        self.scheduler.mark_dirty_at(now);
    }
}
