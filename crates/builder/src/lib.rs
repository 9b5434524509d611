// tabula-builder: the dashboard builder's edit-state core — widget
// collection, grid placement, undo/redo history, and auto-save scheduling.

pub mod autosave;
pub mod builder;
pub mod config;
pub mod export;
pub mod history;
pub mod placement;
pub mod shortcuts;
