// Grid placement engine: first-fit scanning over occupied rectangles.
//
// Candidate origins are scanned in row-major order (top-left first), so
// placement is deterministic for a given widget list. The scan is bounded;
// when it exhausts, `place` falls back to appending below all existing
// content, which never overlaps.

use tabula_common::types::{GridPos, Widget};

/// How many rows the first-fit scan examines before giving up.
pub const DEFAULT_MAX_SCAN_ROWS: u32 = 20;

/// Find the first non-overlapping `w`×`h` slot in a `max_cols`-wide grid.
///
/// Scans `y` from 0 up to `max_scan_rows`, `x` from 0 to `max_cols - w`,
/// and returns the first candidate that overlaps none of `occupied`.
/// Returns `None` when the widget is wider than the grid or the scan
/// depth is exhausted.
pub fn first_fit(
    occupied: &[GridPos],
    w: u32,
    h: u32,
    max_cols: u32,
    max_scan_rows: u32,
) -> Option<GridPos> {
    if w == 0 || h == 0 || w > max_cols {
        return None;
    }

    for y in 0..max_scan_rows {
        for x in 0..=(max_cols - w) {
            let candidate = GridPos::new(x, y, w, h);
            if !occupied.iter().any(|rect| candidate.overlaps(rect)) {
                return Some(candidate);
            }
        }
    }

    None
}

/// Row index just below all existing content (0 for an empty grid).
pub fn content_bottom(occupied: &[GridPos]) -> u32 {
    occupied.iter().map(GridPos::bottom).max().unwrap_or(0)
}

/// Place a new `w`×`h` widget among `widgets`, falling back to appending
/// below all existing content when the bounded scan finds no slot.
///
/// The returned rectangle never overlaps an existing widget. An empty
/// grid always yields the origin.
pub fn place(widgets: &[Widget], w: u32, h: u32, max_cols: u32, max_scan_rows: u32) -> GridPos {
    let occupied: Vec<GridPos> = widgets.iter().map(|widget| widget.position).collect();
    first_fit(&occupied, w, h, max_cols, max_scan_rows)
        .unwrap_or_else(|| GridPos::new(0, content_bottom(&occupied), w, h))
}
