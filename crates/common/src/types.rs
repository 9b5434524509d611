// Core domain types shared across all Tabula crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default grid column count when a dashboard doesn't specify one.
pub const DEFAULT_GRID_COLUMNS: u32 = 12;
/// Default row height in pixels.
pub const DEFAULT_ROW_HEIGHT_PX: u32 = 80;
/// Default cell margin in pixels.
pub const DEFAULT_MARGIN_PX: u32 = 8;

/// A cell rectangle on the dashboard grid. `w` and `h` are in cells and
/// must be at least 1; boundary validation enforces this on import.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl GridPos {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// First column to the right of this rectangle.
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    /// First row below this rectangle.
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    /// Axis-aligned overlap test between two cell rectangles.
    pub fn overlaps(&self, other: &GridPos) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// A rectangle with zero width or height occupies no cells.
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Grid configuration for a dashboard. Immutable for the lifetime of an
/// editing session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GridLayout {
    pub columns: u32,
    pub row_height_px: u32,
    pub margin_px: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: DEFAULT_GRID_COLUMNS,
            row_height_px: DEFAULT_ROW_HEIGHT_PX,
            margin_px: DEFAULT_MARGIN_PX,
        }
    }
}

/// The kind of a placed widget. Derived from its config variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Chart,
    Text,
    Image,
    Metric,
    Table,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Area,
    Scatter,
    Doughnut,
}

/// Visual/data configuration, statically shaped per widget kind.
///
/// Each variant owns its own fields rather than a free-form config bag, so
/// a chart option can't silently end up on a text widget. `Custom` keeps a
/// JSON escape hatch for host-defined components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetConfig {
    Chart(ChartConfig),
    Text(TextConfig),
    Image(ImageConfig),
    Metric(MetricConfig),
    Table(TableConfig),
    Custom(CustomConfig),
}

impl WidgetConfig {
    pub fn kind(&self) -> WidgetKind {
        match self {
            Self::Chart(_) => WidgetKind::Chart,
            Self::Text(_) => WidgetKind::Text,
            Self::Image(_) => WidgetKind::Image,
            Self::Metric(_) => WidgetKind::Metric,
            Self::Table(_) => WidgetKind::Table,
            Self::Custom(_) => WidgetKind::Custom,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
    pub chart: ChartKind,
    pub title: Option<String>,
    /// Query or dataset identifier resolved by the host application.
    pub data_source: Option<String>,
    pub show_legend: bool,
    pub stacked: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            chart: ChartKind::Line,
            title: None,
            data_source: None,
            show_legend: true,
            stacked: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextConfig {
    pub content: String,
    pub align: TextAlign,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    pub url: String,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricConfig {
    pub label: String,
    pub data_source: Option<String>,
    /// Display format hint, e.g. `"percent"` or `"currency"`.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    pub data_source: Option<String>,
    pub page_size: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { data_source: None, page_size: 10 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CustomConfig {
    /// Host component identifier.
    pub component: String,
    pub props: serde_json::Value,
}

/// A placed, configured widget on the dashboard grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Widget {
    /// Unique, assigned at creation, never reused.
    pub id: Uuid,
    pub position: GridPos,
    pub config: WidgetConfig,
    /// Per-widget counter, bumped on every update to this widget.
    pub version: u64,
}

impl Widget {
    pub fn new(config: WidgetConfig, position: GridPos) -> Self {
        Self { id: Uuid::new_v4(), position, config, version: 1 }
    }

    pub fn kind(&self) -> WidgetKind {
        self.config.kind()
    }
}

/// Root aggregate: a dashboard document.
///
/// `version` strictly increases with every structural mutation and
/// `updated_at` is monotonic non-decreasing; `touch()` maintains both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    pub id: Uuid,
    pub name: String,
    pub version: u64,
    /// Ordered list; order is z-order/display order, not placement order.
    pub widgets: Vec<Widget>,
    pub layout: GridLayout,
    pub updated_at: DateTime<Utc>,
}

impl Dashboard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 1,
            widgets: Vec::new(),
            layout: GridLayout::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn widget(&self, id: Uuid) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn widget_mut(&mut self, id: Uuid) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    /// Bump `version` and advance `updated_at` without ever moving it
    /// backwards (wall clocks can step back).
    pub fn touch(&mut self) {
        self.version += 1;
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}
