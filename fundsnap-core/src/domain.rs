//! Domain types shared by every pipeline stage.
//!
//! Values are numeric all the way through: locale rendering (decimal comma,
//! percent suffix) happens only in [`crate::format`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Trailing window length in months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(pub u32);

impl Period {
    pub fn months(self) -> u32 {
        self.0
    }

    /// Column name used by the history journal and latest view (`ret_3m`).
    pub fn column_name(self) -> String {
        format!("ret_{}m", self.0)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}M", self.0)
    }
}

/// A fund tracked by the run. Supplied by configuration, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fund {
    pub name: String,
    pub url: Url,
}

/// Per-period download links for one fund.
pub type LinkMap = BTreeMap<Period, Url>;

// ── Raw tables ───────────────────────────────────────────────────────

/// A single decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Text form of the cell, as a reader of the source file would see it.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// True when no cell carries any content.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }
}

/// Generic column-oriented table decoded from one downloaded payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<Column>,
}

impl RawTable {
    /// Build a table from a header row and data rows. Ragged rows are padded
    /// with empty cells or truncated to the header width.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = header.len();
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut().take(width) {
                column.cells.push(cells.next().unwrap_or(Cell::Empty));
            }
        }
        Self { columns }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.columns.iter().map(|c| c.cells.len()).max().unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

// ── Series ───────────────────────────────────────────────────────────

/// One cleaned observation. The date is the trimmed source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: String,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(date: impl Into<String>, value: f64) -> Self {
        Self {
            date: date.into(),
            value,
        }
    }

    /// Interpret the date text as a calendar date, when it uses one of the
    /// formats the source is known to publish.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        const DATE_FORMATS: [&str; 4] = ["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
        const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

        let text = self.date.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
            .or_else(|| {
                DATETIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                    .map(|dt| dt.date())
            })
    }
}

/// Ordered (date, value) observations in source row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    pub fn new(points: Vec<SeriesPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Whether every pair of parseable dates is non-decreasing. Points whose
    /// date cannot be interpreted are ignored.
    pub fn is_chronological(&self) -> bool {
        let dates: Vec<NaiveDate> = self
            .points
            .iter()
            .filter_map(SeriesPoint::calendar_date)
            .collect();
        dates.windows(2).all(|w| w[0] <= w[1])
    }
}

impl FromIterator<SeriesPoint> for Series {
    fn from_iter<I: IntoIterator<Item = SeriesPoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Per-period series for one fund.
pub type SeriesMap = BTreeMap<Period, Series>;

// ── Results ──────────────────────────────────────────────────────────

/// Trailing percentage return for one period (e.g. `10.0` means +10%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingReturn {
    pub period: Period,
    pub percent: f64,
}

/// Sparse period → return map. Absent periods are omitted, never zero-filled.
pub type ReturnMap = BTreeMap<Period, TrailingReturn>;

/// One run's result for one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSnapshot {
    pub generated_at: DateTime<Utc>,
    pub fund_name: String,
    pub as_of: Option<String>,
    pub nav: Option<f64>,
    pub returns: ReturnMap,
}

impl FundSnapshot {
    pub fn return_for(&self, period: Period) -> Option<&TrailingReturn> {
        self.returns.get(&period)
    }
}
