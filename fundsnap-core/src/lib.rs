//! Fundsnap Core: acquisition, normalization and return computation.
//!
//! Pure pipeline stages with no I/O of their own:
//! - Link resolution: period → download URL from a fund page
//! - Tabular decoding: delimited text or workbook bytes → generic table
//! - Series extraction: heuristic column detection and row cleaning
//! - Returns: trailing percentage returns and NAV/as-of selection
//! - Validation: per-fund completeness diagnostics
//!
//! Locale rendering (decimal comma) is confined to [`format`].

pub mod decode;
pub mod domain;
pub mod format;
pub mod links;
pub mod returns;
pub mod series;
pub mod validate;

pub use decode::{decode, DecodeError, PayloadKind};
pub use domain::{
    Cell, Column, Fund, FundSnapshot, LinkMap, Period, RawTable, ReturnMap, Series, SeriesMap,
    SeriesPoint, TrailingReturn,
};
pub use format::{format_decimal, format_percent};
pub use links::{resolve_links, LinkPattern};
pub use returns::{build_snapshot, compute_returns, select_nav, trailing_return, NavSelection};
pub use series::{ColumnClassifier, ColumnRule, RuleClassifier, SeriesExtractor};
pub use validate::{validate_fund, FundEvidence, ValidationResult, ValidationSummary};
