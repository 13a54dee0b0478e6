//! Locale rendering boundary.
//!
//! The source publishes Polish-formatted numbers, and downstream consumers
//! expect the same: two fractional digits with a decimal comma. Everything
//! upstream of this module works on `f64`.

use crate::domain::TrailingReturn;

/// Render a value with two fractional digits and a decimal comma (`105,50`).
pub fn format_decimal(value: f64) -> String {
    format!("{value:.2}").replace('.', ",")
}

/// Render a percentage with two fractional digits, a decimal comma and a
/// trailing percent sign (`10,00%`).
pub fn format_percent(percent: f64) -> String {
    format!("{}%", format_decimal(percent))
}

impl TrailingReturn {
    /// Display form used in every output artifact.
    pub fn display(&self) -> String {
        format_percent(self.percent)
    }
}
