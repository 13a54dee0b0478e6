//! Series extraction: [`RawTable`] → cleaned (date, value) [`Series`].
//!
//! Column detection runs an ordered list of named [`ColumnRule`]s over the
//! column names. When either the date or the value column cannot be found,
//! the first two non-blank columns are used positionally. Rows keep their
//! source order.

use tracing::debug;

use crate::domain::{Cell, Column, RawTable, Series, SeriesPoint};

/// Text the source uses for missing date cells.
const PLACEHOLDERS: [&str; 1] = ["nan"];

/// A named predicate over column names: case-insensitive substring match
/// against any of its tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRule {
    pub name: &'static str,
    tokens: Vec<String>,
}

impl ColumnRule {
    pub fn new(name: &'static str, tokens: &[&str]) -> Self {
        Self {
            name,
            tokens: tokens.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    pub fn matches(&self, column_name: &str) -> bool {
        let lower = column_name.to_lowercase();
        self.tokens.iter().any(|t| lower.contains(t.as_str()))
    }

    /// Whether `text` starts with one of this rule's tokens.
    pub fn is_prefix_of(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.tokens.iter().any(|t| lower.starts_with(t.as_str()))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// How the date/value columns were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Matched by a named rule.
    Rule {
        date_rule: &'static str,
        value_rule: &'static str,
    },
    /// First and second columns.
    Positional,
}

/// Indices into the non-blank columns of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSelection {
    pub date: usize,
    pub value: usize,
    pub source: SelectionSource,
}

/// Picks the date and value columns from a list of column names.
pub trait ColumnClassifier: Send + Sync {
    /// Rule-based selection. `None` triggers the positional fallback.
    fn classify(&self, names: &[&str]) -> Option<ColumnSelection>;

    /// Whether a date cell is really a repeated header label (e.g. `Data:`).
    fn is_header_label(&self, text: &str) -> bool;
}

/// Ordered rule lists, evaluated in priority order. Each rule scans columns
/// left to right; the first rule with a hit decides.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    pub date_rules: Vec<ColumnRule>,
    pub value_rules: Vec<ColumnRule>,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self {
            date_rules: vec![ColumnRule::new("date", &["data", "date"])],
            value_rules: vec![ColumnRule::new(
                "value",
                &["wartość", "wartosc", "value", "nav", "kurs", "cena", "price"],
            )],
        }
    }
}

impl RuleClassifier {
    fn first_match(
        rules: &[ColumnRule],
        names: &[&str],
        skip: Option<usize>,
    ) -> Option<(usize, &'static str)> {
        rules.iter().find_map(|rule| {
            names
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .find(|(_, name)| rule.matches(name))
                .map(|(i, _)| (i, rule.name))
        })
    }
}

impl ColumnClassifier for RuleClassifier {
    fn classify(&self, names: &[&str]) -> Option<ColumnSelection> {
        let (date, date_rule) = Self::first_match(&self.date_rules, names, None)?;
        let (value, value_rule) = Self::first_match(&self.value_rules, names, Some(date))?;
        Some(ColumnSelection {
            date,
            value,
            source: SelectionSource::Rule {
                date_rule,
                value_rule,
            },
        })
    }

    fn is_header_label(&self, text: &str) -> bool {
        self.date_rules.iter().any(|rule| rule.is_prefix_of(text))
    }
}

/// Parse a locale-formatted number: spaces and NBSPs (thousands separators)
/// removed, decimal comma turned into a point, trailing currency marker
/// stripped. Only finite results are accepted.
pub fn parse_locale_number(raw: &str, currency: &str) -> Option<f64> {
    let mut text: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{00A0}' | '\u{202F}'))
        .collect::<String>()
        .replace(',', ".");

    if !currency.is_empty() && text.len() >= currency.len() {
        let split = text.len() - currency.len();
        if text.is_char_boundary(split) && text[split..].eq_ignore_ascii_case(currency) {
            text.truncate(split);
        }
    }

    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Extracts a [`Series`] from a decoded table.
pub struct SeriesExtractor {
    classifier: Box<dyn ColumnClassifier>,
    currency: String,
}

impl SeriesExtractor {
    /// Extractor with the default rules, stripping `currency` from values.
    pub fn new(currency: impl Into<String>) -> Self {
        Self::with_classifier(Box::new(RuleClassifier::default()), currency)
    }

    pub fn with_classifier(
        classifier: Box<dyn ColumnClassifier>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            currency: currency.into(),
        }
    }

    /// Choose the date and value columns among `columns`.
    pub fn select_columns(&self, columns: &[&Column]) -> Option<ColumnSelection> {
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        self.classifier.classify(&names).or_else(|| {
            (columns.len() >= 2).then_some(ColumnSelection {
                date: 0,
                value: 1,
                source: SelectionSource::Positional,
            })
        })
    }

    /// Build the series. Returns an empty series when no pair of columns
    /// can be identified.
    pub fn extract(&self, table: &RawTable) -> Series {
        let columns: Vec<&Column> = table.columns.iter().filter(|c| !c.is_blank()).collect();

        let Some(selection) = self.select_columns(&columns) else {
            debug!(columns = columns.len(), "no usable column pair");
            return Series::default();
        };
        let (Some(&date_col), Some(&value_col)) =
            (columns.get(selection.date), columns.get(selection.value))
        else {
            debug!(?selection, columns = columns.len(), "selected column out of range");
            return Series::default();
        };
        debug!(
            date = %date_col.name,
            value = %value_col.name,
            source = ?selection.source,
            "selected columns"
        );

        let rows = date_col.cells.len().min(value_col.cells.len());
        let series: Series = date_col
            .cells
            .iter()
            .zip(&value_col.cells)
            .filter_map(|(date, value)| self.clean_row(date, value))
            .collect();

        if series.len() < rows {
            debug!(dropped = rows - series.len(), kept = series.len(), "dropped rows");
        }
        series
    }

    /// Apply the row rules; `None` excludes the row.
    pub fn clean_row(&self, date: &Cell, value: &Cell) -> Option<SeriesPoint> {
        let date = date.as_text();
        let date = date.trim();
        if date.is_empty()
            || PLACEHOLDERS.iter().any(|p| date.eq_ignore_ascii_case(p))
            || self.classifier.is_header_label(date)
        {
            return None;
        }

        let value = match value {
            Cell::Number(n) if n.is_finite() => *n,
            Cell::Number(_) | Cell::Empty => return None,
            Cell::Text(text) => parse_locale_number(text, &self.currency)?,
        };

        Some(SeriesPoint::new(date, value))
    }
}

impl Default for SeriesExtractor {
    fn default() -> Self {
        Self::new("PLN")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn table(columns: Vec<(&str, Vec<Cell>)>) -> RawTable {
        RawTable {
            columns: columns
                .into_iter()
                .map(|(name, cells)| Column::new(name, cells))
                .collect(),
        }
    }

    #[test]
    fn locale_numbers() {
        assert_eq!(parse_locale_number("105,50", "PLN"), Some(105.5));
        assert_eq!(parse_locale_number("1\u{00A0}234,56 PLN", "PLN"), Some(1234.56));
        assert_eq!(parse_locale_number("1 234,5pln", "PLN"), Some(1234.5));
        assert_eq!(parse_locale_number("-0,75", "PLN"), Some(-0.75));
        assert_eq!(parse_locale_number("n/a", "PLN"), None);
        assert_eq!(parse_locale_number("", "PLN"), None);
        assert_eq!(parse_locale_number("inf", "PLN"), None);
        assert_eq!(parse_locale_number("NaN", "PLN"), None);
    }

    #[test]
    fn rules_pick_named_columns_regardless_of_position() {
        let t = table(vec![
            ("Fundusz", vec![text("A"), text("A")]),
            ("Wartość jednostki [PLN]", vec![text("100,00"), text("101,00")]),
            ("Data wyceny", vec![text("01.01.2024"), text("02.01.2024")]),
        ]);
        let series = SeriesExtractor::default().extract(&t);
        assert_eq!(
            series.points(),
            &[
                SeriesPoint::new("01.01.2024", 100.0),
                SeriesPoint::new("02.01.2024", 101.0)
            ]
        );
    }

    #[test]
    fn value_column_is_first_match_in_column_order() {
        let t = table(vec![
            ("Data", vec![text("01.01.2024")]),
            ("Kurs", vec![text("10,00")]),
            ("Wartość", vec![text("99,00")]),
        ]);
        let series = SeriesExtractor::default().extract(&t);
        assert_eq!(series.points(), &[SeriesPoint::new("01.01.2024", 10.0)]);
    }

    #[test]
    fn positional_fallback_when_names_unknown() {
        let t = table(vec![
            ("A", vec![text("2024-01-01"), text("2024-02-01")]),
            ("B", vec![text("10"), text("11")]),
            ("C", vec![text("x"), text("y")]),
        ]);
        let extractor = SeriesExtractor::default();
        let cols: Vec<&Column> = t.columns.iter().collect();
        let sel = extractor.select_columns(&cols).unwrap();
        assert_eq!(sel.source, SelectionSource::Positional);
        assert_eq!(extractor.extract(&t).len(), 2);
    }

    #[test]
    fn blank_columns_are_dropped_before_positional_fallback() {
        let t = table(vec![
            ("Unnamed: 0", vec![Cell::Empty, Cell::Empty]),
            ("A", vec![text("01.01.2024"), text("01.02.2024")]),
            ("B", vec![text("1,00"), text("2,00")]),
        ]);
        let series = SeriesExtractor::default().extract(&t);
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().value, 2.0);
    }

    #[test]
    fn single_column_yields_empty_series() {
        let t = table(vec![("Notowania", vec![text("brak")])]);
        assert!(SeriesExtractor::default().extract(&t).is_empty());
    }

    #[test]
    fn date_only_table_falls_back_to_positions() {
        // Date rule hits, value rule misses: both columns are chosen positionally.
        let t = table(vec![
            ("Data", vec![text("01.01.2024")]),
            ("Zmiana", vec![text("3,00")]),
        ]);
        let extractor = SeriesExtractor::default();
        let cols: Vec<&Column> = t.columns.iter().collect();
        assert_eq!(
            extractor.select_columns(&cols).unwrap().source,
            SelectionSource::Positional
        );
    }

    #[test]
    fn bad_rows_are_excluded_and_order_kept() {
        let t = table(vec![
            (
                "Data",
                vec![
                    text("01.03.2024"),
                    text(" "),
                    text("nan"),
                    text("Data:"),
                    text("01.01.2024"),
                    text("01.02.2024"),
                ],
            ),
            (
                "Wartość",
                vec![
                    text("3,00"),
                    text("9,99"),
                    text("9,99"),
                    text("Wartość"),
                    text("abc"),
                    Cell::Number(2.0),
                ],
            ),
        ]);
        let series = SeriesExtractor::default().extract(&t);
        assert_eq!(
            series.points(),
            &[
                SeriesPoint::new("01.03.2024", 3.0),
                SeriesPoint::new("01.02.2024", 2.0)
            ]
        );
    }

    #[test]
    fn out_of_range_selection_yields_empty_series() {
        struct Beyond;
        impl ColumnClassifier for Beyond {
            fn classify(&self, names: &[&str]) -> Option<ColumnSelection> {
                Some(ColumnSelection {
                    date: 0,
                    value: names.len() + 3,
                    source: SelectionSource::Rule {
                        date_rule: "custom",
                        value_rule: "custom",
                    },
                })
            }
            fn is_header_label(&self, _text: &str) -> bool {
                false
            }
        }

        let t = table(vec![
            ("d", vec![text("2024-01-31")]),
            ("v", vec![text("7")]),
        ]);
        let series = SeriesExtractor::with_classifier(Box::new(Beyond), "PLN").extract(&t);
        assert!(series.is_empty());
    }

    #[test]
    fn custom_classifier_is_honoured() {
        struct LastTwo;
        impl ColumnClassifier for LastTwo {
            fn classify(&self, names: &[&str]) -> Option<ColumnSelection> {
                let n = names.len();
                (n >= 2).then_some(ColumnSelection {
                    date: n - 2,
                    value: n - 1,
                    source: SelectionSource::Rule {
                        date_rule: "custom",
                        value_rule: "custom",
                    },
                })
            }
            fn is_header_label(&self, _text: &str) -> bool {
                false
            }
        }

        let t = table(vec![
            ("x", vec![text("ignored")]),
            ("d", vec![text("2024-01-31")]),
            ("v", vec![text("7")]),
        ]);
        let series = SeriesExtractor::with_classifier(Box::new(LastTwo), "PLN").extract(&t);
        assert_eq!(series.points(), &[SeriesPoint::new("2024-01-31", 7.0)]);
    }
}
