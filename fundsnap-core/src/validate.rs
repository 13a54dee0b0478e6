//! Completeness validation: per-fund diagnostics and run summary.
//!
//! Every non-fatal shortfall in the pipeline ends up in one of these lists,
//! so an omitted period is always traceable.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::domain::{LinkMap, Period, ReturnMap, SeriesMap};
use crate::returns::select_nav;

/// Provenance of the NAV reported for a fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseInfo {
    pub period: Period,
    pub first_date: String,
    pub last_date: String,
    pub points: usize,
}

/// Diagnostics for one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub fund_name: String,
    pub missing_links: Vec<Period>,
    pub missing_files: Vec<Period>,
    pub empty_series: Vec<Period>,
    pub missing_returns: Vec<Period>,
    /// Informational: series whose parseable dates go backwards.
    pub unordered_series: Vec<Period>,
    pub base: Option<BaseInfo>,
    pub ok: bool,
}

/// Everything the validator looks at for one fund.
#[derive(Debug, Clone, Copy)]
pub struct FundEvidence<'a> {
    pub links: &'a LinkMap,
    pub decoded: &'a BTreeSet<Period>,
    pub series: &'a SeriesMap,
    pub returns: &'a ReturnMap,
    pub periods: &'a [Period],
}

/// Cross-check one fund. A period may land in more than one list; only the
/// first three decide `ok`.
pub fn validate_fund(fund_name: &str, evidence: FundEvidence<'_>) -> ValidationResult {
    let FundEvidence {
        links,
        decoded,
        series,
        returns,
        periods,
    } = evidence;

    let points = |p: &Period| series.get(p).map_or(0, |s| s.len());

    let missing_links: Vec<Period> = periods
        .iter()
        .copied()
        .filter(|p| !links.contains_key(p))
        .collect();
    let missing_files: Vec<Period> = periods
        .iter()
        .copied()
        .filter(|p| !decoded.contains(p))
        .collect();
    let empty_series: Vec<Period> = periods
        .iter()
        .copied()
        .filter(|p| decoded.contains(p) && points(p) < 2)
        .collect();
    let missing_returns: Vec<Period> = periods
        .iter()
        .copied()
        .filter(|p| !returns.contains_key(p))
        .collect();
    let unordered_series: Vec<Period> = periods
        .iter()
        .copied()
        .filter(|p| series.get(p).is_some_and(|s| !s.is_chronological()))
        .collect();

    let base = select_nav(series, periods).and_then(|selection| {
        let s = series.get(&selection.period)?;
        Some(BaseInfo {
            period: selection.period,
            first_date: s.first()?.date.clone(),
            last_date: s.last()?.date.clone(),
            points: s.len(),
        })
    });

    let ok = missing_links.is_empty() && missing_files.is_empty() && empty_series.is_empty();

    ValidationResult {
        fund_name: fund_name.to_string(),
        missing_links,
        missing_files,
        empty_series,
        missing_returns,
        unordered_series,
        base,
        ok,
    }
}

/// Run-level aggregation of per-fund diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_funds: usize,
    pub ok_count: usize,
    pub issue_count: usize,
    pub funds: Vec<ValidationResult>,
}

impl ValidationSummary {
    pub fn from_results(funds: Vec<ValidationResult>) -> Self {
        let ok_count = funds.iter().filter(|f| f.ok).count();
        Self {
            total_funds: funds.len(),
            ok_count,
            issue_count: funds.len() - ok_count,
            funds,
        }
    }

    pub fn all_ok(&self) -> bool {
        self.issue_count == 0
    }

    /// Human-readable rendering. Periods are listed longest first.
    pub fn render_text(&self, periods: &[Period]) -> String {
        let mut descending = periods.to_vec();
        descending.sort_unstable_by(|a, b| b.cmp(a));
        descending.dedup();

        let mut out = String::new();
        let _ = writeln!(out, "Validation summary");
        let _ = writeln!(
            out,
            "Funds: {}  OK: {}  With issues: {}",
            self.total_funds, self.ok_count, self.issue_count
        );
        let _ = writeln!(out);

        for fund in &self.funds {
            let status = if fund.ok { "OK" } else { "ISSUES" };
            let _ = writeln!(out, "- {} [{status}]", fund.fund_name);
            match &fund.base {
                Some(base) => {
                    let _ = writeln!(
                        out,
                        "  base: {} ({} .. {}, {} points)",
                        base.period, base.first_date, base.last_date, base.points
                    );
                }
                None => {
                    let _ = writeln!(out, "  base: none");
                }
            }
            for period in &descending {
                let _ = writeln!(out, "  {period}: {}", period_status(fund, *period));
            }
            let _ = writeln!(out);
        }
        out
    }
}

fn period_status(fund: &ValidationResult, period: Period) -> String {
    let mut issues = Vec::new();
    if fund.missing_links.contains(&period) {
        issues.push("missing link");
    }
    if fund.missing_files.contains(&period) {
        issues.push("missing file");
    }
    if fund.empty_series.contains(&period) {
        issues.push("series too short");
    }
    if fund.missing_returns.contains(&period) {
        issues.push("return not computed");
    }
    if fund.unordered_series.contains(&period) {
        issues.push("dates out of order");
    }
    if issues.is_empty() {
        "ok".to_string()
    } else {
        issues.join(", ")
    }
}

/// Short one-line description used in logs.
pub fn describe(result: &ValidationResult) -> String {
    let list = |ps: &[Period]| {
        ps.iter()
            .map(|p| p.months().to_string())
            .collect::<Vec<_>>()
            .join(",")
    };
    let base = result
        .base
        .as_ref()
        .map(|b| format!("{} ({} pts)", b.period, b.points))
        .unwrap_or_else(|| "none".into());
    format!(
        "ok={} links=[{}] files=[{}] short=[{}] returns=[{}] base={base}",
        result.ok,
        list(&result.missing_links),
        list(&result.missing_files),
        list(&result.empty_series),
        list(&result.missing_returns),
    )
}
