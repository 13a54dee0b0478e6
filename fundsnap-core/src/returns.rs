//! Trailing returns and NAV/as-of selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{FundSnapshot, Period, ReturnMap, Series, SeriesMap, TrailingReturn};

/// `(last / first − 1) × 100`, or `None` when the series has fewer than two
/// points or the ratio is not finite (first value zero).
pub fn trailing_return(series: &Series) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    let first = series.first()?.value;
    let last = series.last()?.value;
    if first == 0.0 {
        return None;
    }
    let percent = (last / first - 1.0) * 100.0;
    percent.is_finite().then_some(percent)
}

/// Returns for every configured period that has enough data. Periods without
/// a usable series are left out of the map.
pub fn compute_returns(series: &SeriesMap, periods: &[Period]) -> ReturnMap {
    let mut returns = ReturnMap::new();
    for &period in periods {
        let Some(s) = series.get(&period) else {
            continue;
        };
        match trailing_return(s) {
            Some(percent) => {
                returns.insert(period, TrailingReturn { period, percent });
            }
            None => debug!(%period, points = s.len(), "no return for period"),
        }
    }
    returns
}

/// Period preference for the NAV source: shortest first, duplicates removed.
pub fn preference_order(periods: &[Period]) -> Vec<Period> {
    let mut order = periods.to_vec();
    order.sort_unstable();
    order.dedup();
    order
}

/// Where the snapshot's NAV and as-of came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavSelection {
    pub period: Period,
    pub nav: f64,
    pub as_of: String,
}

/// Pick the NAV and as-of date from the shortest period that has at least one
/// point. The first assignment sticks; later periods never overwrite it.
pub fn select_nav(series: &SeriesMap, periods: &[Period]) -> Option<NavSelection> {
    preference_order(periods)
        .into_iter()
        .fold(None, |chosen, period| {
            if chosen.is_some() {
                return chosen;
            }
            series
                .get(&period)
                .and_then(Series::last)
                .map(|point| NavSelection {
                    period,
                    nav: point.value,
                    as_of: point.date.clone(),
                })
        })
}

/// Assemble the immutable per-fund snapshot.
pub fn build_snapshot(
    fund_name: &str,
    generated_at: DateTime<Utc>,
    series: &SeriesMap,
    periods: &[Period],
) -> FundSnapshot {
    let selection = select_nav(series, periods);
    FundSnapshot {
        generated_at,
        fund_name: fund_name.to_string(),
        as_of: selection.as_ref().map(|s| s.as_of.clone()),
        nav: selection.map(|s| s.nav),
        returns: compute_returns(series, periods),
    }
}
