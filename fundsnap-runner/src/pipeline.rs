//! Run orchestration.
//!
//! Funds are processed one at a time, and within a fund the configured
//! periods are processed one at a time in configured order. A transport
//! failure aborts the run; a decode failure only removes its period.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use fundsnap_core::validate::describe;
use fundsnap_core::{
    build_snapshot, decode, resolve_links, validate_fund, Fund, FundEvidence, FundSnapshot,
    LinkMap, LinkPattern, Period, SeriesExtractor, SeriesMap, ValidationResult,
    ValidationSummary,
};

use crate::config::Config;
use crate::fetch::{FetchError, Fetcher};
use crate::output::{
    append_history, render_report, write_latest, write_report, write_validation, OutputError,
    OutputPaths,
};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("fetch failed for fund '{fund}': {source}")]
    Fetch {
        fund: String,
        #[source]
        source: FetchError,
    },

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Everything produced for one fund.
#[derive(Debug, Clone)]
pub struct FundOutcome {
    pub links: LinkMap,
    pub decoded: BTreeSet<Period>,
    pub series: SeriesMap,
    pub snapshot: FundSnapshot,
    pub validation: ValidationResult,
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub snapshots: Vec<FundSnapshot>,
    pub summary: ValidationSummary,
    pub paths: OutputPaths,
}

/// Per-fund pipeline: page → links → files → tables → series → snapshot.
pub struct Pipeline<F> {
    fetcher: F,
    pattern: LinkPattern,
    periods: Vec<Period>,
    extractor: SeriesExtractor,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(fetcher: F, config: &Config) -> Self {
        Self {
            fetcher,
            pattern: config.links.clone(),
            periods: config.periods.clone(),
            extractor: SeriesExtractor::new(config.currency.clone()),
        }
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Fetch the fund page and resolve its per-period download links.
    pub fn resolve(&self, fund: &Fund) -> Result<LinkMap, FetchError> {
        let page = self.fetcher.fetch(&fund.url)?;
        let links = resolve_links(&page.text(), &fund.url, &self.pattern, &self.periods);
        debug!(fund = %fund.name, links = links.len(), "resolved download links");
        Ok(links)
    }

    pub fn process_fund(
        &self,
        fund: &Fund,
        generated_at: DateTime<Utc>,
    ) -> Result<FundOutcome, FetchError> {
        let links = self.resolve(fund)?;

        let mut decoded = BTreeSet::new();
        let mut series = SeriesMap::new();
        for &period in &self.periods {
            let Some(url) = links.get(&period) else {
                debug!(fund = %fund.name, %period, "no download link");
                continue;
            };
            let file = self.fetcher.fetch(url)?;
            match decode(&file.body, file.content_type.as_deref()) {
                Ok(table) => {
                    decoded.insert(period);
                    let extracted = self.extractor.extract(&table);
                    debug!(
                        fund = %fund.name,
                        %period,
                        columns = table.width(),
                        rows = table.height(),
                        points = extracted.len(),
                        "extracted series"
                    );
                    series.insert(period, extracted);
                }
                Err(e) => {
                    warn!(fund = %fund.name, %period, %url, error = %e, "could not decode file");
                }
            }
        }

        let snapshot = build_snapshot(&fund.name, generated_at, &series, &self.periods);
        let validation = validate_fund(
            &fund.name,
            FundEvidence {
                links: &links,
                decoded: &decoded,
                series: &series,
                returns: &snapshot.returns,
                periods: &self.periods,
            },
        );

        if validation.ok {
            info!(fund = %fund.name, "{}", describe(&validation));
        } else {
            warn!(fund = %fund.name, "{}", describe(&validation));
        }

        Ok(FundOutcome {
            links,
            decoded,
            series,
            snapshot,
            validation,
        })
    }
}

/// Process every configured fund and write all artifacts. Each fund's
/// history row is appended as soon as its snapshot is final.
pub fn run<F: Fetcher>(config: &Config, fetcher: F) -> Result<RunReport, RunError> {
    let paths = OutputPaths::from(&config.output);
    paths.ensure_dirs()?;

    let generated_at = Utc::now();
    let pipeline = Pipeline::new(fetcher, config);

    let mut snapshots = Vec::with_capacity(config.funds.len());
    let mut results = Vec::with_capacity(config.funds.len());

    for fund in &config.funds {
        info!(fund = %fund.name, url = %fund.url, "processing fund");
        let outcome = pipeline
            .process_fund(fund, generated_at)
            .map_err(|source| RunError::Fetch {
                fund: fund.name.clone(),
                source,
            })?;
        append_history(&paths.history, &outcome.snapshot, &config.periods)?;
        snapshots.push(outcome.snapshot);
        results.push(outcome.validation);
    }

    write_latest(&paths.latest, &snapshots, &config.periods)?;
    let report = render_report(&snapshots, &config.periods, &config.currency, generated_at);
    write_report(&paths.report, &report)?;

    let summary = ValidationSummary::from_results(results);
    write_validation(&paths, &summary, &config.periods)?;

    info!(
        funds = summary.total_funds,
        ok = summary.ok_count,
        issues = summary.issue_count,
        "run complete"
    );

    Ok(RunReport {
        generated_at,
        snapshots,
        summary,
        paths,
    })
}
