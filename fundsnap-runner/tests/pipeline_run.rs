//! End-to-end runs against an in-memory fetcher.
//!
//! Every test writes into its own temp directory and checks both the returned
//! report and the artifacts on disk.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use fundsnap_core::{format_decimal, Fund, LinkPattern, Period};
use fundsnap_runner::{
    run, Config, FetchError, Fetched, Fetcher, HttpConfig, OutputConfig, Pipeline, RunError,
};
use url::Url;

// ── Stub transport ───────────────────────────────────────────────────

#[derive(Default)]
struct StubFetcher {
    responses: HashMap<String, Fetched>,
    requests: RefCell<Vec<String>>,
}

impl StubFetcher {
    fn with(mut self, url: &str, body: &str, content_type: &str) -> Self {
        let key = Url::parse(url).unwrap().to_string();
        self.responses
            .insert(key, Fetched::new(body.as_bytes(), Some(content_type)));
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &Url) -> Result<Fetched, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        self.responses
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

const AKCJI_PAGE: &str = "https://www.uniqa.pl/fundusze/akcji";
const OBLIGACJI_PAGE: &str = "https://www.uniqa.pl/fundusze/obligacji";

fn download(fund_id: u32, period: u32) -> String {
    format!("https://www.uniqa.pl/download?fundId={fund_id}&fundType=FIO&period={period}")
}

fn page_with_links(fund_id: u32, periods: &[u32]) -> String {
    let anchors: String = periods
        .iter()
        .map(|p| format!(r#"<li><a href="/download?fundId={fund_id}&amp;fundType=FIO&amp;period={p}">{p}M</a></li>"#))
        .collect();
    format!("<html><body><h1>Notowania</h1><ul>{anchors}</ul></body></html>")
}

const TWO_ROWS: &str = "Data;Wartość jednostki\n01.01.2024;100,00\n01.02.2024;105,50\n";

fn config(dir: &Path, funds: &[(&str, &str)], periods: &[u32]) -> Config {
    Config {
        funds: funds
            .iter()
            .map(|(name, url)| Fund {
                name: name.to_string(),
                url: Url::parse(url).unwrap(),
            })
            .collect(),
        periods: periods.iter().map(|&p| Period(p)).collect(),
        currency: "PLN".into(),
        links: LinkPattern::default(),
        http: HttpConfig::default(),
        output: OutputConfig {
            data_dir: dir.join("data"),
            output_dir: dir.join("output"),
        },
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn missing_link_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), &[("Akcji", AKCJI_PAGE)], &[1, 3]);
    let fetcher = StubFetcher::default()
        .with(AKCJI_PAGE, &page_with_links(7, &[1]), "text/html")
        .with(&download(7, 1), TWO_ROWS, "text/csv");

    let report = run(&config, &fetcher).unwrap();

    let snap = &report.snapshots[0];
    assert_eq!(snap.return_for(Period(1)).unwrap().display(), "5,50%");
    assert!(snap.return_for(Period(3)).is_none());
    assert_eq!(snap.nav.map(format_decimal).as_deref(), Some("105,50"));
    assert_eq!(snap.as_of.as_deref(), Some("01.02.2024"));

    let validation = &report.summary.funds[0];
    assert_eq!(validation.missing_links, vec![Period(3)]);
    assert_eq!(validation.missing_files, vec![Period(3)]);
    assert_eq!(validation.missing_returns, vec![Period(3)]);
    assert!(!validation.ok);
    assert_eq!(report.summary.issue_count, 1);

    // Page plus the one resolved file; nothing fetched for the missing link.
    assert_eq!(fetcher.requested().len(), 2);

    let history = read_lines(&report.paths.history);
    assert_eq!(
        history,
        vec![
            "timestamp_utc,fund_name,as_of,nav,ret_1m,ret_3m".to_string(),
            format!(
                "{},Akcji,01.02.2024,\"105,50\",\"5,50%\",",
                report.generated_at.format("%Y-%m-%dT%H:%M:%SZ")
            ),
        ]
    );

    let text = std::fs::read_to_string(&report.paths.report).unwrap();
    assert!(text.contains("  NAV: 105,50 PLN"));
    assert!(text.contains("  1M: 5,50%"));
    assert!(text.contains("  3M: brak danych"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report.paths.validation_json).unwrap())
            .unwrap();
    assert_eq!(json["total_funds"], 1);
    assert_eq!(json["ok_count"], 0);
    assert_eq!(json["funds"][0]["missing_links"], serde_json::json!([3]));

    let summary_text = std::fs::read_to_string(&report.paths.validation_text).unwrap();
    assert!(summary_text.contains("- Akcji [ISSUES]"));
}

#[test]
fn complete_fund_is_ok_and_history_appends() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), &[("Akcji", AKCJI_PAGE)], &[1, 3]);
    let fetcher = StubFetcher::default()
        .with(AKCJI_PAGE, &page_with_links(7, &[1, 3]), "text/html")
        .with(&download(7, 1), TWO_ROWS, "text/csv")
        .with(
            &download(7, 3),
            "Data,Kurs\n01.11.2023,\"90,00\"\n01.02.2024,\"105,50\"\n",
            "text/csv",
        );

    let first = run(&config, &fetcher).unwrap();
    assert!(first.summary.all_ok());
    let three = first.snapshots[0].return_for(Period(3)).unwrap();
    assert_eq!(three.display(), "17,22%");

    run(&config, &fetcher).unwrap();

    let history = read_lines(&first.paths.history);
    assert_eq!(history.len(), 3, "one header and one row per run");
    assert!(history[0].starts_with("timestamp_utc,"));
    assert_eq!(
        history.iter().filter(|l| l.starts_with("timestamp_utc")).count(),
        1
    );

    let latest = read_lines(&first.paths.latest);
    assert_eq!(latest.len(), 2, "latest view is rewritten, not appended");
}

#[test]
fn undecodable_file_only_loses_its_period() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), &[("Akcji", AKCJI_PAGE)], &[1, 3]);
    let fetcher = StubFetcher::default()
        .with(AKCJI_PAGE, &page_with_links(7, &[1, 3]), "text/html")
        .with(&download(7, 1), "not a workbook", "application/vnd.ms-excel")
        .with(&download(7, 3), TWO_ROWS, "text/csv");

    let report = run(&config, &fetcher).unwrap();
    let validation = &report.summary.funds[0];
    assert!(validation.missing_links.is_empty());
    assert_eq!(validation.missing_files, vec![Period(1)]);
    assert!(validation.empty_series.is_empty());
    assert!(!validation.ok);

    // NAV falls through to the next period with data.
    assert_eq!(validation.base.as_ref().unwrap().period, Period(3));
    assert_eq!(report.snapshots[0].as_of.as_deref(), Some("01.02.2024"));
}

#[test]
fn short_series_is_reported_and_still_supplies_nav() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), &[("Akcji", AKCJI_PAGE)], &[3, 1]);
    let fetcher = StubFetcher::default()
        .with(AKCJI_PAGE, &page_with_links(7, &[1, 3]), "text/html")
        .with(
            &download(7, 1),
            "Data;Wartość\nData:;Wartość\n02.02.2024;106,00\n",
            "text/csv",
        )
        .with(&download(7, 3), TWO_ROWS, "text/csv");

    let report = run(&config, &fetcher).unwrap();
    let snap = &report.snapshots[0];
    assert_eq!(snap.nav.map(format_decimal).as_deref(), Some("106,00"));
    assert_eq!(snap.as_of.as_deref(), Some("02.02.2024"));
    assert!(snap.return_for(Period(1)).is_none());

    let validation = &report.summary.funds[0];
    assert_eq!(validation.empty_series, vec![Period(1)]);
    assert_eq!(validation.missing_returns, vec![Period(1)]);
}

#[test]
fn page_failure_aborts_run_after_earlier_history() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(
        tmp.path(),
        &[("Akcji", AKCJI_PAGE), ("Obligacji", OBLIGACJI_PAGE)],
        &[1],
    );
    let fetcher = StubFetcher::default()
        .with(AKCJI_PAGE, &page_with_links(7, &[1]), "text/html")
        .with(&download(7, 1), TWO_ROWS, "text/csv");

    let err = run(&config, &fetcher).unwrap_err();
    match err {
        RunError::Fetch { fund, source } => {
            assert_eq!(fund, "Obligacji");
            assert!(matches!(source, FetchError::Status { status: 404, .. }));
        }
        other => panic!("expected fetch error, got {other}"),
    }

    let history = read_lines(&tmp.path().join("data/history.csv"));
    assert_eq!(history.len(), 2);
    assert!(history[1].contains(",Akcji,"));
    assert!(!tmp.path().join("data/latest.csv").exists());
}

#[test]
fn file_failure_is_fatal_for_the_fund() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), &[("Akcji", AKCJI_PAGE)], &[1]);
    let fetcher =
        StubFetcher::default().with(AKCJI_PAGE, &page_with_links(7, &[1]), "text/html");

    let pipeline = Pipeline::new(&fetcher, &config);
    let err = pipeline
        .process_fund(&config.funds[0], chrono::Utc::now())
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[test]
fn resolve_reports_only_configured_periods() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), &[("Akcji", AKCJI_PAGE)], &[1, 12]);
    let fetcher = StubFetcher::default().with(
        AKCJI_PAGE,
        &page_with_links(7, &[1, 3, 12, 36]),
        "text/html",
    );

    let links = Pipeline::new(&fetcher, &config)
        .resolve(&config.funds[0])
        .unwrap();
    assert_eq!(links.keys().copied().collect::<Vec<_>>(), vec![Period(1), Period(12)]);
    assert_eq!(links[&Period(12)].as_str(), download(7, 12));
}
