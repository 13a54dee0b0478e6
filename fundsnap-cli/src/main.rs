//! Fundsnap CLI: snapshot runs, link inspection and file inspection.
//!
//! Commands:
//! - `run`: fetch every configured fund and write history, latest, report and validation
//! - `links`: resolve the per-period download links of one fund page
//! - `inspect`: decode a local file and print the extracted series

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use fundsnap_core::{
    decode, format_decimal, format_percent, resolve_links, trailing_return, SeriesExtractor,
};
use fundsnap_runner::config::default_periods;
use fundsnap_runner::{Config, Fetcher, HttpConfig, HttpFetcher};

#[derive(Parser)]
#[command(
    name = "fundsnap",
    version,
    about = "Fund snapshot pipeline: trailing returns from published NAV files"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all configured funds and write every artifact.
    Run {
        /// Config file (.toml or .json). Defaults to discovery in the working directory.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the directory for history.csv and latest.csv.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Override the directory for report.txt and the validation report.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Exit with a non-zero status when any fund has validation issues.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Print the per-period download links found on a fund page.
    Links {
        /// Fund page URL.
        #[arg(long)]
        url: Url,

        /// Config file supplying periods, link markers and HTTP settings.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Decode a local file and print the extracted series and its return.
    Inspect {
        /// Downloaded CSV or workbook file.
        file: PathBuf,

        /// Content type to assume, as a server would advertise it.
        #[arg(long)]
        content_type: Option<String>,

        /// Currency marker to strip from values.
        #[arg(long, default_value = "PLN")]
        currency: String,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            output_dir,
            strict,
        } => run_cmd(config.as_deref(), data_dir, output_dir, strict),
        Commands::Links { url, config } => links_cmd(&url, config.as_deref()),
        Commands::Inspect {
            file,
            content_type,
            currency,
        } => inspect_cmd(&file, content_type.as_deref(), &currency),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::discover(Path::new(".")).context("failed to discover config"),
    }
}

fn run_cmd(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    strict: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = data_dir {
        config.output.data_dir = dir;
    }
    if let Some(dir) = output_dir {
        config.output.output_dir = dir;
    }

    info!(
        funds = config.funds.len(),
        periods = ?config.periods,
        "starting snapshot run"
    );
    let fetcher = HttpFetcher::new(config.http.clone())?;
    let report = fundsnap_runner::run(&config, &fetcher)?;

    println!(
        "Funds: {}  OK: {}  With issues: {}",
        report.summary.total_funds, report.summary.ok_count, report.summary.issue_count
    );
    println!("History:    {}", report.paths.history.display());
    println!("Latest:     {}", report.paths.latest.display());
    println!("Report:     {}", report.paths.report.display());
    println!("Validation: {}", report.paths.validation_json.display());

    if strict && !report.summary.all_ok() {
        bail!(
            "{} of {} funds have validation issues",
            report.summary.issue_count,
            report.summary.total_funds
        );
    }
    Ok(())
}

fn links_cmd(url: &Url, config_path: Option<&Path>) -> Result<()> {
    let (pattern, periods, http) = match config_path {
        Some(path) => {
            let config = load_config(Some(path))?;
            (config.links, config.periods, config.http)
        }
        None => (Default::default(), default_periods(), HttpConfig::default()),
    };

    let fetcher = HttpFetcher::new(http)?;
    let page = fetcher.fetch(url)?;
    let links = resolve_links(&page.text(), url, &pattern, &periods);

    for period in &periods {
        match links.get(period) {
            Some(link) => println!("{period}\t{link}"),
            None => println!("{period}\t(missing)"),
        }
    }
    Ok(())
}

fn inspect_cmd(file: &Path, content_type: Option<&str>, currency: &str) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let table = decode(&bytes, content_type)
        .with_context(|| format!("failed to decode {}", file.display()))?;

    println!(
        "Columns ({}): {}",
        table.width(),
        table.column_names().join(" | ")
    );
    println!("Rows: {}", table.height());

    let series = SeriesExtractor::new(currency).extract(&table);
    println!("Points: {}", series.len());
    for point in series.points() {
        println!("  {}\t{}", point.date, format_decimal(point.value));
    }
    if !series.is_chronological() {
        println!("Warning: dates are not in chronological order");
    }

    match trailing_return(&series) {
        Some(percent) => println!("Return: {}", format_percent(percent)),
        None => println!("Return: brak danych"),
    }
    Ok(())
}
