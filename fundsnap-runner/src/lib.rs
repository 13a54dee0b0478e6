//! Fundsnap Runner: transport, configuration, orchestration and artifacts.
//!
//! This crate builds on `fundsnap-core` to provide:
//! - A `Fetcher` abstraction with a blocking HTTP implementation
//! - TOML/JSON configuration with discovery and validation
//! - The per-fund pipeline and the whole-run driver
//! - History journal, latest view, text report and validation report

pub mod config;
pub mod fetch;
pub mod output;
pub mod pipeline;

pub use config::{Config, ConfigError, OutputConfig};
pub use fetch::{FetchError, Fetched, Fetcher, HttpConfig, HttpFetcher};
pub use output::{
    append_history, render_report, write_latest, write_report, write_validation, OutputError,
    OutputPaths,
};
pub use pipeline::{run, FundOutcome, Pipeline, RunError, RunReport};
