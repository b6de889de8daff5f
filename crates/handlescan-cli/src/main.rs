//! handlescan: find which sites a username is registered on.

mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use handlescan_core::{AppConfig, HandleScanError};
use handlescan_probe::{ProbeEngine, ProbeSession, SessionReport};
use handlescan_sites::LoadPolicy;
use output::ConsoleSink;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> handlescan_core::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    config.apply_env_overrides();
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn write_report(path: &Path, reports: &[SessionReport]) -> handlescan_core::Result<()> {
    let json = serde_json::to_string_pretty(reports)
        .map_err(|e| HandleScanError::Validation(format!("report not serializable: {e}")))?;
    std::fs::write(path, json)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_filter());

    info!("Starting handlescan v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli).context("failed to load configuration")?;
    let policy = if config.catalog.strict {
        LoadPolicy::Strict
    } else {
        LoadPolicy::Lenient
    };

    let mut engine = ProbeEngine::from_catalog(config.catalog_source(), policy, &config.probing)
        .await
        .with_context(|| format!("failed to load site catalog {}", config.catalog_source()))?;
    info!(sites = engine.registry().len(), "site catalog ready");

    engine.subscribe(Arc::new(ConsoleSink::new(cli.print_all)));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing probes already in flight");
            on_interrupt.cancel();
        }
    });

    let mut reports: Vec<SessionReport> = Vec::new();
    for username in &cli.usernames {
        let mut builder = ProbeSession::builder(username.as_str())
            .config(&config.probing)
            .cancellation_token(cancel.clone());
        if !cli.sites.is_empty() {
            builder = builder.sites(cli.sites.iter().cloned());
        }

        reports.extend(engine.run_variants(builder.build()?).await?);

        if cancel.is_cancelled() {
            break;
        }
    }

    if let Some(path) = &cli.output {
        write_report(path, &reports)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "wrote report");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use handlescan_core::ConfigError;
    use std::io::Write;

    fn cli_with_config(path: &Path, extra: &[&str]) -> Cli {
        let mut args = vec!["handlescan", "--config", path.to_str().expect("utf-8 path")];
        args.extend_from_slice(extra);
        args.push("octocat");
        Cli::try_parse_from(args).expect("parse args")
    }

    #[test]
    fn test_load_config_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "probing = [").expect("write config");

        let err = load_config(&cli_with_config(file.path(), &[])).expect_err("broken TOML");
        assert!(matches!(
            err,
            HandleScanError::Config(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_config_validates_overrides() {
        let file = tempfile::NamedTempFile::new().expect("create temp file");

        let err = load_config(&cli_with_config(file.path(), &["-c", "0"]))
            .expect_err("zero concurrency rejected");
        assert!(matches!(
            err,
            HandleScanError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_write_report_surfaces_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("missing").join("report.json");

        let err = write_report(&path, &[]).expect_err("parent directory missing");
        assert!(matches!(err, HandleScanError::Io(_)));
    }
}
