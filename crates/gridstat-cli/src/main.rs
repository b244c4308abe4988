// gridstat entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, so stdout carries only the JSON document)
// 2. Parse arguments and load config
// 3. Validate the request, filling omitted parameters from config
// 4. Build the provider and run one extraction
// 5. Write the JSON document to stdout or --output

use gridstat_core::config::{self, Config, ProviderKind};
use gridstat_core::pipeline::{self, ExtractError, ExtractResponse};
use gridstat_core::provider::csv_dir::CsvDirProvider;
use gridstat_core::provider::http::HttpProvider;
use gridstat_core::provider::StatsProvider;
use gridstat_core::request::{current_season, ExtractRequest, RequestError};

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line arguments for gridstat
#[derive(Parser, Debug)]
#[command(name = "gridstat")]
#[command(about = "Extract normalized player stats, season aggregates and team analytics as JSON")]
#[command(version)]
struct Args {
    /// Seasons to extract (default: the most recent `request.lookback_seasons`)
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    years: Vec<String>,

    /// Positions to include (default: `request.positions` from config)
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    positions: Vec<String>,

    /// Restrict weekly rows to a single week
    #[arg(short, long)]
    week: Option<String>,

    /// Write the JSON document to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (default: config/gridstat.toml when present)
    #[arg(short, long, env = "GRIDSTAT_CONFIG")]
    config: Option<PathBuf>,

    /// Read `{weekly,seasonal,roster}_{season}.csv` files from this directory
    #[arg(long, env = "GRIDSTAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Pretty-print the JSON document
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;

    // 2. Arguments and config
    let args = Args::parse();
    let config = config::load_config(args.config.as_deref()).context("failed to load configuration")?;

    // 3. Request
    let season = current_season(chrono::Local::now().date_naive());
    let request = build_request(&args, &config, season).map_err(ExtractError::from)?;
    info!(
        "Request: years={:?}, positions={:?}, week={:?}",
        request.seasons(),
        request.positions(),
        request.week()
    );

    // 4. Provider and extraction
    let provider = build_provider(&args, &config)?;
    let response = pipeline::extract(provider.as_ref(), &request)
        .await
        .context("extraction failed")?;
    info!(
        "Extracted {} weekly, {} seasonal, {} aggregated records; {} players, {} teams",
        response.metadata.total_weekly_records,
        response.metadata.total_seasonal_records,
        response.metadata.total_aggregated_records,
        response.metadata.total_players,
        response.metadata.total_teams
    );

    // 5. Output
    write_output(&response, args.output.as_deref(), args.pretty || config.output.pretty)?;

    Ok(())
}

/// Combine command-line parameters with config defaults and validate them.
fn build_request(
    args: &Args,
    config: &Config,
    current_season: u16,
) -> Result<ExtractRequest, RequestError> {
    let years: Vec<String> = if args.years.is_empty() {
        ExtractRequest::recent(current_season, config.request.lookback_seasons)
            .seasons()
            .iter()
            .map(u16::to_string)
            .collect()
    } else {
        args.years.clone()
    };
    let positions = if args.positions.is_empty() {
        config.request.positions.as_slice()
    } else {
        args.positions.as_slice()
    };

    ExtractRequest::parse(
        years.as_slice(),
        positions,
        args.week.as_deref(),
        &config.request.limits(),
        current_season,
    )
}

/// `--data-dir` forces the CSV directory provider; otherwise the configured
/// provider is used.
fn build_provider(args: &Args, config: &Config) -> anyhow::Result<Box<dyn StatsProvider>> {
    let settings = &config.provider;
    let options = settings.options();

    if let Some(dir) = &args.data_dir {
        info!("Reading CSV files from {}", dir.display());
        return Ok(Box::new(CsvDirProvider::new(dir.clone(), options)));
    }

    match settings.kind {
        ProviderKind::CsvDir => {
            info!("Reading CSV files from {}", settings.data_dir.display());
            Ok(Box::new(CsvDirProvider::new(settings.data_dir.clone(), options)))
        }
        ProviderKind::Http => {
            let provider = HttpProvider::new(settings.urls.clone(), settings.timeout(), options)
                .context("failed to initialize HTTP provider")?;
            Ok(Box::new(provider))
        }
    }
}

fn write_output(response: &ExtractResponse, path: Option<&Path>, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(response)
    } else {
        serde_json::to_string(response)
    }
    .context("failed to serialize extraction result")?;

    match path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridstat=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstat_core::request::Position;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("gridstat").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_come_from_config() {
        let request = build_request(&args(&[]), &Config::default(), 2024).unwrap();
        assert_eq!(request.seasons(), &[2020, 2021, 2022, 2023, 2024]);
        assert_eq!(request.positions(), &Position::ALL);
        assert_eq!(request.week(), None);
    }

    #[test]
    fn explicit_parameters_override_config() {
        let request = build_request(
            &args(&["--years", "2022,2023", "--positions", "wr", "--week", "4"]),
            &Config::default(),
            2024,
        )
        .unwrap();
        assert_eq!(request.seasons(), &[2022, 2023]);
        assert_eq!(request.positions(), &[Position::WR]);
        assert_eq!(request.week(), Some(4));
    }

    #[test]
    fn repeated_flags_accumulate() {
        let request = build_request(&args(&["-y", "2023", "-y", "2024", "-p", "QB", "TE"]), &Config::default(), 2024)
            .unwrap();
        assert_eq!(request.seasons(), &[2023, 2024]);
        assert_eq!(request.positions(), &[Position::QB, Position::TE]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let err = build_request(&args(&["--years", "2030"]), &Config::default(), 2024).unwrap_err();
        assert!(matches!(err, RequestError::InvalidYear { .. }));

        let err = build_request(&args(&["--week", "40"]), &Config::default(), 2024).unwrap_err();
        assert!(matches!(err, RequestError::InvalidWeek { .. }));
    }

    #[test]
    fn data_dir_selects_csv_provider() {
        let provider = build_provider(&args(&["--data-dir", "fixtures"]), &Config::default());
        assert!(provider.is_ok());
    }
}
