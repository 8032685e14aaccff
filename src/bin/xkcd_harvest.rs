use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use xkcd_harvest::config::HarvestConfig;
use xkcd_harvest::error::HarvestError;
use xkcd_harvest::output::{JsonOutput, OutputMode, PlainOutput};
use xkcd_harvest::pipeline::Harvester;
use xkcd_harvest::store::ContentStore;

#[derive(Parser)]
#[command(name = "xkcd-harvest")]
#[command(about = "Download every xkcd comic image into a content-addressed directory")]
#[command(version, author)]
struct Cli {
    #[arg(long)]
    dir: Option<Utf8PathBuf>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[arg(long)]
    api_root: Option<String>,

    #[arg(long)]
    user_agent: Option<String>,

    #[arg(long)]
    json: bool,

    #[arg(long, help = "Verify stored files against their fingerprints instead of downloading")]
    audit: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::CatalogUnavailable(_)
        | HarvestError::CatalogStatus { .. }
        | HarvestError::CatalogDecode(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Plain
    };
    let config = build_config(&cli)?;

    if cli.audit {
        let store = ContentStore::existing(config.directory.clone())?;
        let report = store.audit()?;
        return match output_mode {
            OutputMode::Json => JsonOutput::print_audit(&report),
            OutputMode::Plain => PlainOutput::print_audit(&report),
        }
        .into_diagnostic();
    }

    let harvester = Harvester::from_config(&config)?;
    let summary = harvester.run()?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary),
        OutputMode::Plain => PlainOutput::print_summary(&summary),
    }
    .into_diagnostic()
}

fn build_config(cli: &Cli) -> Result<HarvestConfig, HarvestError> {
    let mut config = HarvestConfig::default();
    if let Some(dir) = &cli.dir {
        config.directory = dir.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout = Duration::from_secs(timeout);
    }
    if let Some(api_root) = &cli.api_root {
        config.api_root = api_root.clone();
    }
    if let Some(user_agent) = &cli.user_agent {
        config = config.with_user_agent(user_agent);
    }
    config.validate()
}
