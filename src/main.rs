use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use portal_ingest::utils::logging::{create_spinner, log_issue_summary};
use portal_ingest::{HttpPortal, IngestConfig, IngestReport, MemoryPortal, Portal, ingest_file, load_bundles_parallel};

#[derive(Parser, Debug)]
#[command(version, about = "Validate a metadata bundle against a portal", long_about = None)]
struct Cli {
    /// Bundle files or inserts directories
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory of JSON schemas to use instead of a live portal
    #[arg(long, value_name = "DIR", conflicts_with_all = ["server", "keys"])]
    schemas: Option<PathBuf>,

    /// Portal server URL
    #[arg(long, value_name = "URL", conflicts_with = "keys")]
    server: Option<String>,

    /// Access key for the portal server
    #[arg(long, requires = "server")]
    key: Option<String>,

    /// Secret for the access key
    #[arg(long, requires = "key")]
    secret: Option<String>,

    /// JSON keys file with credentials per environment
    #[arg(long, value_name = "FILE", requires = "env")]
    keys: Option<PathBuf>,

    /// Environment name in the keys file
    #[arg(long)]
    env: Option<String>,

    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not resolve references
    #[arg(long)]
    norefs: bool,

    /// Plan creates and updates against the portal
    #[arg(long)]
    plan: bool,

    /// Show progress while loading
    #[arg(long)]
    progress: bool,
}

fn portal_from_args(cli: &Cli) -> anyhow::Result<Box<dyn Portal>> {
    if let Some(dir) = &cli.schemas {
        let portal = MemoryPortal::from_schema_dir(dir)
            .with_context(|| format!("Failed to load schemas from {}", dir.display()))?;
        return Ok(Box::new(portal));
    }
    if let (Some(keys), Some(env)) = (&cli.keys, &cli.env) {
        let portal = HttpPortal::from_keys_file(keys, env)
            .with_context(|| format!("Failed to read portal key '{env}' from {}", keys.display()))?;
        return Ok(Box::new(portal));
    }
    if let Some(server) = &cli.server {
        let mut portal = HttpPortal::new(server.clone())?;
        if let (Some(key), Some(secret)) = (&cli.key, &cli.secret) {
            portal = portal.with_credentials(key.clone(), secret.clone());
        }
        return Ok(Box::new(portal));
    }
    bail!("one of --schemas, --server or --keys is required")
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let mut config = match &cli.config {
        Some(path) => IngestConfig::from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => IngestConfig::default(),
    };
    config.norefs |= cli.norefs;
    config.plan |= cli.plan;
    config.show_progress |= cli.progress;

    let portal = portal_from_args(cli)?;

    let reports: Vec<IngestReport> = if let [file] = cli.files.as_slice() {
        let spinner = config
            .show_progress
            .then(|| create_spinner(Some(&format!("Ingesting {}", file.display()))));
        let report = ingest_file(file, portal.as_ref(), &config)
            .with_context(|| format!("Failed to ingest {}", file.display()))?;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        vec![report]
    } else {
        load_bundles_parallel(&cli.files, portal.as_ref(), &config)?
    };

    let mut has_errors = false;
    for report in &reports {
        log_issue_summary(&report.data.issues);
        for issue in report.data.issues.iter() {
            eprintln!("{issue}");
        }
        has_errors |= report.has_errors();
    }

    let output = if let [report] = reports.as_slice() {
        report.to_json()?
    } else {
        serde_json::to_value(&reports)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(has_errors)
}

fn main() -> ExitCode {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
