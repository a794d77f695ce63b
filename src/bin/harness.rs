use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use ledger_harness::{
    config::{HarnessConfig, Mode, read_config_file},
    report::append_report,
    run,
};
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Load and consistency harness for a remote ledger service")]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<PathBuf>,

    /// Target requests per second
    #[arg(long)]
    rps: Option<u32>,

    /// Load phase duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Concurrent workers
    #[arg(long)]
    workers: Option<usize>,

    /// transfer | get-accounts
    #[arg(long)]
    mode: Option<Mode>,

    /// Append the run report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log every request
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::DEBUG
    };
    let filter = filter::Targets::new()
        .with_targets(vec![("ledger_harness", level), ("harness", level)])
        .with_default(LevelFilter::WARN);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Flags win over the environment, which wins over the file
fn load_config(args: &Args) -> anyhow::Result<HarnessConfig> {
    let mut config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => HarnessConfig::default(),
    };

    config.apply_env();

    if let Some(rps) = args.rps {
        config.rps = rps;
    }
    if let Some(duration) = args.duration {
        config.duration = duration;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(report) = &args.report {
        config.report_file = Some(report.clone());
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = load_config(&args)?;
    info!(
        "targeting {} with {} req/s for {}s",
        config.base_url, config.rps, config.duration
    );

    let report = run(&config).await?;
    println!("{report}");

    if let Some(path) = &config.report_file {
        match append_report(path, &report.title, &report.to_string()) {
            Ok(()) => info!("report appended to {}", path.display()),
            Err(e) => error!("{e:#}"),
        }
    }

    if !report.passed() {
        bail!("consistency verification failed");
    }

    Ok(())
}
