use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feedsift::config::Config;
use feedsift::sink::LinkSink;
use feedsift::{source, Pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "feedsift",
    about = "Fetch candidate feeds and extract each feed's home-page link"
)]
struct Args {
    /// Input list, one `<url>;<comment>` per line
    #[arg(value_name = "INPUT", default_value = "rss.csv")]
    input: PathBuf,

    /// Output table, rewritten every run as `<link>;<comment>` lines
    #[arg(value_name = "OUTPUT", default_value = "links.csv")]
    output: PathBuf,

    /// Optional TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feeds fetched concurrently (overrides config; 1 = sequential)
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds (overrides config; 0 = none)
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Also write the run summary as JSON
    #[arg(long, value_name = "FILE")]
    json_report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the report on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.timeout_secs = timeout_secs;
    }

    // Validate the whole input before touching the network or the output
    let requests = source::read_requests(&args.input)
        .await
        .with_context(|| format!("Invalid input file: {}", args.input.display()))?;

    let pipeline = Pipeline::new(config.fetch_settings(), config.effective_concurrency())
        .context("Failed to build HTTP client")?;

    let mut sink = LinkSink::create(&args.output)
        .await
        .with_context(|| format!("Failed to create output file: {}", args.output.display()))?;

    tracing::info!(
        requests = requests.len(),
        concurrency = config.effective_concurrency(),
        timeout_secs = config.timeout_secs,
        "Starting run"
    );

    let summary = pipeline
        .run(requests, &mut sink)
        .await
        .with_context(|| format!("Failed to write output file: {}", args.output.display()))?;
    let rows = sink.rows();
    sink.finish()
        .await
        .with_context(|| format!("Failed to flush output file: {}", args.output.display()))?;

    println!("{}", summary);

    if let Err(e) = summary.check() {
        tracing::error!(error = %e, "Run summary is inconsistent");
    }
    if rows != summary.success_count {
        tracing::error!(
            rows = rows,
            success = summary.success_count,
            "Output row count differs from success count"
        );
    }

    if let Some(path) = &args.json_report {
        summary
            .write_json(path)
            .await
            .with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}
