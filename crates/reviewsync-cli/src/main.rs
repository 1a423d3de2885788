mod display;
mod input;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reviewsync_sync::{HttpTransport, Pacing, ReviewImporter, SyncConfig, TokioSleeper};
use tracing_subscriber::EnvFilter;

/// Bulk-import reviews into a remote review backend
#[derive(Parser, Debug)]
#[command(name = "reviewsync", version)]
#[command(about = "Assign, accept, submit and verify reviews from a CSV file", long_about = None)]
struct Cli {
    /// Log request details (equivalent to RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import every row of a CSV file
    Import(ImportArgs),
    /// Write a sample CSV file
    Example(ExampleArgs),
}

#[derive(Parser, Debug)]
struct ImportArgs {
    /// CSV file with one review per row
    csv: PathBuf,

    /// Backend base URL, e.g. https://reviews.example.org
    #[arg(long, env = "REVIEWSYNC_BASE_URL")]
    base_url: String,

    /// API bearer token
    #[arg(long, env = "REVIEWSYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// Mark every request as a dry run; the backend validates without saving
    #[arg(long)]
    dry_run: bool,

    /// JSON file overriding retry budgets and waits
    #[arg(long)]
    pacing: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Directory for submit responses that could not be classified
    #[arg(long)]
    debug_html_dir: Option<PathBuf>,

    /// Extra review field id that counts as content when verifying (repeatable)
    #[arg(long = "content-field", value_name = "ID")]
    content_fields: Vec<String>,
}

#[derive(Parser, Debug)]
struct ExampleArgs {
    /// Where to write the sample
    #[arg(default_value = input::EXAMPLE_FILE)]
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Import(args) => import(args).await,
        Commands::Example(args) => example(&args.path),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn import(args: ImportArgs) -> Result<()> {
    let records = input::read_records(&args.csv)?;
    if records.is_empty() {
        bail!("no usable rows in {}", args.csv.display());
    }

    let pacing = match &args.pacing {
        Some(path) => load_pacing(path)?,
        None => Pacing::default(),
    };
    let config = args.content_fields.iter().fold(
        SyncConfig::new(&args.base_url, &args.token)
            .context("invalid backend configuration")?
            .with_dry_run(args.dry_run)
            .with_timeout(Duration::from_secs(args.timeout_secs))
            .with_pacing(pacing)
            .with_debug_html_dir(args.debug_html_dir),
        |config, id| config.with_content_field(id),
    );

    tracing::info!(
        file = %args.csv.display(),
        records = records.len(),
        dry_run = config.dry_run,
        base_url = %config.base_url,
        "starting import"
    );

    let transport = Arc::new(HttpTransport::new(&config).context("failed to build HTTP client")?);
    let importer = ReviewImporter::new(&config, transport, Arc::new(TokioSleeper))?;
    let summary = importer.run(&records).await;

    display::print_summary(&summary, config.dry_run);
    if summary.succeeded() == 0 {
        bail!("no review was imported");
    }
    Ok(())
}

fn load_pacing(path: &Path) -> Result<Pacing> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pacing file {}", path.display()))?;
    Pacing::from_json(&json).with_context(|| format!("invalid pacing file {}", path.display()))
}

fn example(path: &Path) -> Result<()> {
    input::write_example(path)?;
    println!("Wrote {}", path.display());
    println!();
    print!("{}", input::EXAMPLE_CSV);
    Ok(())
}
