//! Productload CLI - expand seed products into encrypted product variants
//!
//! # Main Commands
//!
//! ```bash
//! productload ingest seeds.csv --output products.jsonl   # Full pipeline
//! productload decrypt <ciphertext>                       # Check a stored prompt
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! productload parse seeds.csv             # Validate seed rows, print them as JSON
//! productload preview seeds.csv --seed 7  # Print synthesized variants, no encryption
//! ```
//!
//! The encryption key is read from `PRODUCTLOAD_ENCRYPTION_KEY` (a `.env`
//! file is honoured). Log verbosity follows `RUST_LOG`.

use clap::{Parser, Subcommand};
use productload::{
    ingest_file, parse_row, prepare_seeds, read_seed_file, AesGcmEncryptor, IngestConfig,
    IngestReport, Interrupt, JsonLinesSink, PipelineError, PriceLadder, ProgressBroadcaster,
    ProgressEvent, SeedRow, VariantGenerator,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "productload")]
#[command(about = "Generate and bulk load encrypted product variants from seed CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: CSV → variants → encrypted prompts → JSON lines
    Ingest {
        /// Input CSV file
        input: PathBuf,

        /// Output JSON lines file
        #[arg(short, long, env = "PRODUCTLOAD_OUTPUT", default_value = "products.jsonl")]
        output: PathBuf,

        /// Seed rows per batch
        #[arg(long, env = "PRODUCTLOAD_CHUNK_SIZE", default_value = "1000")]
        chunk_size: usize,

        /// Batches processed concurrently
        #[arg(short, long, env = "PRODUCTLOAD_WORKERS", default_value = "4")]
        workers: usize,

        /// Fewest variants per seed
        #[arg(long, env = "PRODUCTLOAD_MIN_VARIANTS", default_value = "50")]
        min_variants: usize,

        /// Most variants per seed
        #[arg(long, env = "PRODUCTLOAD_MAX_VARIANTS", default_value = "100")]
        max_variants: usize,

        /// Records accumulated before a bulk write
        #[arg(long, env = "PRODUCTLOAD_FLUSH_THRESHOLD", default_value = "1000")]
        flush_threshold: usize,

        /// Shutdown grace period in milliseconds
        #[arg(long, env = "PRODUCTLOAD_GRACE_MS", default_value = "800")]
        grace_ms: u64,

        /// Random seed for a reproducible run
        #[arg(long, env = "PRODUCTLOAD_SEED")]
        seed: Option<u64>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Print progress events
        #[arg(long)]
        progress: bool,

        /// Write the run report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Parse a seed CSV and output the valid rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show synthesized variants without encrypting or storing them
    Preview {
        /// Input CSV file
        input: PathBuf,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum number of variants to print
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Decrypt a stored prompt
    Decrypt {
        /// Base64 ciphertext as written by `ingest`
        ciphertext: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ingest {
            input,
            output,
            chunk_size,
            workers,
            min_variants,
            max_variants,
            flush_threshold,
            grace_ms,
            seed,
            delimiter,
            progress,
            report,
        } => match delimiter_byte(delimiter) {
            Ok(delimiter) => {
                let config = IngestConfig {
                    chunk_size,
                    pool_size: workers,
                    min_variants,
                    max_variants,
                    flush_threshold,
                    grace_period_ms: grace_ms,
                    price_ladder: PriceLadder::default(),
                    seed,
                    delimiter,
                };
                cmd_ingest(&input, &output, config, progress, report.as_deref()).await
            }
            Err(e) => Err(e),
        },

        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Preview {
            input,
            seed,
            limit,
            delimiter,
        } => cmd_preview(&input, seed, limit, delimiter),

        Commands::Decrypt { ciphertext } => cmd_decrypt(&ciphertext),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_ingest(
    input: &Path,
    output: &Path,
    config: IngestConfig,
    show_progress: bool,
    report_path: Option<&Path>,
) -> CliResult {
    eprintln!("📄 Ingesting: {}", input.display());

    config.validate()?;
    let encryptor = Arc::new(AesGcmEncryptor::from_env()?);
    let sink = Arc::new(JsonLinesSink::create(output).await?);
    let progress = ProgressBroadcaster::new();

    let printer = show_progress.then(|| {
        let mut events = BroadcastStream::new(progress.subscribe());
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                // lagged receivers just skip ahead
                if let Ok(event) = event {
                    print_event(&event);
                }
            }
        })
    });

    let (interrupt_handle, interrupt) = Interrupt::channel();
    let grace = config.grace_period();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "⚠️  Interrupted, finishing submitted batches (grace period {:?})",
                grace
            );
            interrupt_handle.trigger();
        }
    });

    let result = ingest_file(input, &config, encryptor, sink, &progress, &interrupt).await;
    ctrl_c.abort();

    let report = match result {
        Ok(report) => report,
        Err(PipelineError::Interrupted { ingested, cancelled }) => {
            eprintln!(
                "⚠️  Stopped early: {} records written to {}, {} batches cancelled",
                ingested,
                output.display(),
                cancelled
            );
            return Err("run interrupted".into());
        }
        Err(e) => return Err(e.into()),
    };

    drop(progress);
    if let Some(printer) = printer {
        printer.await.ok();
    }

    print_report(&report, output);
    if let Some(path) = report_path {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        eprintln!("💾 Report saved to: {}", path.display());
    }

    Ok(())
}

fn cmd_parse(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let file = read_seed_file(input, delimiter_byte(delimiter)?)?;
    eprintln!("   Encoding: {}", file.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(file.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );

    let total = file.rows.len();
    let seeds: Vec<SeedRow> = file.rows.iter().filter_map(|row| parse_row(row).ok()).collect();

    if seeds.len() == total {
        eprintln!("✅ Parsed {} seed rows", total);
    } else {
        eprintln!("⚠️  {} valid, {} skipped", seeds.len(), total - seeds.len());
    }

    let json = serde_json::to_string_pretty(&seeds)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_preview(input: &Path, seed: u64, limit: usize, delimiter: Option<char>) -> CliResult {
    let config = IngestConfig {
        seed: Some(seed),
        delimiter: delimiter_byte(delimiter)?,
        ..Default::default()
    };
    let file = read_seed_file(input, config.delimiter)?;
    let prepared = prepare_seeds(file, &config, seed);
    eprintln!(
        "📄 {} seeds ({} skipped), previewing up to {} variants",
        prepared.seeds.len(),
        prepared.rows_skipped,
        limit
    );

    let generator = VariantGenerator::new(
        seed,
        config.min_variants,
        config.max_variants,
        config.price_ladder,
    );

    let variants: Vec<SeedRow> = prepared
        .seeds
        .iter()
        .flat_map(|s| generator.expand(s))
        .filter_map(|raw| parse_row(&raw).ok())
        .take(limit)
        .collect();

    println!("{}", serde_json::to_string_pretty(&variants)?);
    Ok(())
}

fn cmd_decrypt(ciphertext: &str) -> CliResult {
    let encryptor = AesGcmEncryptor::from_env()?;
    println!("{}", encryptor.decrypt(ciphertext)?);
    Ok(())
}

fn print_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::RowsRead { valid, skipped } => {
            eprintln!("   Rows: {} valid, {} skipped", valid, skipped)
        }
        ProgressEvent::BatchSubmitted { batch, seeds } => {
            eprintln!("   ▶ Batch {} submitted ({} seeds)", batch, seeds)
        }
        ProgressEvent::BatchCompleted { batch, products } => {
            eprintln!("   ✔ Batch {} done ({} products)", batch, products)
        }
        ProgressEvent::Flushed { records, total } => {
            eprintln!("   💾 Flushed {} records ({} total)", records, total)
        }
        ProgressEvent::Finished { ingested } => eprintln!("   Finished: {} records", ingested),
    }
}

fn print_report(report: &IngestReport, output: &Path) {
    eprintln!("✅ Ingested {} products into {}", report.records_ingested, output.display());
    eprintln!("   Run: {} (seed {})", report.run_id, report.seed);
    eprintln!(
        "   Rows: {} read, {} skipped, {} without content",
        report.rows_read, report.rows_skipped, report.seeds_without_content
    );
    eprintln!(
        "   Variants: {} generated, {} invalid, {} encryption failures",
        report.variants_generated, report.variants_skipped, report.encryption_failures
    );
    eprintln!(
        "   {} batches, {} flushes, {}ms",
        report.batches, report.flushes, report.elapsed_ms
    );
}

fn delimiter_byte(delimiter: Option<char>) -> Result<Option<u8>, Box<dyn std::error::Error>> {
    match delimiter {
        None => Ok(None),
        Some(c) if c.is_ascii() => Ok(Some(c as u8)),
        Some(c) => Err(format!("delimiter must be an ASCII character, got '{}'", c).into()),
    }
}

fn format_delimiter(d: u8) -> String {
    match d {
        b'\t' => "\\t".to_string(),
        d => (d as char).to_string(),
    }
}

fn write_output(content: &str, output: Option<&Path>) -> Result<(), std::io::Error> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("💾 Saved to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
