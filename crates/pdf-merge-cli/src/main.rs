//! PDF Merge CLI - merge PDFs locally or through a merge server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_merge_core::{
    AppConfig, DownloadSink, FileDownload, FileSet, FormEntry, HttpTransport, MERGED_FILENAME,
    MergedDocument, PdfDocument, SelectedFile, UploadClient, UploadedFile,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "pdf-merge")]
#[command(author, version, about = "Merge PDF documents", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge PDFs on this machine
    Merge {
        /// Input PDF files, in page order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output PDF file
        #[arg(short, long, default_value = MERGED_FILENAME)]
        output: PathBuf,
    },

    /// Send PDFs to a merge server and save the result
    Upload {
        /// Input PDF files, in page order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Merge server base URL (overrides config)
        #[arg(long, env = "PDF_MERGE_SERVER")]
        server: Option<String>,

        /// Output PDF file (default: ./merged.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Log level used when `RUST_LOG` is unset.
const fn default_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Explicit file plus environment overrides, or the default locations.
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_sources(Some(path))
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(AppConfig::load()),
    }
}

async fn read_inputs(inputs: &[PathBuf]) -> Result<Vec<SelectedFile>> {
    let mut files = Vec::with_capacity(inputs.len());
    for path in inputs {
        let file = SelectedFile::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(file);
    }
    Ok(files)
}

async fn merge_local(config: &AppConfig, inputs: &[PathBuf], output: PathBuf) -> Result<()> {
    let entries = read_inputs(inputs)
        .await?
        .into_iter()
        .map(|f| FormEntry::File(UploadedFile::new(Some(f.name), f.content_type, f.bytes)))
        .collect();

    let set = FileSet::from_entries(entries, &config.limits).context("Input rejected")?;
    info!("Merging {} files ({} bytes)", set.len(), set.total_bytes());

    let pb = progress_bar(set.len() as u64);
    let mut merged = MergedDocument::new();

    for (index, file) in set.files().iter().enumerate() {
        pb.set_message(file.display_name().to_string());

        let doc = PdfDocument::from_bytes(&file.bytes, index)
            .with_context(|| format!("Failed to read {}", file.display_name()))?;
        if doc.encryption_ignored() {
            pb.println(format!("{} (encryption ignored)", file.display_name()));
        }
        merged.append(doc)?;
        pb.inc(1);
    }

    let page_count = merged.page_count();
    let bytes = merged.save().context("Failed to write merged document")?;
    pb.finish_with_message("Merge complete");

    FileDownload::to_path(&output)
        .deliver(MERGED_FILENAME, &bytes)
        .await
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Merged {page_count} pages into {}", output.display());
    }

    Ok(())
}

async fn upload(
    mut config: AppConfig,
    inputs: &[PathBuf],
    server: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    if let Some(server) = server {
        config.client.server_url = server;
    }

    let transport = HttpTransport::new(&config.client)?.with_field_name(&config.limits.field_name);
    let sink = output.map_or_else(|| FileDownload::into_dir("."), FileDownload::to_path);
    let destination = sink.destination(MERGED_FILENAME);
    let client = UploadClient::new(transport, sink, &config.client);

    let files = read_inputs(inputs).await?;
    let selected = files.len();
    let kept = client.select(files)?;
    if kept < selected {
        warn!("Skipped {} non-PDF inputs", selected - kept);
    }

    #[allow(clippy::print_stdout)]
    {
        println!("{}", client.summary());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Merging via {}", config.client.server_url));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = client.merge().await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            #[allow(clippy::print_stdout)]
            {
                println!(
                    "Merged {} files ({} bytes) into {}",
                    outcome.files,
                    outcome.bytes,
                    destination.display()
                );
            }
            Ok(())
        }
        Err(e) => {
            let message = client.last_error().unwrap_or_else(|| e.to_string());
            anyhow::bail!("Merge failed: {message}")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},lopdf=warn", default_level(args.verbose)))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Merge { inputs, output } => merge_local(&config, &inputs, output).await,
        Command::Upload {
            inputs,
            server,
            output,
        } => upload(config, &inputs, server, output).await,
    }
}
