//! CLI binary for ink2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, drives the streaming API with a progress bar, and
//! writes the assembled notebook.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use ink2md::pipeline::format;
use ink2md::{ConversionConfig, NotebookMetadata, PageInput, PageResult};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

#[derive(Parser, Debug)]
#[command(
    name = "ink2md",
    version,
    about = "Convert tablet ink note pages (.rm) to Markdown",
    after_help = "ENVIRONMENT:\n  ANTHROPIC_API_KEY / OPENAI_API_KEY   vision provider auto-detection\n  INK2MD_PROVIDER + INK2MD_MODEL       explicit provider/model pair\n  RUST_LOG                             log filter (e.g. ink2md=debug)"
)]
struct Cli {
    /// Page files (.rm) or a directory containing them; pages are ordered
    /// by file name.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Notebook title for the assembled document.
    #[arg(short, long)]
    title: Option<String>,

    /// Output markdown file (stdout when omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit per-page results as JSON instead of an assembled notebook.
    #[arg(long)]
    json: bool,

    /// Vision provider name (anthropic, openai, ollama, …).
    #[arg(long, env = "INK2MD_PROVIDER")]
    provider: Option<String>,

    /// Vision model identifier.
    #[arg(short, long, env = "INK2MD_MODEL")]
    model: Option<String>,

    /// Concurrent pages in flight.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Skip the illustration-caption round-trip for drawing content.
    #[arg(long)]
    no_captions: bool,

    /// Verbose logging (equivalent to RUST_LOG=ink2md=debug).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("ink2md=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ink2md=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let page_files = collect_page_files(&cli.inputs)?;
    if page_files.is_empty() {
        bail!("No .rm page files found in the given inputs");
    }

    let pages = read_pages(&page_files)?;
    let config = build_config(&cli, pages.len())?;

    let title = cli.title.clone().unwrap_or_else(|| default_title(&cli.inputs));
    let (results, failed) = convert_with_progress(pages, &config).await?;

    if results.is_empty() {
        bail!("All {} pages failed to convert", page_files.len());
    }

    if cli.json {
        let body = serde_json::json!({
            "pages": &results,
            "failedPages": &failed,
        });
        write_output(&cli.output, &serde_json::to_string_pretty(&body)?)?;
    } else {
        let metadata = NotebookMetadata {
            title,
            synced_at: Utc::now(),
            page_count: results.len(),
        };
        let texts: Vec<&str> = results.iter().map(|p| p.markdown.as_str()).collect();
        let markdown = format::assemble_notebook(&metadata, &texts);
        write_output(&cli.output, &markdown)?;
    }

    if !failed.is_empty() {
        eprintln!("{} {} page(s) failed: {}", red("✗"), failed.len(), failed.join(", "));
    }
    Ok(())
}

/// Expand the input list: directories contribute their .rm files, sorted by
/// file name so page order is stable.
fn collect_page_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Cannot read directory {}", input.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "rm"))
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn read_pages(files: &[PathBuf]) -> Result<Vec<PageInput>> {
    files
        .iter()
        .map(|path| {
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let data = std::fs::read(path)
                .with_context(|| format!("Cannot read page file {}", path.display()))?;
            Ok(PageInput::new(id, data))
        })
        .collect()
}

fn build_config(cli: &Cli, page_count: usize) -> Result<ConversionConfig> {
    // The batch page limit is a hosted-service concern; a local CLI run is
    // sized to whatever the user pointed it at.
    let mut builder = ConversionConfig::builder()
        .concurrency(cli.concurrency)
        .describe_illustrations(!cli.no_captions)
        .max_pages(page_count);
    if let Some(ref provider) = cli.provider {
        builder = builder.vision_provider(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    Ok(builder.build()?)
}

fn default_title(inputs: &[PathBuf]) -> String {
    inputs
        .first()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Notebook".to_string())
}

/// Drive the streaming API, rendering a progress bar as pages complete.
/// Results come back in input order regardless of completion order.
async fn convert_with_progress(
    pages: Vec<PageInput>,
    config: &ConversionConfig,
) -> Result<(Vec<PageResult>, Vec<String>)> {
    let order: HashMap<String, usize> = pages
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.clone(), i))
        .collect();
    let total = pages.len();

    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:40.green/238}] {pos}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(80));

    let mut stream = ink2md::convert_pages_stream(pages, config).await?;
    let mut results: Vec<PageResult> = Vec::with_capacity(total);
    let mut failed: Vec<String> = Vec::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(page) => {
                bar.println(format!(
                    "{} {} {}",
                    green("✓"),
                    page.id,
                    dim(&format!("({:.0}% confidence)", page.confidence * 100.0))
                ));
                results.push(page);
            }
            Err(e) => {
                bar.println(format!("{} {}", red("✗"), e));
                failed.push(e.page_id().to_string());
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    results.sort_by_key(|p| order.get(&p.id).copied().unwrap_or(usize::MAX));
    failed.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
    Ok((results, failed))
}

fn write_output(output: &Option<PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Cannot create {}", parent.display()))?;
                }
            }
            std::fs::write(path, content)
                .with_context(|| format!("Cannot write {}", path.display()))?;
            eprintln!("{} Wrote {}", green("✓"), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
        }
    }
    Ok(())
}
