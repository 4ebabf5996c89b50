//! CLI binary for edgequake-report.
//!
//! A thin shim over the library crate that reads a JSON manifest, maps CLI
//! flags to `ReportConfig` and writes the PDF.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_report::{
    assemble_to_file, assemble_to_writer, AssemblyProgressCallback, DiagramTheme, LogicalItem,
    Orientation, PageSize, ParagraphStyle, ProgressCallback, ReportConfig, ThreatReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the items, plus a log line for
/// every item that degraded to an error note.
struct CliProgressCallback {
    bar: ProgressBar,
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} items  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Assembling");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            degraded: AtomicUsize::new(0),
        })
    }
}

impl AssemblyProgressCallback for CliProgressCallback {
    fn on_assembly_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
        self.bar.reset_eta();
    }

    fn on_item_start(&self, _index: usize, label: &str) {
        self.bar.set_message(label.to_string());
    }

    fn on_item_complete(&self, _index: usize, _label: &str, _block_count: usize) {
        self.bar.inc(1);
    }

    fn on_item_degraded(&self, index: usize, label: &str, reason: &str) {
        self.degraded.fetch_add(1, Ordering::SeqCst);
        let msg = if reason.chars().count() > 80 {
            let cut: String = reason.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Item {:>3} {:<10} {}",
            red("✗"),
            index + 1,
            dim(label),
            red(&msg),
        ));
    }

    fn on_assembly_complete(&self, page_count: usize, degraded_items: usize) {
        self.bar.finish_and_clear();
        if degraded_items == 0 {
            eprintln!("{} {} pages assembled", green("✔"), bold(&page_count.to_string()));
        } else {
            eprintln!(
                "{} {} pages assembled  ({} items degraded)",
                cyan("⚠"),
                bold(&page_count.to_string()),
                red(&degraded_items.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r###"EXAMPLES:
  # Threat report manifest to PDF
  report2pdf analysis.json -o report.pdf

  # Landscape US Letter with a dark diagram theme
  report2pdf --orientation landscape --page-size letter --theme dark analysis.json -o report.pdf

  # Attach a screenshot of the source page
  report2pdf --screenshot page.png analysis.json -o report.pdf

  # Self-hosted renderer, short timeout, stats as JSON
  report2pdf --render-endpoint http://localhost:3000/img --render-timeout 5 \
             --json items.json -o out.pdf

MANIFEST FORMATS:
  A threat report object:
    {"source_url": "...", "summary": "...", "mindmap": "mindmap ...",
     "iocs": "| Type | Value |...", "ttps_overview": "...", "attack_path": "...",
     "ttp_timeline": "timeline ...", "five_whats": "..."}

  Or an array of items, rendered in order:
    [{"kind": "heading", "level": 1, "text": "Title"},
     {"kind": "summary", "text": "..."},
     {"kind": "table", "text": "| A | B |\n|---|---|\n| 1 | 2 |"},
     {"kind": "diagram", "source": "graph TD; A-->B", "context": "Flow"},
     {"kind": "list", "text": "1. T1566: Phishing"},
     {"kind": "key_value", "text": "## What?\nAnswer"},
     {"kind": "text", "text": "...", "style": "strong"},
     {"kind": "image", "path": "shot.png"}]

ENVIRONMENT VARIABLES:
  REPORT2PDF_RENDER_ENDPOINT  Diagram renderer base URL (default https://mermaid.ink/img)
  REPORT2PDF_RENDER_TIMEOUT   Per-diagram timeout in seconds (1-120)
  RUST_LOG                    Override log filter
"###;

/// Assemble AI-generated prose, tables and Mermaid diagrams into a PDF report.
#[derive(Parser, Debug)]
#[command(
    name = "report2pdf",
    version,
    about = "Assemble AI-generated prose, tables and Mermaid diagrams into a PDF report",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON manifest: a threat report object or an array of items.
    input: PathBuf,

    /// Write the PDF to this file instead of stdout.
    #[arg(short, long, env = "REPORT2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Page orientation.
    #[arg(long, env = "REPORT2PDF_ORIENTATION", value_enum, default_value = "portrait")]
    orientation: OrientationArg,

    /// Paper size.
    #[arg(long, env = "REPORT2PDF_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Base URL of the Mermaid rendering service.
    #[arg(long, env = "REPORT2PDF_RENDER_ENDPOINT")]
    render_endpoint: Option<String>,

    /// Per-diagram rendering timeout in seconds (1–120).
    #[arg(long, env = "REPORT2PDF_RENDER_TIMEOUT", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..=120))]
    render_timeout: u64,

    /// Mermaid theme: default, neutral, dark, forest, base.
    #[arg(long, env = "REPORT2PDF_THEME")]
    theme: Option<DiagramTheme>,

    /// Flatten nested parentheses in diagram nodes before rendering.
    #[arg(long, env = "REPORT2PDF_FLATTEN_PARENS")]
    flatten_parens: bool,

    /// Document title (PDF metadata).
    #[arg(long, env = "REPORT2PDF_TITLE")]
    title: Option<String>,

    /// Document author (PDF metadata).
    #[arg(long, env = "REPORT2PDF_AUTHOR")]
    author: Option<String>,

    /// PNG/JPEG screenshot of the source page (threat report manifests only).
    #[arg(long, env = "REPORT2PDF_SCREENSHOT")]
    screenshot: Option<PathBuf>,

    /// Add a Mermaid live-editor link under each rendered diagram.
    #[arg(long, env = "REPORT2PDF_EDITOR_LINKS")]
    editor_links: bool,

    /// Print assembly stats and page footers as JSON on stdout (needs --output).
    #[arg(long, env = "REPORT2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "REPORT2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "REPORT2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "REPORT2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(v: OrientationArg) -> Self {
        match v {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

// ── Manifest ─────────────────────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Manifest {
    Items(Vec<ManifestItem>),
    Report(ThreatReport),
}

#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ManifestItem {
    Summary {
        text: String,
    },
    Table {
        text: String,
    },
    Diagram {
        source: String,
        #[serde(default)]
        context: Option<String>,
    },
    List {
        text: String,
    },
    KeyValue {
        text: String,
    },
    Heading {
        #[serde(default = "default_heading_level")]
        level: u8,
        text: String,
    },
    Text {
        text: String,
        #[serde(default)]
        style: ParagraphStyle,
    },
    Image {
        path: PathBuf,
        #[serde(default)]
        context: Option<String>,
    },
}

fn default_heading_level() -> u8 {
    2
}

async fn read_image(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {:?}", path))
}

/// Resolve a manifest into assembler items, reading any referenced images.
async fn load_items(manifest: Manifest, screenshot: Option<&Path>) -> Result<Vec<LogicalItem>> {
    match manifest {
        Manifest::Report(mut report) => {
            if let Some(path) = screenshot {
                report = report.with_screenshot(read_image(path).await?);
            }
            Ok(report.to_items())
        }
        Manifest::Items(entries) => {
            if screenshot.is_some() {
                anyhow::bail!(
                    "--screenshot only applies to threat report manifests; \
                     add an {{\"kind\": \"image\"}} item instead"
                );
            }
            let mut items = Vec::with_capacity(entries.len());
            for entry in entries {
                items.push(match entry {
                    ManifestItem::Summary { text } => LogicalItem::SummaryText(text),
                    ManifestItem::Table { text } => LogicalItem::TabularText(text),
                    ManifestItem::Diagram { source, context } => match context {
                        Some(ctx) => LogicalItem::diagram_with_context(source, ctx),
                        None => LogicalItem::diagram(source),
                    },
                    ManifestItem::List { text } => LogicalItem::OrderedListText(text),
                    ManifestItem::KeyValue { text } => LogicalItem::KeyValueText(text),
                    ManifestItem::Heading { level, text } => LogicalItem::heading(level, text),
                    ManifestItem::Text { text, style } => LogicalItem::styled(text, style),
                    ManifestItem::Image { path, context } => LogicalItem::RasterImage {
                        bytes: read_image(&path).await?,
                        context: context.unwrap_or_else(|| "Image".to_string()),
                    },
                });
            }
            Ok(items)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.json && cli.output.is_none() {
        anyhow::bail!("--json prints stats on stdout; pass --output for the PDF");
    }

    // ── Load manifest ────────────────────────────────────────────────────
    let raw = tokio::fs::read_to_string(&cli.input)
        .await
        .with_context(|| format!("Failed to read manifest {:?}", cli.input))?;
    let manifest: Manifest = serde_json::from_str(&raw)
        .with_context(|| format!("{:?} is neither an item array nor a threat report", cli.input))?;
    let items = load_items(manifest, cli.screenshot.as_deref()).await?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AssemblyProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let geometry = config.geometry();

    // ── Run assembly ─────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let doc = assemble_to_file(geometry, items, output_path, &config)
            .await
            .context("Assembly failed")?;

        if cli.json {
            let json = serde_json::json!({
                "output": output_path,
                "stats": doc.stats,
                "footers": doc.footers,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).context("Failed to serialise stats")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} items  {} pages  {}ms  →  {}",
                if doc.stats.degraded_items == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                doc.stats.items,
                doc.stats.pages,
                doc.stats.duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let doc = assemble_to_writer(geometry, items, &mut handle, &config)
            .await
            .context("Assembly failed")?;
        handle.flush().context("Failed to write to stdout")?;

        if !cli.quiet && !show_progress {
            eprintln!(
                "Assembled {} items into {} pages in {}ms",
                doc.stats.items, doc.stats.pages, doc.stats.duration_ms
            );
            if doc.stats.degraded_items > 0 {
                eprintln!("  {} items degraded", doc.stats.degraded_items);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ReportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder()
        .orientation(cli.orientation.into())
        .page_size(cli.page_size.into())
        .render_timeout_secs(cli.render_timeout)
        .flatten_nested_parentheses(cli.flatten_parens)
        .include_editor_links(cli.editor_links);

    if let Some(ref endpoint) = cli.render_endpoint {
        builder = builder.render_endpoint(endpoint.clone());
    }
    if let Some(theme) = cli.theme {
        builder = builder.diagram_theme(theme);
    }
    if let Some(ref title) = cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(ref author) = cli.author {
        builder = builder.author(author.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
