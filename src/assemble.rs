//! Report assembly: logical items in, one paginated PDF out.
//!
//! [`DocumentAssembler`] owns the block sequence for one document and moves
//! through three states:
//!
//! ```text
//!  new()            push_item() × N            finalize()
//! Initialized ──▶ Building ──────────────▶ Finalized
//!  validate         SectionBuilder per item     layout + footers + PDF
//!  geometry,        in input order
//!  capture clock
//! ```
//!
//! Finalizing consumes the assembler, so items cannot be pushed into a
//! finished document. The free functions ([`assemble`], [`assemble_sync`],
//! [`assemble_to_file`], [`assemble_to_writer`]) wrap the whole cycle.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::model::{Block, BlockKind, DocumentContext, LogicalItem, PageGeometry};
use crate::output::{AssembledDocument, AssemblyStats, PageFooter};
use crate::pipeline::diagram::DiagramResolver;
use crate::pipeline::layout::{layout, stamp_footer};
use crate::pipeline::pdf::{write_pdf, PdfMetadata};
use crate::pipeline::section::SectionBuilder;
use crate::progress::ProgressCallback;
use chrono::Utc;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CREATOR: &str = concat!("edgequake-report ", env!("CARGO_PKG_VERSION"));

/// Stateful builder for one document.
pub struct DocumentAssembler {
    ctx: DocumentContext,
    resolver: DiagramResolver,
    render_timeout: Duration,
    title: String,
    author: Option<String>,
    progress: Option<ProgressCallback>,
    blocks: Vec<Block>,
    items: usize,
    degraded_items: usize,
    started: Instant,
}

impl std::fmt::Debug for DocumentAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAssembler")
            .field("ctx", &self.ctx)
            .field("render_timeout", &self.render_timeout)
            .field("title", &self.title)
            .field("blocks", &self.blocks.len())
            .field("items", &self.items)
            .field("degraded_items", &self.degraded_items)
            .finish()
    }
}

impl DocumentAssembler {
    /// Validate `geometry` and capture the generation timestamp.
    ///
    /// # Errors
    /// [`ReportError::InvalidGeometry`] when the margins leave no content
    /// frame. Nothing else can fail before finalization.
    pub fn new(geometry: PageGeometry, config: &ReportConfig) -> Result<Self, ReportError> {
        let generated_at = config.generated_at.unwrap_or_else(Utc::now);
        let ctx = DocumentContext::new(geometry, generated_at, config.diagram_options())?;
        let resolver = DiagramResolver::new(config.resolve_rasterizer(), config.diagram_options());
        debug!(
            "Assembler initialized: {:.1}x{:.1}pt page, generated at {}",
            geometry.width,
            geometry.height,
            ctx.generated_at_label()
        );
        Ok(Self {
            ctx,
            resolver,
            render_timeout: config.render_timeout(),
            title: config.title.clone(),
            author: config.author.clone(),
            progress: config.progress_callback.clone(),
            blocks: Vec::new(),
            items: 0,
            degraded_items: 0,
            started: Instant::now(),
        })
    }

    pub fn context(&self) -> &DocumentContext {
        &self.ctx
    }

    /// Blocks produced so far.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Turn one item into blocks and append them. Returns how many blocks
    /// were added; any failure inside the item is already absorbed into
    /// error notes.
    pub async fn push_item(&mut self, item: LogicalItem) -> usize {
        let index = self.items;
        let label = item.label();
        self.items += 1;

        if let Some(ref cb) = self.progress {
            cb.on_item_start(index, label);
        }

        let built = SectionBuilder::new(&self.ctx, &self.resolver, self.render_timeout)
            .build(item)
            .await;

        let note = built.iter().find_map(|b| match b {
            Block::ErrorNote { message } => Some(message.as_str()),
            _ => None,
        });
        if let Some(message) = note {
            self.degraded_items += 1;
            warn!("Item {} ({}) degraded: {}", index + 1, label, message);
            if let Some(ref cb) = self.progress {
                cb.on_item_degraded(index, label, message);
            }
        }

        let count = built.len();
        debug!("Item {} ({}) produced {} block(s)", index + 1, label, count);
        self.blocks.extend(built);

        if let Some(ref cb) = self.progress {
            cb.on_item_complete(index, label, count);
        }
        count
    }

    /// Paginate, stamp footers and serialize the PDF.
    pub fn finalize(self) -> Result<AssembledDocument, ReportError> {
        let geometry = *self.ctx.geometry();
        let generated_at = self.ctx.generated_at_label();

        // ── Step 1: Paginate ─────────────────────────────────────────────
        let mut pages = layout(&self.blocks, &geometry);
        if pages.is_empty() {
            return Err(ReportError::Internal("layout produced no pages".into()));
        }

        // ── Step 2: Footers ──────────────────────────────────────────────
        let mut footers = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter_mut().enumerate() {
            let page_number = i + 1;
            stamp_footer(page, page_number, &generated_at, &geometry);
            footers.push(PageFooter {
                page_number,
                generated_at: generated_at.clone(),
            });
        }

        // ── Step 3: Serialize ────────────────────────────────────────────
        let meta = PdfMetadata {
            title: &self.title,
            author: self.author.as_deref(),
            creator: CREATOR,
            created: self.ctx.generated_at(),
        };
        let pdf = write_pdf(&pages, &self.blocks, &geometry, &meta);

        // ── Step 4: Stats ────────────────────────────────────────────────
        let count = |kind: BlockKind| self.blocks.iter().filter(|b| b.kind() == kind).count();
        let stats = AssemblyStats {
            items: self.items,
            blocks: self.blocks.len(),
            pages: pages.len(),
            degraded_items: self.degraded_items,
            images: count(BlockKind::Image),
            tables: count(BlockKind::Table),
            pdf_bytes: pdf.len(),
            duration_ms: self.started.elapsed().as_millis() as u64,
        };

        if let Some(ref cb) = self.progress {
            cb.on_assembly_complete(stats.pages, stats.degraded_items);
        }

        info!(
            "Assembly complete: {} items, {} blocks, {} pages ({} degraded), {} bytes in {}ms",
            stats.items,
            stats.blocks,
            stats.pages,
            stats.degraded_items,
            stats.pdf_bytes,
            stats.duration_ms
        );

        Ok(AssembledDocument {
            pdf,
            blocks: self.blocks,
            footers,
            stats,
        })
    }
}

/// Assemble `items` into a PDF report.
///
/// Items are processed strictly in order; a diagram that cannot be rendered
/// or a table that does not parse degrades in place and never aborts the
/// document.
///
/// # Errors
/// Returns `Err(ReportError)` only for fatal errors: invalid geometry.
pub async fn assemble(
    geometry: PageGeometry,
    items: impl IntoIterator<Item = LogicalItem>,
    config: &ReportConfig,
) -> Result<AssembledDocument, ReportError> {
    let items: Vec<LogicalItem> = items.into_iter().collect();
    info!("Starting assembly: {} items", items.len());

    let mut assembler = DocumentAssembler::new(geometry, config)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_assembly_start(items.len());
    }

    for item in items {
        assembler.push_item(item).await;
    }

    assembler.finalize()
}

/// Assemble and write the PDF to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn assemble_to_file(
    geometry: PageGeometry,
    items: impl IntoIterator<Item = LogicalItem>,
    output_path: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<AssembledDocument, ReportError> {
    let doc = assemble(geometry, items, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ReportError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &doc.pdf)
        .await
        .map_err(|e| ReportError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ReportError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Wrote {} ({} bytes)", path.display(), doc.pdf.len());
    Ok(doc)
}

/// Assemble and write the PDF buffer to any [`Write`] sink.
pub async fn assemble_to_writer<W: Write>(
    geometry: PageGeometry,
    items: impl IntoIterator<Item = LogicalItem>,
    writer: &mut W,
    config: &ReportConfig,
) -> Result<AssembledDocument, ReportError> {
    let doc = assemble(geometry, items, config).await?;
    writer
        .write_all(&doc.pdf)
        .and_then(|()| writer.flush())
        .map_err(ReportError::BufferWriteFailed)?;
    Ok(doc)
}

/// Synchronous wrapper around [`assemble`].
///
/// Creates its own tokio runtime; do not call from inside an async context.
pub fn assemble_sync(
    geometry: PageGeometry,
    items: impl IntoIterator<Item = LogicalItem>,
    config: &ReportConfig,
) -> Result<AssembledDocument, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(assemble(geometry, items, config))
}
