//! Document model: page geometry, logical input items, and the typed blocks
//! the section builder produces.
//!
//! Blocks are plain immutable values. The only sequence of blocks that ever
//! grows is the one owned by [`crate::assemble::DocumentAssembler`].

use crate::error::{GridError, ReportError};
use crate::pipeline::mermaid::DiagramOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed page margin: 0.75 inch on every side.
pub const MARGIN_PT: f64 = 54.0;

/// Footer timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

// ── Page geometry ────────────────────────────────────────────────────────

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(ReportError::InvalidConfig(format!(
                "orientation must be 'portrait' or 'landscape', got '{other}'"
            ))),
        }
    }
}

/// Target paper standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Portrait `(width, height)` in points.
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.2756, 841.8898),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

impl FromStr for PageSize {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            other => Err(ReportError::InvalidConfig(format!(
                "page size must be 'a4' or 'letter', got '{other}'"
            ))),
        }
    }
}

/// Physical page layout shared by every page of one document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Page width in points, orientation already applied.
    pub width: f64,
    /// Page height in points, orientation already applied.
    pub height: f64,
    /// Uniform margin on all four sides.
    pub margin: f64,
    pub orientation: Orientation,
}

impl PageGeometry {
    /// Standard paper with the fixed 0.75 in margin.
    pub fn standard(size: PageSize, orientation: Orientation) -> Self {
        let (w, h) = size.dimensions();
        let (width, height) = match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        };
        Self {
            width,
            height,
            margin: MARGIN_PT,
            orientation,
        }
    }

    /// A4 portrait, the default report page.
    pub fn a4() -> Self {
        Self::standard(PageSize::A4, Orientation::Portrait)
    }

    /// The area left for content once margins are removed.
    pub fn content_frame(&self) -> (f64, f64) {
        (
            self.width - 2.0 * self.margin,
            self.height - 2.0 * self.margin,
        )
    }

    /// Reject geometry whose content frame is not strictly positive.
    pub fn validate(&self) -> Result<(), ReportError> {
        let (fw, fh) = self.content_frame();
        let finite = [self.width, self.height, self.margin, fw, fh]
            .iter()
            .all(|v| v.is_finite());
        if !finite || fw <= 0.0 || fh <= 0.0 || self.margin < 0.0 {
            return Err(ReportError::InvalidGeometry {
                width: self.width,
                height: self.height,
                margin: self.margin,
                frame_width: fw,
                frame_height: fh,
            });
        }
        Ok(())
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

// ── Document context ─────────────────────────────────────────────────────

/// Per-document state captured once when assembly starts and shared
/// read-only with every block-building call.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    geometry: PageGeometry,
    generated_at: DateTime<Utc>,
    diagram: DiagramOptions,
}

impl DocumentContext {
    /// Validate the geometry and freeze the timestamp.
    pub fn new(
        geometry: PageGeometry,
        generated_at: DateTime<Utc>,
        diagram: DiagramOptions,
    ) -> Result<Self, ReportError> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            generated_at,
            diagram,
        })
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn content_frame(&self) -> (f64, f64) {
        self.geometry.content_frame()
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// The footer rendering of [`Self::generated_at`].
    pub fn generated_at_label(&self) -> String {
        self.generated_at.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn diagram_options(&self) -> &DiagramOptions {
        &self.diagram
    }
}

// ── Logical input items ──────────────────────────────────────────────────

/// Paragraph style identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphStyle {
    #[default]
    Body,
    /// Italic body text used for AI-generated summaries.
    Emphasis,
    /// Muted introduction line under the title.
    Intro,
    /// Small blue text for URLs.
    Link,
    /// Bold body text.
    Strong,
    /// Indented list entry.
    ListItem,
    /// Monospace, shaded; used to show raw diagram source.
    Code,
}

/// One category of raw content handed over by an upstream collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalItem {
    /// Free prose, rendered as one emphasized paragraph.
    SummaryText(String),
    /// Pipe-delimited table text, degraded to lines when it does not parse.
    TabularText(String),
    /// Mermaid source to be rasterized; `context` labels diagnostics.
    DiagramSource { source: String, context: String },
    /// One entry per line, optionally `label: detail`.
    OrderedListText(String),
    /// Q&A style content: a table or heading/paragraph pairs.
    KeyValueText(String),
    /// A section heading.
    Heading { level: u8, text: String },
    /// A single paragraph in an explicit style.
    Styled { text: String, style: ParagraphStyle },
    /// Image bytes fetched upstream, e.g. a website screenshot.
    RasterImage { bytes: Vec<u8>, context: String },
}

impl LogicalItem {
    /// Diagram item with the generic `Diagram` context label.
    pub fn diagram(source: impl Into<String>) -> Self {
        Self::diagram_with_context(source, "Diagram")
    }

    pub fn diagram_with_context(source: impl Into<String>, context: impl Into<String>) -> Self {
        LogicalItem::DiagramSource {
            source: source.into(),
            context: context.into(),
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        LogicalItem::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn styled(text: impl Into<String>, style: ParagraphStyle) -> Self {
        LogicalItem::Styled {
            text: text.into(),
            style,
        }
    }

    /// Short name used in logs and progress events.
    pub fn label(&self) -> &'static str {
        match self {
            LogicalItem::SummaryText(_) => "summary",
            LogicalItem::TabularText(_) => "table",
            LogicalItem::DiagramSource { .. } => "diagram",
            LogicalItem::OrderedListText(_) => "list",
            LogicalItem::KeyValueText(_) => "key-value",
            LogicalItem::Heading { .. } => "heading",
            LogicalItem::Styled { .. } => "text",
            LogicalItem::RasterImage { .. } => "image",
        }
    }
}

/// A diagram waiting to be rasterized. Consumed by exactly one resolve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub source_text: String,
    pub context: String,
}

impl RenderRequest {
    pub fn new(source_text: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            context: context.into(),
        }
    }
}

// ── Grid ─────────────────────────────────────────────────────────────────

/// A normalized table: one header row and zero or more rows of equal width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Grid {
    /// Header-only grid. Fails when `header` is empty.
    pub fn new(header: Vec<String>) -> Result<Self, GridError> {
        if header.is_empty() {
            return Err(GridError::NoColumns);
        }
        Ok(Self {
            header,
            rows: Vec::new(),
        })
    }

    /// Grid with data rows; every row must match the header width.
    pub fn with_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, GridError> {
        let mut grid = Self::new(header)?;
        for row in rows {
            grid.push_row(row)?;
        }
        Ok(grid)
    }

    pub(crate) fn push_row(&mut self, row: Vec<String>) -> Result<(), GridError> {
        if row.len() != self.header.len() {
            return Err(GridError::RowWidth {
                row: self.rows.len() + 1,
                expected: self.header.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Serialize back to pipe syntax with a `---` separator row.
    pub fn to_pipe_text(&self) -> String {
        let line = |cells: &[String]| format!("| {} |", cells.join(" | "));
        let separator = format!("|{}", "---|".repeat(self.header.len()));
        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(line(&self.header));
        out.push(separator);
        out.extend(self.rows.iter().map(|r| line(r)));
        out.join("\n")
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pipe_text())
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────

/// A raster image with its intrinsic pixel size and its fitted display size
/// in points.
#[derive(Clone, PartialEq)]
pub struct ImageBlock {
    pub bytes: Vec<u8>,
    pub intrinsic_width: u32,
    pub intrinsic_height: u32,
    pub width: f64,
    pub height: f64,
}

impl fmt::Debug for ImageBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlock")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("intrinsic_width", &self.intrinsic_width)
            .field("intrinsic_height", &self.intrinsic_height)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// One styled unit of document content.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph { text: String, style: ParagraphStyle },
    Table(Grid),
    Image(ImageBlock),
    ErrorNote { message: String },
}

/// Payload-free discriminant of a [`Block`], convenient for summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    Paragraph,
    Table,
    Image,
    ErrorNote,
}

impl Block {
    pub fn paragraph(text: impl Into<String>, style: ParagraphStyle) -> Self {
        Block::Paragraph {
            text: text.into(),
            style,
        }
    }

    pub fn error_note(message: impl Into<String>) -> Self {
        Block::ErrorNote {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Heading { .. } => BlockKind::Heading,
            Block::Paragraph { .. } => BlockKind::Paragraph,
            Block::Table(_) => BlockKind::Table,
            Block::Image(_) => BlockKind::Image,
            Block::ErrorNote { .. } => BlockKind::ErrorNote,
        }
    }
}
