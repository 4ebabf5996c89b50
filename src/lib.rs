//! # edgequake-report
//!
//! Assemble AI-generated prose, pipe tables and Mermaid diagrams into a
//! paginated PDF report.
//!
//! ## Why this crate?
//!
//! Language-model output is almost structured. Tables arrive with ragged
//! rows, diagram code arrives wrapped in fences, and the diagram renderer is
//! a remote service that may be slow or down. This crate turns each piece
//! into styled blocks, degrades anything that fails into a visible note
//! instead of aborting, and lays the result out on fixed-margin pages with a
//! timestamped footer.
//!
//! ## Pipeline Overview
//!
//! ```text
//! [LogicalItem]
//!  │
//!  ├─ 1. Init     validate page geometry, capture the timestamp once
//!  ├─ 2. Build    per item, in order: text │ table │ diagram │ image
//!  │              (diagram: clean source → rasterize w/ timeout → fit)
//!  ├─ 3. Layout   wrap, break pages, repeat table headers
//!  ├─ 4. Footer   "Report Generated: …" / "Page N" on every page
//!  └─ 5. Output   PDF bytes + blocks + per-page footers + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_report::{assemble, LogicalItem, ReportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReportConfig::default();
//!     let items = vec![
//!         LogicalItem::heading(1, "Incident summary"),
//!         LogicalItem::SummaryText("Phishing wave targeting finance.".into()),
//!         LogicalItem::TabularText("| IOC | Type |\n|---|---|\n| 1.2.3.4 | ip |".into()),
//!         LogicalItem::diagram("graph TD; Email-->Macro-->Beacon"),
//!     ];
//!     let doc = assemble(config.geometry(), items, &config).await?;
//!     std::fs::write("report.pdf", &doc.pdf)?;
//!     eprintln!("{} pages, {} degraded items", doc.stats.pages, doc.stats.degraded_items);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `report2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-report = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;

#[cfg(test)]
mod testutil;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{assemble, assemble_sync, assemble_to_file, assemble_to_writer, DocumentAssembler};
pub use config::{ReportConfig, ReportConfigBuilder};
pub use error::{GridError, RasterizeError, RenderFailure, ReportError};
pub use model::{
    Block, BlockKind, DocumentContext, Grid, ImageBlock, LogicalItem, Orientation, PageGeometry,
    PageSize, ParagraphStyle, RenderRequest,
};
pub use output::{AssembledDocument, AssemblyStats, PageFooter};
pub use pipeline::diagram::{DiagramResolver, MermaidInkRasterizer, RasterImage, Rasterizer};
pub use pipeline::fit::{fit_image, FittedSize};
pub use pipeline::mermaid::{DiagramOptions, DiagramTheme};
pub use pipeline::section::SectionBuilder;
pub use pipeline::table::parse_table;
pub use progress::{AssemblyProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::ThreatReport;
