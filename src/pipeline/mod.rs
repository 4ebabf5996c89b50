//! Pipeline stages for report assembly.
//!
//! Each submodule implements one transformation step and is testable on its
//! own. Only [`diagram`] performs network I/O.
//!
//! ## Data Flow
//!
//! ```text
//!                 ┌─▶ table ────────────────────────┐
//! LogicalItem ──▶ section ─▶ mermaid ─▶ diagram ─▶ fit ─┴─▶ Block
//!
//! [Block] ──▶ layout ──▶ pdf
//!            (fonts)    (pdf-writer)
//! ```
//!
//! 1. [`section`]: route one item to the right rule; absorbs every failure
//! 2. [`table`]: pipe-table text to a [`crate::model::Grid`]
//! 3. [`mermaid`]: diagram source cleanup, theme directive, editor links
//! 4. [`diagram`]: rasterize through the [`diagram::Rasterizer`] seam with a
//!    timeout, then read the image header
//! 5. [`fit`]: scale an image into the content frame
//! 6. [`layout`]: wrap text with [`fonts`] metrics and break pages
//! 7. [`pdf`]: serialize pages, fonts and images

pub mod diagram;
pub mod fit;
pub mod fonts;
pub mod layout;
pub mod mermaid;
pub mod pdf;
pub mod section;
pub mod table;
