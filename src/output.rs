//! Output types returned by the assembly entry points.

use crate::model::Block;
use serde::Serialize;

/// The result of one report assembly.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    /// The complete PDF file.
    pub pdf: Vec<u8>,

    /// The blocks that were laid out, in document order.
    pub blocks: Vec<Block>,

    /// One footer per rendered page, in page order.
    pub footers: Vec<PageFooter>,

    pub stats: AssemblyStats,
}

impl AssembledDocument {
    pub fn page_count(&self) -> usize {
        self.footers.len()
    }
}

/// The footer stamped on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFooter {
    /// 1-based.
    pub page_number: usize,
    /// Formatted timestamp; identical on every page of a document.
    pub generated_at: String,
}

/// Counters collected during assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    /// Logical items pushed into the assembler.
    pub items: usize,
    /// Blocks produced from those items.
    pub blocks: usize,
    pub pages: usize,
    /// Items that produced at least one error note.
    pub degraded_items: usize,
    pub images: usize,
    pub tables: usize,
    /// Bytes in the serialized PDF.
    pub pdf_bytes: usize,
    /// Wall-clock time from first item to finished buffer.
    pub duration_ms: u64,
}
