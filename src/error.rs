//! Error types for the edgequake-report library.
//!
//! Two tiers of failure mirror the two outcomes of report assembly:
//!
//! * [`ReportError`]: **Fatal**: no document can be produced at all (the
//!   page geometry leaves no room for content, or the finished buffer could
//!   not be written). Returned as `Err(ReportError)` from the `assemble*`
//!   entry points.
//!
//! * [`RenderFailure`]: **Non-fatal**: a single diagram or image could not
//!   be resolved. It never escapes the section it belongs to; its message is
//!   rendered into the document as an error note, followed by the raw source
//!   where one exists.
//!
//! [`RasterizeError`] is the narrow error surface of the
//! [`crate::pipeline::diagram::Rasterizer`] seam, and [`GridError`] guards the
//! table invariants.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the edgequake-report library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Geometry ─────────────────────────────────────────────────────────
    /// Margins consume the whole page (or a dimension is not a finite number).
    #[error(
        "Invalid page geometry {width}x{height}pt with {margin}pt margins: \
         content frame would be {frame_width}x{frame_height}pt"
    )]
    InvalidGeometry {
        width: f64,
        height: f64,
        margin: f64,
        frame_width: f64,
        frame_height: f64,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The serialized document could not be written to the caller's sink.
    #[error("Failed to write PDF buffer: {0}")]
    BufferWriteFailed(#[source] std::io::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure while turning diagram source or image bytes into an
/// embeddable image.
///
/// The `Display` output is the exact text of the error note placed in the
/// document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderFailure {
    /// Nothing left to render once the keyword line and fences are removed.
    #[error("skipped: empty diagram source")]
    EmptySource,

    /// The rasterizer did not answer within the configured timeout.
    #[error("Could not generate {context} image: rendering timed out after {after:?}")]
    Timeout { context: String, after: Duration },

    /// The rasterizer answered with a non-2xx status.
    #[error("Could not generate {context} image: HTTP status {status}")]
    HttpStatus { context: String, status: u16 },

    /// The request never produced a response.
    #[error("Could not generate {context} image: {detail}")]
    Transport { context: String, detail: String },

    /// The response body is not a readable PNG/JPEG container.
    #[error("Could not read {context} image: {detail}")]
    ImageHeader { context: String, detail: String },

    /// The image has dimensions the fitter rejects (zero width or height).
    #[error("Could not fit {context} image of {width}x{height}px into the page")]
    Unfittable {
        context: String,
        width: u32,
        height: u32,
    },
}

/// Errors surfaced by a [`crate::pipeline::diagram::Rasterizer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterizeError {
    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// The service responded with a non-success status code.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Connection, TLS or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Violations of the [`crate::model::Grid`] shape invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// A grid must have at least one column.
    #[error("a table needs at least one column")]
    NoColumns,

    /// A data row does not have exactly one cell per header column.
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}
