//! Page-aware layout: blocks → positioned drawing operations per page.
//!
//! Content flows top to bottom through the content frame of each page. Before
//! anything is placed the cursor asks whether it fits in the space left; if
//! not, a new page is opened. Paragraphs and tables can split (between lines
//! and between rows respectively), images and single lines cannot.
//!
//! Coordinates are PDF user space: origin bottom-left, y grows upward.

use crate::model::{Block, Grid, ImageBlock, PageGeometry, ParagraphStyle};
use crate::pipeline::fonts::{text_width, wrap_text, Font};
use tracing::debug;

const EPS: f64 = 1e-6;

/// RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);

    /// Build from a `0xRRGGBB` literal.
    pub const fn hex(v: u32) -> Rgb {
        Rgb(
            ((v >> 16) & 0xff) as f32 / 255.0,
            ((v >> 8) & 0xff) as f32 / 255.0,
            (v & 0xff) as f32 / 255.0,
        )
    }
}

/// A single drawing instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// One line of text; `y` is the baseline.
    Text {
        x: f64,
        y: f64,
        font: Font,
        size: f64,
        color: Rgb,
        text: String,
    },
    /// A rectangle with its lower-left corner at `(x, y)`.
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Option<Rgb>,
        stroke: Option<(Rgb, f64)>,
    },
    /// The image of `blocks[block]`, lower-left corner at `(x, y)`.
    Image {
        block: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

/// Drawing operations of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaidOutPage {
    pub ops: Vec<DrawOp>,
}

impl LaidOutPage {
    /// All text drawn on the page, one entry per line.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn image_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Image { .. }))
            .count()
    }
}

// ── Styles ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    font: Font,
    size: f64,
    leading: f64,
    color: Rgb,
    indent: f64,
    space_before: f64,
    space_after: f64,
    align: Align,
    background: Option<Rgb>,
}

impl TextStyle {
    const fn new(font: Font, size: f64, leading: f64, color: Rgb) -> Self {
        Self {
            font,
            size,
            leading,
            color,
            indent: 0.0,
            space_before: 0.0,
            space_after: 7.2,
            align: Align::Left,
            background: None,
        }
    }
}

fn heading_style(level: u8) -> TextStyle {
    match level {
        0 | 1 => TextStyle {
            align: Align::Center,
            space_after: 14.4,
            ..TextStyle::new(Font::Bold, 20.0, 24.0, Rgb::hex(0x2c3e50))
        },
        2 => TextStyle {
            space_before: 14.4,
            ..TextStyle::new(Font::Bold, 16.0, 20.0, Rgb::hex(0x34495e))
        },
        _ => TextStyle {
            space_before: 10.8,
            space_after: 3.6,
            ..TextStyle::new(Font::Bold, 13.0, 16.0, Rgb::hex(0x34495e))
        },
    }
}

fn paragraph_style(style: ParagraphStyle) -> TextStyle {
    match style {
        ParagraphStyle::Body => TextStyle::new(Font::Regular, 10.0, 14.0, Rgb::hex(0x222222)),
        ParagraphStyle::Strong => TextStyle::new(Font::Bold, 10.0, 14.0, Rgb::hex(0x222222)),
        ParagraphStyle::Emphasis => TextStyle::new(Font::Oblique, 10.0, 14.0, Rgb::hex(0x4a4a4a)),
        ParagraphStyle::Intro => TextStyle::new(Font::Regular, 10.0, 14.0, Rgb::hex(0x555555)),
        ParagraphStyle::Link => TextStyle {
            space_after: 3.0,
            ..TextStyle::new(Font::Regular, 9.0, 12.0, Rgb(0.0, 0.0, 1.0))
        },
        ParagraphStyle::ListItem => TextStyle {
            indent: 18.0,
            space_after: 3.6,
            ..TextStyle::new(Font::Regular, 9.0, 12.0, Rgb::BLACK)
        },
        ParagraphStyle::Code => TextStyle {
            indent: 10.0,
            space_after: 0.0,
            background: Some(Rgb::hex(0xf4f4f4)),
            ..TextStyle::new(Font::Mono, 8.0, 10.0, Rgb::hex(0x333333))
        },
    }
}

fn error_style() -> TextStyle {
    TextStyle {
        space_after: 4.0,
        ..TextStyle::new(Font::Oblique, 9.0, 12.0, Rgb::hex(0xc0392b))
    }
}

const TABLE_PAD: f64 = 4.0;
const TABLE_HEADER: (Font, f64, f64) = (Font::Bold, 9.0, 11.0);
const TABLE_BODY: (Font, f64, f64) = (Font::Regular, 8.0, 10.0);
const TABLE_GRID: Rgb = Rgb(0.5, 0.5, 0.5);
const TABLE_HEADER_FILL: Rgb = Rgb::hex(0xd3d3d3);
const TABLE_SPACE_AFTER: f64 = 10.0;
const IMAGE_SPACE_AFTER: f64 = 8.0;

const FOOTER_SIZE: f64 = 9.0;
const FOOTER_COLOR: Rgb = Rgb::hex(0x555555);

// ── Cursor ───────────────────────────────────────────────────────────────

/// Vertical position inside the content frame of the current page.
#[derive(Debug, Clone, Copy)]
struct PageCursor {
    y: f64,
    top: f64,
    bottom: f64,
    left: f64,
    width: f64,
    /// Nothing has been placed on this page yet.
    fresh: bool,
}

impl PageCursor {
    fn new(geometry: &PageGeometry) -> Self {
        let (width, _) = geometry.content_frame();
        let top = geometry.height - geometry.margin;
        Self {
            y: top,
            top,
            bottom: geometry.margin,
            left: geometry.margin,
            width,
            fresh: true,
        }
    }

    fn remaining(&self) -> f64 {
        (self.y - self.bottom).max(0.0)
    }

    fn frame_height(&self) -> f64 {
        self.top - self.bottom
    }

    fn fits(&self, height: f64) -> bool {
        height <= self.remaining() + EPS
    }

    fn advance(&mut self, height: f64) {
        self.y -= height;
        self.fresh = false;
    }

    /// Vertical gap that is dropped at the top of a page and clamped at the
    /// bottom.
    fn gap(&mut self, amount: f64) {
        if !self.fresh {
            self.y -= amount.min(self.remaining().max(0.0));
        }
    }
}

struct Layouter<'a> {
    blocks: &'a [Block],
    pages: Vec<LaidOutPage>,
    cursor: PageCursor,
    geometry: PageGeometry,
}

/// Lay out `blocks` onto pages. Always yields at least one page.
pub fn layout(blocks: &[Block], geometry: &PageGeometry) -> Vec<LaidOutPage> {
    let mut l = Layouter {
        blocks,
        pages: vec![LaidOutPage::default()],
        cursor: PageCursor::new(geometry),
        geometry: *geometry,
    };
    for (index, block) in blocks.iter().enumerate() {
        l.place(index, block);
    }
    debug!("Laid out {} block(s) on {} page(s)", blocks.len(), l.pages.len());
    l.pages
}

/// Draw the footer of page `number` (1-based) into `page`.
pub fn stamp_footer(page: &mut LaidOutPage, number: usize, generated_at: &str, geometry: &PageGeometry) {
    let baseline = geometry.margin / 2.0;
    let right_text = format!("Page {number}");
    let right_x =
        geometry.width - geometry.margin - text_width(&right_text, Font::Regular, FOOTER_SIZE);
    page.ops.push(DrawOp::Text {
        x: geometry.margin,
        y: baseline,
        font: Font::Regular,
        size: FOOTER_SIZE,
        color: FOOTER_COLOR,
        text: format!("Report Generated: {generated_at}"),
    });
    page.ops.push(DrawOp::Text {
        x: right_x,
        y: baseline,
        font: Font::Regular,
        size: FOOTER_SIZE,
        color: FOOTER_COLOR,
        text: right_text,
    });
}

impl Layouter<'_> {
    fn new_page(&mut self) {
        self.pages.push(LaidOutPage::default());
        self.cursor = PageCursor::new(&self.geometry);
    }

    fn ops(&mut self) -> &mut Vec<DrawOp> {
        // `pages` is never empty.
        let last = self.pages.len() - 1;
        &mut self.pages[last].ops
    }

    fn place(&mut self, index: usize, block: &Block) {
        match block {
            Block::Heading { level, text } => {
                let keep = self
                    .blocks
                    .get(index + 1)
                    .map(|b| self.lead_height(b))
                    .unwrap_or(0.0);
                self.place_text(text, heading_style(*level), keep);
            }
            Block::Paragraph { text, style } => self.place_text(text, paragraph_style(*style), 0.0),
            Block::ErrorNote { message } => self.place_text(message, error_style(), 0.0),
            Block::Table(grid) => self.place_table(grid),
            Block::Image(image) => self.place_image(index, image),
        }
    }

    /// Height of the smallest piece of `block` that must start on a page.
    fn lead_height(&self, block: &Block) -> f64 {
        match block {
            Block::Heading { level, .. } => heading_style(*level).leading,
            Block::Paragraph { style, .. } => paragraph_style(*style).leading,
            Block::ErrorNote { .. } => error_style().leading,
            Block::Table(grid) => self.table_lead(grid),
            Block::Image(img) => img.height,
        }
    }

    /// Header row plus the first data row.
    fn table_lead(&self, grid: &Grid) -> f64 {
        let widths = self.column_widths(grid);
        let header = self.header_height(grid, &widths);
        let first = grid
            .rows()
            .first()
            .map(|r| self.row_height(r, &widths, TABLE_BODY))
            .unwrap_or(0.0);
        header + first
    }

    // ── Text ──

    fn place_text(&mut self, text: &str, style: TextStyle, keep_with_next: f64) {
        let max_width = (self.cursor.width - 2.0 * style.indent).max(style.size);
        let lines = wrap_text(text, style.font, style.size, max_width);

        self.cursor.gap(style.space_before);
        // Headings (keep_with_next > 0) move whole, together with the lead of
        // the following block, when that still fits on an empty page.
        if keep_with_next > 0.0 && !self.cursor.fresh {
            let needed = lines.len() as f64 * style.leading + style.space_after + keep_with_next;
            if !self.cursor.fits(needed) && needed <= self.cursor.frame_height() {
                self.new_page();
            }
        }

        for line in lines {
            if !self.cursor.fits(style.leading) && !self.cursor.fresh {
                self.new_page();
            }
            self.draw_line(&line, &style);
        }
        self.cursor.gap(style.space_after);
    }

    fn draw_line(&mut self, line: &str, style: &TextStyle) {
        let top = self.cursor.y;
        let left = self.cursor.left + style.indent;
        let inner_width = self.cursor.width - 2.0 * style.indent;
        if let Some(fill) = style.background {
            self.ops().push(DrawOp::Rect {
                x: left - 2.0,
                y: top - style.leading,
                width: inner_width + 4.0,
                height: style.leading,
                fill: Some(fill),
                stroke: None,
            });
        }
        let x = match style.align {
            Align::Left => left,
            Align::Center => {
                left + ((inner_width - text_width(line, style.font, style.size)) / 2.0).max(0.0)
            }
        };
        // Centre the glyph body inside the leading.
        let baseline = top - style.leading + (style.leading - style.size) / 2.0 + style.size * 0.2;
        self.ops().push(DrawOp::Text {
            x,
            y: baseline,
            font: style.font,
            size: style.size,
            color: style.color,
            text: line.to_string(),
        });
        self.cursor.advance(style.leading);
    }

    // ── Tables ──

    fn column_widths(&self, grid: &Grid) -> Vec<f64> {
        let n = grid.column_count().max(1);
        vec![self.cursor.width / n as f64; n]
    }

    fn cell_lines(text: &str, width: f64, (font, size, _): (Font, f64, f64)) -> Vec<String> {
        wrap_text(text, font, size, (width - 2.0 * TABLE_PAD).max(size))
    }

    fn row_height(&self, cells: &[String], widths: &[f64], cell_style: (Font, f64, f64)) -> f64 {
        let lines = cells
            .iter()
            .zip(widths)
            .map(|(c, w)| Self::cell_lines(c, *w, cell_style).len())
            .max()
            .unwrap_or(1);
        lines as f64 * cell_style.2 + 2.0 * TABLE_PAD
    }

    /// Header rows never take more than half the frame, so at least part of
    /// the first data row always fits beneath them.
    fn header_height(&self, grid: &Grid, widths: &[f64]) -> f64 {
        self.row_height(grid.header(), widths, TABLE_HEADER)
            .min(self.cursor.frame_height() / 2.0)
    }

    fn place_table(&mut self, grid: &Grid) {
        let widths = self.column_widths(grid);
        let header_height = self.header_height(grid, &widths);
        let lead = self.table_lead(grid);

        self.cursor.gap(4.0);
        if !self.cursor.fresh && !self.cursor.fits(lead) {
            self.new_page();
        }
        self.draw_row(grid.header(), &widths, TABLE_HEADER, Some(TABLE_HEADER_FILL), header_height);

        let mut rows_on_page = 0usize;
        for row in grid.rows() {
            let mut height = self.row_height(row, &widths, TABLE_BODY);
            if !self.cursor.fits(height) {
                if rows_on_page > 0 {
                    self.new_page();
                    self.draw_row(grid.header(), &widths, TABLE_HEADER, Some(TABLE_HEADER_FILL), header_height);
                    rows_on_page = 0;
                }
                // Directly under a header there is nowhere better to go.
                height = height.min(self.cursor.remaining());
            }
            self.draw_row(row, &widths, TABLE_BODY, None, height);
            rows_on_page += 1;
        }
        self.cursor.gap(TABLE_SPACE_AFTER);
    }

    fn draw_row(
        &mut self,
        cells: &[String],
        widths: &[f64],
        cell_style: (Font, f64, f64),
        fill: Option<Rgb>,
        height: f64,
    ) {
        let (font, size, leading) = cell_style;
        let top = self.cursor.y;
        let max_lines = (((height - 2.0 * TABLE_PAD) / leading) + EPS).floor().max(1.0) as usize;
        let mut x = self.cursor.left;
        for (cell, width) in cells.iter().zip(widths) {
            self.ops().push(DrawOp::Rect {
                x,
                y: top - height,
                width: *width,
                height,
                fill,
                stroke: Some((TABLE_GRID, 0.5)),
            });
            let mut lines = Self::cell_lines(cell, *width, cell_style);
            if lines.len() > max_lines {
                lines.truncate(max_lines);
                if let Some(last) = lines.last_mut() {
                    last.push('\u{2026}');
                }
            }
            for (i, line) in lines.iter().enumerate() {
                let baseline = top - TABLE_PAD - (i as f64 + 1.0) * leading + (leading - size);
                self.ops().push(DrawOp::Text {
                    x: x + TABLE_PAD,
                    y: baseline,
                    font,
                    size,
                    color: Rgb::BLACK,
                    text: line.clone(),
                });
            }
            x += width;
        }
        self.cursor.advance(height);
    }

    // ── Images ──

    fn place_image(&mut self, index: usize, image: &ImageBlock) {
        if !self.cursor.fits(image.height) && !self.cursor.fresh {
            self.new_page();
        }
        let x = self.cursor.left + ((self.cursor.width - image.width) / 2.0).max(0.0);
        let y = self.cursor.y - image.height;
        self.ops().push(DrawOp::Image {
            block: index,
            x,
            y,
            width: image.width,
            height: image.height,
        });
        self.cursor.advance(image.height);
        self.cursor.gap(IMAGE_SPACE_AFTER);
    }
}
