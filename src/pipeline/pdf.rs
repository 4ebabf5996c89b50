//! PDF serialization of laid-out pages with `pdf-writer`.
//!
//! Object layout: catalog, page tree, document info, the four base fonts,
//! one image XObject per embedded image, then a page and a content stream
//! per page. Content streams are left uncompressed; image data is Flate
//! compressed RGB.

use crate::model::{Block, PageGeometry};
use crate::pipeline::fonts::{encode_winansi, Font};
use crate::pipeline::layout::{DrawOp, LaidOutPage, Rgb};
use chrono::{DateTime, Datelike, Timelike, Utc};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_writer::types::ProcSet;
use pdf_writer::{Content, Date, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, warn};

/// Values written into the document information dictionary.
#[derive(Debug, Clone)]
pub struct PdfMetadata<'a> {
    pub title: &'a str,
    pub author: Option<&'a str>,
    pub creator: &'a str,
    pub created: DateTime<Utc>,
}

struct RefAlloc(i32);

impl RefAlloc {
    fn bump(&mut self) -> Ref {
        let r = Ref::new(self.0);
        self.0 += 1;
        r
    }
}

/// An image decoded to 8-bit RGB and compressed for embedding.
struct EmbeddedImage {
    id: Ref,
    name: String,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

/// Decode `bytes` and flatten any alpha channel onto white.
fn decode_rgb(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>), image::ImageError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in rgba.pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u16;
        for c in [r, g, b] {
            rgb.push(((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8);
        }
    }
    Ok((width, height, rgb))
}

/// Serialize `pages` to a complete PDF file.
///
/// `blocks` resolves the image references in [`DrawOp::Image`]. An image
/// that cannot be decoded is replaced by a short notice in its place.
pub fn write_pdf(
    pages: &[LaidOutPage],
    blocks: &[Block],
    geometry: &PageGeometry,
    meta: &PdfMetadata<'_>,
) -> Vec<u8> {
    let mut refs = RefAlloc(1);
    let catalog_id = refs.bump();
    let tree_id = refs.bump();
    let info_id = refs.bump();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(tree_id);

    // ── Document info ──
    {
        let mut info = pdf.document_info(info_id);
        info.title(TextStr(meta.title));
        if let Some(author) = meta.author {
            info.author(TextStr(author));
        }
        info.creator(TextStr(meta.creator));
        info.producer(TextStr(concat!("edgequake-report ", env!("CARGO_PKG_VERSION"))));
        info.creation_date(pdf_date(meta.created));
        info.finish();
    }

    // ── Fonts ──
    let mut font_ids = Vec::with_capacity(Font::ALL.len());
    for font in Font::ALL {
        let id = refs.bump();
        pdf.type1_font(id)
            .base_font(Name(font.base_font()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        font_ids.push((font, id));
    }

    // ── Images ──
    let mut images: BTreeMap<usize, EmbeddedImage> = BTreeMap::new();
    for page in pages {
        for op in &page.ops {
            let DrawOp::Image { block, .. } = op else {
                continue;
            };
            if images.contains_key(block) {
                continue;
            }
            let Some(Block::Image(img)) = blocks.get(*block) else {
                continue;
            };
            match decode_rgb(&img.bytes) {
                Ok((width, height, rgb)) => {
                    let name = format!("Im{}", images.len() + 1);
                    images.insert(
                        *block,
                        EmbeddedImage {
                            id: refs.bump(),
                            name,
                            width,
                            height,
                            data: flate_compress(&rgb),
                        },
                    );
                }
                Err(e) => warn!("Image in block {} could not be decoded: {}", block, e),
            }
        }
    }
    for image in images.values() {
        let mut xobject = pdf.image_xobject(image.id, &image.data);
        xobject.filter(Filter::FlateDecode);
        xobject.width(image.width as i32);
        xobject.height(image.height as i32);
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        xobject.finish();
    }

    // ── Pages ──
    let mut page_ids = Vec::with_capacity(pages.len());
    for page in pages {
        let page_id = refs.bump();
        let content_id = refs.bump();
        page_ids.push(page_id);

        let content = render_content(page, &images);
        pdf.stream(content_id, &content);

        let mut pdf_page = pdf.page(page_id);
        pdf_page.media_box(Rect::new(
            0.0,
            0.0,
            geometry.width as f32,
            geometry.height as f32,
        ));
        pdf_page.parent(tree_id);
        pdf_page.contents(content_id);
        let mut resources = pdf_page.resources();
        resources.proc_sets([ProcSet::Pdf, ProcSet::Text, ProcSet::ImageColor]);
        {
            let mut fonts = resources.fonts();
            for (font, id) in &font_ids {
                fonts.pair(Name(font.resource_name()), *id);
            }
        }
        let used: Vec<&EmbeddedImage> = page
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { block, .. } => images.get(block),
                _ => None,
            })
            .collect();
        if !used.is_empty() {
            let mut xobjects = resources.x_objects();
            for image in used {
                xobjects.pair(Name(image.name.as_bytes()), image.id);
            }
        }
        resources.finish();
        pdf_page.finish();
    }

    let count = page_ids.len() as i32;
    pdf.pages(tree_id).kids(page_ids).count(count);

    let bytes = pdf.finish();
    debug!("Serialized {} page(s), {} image(s), {} bytes", count, images.len(), bytes.len());
    bytes
}

fn render_content(page: &LaidOutPage, images: &BTreeMap<usize, EmbeddedImage>) -> Vec<u8> {
    let mut content = Content::new();
    for op in &page.ops {
        match op {
            DrawOp::Text {
                x,
                y,
                font,
                size,
                color,
                text,
            } => {
                let Rgb(r, g, b) = *color;
                content.set_fill_rgb(r, g, b);
                content.begin_text();
                content.set_font(Name(font.resource_name()), *size as f32);
                content.next_line(*x as f32, *y as f32);
                content.show(Str(&encode_winansi(text)));
                content.end_text();
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height,
                fill,
                stroke,
            } => {
                content.save_state();
                if let Some(Rgb(r, g, b)) = fill {
                    content.set_fill_rgb(*r, *g, *b);
                    content.rect(*x as f32, *y as f32, *width as f32, *height as f32);
                    content.fill_nonzero();
                }
                if let Some((Rgb(r, g, b), line_width)) = stroke {
                    content.set_stroke_rgb(*r, *g, *b);
                    content.set_line_width(*line_width as f32);
                    content.rect(*x as f32, *y as f32, *width as f32, *height as f32);
                    content.stroke();
                }
                content.restore_state();
            }
            DrawOp::Image {
                block,
                x,
                y,
                width,
                height,
            } => match images.get(block) {
                Some(image) => {
                    content.save_state();
                    content.transform([
                        *width as f32,
                        0.0,
                        0.0,
                        *height as f32,
                        *x as f32,
                        *y as f32,
                    ]);
                    content.x_object(Name(image.name.as_bytes()));
                    content.restore_state();
                }
                None => {
                    let Rgb(r, g, b) = Rgb::hex(0xc0392b);
                    content.set_fill_rgb(r, g, b);
                    content.begin_text();
                    content.set_font(Name(Font::Oblique.resource_name()), 9.0);
                    content.next_line(*x as f32, (*y + *height - 12.0) as f32);
                    content.show(Str(b"Image data could not be decoded."));
                    content.end_text();
                }
            },
        }
    }
    content.finish()
}

fn pdf_date(ts: DateTime<Utc>) -> Date {
    Date::new(ts.year().clamp(0, 9999) as u16)
        .month(ts.month() as u8)
        .day(ts.day() as u8)
        .hour(ts.hour() as u8)
        .minute(ts.minute() as u8)
        .second(ts.second() as u8)
        .utc_offset_hour(0)
        .utc_offset_minute(0)
}
