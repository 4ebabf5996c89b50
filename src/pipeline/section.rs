//! Section building: one [`LogicalItem`] → zero or more styled [`Block`]s.
//!
//! Every failure below this point is absorbed here. A table that does not
//! parse becomes text, a diagram that does not render becomes an error note
//! plus its source, an unreadable image becomes an error note. `build` is
//! infallible by signature.

use crate::error::RenderFailure;
use crate::model::{Block, DocumentContext, ImageBlock, LogicalItem, ParagraphStyle, RenderRequest};
use crate::pipeline::diagram::{probe_image, DiagramResolver, RasterImage};
use crate::pipeline::fit::fit_image;
use crate::pipeline::mermaid::{self, DiagramOptions};
use crate::pipeline::table::parse_table;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

/// `label SEP detail`, optionally preceded by an ordinal (`3.` / `3)`) or a
/// bullet. Dashes only separate when surrounded by whitespace.
static LIST_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<ord>\d+)[.)]|[-*\u{2022}])?\s*(?P<label>[^:]+?)\s*(?::\s*|\s[-\u{2013}\u{2014}]\s+)(?P<detail>\S.*)$")
        .expect("valid regex")
});

static MD_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex"));

static INLINE_BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("valid regex"));

/// Builds blocks for one document.
pub struct SectionBuilder<'a> {
    ctx: &'a DocumentContext,
    resolver: &'a DiagramResolver,
    timeout: Duration,
}

impl<'a> SectionBuilder<'a> {
    pub fn new(ctx: &'a DocumentContext, resolver: &'a DiagramResolver, timeout: Duration) -> Self {
        Self {
            ctx,
            resolver,
            timeout,
        }
    }

    /// Turn `item` into blocks. Never fails; items with no content yield an
    /// empty vector.
    pub async fn build(&self, item: LogicalItem) -> Vec<Block> {
        match item {
            LogicalItem::SummaryText(text) => summary_blocks(&text),
            LogicalItem::TabularText(text) => tabular_blocks(&text),
            LogicalItem::DiagramSource { source, context } => {
                self.diagram_blocks(source, context).await
            }
            LogicalItem::OrderedListText(text) => ordered_list_blocks(&text),
            LogicalItem::KeyValueText(text) => key_value_blocks(&text),
            LogicalItem::Heading { level, text } => {
                let text = text.trim();
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![Block::Heading {
                        level: level.clamp(1, 6),
                        text: text.to_string(),
                    }]
                }
            }
            LogicalItem::Styled { text, style } => {
                if text.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![Block::paragraph(text, style)]
                }
            }
            LogicalItem::RasterImage { bytes, context } => {
                match probe_image(bytes, &context).and_then(|img| self.fit(img, &context)) {
                    Ok(block) => vec![block],
                    Err(failure) => vec![Block::error_note(failure.to_string())],
                }
            }
        }
    }

    async fn diagram_blocks(&self, source: String, context: String) -> Vec<Block> {
        let request = RenderRequest::new(source.clone(), context.clone());
        let resolved = self.resolver.resolve(request, self.timeout).await;
        match resolved.and_then(|img| self.fit(img, &context)) {
            Ok(image) => {
                let mut blocks = vec![image];
                let options = self.ctx.diagram_options();
                if options.editor_links {
                    if let Some(link) = editor_link(&source, options) {
                        blocks.push(Block::paragraph(
                            format!("Edit diagram: {link}"),
                            ParagraphStyle::Link,
                        ));
                    }
                }
                blocks
            }
            Err(RenderFailure::EmptySource) => {
                vec![Block::error_note(RenderFailure::EmptySource.to_string())]
            }
            Err(failure) => {
                let mut blocks = vec![Block::error_note(failure.to_string())];
                blocks.extend(source_listing(&source));
                blocks
            }
        }
    }

    fn fit(&self, image: RasterImage, context: &str) -> Result<Block, RenderFailure> {
        let (frame_width, frame_height) = self.ctx.content_frame();
        let fitted = fit_image(
            image.width as f64,
            image.height as f64,
            frame_width,
            frame_height,
        )
        .ok_or_else(|| RenderFailure::Unfittable {
            context: context.to_string(),
            width: image.width,
            height: image.height,
        })?;
        debug!(
            "{}: {}x{}px fitted to {:.1}x{:.1}pt",
            context, image.width, image.height, fitted.width, fitted.height
        );
        Ok(Block::Image(ImageBlock {
            bytes: image.bytes,
            intrinsic_width: image.width,
            intrinsic_height: image.height,
            width: fitted.width,
            height: fitted.height,
        }))
    }
}

// ── Item rules ───────────────────────────────────────────────────────────

fn summary_blocks(text: &str) -> Vec<Block> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    vec![Block::paragraph(text, ParagraphStyle::Emphasis)]
}

fn tabular_blocks(text: &str) -> Vec<Block> {
    match parse_table(text) {
        Some(grid) => vec![Block::Table(grid)],
        None => {
            debug!("tabular text did not parse; rendering as lines");
            non_empty_lines(text)
                .map(|l| Block::paragraph(l, ParagraphStyle::Body))
                .collect()
        }
    }
}

fn ordered_list_blocks(text: &str) -> Vec<Block> {
    non_empty_lines(text)
        .map(|line| Block::paragraph(format_list_entry(line), ParagraphStyle::ListItem))
        .collect()
}

/// Normalize `label SEP detail` entries to `marker label: detail`; anything
/// else is returned unchanged.
pub fn format_list_entry(line: &str) -> String {
    match LIST_ENTRY.captures(line) {
        Some(caps) => {
            let marker = caps
                .name("ord")
                .map(|m| format!("{}.", m.as_str()))
                .unwrap_or_else(|| "\u{2022}".to_string());
            format!("{} {}: {}", marker, caps["label"].trim(), caps["detail"].trim())
        }
        None => line.to_string(),
    }
}

fn key_value_blocks(text: &str) -> Vec<Block> {
    if let Some(grid) = parse_table(text) {
        return vec![Block::Table(grid)];
    }
    non_empty_lines(text).map(key_value_line).collect()
}

fn key_value_line(line: &str) -> Block {
    if let Some(caps) = MD_HEADING.captures(line) {
        return Block::Heading {
            // `#` is a section inside the answer text, deeper markers are
            // subsections; level 1 stays reserved for the document title.
            level: if caps[1].len() == 1 { 2 } else { 3 },
            text: caps[2].trim().to_string(),
        };
    }
    for marker in ["**", "__"] {
        if line.len() > 4 && line.starts_with(marker) && line.ends_with(marker) {
            let inner = &line[2..line.len() - 2];
            if !inner.contains(marker) {
                return Block::paragraph(inner.trim(), ParagraphStyle::Strong);
            }
        }
    }
    let plain = INLINE_BOLD.replace_all(line, |caps: &regex::Captures<'_>| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    Block::paragraph(plain.into_owned(), ParagraphStyle::Body)
}

/// Raw diagram source as one code paragraph per line, without leading or
/// trailing blank lines.
fn source_listing(source: &str) -> Vec<Block> {
    let lines: Vec<&str> = source.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last]
            .iter()
            .map(|l| Block::paragraph(l.trim_end(), ParagraphStyle::Code))
            .collect(),
        _ => Vec::new(),
    }
}

fn editor_link(source: &str, options: &DiagramOptions) -> Option<String> {
    let unthemed = DiagramOptions {
        theme: None,
        ..options.clone()
    };
    let code = mermaid::prepare_source(source, &unthemed)?;
    Some(mermaid::live_editor_link(
        &code,
        options.theme.unwrap_or_default(),
    ))
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RasterizeError;
    use crate::model::{Grid, PageGeometry};
    use crate::pipeline::diagram::{RasterizeFuture, Rasterizer};
    use crate::testutil::png;
    use chrono::Utc;
    use std::sync::Arc;

    struct Fixed(Result<Vec<u8>, RasterizeError>);

    impl Rasterizer for Fixed {
        fn rasterize<'a>(&'a self, _source: &'a str) -> RasterizeFuture<'a> {
            let reply = self.0.clone();
            Box::pin(async move { reply })
        }
    }

    struct Hang;

    impl Rasterizer for Hang {
        fn rasterize<'a>(&'a self, _source: &'a str) -> RasterizeFuture<'a> {
            Box::pin(futures::future::pending())
        }
    }

    fn context(options: DiagramOptions) -> DocumentContext {
        DocumentContext::new(PageGeometry::a4(), Utc::now(), options).unwrap()
    }

    async fn build_with(r: Arc<dyn Rasterizer>, item: LogicalItem) -> Vec<Block> {
        let ctx = context(DiagramOptions::default());
        let resolver = DiagramResolver::new(r, ctx.diagram_options().clone());
        SectionBuilder::new(&ctx, &resolver, Duration::from_millis(50))
            .build(item)
            .await
    }

    async fn build(item: LogicalItem) -> Vec<Block> {
        build_with(Arc::new(Fixed(Ok(png(30, 10)))), item).await
    }

    fn body(text: &str) -> Block {
        Block::paragraph(text, ParagraphStyle::Body)
    }

    #[tokio::test]
    async fn summary_is_one_emphasized_paragraph() {
        let blocks = build(LogicalItem::SummaryText("  An APT campaign.  ".into())).await;
        assert_eq!(
            blocks,
            vec![Block::paragraph("An APT campaign.", ParagraphStyle::Emphasis)]
        );
        assert!(build(LogicalItem::SummaryText(" \n ".into())).await.is_empty());
    }

    #[tokio::test]
    async fn table_or_line_fallback() {
        let blocks = build(LogicalItem::TabularText("| A | B |\n|---|---|\n| 1 | 2 |".into())).await;
        let expected = Grid::with_rows(
            vec!["A".into(), "B".into()],
            vec![vec!["1".into(), "2".into()]],
        )
        .unwrap();
        assert_eq!(blocks, vec![Block::Table(expected)]);

        let blocks = build(LogicalItem::TabularText("no table here\n\n  second line ".into())).await;
        assert_eq!(blocks, vec![body("no table here"), body("second line")]);
    }

    #[tokio::test]
    async fn diagram_success_is_fitted_to_frame() {
        let blocks = build(LogicalItem::diagram("graph TD\nA-->B")).await;
        assert_eq!(blocks.len(), 1);
        let Block::Image(img) = &blocks[0] else {
            panic!("expected image, got {blocks:?}");
        };
        let (fw, _) = PageGeometry::a4().content_frame();
        assert_eq!((img.intrinsic_width, img.intrinsic_height), (30, 10));
        assert!((img.width - fw).abs() < 1e-9);
        assert!((img.height - fw / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn hung_diagram_degrades_to_note_and_source() {
        let blocks = build_with(
            Arc::new(Hang),
            LogicalItem::diagram_with_context("\nmindmap\n  root((x))\n", "Main Mind Map"),
        )
        .await;
        assert_eq!(blocks.len(), 3, "{blocks:?}");
        match &blocks[0] {
            Block::ErrorNote { message } => {
                assert!(message.contains("Main Mind Map"), "{message}");
                assert!(message.contains("timed out"), "{message}");
            }
            other => panic!("expected error note, got {other:?}"),
        }
        assert_eq!(blocks[1], Block::paragraph("mindmap", ParagraphStyle::Code));
        assert_eq!(blocks[2], Block::paragraph("  root((x))", ParagraphStyle::Code));
    }

    #[tokio::test]
    async fn empty_diagram_is_a_skip_note() {
        let blocks = build(LogicalItem::diagram("mermaid\n")).await;
        assert_eq!(
            blocks,
            vec![Block::error_note("skipped: empty diagram source")]
        );
    }

    #[tokio::test]
    async fn http_failure_keeps_source() {
        let blocks = build_with(
            Arc::new(Fixed(Err(RasterizeError::Status(503)))),
            LogicalItem::diagram("graph TD"),
        )
        .await;
        assert!(matches!(&blocks[0], Block::ErrorNote { message } if message.contains("503")));
        assert_eq!(blocks[1], Block::paragraph("graph TD", ParagraphStyle::Code));
    }

    #[tokio::test]
    async fn editor_link_follows_diagram_when_enabled() {
        let ctx = context(DiagramOptions {
            editor_links: true,
            ..Default::default()
        });
        let resolver = DiagramResolver::new(
            Arc::new(Fixed(Ok(png(10, 10)))),
            ctx.diagram_options().clone(),
        );
        let blocks = SectionBuilder::new(&ctx, &resolver, Duration::from_secs(1))
            .build(LogicalItem::diagram("graph TD"))
            .await;
        assert_eq!(blocks.len(), 2);
        assert!(matches!(
            &blocks[1],
            Block::Paragraph { text, style: ParagraphStyle::Link }
                if text.starts_with("Edit diagram: https://mermaid.live/edit#pako:")
        ));
    }

    #[test]
    fn list_entries_are_normalized() {
        assert_eq!(
            format_list_entry("1. Initial Access - Spear phishing"),
            "1. Initial Access: Spear phishing"
        );
        assert_eq!(
            format_list_entry("Execution: PowerShell (T1059.001)"),
            "\u{2022} Execution: PowerShell (T1059.001)"
        );
        assert_eq!(
            format_list_entry("- Persistence \u{2014} Run keys"),
            "\u{2022} Persistence: Run keys"
        );
        assert_eq!(format_list_entry("3) Exfiltration: over C2"), "3. Exfiltration: over C2");
    }

    #[test]
    fn list_entries_without_separator_are_verbatim() {
        assert_eq!(format_list_entry("Lateral movement observed"), "Lateral movement observed");
        assert_eq!(format_list_entry("spear-phishing wave"), "spear-phishing wave");
    }

    #[tokio::test]
    async fn ordered_list_skips_blank_lines() {
        let blocks = build(LogicalItem::OrderedListText("a: b\n\n  \nplain".into())).await;
        assert_eq!(
            blocks,
            vec![
                Block::paragraph("\u{2022} a: b", ParagraphStyle::ListItem),
                Block::paragraph("plain", ParagraphStyle::ListItem),
            ]
        );
    }

    #[tokio::test]
    async fn key_value_text_rules() {
        let text = "# Who\n## What\n#### Why\n**Answer**\n__Also bold__\nThe **actor** used __tools__.\n";
        let blocks = build(LogicalItem::KeyValueText(text.into())).await;
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 2, text: "Who".into() },
                Block::Heading { level: 3, text: "What".into() },
                Block::Heading { level: 3, text: "Why".into() },
                Block::paragraph("Answer", ParagraphStyle::Strong),
                Block::paragraph("Also bold", ParagraphStyle::Strong),
                body("The actor used tools."),
            ]
        );
    }

    #[tokio::test]
    async fn key_value_table_wins() {
        let blocks = build(LogicalItem::KeyValueText("| Q | A |\n|---|---|\n| Who | APT29 |".into())).await;
        assert!(matches!(&blocks[..], [Block::Table(g)] if g.row_count() == 1));
    }

    #[tokio::test]
    async fn raster_image_failure_is_note_only() {
        let blocks = build(LogicalItem::RasterImage {
            bytes: vec![1, 2, 3],
            context: "Website Screenshot".into(),
        })
        .await;
        assert!(matches!(
            &blocks[..],
            [Block::ErrorNote { message }] if message.contains("Website Screenshot")
        ));
    }

    #[tokio::test]
    async fn heading_and_styled_items() {
        assert_eq!(
            build(LogicalItem::heading(9, " Title ")).await,
            vec![Block::Heading { level: 6, text: "Title".into() }]
        );
        assert!(build(LogicalItem::heading(2, "  ")).await.is_empty());
        assert_eq!(
            build(LogicalItem::styled("x", ParagraphStyle::Intro)).await,
            vec![Block::paragraph("x", ParagraphStyle::Intro)]
        );
    }
}
