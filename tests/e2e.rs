//! End-to-end integration tests for edgequake-report.
//!
//! Diagram rendering goes either through an in-process rasterizer stub or
//! through the real reqwest client pointed at a local HTTP stub, so the
//! suite never touches the network.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use base64::Engine;
use edgequake_report::pipeline::diagram::RasterizeFuture;
use edgequake_report::{
    assemble, assemble_to_file, Block, BlockKind, Grid, LogicalItem, ParagraphStyle,
    RasterizeError, Rasterizer, ReportConfig, ReportError, ThreatReport,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 60, 40]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Answers every request with the same PNG.
struct StubRasterizer(Vec<u8>);

impl Rasterizer for StubRasterizer {
    fn rasterize<'a>(&'a self, _source: &'a str) -> RasterizeFuture<'a> {
        let bytes = self.0.clone();
        Box::pin(async move { Ok::<_, RasterizeError>(bytes) })
    }
}

#[derive(Clone)]
enum Reply {
    Status(u16, Vec<u8>),
    Hang,
}

/// Minimal HTTP/1.1 server on an ephemeral port. Returns the endpoint base
/// URL and the request paths it has seen.
async fn spawn_http_stub(reply: Reply) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let paths = Arc::new(Mutex::new(Vec::new()));
    let seen = paths.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let reply = reply.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !contains(&buf, b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf).to_string();
                if let Some(path) = request.split_whitespace().nth(1) {
                    seen.lock().unwrap().push(path.to_string());
                }
                match reply {
                    Reply::Hang => {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                    Reply::Status(status, body) => {
                        let head = format!(
                            "HTTP/1.1 {status} Stub\r\nContent-Type: image/png\r\n\
                             Content-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                    }
                }
            });
        }
    });

    (format!("http://{addr}/img"), paths)
}

fn stub_config() -> ReportConfig {
    ReportConfig::builder()
        .rasterizer(Arc::new(StubRasterizer(png(120, 60))))
        .build()
        .expect("config")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_summary_table_diagram() {
    let config = stub_config();
    let items = vec![
        LogicalItem::SummaryText("A ransomware affiliate moved laterally.".into()),
        LogicalItem::TabularText("| A | B |\n|---|---|\n| 1 | 2 |".into()),
        LogicalItem::diagram("graph TD; A-->B"),
    ];
    let doc = assemble(config.geometry(), items, &config)
        .await
        .expect("assemble");

    assert!(doc.pdf.starts_with(b"%PDF-"));
    assert!(doc.pdf.len() > 500);

    assert_eq!(doc.blocks.len(), 3);
    assert_eq!(
        doc.blocks[0],
        Block::paragraph(
            "A ransomware affiliate moved laterally.",
            ParagraphStyle::Emphasis
        )
    );
    let expected = Grid::with_rows(
        vec!["A".into(), "B".into()],
        vec![vec!["1".into(), "2".into()]],
    )
    .unwrap();
    assert_eq!(doc.blocks[1], Block::Table(expected));
    match &doc.blocks[2] {
        Block::Image(img) => {
            assert_eq!((img.intrinsic_width, img.intrinsic_height), (120, 60));
            let (fw, _) = config.geometry().content_frame();
            assert!((img.width - fw).abs() < 1e-6);
            assert!((img.height - fw / 2.0).abs() < 1e-6);
        }
        other => panic!("expected image, got {other:?}"),
    }

    assert_eq!(doc.stats.degraded_items, 0);
    assert_eq!(doc.footers.len(), 1);
    assert_eq!(doc.footers[0].page_number, 1);
}

#[tokio::test]
async fn test_mermaid_ink_client_over_http() {
    let (endpoint, paths) = spawn_http_stub(Reply::Status(200, png(40, 20))).await;
    let config = ReportConfig::builder()
        .render_endpoint(endpoint)
        .render_timeout_secs(5)
        .build()
        .unwrap();

    let doc = assemble(
        config.geometry(),
        vec![LogicalItem::diagram("mermaid\ngraph TD; A-->B")],
        &config,
    )
    .await
    .unwrap();

    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.blocks[0].kind(), BlockKind::Image);

    let payload = base64::engine::general_purpose::URL_SAFE.encode("graph TD; A-->B");
    assert_eq!(*paths.lock().unwrap(), vec![format!("/img/{payload}")]);
}

#[tokio::test]
async fn test_http_error_degrades_to_note_and_source() {
    let (endpoint, paths) = spawn_http_stub(Reply::Status(404, Vec::new())).await;
    let config = ReportConfig::builder()
        .render_endpoint(endpoint)
        .render_timeout_secs(5)
        .build()
        .unwrap();

    let source = "graph TD\n  A-->B";
    let doc = assemble(
        config.geometry(),
        vec![
            LogicalItem::diagram_with_context(source, "Attack flow"),
            LogicalItem::heading(2, "Next section"),
        ],
        &config,
    )
    .await
    .unwrap();

    assert_eq!(
        doc.blocks,
        vec![
            Block::error_note("Could not generate Attack flow image: HTTP status 404"),
            Block::paragraph("graph TD", ParagraphStyle::Code),
            Block::paragraph("  A-->B", ParagraphStyle::Code),
            Block::Heading {
                level: 2,
                text: "Next section".into()
            },
        ]
    );
    assert_eq!(paths.lock().unwrap().len(), 1, "no retries");
    assert_eq!(doc.stats.degraded_items, 1);
}

#[tokio::test]
async fn test_unresponsive_renderer_times_out() {
    let (endpoint, _paths) = spawn_http_stub(Reply::Hang).await;
    let config = ReportConfig::builder()
        .render_endpoint(endpoint)
        .render_timeout_secs(1)
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let doc = assemble(
        config.geometry(),
        vec![LogicalItem::diagram("graph LR; X-->Y")],
        &config,
    )
    .await
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        doc.blocks[0],
        Block::error_note("Could not generate Diagram image: rendering timed out after 1s")
    );
    assert_eq!(
        doc.blocks[1],
        Block::paragraph("graph LR; X-->Y", ParagraphStyle::Code)
    );
    assert!(doc.pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn test_editor_link_follows_rendered_diagram() {
    let config = ReportConfig::builder()
        .rasterizer(Arc::new(StubRasterizer(png(10, 10))))
        .include_editor_links(true)
        .build()
        .unwrap();
    let doc = assemble(
        config.geometry(),
        vec![LogicalItem::diagram("graph TD; A-->B")],
        &config,
    )
    .await
    .unwrap();

    assert_eq!(doc.blocks.len(), 2);
    match &doc.blocks[1] {
        Block::Paragraph { text, style } => {
            assert_eq!(*style, ParagraphStyle::Link);
            assert!(text.starts_with("Edit diagram: https://mermaid.live/edit#pako:"));
        }
        other => panic!("expected link paragraph, got {other:?}"),
    }
}

#[tokio::test]
async fn test_assemble_to_file_is_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("report.pdf");
    let config = stub_config();

    let doc = assemble_to_file(
        config.geometry(),
        vec![LogicalItem::SummaryText("Written to disk.".into())],
        &path,
        &config,
    )
    .await
    .unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, doc.pdf);
    assert!(!path.with_extension("pdf.tmp").exists());
}

#[tokio::test]
async fn test_assemble_to_file_reports_path_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let path = blocker.join("report.pdf");
    let config = stub_config();

    let err = assemble_to_file(config.geometry(), Vec::new(), &path, &config)
        .await
        .unwrap_err();
    match err {
        ReportError::OutputWriteFailed { path: p, .. } => assert_eq!(p, path),
        other => panic!("expected OutputWriteFailed, got {other}"),
    }
}

#[tokio::test]
async fn test_threat_report_document() {
    let report = ThreatReport {
        source_url: Some("https://example.com/advisory".into()),
        summary: Some("Operators used spear-phishing with ISO attachments.".into()),
        mindmap: Some("```mermaid\n```".into()),
        iocs: Some("| Type | Value |\n|---|---|\n| domain | evil.example |".into()),
        attack_path: Some("1. T1566.001 - Spearphishing Attachment\n2. T1204: User Execution".into()),
        ttp_timeline: Some("timeline\n  title Intrusion\n  Day 1 : Phishing".into()),
        five_whats: Some("| Question | Answer |\n|---|---|\n| What? | Intrusion |".into()),
        ..Default::default()
    }
    .with_screenshot(png(800, 600));
    let config = stub_config();

    let doc = assemble(config.geometry(), report.to_items(), &config)
        .await
        .unwrap();

    assert!(doc
        .blocks
        .contains(&Block::error_note("skipped: empty diagram source")));
    assert!(doc.blocks.contains(&Block::paragraph(
        "1. T1566.001: Spearphishing Attachment",
        ParagraphStyle::ListItem
    )));
    assert_eq!(doc.stats.tables, 2);
    // screenshot and timeline
    assert_eq!(doc.stats.images, 2);
    assert_eq!(doc.stats.degraded_items, 1);
    assert!(contains(&doc.pdf, b"(MIND MAP VISUALIZATION)"));

    let pages: Vec<usize> = doc.footers.iter().map(|f| f.page_number).collect();
    assert_eq!(pages, (1..=doc.stats.pages).collect::<Vec<_>>());
    assert!(doc
        .footers
        .windows(2)
        .all(|w| w[0].generated_at == w[1].generated_at));
}

#[test]
fn test_stats_are_json_serialisable() {
    let config = stub_config();
    let doc = edgequake_report::assemble_sync(
        config.geometry(),
        vec![LogicalItem::heading(1, "Report")],
        &config,
    )
    .unwrap();
    let json = serde_json::to_value(&doc.stats).unwrap();
    assert_eq!(json["pages"], 1);
    assert_eq!(json["items"], 1);
    let footers = serde_json::to_value(&doc.footers).unwrap();
    assert_eq!(footers[0]["page_number"], 1);
}
