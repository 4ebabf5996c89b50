//! Threat-intelligence report layout.
//!
//! [`ThreatReport`] collects the pieces an analysis run produces (summary,
//! mind map, IOC table, TTP tables and timeline, the "5 Whats") and
//! [`ThreatReport::to_items`] arranges them into the ordered item list the
//! assembler consumes.

use crate::model::{LogicalItem, ParagraphStyle};
use serde::{Deserialize, Serialize};

pub const REPORT_TITLE: &str = "Threat Intelligence Mindmap Report";
pub const REPORT_INTRO: &str =
    "AI-powered tool for Threat Intelligence summaries, mind maps, and IOC extraction.";

/// Structured output of one threat-intelligence analysis.
///
/// Every field is optional. Text sections that are absent or blank are left
/// out of the document; diagram sections whose code is present but blank
/// keep their heading and render a skip note in place of the diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatReport {
    /// URL of the analysed article.
    pub source_url: Option<String>,
    /// AI-generated prose summary.
    pub summary: Option<String>,
    /// Mermaid mind-map code.
    pub mindmap: Option<String>,
    /// IOC table in pipe syntax.
    pub iocs: Option<String>,
    /// TTP overview table in pipe syntax.
    pub ttps_overview: Option<String>,
    /// TTPs in execution order, one per line.
    pub attack_path: Option<String>,
    /// Mermaid timeline code.
    pub ttp_timeline: Option<String>,
    /// "5 Whats" Q&A, as a table or heading/answer lines.
    pub five_whats: Option<String>,
    /// Screenshot of the source page, fetched by the caller.
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

fn section(title: &str) -> LogicalItem {
    LogicalItem::heading(2, title)
}

fn subsection(title: &str) -> LogicalItem {
    LogicalItem::heading(3, title)
}

impl ThreatReport {
    pub fn with_screenshot(mut self, bytes: Vec<u8>) -> Self {
        self.screenshot = Some(bytes);
        self
    }

    /// Arrange the report into assembler input, in reading order.
    pub fn to_items(&self) -> Vec<LogicalItem> {
        let mut items = vec![
            LogicalItem::heading(1, REPORT_TITLE),
            LogicalItem::styled(REPORT_INTRO, ParagraphStyle::Intro),
        ];

        if let Some(url) = present(&self.source_url) {
            items.push(section("SOURCE INFORMATION"));
            items.push(LogicalItem::styled(
                format!("Original source: {}", url.trim()),
                ParagraphStyle::Link,
            ));
        }

        if let Some(bytes) = self.screenshot.as_ref().filter(|b| !b.is_empty()) {
            items.push(section("WEBSITE SCREENSHOT"));
            items.push(LogicalItem::RasterImage {
                bytes: bytes.clone(),
                context: "Website screenshot".into(),
            });
        }

        if let Some(summary) = present(&self.summary) {
            items.push(section("AI-GENERATED SUMMARY & ANALYSIS"));
            items.push(LogicalItem::SummaryText(summary.to_string()));
        }

        // An empty string means no diagram; whitespace-only source is still
        // a diagram and gets its skip note.
        if let Some(code) = self.mindmap.as_deref().filter(|s| !s.is_empty()) {
            items.push(section("MIND MAP VISUALIZATION"));
            items.push(LogicalItem::diagram_with_context(code, "Mind map"));
        }

        if let Some(iocs) = present(&self.iocs) {
            items.push(section("INDICATORS OF COMPROMISE (IOCs)"));
            items.push(LogicalItem::TabularText(iocs.to_string()));
        }

        let overview = present(&self.ttps_overview);
        let path = present(&self.attack_path);
        let timeline = self.ttp_timeline.as_deref().filter(|s| !s.is_empty());
        if overview.is_some() || path.is_some() || timeline.is_some() {
            items.push(section("TACTICS, TECHNIQUES, AND PROCEDURES (TTPs)"));
            if let Some(table) = overview {
                items.push(subsection("TTPs Overview"));
                items.push(LogicalItem::TabularText(table.to_string()));
            }
            if let Some(path) = path {
                items.push(subsection("TTPs Ordered by Execution Time"));
                items.push(LogicalItem::OrderedListText(path.to_string()));
            }
            if let Some(code) = timeline {
                items.push(subsection("TTPs Graphic Timeline"));
                items.push(LogicalItem::diagram_with_context(code, "TTP timeline"));
            }
        }

        if let Some(whats) = present(&self.five_whats) {
            items.push(section("THREAT SCOPE REPORT (THE 5 WHATS)"));
            items.push(LogicalItem::KeyValueText(whats.to_string()));
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headings(items: &[LogicalItem]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|i| match i {
                LogicalItem::Heading { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_report_has_title_and_intro_only() {
        let items = ThreatReport::default().to_items();
        assert_eq!(items.len(), 2);
        assert_eq!(headings(&items), vec![REPORT_TITLE]);
        assert_eq!(
            items[1],
            LogicalItem::styled(REPORT_INTRO, ParagraphStyle::Intro)
        );
    }

    #[test]
    fn full_report_section_order() {
        let report = ThreatReport {
            source_url: Some("https://example.com/apt".into()),
            summary: Some("Summary.".into()),
            mindmap: Some("mindmap\n  root((APT))".into()),
            iocs: Some("| Type | Value |\n|---|---|\n| ip | 1.2.3.4 |".into()),
            ttps_overview: Some("| ID | Name |\n|---|---|\n| T1566 | Phishing |".into()),
            attack_path: Some("1. T1566: Phishing".into()),
            ttp_timeline: Some("timeline\n  title Attack".into()),
            five_whats: Some("## What?\nA campaign.".into()),
            screenshot: None,
        }
        .with_screenshot(vec![1, 2, 3]);

        let items = report.to_items();
        assert_eq!(
            headings(&items),
            vec![
                REPORT_TITLE,
                "SOURCE INFORMATION",
                "WEBSITE SCREENSHOT",
                "AI-GENERATED SUMMARY & ANALYSIS",
                "MIND MAP VISUALIZATION",
                "INDICATORS OF COMPROMISE (IOCs)",
                "TACTICS, TECHNIQUES, AND PROCEDURES (TTPs)",
                "TTPs Overview",
                "TTPs Ordered by Execution Time",
                "TTPs Graphic Timeline",
                "THREAT SCOPE REPORT (THE 5 WHATS)",
            ]
        );
        assert!(items.contains(&LogicalItem::styled(
            "Original source: https://example.com/apt",
            ParagraphStyle::Link
        )));
        assert!(matches!(
            items.last(),
            Some(LogicalItem::KeyValueText(t)) if t.starts_with("## What?")
        ));
    }

    #[test]
    fn blank_text_sections_are_omitted() {
        let report = ThreatReport {
            summary: Some("  \n ".into()),
            iocs: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(headings(&report.to_items()), vec![REPORT_TITLE]);
    }

    #[test]
    fn blank_diagram_keeps_its_heading() {
        let report = ThreatReport {
            mindmap: Some("   ".into()),
            ..Default::default()
        };
        let items = report.to_items();
        assert_eq!(headings(&items), vec![REPORT_TITLE, "MIND MAP VISUALIZATION"]);
        assert_eq!(
            items.last(),
            Some(&LogicalItem::diagram_with_context("   ", "Mind map"))
        );
    }

    #[test]
    fn empty_diagram_strings_omit_their_sections() {
        let report = ThreatReport {
            mindmap: Some(String::new()),
            ttp_timeline: Some(String::new()),
            ..Default::default()
        };
        let items = report.to_items();
        assert_eq!(headings(&items), vec![REPORT_TITLE]);
        assert!(!items.iter().any(|i| matches!(i, LogicalItem::DiagramSource { .. })));
    }

    #[test]
    fn ttp_heading_only_when_a_subsection_exists() {
        let report = ThreatReport {
            attack_path: Some("T1059 - Command and Scripting Interpreter".into()),
            ..Default::default()
        };
        assert_eq!(
            headings(&report.to_items()),
            vec![
                REPORT_TITLE,
                "TACTICS, TECHNIQUES, AND PROCEDURES (TTPs)",
                "TTPs Ordered by Execution Time",
            ]
        );
    }

    #[test]
    fn deserializes_partial_json() {
        let report: ThreatReport =
            serde_json::from_str(r#"{"summary": "s", "iocs": null}"#).unwrap();
        assert_eq!(report.summary.as_deref(), Some("s"));
        assert!(report.iocs.is_none());
        assert!(report.screenshot.is_none());
    }
}
