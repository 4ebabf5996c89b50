//! Mermaid source preparation and link helpers.
//!
//! Producers of diagram code (usually an LLM) are inconsistent: some wrap the
//! code in a Markdown fence, some repeat the `mermaid` keyword on its own line,
//! and mind-map nodes often contain nested parentheses that the renderer
//! rejects. [`prepare_source`] normalizes all of these before a request is
//! made.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::error::ReportError;

/// Base URL of the Mermaid live editor.
pub const LIVE_EDITOR_BASE: &str = "https://mermaid.live/edit#pako:";

/// A parenthesized group that itself contains exactly one inner group.
static NESTED_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]*\([^()]*\)[^()]*)\)").expect("valid regex"));

/// Mermaid built-in themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramTheme {
    #[default]
    Default,
    Neutral,
    Dark,
    Forest,
    /// The customizable base theme.
    Base,
}

impl DiagramTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagramTheme::Default => "default",
            DiagramTheme::Neutral => "neutral",
            DiagramTheme::Dark => "dark",
            DiagramTheme::Forest => "forest",
            DiagramTheme::Base => "base",
        }
    }
}

impl fmt::Display for DiagramTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramTheme {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(DiagramTheme::Default),
            "neutral" => Ok(DiagramTheme::Neutral),
            "dark" => Ok(DiagramTheme::Dark),
            "forest" => Ok(DiagramTheme::Forest),
            // "custom" is accepted as an alias for the base theme.
            "base" | "custom" => Ok(DiagramTheme::Base),
            other => Err(ReportError::InvalidConfig(format!(
                "unknown diagram theme '{other}' (expected default, neutral, dark, forest or base)"
            ))),
        }
    }
}

/// How diagram source is prepared before it is sent to the rasterizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramOptions {
    /// Prefix an `init` theme directive when set.
    pub theme: Option<DiagramTheme>,
    /// Rewrite `(a (b) c)` into `a b- c` so mind-map nodes parse.
    pub flatten_nested_parentheses: bool,
    /// Emit a live-editor link paragraph after every rendered diagram.
    pub editor_links: bool,
}

/// Remove an outer Markdown code fence, if the whole text is fenced.
pub fn strip_code_fence(source: &str) -> &str {
    let trimmed = source.trim();
    if !trimmed.starts_with("```") {
        return source;
    }
    let Some(first_newline) = trimmed.find('\n') else {
        // A lone "```mermaid" line has no body.
        return "";
    };
    let body = &trimmed[first_newline + 1..];
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body)
}

/// Remove the first non-empty line when it is exactly the `mermaid` keyword
/// (case-insensitive, surrounding whitespace ignored).
pub fn strip_keyword_line(source: &str) -> String {
    let mut lines: Vec<&str> = source.lines().collect();
    if let Some(idx) = lines.iter().position(|l| !l.trim().is_empty()) {
        if lines[idx].trim().eq_ignore_ascii_case("mermaid") {
            lines.remove(idx);
        }
    }
    lines.join("\n")
}

/// Flatten one level of nested parentheses: the outer pair is dropped, inner
/// `(` are removed and inner `)` become `-`.
pub fn flatten_nested_parentheses(source: &str) -> String {
    NESTED_PARENS
        .replace_all(source, |caps: &regex::Captures<'_>| {
            caps[1].replace('(', "").replace(')', "-")
        })
        .into_owned()
}

/// Prefix the Mermaid `init` directive selecting `theme`.
pub fn apply_theme(source: &str, theme: DiagramTheme) -> String {
    format!("%%{{ init: {{'theme': '{}'}}}}%%\n{}", theme.as_str(), source)
}

/// Run the full preparation chain. Returns `None` when nothing renderable is
/// left.
pub fn prepare_source(source: &str, options: &DiagramOptions) -> Option<String> {
    let unfenced = strip_code_fence(source);
    let mut code = strip_keyword_line(unfenced);
    if options.flatten_nested_parentheses {
        code = flatten_nested_parentheses(&code);
    }
    if code.trim().is_empty() {
        return None;
    }
    Some(match options.theme {
        Some(theme) => apply_theme(&code, theme),
        None => code,
    })
}

/// URL path segment for a rasterization request: padded base64url of the
/// UTF-8 source.
pub fn encode_payload(source: &str) -> String {
    URL_SAFE.encode(source.as_bytes())
}

/// Build a `mermaid.live` editor link that opens `source` with `theme`.
///
/// The editor state is `{"code": …, "mermaid": {"theme": …}}` deflated at
/// level 9 and standard-base64 encoded.
pub fn live_editor_link(source: &str, theme: DiagramTheme) -> String {
    let state = serde_json::json!({
        "code": source,
        "mermaid": { "theme": theme.as_str() },
    });
    let json = state.to_string();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    // Writes into a Vec cannot fail.
    let deflated = encoder
        .write_all(json.as_bytes())
        .and_then(|_| encoder.finish())
        .unwrap_or_default();
    format!("{LIVE_EDITOR_BASE}{}", STANDARD.encode(deflated))
}
