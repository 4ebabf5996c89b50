//! Configuration types for report assembly.
//!
//! All assembly behaviour is controlled through [`ReportConfig`], built via
//! its [`ReportConfigBuilder`]. Page margins are fixed at 0.75 in and are not
//! configurable.

use crate::error::ReportError;
use crate::model::{Orientation, PageGeometry, PageSize};
use crate::pipeline::diagram::{
    MermaidInkRasterizer, Rasterizer, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS,
};
use crate::pipeline::mermaid::{DiagramOptions, DiagramTheme};
use crate::progress::ProgressCallback;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Bounds for [`ReportConfig::render_timeout_secs`].
pub const MIN_RENDER_TIMEOUT_SECS: u64 = 1;
pub const MAX_RENDER_TIMEOUT_SECS: u64 = 120;

/// Default document title written to the PDF info dictionary.
pub const DEFAULT_TITLE: &str = "Threat Intelligence Report";

/// Configuration for one report assembly.
///
/// Built via [`ReportConfig::builder()`] or using [`ReportConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_report::{Orientation, ReportConfig};
///
/// let config = ReportConfig::builder()
///     .orientation(Orientation::Landscape)
///     .render_timeout_secs(10)
///     .title("Weekly TI digest")
///     .build()
///     .unwrap();
/// assert_eq!(config.render_timeout_secs, 10);
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Page orientation. Default: portrait.
    pub orientation: Orientation,

    /// Paper standard. Default: A4.
    pub page_size: PageSize,

    /// Base URL of the diagram rendering service. Default: `https://mermaid.ink/img`.
    pub render_endpoint: String,

    /// Per-diagram deadline in seconds, 1–120. Default: 30.
    ///
    /// Expiry is not an error: the diagram degrades to a note plus its source.
    pub render_timeout_secs: u64,

    /// Mermaid theme directive prefixed to every diagram. Default: none.
    pub diagram_theme: Option<DiagramTheme>,

    /// Flatten nested parentheses in diagram source before rendering. Default: false.
    pub flatten_nested_parentheses: bool,

    /// Add a Mermaid live-editor link under every rendered diagram. Default: false.
    pub include_editor_links: bool,

    /// Document title. Default: [`DEFAULT_TITLE`].
    pub title: String,

    /// Document author. Default: none.
    pub author: Option<String>,

    /// Fixed generation timestamp. If None, the clock is read once when
    /// assembly starts.
    pub generated_at: Option<DateTime<Utc>>,

    /// Pre-constructed rasterizer. Takes precedence over `render_endpoint`.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Optional per-item progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            page_size: PageSize::default(),
            render_endpoint: DEFAULT_ENDPOINT.to_string(),
            render_timeout_secs: DEFAULT_TIMEOUT_SECS,
            diagram_theme: None,
            flatten_nested_parentheses: false,
            include_editor_links: false,
            title: DEFAULT_TITLE.to_string(),
            author: None,
            generated_at: None,
            rasterizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("orientation", &self.orientation)
            .field("page_size", &self.page_size)
            .field("render_endpoint", &self.render_endpoint)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("diagram_theme", &self.diagram_theme)
            .field("flatten_nested_parentheses", &self.flatten_nested_parentheses)
            .field("include_editor_links", &self.include_editor_links)
            .field("title", &self.title)
            .field("author", &self.author)
            .field("generated_at", &self.generated_at)
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AssemblyProgressCallback>"),
            )
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page geometry for the configured size and orientation.
    pub fn geometry(&self) -> PageGeometry {
        PageGeometry::standard(self.page_size, self.orientation)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn diagram_options(&self) -> DiagramOptions {
        DiagramOptions {
            theme: self.diagram_theme,
            flatten_nested_parentheses: self.flatten_nested_parentheses,
            editor_links: self.include_editor_links,
        }
    }

    /// The configured rasterizer, or a mermaid.ink client for
    /// `render_endpoint`.
    pub fn resolve_rasterizer(&self) -> Arc<dyn Rasterizer> {
        match &self.rasterizer {
            Some(r) => Arc::clone(r),
            None => Arc::new(MermaidInkRasterizer::new(
                self.render_endpoint.clone(),
                self.render_timeout(),
            )),
        }
    }
}

/// Builder for [`ReportConfig`].
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl fmt::Debug for ReportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ReportConfigBuilder {
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn render_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.render_endpoint = endpoint.into();
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.clamp(MIN_RENDER_TIMEOUT_SECS, MAX_RENDER_TIMEOUT_SECS);
        self
    }

    pub fn diagram_theme(mut self, theme: DiagramTheme) -> Self {
        self.config.diagram_theme = Some(theme);
        self
    }

    pub fn flatten_nested_parentheses(mut self, v: bool) -> Self {
        self.config.flatten_nested_parentheses = v;
        self
    }

    pub fn include_editor_links(mut self, v: bool) -> Self {
        self.config.include_editor_links = v;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = Some(author.into());
        self
    }

    pub fn generated_at(mut self, ts: DateTime<Utc>) -> Self {
        self.config.generated_at = Some(ts);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        if !(MIN_RENDER_TIMEOUT_SECS..=MAX_RENDER_TIMEOUT_SECS).contains(&c.render_timeout_secs) {
            return Err(ReportError::InvalidConfig(format!(
                "Render timeout must be {}–{}s, got {}",
                MIN_RENDER_TIMEOUT_SECS, MAX_RENDER_TIMEOUT_SECS, c.render_timeout_secs
            )));
        }
        if c.rasterizer.is_none() {
            let endpoint = c.render_endpoint.trim();
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ReportError::InvalidConfig(format!(
                    "Render endpoint must be an http(s) URL, got '{}'",
                    c.render_endpoint
                )));
            }
        }
        if c.title.trim().is_empty() {
            return Err(ReportError::InvalidConfig("Title must not be empty".into()));
        }
        c.geometry().validate()?;
        Ok(self.config)
    }
}
