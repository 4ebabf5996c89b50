//! Diagram resolution: Mermaid source → raster image bytes.
//!
//! The network dependency sits behind the [`Rasterizer`] trait. The default
//! implementation, [`MermaidInkRasterizer`], issues a single `GET` against a
//! mermaid.ink compatible endpoint. [`DiagramResolver`] wraps any rasterizer
//! with source preparation, an explicit deadline, and header-only dimension
//! probing, and converts every failure into a [`RenderFailure`]. Nothing
//! escapes it as an `Err` that could abort the document.

use crate::error::{RasterizeError, RenderFailure};
use crate::model::RenderRequest;
use crate::pipeline::mermaid::{self, DiagramOptions};
use futures::future::BoxFuture;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default rasterization endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://mermaid.ink/img";

/// Default per-diagram deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Future returned by [`Rasterizer::rasterize`].
pub type RasterizeFuture<'a> = BoxFuture<'a, Result<Vec<u8>, RasterizeError>>;

/// Turns prepared diagram source into encoded image bytes (PNG or JPEG).
///
/// Implementations must not retry; the resolver enforces the deadline.
pub trait Rasterizer: Send + Sync {
    fn rasterize<'a>(&'a self, source: &'a str) -> RasterizeFuture<'a>;
}

// ── mermaid.ink ──────────────────────────────────────────────────────────

enum ClientState {
    Ready(reqwest::Client),
    /// The HTTP client could not be built; every request fails with this.
    Unavailable(String),
}

/// [`Rasterizer`] backed by the mermaid.ink HTTP API.
///
/// Requests go to `{endpoint}/{base64url(source)}`; a 2xx body is the image.
pub struct MermaidInkRasterizer {
    endpoint: String,
    client: ClientState,
}

impl MermaidInkRasterizer {
    /// Create a rasterizer for `endpoint` whose HTTP client gives up after
    /// `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edgequake-report/", env!("CARGO_PKG_VERSION")))
            .build()
        {
            Ok(c) => ClientState::Ready(c),
            Err(e) => {
                warn!("HTTP client unavailable, diagrams will degrade: {}", e);
                ClientState::Unavailable(e.to_string())
            }
        };
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The full request URL for `source`.
    pub fn request_url(&self, source: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            mermaid::encode_payload(source)
        )
    }
}

impl Default for MermaidInkRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl Rasterizer for MermaidInkRasterizer {
    fn rasterize<'a>(&'a self, source: &'a str) -> RasterizeFuture<'a> {
        Box::pin(async move {
            let client = match &self.client {
                ClientState::Ready(c) => c,
                ClientState::Unavailable(reason) => {
                    return Err(RasterizeError::Transport(reason.clone()))
                }
            };
            let url = self.request_url(source);
            debug!("Requesting diagram render ({} bytes of source)", source.len());

            let response = client.get(&url).send().await.map_err(|e| {
                if e.is_timeout() {
                    RasterizeError::Timeout
                } else {
                    RasterizeError::Transport(e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(RasterizeError::Status(status.as_u16()));
            }

            let bytes = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    RasterizeError::Timeout
                } else {
                    RasterizeError::Transport(e.to_string())
                }
            })?;
            Ok(bytes.to_vec())
        })
    }
}

// ── Resolver ─────────────────────────────────────────────────────────────

/// Encoded image bytes plus the pixel size read from the container header.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Read pixel dimensions from a PNG/JPEG header without decoding pixels.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}

/// Probe `bytes` and wrap them as a [`RasterImage`].
pub fn probe_image(bytes: Vec<u8>, context: &str) -> Result<RasterImage, RenderFailure> {
    let (width, height) = read_dimensions(&bytes).map_err(|detail| RenderFailure::ImageHeader {
        context: context.to_string(),
        detail,
    })?;
    Ok(RasterImage {
        bytes,
        width,
        height,
    })
}

/// Resolves diagram source into images with graceful degradation.
#[derive(Clone)]
pub struct DiagramResolver {
    rasterizer: Arc<dyn Rasterizer>,
    options: DiagramOptions,
}

impl DiagramResolver {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, options: DiagramOptions) -> Self {
        Self {
            rasterizer,
            options,
        }
    }

    pub fn options(&self) -> &DiagramOptions {
        &self.options
    }

    /// Resolve one request. Makes at most one rasterizer call, bounded by
    /// `timeout`, and never retries.
    pub async fn resolve(
        &self,
        request: RenderRequest,
        timeout: Duration,
    ) -> Result<RasterImage, RenderFailure> {
        let RenderRequest {
            source_text,
            context,
        } = request;

        let Some(source) = mermaid::prepare_source(&source_text, &self.options) else {
            debug!("{}: diagram source is empty, skipping render", context);
            return Err(RenderFailure::EmptySource);
        };

        let outcome = tokio::time::timeout(timeout, self.rasterizer.rasterize(&source)).await;
        let bytes = match outcome {
            Err(_) | Ok(Err(RasterizeError::Timeout)) => {
                warn!("{}: diagram render timed out after {:?}", context, timeout);
                return Err(RenderFailure::Timeout {
                    context,
                    after: timeout,
                });
            }
            Ok(Err(RasterizeError::Status(status))) => {
                warn!("{}: diagram render returned HTTP {}", context, status);
                return Err(RenderFailure::HttpStatus { context, status });
            }
            Ok(Err(RasterizeError::Transport(detail))) => {
                warn!("{}: diagram render failed: {}", context, detail);
                return Err(RenderFailure::Transport { context, detail });
            }
            Ok(Ok(bytes)) => bytes,
        };

        let image = probe_image(bytes, &context).inspect_err(|e| warn!("{}", e))?;
        debug!(
            "{}: rendered {}x{}px ({} bytes)",
            context,
            image.width,
            image.height,
            image.bytes.len()
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::png;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct NeverAnswers;

    impl Rasterizer for NeverAnswers {
        fn rasterize<'a>(&'a self, _source: &'a str) -> RasterizeFuture<'a> {
            Box::pin(futures::future::pending())
        }
    }

    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        last: Mutex<Option<String>>,
        reply: Option<Result<Vec<u8>, RasterizeError>>,
    }

    impl Rasterizer for Recording {
        fn rasterize<'a>(&'a self, source: &'a str) -> RasterizeFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(source.to_string());
            let reply = self
                .reply
                .clone()
                .unwrap_or_else(|| Ok(png(40, 20)));
            Box::pin(async move { reply })
        }
    }

    fn resolver(r: Arc<dyn Rasterizer>) -> DiagramResolver {
        DiagramResolver::new(r, DiagramOptions::default())
    }

    #[tokio::test]
    async fn empty_source_makes_no_request() {
        let stub = Arc::new(Recording::default());
        let res = resolver(stub.clone())
            .resolve(
                RenderRequest::new("  mermaid \n\n", "Main Mind Map"),
                Duration::from_secs(1),
            )
            .await;
        assert_eq!(res, Err(RenderFailure::EmptySource));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_reads_header_dimensions() {
        let stub = Arc::new(Recording::default());
        let img = resolver(stub.clone())
            .resolve(
                RenderRequest::new("mermaid\ngraph TD\nA-->B", "Flow"),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!((img.width, img.height), (40, 20));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            stub.last.lock().unwrap().as_deref(),
            Some("graph TD\nA-->B")
        );
    }

    #[tokio::test]
    async fn hung_rasterizer_times_out() {
        let res = resolver(Arc::new(NeverAnswers))
            .resolve(
                RenderRequest::new("graph TD\nA-->B", "TTP Timeline"),
                Duration::from_millis(50),
            )
            .await;
        match res {
            Err(RenderFailure::Timeout { context, after }) => {
                assert_eq!(context, "TTP Timeline");
                assert_eq!(after, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_and_transport_errors_map_to_failures() {
        let stub = Arc::new(Recording {
            reply: Some(Err(RasterizeError::Status(400))),
            ..Default::default()
        });
        let res = resolver(stub)
            .resolve(RenderRequest::new("graph TD", "Flow"), Duration::from_secs(1))
            .await;
        assert_eq!(
            res,
            Err(RenderFailure::HttpStatus {
                context: "Flow".into(),
                status: 400
            })
        );

        let stub = Arc::new(Recording {
            reply: Some(Err(RasterizeError::Transport("connection refused".into()))),
            ..Default::default()
        });
        let res = resolver(stub)
            .resolve(RenderRequest::new("graph TD", "Flow"), Duration::from_secs(1))
            .await;
        assert!(matches!(res, Err(RenderFailure::Transport { .. })));
    }

    #[tokio::test]
    async fn garbage_body_is_a_header_failure() {
        let stub = Arc::new(Recording {
            reply: Some(Ok(b"<html>error</html>".to_vec())),
            ..Default::default()
        });
        let res = resolver(stub)
            .resolve(RenderRequest::new("graph TD", "Flow"), Duration::from_secs(1))
            .await;
        assert!(matches!(res, Err(RenderFailure::ImageHeader { .. })));
    }

    #[tokio::test]
    async fn theme_directive_is_sent() {
        let stub = Arc::new(Recording::default());
        let r = DiagramResolver::new(
            stub.clone(),
            DiagramOptions {
                theme: Some(mermaid::DiagramTheme::Dark),
                ..Default::default()
            },
        );
        r.resolve(RenderRequest::new("graph TD", "Flow"), Duration::from_secs(1))
            .await
            .unwrap();
        let sent = stub.last.lock().unwrap().clone().unwrap();
        assert!(sent.starts_with("%%{ init: {'theme': 'dark'}}%%\n"));
    }

    #[test]
    fn request_url_joins_endpoint_and_payload() {
        let r = MermaidInkRasterizer::new("http://localhost:9/img/", Duration::from_secs(1));
        assert_eq!(r.request_url("graph TD"), "http://localhost:9/img/Z3JhcGggVEQ=");
    }
}
