//! Local HTTP surface: one resizable titled panel per view.
//!
//! # Endpoints
//!
//! ```text
//! GET  /               - HTML page with every view
//! GET  /views          - JSON list of views
//! GET  /views/{index}  - PNG preview
//! POST /dismiss        - Close the viewer
//! GET  /health         - Health check
//! ```
//!
//! The server only runs inside [`BrowserSurface::wait_for_dismiss`], on a
//! runtime created for that call.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use image::GrayImage;
use serde::Serialize;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::ViewError;

use super::preview::encode_png;
use super::surface::ViewSurface;

// =============================================================================
// Views and State
// =============================================================================

/// A view ready to be served.
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub png: Bytes,
}

impl RenderedView {
    pub fn render(title: &str, preview: &GrayImage) -> Result<Self, ViewError> {
        Ok(Self {
            title: title.to_string(),
            width: preview.width(),
            height: preview.height(),
            png: Bytes::from(encode_png(preview)?),
        })
    }
}

/// Shared state of the viewer routes.
#[derive(Clone)]
pub struct ViewerState {
    views: Arc<Vec<RenderedView>>,
    dismiss: Arc<Notify>,
}

impl ViewerState {
    pub fn new(views: Vec<RenderedView>) -> Self {
        Self {
            views: Arc::new(views),
            dismiss: Arc::new(Notify::new()),
        }
    }

    pub fn views(&self) -> &[RenderedView] {
        &self.views
    }

    /// Resolves once `/dismiss` has been posted.
    pub async fn dismissed(&self) {
        self.dismiss.notified().await
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Entry of the `/views` listing.
#[derive(Debug, Serialize)]
pub struct ViewInfo {
    pub index: usize,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Handlers
// =============================================================================

async fn index_handler(State(state): State<ViewerState>) -> Html<String> {
    Html(generate_viewer_html(state.views()))
}

async fn views_handler(State(state): State<ViewerState>) -> Json<Vec<ViewInfo>> {
    Json(
        state
            .views()
            .iter()
            .enumerate()
            .map(|(index, view)| ViewInfo {
                index,
                title: view.title.clone(),
                width: view.width,
                height: view.height,
                url: format!("/views/{}", index),
            })
            .collect(),
    )
}

async fn view_png_handler(
    State(state): State<ViewerState>,
    Path(index): Path<usize>,
) -> Response {
    match state.views().get(index) {
        Some(view) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/png")
            .header(header::CACHE_CONTROL, "no-store")
            .body(axum::body::Body::from(view.png.clone()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::with_status(
                "not_found",
                format!("No view {} ({} open)", index, state.views().len()),
                StatusCode::NOT_FOUND,
            )),
        )
            .into_response(),
    }
}

async fn dismiss_handler(State(state): State<ViewerState>) -> StatusCode {
    debug!("Dismiss requested");
    state.dismiss.notify_one();
    StatusCode::NO_CONTENT
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the viewer router over `state`.
pub fn create_viewer_router(state: ViewerState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/views", get(views_handler))
        .route("/views/{index}", get(view_png_handler))
        .route("/dismiss", post(dismiss_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// =============================================================================
// HTML
// =============================================================================

fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// One page with a resizable panel per view and a dismiss button.
pub fn generate_viewer_html(views: &[RenderedView]) -> String {
    let panels: String = views
        .iter()
        .enumerate()
        .map(|(index, view)| {
            let title = html_escape(&view.title);
            format!(
                r##"        <section class="view">
            <h2>{title}</h2>
            <img src="/views/{index}" alt="{title}" width="{width}" height="{height}">
        </section>
"##,
                width = view.width,
                height = view.height,
            )
        })
        .collect();

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Stack Viewer ({count} images)</title>
    <style>
        body {{
            margin: 0;
            padding: 16px;
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #1a1a1a;
            color: #eee;
        }}
        header {{
            display: flex;
            align-items: center;
            gap: 16px;
            margin-bottom: 16px;
        }}
        .views {{
            display: flex;
            flex-wrap: wrap;
            gap: 16px;
        }}
        .view {{
            resize: both;
            overflow: auto;
            border: 1px solid #444;
            background: #000;
            padding: 8px;
        }}
        .view h2 {{
            margin: 0 0 8px 0;
            font-size: 14px;
            font-weight: 500;
        }}
        .view img {{
            display: block;
            width: 100%;
            height: auto;
            image-rendering: pixelated;
        }}
    </style>
</head>
<body>
    <header>
        <span>{count} image(s)</span>
        <button id="dismiss">Close all</button>
    </header>
    <main class="views">
{panels}    </main>
    <script>
        document.getElementById("dismiss").addEventListener("click", function () {{
            fetch("/dismiss", {{ method: "POST" }}).then(function () {{
                document.body.innerHTML = "<p>Viewer closed.</p>";
            }});
        }});
    </script>
</body>
</html>
"##,
        count = views.len(),
    )
}

// =============================================================================
// Browser Surface
// =============================================================================

/// Serves the views on a local address until dismissed.
pub struct BrowserSurface {
    addr: SocketAddr,
    views: Vec<RenderedView>,
}

impl BrowserSurface {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            views: Vec::new(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn views(&self) -> &[RenderedView] {
        &self.views
    }

    async fn serve(&self) -> Result<(), ViewError> {
        let state = ViewerState::new(self.views.clone());
        let router = create_viewer_router(state.clone());

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|source| ViewError::Bind {
                addr: self.addr.to_string(),
                source,
            })?;
        let local = listener.local_addr().map_err(ViewError::Serve)?;

        info!(
            "Showing {} image(s) at http://{}/ (POST /dismiss or Ctrl+C to close)",
            self.views.len(),
            local
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(state))
            .await
            .map_err(ViewError::Serve)
    }
}

async fn shutdown_signal(state: ViewerState) {
    tokio::select! {
        _ = state.dismissed() => info!("Viewer dismissed"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Interrupted, closing viewer"),
            Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
        },
    }
}

impl ViewSurface for BrowserSurface {
    fn open_view(&mut self, title: &str, preview: GrayImage) -> Result<(), ViewError> {
        self.views.push(RenderedView::render(title, &preview)?);
        Ok(())
    }

    fn wait_for_dismiss(&mut self) -> Result<(), ViewError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(ViewError::Runtime)?;
        runtime.block_on(self.serve())
    }

    fn close_all(&mut self) {
        debug!("Closing {} view(s)", self.views.len());
        self.views.clear();
    }
}
