//! Stack viewer.
//!
//! Each 16-bit page is reduced to an 8-bit preview and opened as a titled
//! view on a [`ViewSurface`]. [`BrowserSurface`] serves the views from a
//! local HTTP server.

mod browser;
mod preview;
mod surface;

pub use browser::{
    create_viewer_router, generate_viewer_html, BrowserSurface, ErrorResponse, HealthResponse,
    RenderedView, ViewInfo, ViewerState,
};
pub use preview::{encode_png, to_preview, view_title};
pub use surface::{show, ViewSurface};
