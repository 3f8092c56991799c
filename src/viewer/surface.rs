//! Display surfaces and the show loop.

use image::GrayImage;
use tracing::debug;

use crate::error::ViewError;
use crate::stack::PageBuffer;

use super::preview::{to_preview, view_title};

/// Somewhere titled grayscale views can be shown.
pub trait ViewSurface {
    /// Open one view. Views stay open until [`close_all`](Self::close_all).
    fn open_view(&mut self, title: &str, preview: GrayImage) -> Result<(), ViewError>;

    /// Block until the user dismisses the views.
    fn wait_for_dismiss(&mut self) -> Result<(), ViewError>;

    /// Release every open view.
    fn close_all(&mut self);
}

/// Show each page in its own view, wait for dismissal, then close them all.
///
/// An empty stack opens nothing and returns immediately. Views are closed
/// even if opening or waiting fails.
pub fn show<S: ViewSurface + ?Sized>(pages: &[PageBuffer], surface: &mut S) -> Result<(), ViewError> {
    let result = open_and_wait(pages, surface);
    surface.close_all();
    result
}

fn open_and_wait<S: ViewSurface + ?Sized>(
    pages: &[PageBuffer],
    surface: &mut S,
) -> Result<(), ViewError> {
    let count = pages.len();
    for (index, page) in pages.iter().enumerate() {
        let title = view_title(index, count);
        debug!("Opening view '{}'", title);
        surface.open_view(&title, to_preview(page))?;
    }

    if count == 0 {
        debug!("No pages to show");
        return Ok(());
    }

    surface.wait_for_dismiss()
}
