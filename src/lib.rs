//! # tiff-stack
//!
//! Loads multi-page 16-bit grayscale TIFF files into owned image buffers,
//! one per page, with every sample value preserved, and previews them.
//!
//! ## Architecture
//!
//! - [`io`] - Blocking byte-range readers and an LRU block cache
//! - [`mod@format`] - TIFF/BigTIFF parsing: header, directories, tags, strips
//! - [`stack`] - The stack loader
//! - [`viewer`] - 8-bit previews shown on a [`ViewSurface`]
//! - [`config`] - CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiff_stack::{load_image_stack, show, BrowserSurface};
//!
//! let (pages, count) = load_image_stack("stack.tif", false);
//! println!("{} pages", count);
//!
//! let mut surface = BrowserSurface::new("127.0.0.1:3000".parse().unwrap());
//! show(&pages, &mut surface).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod stack;
pub mod viewer;

// Re-export commonly used types
pub use config::Config;
pub use error::{IoError, StackError, TiffError, ViewError};
pub use format::tiff::{PageMetadata, TiffContainer};
pub use io::{BlockCache, FileRangeReader, MemoryRangeReader, RangeReader};
pub use stack::{load_image_stack, ImageStack, LoadOptions, PageBuffer, StackLoader};
pub use viewer::{show, to_preview, view_title, BrowserSurface, ViewSurface};
