//! Multi-page stack loading.
//!
//! [`StackLoader`] turns a TIFF container into an [`ImageStack`] of owned
//! 16-bit grayscale buffers, one per directory, in file order.

mod loader;

pub use loader::{load_image_stack, ImageStack, LoadOptions, PageBuffer, StackLoader};
