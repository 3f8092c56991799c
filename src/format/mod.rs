//! Container format parsers.
//!
//! Only TIFF (classic and BigTIFF) is read. See [`tiff`].

pub mod tiff;
