//! TIFF parser for multi-page grayscale stacks.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values, pixel samples included, are read in that order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. The parser handles both transparently.
//!
//! - **IFD (Image File Directory)**: One per page. Each IFD ends with the offset of
//!   the next one; the chain is the page order.
//!
//! - **Strips**: Pages store their rows in strips of `RowsPerStrip` scanlines,
//!   located by the StripOffsets and StripByteCounts tags. Strips may be
//!   LZW, Deflate or PackBits compressed; see [`StripCodec`].

mod codec;
mod container;
mod metadata;
mod parser;
mod strips;
mod tags;
mod validation;
mod values;

pub use codec::StripCodec;
pub use container::{TiffContainer, DEFAULT_MAX_DIRECTORIES};
pub use metadata::{
    PageMetadata, COMPRESSION_NONE, PLANAR_CONFIG_CHUNKY, PLANAR_CONFIG_PLANAR, PREDICTOR_HORIZONTAL,
    PREDICTOR_NONE, SAMPLE_FORMAT_UINT,
};
pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use strips::StripLayout;
pub use tags::{Compression, FieldType, TiffTag};
pub use validation::{validate_page, ValidationError, ValidationResult};
pub use values::{parse_u64_array, ValueReader};
