use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading container bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// File exists but cannot be read
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Any other read failure
    #[error("Read error on {identifier}: {message}")]
    Read { identifier: String, message: String },
}

impl IoError {
    /// Classify a `std::io::Error` raised while accessing `identifier`.
    pub fn from_std(identifier: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(identifier.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                IoError::PermissionDenied(identifier.to_string())
            }
            _ => IoError::Read {
                identifier: identifier.to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Compression scheme without a decoder
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// Predictor other than none or horizontal differencing
    #[error("Unsupported predictor: {0}")]
    UnsupportedPredictor(u16),

    /// Compressed strip data could not be inflated
    #[error("Cannot decompress strip {strip} ({compression}): {message}")]
    Decompress {
        strip: usize,
        compression: &'static str,
        message: String,
    },

    /// File uses tiles instead of strips
    #[error("Unsupported organization: file uses tiles instead of strips")]
    TiledOrganization,

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Directory index beyond the discovered chain
    #[error("Directory {index} does not exist (container has {count})")]
    NoSuchDirectory { index: usize, count: usize },

    /// Row index past the image height
    #[error("Scanline {row} out of range (image height is {height})")]
    RowOutOfRange { row: u32, height: u32 },

    /// Strip data does not cover the requested scanline
    #[error("Strip {strip} is truncated: scanline needs bytes {start}..{end}, strip holds {byte_count}")]
    TruncatedStrip {
        strip: usize,
        start: u64,
        end: u64,
        byte_count: u64,
    },

    /// Caller-provided staging buffer is smaller than a scanline
    #[error("Scanline buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },
}

/// Errors produced while loading an image stack
#[derive(Debug, Clone, Error)]
pub enum StackError {
    /// Container could not be opened (missing, unreadable, corrupt header)
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: TiffError,
    },

    /// First page uses a pixel layout this loader does not decode
    #[error("Unsupported pixel format: {reason}")]
    UnsupportedFormat { reason: String },

    /// A later page differs in geometry from the first
    #[error(
        "Page {page} is {found_width}x{found_height} ({found_bits}-bit), expected {width}x{height} ({bits}-bit)"
    )]
    GeometryMismatch {
        page: usize,
        width: u32,
        height: u32,
        bits: u16,
        found_width: u32,
        found_height: u32,
        found_bits: u16,
    },

    /// Directory chain could not be followed to the given page
    #[error("Cannot read directory for page {page}: {source}")]
    Directory {
        page: usize,
        #[source]
        source: TiffError,
    },

    /// Scanline decode failed mid-page
    #[error("Decode failed on page {page}, row {row}: {source}")]
    Decode {
        page: usize,
        row: u32,
        #[source]
        source: TiffError,
    },
}

impl StackError {
    /// Whether this is an open failure (recovered by returning an empty stack).
    pub fn is_open_failure(&self) -> bool {
        matches!(self, StackError::Open { .. })
    }
}

/// Errors produced while presenting a stack
#[derive(Debug, Error)]
pub enum ViewError {
    /// Preview could not be encoded
    #[error("Failed to encode preview: {message}")]
    Encode { message: String },

    /// Async runtime could not be started
    #[error("Failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Listener could not bind
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Server stopped with an error
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
