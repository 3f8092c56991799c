//! Stack loader: container in, owned 16-bit page buffers out.
//!
//! ```text
//! open ──► count directories ──► reset ──► metadata + validate
//!                                              │
//!          ┌───────────────────────────────────┘
//!          ▼
//!   for each page: check geometry ─► allocate ─► scanline by scanline ─► next
//! ```
//!
//! The container and its block cache live only for the duration of one
//! load. Buffers are returned by value and never borrow from the file.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma};
use tracing::{debug, error, info, warn};

use crate::error::{StackError, TiffError};
use crate::format::tiff::{
    validate_page, Compression, PageMetadata, TiffContainer, DEFAULT_MAX_DIRECTORIES,
};
use crate::io::{BlockCache, FileRangeReader, RangeReader, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};

/// One decoded page: row-major, one `u16` per pixel.
pub type PageBuffer = ImageBuffer<Luma<u16>, Vec<u16>>;

// =============================================================================
// Load Options
// =============================================================================

/// Tuning for a [`StackLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Log the metadata dump at info level instead of debug
    pub verbose: bool,

    /// Block size of the read cache in bytes
    pub block_size: usize,

    /// Number of blocks the read cache holds
    pub cache_blocks: usize,

    /// Directory chain limit
    pub max_pages: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_CAPACITY,
            max_pages: DEFAULT_MAX_DIRECTORIES,
        }
    }
}

// =============================================================================
// Image Stack
// =============================================================================

/// Ordered pages of one container plus the first page's metadata.
#[derive(Debug, Clone, Default)]
pub struct ImageStack {
    pages: Vec<PageBuffer>,
    metadata: Option<PageMetadata>,
}

impl ImageStack {
    /// A stack with no pages, as returned for a failed load.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[PageBuffer] {
        &self.pages
    }

    pub fn get(&self, index: usize) -> Option<&PageBuffer> {
        self.pages.get(index)
    }

    /// Metadata of the first page; `None` for an empty stack.
    pub fn metadata(&self) -> Option<&PageMetadata> {
        self.metadata.as_ref()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PageBuffer> {
        self.pages.iter()
    }

    pub fn into_pages(self) -> Vec<PageBuffer> {
        self.pages
    }
}

impl IntoIterator for ImageStack {
    type Item = PageBuffer;
    type IntoIter = std::vec::IntoIter<PageBuffer>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

impl<'a> IntoIterator for &'a ImageStack {
    type Item = &'a PageBuffer;
    type IntoIter = std::slice::Iter<'a, PageBuffer>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}

// =============================================================================
// Stack Loader
// =============================================================================

/// Loads every page of a multi-page 16-bit grayscale TIFF.
///
/// # Example
///
/// ```no_run
/// use tiff_stack::{LoadOptions, StackLoader};
///
/// let loader = StackLoader::new(LoadOptions::default());
/// let stack = loader.load("stack.tif");
/// println!("{} pages", stack.len());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StackLoader {
    options: LoadOptions,
}

impl StackLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load the stack at `path`, or an empty stack if anything fails.
    ///
    /// Failures are logged: a container that cannot be opened as a warning,
    /// everything else as an error.
    pub fn load(&self, path: impl AsRef<Path>) -> ImageStack {
        match self.try_load(path) {
            Ok(stack) => stack,
            Err(e) if e.is_open_failure() => {
                warn!("{}", e);
                ImageStack::empty()
            }
            Err(e) => {
                error!("{}", e);
                ImageStack::empty()
            }
        }
    }

    /// Load the stack at `path`.
    pub fn try_load(&self, path: impl AsRef<Path>) -> Result<ImageStack, StackError> {
        let path = path.as_ref();
        let file = FileRangeReader::open(path).map_err(|e| StackError::Open {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        self.load_with_path(file, path.to_path_buf())
    }

    /// Load a stack from any byte source, such as an in-memory buffer.
    pub fn load_from_reader<R: RangeReader>(&self, reader: R) -> Result<ImageStack, StackError> {
        let path = PathBuf::from(reader.identifier());
        self.load_with_path(reader, path)
    }

    fn load_with_path<R: RangeReader>(
        &self,
        reader: R,
        path: PathBuf,
    ) -> Result<ImageStack, StackError> {
        let cached = BlockCache::with_capacity(
            reader,
            self.options.block_size,
            self.options.cache_blocks,
        );
        let container = TiffContainer::open(cached)
            .map_err(|source| StackError::Open { path, source })?
            .with_max_directories(self.options.max_pages);

        // The container is dropped when this returns, on success or error
        decode_stack(container, self.options.verbose)
    }
}

/// Load `path` with default options, returning the pages and their count.
///
/// A failed load yields `(vec![], 0)`.
pub fn load_image_stack(path: impl AsRef<Path>, verbose: bool) -> (Vec<PageBuffer>, usize) {
    let loader = StackLoader::new(LoadOptions {
        verbose,
        ..LoadOptions::default()
    });
    let pages = loader.load(path).into_pages();
    let count = pages.len();
    (pages, count)
}

// =============================================================================
// Decoding
// =============================================================================

fn decode_stack<R: RangeReader>(
    mut container: TiffContainer<R>,
    verbose: bool,
) -> Result<ImageStack, StackError> {
    let page_count = container
        .count_directories()
        .map_err(|source| StackError::Directory { page: 0, source })?;

    let metadata = container.metadata();
    log_metadata(&metadata, page_count, verbose);
    check_format(&container, &metadata, 0)?;

    let width = metadata.width_or_default();
    let height = metadata.height_or_default();
    let bits = metadata.bits_per_sample_or_default();

    let mut pages = Vec::with_capacity(page_count);
    for page in 0..page_count {
        if page > 0 {
            container
                .set_directory(page)
                .map_err(|source| StackError::Directory { page, source })?;

            let found = container.metadata();
            check_format(&container, &found, page)?;

            let (found_width, found_height, found_bits) = (
                found.width_or_default(),
                found.height_or_default(),
                found.bits_per_sample_or_default(),
            );
            if (found_width, found_height, found_bits) != (width, height, bits) {
                return Err(StackError::GeometryMismatch {
                    page,
                    width,
                    height,
                    bits,
                    found_width,
                    found_height,
                    found_bits,
                });
            }
        }

        pages.push(decode_page(&mut container, page, width, height)?);
    }

    info!(
        "Loaded {} page(s) of {}x{} from {}",
        pages.len(),
        width,
        height,
        container.reader().identifier()
    );

    Ok(ImageStack {
        pages,
        metadata: Some(metadata),
    })
}

fn check_format<R: RangeReader>(
    container: &TiffContainer<R>,
    metadata: &PageMetadata,
    page: usize,
) -> Result<(), StackError> {
    let result = validate_page(container.current_directory(), metadata, page);
    for warning in &result.warnings {
        warn!("{}: {}", container.reader().identifier(), warning);
    }
    result
        .into_result()
        .map_err(|e| StackError::UnsupportedFormat {
            reason: e.to_string(),
        })
}

/// Decode the current directory into a new buffer, one scanline at a time.
fn decode_page<R: RangeReader>(
    container: &mut TiffContainer<R>,
    page: usize,
    width: u32,
    height: u32,
) -> Result<PageBuffer, StackError> {
    if width == 0 || height == 0 {
        return Ok(PageBuffer::new(width, height));
    }

    let scanline_size = container.scanline_size();
    let row_len = width as usize;

    // The encoded pixels must fit in the file; checked before allocating
    let expansion = Compression::from_u16(container.metadata().compression_or_default())
        .map(Compression::max_expansion)
        .unwrap_or(1);
    let required = (scanline_size as u64 * height as u64).div_ceil(expansion);
    let available = container.reader().size();
    if required > available {
        return Err(StackError::Decode {
            page,
            row: 0,
            source: TiffError::FileTooSmall {
                required,
                actual: available,
            },
        });
    }

    let byte_order = container.header().byte_order;
    let mut buffer = PageBuffer::new(width, height);
    let mut scanline = vec![0u8; scanline_size];

    for (row, out) in (0..height).zip(buffer.chunks_exact_mut(row_len)) {
        container
            .read_scanline(row, &mut scanline)
            .map_err(|source| StackError::Decode { page, row, source })?;
        byte_order.decode_u16_samples(&scanline, out);
    }

    debug!("Decoded page {} ({} rows)", page, height);
    Ok(buffer)
}

fn log_metadata(metadata: &PageMetadata, page_count: usize, verbose: bool) {
    let mut lines = vec![format!("Number of pages: {}", page_count)];
    lines.extend(metadata.fields().into_iter().map(|(name, value)| match value {
        Some(value) => format!("{}: {}", name, value),
        None => format!("{}: (absent)", name),
    }));

    for line in &lines {
        if verbose {
            info!("{}", line);
        } else {
            debug!("{}", line);
        }
    }
}
