//! Pixel format validation.
//!
//! The loader decodes one layout only. Pages outside it are rejected before
//! any buffer is allocated.
//!
//! # Supported Subset
//!
//! - **Bands**: one sample per pixel
//! - **Depth**: 16 bits per sample, unsigned integer
//! - **Compression**: none, LZW, Deflate or PackBits
//! - **Predictor**: none or horizontal differencing
//! - **Organization**: strips (no tiles)

use crate::error::TiffError;

use super::metadata::{PageMetadata, PREDICTOR_HORIZONTAL, PREDICTOR_NONE, SAMPLE_FORMAT_UINT};
use super::parser::Ifd;
use super::tags::{Compression, TiffTag};

/// Photometric values that read naturally as grayscale intensities
const PHOTOMETRIC_WHITE_IS_ZERO: u16 = 0;
const PHOTOMETRIC_BLACK_IS_ZERO: u16 = 1;

// =============================================================================
// Validation Result
// =============================================================================

/// Outcome of validating one page.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,

    pub errors: Vec<ValidationError>,

    /// Non-fatal observations, logged by the caller
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// First error, if any.
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A specific reason a page cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("page {page}: tiled organization is not supported")]
    TiledOrganization { page: usize },

    #[error("page {page}: no StripOffsets tag")]
    MissingStrips { page: usize },

    #[error("page {page}: {compression_name} compression is not supported")]
    UnsupportedCompression {
        page: usize,
        compression: u16,
        compression_name: String,
    },

    #[error("page {page}: predictor {predictor} is not supported")]
    UnsupportedPredictor { page: usize, predictor: u16 },

    #[error("page {page}: compressed strips without StripByteCounts")]
    MissingByteCounts { page: usize },

    #[error("page {page}: {samples} samples per pixel (expected 1)")]
    UnsupportedBandCount { page: usize, samples: u16 },

    #[error("page {page}: {bits} bits per sample (expected 16)")]
    UnsupportedBitDepth { page: usize, bits: u16 },

    #[error("page {page}: sample format {format} (expected 1, unsigned integer)")]
    UnsupportedSampleFormat { page: usize, format: u16 },
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::TiledOrganization { .. } => TiffError::TiledOrganization,
            ValidationError::MissingStrips { .. } => TiffError::MissingTag("StripOffsets"),
            ValidationError::UnsupportedCompression {
                compression_name, ..
            } => TiffError::UnsupportedCompression(compression_name),
            ValidationError::UnsupportedPredictor { predictor, .. } => {
                TiffError::UnsupportedPredictor(predictor)
            }
            ValidationError::MissingByteCounts { .. } => TiffError::MissingTag("StripByteCounts"),
            ValidationError::UnsupportedBandCount { samples, .. } => TiffError::InvalidTagValue {
                tag: TiffTag::SamplesPerPixel.name(),
                message: format!("{} (expected 1)", samples),
            },
            ValidationError::UnsupportedBitDepth { bits, .. } => TiffError::InvalidTagValue {
                tag: TiffTag::BitsPerSample.name(),
                message: format!("{} (expected 16)", bits),
            },
            ValidationError::UnsupportedSampleFormat { format, .. } => TiffError::InvalidTagValue {
                tag: TiffTag::SampleFormat.name(),
                message: format!("{} (expected 1)", format),
            },
        }
    }
}

// =============================================================================
// Page Validation
// =============================================================================

/// Check that a page holds 16-bit unsigned single-band strips in a
/// compression the strip codecs decode.
pub fn validate_page(ifd: &Ifd, metadata: &PageMetadata, page: usize) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if ifd.is_tiled() {
        result.add_error(ValidationError::TiledOrganization { page });
        return result;
    }

    let compression = metadata.compression_or_default();
    let codec = Compression::from_u16(compression).filter(|c| c.is_supported());
    if codec.is_none() {
        result.add_error(ValidationError::UnsupportedCompression {
            page,
            compression,
            compression_name: Compression::describe(compression),
        });
    }

    let predictor = metadata.predictor_or_default();
    if predictor != PREDICTOR_NONE && predictor != PREDICTOR_HORIZONTAL {
        result.add_error(ValidationError::UnsupportedPredictor { page, predictor });
    }

    let samples = metadata.samples_per_pixel_or_default();
    if samples != 1 {
        result.add_error(ValidationError::UnsupportedBandCount { page, samples });
    }

    let bits = metadata.bits_per_sample_or_default();
    if bits != 16 {
        result.add_error(ValidationError::UnsupportedBitDepth { page, bits });
    }

    let format = metadata.sample_format_or_default();
    if format != SAMPLE_FORMAT_UINT {
        result.add_error(ValidationError::UnsupportedSampleFormat { page, format });
    }

    if metadata.height_or_default() > 0 && !ifd.is_stripped() {
        result.add_error(ValidationError::MissingStrips { page });
    }

    if ifd.is_stripped() && ifd.get_entry_by_tag(TiffTag::StripByteCounts).is_none() {
        match codec {
            Some(Compression::None) => result.add_warning(format!(
                "page {}: no StripByteCounts, assuming uncompressed strip sizes",
                page
            )),
            Some(_) => result.add_error(ValidationError::MissingByteCounts { page }),
            None => {}
        }
    }

    match metadata.photometric {
        Some(PHOTOMETRIC_BLACK_IS_ZERO) | None => {}
        Some(PHOTOMETRIC_WHITE_IS_ZERO) => result.add_warning(format!(
            "page {}: WhiteIsZero photometric, samples are loaded without inversion",
            page
        )),
        Some(other) => result.add_warning(format!(
            "page {}: photometric interpretation {} treated as grayscale",
            page, other
        )),
    }

    if metadata.width_or_default() == 0 || metadata.height_or_default() == 0 {
        result.add_warning(format!(
            "page {}: empty image ({}x{})",
            page,
            metadata.width_or_default(),
            metadata.height_or_default()
        ));
    }

    result
}

// =============================================================================
// Tests
// =============================================================================
