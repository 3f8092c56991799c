//! Per-page metadata extraction.
//!
//! Every field is optional. A tag missing from the directory, or one whose
//! value cannot be read, is recorded as `None`; the accessors fall back to
//! the TIFF 6.0 defaults.

use tracing::debug;

use crate::io::RangeReader;

use super::parser::Ifd;
use super::tags::TiffTag;
use super::values::ValueReader;

/// SampleFormat value for unsigned integer data
pub const SAMPLE_FORMAT_UINT: u16 = 1;

/// PlanarConfiguration value for interleaved samples
pub const PLANAR_CONFIG_CHUNKY: u16 = 1;

/// PlanarConfiguration value for separate sample planes
pub const PLANAR_CONFIG_PLANAR: u16 = 2;

/// Compression value for uncompressed data
pub const COMPRESSION_NONE: u16 = 1;

/// Predictor value for samples stored as-is
pub const PREDICTOR_NONE: u16 = 1;

/// Predictor value for horizontal differencing
pub const PREDICTOR_HORIZONTAL: u16 = 2;

/// Format and geometry attributes of one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub samples_per_pixel: Option<u16>,
    pub bits_per_sample: Option<u16>,
    pub sample_format: Option<u16>,
    pub photometric: Option<u16>,
    /// (page index, total pages) as written by the producer
    pub page_number: Option<(u16, u16)>,
    pub planar_config: Option<u16>,
    pub compression: Option<u16>,
    pub rows_per_strip: Option<u32>,
    pub predictor: Option<u16>,
    pub description: Option<String>,
}

impl PageMetadata {
    /// Read all known fields from `ifd`.
    pub fn from_ifd<R: RangeReader>(ifd: &Ifd, values: &ValueReader<'_, R>) -> Self {
        let page_number = read_u16s(ifd, values, TiffTag::PageNumber).and_then(|parts| {
            match parts.as_slice() {
                [index, total, ..] => Some((*index, *total)),
                _ => None,
            }
        });

        let description = ifd
            .get_entry_by_tag(TiffTag::ImageDescription)
            .and_then(|entry| match values.read_string(entry) {
                Ok(s) => Some(s),
                Err(e) => {
                    debug!("Ignoring unreadable ImageDescription: {}", e);
                    None
                }
            });

        PageMetadata {
            width: read_first(ifd, values, TiffTag::ImageWidth).and_then(to_u32),
            height: read_first(ifd, values, TiffTag::ImageLength).and_then(to_u32),
            samples_per_pixel: read_first(ifd, values, TiffTag::SamplesPerPixel).and_then(to_u16),
            bits_per_sample: read_first(ifd, values, TiffTag::BitsPerSample).and_then(to_u16),
            sample_format: read_first(ifd, values, TiffTag::SampleFormat).and_then(to_u16),
            photometric: read_first(ifd, values, TiffTag::PhotometricInterpretation)
                .and_then(to_u16),
            page_number,
            planar_config: read_first(ifd, values, TiffTag::PlanarConfiguration).and_then(to_u16),
            compression: read_first(ifd, values, TiffTag::Compression).and_then(to_u16),
            rows_per_strip: read_first(ifd, values, TiffTag::RowsPerStrip).and_then(to_u32),
            predictor: read_first(ifd, values, TiffTag::Predictor).and_then(to_u16),
            description,
        }
    }

    pub fn width_or_default(&self) -> u32 {
        self.width.unwrap_or(0)
    }

    pub fn height_or_default(&self) -> u32 {
        self.height.unwrap_or(0)
    }

    pub fn samples_per_pixel_or_default(&self) -> u16 {
        self.samples_per_pixel.unwrap_or(1)
    }

    pub fn bits_per_sample_or_default(&self) -> u16 {
        self.bits_per_sample.unwrap_or(1)
    }

    pub fn sample_format_or_default(&self) -> u16 {
        self.sample_format.unwrap_or(SAMPLE_FORMAT_UINT)
    }

    pub fn planar_config_or_default(&self) -> u16 {
        self.planar_config.unwrap_or(PLANAR_CONFIG_CHUNKY)
    }

    pub fn compression_or_default(&self) -> u16 {
        self.compression.unwrap_or(COMPRESSION_NONE)
    }

    pub fn predictor_or_default(&self) -> u16 {
        self.predictor.unwrap_or(PREDICTOR_NONE)
    }

    /// Rows per strip; absent means the whole image is one strip.
    pub fn rows_per_strip_or_default(&self) -> u32 {
        match self.rows_per_strip {
            Some(0) | None => self.height_or_default().max(1),
            Some(rows) => rows,
        }
    }

    /// Bytes in one decoded scanline of one sample plane (or all
    /// interleaved samples for chunky data).
    pub fn scanline_size(&self) -> usize {
        let samples = if self.planar_config_or_default() == PLANAR_CONFIG_PLANAR {
            1
        } else {
            self.samples_per_pixel_or_default() as u64
        };
        let bits = self.width_or_default() as u64 * samples * self.bits_per_sample_or_default() as u64;
        bits.div_ceil(8) as usize
    }

    /// The record as tag name -> optional numeric value, in dump order.
    pub fn fields(&self) -> Vec<(&'static str, Option<u64>)> {
        vec![
            ("Width", self.width.map(u64::from)),
            ("Height", self.height.map(u64::from)),
            ("Bands", self.samples_per_pixel.map(u64::from)),
            ("BitsPerSample", self.bits_per_sample.map(u64::from)),
            ("SampleFormat", self.sample_format.map(u64::from)),
            ("Photometric", self.photometric.map(u64::from)),
            ("Page Number 1", self.page_number.map(|(n, _)| u64::from(n))),
            ("Page Number 2", self.page_number.map(|(_, n)| u64::from(n))),
            ("Image Length", self.height.map(u64::from)),
            ("Planar Config", self.planar_config.map(u64::from)),
            ("Compression", self.compression.map(u64::from)),
            ("RowsPerStrip", self.rows_per_strip.map(u64::from)),
            ("Predictor", self.predictor.map(u64::from)),
        ]
    }
}

fn read_first<R: RangeReader>(ifd: &Ifd, values: &ValueReader<'_, R>, tag: TiffTag) -> Option<u64> {
    let entry = ifd.get_entry_by_tag(tag)?;
    if let Some(value) = entry.inline_u64(values.byte_order()) {
        return Some(value);
    }

    // Per-sample tags (BitsPerSample, SampleFormat) may hold one value per band
    match values.read_u64_array(entry) {
        Ok(array) => array.first().copied(),
        Err(e) => {
            debug!("Ignoring unreadable {}: {}", tag.name(), e);
            None
        }
    }
}

fn read_u16s<R: RangeReader>(
    ifd: &Ifd,
    values: &ValueReader<'_, R>,
    tag: TiffTag,
) -> Option<Vec<u16>> {
    let entry = ifd.get_entry_by_tag(tag)?;
    match values.read_u16_array(entry) {
        Ok(array) => Some(array),
        Err(e) => {
            debug!("Ignoring unreadable {}: {}", tag.name(), e);
            None
        }
    }
}

fn to_u32(value: u64) -> Option<u32> {
    u32::try_from(value).ok()
}

fn to_u16(value: u64) -> Option<u16> {
    u16::try_from(value).ok()
}
