//! Strip layout and scanline reads.
//!
//! A decoded strip is `rows_per_strip` scanlines laid end to end, so row `r`
//! lives in strip `r / rows_per_strip` at byte
//! `(r % rows_per_strip) * scanline_size`. Uncompressed scanlines are read
//! straight from the file at that position. Compressed strips are decoded
//! whole on first use and the most recent one is kept for the rows that
//! follow.

use crate::error::TiffError;
use crate::io::RangeReader;

use super::codec::StripCodec;
use super::metadata::PageMetadata;
use super::parser::Ifd;
use super::tags::TiffTag;
use super::values::ValueReader;

/// Where each scanline of one directory lives in the file.
#[derive(Debug, Clone)]
pub struct StripLayout {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub rows_per_strip: u32,
    pub scanline_size: usize,
    pub height: u32,
    pub codec: StripCodec,

    /// Last decoded strip: (index, bytes)
    decoded: Option<(usize, Vec<u8>)>,
}

impl StripLayout {
    /// Build the layout of `ifd` from its strip tags.
    ///
    /// A missing StripByteCounts tag is filled with the uncompressed size of
    /// each strip. Compressed strips must list their byte counts.
    pub fn from_ifd<R: RangeReader>(
        ifd: &Ifd,
        values: &ValueReader<'_, R>,
        metadata: &PageMetadata,
    ) -> Result<Self, TiffError> {
        let height = metadata.height_or_default();
        let rows_per_strip = metadata.rows_per_strip_or_default();
        let scanline_size = metadata.scanline_size();
        let codec = StripCodec::from_metadata(metadata, values.byte_order())?;

        if height == 0 {
            return Ok(Self {
                offsets: Vec::new(),
                byte_counts: Vec::new(),
                rows_per_strip,
                scanline_size,
                height,
                codec,
                decoded: None,
            });
        }

        let offsets = match ifd.get_entry_by_tag(TiffTag::StripOffsets) {
            Some(entry) => values.read_u64_array(entry)?,
            None => return Err(TiffError::MissingTag("StripOffsets")),
        };

        let strips_needed = height.div_ceil(rows_per_strip) as usize;
        if offsets.len() < strips_needed {
            return Err(TiffError::InvalidTagValue {
                tag: "StripOffsets",
                message: format!(
                    "{} strips listed, {} rows at {} rows per strip need {}",
                    offsets.len(),
                    height,
                    rows_per_strip,
                    strips_needed
                ),
            });
        }

        let byte_counts = match ifd.get_entry_by_tag(TiffTag::StripByteCounts) {
            Some(entry) => values.read_u64_array(entry)?,
            None if codec.is_compressed() => return Err(TiffError::MissingTag("StripByteCounts")),
            None => (0..offsets.len())
                .map(|strip| rows_in_strip(strip, rows_per_strip, height) * scanline_size as u64)
                .collect(),
        };

        Ok(Self {
            offsets,
            byte_counts,
            rows_per_strip,
            scanline_size,
            height,
            codec,
            decoded: None,
        })
    }

    /// Strip holding `row` and the byte range of the row within the decoded
    /// strip.
    fn locate(&self, row: u32) -> Result<(usize, u64, u64), TiffError> {
        if row >= self.height {
            return Err(TiffError::RowOutOfRange {
                row,
                height: self.height,
            });
        }

        let strip = (row / self.rows_per_strip) as usize;
        let start = (row % self.rows_per_strip) as u64 * self.scanline_size as u64;
        Ok((strip, start, start + self.scanline_size as u64))
    }

    /// File offset of `row` in an uncompressed strip, checked against the
    /// strip's byte count.
    pub fn scanline_offset(&self, row: u32) -> Result<u64, TiffError> {
        let (strip, start, end) = self.locate(row)?;

        let offset = self
            .offsets
            .get(strip)
            .copied()
            .ok_or(TiffError::MissingTag("StripOffsets"))?;
        let byte_count = self.byte_counts.get(strip).copied().unwrap_or(0);

        if end > byte_count {
            return Err(TiffError::TruncatedStrip {
                strip,
                start,
                end,
                byte_count,
            });
        }

        Ok(offset + start)
    }

    /// Read scanline `row` into the front of `buf`.
    pub fn read_scanline<R: RangeReader>(
        &mut self,
        reader: &R,
        row: u32,
        buf: &mut [u8],
    ) -> Result<(), TiffError> {
        if buf.len() < self.scanline_size {
            return Err(TiffError::BufferTooSmall {
                required: self.scanline_size,
                actual: buf.len(),
            });
        }

        if !self.codec.is_compressed() {
            let offset = self.scanline_offset(row)?;
            let bytes = reader.read_exact_at(offset, self.scanline_size)?;
            buf[..self.scanline_size].copy_from_slice(&bytes);
            return Ok(());
        }

        let (strip, start, end) = self.locate(row)?;
        let scanline_size = self.scanline_size;
        let decoded = self.decoded_strip(reader, strip)?;
        if end > decoded.len() as u64 {
            return Err(TiffError::TruncatedStrip {
                strip,
                start,
                end,
                byte_count: decoded.len() as u64,
            });
        }
        buf[..scanline_size].copy_from_slice(&decoded[start as usize..end as usize]);
        Ok(())
    }

    /// Decoded bytes of `strip`, decoding it unless it is the cached one.
    fn decoded_strip<R: RangeReader>(&mut self, reader: &R, strip: usize) -> Result<&[u8], TiffError> {
        let cached = matches!(&self.decoded, Some((index, _)) if *index == strip);
        if !cached {
            let offset = self
                .offsets
                .get(strip)
                .copied()
                .ok_or(TiffError::MissingTag("StripOffsets"))?;
            let byte_count = self
                .byte_counts
                .get(strip)
                .copied()
                .ok_or(TiffError::MissingTag("StripByteCounts"))?;

            let encoded = reader.read_exact_at(offset, byte_count as usize)?;
            let expected = rows_in_strip(strip, self.rows_per_strip, self.height) as usize
                * self.scanline_size;
            let decoded = self
                .codec
                .decode_strip(strip, &encoded, expected, self.scanline_size)?;
            self.decoded = Some((strip, decoded));
        }

        match &self.decoded {
            Some((_, bytes)) => Ok(bytes),
            None => Err(TiffError::MissingTag("StripOffsets")),
        }
    }
}

/// Rows stored in `strip`; the last strip may be short.
fn rows_in_strip(strip: usize, rows_per_strip: u32, height: u32) -> u64 {
    let first_row = strip as u64 * rows_per_strip as u64;
    (height as u64).saturating_sub(first_row).min(rows_per_strip as u64)
}
