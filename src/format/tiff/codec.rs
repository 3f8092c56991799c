//! Strip codecs.
//!
//! A compressed strip is inflated whole, then the horizontal predictor (if
//! any) is undone row by row. The result is the same byte stream an
//! uncompressed strip would hold, so scanlines are sliced out of it the same
//! way.
//!
//! # Schemes
//!
//! - **LZW** (5): MSB-first codes with the early size switch, via `weezl`
//! - **Deflate** (8, 32946): zlib streams, via `miniz_oxide`
//! - **PackBits** (32773): byte-oriented run length

use miniz_oxide::inflate::{decompress_to_vec_zlib_with_limit, TINFLStatus};
use weezl::{decode::Decoder as LzwDecoder, BitOrder};

use crate::error::TiffError;

use super::metadata::{PageMetadata, PREDICTOR_HORIZONTAL, PREDICTOR_NONE};
use super::parser::ByteOrder;
use super::tags::Compression;

/// How the strips of one directory are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripCodec {
    pub compression: Compression,
    pub predictor: u16,
    pub byte_order: ByteOrder,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
}

impl StripCodec {
    /// Raw strips with no predictor.
    pub fn uncompressed(byte_order: ByteOrder, bits_per_sample: u16) -> Self {
        Self {
            compression: Compression::None,
            predictor: PREDICTOR_NONE,
            byte_order,
            bits_per_sample,
            samples_per_pixel: 1,
        }
    }

    /// Codec of a directory described by `metadata`.
    pub fn from_metadata(metadata: &PageMetadata, byte_order: ByteOrder) -> Result<Self, TiffError> {
        let raw = metadata.compression_or_default();
        let compression = Compression::from_u16(raw)
            .filter(|c| c.is_supported())
            .ok_or_else(|| TiffError::UnsupportedCompression(Compression::describe(raw)))?;

        let predictor = metadata.predictor_or_default();
        if predictor != PREDICTOR_NONE && predictor != PREDICTOR_HORIZONTAL {
            return Err(TiffError::UnsupportedPredictor(predictor));
        }

        Ok(Self {
            compression,
            predictor,
            byte_order,
            bits_per_sample: metadata.bits_per_sample_or_default(),
            samples_per_pixel: metadata.samples_per_pixel_or_default(),
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.compression != Compression::None
    }

    /// Inflate strip `strip` and undo its predictor.
    ///
    /// The result holds at most `expected` bytes. A shorter result means the
    /// encoded data ran out early; the caller decides which rows that
    /// costs.
    pub fn decode_strip(
        &self,
        strip: usize,
        encoded: &[u8],
        expected: usize,
        scanline_size: usize,
    ) -> Result<Vec<u8>, TiffError> {
        let mut decoded = match self.compression {
            Compression::None => encoded.to_vec(),
            Compression::Lzw => self.inflate_lzw(strip, encoded)?,
            Compression::Deflate | Compression::AdobeDeflate => {
                self.inflate_zlib(strip, encoded, expected)?
            }
            Compression::PackBits => unpack_bits(encoded, expected),
            other => return Err(TiffError::UnsupportedCompression(other.name().to_string())),
        };
        decoded.truncate(expected);

        // Predictors only apply to the LZW and Deflate codecs
        let predicted = matches!(
            self.compression,
            Compression::Lzw | Compression::Deflate | Compression::AdobeDeflate
        );
        if predicted && self.predictor == PREDICTOR_HORIZONTAL {
            self.undo_horizontal_predictor(&mut decoded, scanline_size)?;
        }
        Ok(decoded)
    }

    fn inflate_lzw(&self, strip: usize, encoded: &[u8]) -> Result<Vec<u8>, TiffError> {
        LzwDecoder::with_tiff_size_switch(BitOrder::Msb, 8)
            .decode(encoded)
            .map_err(|e| TiffError::Decompress {
                strip,
                compression: self.compression.name(),
                message: e.to_string(),
            })
    }

    fn inflate_zlib(
        &self,
        strip: usize,
        encoded: &[u8],
        expected: usize,
    ) -> Result<Vec<u8>, TiffError> {
        match decompress_to_vec_zlib_with_limit(encoded, expected) {
            Ok(decoded) => Ok(decoded),
            // Trailing output past the strip is ignored
            Err(e) if e.status == TINFLStatus::HasMoreOutput => Ok(e.output),
            Err(e) => Err(TiffError::Decompress {
                strip,
                compression: self.compression.name(),
                message: format!("{:?}", e.status),
            }),
        }
    }

    /// Replace each sample by the running sum of the differences along its
    /// row. Samples are read and written in the file's byte order.
    fn undo_horizontal_predictor(
        &self,
        decoded: &mut [u8],
        scanline_size: usize,
    ) -> Result<(), TiffError> {
        if scanline_size == 0 {
            return Ok(());
        }
        let stride = self.samples_per_pixel.max(1) as usize;

        match self.bits_per_sample {
            8 => {
                for row in decoded.chunks_exact_mut(scanline_size) {
                    for i in stride..row.len() {
                        row[i] = row[i].wrapping_add(row[i - stride]);
                    }
                }
            }
            16 => {
                let order = self.byte_order;
                for row in decoded.chunks_exact_mut(scanline_size) {
                    let samples = row.len() / 2;
                    for i in stride..samples {
                        let prev = order.read_u16(&row[(i - stride) * 2..]);
                        let diff = order.read_u16(&row[i * 2..]);
                        order.write_u16(diff.wrapping_add(prev), &mut row[i * 2..]);
                    }
                }
            }
            bits => {
                return Err(TiffError::InvalidTagValue {
                    tag: "Predictor",
                    message: format!("horizontal differencing on {}-bit samples", bits),
                })
            }
        }
        Ok(())
    }
}

/// Expand a PackBits run-length stream, stopping at `expected` bytes.
///
/// Header byte `n`: 0..=127 copies the next `n + 1` bytes, -127..=-1
/// repeats the next byte `1 - n` times, -128 is a no-op.
fn unpack_bits(encoded: &[u8], expected: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected);
    let mut pos = 0;

    while pos < encoded.len() && out.len() < expected {
        let header = encoded[pos] as i8;
        pos += 1;

        match header {
            0..=127 => {
                let end = (pos + header as usize + 1).min(encoded.len());
                out.extend_from_slice(&encoded[pos..end]);
                pos = end;
            }
            -128 => {}
            _ => {
                if let Some(&byte) = encoded.get(pos) {
                    let run = (1 - header as i16) as usize;
                    out.resize(out.len() + run, byte);
                    pos += 1;
                }
            }
        }
    }

    out.truncate(expected);
    out
}
