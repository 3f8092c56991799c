//! Test utilities for integration tests.
//!
//! [`TiffBuilder`] writes multi-page strip TIFFs in either byte order, classic
//! or BigTIFF, with per-page control over the tags that matter to the loader.
//! Strips can be written raw, LZW, Deflate or PackBits encoded, optionally
//! after horizontal differencing.

use std::io::Write;

use tempfile::NamedTempFile;
use weezl::{encode::Encoder as LzwEncoder, BitOrder};

// =============================================================================
// Field Types
// =============================================================================

const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const LONG8: u16 = 16;

fn field_type_size(field_type: u16) -> usize {
    match field_type {
        1 | 2 | 7 => 1,
        3 => 2,
        4 => 4,
        16 => 8,
        _ => 1,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

fn write_value(data: &mut Vec<u8>, byte_order: ByteOrderType, value: u64, size: usize) {
    match (size, byte_order) {
        (1, _) => data.push(value as u8),
        (2, ByteOrderType::LittleEndian) => data.extend((value as u16).to_le_bytes()),
        (2, ByteOrderType::BigEndian) => data.extend((value as u16).to_be_bytes()),
        (4, ByteOrderType::LittleEndian) => data.extend((value as u32).to_le_bytes()),
        (4, ByteOrderType::BigEndian) => data.extend((value as u32).to_be_bytes()),
        (8, ByteOrderType::LittleEndian) => data.extend(value.to_le_bytes()),
        (8, ByteOrderType::BigEndian) => data.extend(value.to_be_bytes()),
        _ => unreachable!("unsupported value size {}", size),
    }
}

// =============================================================================
// Page Description
// =============================================================================

/// One page (directory) of a test TIFF.
#[derive(Clone, Debug)]
pub struct TestPage {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub sample_format: Option<u16>,
    pub photometric: Option<u16>,
    pub compression: Option<u16>,
    pub predictor: Option<u16>,
    pub rows_per_strip: u32,
    pub page_number: Option<(u16, u16)>,
    pub description: Option<String>,

    /// Adds TileWidth/TileLength tags to mark the page as tiled
    pub tiled: bool,

    /// Skip the BitsPerSample tag
    pub omit_bits_per_sample: bool,

    /// Skip the StripByteCounts tag
    pub omit_byte_counts: bool,

    /// Replace every StripByteCounts value
    pub byte_count_override: Option<u64>,

    /// Row-major samples, `width * height * samples_per_pixel` of them
    pub samples: Vec<u16>,
}

impl TestPage {
    /// 16-bit grayscale page from row-major samples.
    pub fn gray16(width: u32, height: u32, samples: Vec<u16>) -> Self {
        assert_eq!(samples.len(), (width * height) as usize);
        Self {
            width,
            height,
            bits_per_sample: 16,
            samples_per_pixel: 1,
            sample_format: Some(1),
            photometric: Some(1),
            compression: Some(1),
            predictor: None,
            rows_per_strip: height.max(1),
            page_number: None,
            description: None,
            tiled: false,
            omit_bits_per_sample: false,
            omit_byte_counts: false,
            byte_count_override: None,
            samples,
        }
    }

    /// Page whose pixel (r, c) holds `(r * width + c) % 65536`.
    pub fn pattern(width: u32, height: u32) -> Self {
        Self::gray16(width, height, pattern_samples(width, height))
    }

    /// Page with every pixel set to `value`.
    pub fn constant(width: u32, height: u32, value: u16) -> Self {
        Self::gray16(width, height, vec![value; (width * height) as usize])
    }

    pub fn with_rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = rows;
        self
    }

    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_predictor(mut self, predictor: u16) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_page_number(mut self, index: u16, total: u16) -> Self {
        self.page_number = Some((index, total));
        self
    }

    fn scanline_size(&self) -> usize {
        let bits = self.width as usize * self.samples_per_pixel as usize * self.bits_per_sample as usize;
        bits.div_ceil(8)
    }

    fn pixel_bytes(&self, byte_order: ByteOrderType) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for &sample in &self.samples {
            match self.bits_per_sample {
                8 => out.push(sample as u8),
                _ => write_value(&mut out, byte_order, sample as u64, 2),
            }
        }
        out
    }

    fn strip_count(&self) -> usize {
        (self.height.div_ceil(self.rows_per_strip.max(1))) as usize
    }

    /// Each strip as written to the file: differenced, then compressed.
    fn encoded_strips(&self, byte_order: ByteOrderType) -> Vec<Vec<u8>> {
        let raw = self.pixel_bytes(byte_order);
        let scanline = self.scanline_size();
        let strip_size = self.rows_per_strip.max(1) as usize * scanline;

        (0..self.strip_count())
            .map(|strip| {
                let start = (strip * strip_size).min(raw.len());
                let end = (start + strip_size).min(raw.len());
                let mut data = raw[start..end].to_vec();
                if self.predictor == Some(2) {
                    difference_rows(&mut data, scanline, self.bits_per_sample, byte_order);
                }
                match self.compression {
                    Some(5) => LzwEncoder::with_tiff_size_switch(BitOrder::Msb, 8)
                        .encode(&data)
                        .expect("LZW encode"),
                    Some(8) | Some(32946) => miniz_oxide::deflate::compress_to_vec_zlib(&data, 6),
                    Some(32773) => pack_bits(&data),
                    _ => data,
                }
            })
            .collect()
    }

    fn strip_byte_counts(&self, byte_order: ByteOrderType) -> Vec<u64> {
        self.encoded_strips(byte_order)
            .iter()
            .map(|strip| self.byte_count_override.unwrap_or(strip.len() as u64))
            .collect()
    }
}

/// Horizontal differencing, applied right to left along each row.
fn difference_rows(data: &mut [u8], scanline: usize, bits: u16, byte_order: ByteOrderType) {
    for row in data.chunks_exact_mut(scanline) {
        match bits {
            16 => {
                let read = |b: &[u8]| match byte_order {
                    ByteOrderType::LittleEndian => u16::from_le_bytes([b[0], b[1]]),
                    ByteOrderType::BigEndian => u16::from_be_bytes([b[0], b[1]]),
                };
                for i in (1..row.len() / 2).rev() {
                    let diff = read(&row[i * 2..]).wrapping_sub(read(&row[(i - 1) * 2..]));
                    let bytes = match byte_order {
                        ByteOrderType::LittleEndian => diff.to_le_bytes(),
                        ByteOrderType::BigEndian => diff.to_be_bytes(),
                    };
                    row[i * 2..i * 2 + 2].copy_from_slice(&bytes);
                }
            }
            _ => {
                for i in (1..row.len()).rev() {
                    row[i] = row[i].wrapping_sub(row[i - 1]);
                }
            }
        }
    }
}

/// PackBits encoder: runs of two or more equal bytes become repeat packets,
/// everything else literal packets of up to 128 bytes.
fn pack_bits(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let mut run = 1;
        while i + run < data.len() && run < 128 && data[i + run] == data[i] {
            run += 1;
        }

        if run >= 2 {
            out.push((1 - run as i16) as u8);
            out.push(data[i]);
            i += run;
        } else {
            let start = i;
            i += 1;
            while i < data.len() && i - start < 128 && !(i + 1 < data.len() && data[i] == data[i + 1])
            {
                i += 1;
            }
            out.push((i - start - 1) as u8);
            out.extend_from_slice(&data[start..i]);
        }
    }
    out
}

/// Samples of [`TestPage::pattern`].
pub fn pattern_samples(width: u32, height: u32) -> Vec<u16> {
    (0..height)
        .flat_map(|r| (0..width).map(move |c| ((r * width + c) % 65536) as u16))
        .collect()
}

// =============================================================================
// TIFF Builder
// =============================================================================

struct Entry {
    tag: u16,
    field_type: u16,
    values: EntryValues,
}

enum EntryValues {
    Numbers(Vec<u64>),
    Ascii(Vec<u8>),
    StripOffsets(usize),
}

impl Entry {
    fn count(&self) -> usize {
        match &self.values {
            EntryValues::Numbers(v) => v.len(),
            EntryValues::Ascii(bytes) => bytes.len(),
            EntryValues::StripOffsets(n) => *n,
        }
    }

    fn byte_size(&self) -> usize {
        self.count() * field_type_size(self.field_type)
    }
}

/// Builds multi-page strip TIFF files.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    is_bigtiff: bool,
    link_last_to_first: bool,
    pages: Vec<TestPage>,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            is_bigtiff: false,
            link_last_to_first: false,
            pages: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_bigtiff(mut self, is_bigtiff: bool) -> Self {
        self.is_bigtiff = is_bigtiff;
        self
    }

    /// Point the last directory back at the first one.
    pub fn with_directory_loop(mut self) -> Self {
        self.link_last_to_first = true;
        self
    }

    pub fn add_page(mut self, page: TestPage) -> Self {
        self.pages.push(page);
        self
    }

    /// Build the TIFF file data.
    pub fn build(self) -> Vec<u8> {
        let mut data = Vec::new();

        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend(b"II"),
            ByteOrderType::BigEndian => data.extend(b"MM"),
        }
        if self.is_bigtiff {
            write_value(&mut data, self.byte_order, 43, 2);
            write_value(&mut data, self.byte_order, 8, 2);
            write_value(&mut data, self.byte_order, 0, 2);
        } else {
            write_value(&mut data, self.byte_order, 42, 2);
        }

        // Position of the offset field that must point at the next directory
        let mut link_pos = data.len();
        write_value(&mut data, self.byte_order, 0, self.offset_size());

        let mut first_ifd = 0u64;
        for page in &self.pages {
            let ifd_offset = data.len() as u64;
            if first_ifd == 0 {
                first_ifd = ifd_offset;
            }
            self.patch_offset(&mut data, link_pos, ifd_offset);
            link_pos = self.write_page(&mut data, page);
        }

        if self.link_last_to_first && !self.pages.is_empty() {
            self.patch_offset(&mut data, link_pos, first_ifd);
        }

        data
    }

    fn offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    fn inline_size(&self) -> usize {
        self.offset_size()
    }

    fn offset_type(&self) -> u16 {
        if self.is_bigtiff {
            LONG8
        } else {
            LONG
        }
    }

    fn patch_offset(&self, data: &mut [u8], pos: usize, value: u64) {
        let mut bytes = Vec::new();
        write_value(&mut bytes, self.byte_order, value, self.offset_size());
        data[pos..pos + bytes.len()].copy_from_slice(&bytes);
    }

    fn entries(&self, page: &TestPage) -> Vec<Entry> {
        let short = |tag: u16, value: u64| Entry {
            tag,
            field_type: SHORT,
            values: EntryValues::Numbers(vec![value]),
        };
        let long = |tag: u16, value: u64| Entry {
            tag,
            field_type: LONG,
            values: EntryValues::Numbers(vec![value]),
        };

        let mut entries = vec![long(256, page.width as u64), long(257, page.height as u64)];
        if !page.omit_bits_per_sample {
            entries.push(Entry {
                tag: 258,
                field_type: SHORT,
                values: EntryValues::Numbers(vec![
                    page.bits_per_sample as u64;
                    page.samples_per_pixel as usize
                ]),
            });
        }
        if let Some(compression) = page.compression {
            entries.push(short(259, compression as u64));
        }
        if let Some(predictor) = page.predictor {
            entries.push(short(317, predictor as u64));
        }
        if let Some(photometric) = page.photometric {
            entries.push(short(262, photometric as u64));
        }
        if let Some(description) = &page.description {
            let mut bytes = description.as_bytes().to_vec();
            bytes.push(0);
            entries.push(Entry {
                tag: 270,
                field_type: ASCII,
                values: EntryValues::Ascii(bytes),
            });
        }
        if page.height > 0 {
            entries.push(Entry {
                tag: 273,
                field_type: self.offset_type(),
                values: EntryValues::StripOffsets(page.strip_count()),
            });
        }
        entries.push(short(277, page.samples_per_pixel as u64));
        entries.push(long(278, page.rows_per_strip as u64));
        if page.height > 0 && !page.omit_byte_counts {
            entries.push(Entry {
                tag: 279,
                field_type: self.offset_type(),
                values: EntryValues::Numbers(page.strip_byte_counts(self.byte_order)),
            });
        }
        if let Some((index, total)) = page.page_number {
            entries.push(Entry {
                tag: 297,
                field_type: SHORT,
                values: EntryValues::Numbers(vec![index as u64, total as u64]),
            });
        }
        if page.tiled {
            entries.push(short(322, 16));
            entries.push(short(323, 16));
        }
        if let Some(format) = page.sample_format {
            entries.push(short(339, format as u64));
        }

        entries.sort_by_key(|e| e.tag);
        entries
    }

    /// Write one directory, its out-of-line values and its strips. Returns
    /// the position of the directory's next-offset field.
    fn write_page(&self, data: &mut Vec<u8>, page: &TestPage) -> usize {
        let entries = self.entries(page);
        let (count_size, entry_size) = if self.is_bigtiff { (8, 20) } else { (2, 12) };

        let ifd_start = data.len();
        let ifd_size = count_size + entries.len() * entry_size + self.offset_size();

        // Lay out out-of-line values after the directory, then the pixels
        let mut external_offsets = Vec::with_capacity(entries.len());
        let mut cursor = ifd_start + ifd_size;
        for entry in &entries {
            if entry.byte_size() > self.inline_size() {
                external_offsets.push(Some(cursor as u64));
                cursor += entry.byte_size();
                cursor += cursor % 2;
            } else {
                external_offsets.push(None);
            }
        }
        let pixel_start = cursor as u64;

        let strips = page.encoded_strips(self.byte_order);
        let mut strip_offsets = Vec::with_capacity(strips.len());
        let mut offset = pixel_start;
        for strip in &strips {
            strip_offsets.push(offset);
            offset += strip.len() as u64;
        }

        let value_bytes = |entry: &Entry| -> Vec<u8> {
            let mut out = Vec::new();
            match &entry.values {
                EntryValues::Numbers(values) => {
                    for &v in values {
                        write_value(&mut out, self.byte_order, v, field_type_size(entry.field_type));
                    }
                }
                EntryValues::Ascii(bytes) => out.extend(bytes),
                EntryValues::StripOffsets(_) => {
                    for &v in &strip_offsets {
                        write_value(&mut out, self.byte_order, v, field_type_size(entry.field_type));
                    }
                }
            }
            out
        };

        write_value(data, self.byte_order, entries.len() as u64, count_size);
        let mut external = Vec::new();
        for (entry, external_offset) in entries.iter().zip(&external_offsets) {
            write_value(data, self.byte_order, entry.tag as u64, 2);
            write_value(data, self.byte_order, entry.field_type as u64, 2);
            write_value(data, self.byte_order, entry.count() as u64, self.offset_size());

            let bytes = value_bytes(entry);
            match external_offset {
                Some(offset) => {
                    write_value(data, self.byte_order, *offset, self.offset_size());
                    external.extend(bytes);
                    if external.len() % 2 == 1 {
                        external.push(0);
                    }
                }
                None => {
                    let mut inline = bytes;
                    inline.resize(self.inline_size(), 0);
                    data.extend(inline);
                }
            }
        }

        let next_pos = data.len();
        write_value(data, self.byte_order, 0, self.offset_size());
        data.extend(external);
        debug_assert_eq!(data.len() as u64, pixel_start);
        for strip in strips {
            data.extend(strip);
        }

        // Keep the next directory word aligned
        if data.len() % 2 == 1 {
            data.push(0);
        }
        next_pos
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Files
// =============================================================================

/// Write `data` to a temporary `.tif` file that lives as long as the handle.
pub fn write_temp_tiff(data: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".tif")
        .tempfile()
        .expect("create temp file");
    file.write_all(data).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

/// Three 4x4 pages holding 0, 1000 and 2000.
pub fn create_three_page_stack() -> Vec<u8> {
    TiffBuilder::new()
        .add_page(TestPage::constant(4, 4, 0).with_page_number(0, 3))
        .add_page(TestPage::constant(4, 4, 1000).with_page_number(1, 3))
        .add_page(TestPage::constant(4, 4, 2000).with_page_number(2, 3))
        .build()
}
