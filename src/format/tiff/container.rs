//! Open TIFF container with a directory cursor.
//!
//! The container walks the next-IFD chain lazily. Offsets of directories
//! already visited are remembered, so stepping back to an earlier page is a
//! single IFD read and a chain that points back into itself is detected.

use tracing::{debug, warn};

use crate::error::TiffError;
use crate::io::RangeReader;

use super::metadata::PageMetadata;
use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::strips::StripLayout;
use super::values::ValueReader;

/// Default cap on the number of directories followed
pub const DEFAULT_MAX_DIRECTORIES: usize = u16::MAX as usize;

/// An open TIFF file positioned on one directory.
pub struct TiffContainer<R: RangeReader> {
    reader: R,
    header: TiffHeader,

    /// Offsets of every directory discovered so far, in chain order
    directory_offsets: Vec<u64>,

    current_index: usize,
    current: Ifd,

    /// Strip layout of the current directory, built on first scanline read
    layout: Option<StripLayout>,

    max_directories: usize,
}

impl<R: RangeReader> TiffContainer<R> {
    /// Parse the header and the first directory.
    pub fn open(reader: R) -> Result<Self, TiffError> {
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
        let header_bytes = reader.read_exact_at(0, header_len)?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let first = read_ifd_at(&reader, &header, header.first_ifd_offset)?;

        debug!(
            "Opened {} ({}, {:?}, first directory at {})",
            reader.identifier(),
            if header.is_bigtiff { "BigTIFF" } else { "TIFF" },
            header.byte_order,
            header.first_ifd_offset
        );

        Ok(Self {
            directory_offsets: vec![header.first_ifd_offset],
            current_index: 0,
            current: first,
            layout: None,
            max_directories: DEFAULT_MAX_DIRECTORIES,
            reader,
            header,
        })
    }

    /// Limit how many directories the chain walk will follow (at least 1).
    pub fn with_max_directories(mut self, max: usize) -> Self {
        self.max_directories = max.max(1);
        self
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn value_reader(&self) -> ValueReader<'_, R> {
        ValueReader::new(&self.reader, &self.header)
    }

    /// Index of the directory the cursor is on (0-based).
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_directory(&self) -> &Ifd {
        &self.current
    }

    /// Advance the cursor to the next directory.
    ///
    /// Returns `Ok(false)` at the end of the chain, when the chain loops
    /// back to a directory already seen, or when the directory limit is
    /// reached. The cursor is left where it was in those cases.
    pub fn read_directory(&mut self) -> Result<bool, TiffError> {
        let next_index = self.current_index + 1;

        let offset = match self.directory_offsets.get(next_index) {
            Some(&known) => known,
            None => {
                let next = self.current.next_ifd_offset;
                if next == 0 {
                    return Ok(false);
                }
                if self.directory_offsets.contains(&next) {
                    warn!(
                        "{}: directory {} links back to offset {}, stopping",
                        self.reader.identifier(),
                        self.current_index,
                        next
                    );
                    return Ok(false);
                }
                if self.directory_offsets.len() >= self.max_directories {
                    warn!(
                        "{}: stopping after {} directories",
                        self.reader.identifier(),
                        self.max_directories
                    );
                    return Ok(false);
                }
                next
            }
        };

        let ifd = read_ifd_at(&self.reader, &self.header, offset)?;
        if next_index == self.directory_offsets.len() {
            self.directory_offsets.push(offset);
        }
        self.move_to(next_index, ifd);
        Ok(true)
    }

    /// Position the cursor on directory `index`, walking the chain forward
    /// if it has not been discovered yet.
    pub fn set_directory(&mut self, index: usize) -> Result<(), TiffError> {
        if let Some(&offset) = self.directory_offsets.get(index) {
            if index != self.current_index {
                let ifd = read_ifd_at(&self.reader, &self.header, offset)?;
                self.move_to(index, ifd);
            }
            return Ok(());
        }

        let last = self.directory_offsets.len() - 1;
        self.set_directory(last)?;
        while self.current_index < index {
            if !self.read_directory()? {
                return Err(TiffError::NoSuchDirectory {
                    index,
                    count: self.directory_offsets.len(),
                });
            }
        }
        Ok(())
    }

    /// Count every directory in the chain, then return the cursor to the
    /// first one.
    ///
    /// A directory that fails to parse ends the count.
    pub fn count_directories(&mut self) -> Result<usize, TiffError> {
        self.set_directory(0)?;
        let mut count = 1;
        loop {
            match self.read_directory() {
                Ok(true) => count += 1,
                Ok(false) => break,
                Err(e) => {
                    warn!(
                        "{}: unreadable directory after page {}: {}",
                        self.reader.identifier(),
                        count,
                        e
                    );
                    break;
                }
            }
        }
        self.set_directory(0)?;
        Ok(count)
    }

    /// Metadata of the current directory.
    pub fn metadata(&self) -> PageMetadata {
        PageMetadata::from_ifd(&self.current, &self.value_reader())
    }

    /// Strip layout of the current directory.
    pub fn strip_layout(&mut self) -> Result<&StripLayout, TiffError> {
        if self.layout.is_none() {
            let metadata = self.metadata();
            let layout = StripLayout::from_ifd(&self.current, &self.value_reader(), &metadata)?;
            self.layout = Some(layout);
        }
        match &self.layout {
            Some(layout) => Ok(layout),
            None => Err(TiffError::MissingTag("StripOffsets")),
        }
    }

    /// Size in bytes of one scanline of the current directory.
    pub fn scanline_size(&self) -> usize {
        match &self.layout {
            Some(layout) => layout.scanline_size,
            None => self.metadata().scanline_size(),
        }
    }

    /// Read scanline `row` of the current directory into `buf`.
    pub fn read_scanline(&mut self, row: u32, buf: &mut [u8]) -> Result<(), TiffError> {
        self.strip_layout()?;
        match &mut self.layout {
            Some(layout) => layout.read_scanline(&self.reader, row, buf),
            None => Err(TiffError::MissingTag("StripOffsets")),
        }
    }

    fn move_to(&mut self, index: usize, ifd: Ifd) {
        self.current_index = index;
        self.current = ifd;
        self.layout = None;
    }
}

impl<R: RangeReader> Drop for TiffContainer<R> {
    fn drop(&mut self) {
        debug!(
            "Closing {} after {} directories",
            self.reader.identifier(),
            self.directory_offsets.len()
        );
    }
}

/// Read the IFD at `offset`: entry count first, then the whole directory.
fn read_ifd_at<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    offset: u64,
) -> Result<Ifd, TiffError> {
    let count_size = header.ifd_count_size();
    if offset == 0 || offset.saturating_add(count_size as u64) > reader.size() {
        return Err(TiffError::InvalidIfdOffset(offset));
    }

    let count_bytes = reader.read_exact_at(offset, count_size)?;
    let entry_count = header.read_entry_count(&count_bytes);

    let max_entries = reader.size().saturating_sub(offset) / header.ifd_entry_size() as u64;
    if entry_count > max_entries {
        return Err(TiffError::InvalidIfdOffset(offset));
    }

    let ifd_size = Ifd::calculate_size(entry_count, header);
    let ifd_bytes = reader.read_exact_at(offset, ifd_size)?;
    Ifd::parse(&ifd_bytes, header)
}
