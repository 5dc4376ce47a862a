//! The VBF container: an ASCII header followed by addressed, CRC protected blocks.
//!
//! Every block is exposed as a [`Section`], identified by its position in the file.
//! Sections can be swapped in memory and the whole container re-emitted with all
//! checksums recomputed.

mod header;

pub use header::{VbfHeader, FILE_CHECKSUM};

use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use mktemp::Temp;
use tracing::{debug, info, instrument, warn};

use crate::{
    checksum::{crc16_ccitt_false, Crc32},
    error::{format_err, Boundary, Error, Result},
};
use header::find_header_end;

/// Id of the section holding the image resources
pub const IMAGE_SECTION_ID: usize = 1;

// start address + length
const BLOCK_PREFIX_LEN: usize = 8;
const BLOCK_CRC_LEN: usize = 2;

/// One block of the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    address: u32,
    data: Vec<u8>,
}

impl Section {
    /// Creates a section that will be written at `address`
    #[must_use]
    pub const fn new(address: u32, data: Vec<u8>) -> Self {
        Self { address, data }
    }

    /// Target flash address of the block
    #[must_use]
    pub const fn address(&self) -> u32 {
        self.address
    }

    /// Block payload
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// CRC-16 stored after the payload on save
    #[must_use]
    pub fn checksum(&self) -> u16 {
        crc16_ccitt_false(&self.data)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.address.to_be_bytes());
        // lengths are checked when the section enters the container
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.checksum().to_be_bytes());
    }
}

/// A typed representation of a VBF firmware container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbfFile {
    header: VbfHeader,
    sections: Vec<Section>,
    dirty: BTreeSet<usize>,
}

impl VbfFile {
    /// Creates a container from a parsed header and its sections
    ///
    /// # Errors
    ///
    /// This function errors if a section is larger than a block length field can describe
    pub fn new(header: VbfHeader, sections: Vec<Section>) -> Result<Self> {
        for (id, section) in sections.iter().enumerate() {
            check_block_len(id, section.data.len())?;
        }
        Ok(Self {
            header,
            sections,
            dirty: BTreeSet::new(),
        })
    }

    /// Tries to read [`Self`] from a provided file path
    ///
    /// # Errors
    ///
    /// This function will error if the file cannot be read or if it contains invalid data.
    /// See [`Self::from_bytes`] for potential errors
    #[instrument(level = "debug")]
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        info!("read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }

    /// Tries to read [`Self`] from an in-memory image of the file
    ///
    /// # Errors
    ///
    /// This function will error if:
    /// - the header is not terminated or cannot be parsed
    /// - a block is truncated or its CRC does not match
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header_end = find_header_end(bytes)?;
        let text = String::from_utf8(bytes[..header_end].to_vec())
            .map_err(|e| format_err(Boundary::Container, format!("header is not text: {e}")))?;
        let header = VbfHeader::parse(text)?;
        debug!("VBF version {}", header.version());

        let body = &bytes[header_end..];
        let mut sections = Vec::new();
        let mut cursor = 0;
        while cursor < body.len() {
            let id = sections.len();
            let Some(prefix) = body.get(cursor..cursor + BLOCK_PREFIX_LEN) else {
                return Err(format_err(
                    Boundary::Container,
                    format!("block {id} header truncated at offset {cursor}"),
                ));
            };
            let address = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
            let length = u32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;
            let data_start = cursor + BLOCK_PREFIX_LEN;
            let data_end = data_start
                .checked_add(length)
                .filter(|end| end + BLOCK_CRC_LEN <= body.len())
                .ok_or_else(|| {
                    format_err(
                        Boundary::Container,
                        format!("block {id} declares {length} bytes, file is too short"),
                    )
                })?;
            let data = &body[data_start..data_end];
            let stored = u16::from_be_bytes([body[data_end], body[data_end + 1]]);
            let computed = crc16_ccitt_false(data);
            if stored != computed {
                return Err(format_err(
                    Boundary::Container,
                    format!("block {id} checksum {stored:#06X} does not match {computed:#06X}"),
                ));
            }
            debug!("block {id}: address {address:#010X}, {length} bytes");
            sections.push(Section::new(address, data.to_vec()));
            cursor = data_end + BLOCK_CRC_LEN;
        }

        if let Some(declared) = header.file_checksum() {
            let computed = Crc32::new().update(body).finish();
            if declared != computed {
                warn!("file_checksum {declared:#010X} does not match block data ({computed:#010X})");
            }
        }
        info!("VBF container holds {} sections", sections.len());

        Ok(Self {
            header,
            sections,
            dirty: BTreeSet::new(),
        })
    }

    /// Returns a reference to the [`VbfHeader`]
    #[must_use]
    pub const fn header(&self) -> &VbfHeader {
        &self.header
    }

    /// All sections in file order
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Raw bytes of the section with the given id
    ///
    /// # Errors
    ///
    /// Returns [`Error::SectionNotFound`] if there is no such section
    pub fn section(&self, id: usize) -> Result<&[u8]> {
        self.sections
            .get(id)
            .map(Section::data)
            .ok_or(Error::SectionNotFound(id))
    }

    /// Replaces the payload of a section in memory. The block keeps its address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SectionNotFound`] if there is no such section
    pub fn replace_section(&mut self, id: usize, data: Vec<u8>) -> Result<()> {
        check_block_len(id, data.len())?;
        let section = self
            .sections
            .get_mut(id)
            .ok_or(Error::SectionNotFound(id))?;
        debug!(
            "replacing section {id}: {} -> {} bytes",
            section.data.len(),
            data.len()
        );
        section.data = data;
        self.dirty.insert(id);
        Ok(())
    }

    /// True if any section was replaced since open or the last save
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Ids of the sections replaced since open or the last save
    pub fn dirty_sections(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirty.iter().copied()
    }

    /// Serializes the container, recomputing every block CRC and the `file_checksum`
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(
            self.sections
                .iter()
                .map(|s| s.data.len() + BLOCK_PREFIX_LEN + BLOCK_CRC_LEN)
                .sum(),
        );
        for section in &self.sections {
            section.write_to(&mut body);
        }
        let checksum = Crc32::new().update(&body).finish();
        let header = self.header.with_file_checksum(checksum);

        let mut out = Vec::with_capacity(header.len() + body.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Writes the container to `path`.
    ///
    /// The data goes to a temporary file next to the destination which is renamed
    /// over it once fully written, so a failed save leaves the previous file intact.
    ///
    /// # Errors
    ///
    /// This will error if the temporary file cannot be created, written or renamed
    #[instrument(level = "debug", skip(self))]
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = Temp::new_file_in(&dir)?;
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        info!("saved {} bytes to {}", bytes.len(), path.display());
        self.dirty.clear();
        Ok(())
    }
}

fn check_block_len(id: usize, len: usize) -> Result<()> {
    if u32::try_from(len).is_err() {
        return Err(format_err(
            Boundary::Container,
            format!("section {id} is too large for a VBF block ({len} bytes)"),
        ));
    }
    Ok(())
}
