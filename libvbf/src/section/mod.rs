//! The image section: a table of placement records plus a table of resource blobs.
//!
//! ## Layout
//!
//! All integers are little-endian.
//! ```text
//! u32 record_count
//! u32 item_count
//! record_count x HeaderRecord    (16 bytes each)
//! item_count   x ItemDescriptor  (u16 type, u16 flags, u32 offset, u32 size, u32 uncompressed_size)
//! item blobs, back to back in descriptor order
//! ```
//! Offsets are absolute within the section. The number of records always equals
//! the number of [`ResourceType::Zip`] items.

mod item;
mod record;

pub use item::{ResourceItem, ResourceType};
pub use record::HeaderRecord;

use itertools::Itertools;
use tracing::{debug, instrument, trace};

use crate::error::{format_err, Boundary, Error, Result};

const COUNTS_LEN: usize = 8;

/// Parsed image section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSection {
    records: Vec<HeaderRecord>,
    items: Vec<ResourceItem>,
}

impl ImageSection {
    /// Creates a section from records and items
    ///
    /// # Errors
    ///
    /// This function errors if the number of records differs from the number of zip items
    pub fn new(records: Vec<HeaderRecord>, items: Vec<ResourceItem>) -> Result<Self> {
        let section = Self { records, items };
        section.check_record_count()?;
        Ok(section)
    }

    /// Parses the raw bytes of the image section
    ///
    /// # Errors
    ///
    /// This function will error if:
    /// - the declared tables do not fit into the buffer
    /// - an item has an unknown resource type
    /// - the offset table is not contiguous or does not end at the end of the buffer
    /// - the number of records differs from the number of zip items
    #[instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let record_count = read_u32(bytes, 0)? as usize;
        let item_count = read_u32(bytes, 4)? as usize;
        debug!("{record_count} records, {item_count} items");

        let records_end = record_count
            .checked_mul(HeaderRecord::SIZE)
            .and_then(|n| n.checked_add(COUNTS_LEN))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| section_err(format!("{record_count} records do not fit")))?;
        let tables_end = item_count
            .checked_mul(ResourceItem::DESCRIPTOR_SIZE)
            .and_then(|n| n.checked_add(records_end))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| section_err(format!("{item_count} item descriptors do not fit")))?;

        let records = bytes[COUNTS_LEN..records_end]
            .chunks_exact(HeaderRecord::SIZE)
            .map(|chunk| {
                let mut raw = [0; HeaderRecord::SIZE];
                raw.copy_from_slice(chunk);
                HeaderRecord::from_bytes(&raw)
            })
            .collect::<Vec<_>>();

        let mut items = Vec::with_capacity(item_count);
        let mut expected_offset = tables_end;
        for (i, d) in bytes[records_end..tables_end]
            .chunks_exact(ResourceItem::DESCRIPTOR_SIZE)
            .enumerate()
        {
            let raw_type = u16::from_le_bytes([d[0], d[1]]);
            let resource_type = ResourceType::try_from(raw_type)
                .map_err(|t| section_err(format!("item {i} has unknown resource type {t}")))?;
            let flags = u16::from_le_bytes([d[2], d[3]]);
            let offset = u32::from_le_bytes([d[4], d[5], d[6], d[7]]) as usize;
            let size = u32::from_le_bytes([d[8], d[9], d[10], d[11]]) as usize;
            let uncompressed_size = u32::from_le_bytes([d[12], d[13], d[14], d[15]]);
            if offset != expected_offset {
                return Err(section_err(format!(
                    "item {i} starts at {offset:#X}, expected {expected_offset:#X}"
                )));
            }
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= bytes.len())
                .ok_or_else(|| section_err(format!("item {i} ({size} bytes) runs past the end")))?;
            trace!("item {i}: {resource_type} at {offset:#X}, {size} bytes");
            items.push(ResourceItem {
                resource_type,
                flags,
                data: bytes[offset..end].to_vec(),
                uncompressed_size,
            });
            expected_offset = end;
        }
        if expected_offset != bytes.len() {
            return Err(section_err(format!(
                "{} trailing bytes after the last item",
                bytes.len() - expected_offset
            )));
        }

        let section = Self { records, items };
        section.check_record_count()?;
        Ok(section)
    }

    fn check_record_count(&self) -> Result<()> {
        let zip_items = self.items_count(ResourceType::Zip);
        if zip_items != self.records.len() {
            return Err(section_err(format!(
                "{zip_items} zip items but {} header records",
                self.records.len()
            )));
        }
        Ok(())
    }

    /// All header records, in picture order
    #[must_use]
    pub fn records(&self) -> &[HeaderRecord] {
        &self.records
    }

    /// Header record of picture `index`
    #[must_use]
    pub fn record(&self, index: usize) -> Option<&HeaderRecord> {
        self.records.get(index)
    }

    /// All items in table order
    #[must_use]
    pub fn items(&self) -> &[ResourceItem] {
        &self.items
    }

    /// Number of items of the given type
    #[must_use]
    pub fn items_count(&self, resource_type: ResourceType) -> usize {
        self.items
            .iter()
            .filter(|item| item.resource_type == resource_type)
            .count()
    }

    fn position(&self, resource_type: ResourceType, index: usize) -> Result<usize> {
        self.items
            .iter()
            .positions(|item| item.resource_type == resource_type)
            .nth(index)
            .ok_or_else(|| Error::OutOfRange {
                resource: resource_type,
                index,
                count: self.items_count(resource_type),
            })
    }

    /// The `index`-th item of the given type
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if there is no such item
    pub fn item(&self, resource_type: ResourceType, index: usize) -> Result<&ResourceItem> {
        let pos = self.position(resource_type, index)?;
        Ok(&self.items[pos])
    }

    /// Stored bytes of the `index`-th item of the given type
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if there is no such item
    pub fn item_data(&self, resource_type: ResourceType, index: usize) -> Result<&[u8]> {
        self.item(resource_type, index).map(ResourceItem::data)
    }

    /// Replaces the bytes of one item, keeping its position in the table.
    ///
    /// For zip items the header record with the same index gets the new
    /// `(width, height)` and `eif_type`. No other item or record is touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if there is no such item, or a format error if the
    /// section would grow past what the offset table can address
    pub fn replace_item(
        &mut self,
        resource_type: ResourceType,
        index: usize,
        data: Vec<u8>,
        uncompressed_size: u32,
        (width, height): (u16, u16),
        eif_type: u8,
    ) -> Result<()> {
        let pos = self.position(resource_type, index)?;
        let new_len = self.serialized_len() - self.items[pos].data.len() + data.len();
        if u32::try_from(new_len).is_err() {
            return Err(section_err(format!(
                "section would grow to {new_len} bytes"
            )));
        }
        debug!(
            "replacing {resource_type} item {index}: {} -> {} bytes",
            self.items[pos].data.len(),
            data.len()
        );
        let item = &mut self.items[pos];
        item.data = data;
        item.uncompressed_size = uncompressed_size;

        if resource_type == ResourceType::Zip {
            // record count equals zip item count, so the row exists
            if let Some(record) = self.records.get_mut(index) {
                record.width = width;
                record.height = height;
                record.eif_type = eif_type;
            }
        }
        Ok(())
    }

    /// Length of [`Self::serialize`]'s output
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        self.tables_len() + self.items.iter().map(|item| item.data.len()).sum::<usize>()
    }

    fn tables_len(&self) -> usize {
        COUNTS_LEN
            + self.records.len() * HeaderRecord::SIZE
            + self.items.len() * ResourceItem::DESCRIPTOR_SIZE
    }

    /// Serializes the section with a freshly computed offset table
    #[must_use]
    // sizes are kept below u32::MAX by `parse` and `replace_item`
    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_len());
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.items.len() as u32).to_le_bytes());
        for record in &self.records {
            record.write_to(&mut out);
        }
        let mut offset = self.tables_len();
        for item in &self.items {
            out.extend_from_slice(&u16::from(item.resource_type).to_le_bytes());
            out.extend_from_slice(&item.flags.to_le_bytes());
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            out.extend_from_slice(&(item.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&item.uncompressed_size.to_le_bytes());
            offset += item.data.len();
        }
        for item in &self.items {
            out.extend_from_slice(&item.data);
        }
        out
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| section_err(format!("section too short to read counts ({} bytes)", bytes.len())))
}

fn section_err(reason: String) -> Error {
    format_err(Boundary::Section, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImageSection {
        let records = vec![
            HeaderRecord::builder().width(2).height(1).x(10).build(),
            HeaderRecord::builder().width(1).height(1).palette_id(3).build(),
        ];
        let items = vec![
            ResourceItem::new(ResourceType::Zip, vec![1, 2, 3], 30),
            ResourceItem::new(ResourceType::Raw, vec![9; 5], 5),
            ResourceItem::new(ResourceType::Zip, vec![4, 5], 20),
        ];
        ImageSection::new(records, items).unwrap()
    }

    #[test]
    fn typed_index_skips_other_types() {
        let section = sample();
        assert_eq!(section.item_data(ResourceType::Zip, 1).unwrap(), &[4, 5]);
        assert_eq!(section.item_data(ResourceType::Raw, 0).unwrap(), &[9; 5]);
        assert!(matches!(
            section.item_data(ResourceType::Font, 0),
            Err(Error::OutOfRange { count: 0, .. })
        ));
    }

    #[test]
    fn serialized_len_matches_output() {
        let section = sample();
        assert_eq!(section.serialize().len(), section.serialized_len());
    }

    #[test]
    fn rejects_gap_between_items() {
        let mut bytes = sample().serialize();
        // move the second item one byte further
        let second_offset_at = COUNTS_LEN + 2 * HeaderRecord::SIZE + ResourceItem::DESCRIPTOR_SIZE + 4;
        let offset = u32::from_le_bytes(bytes[second_offset_at..second_offset_at + 4].try_into().unwrap());
        bytes[second_offset_at..second_offset_at + 4].copy_from_slice(&(offset + 1).to_le_bytes());
        assert!(matches!(ImageSection::parse(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = sample().serialize();
        bytes.push(0);
        assert!(matches!(ImageSection::parse(&bytes), Err(Error::Format(_))));
    }
}
