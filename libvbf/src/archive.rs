//! Single-entry zip archives wrapping every EIF image in the resource table.
//!
//! The entry name is the original resource file name and is what users see.

use std::io::{Cursor, Read, Write};

use tracing::{trace, warn};
use zip::{result::ZipError, write::FileOptions, CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{format_err, Boundary, Error, Result};

/// The named payload of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// File name stored in the archive
    pub name: String,
    /// Uncompressed payload
    pub data: Vec<u8>,
}

/// Extracts the entry of a single-entry archive
///
/// Archives holding more than one entry are accepted; only the first one is read.
///
/// # Errors
///
/// This function errors if the bytes are not a zip archive, the archive is empty,
/// or the entry fails to decompress
pub fn unwrap_entry(bytes: &[u8]) -> Result<Entry> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;
    match archive.len() {
        0 => return Err(format_err(Boundary::Archive, "archive holds no entry")),
        1 => {}
        n => warn!("archive holds {n} entries, using the first one"),
    }
    let mut file = archive.by_index(0).map_err(archive_err)?;
    let name = file.name().to_owned();
    let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
    file.read_to_end(&mut data)
        .map_err(|e| format_err(Boundary::Archive, format!("{name}: {e}")))?;
    trace!("unpacked {name}: {} -> {} bytes", bytes.len(), data.len());
    Ok(Entry { name, data })
}

/// Packs `data` as the only entry of a new deflated archive
///
/// Entries carry a fixed timestamp, so the same input always packs to the same bytes.
///
/// # Errors
///
/// This function errors if the zip writer fails
pub fn wrap_entry(name: &str, data: &[u8]) -> Result<Vec<u8>> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(name, options).map_err(archive_err)?;
    writer.write_all(data)?;
    let packed = writer.finish().map_err(archive_err)?.into_inner();
    trace!("packed {name}: {} -> {} bytes", data.len(), packed.len());
    Ok(packed)
}

fn archive_err(e: ZipError) -> Error {
    format_err(Boundary::Archive, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_archive_is_rejected() {
        let empty = ZipWriter::new(Cursor::new(Vec::new()))
            .finish()
            .unwrap()
            .into_inner();
        assert!(matches!(unwrap_entry(&empty), Err(Error::Format(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            unwrap_entry(b"definitely not a zip"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn entry_survives_packing() {
        let payload = (0..=255u8).cycle().take(4096).collect::<Vec<_>>();
        let packed = wrap_entry("needle.eif", &payload).unwrap();
        let entry = unwrap_entry(&packed).unwrap();
        assert_eq!(entry.name, "needle.eif");
        assert_eq!(entry.data, payload);
    }

    #[test]
    fn packing_is_deterministic() {
        let a = wrap_entry("a.eif", b"same bytes").unwrap();
        let b = wrap_entry("a.eif", b"same bytes").unwrap();
        assert_eq!(a, b);
    }
}
