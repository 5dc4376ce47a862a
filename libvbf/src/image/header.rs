use bon::Builder;

use super::EifKind;
use crate::error::{format_err, Boundary, Result};

/// Signature written into newly created images
pub const DEFAULT_SIGNATURE: [u8; 7] = *b"EBD10EI";

/// Fixed 16 byte header at the start of every EIF image
///
/// ## Layout
///
/// ```"not rust"
/// 0x00 [u8; 7] signature
/// 0x07 u8      depth tag (see [`EifKind`])
/// 0x08 u32 LE  pixel data length
/// 0x0C u16 LE  width
/// 0x0E u16 LE  height
/// ```
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct EifHeader {
    /// Leading signature bytes. They are not interpreted and are written back as read.
    #[builder(default = DEFAULT_SIGNATURE)]
    pub signature: [u8; 7],
    /// Depth of the image
    pub kind: EifKind,
    /// Length of the pixel data following the header (and palette)
    pub data_len: u32,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
}

impl EifHeader {
    /// Serialized size
    pub const SIZE: usize = 16;
    /// Offset of the depth tag
    pub const KIND_OFFSET: usize = 7;

    /// Reads and validates the header at the start of `bytes`
    ///
    /// # Errors
    ///
    /// This function errors if the buffer is too short, the depth tag is unknown,
    /// or the image has no pixels
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let Some(raw) = bytes.get(..Self::SIZE) else {
            return Err(format_err(
                Boundary::Image,
                format!("{} bytes is too short for an EIF header", bytes.len()),
            ));
        };
        let kind = EifKind::try_from(raw[Self::KIND_OFFSET]).map_err(|tag| {
            format_err(Boundary::Image, format!("unknown EIF depth tag {tag:#04X}"))
        })?;
        let mut signature = [0; 7];
        signature.copy_from_slice(&raw[..7]);
        let header = Self {
            signature,
            kind,
            data_len: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            width: u16::from_le_bytes([raw[12], raw[13]]),
            height: u16::from_le_bytes([raw[14], raw[15]]),
        };
        if header.width == 0 || header.height == 0 {
            return Err(format_err(
                Boundary::Image,
                format!("image has no pixels ({}x{})", header.width, header.height),
            ));
        }
        Ok(header)
    }

    /// Number of pixels described by the header
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.signature);
        out.push(self.kind.into());
        out.extend_from_slice(&self.data_len.to_le_bytes());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
    }
}
