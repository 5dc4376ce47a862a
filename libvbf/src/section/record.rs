use bon::Builder;

/// Placement and display metadata of one image resource
///
/// Records are stored in the same order as the zip items of the image section:
/// record `i` describes picture `i`.
///
/// ## Layout
///
/// Every record is 16 little-endian bytes:
/// ```"not rust"
/// u16 width, u16 height, u16 x, u16 y,
/// u8 type, u8 z, u8 intensity, u8 r, u8 g, u8 b, u8 palette_id, u8 reserved
/// ```
#[derive(Builder, Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct HeaderRecord {
    /// Width of the placed resource in pixels
    pub width: u16,
    /// Height of the placed resource in pixels
    pub height: u16,
    /// Horizontal screen position
    #[builder(default)]
    pub x: u16,
    /// Vertical screen position
    #[builder(default)]
    pub y: u16,
    /// EIF depth tag of the placed resource
    #[builder(default)]
    pub eif_type: u8,
    /// Z-order
    #[builder(default)]
    pub z: u8,
    /// Display intensity
    #[builder(default)]
    pub intensity: u8,
    /// Tint, red
    #[builder(default)]
    pub r: u8,
    /// Tint, green
    #[builder(default)]
    pub g: u8,
    /// Tint, blue
    #[builder(default)]
    pub b: u8,
    /// Palette slot used by the cluster
    #[builder(default)]
    pub palette_id: u8,
    /// Unknown, written back unchanged
    #[builder(default)]
    pub reserved: u8,
}

impl HeaderRecord {
    /// Size of one serialized record
    pub const SIZE: usize = 16;

    /// Column names, in the order used by [`Self::values`] for tabular import/export
    pub const COLUMNS: [&'static str; 11] = [
        "Width",
        "Height",
        "X",
        "Y",
        "Type",
        "Z index",
        "Intensity",
        "R",
        "G",
        "B",
        "Palette",
    ];

    /// Field values in [`Self::COLUMNS`] order
    #[must_use]
    pub fn values(&self) -> [u32; 11] {
        [
            u32::from(self.width),
            u32::from(self.height),
            u32::from(self.x),
            u32::from(self.y),
            u32::from(self.eif_type),
            u32::from(self.z),
            u32::from(self.intensity),
            u32::from(self.r),
            u32::from(self.g),
            u32::from(self.b),
            u32::from(self.palette_id),
        ]
    }

    pub(crate) fn from_bytes(raw: &[u8; Self::SIZE]) -> Self {
        Self {
            width: u16::from_le_bytes([raw[0], raw[1]]),
            height: u16::from_le_bytes([raw[2], raw[3]]),
            x: u16::from_le_bytes([raw[4], raw[5]]),
            y: u16::from_le_bytes([raw[6], raw[7]]),
            eif_type: raw[8],
            z: raw[9],
            intensity: raw[10],
            r: raw[11],
            g: raw[12],
            b: raw[13],
            palette_id: raw[14],
            reserved: raw[15],
        }
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.x.to_le_bytes());
        out.extend_from_slice(&self.y.to_le_bytes());
        out.extend_from_slice(&[
            self.eif_type,
            self.z,
            self.intensity,
            self.r,
            self.g,
            self.b,
            self.palette_id,
            self.reserved,
        ]);
    }
}
