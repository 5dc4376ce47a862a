use strum::{Display, IntoStaticStr};

/// Kind of payload stored in the resource table
#[derive(Debug, Display, IntoStaticStr, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone)]
#[repr(u16)]
pub enum ResourceType {
    /// Uncompressed blob
    Raw = 0,
    /// Single entry zip archive holding an EIF image
    Zip = 1,
    /// Font glyph data
    Font = 2,
}

impl From<ResourceType> for u16 {
    fn from(value: ResourceType) -> Self {
        value as Self
    }
}

impl TryFrom<u16> for ResourceType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Zip),
            2 => Ok(Self::Font),
            other => Err(other),
        }
    }
}

/// One entry of the resource table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceItem {
    pub(crate) resource_type: ResourceType,
    pub(crate) flags: u16,
    pub(crate) data: Vec<u8>,
    pub(crate) uncompressed_size: u32,
}

impl ResourceItem {
    /// Size of one serialized item descriptor
    pub(crate) const DESCRIPTOR_SIZE: usize = 16;

    /// Creates a new item
    #[must_use]
    pub const fn new(resource_type: ResourceType, data: Vec<u8>, uncompressed_size: u32) -> Self {
        Self {
            resource_type,
            flags: 0,
            data,
            uncompressed_size,
        }
    }

    /// Type of the item
    #[must_use]
    pub const fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Stored (compressed) bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the payload once unpacked
    #[must_use]
    pub const fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    /// Descriptor flags, kept as found
    #[must_use]
    pub const fn flags(&self) -> u16 {
        self.flags
    }
}
