//! Table driven CRC routines used by the container and by palette fingerprints.

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection, no xor-out)
#[must_use]
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    const TABLE: [u16; 256] = generate_crc16_table();

    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        let index = usize::from(((crc >> 8) ^ u16::from(byte)) & 0xFF);
        crc = (crc << 8) ^ TABLE[index];
    }
    crc
}

/// CRC-32/IEEE 802.3, as used for the VBF `file_checksum`
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    Crc32::new().update(data).finish()
}

/// Incremental CRC-32 so the container can checksum blocks without concatenating them
#[derive(Debug, Clone, Copy)]
pub struct Crc32(u32);

impl Crc32 {
    const TABLE: [u32; 256] = generate_crc32_table();

    /// Starts a new checksum
    #[must_use]
    pub const fn new() -> Self {
        Self(0xFFFF_FFFF)
    }

    /// Feeds more bytes
    #[must_use]
    pub fn update(mut self, data: &[u8]) -> Self {
        for &byte in data {
            let index = ((self.0 ^ u32::from(byte)) & 0xFF) as usize;
            self.0 = (self.0 >> 8) ^ Self::TABLE[index];
        }
        self
    }

    /// Final value
    #[must_use]
    pub const fn finish(self) -> u32 {
        !self.0
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

const fn generate_crc16_table() -> [u16; 256] {
    const POLYNOMIAL: u16 = 0x1021;
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        #[allow(clippy::cast_possible_truncation)]
        let mut crc = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn generate_crc32_table() -> [u32; 256] {
    const POLYNOMIAL: u32 = 0xEDB8_8320;
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        #[allow(clippy::cast_possible_truncation)]
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}
