use crate::{
    checksum::crc16_ccitt_false,
    error::{format_err, Boundary, Result},
};

/// An RGB color
pub type Rgb = [u8; 3];

/// Number of entries of the palette table stored in multicolor images
pub const PALETTE_LEN: usize = 256;
/// Size of the stored palette table
pub const PALETTE_BYTES: usize = PALETTE_LEN * 3;

/// Color table of a multicolor image, at most [`PALETTE_LEN`] entries
///
/// Images read from a file always carry the full table. Shorter palettes are
/// zero-filled when written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Palette(Vec<Rgb>);

impl Palette {
    /// Creates a palette from the given colors
    ///
    /// # Errors
    ///
    /// This function errors if more than [`PALETTE_LEN`] colors are given
    pub fn new(colors: Vec<Rgb>) -> Result<Self> {
        if colors.len() > PALETTE_LEN {
            return Err(format_err(
                Boundary::Palette,
                format!("{} colors do not fit into a palette", colors.len()),
            ));
        }
        Ok(Self(colors))
    }

    /// Pads the palette with black up to [`PALETTE_LEN`] entries, as it is stored
    #[must_use]
    pub fn zero_filled(mut self) -> Self {
        self.0.resize(PALETTE_LEN, [0; 3]);
        self
    }

    pub(crate) fn from_table(table: &[u8]) -> Self {
        debug_assert_eq!(table.len(), PALETTE_BYTES);
        Self(
            table
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect(),
        )
    }

    /// Palette entries
    #[must_use]
    pub fn colors(&self) -> &[Rgb] {
        &self.0
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the palette has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Color at `index`
    #[must_use]
    pub fn get(&self, index: u8) -> Option<Rgb> {
        self.0.get(usize::from(index)).copied()
    }

    /// The stored 768 byte table, zero-filled past the last entry
    #[must_use]
    pub fn to_table(&self) -> [u8; PALETTE_BYTES] {
        let mut table = [0; PALETTE_BYTES];
        for (slot, color) in table.chunks_exact_mut(3).zip(&self.0) {
            slot.copy_from_slice(color);
        }
        table
    }

    /// Fingerprint identifying palette-bonded images: CRC-16/CCITT-FALSE of the stored table
    #[must_use]
    pub fn fingerprint(&self) -> u16 {
        crc16_ccitt_false(&self.to_table())
    }

    /// Index of the entry closest to `color` (squared RGB distance, lowest index wins ties)
    ///
    /// Returns [`None`] for an empty palette.
    #[must_use]
    pub fn nearest(&self, color: Rgb) -> Option<u8> {
        nearest_index(&self.0, color)
    }
}

/// Squared euclidean RGB distance
#[must_use]
pub fn distance(a: Rgb, b: Rgb) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            d.unsigned_abs() * d.unsigned_abs()
        })
        .sum()
}

pub(crate) fn nearest_index(colors: &[Rgb], color: Rgb) -> Option<u8> {
    let mut best: Option<(usize, u32)> = None;
    for (i, &candidate) in colors.iter().enumerate().take(PALETTE_LEN) {
        let d = distance(candidate, color);
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((i, d));
            if d == 0 {
                break;
            }
        }
    }
    best.and_then(|(i, _)| u8::try_from(i).ok())
}
