#![allow(clippy::module_name_repetitions)]

pub(crate) mod bitmap;
pub(crate) mod header;
pub(crate) mod palette;

pub use bitmap::RgbaBitmap;
pub use header::{EifHeader, DEFAULT_SIGNATURE};
pub use palette::{distance, Palette, Rgb, PALETTE_BYTES, PALETTE_LEN};

use std::collections::BTreeMap;

use strum::{Display, IntoStaticStr};
use tracing::{debug, instrument, warn};

use crate::{
    coalesce::{quantize, remap},
    error::{format_err, Boundary, DomainError, Result},
};

#[derive(Debug, Display, IntoStaticStr, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone)]
/// EIF image depth
pub enum EifKind {
    /// 8 bit gray levels, one byte per pixel
    #[strum(serialize = "monochrome (8bit)")]
    Monochrome,
    /// Palette indexed, one byte per pixel plus a 256 entry RGB table
    #[strum(serialize = "multicolor (16bit)")]
    Multicolor,
    /// True color, four bytes per pixel
    #[strum(serialize = "supercolor (32bit)")]
    Supercolor,
}

impl EifKind {
    /// Bytes of pixel data per pixel
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Monochrome | Self::Multicolor => 1,
            Self::Supercolor => 4,
        }
    }

    const fn table_len(self) -> usize {
        match self {
            Self::Multicolor => PALETTE_BYTES,
            Self::Monochrome | Self::Supercolor => 0,
        }
    }
}

impl From<EifKind> for u8 {
    fn from(value: EifKind) -> Self {
        match value {
            EifKind::Monochrome => 0x04,
            EifKind::Multicolor => 0x07,
            EifKind::Supercolor => 0x0E,
        }
    }
}

impl TryFrom<u8> for EifKind {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x04 => Ok(Self::Monochrome),
            0x07 => Ok(Self::Multicolor),
            0x0E => Ok(Self::Supercolor),
            other => Err(other),
        }
    }
}

/// 8 bit gray level image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonochromeImage {
    signature: [u8; 7],
    width: u16,
    height: u16,
    levels: Vec<u8>,
}

/// Palette indexed image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticolorImage {
    signature: [u8; 7],
    width: u16,
    height: u16,
    palette: Palette,
    indices: Vec<u8>,
}

/// 32 bit image, kept as RGBA in memory (stored as BGRA)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupercolorImage {
    signature: [u8; 7],
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

/// A decoded EIF image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EifImage {
    /// 8 bit
    Monochrome(MonochromeImage),
    /// 16 bit, palette indexed
    Multicolor(MulticolorImage),
    /// 32 bit
    Supercolor(SupercolorImage),
}

fn check_len(width: u16, height: u16, per_pixel: usize, len: usize) -> Result<()> {
    let expected = usize::from(width) * usize::from(height) * per_pixel;
    if expected == 0 || expected != len {
        return Err(format_err(
            Boundary::Image,
            format!("{width}x{height} image needs {expected} bytes of pixel data, got {len}"),
        ));
    }
    Ok(())
}

impl MonochromeImage {
    /// Creates a monochrome image from one gray level per pixel
    ///
    /// # Errors
    ///
    /// This function errors if the image is empty or `levels` has the wrong length
    pub fn new(width: u16, height: u16, levels: Vec<u8>) -> Result<Self> {
        check_len(width, height, 1, levels.len())?;
        Ok(Self {
            signature: DEFAULT_SIGNATURE,
            width,
            height,
            levels,
        })
    }

    /// Gray level per pixel
    #[must_use]
    pub fn levels(&self) -> &[u8] {
        &self.levels
    }
}

impl MulticolorImage {
    /// Creates a palette indexed image
    ///
    /// Indices are not checked against the palette here; lookups past the palette
    /// fail when the image is converted.
    ///
    /// # Errors
    ///
    /// This function errors if the image is empty or `indices` has the wrong length
    pub fn new(width: u16, height: u16, palette: Palette, indices: Vec<u8>) -> Result<Self> {
        check_len(width, height, 1, indices.len())?;
        Ok(Self {
            signature: DEFAULT_SIGNATURE,
            width,
            height,
            palette,
            indices,
        })
    }

    /// The embedded palette
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Palette index per pixel
    #[must_use]
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Returns the width of the image
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Returns the height of the image
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Color of every pixel, looked up in the embedded palette
    ///
    /// # Errors
    ///
    /// This function errors on the first index that lies past the end of the palette
    pub fn colors(&self) -> Result<Vec<Rgb>> {
        self.indices
            .iter()
            .map(|&i| {
                self.palette.get(i).ok_or_else(|| {
                    format_err(
                        Boundary::Palette,
                        format!(
                            "pixel index {i} is outside the {} entry palette",
                            self.palette.len()
                        ),
                    )
                })
            })
            .collect()
    }

    /// Swaps in a new palette together with indices pointing into it
    pub(crate) fn set_palette(&mut self, palette: Palette, indices: Vec<u8>) {
        debug_assert_eq!(indices.len(), self.indices.len());
        self.palette = palette;
        self.indices = indices;
    }
}

impl SupercolorImage {
    /// Creates a 32 bit image from RGBA samples
    ///
    /// # Errors
    ///
    /// This function errors if the image is empty or `rgba` has the wrong length
    pub fn new(width: u16, height: u16, rgba: Vec<u8>) -> Result<Self> {
        check_len(width, height, 4, rgba.len())?;
        Ok(Self {
            signature: DEFAULT_SIGNATURE,
            width,
            height,
            pixels: rgba,
        })
    }

    /// RGBA samples
    #[must_use]
    pub fn rgba(&self) -> &[u8] {
        &self.pixels
    }
}

impl EifImage {
    /// Decodes an EIF image
    ///
    /// # Errors
    ///
    /// This function will error if:
    /// - the header is invalid (see [`EifHeader::parse`])
    /// - the declared pixel data length does not match the dimensions
    /// - the buffer is shorter than header, palette and pixel data
    #[instrument(level = "trace", skip(bytes), fields(len = bytes.len()))]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = EifHeader::parse(bytes)?;
        let kind = header.kind;
        let pixel_len = header.pixel_count() * kind.bytes_per_pixel();
        if header.data_len as usize != pixel_len {
            return Err(format_err(
                Boundary::Image,
                format!(
                    "declared pixel data length {} does not match {}x{} {kind}",
                    header.data_len, header.width, header.height
                ),
            ));
        }
        let table_start = EifHeader::SIZE;
        let data_start = table_start + kind.table_len();
        let data_end = data_start + pixel_len;
        let Some(data) = bytes.get(data_start..data_end) else {
            return Err(format_err(
                Boundary::Image,
                format!("image truncated: {} of {data_end} bytes", bytes.len()),
            ));
        };
        if bytes.len() > data_end {
            warn!("ignoring {} bytes after the pixel data", bytes.len() - data_end);
        }
        debug!("decoded {kind} {}x{}", header.width, header.height);

        let (signature, width, height) = (header.signature, header.width, header.height);
        Ok(match kind {
            EifKind::Monochrome => Self::Monochrome(MonochromeImage {
                signature,
                width,
                height,
                levels: data.to_vec(),
            }),
            EifKind::Multicolor => Self::Multicolor(MulticolorImage {
                signature,
                width,
                height,
                palette: Palette::from_table(&bytes[table_start..data_start]),
                indices: data.to_vec(),
            }),
            EifKind::Supercolor => Self::Supercolor(SupercolorImage {
                signature,
                width,
                height,
                pixels: data
                    .chunks_exact(4)
                    .flat_map(|bgra| [bgra[2], bgra[1], bgra[0], bgra[3]])
                    .collect(),
            }),
        })
    }

    /// Encodes the image into the EIF layout
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let header = self.header();
        let mut out =
            Vec::with_capacity(EifHeader::SIZE + header.kind.table_len() + header.data_len as usize);
        header.write_to(&mut out);
        match self {
            Self::Monochrome(img) => out.extend_from_slice(&img.levels),
            Self::Multicolor(img) => {
                out.extend_from_slice(&img.palette.to_table());
                out.extend_from_slice(&img.indices);
            }
            Self::Supercolor(img) => out.extend(
                img.pixels
                    .chunks_exact(4)
                    .flat_map(|rgba| [rgba[2], rgba[1], rgba[0], rgba[3]]),
            ),
        }
        out
    }

    /// The header [`Self::encode`] writes
    #[must_use]
    pub fn header(&self) -> EifHeader {
        let (width, height) = self.dimensions();
        let kind = self.kind();
        let pixel_len = usize::from(width) * usize::from(height) * kind.bytes_per_pixel();
        EifHeader {
            signature: *self.signature(),
            kind,
            data_len: u32::try_from(pixel_len).unwrap_or(u32::MAX),
            width,
            height,
        }
    }

    /// The seven signature bytes in front of the depth tag
    #[must_use]
    pub const fn signature(&self) -> &[u8; 7] {
        match self {
            Self::Monochrome(img) => &img.signature,
            Self::Multicolor(img) => &img.signature,
            Self::Supercolor(img) => &img.signature,
        }
    }

    /// Same image carrying `signature`
    #[must_use]
    pub fn with_signature(mut self, signature: [u8; 7]) -> Self {
        match &mut self {
            Self::Monochrome(img) => img.signature = signature,
            Self::Multicolor(img) => img.signature = signature,
            Self::Supercolor(img) => img.signature = signature,
        }
        self
    }

    /// Depth of the image
    #[must_use]
    pub const fn kind(&self) -> EifKind {
        match self {
            Self::Monochrome(_) => EifKind::Monochrome,
            Self::Multicolor(_) => EifKind::Multicolor,
            Self::Supercolor(_) => EifKind::Supercolor,
        }
    }

    /// Returns `(width, height)`
    #[must_use]
    pub const fn dimensions(&self) -> (u16, u16) {
        match self {
            Self::Monochrome(img) => (img.width, img.height),
            Self::Multicolor(img) => (img.width, img.height),
            Self::Supercolor(img) => (img.width, img.height),
        }
    }

    /// Returns the image width
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.dimensions().0
    }

    /// Returns the image height
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.dimensions().1
    }

    /// Palette fingerprint for multicolor images, [`None`] otherwise
    #[must_use]
    pub fn palette_key(&self) -> Option<u16> {
        self.as_multicolor().ok().map(|img| img.palette.fingerprint())
    }

    /// Expands the image to RGBA
    ///
    /// # Errors
    ///
    /// For multicolor images, this function errors if a pixel index lies past the palette
    pub fn to_rgba(&self) -> Result<RgbaBitmap> {
        let (width, height) = self.dimensions();
        let pixels = match self {
            Self::Monochrome(img) => img.levels.iter().flat_map(|&v| [v, v, v, u8::MAX]).collect(),
            Self::Multicolor(img) => img
                .colors()?
                .into_iter()
                .flat_map(|[r, g, b]| [r, g, b, u8::MAX])
                .collect(),
            Self::Supercolor(img) => img.pixels.clone(),
        };
        RgbaBitmap::new(width, height, pixels)
    }

    /// Builds an image of the given depth from a plain bitmap
    ///
    /// Multicolor images get a palette of the bitmap's colors, zero-filled to
    /// [`PALETTE_LEN`] entries; bitmaps with more than [`PALETTE_LEN`] colors are
    /// quantized first. Alpha is dropped for monochrome and
    /// multicolor images.
    ///
    /// # Errors
    ///
    /// This function errors if the bitmap is empty
    pub fn from_rgba(kind: EifKind, bitmap: &RgbaBitmap) -> Result<Self> {
        let (width, height) = bitmap.dimensions();
        Ok(match kind {
            EifKind::Monochrome => Self::Monochrome(MonochromeImage::new(
                width,
                height,
                bitmap.pixels().map(|[r, g, b, _]| luma([r, g, b])).collect(),
            )?),
            EifKind::Multicolor => {
                let mut histogram = BTreeMap::<Rgb, f64>::new();
                for [r, g, b, _] in bitmap.pixels() {
                    *histogram.entry([r, g, b]).or_default() += 1.0;
                }
                let histogram = histogram.into_iter().collect::<Vec<_>>();
                let colors = quantize(&histogram, PALETTE_LEN);
                debug!(
                    "{} distinct colors reduced to {}",
                    histogram.len(),
                    colors.len()
                );
                let indices = remap(&colors, bitmap.pixels().map(|[r, g, b, _]| [r, g, b]));
                Self::Multicolor(MulticolorImage::new(
                    width,
                    height,
                    Palette::new(colors)?.zero_filled(),
                    indices,
                )?)
            }
            EifKind::Supercolor => Self::Supercolor(SupercolorImage::new(
                width,
                height,
                bitmap.as_bytes().to_vec(),
            )?),
        })
    }

    /// Builds a multicolor image that uses the given palette, mapping every pixel to
    /// its nearest palette entry
    ///
    /// The palette is zero-filled to [`PALETTE_LEN`] entries; the padding is never picked.
    ///
    /// # Errors
    ///
    /// This function errors if the bitmap is empty or the palette has no entries
    pub fn from_rgba_with_palette(bitmap: &RgbaBitmap, palette: Palette) -> Result<Self> {
        if palette.is_empty() {
            return Err(format_err(Boundary::Palette, "palette has no entries"));
        }
        let indices = remap(
            palette.colors(),
            bitmap.pixels().map(|[r, g, b, _]| [r, g, b]),
        );
        Ok(Self::Multicolor(MulticolorImage::new(
            bitmap.width(),
            bitmap.height(),
            palette.zero_filled(),
            indices,
        )?))
    }

    /// Checked view as a multicolor image
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DepthMismatch`] for other depths
    pub fn as_multicolor(&self) -> Result<&MulticolorImage, DomainError> {
        match self {
            Self::Multicolor(img) => Ok(img),
            other => Err(other.not_multicolor()),
        }
    }

    /// Checked mutable view as a multicolor image
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DepthMismatch`] for other depths
    pub fn as_multicolor_mut(&mut self) -> Result<&mut MulticolorImage, DomainError> {
        match self {
            Self::Multicolor(img) => Ok(img),
            other => Err(other.not_multicolor()),
        }
    }

    /// Checked conversion into a multicolor image
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DepthMismatch`] for other depths
    pub fn into_multicolor(self) -> Result<MulticolorImage, DomainError> {
        match self {
            Self::Multicolor(img) => Ok(img),
            other => Err(other.not_multicolor()),
        }
    }

    const fn not_multicolor(&self) -> DomainError {
        DomainError::DepthMismatch {
            expected: EifKind::Multicolor,
            actual: self.kind(),
        }
    }
}

/// ITU-R BT.601 luma, exact for gray input
fn luma([r, g, b]: Rgb) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    u8::try_from((weighted + 500) / 1000).unwrap_or(u8::MAX)
}
