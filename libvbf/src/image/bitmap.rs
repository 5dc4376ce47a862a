use std::path::Path;

use image::{ImageFormat, RgbaImage};
use tracing::debug;

use crate::error::{Boundary, DomainError, Error, FormatError, Result};

/// Uncompressed RGBA bitmap, the exchange format between EIF images and plain image files
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RgbaBitmap {
    /// The width of the image
    width: u16,
    /// The height of the image
    height: u16,
    /// RGBA samples, row-major
    pixels: Vec<u8>,
}

impl RgbaBitmap {
    /// Creates a new [`RgbaBitmap`]
    ///
    /// # Errors
    ///
    /// This function errors if `pixels` is not `width * height * 4` bytes long
    pub fn new(width: u16, height: u16, pixels: Vec<u8>) -> Result<Self> {
        let expected = usize::from(width) * usize::from(height) * 4;
        if pixels.len() != expected || expected == 0 {
            return Err(FormatError::new(
                Boundary::Image,
                format!(
                    "{width}x{height} bitmap needs {expected} bytes, got {}",
                    pixels.len()
                ),
            )
            .into());
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Reads any file the `image` crate understands (the cluster tooling uses `.bmp`)
    ///
    /// # Errors
    ///
    /// This function errors if the file cannot be decoded or is larger than 65535 pixels
    /// in either direction
    pub fn open(path: &Path) -> Result<Self> {
        let img = image::open(path)?.to_rgba8();
        debug!(
            "read {}x{} bitmap from {}",
            img.width(),
            img.height(),
            path.display()
        );
        let too_big = || DomainError::BitmapTooLarge {
            width: img.width(),
            height: img.height(),
        };
        let width = u16::try_from(img.width()).map_err(|_| too_big())?;
        let height = u16::try_from(img.height()).map_err(|_| too_big())?;
        Self::new(width, height, img.into_raw())
    }

    /// Writes the bitmap as a 32-bit BMP file
    ///
    /// # Errors
    ///
    /// This function errors if the file cannot be written
    pub fn save_bmp(&self, path: &Path) -> Result<()> {
        let img = RgbaImage::from_raw(
            u32::from(self.width),
            u32::from(self.height),
            self.pixels.clone(),
        )
        .ok_or_else(|| Error::from(FormatError::new(Boundary::Image, "bitmap buffer size")))?;
        img.save_with_format(path, ImageFormat::Bmp)?;
        debug!("wrote {}", path.display());
        Ok(())
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

    /// Returns `(width, height)`
    #[must_use]
    pub const fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Returns the RGBA samples
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Consumes the bitmap, returning the RGBA samples
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    /// Iterates over pixels as `[r, g, b, a]`
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.pixels
            .chunks_exact(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Pixel at `(x, y)`
    #[must_use]
    pub fn pixel(&self, x: u16, y: u16) -> Option<[u8; 4]> {
        if x < self.width && y < self.height {
            let i = (usize::from(y) * usize::from(self.width) + usize::from(x)) * 4;
            Some([
                self.pixels[i],
                self.pixels[i + 1],
                self.pixels[i + 2],
                self.pixels[i + 3],
            ])
        } else {
            None
        }
    }
}
