//! Joint palette computation for palette-bonded multicolor images
//!
//! Multicolor images that carry the same embedded palette are rendered by the cluster with
//! a single color table. After one of them is edited, the whole group has to be moved onto
//! a new shared palette that suits every member; [`Coalescer::run`] does exactly that.

mod median_cut;

use std::collections::{BTreeMap, HashMap};

use bon::Builder;
use tracing::{debug, instrument};

use crate::{
    error::{DomainError, Result},
    image::{palette::nearest_index, EifImage, Palette, Rgb, RgbaBitmap, PALETTE_LEN},
};

/// Lloyd refinement passes run after the median cut
pub const REFINE_PASSES: usize = 4;

/// How pixels contribute to the shared palette
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Every pixel counts once, large images dominate
    #[default]
    PixelCount,
    /// Every image carries the same total weight regardless of its size
    PerImage,
    /// Every distinct color counts once
    Distinct,
}

/// Computes one palette for a group of multicolor images and remaps every member onto it
///
/// ```rust
/// use libvbf::{
///     coalesce::{Coalescer, Weighting},
///     EifImage, MulticolorImage, Palette,
/// };
///
/// # fn main() -> libvbf::Result<()> {
/// let red_green = Palette::new(vec![[255, 0, 0], [0, 255, 0]])?;
/// let red_blue = Palette::new(vec![[255, 0, 0], [0, 0, 255]])?;
/// let mut group = [
///     EifImage::Multicolor(MulticolorImage::new(2, 1, red_green, vec![0, 1])?),
///     EifImage::Multicolor(MulticolorImage::new(2, 1, red_blue, vec![0, 1])?),
/// ];
/// let palette = Coalescer::builder()
///     .weighting(Weighting::PerImage)
///     .build()
///     .run(&mut group)?;
/// assert_eq!(palette.len(), 256);
/// assert_eq!(group[0].palette_key(), group[1].palette_key());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Builder)]
pub struct Coalescer {
    #[builder(default)]
    weighting: Weighting,
    #[builder(default = REFINE_PASSES)]
    refine_passes: usize,
}

impl Default for Coalescer {
    fn default() -> Self {
        Self {
            weighting: Weighting::default(),
            refine_passes: REFINE_PASSES,
        }
    }
}

impl Coalescer {
    /// Replaces the palette of every image in `images` with one shared palette and
    /// returns that palette
    ///
    /// The palette always has [`PALETTE_LEN`] entries. When the group uses no more than
    /// [`PALETTE_LEN`] distinct colors, those colors are kept exactly (in ascending RGB
    /// order) and every pixel keeps its color. Unused slots are black and are never
    /// picked when remapping.
    ///
    /// Nothing is modified unless the whole group succeeds.
    ///
    /// # Errors
    ///
    /// This function will error if:
    /// - `images` is empty ([`DomainError::EmptyPaletteGroup`])
    /// - an image is not a multicolor image ([`DomainError::DepthMismatch`])
    /// - a pixel index lies past the end of its image's palette
    #[instrument(level = "debug", skip_all, fields(images = images.len()))]
    pub fn run(&self, images: &mut [EifImage]) -> Result<Palette> {
        if images.is_empty() {
            return Err(DomainError::EmptyPaletteGroup.into());
        }
        let members = images
            .iter()
            .map(EifImage::as_multicolor)
            .collect::<Result<Vec<_>, _>>()?;
        let colors = members
            .iter()
            .map(|img| img.colors())
            .collect::<Result<Vec<_>>>()?;
        self.apply(images, colors)
    }

    /// Like [`Self::run`], but the member at `index` is redrawn from `bitmap`
    ///
    /// The bitmap's own colors go into the shared palette, so the edited image is not
    /// reduced on its own first. Its current palette and indices are ignored.
    ///
    /// # Errors
    ///
    /// See [`Self::run`]; additionally errors if `index` is outside the group
    /// ([`DomainError::UnknownPicture`]) or `bitmap` does not have that member's size
    /// ([`DomainError::DimensionMismatch`])
    #[instrument(level = "debug", skip(self, images, bitmap), fields(images = images.len()))]
    pub fn run_with_replacement(
        &self,
        images: &mut [EifImage],
        index: usize,
        bitmap: &RgbaBitmap,
    ) -> Result<Palette> {
        let expected = images
            .get(index)
            .ok_or(DomainError::UnknownPicture(index))?
            .dimensions();
        if bitmap.dimensions() != expected {
            return Err(DomainError::DimensionMismatch {
                expected,
                actual: bitmap.dimensions(),
            }
            .into());
        }
        let colors = images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                let image = image.as_multicolor()?;
                if i == index {
                    Ok(bitmap.pixels().map(|[r, g, b, _]| [r, g, b]).collect())
                } else {
                    image.colors()
                }
            })
            .collect::<Result<Vec<_>>>()?;
        self.apply(images, colors)
    }

    fn apply(&self, images: &mut [EifImage], colors: Vec<Vec<Rgb>>) -> Result<Palette> {
        let histogram = self.histogram(&colors);
        let used = median_cut::median_cut(&histogram, PALETTE_LEN, self.refine_passes);
        debug!(
            "{} distinct colors reduced to {}",
            histogram.len(),
            used.len()
        );

        let palette = Palette::new(used.clone())?.zero_filled();
        for (image, pixels) in images.iter_mut().zip(colors) {
            let indices = remap(&used, pixels.into_iter());
            image
                .as_multicolor_mut()?
                .set_palette(palette.clone(), indices);
        }
        Ok(palette)
    }

    fn histogram(&self, images: &[Vec<Rgb>]) -> Vec<(Rgb, f64)> {
        let mut histogram = BTreeMap::<Rgb, f64>::new();
        for pixels in images {
            #[allow(clippy::cast_precision_loss)]
            let weight = match self.weighting {
                Weighting::PixelCount | Weighting::Distinct => 1.0,
                Weighting::PerImage => 1.0 / pixels.len() as f64,
            };
            for &color in pixels {
                let entry = histogram.entry(color).or_default();
                match self.weighting {
                    Weighting::Distinct => *entry = 1.0,
                    Weighting::PixelCount | Weighting::PerImage => *entry += weight,
                }
            }
        }
        histogram.into_iter().collect()
    }
}

/// Moves every image of the group onto one shared palette, using the default [`Coalescer`]
///
/// # Errors
///
/// See [`Coalescer::run`]
pub fn coalesce(images: &mut [EifImage]) -> Result<Palette> {
    Coalescer::default().run(images)
}

/// Reduces a weighted color histogram to at most `max_colors` colors
///
/// Histograms with at most `max_colors` distinct colors come back unchanged, sorted
/// ascending. The result never holds more than [`PALETTE_LEN`] colors.
#[must_use]
pub fn quantize(histogram: &[(Rgb, f64)], max_colors: usize) -> Vec<Rgb> {
    median_cut::median_cut(histogram, max_colors.min(PALETTE_LEN), REFINE_PASSES)
}

/// Index of the nearest color for every pixel
///
/// `colors` must not be empty; index 0 is used otherwise.
pub(crate) fn remap(colors: &[Rgb], pixels: impl Iterator<Item = Rgb>) -> Vec<u8> {
    let mut cache = HashMap::new();
    pixels
        .map(|color| {
            *cache
                .entry(color)
                .or_insert_with(|| nearest_index(colors, color).unwrap_or(0))
        })
        .collect()
}
