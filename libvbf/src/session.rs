//! An opened VBF file with its pictures unpacked
//!
//! [`Session`] ties the codecs together: it reads the image section out of the container,
//! unpacks every zip item into an [`EifImage`], and on replacement runs the whole chain
//! backwards (palette coalescing for bonded multicolor pictures, encoding, packing, table
//! serialization, section replacement). Every mutation is computed on copies and committed
//! only once all of its steps have succeeded.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tracing::{debug, info, instrument};

use crate::{
    archive::{unwrap_entry, wrap_entry},
    coalesce::Coalescer,
    container::{VbfFile, IMAGE_SECTION_ID},
    error::{format_err, Boundary, DomainError, Result},
    image::{EifImage, EifKind, RgbaBitmap},
    section::{HeaderRecord, ImageSection, ResourceType},
    worker::Progress,
};

/// A decoded picture of the image section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    index: usize,
    name: String,
    image: EifImage,
    palette_key: Option<u16>,
}

impl Picture {
    /// Index among the zip items, equal to the index of its header record
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// File name stored in the item's archive
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decoded image
    #[must_use]
    pub const fn image(&self) -> &EifImage {
        &self.image
    }

    /// Palette fingerprint, shared by all pictures of a palette group
    #[must_use]
    pub const fn palette_key(&self) -> Option<u16> {
        self.palette_key
    }

    /// Depth of the image
    #[must_use]
    pub const fn kind(&self) -> EifKind {
        self.image.kind()
    }

    /// File name used when exporting: the entry name's stem with a `.bmp` extension
    #[must_use]
    pub fn export_name(&self) -> String {
        let stem = Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("picture_{}", self.index), str::to_owned);
        format!("{stem}.bmp")
    }
}

/// An opened container together with its decoded pictures
#[derive(Debug, Clone)]
pub struct Session {
    container: VbfFile,
    section: ImageSection,
    pictures: Vec<Picture>,
    path: Option<PathBuf>,
}

impl Session {
    /// Opens a VBF file and unpacks its pictures
    ///
    /// # Errors
    ///
    /// This function errors if the file cannot be read, or if the container, the image
    /// section or any picture is malformed
    #[instrument(level = "debug", skip(progress))]
    pub fn open(path: &Path, progress: &mut dyn FnMut(Progress)) -> Result<Self> {
        let mut session = Self::from_container(VbfFile::open(path)?, progress)?;
        session.path = Some(path.to_path_buf());
        Ok(session)
    }

    /// Unpacks the pictures of an already loaded container
    ///
    /// Progress counts the pictures unpacked.
    ///
    /// # Errors
    ///
    /// This function errors if the container has no image section or if the section or
    /// any picture is malformed
    pub fn from_container(container: VbfFile, progress: &mut dyn FnMut(Progress)) -> Result<Self> {
        let section = ImageSection::parse(container.section(IMAGE_SECTION_ID)?)?;
        let total = section.items_count(ResourceType::Zip);
        let pictures = unpack(&section, &mut |done| {
            progress(Progress {
                current: done,
                total,
            });
        })?;
        info!("unpacked {} pictures", pictures.len());
        Ok(Self {
            container,
            section,
            pictures,
            path: None,
        })
    }

    /// Path the session was opened from or last saved to
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying container
    #[must_use]
    pub const fn container(&self) -> &VbfFile {
        &self.container
    }

    /// The parsed image section
    #[must_use]
    pub const fn section(&self) -> &ImageSection {
        &self.section
    }

    /// All pictures, in item order
    #[must_use]
    pub fn pictures(&self) -> &[Picture] {
        &self.pictures
    }

    /// Picture at `index`
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnknownPicture`] if there is no such picture
    pub fn picture(&self, index: usize) -> Result<&Picture> {
        self.pictures
            .get(index)
            .ok_or_else(|| DomainError::UnknownPicture(index).into())
    }

    /// Placement records, one per picture
    #[must_use]
    pub fn records(&self) -> &[HeaderRecord] {
        self.section.records()
    }

    /// Multicolor pictures grouped by palette fingerprint
    #[must_use]
    pub fn palette_groups(&self) -> BTreeMap<u16, Vec<usize>> {
        let mut groups = BTreeMap::<u16, Vec<usize>>::new();
        for picture in &self.pictures {
            if let Some(key) = picture.palette_key {
                groups.entry(key).or_default().push(picture.index);
            }
        }
        groups
    }

    /// Indices of the pictures that share a palette with `index`, `index` included
    ///
    /// Pictures without a palette form a group of their own.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnknownPicture`] if there is no such picture
    pub fn group_of(&self, index: usize) -> Result<Vec<usize>> {
        let Some(key) = self.picture(index)?.palette_key else {
            return Ok(vec![index]);
        };
        Ok(self
            .pictures
            .iter()
            .filter(|p| p.palette_key == Some(key))
            .map(|p| p.index)
            .collect())
    }

    /// Replaces a picture with the content of `bitmap`
    ///
    /// The new image keeps the depth and signature of the picture it replaces. Replacing a
    /// multicolor picture moves its whole palette group onto a newly computed shared
    /// palette. Progress counts pictures packed, then pictures unpacked again.
    ///
    /// On error the session is left exactly as it was.
    ///
    /// # Errors
    ///
    /// This function will error if:
    /// - there is no picture at `index`
    /// - `bitmap` does not have the picture's dimensions ([`DomainError::DimensionMismatch`])
    /// - packing or re-reading the rebuilt section fails
    #[instrument(level = "debug", skip(self, bitmap, progress))]
    pub fn replace_picture(
        &mut self,
        index: usize,
        bitmap: &RgbaBitmap,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<()> {
        let original = self.picture(index)?;
        let expected = original.image.dimensions();
        if bitmap.dimensions() != expected {
            return Err(DomainError::DimensionMismatch {
                expected,
                actual: bitmap.dimensions(),
            }
            .into());
        }
        let kind = original.kind();

        let replacements = if kind == EifKind::Multicolor {
            let group = self.group_of(index)?;
            debug!("picture {index} shares its palette with {} pictures", group.len());
            let mut images = group
                .iter()
                .map(|&i| self.pictures[i].image.clone())
                .collect::<Vec<_>>();
            let position = group
                .iter()
                .position(|&i| i == index)
                .ok_or(DomainError::UnknownPicture(index))?;
            Coalescer::default().run_with_replacement(&mut images, position, bitmap)?;
            group.into_iter().zip(images).collect::<Vec<_>>()
        } else {
            let replacement =
                EifImage::from_rgba(kind, bitmap)?.with_signature(*original.image.signature());
            vec![(index, replacement)]
        };

        let total = replacements.len() + self.pictures.len();
        let mut section = self.section.clone();
        for (done, (i, image)) in replacements.iter().enumerate() {
            let encoded = image.encode();
            let uncompressed_size = u32::try_from(encoded.len()).map_err(|_| {
                format_err(
                    Boundary::Image,
                    format!("picture {i} encodes to {} bytes", encoded.len()),
                )
            })?;
            let packed = wrap_entry(&self.pictures[*i].name, &encoded)?;
            section.replace_item(
                ResourceType::Zip,
                *i,
                packed,
                uncompressed_size,
                image.dimensions(),
                u8::from(image.kind()),
            )?;
            progress(Progress {
                current: done + 1,
                total,
            });
        }

        // re-read what will be written, so a bad rebuild is caught before committing
        let bytes = section.serialize();
        let section = ImageSection::parse(&bytes)?;
        let packed = replacements.len();
        let pictures = unpack(&section, &mut |done| {
            progress(Progress {
                current: packed + done,
                total,
            });
        })?;

        self.container.replace_section(IMAGE_SECTION_ID, bytes)?;
        self.section = section;
        self.pictures = pictures;
        info!("replaced picture {index} ({packed} items repacked)");
        Ok(())
    }

    /// Writes every picture as `<dir>/<entry stem>.bmp`, returning the written paths
    ///
    /// # Errors
    ///
    /// This function errors if a picture cannot be converted or written
    #[instrument(level = "debug", skip(self, progress))]
    pub fn export_all(
        &self,
        dir: &Path,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<Vec<PathBuf>> {
        let total = self.pictures.len();
        let mut written = Vec::with_capacity(total);
        for picture in &self.pictures {
            let path = dir.join(picture.export_name());
            self.export_picture(picture.index, &path)?;
            written.push(path);
            progress(Progress {
                current: written.len(),
                total,
            });
        }
        info!("exported {} pictures to {}", written.len(), dir.display());
        Ok(written)
    }

    /// Writes one picture as a BMP file
    ///
    /// # Errors
    ///
    /// This function errors if there is no such picture, or it cannot be converted or written
    pub fn export_picture(&self, index: usize, path: &Path) -> Result<()> {
        self.picture(index)?.image.to_rgba()?.save_bmp(path)
    }

    /// Saves the container to `path` (see [`VbfFile::save`])
    ///
    /// # Errors
    ///
    /// This function errors if the file cannot be written
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.container.save(path)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }
}

/// Decodes every zip item; `progress` gets the number of items done
fn unpack(section: &ImageSection, progress: &mut dyn FnMut(usize)) -> Result<Vec<Picture>> {
    let count = section.items_count(ResourceType::Zip);
    let mut pictures = Vec::with_capacity(count);
    for index in 0..count {
        let entry = unwrap_entry(section.item_data(ResourceType::Zip, index)?)?;
        let image = EifImage::decode(&entry.data)?;
        debug!(
            "picture {index}: {} {} {}x{}",
            entry.name,
            image.kind(),
            image.width(),
            image.height()
        );
        pictures.push(Picture {
            index,
            name: entry.name,
            palette_key: image.palette_key(),
            image,
        });
        progress(index + 1);
    }
    Ok(pictures)
}
