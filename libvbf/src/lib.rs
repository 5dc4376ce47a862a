//! # libvbf
//!
//!
//! This library reads and edits the image resources embedded in VBF files, the block based
//! container format used to flash automotive ECUs, as found in instrument cluster firmware.
//!
//! A VBF file is an ASCII header (`vbf_version = ...; header { ... }`) followed by data
//! blocks, each with a start address, a length and a CRC-16. In cluster firmware one of the
//! blocks holds a resource table: placement records for every picture, followed by the
//! pictures themselves, each one an EIF image packed into a single-entry zip archive.
//!
//! The crate is layered the same way:
//! - [`container`]: the VBF file, its header and blocks, with atomic saving
//! - [`section`]: the resource table of the image block
//! - [`archive`]: the single-entry zip wrapper around every picture
//! - [`image`]: EIF images in their three depths, and conversion to and from RGBA bitmaps
//! - [`coalesce`]: shared palettes for multicolor pictures that must stay palette-bonded
//! - [`session`] and [`worker`]: the whole chain put together, optionally in a background thread
//!
//! ### Usage
//!
//! #### Exporting every picture
//!
//! ```rust,no_run
//! use std::path::Path;
//! use libvbf::Session;
//!
//! fn main() -> libvbf::Result<()> {
//!     let session = Session::open(Path::new("cluster.vbf"), &mut |_| {})?;
//!     for picture in session.pictures() {
//!         println!(
//!             "{}: {} {}x{}",
//!             picture.name(),
//!             picture.kind(),
//!             picture.image().width(),
//!             picture.image().height()
//!         );
//!     }
//!     session.export_all(Path::new("pictures"), &mut |p| {
//!         println!("{}/{}", p.current, p.total);
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! #### Replacing a picture
//!
//! The replacement must have the size of the picture it replaces. Multicolor pictures that
//! share their palette with others are re-quantized together, so the whole group keeps
//! sharing one palette.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use libvbf::{RgbaBitmap, Session};
//!
//! fn main() -> libvbf::Result<()> {
//!     let mut session = Session::open(Path::new("cluster.vbf"), &mut |_| {})?;
//!     let bitmap = RgbaBitmap::open(Path::new("speedometer.bmp"))?;
//!     session.replace_picture(3, &bitmap, &mut |_| {})?;
//!     session.save(Path::new("cluster_patched.vbf"))?;
//!     Ok(())
//! }
//! ```
//!
//! #### Checksums
//!
//! Block CRCs and the header's `file_checksum` entry are recomputed on save. A
//! `file_checksum` that does not match on open is only reported as a warning, since
//! tooling in the field does not agree on it.
//!

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

mod error;

pub mod archive;
pub mod checksum;
pub mod coalesce;
pub mod container;
/// EIF images and RGBA bitmaps
pub mod image;
pub mod section;
pub mod session;
pub mod worker;

pub use error::{Boundary, DomainError, Error, FormatError, Result};
pub use container::{Section, VbfFile, VbfHeader, IMAGE_SECTION_ID};
pub use image::{
    EifImage, EifKind, MonochromeImage, MulticolorImage, Palette, RgbaBitmap, SupercolorImage,
};
pub use section::{HeaderRecord, ImageSection, ResourceItem, ResourceType};
pub use session::{Picture, Session};
pub use worker::{Coordinator, Job, Progress};
