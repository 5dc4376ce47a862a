use crate::{image::EifKind, section::ResourceType};
use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Convenience alias used throughout `libvbf`
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
/// Possible `libvbf` errors
pub enum Error {
    /// Malformed bytes at one of the parse boundaries
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The requested (resource type, index) pair does not exist
    #[error("{resource} item {index} is out of range ({count} items present)")]
    OutOfRange {
        /// resource type that was asked for
        resource: ResourceType,
        /// requested index
        index: usize,
        /// number of items of that type
        count: usize,
    },

    /// The operation is not valid for the given data. The message is meant for humans.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Container has no section with this id
    #[error("section {0} not found in container")]
    SectionNotFound(usize),

    /// Error returned if a file cannot be read or written
    #[error("i/o error")]
    Io(#[from] std::io::Error),

    /// Error returned if a plain bitmap cannot be read or written
    #[error("bitmap error")]
    Bitmap(#[from] image::ImageError),

    /// Another job currently holds the session
    #[error("another operation is still running")]
    Busy,

    /// A worker thread panicked before reporting a result
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Where a [`FormatError`] was detected
#[derive(Debug, Display, IntoStaticStr, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Boundary {
    /// VBF container (header text or blocks)
    Container,
    /// Image section resource table
    Section,
    /// Single-entry zip archive
    Archive,
    /// EIF image
    Image,
    /// Palette lookups
    Palette,
}

/// Malformed input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{context} format error: {reason}")]
pub struct FormatError {
    /// parse boundary that rejected the input
    pub context: Boundary,
    /// human readable reason
    pub reason: String,
}

impl FormatError {
    pub(crate) fn new(context: Boundary, reason: impl Into<String>) -> Self {
        Self {
            context,
            reason: reason.into(),
        }
    }
}

/// Domain errors, surfaced verbatim to the caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomainError {
    /// Replacement image does not have the size of the picture it replaces
    #[error("replacement size {actual:?} does not match picture size {expected:?}")]
    DimensionMismatch {
        /// (width, height) of the picture being replaced
        expected: (u16, u16),
        /// (width, height) of the replacement
        actual: (u16, u16),
    },
    /// A palette group must contain at least one image
    #[error("palette group is empty")]
    EmptyPaletteGroup,
    /// Image has the wrong depth for the operation
    #[error("expected a {expected} image, found {actual}")]
    DepthMismatch {
        /// depth required by the operation
        expected: EifKind,
        /// depth of the image that was given
        actual: EifKind,
    },
    /// Plain bitmap is larger than an EIF image can be
    #[error("bitmap of {width}x{height} pixels is too large")]
    BitmapTooLarge {
        /// bitmap width
        width: u32,
        /// bitmap height
        height: u32,
    },
    /// No picture with this index was loaded
    #[error("no picture with index {0}")]
    UnknownPicture(usize),
}

pub(crate) fn format_err(context: Boundary, reason: impl Into<String>) -> Error {
    Error::Format(FormatError::new(context, reason))
}
