//! Export of layout outcomes.
//!
//! The [`Exporter`] trait is the last stage of the pipeline: it turns a
//! [`LayoutOutcome`] into an output file.
//!
//! # Available Backends
//!
//! - [`svg`]: an SVG preview of the positioned placeholders via [`svg::SvgPreview`]

/// SVG export backend.
pub mod svg;

use crate::outcome::LayoutOutcome;

/// Abstraction for outcome export backends.
pub trait Exporter {
    /// Exports a layout outcome to the backend's output format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if the outcome cannot be converted to the
    /// target format, or [`Error::Io`] if writing the output fails.
    fn export_outcome(&mut self, outcome: &LayoutOutcome) -> Result<(), Error>;
}

/// Errors that can occur during export.
///
/// Converted into [`StrataError::Export`] at the crate boundary.
///
/// [`StrataError::Export`]: crate::StrataError::Export
#[derive(Debug)]
pub enum Error {
    /// A rendering or conversion failure described by `message`.
    Render(String),
    /// An I/O error encountered while writing output.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render(msg) => write!(f, "Render error: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(_) => None,
            Self::Io(err) => Some(err),
        }
    }
}
