//! # kommverter-core
//!
//! File-conversion core of the kommverter drag-and-drop converter.
//!
//! The presentation layer hands a file path to a [`Session`], picks a target
//! format and scale, and asks for a conversion. The core:
//!
//! - detects the source format from its extension, confirmed by the image
//!   header for image files
//! - re-encodes images between PNG, JPEG, BMP, GIF, TIFF and WebP, with
//!   optional high-quality downscaling
//! - converts documents (pdf→docx, doc/docx→pdf) through LibreOffice or
//!   `pdf2docx`
//! - computes output paths and in-memory size estimates
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kommverter_core::{ConversionRequest, Converter, ConverterConfig, Format, Scale};
//!
//! fn main() -> anyhow::Result<()> {
//!     let converter = Converter::new(ConverterConfig::default())?;
//!
//!     let request = ConversionRequest::new("photo.png", Format::Png, Format::Jpeg, "photo.jpg")
//!         .with_scale(Scale::new(0.5)?);
//!     let result = converter.convert(&request)?;
//!
//!     println!("Wrote {} bytes to {:?}", result.bytes_written, result.output_path);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod converter;
pub mod document;
pub mod error;
pub mod formats;
pub mod image_converter;
pub mod libreoffice;
mod output;
pub mod session;

// Re-export main types for convenience
pub use config::{
    ConversionRequest, ConversionResult, ConvertedFile, ConverterConfig, DocumentConfig,
    ImageConfig, ResampleFilter, Scale, SizeEstimate,
};
pub use converter::{Converter, ConverterBuilder};
pub use document::{Capability, DocumentBackend, DocumentConverter, Pdf2DocxBackend};
pub use error::{ConversionError, Result};
pub use formats::{Category, DetectedFormat, Format, FormatCatalog, FormatInfo};
pub use image_converter::ImageConverter;
pub use libreoffice::LibreOfficeBackend;
pub use session::{LoadedFile, OutputLocation, Session, SessionState};

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
