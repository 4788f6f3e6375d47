//! Error types for kommverter conversions.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the conversion core.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The category (image or document) of a file could not be determined.
    #[error("Unrecognized format for '{path}' (extension: '{extension}')")]
    UnrecognizedFormat { path: PathBuf, extension: String },

    /// The requested source/target pair is not supported.
    #[error("Conversion from {from} to {to} is not supported")]
    UnsupportedConversion { from: String, to: String },

    /// The external converter needed for this pair is not installed.
    #[error("{name} is required for this conversion but was not found. Install it and ensure it is in PATH")]
    MissingCapability { name: String },

    /// Decoding, encoding or an external converter failed.
    #[error("Conversion failed for '{path}': {message}")]
    ConversionFailed { path: PathBuf, message: String },

    /// Reading or writing a file failed.
    #[error("Filesystem error at '{path}': {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file not found.
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Scale factor outside (0, 1].
    #[error("Invalid scale factor {0}: must be greater than 0 and at most 1")]
    InvalidScale(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation needing a loaded file was called on an empty session.
    #[error("No file selected")]
    NoFileSelected,
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, ConversionError>;

impl ConversionError {
    /// Wrap an io error together with the path it happened on.
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported(from: impl ToString, to: impl ToString) -> Self {
        ConversionError::UnsupportedConversion {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unsupported_conversion() {
        let err = ConversionError::unsupported("odt", "pdf");
        let msg = format!("{}", err);
        assert!(msg.contains("odt"));
        assert!(msg.contains("pdf"));
        assert!(msg.contains("not supported"));
    }

    #[test]
    fn test_error_display_missing_capability() {
        let err = ConversionError::MissingCapability {
            name: "LibreOffice (soffice)".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("LibreOffice (soffice)"));
        assert!(msg.contains("PATH"));
    }

    #[test]
    fn test_error_display_conversion_failed() {
        let err = ConversionError::ConversionFailed {
            path: PathBuf::from("/path/to/photo.png"),
            message: "Invalid image header".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("/path/to/photo.png"));
        assert!(msg.contains("Invalid image header"));
    }

    #[test]
    fn test_error_display_filesystem_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory");
        let err = ConversionError::filesystem("/missing/out.png", io_err);
        let msg = format!("{}", err);
        assert!(msg.contains("/missing/out.png"));
        assert!(msg.contains("no such directory"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_display_unrecognized_format() {
        let err = ConversionError::UnrecognizedFormat {
            path: PathBuf::from("archive.xyz"),
            extension: "xyz".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("archive.xyz"));
        assert!(msg.contains("'xyz'"));
    }

    #[test]
    fn test_error_display_invalid_scale() {
        let err = ConversionError::InvalidScale("1.5".to_string());
        assert!(format!("{}", err).contains("1.5"));
    }

    #[test]
    fn test_error_debug_impl() {
        let err = ConversionError::NoFileSelected;
        let debug = format!("{:?}", err);
        assert!(debug.contains("NoFileSelected"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(ConversionError::NoFileSelected)
        }
        assert!(returns_error().is_err());
    }
}
