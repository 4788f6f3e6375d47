//! Configuration and request/result types for kommverter conversions.

use crate::error::{ConversionError, Result};
use crate::formats::Format;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Header bytes read when sniffing image formats.
pub const DEFAULT_SNIFF_BYTES: usize = 64;

/// Smallest header that still covers every supported image signature.
const MIN_SNIFF_BYTES: usize = 12;

/// Resampling filter used when scaling images.
///
/// Nearest-neighbor is not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResampleFilter {
    pub fn filter_type(self) -> FilterType {
        match self {
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for image decoding, resizing and encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Filter used for scale factors below 1.
    /// Default: Lanczos3.
    pub filter: ResampleFilter,

    /// Color transparent pixels are flattened onto for targets without alpha.
    /// Default: white (255, 255, 255).
    pub background_color: (u8, u8, u8),

    /// Header bytes read to confirm an image format from its content.
    /// Default: 64.
    pub sniff_bytes: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            filter: ResampleFilter::Lanczos3,
            background_color: (255, 255, 255),
            sniff_bytes: DEFAULT_SNIFF_BYTES,
        }
    }
}

impl ImageConfig {
    /// Set the resampling filter.
    pub fn filter(mut self, filter: ResampleFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the flattening background color.
    pub fn background_color(mut self, color: (u8, u8, u8)) -> Self {
        self.background_color = color;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.sniff_bytes < MIN_SNIFF_BYTES {
            return Err(ConversionError::InvalidConfig(format!(
                "sniff_bytes must be at least {}",
                MIN_SNIFF_BYTES
            )));
        }
        Ok(())
    }
}

/// Configuration for the external document converters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Path to the soffice binary. If None, searches well-known locations and PATH.
    pub soffice_path: Option<PathBuf>,

    /// Path to the pdf2docx CLI. If None, searches PATH.
    pub pdf2docx_path: Option<PathBuf>,

    /// Directory for LibreOffice user profiles.
    /// Default: system temp directory.
    pub temp_dir: Option<PathBuf>,
}

impl DocumentConfig {
    /// Set the soffice binary path.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.soffice_path = Some(path);
        self
    }

    /// Set the pdf2docx binary path.
    pub fn pdf2docx_path(mut self, path: PathBuf) -> Self {
        self.pdf2docx_path = Some(path);
        self
    }

    /// Set the temporary directory.
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.temp_dir {
            if !dir.is_dir() {
                return Err(ConversionError::InvalidConfig(format!(
                    "temp_dir {:?} is not a directory",
                    dir
                )));
            }
        }
        Ok(())
    }
}

/// Combined configuration for the converter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Image configuration.
    pub image: ImageConfig,

    /// Document configuration.
    pub document: DocumentConfig,
}

impl ConverterConfig {
    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        self.image.validate()?;
        self.document.validate()?;
        Ok(())
    }
}

/// Fractional resize multiplier in (0, 1], applied to both dimensions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Scale(f64);

impl Scale {
    /// Keep the original size.
    pub const ORIGINAL: Scale = Scale(1.0);

    /// Factors offered by the conversion screen.
    pub const PRESETS: [Scale; 5] = [
        Scale(1.0),
        Scale(0.8),
        Scale(0.6),
        Scale(0.4),
        Scale(0.2),
    ];

    pub fn new(factor: f64) -> Result<Self> {
        if factor.is_finite() && factor > 0.0 && factor <= 1.0 {
            Ok(Scale(factor))
        } else {
            Err(ConversionError::InvalidScale(factor.to_string()))
        }
    }

    pub fn factor(self) -> f64 {
        self.0
    }

    pub fn is_original(self) -> bool {
        self.0 == 1.0
    }

    /// Target dimensions: `round(w*s) × round(h*s)`, never below one pixel.
    pub fn apply(self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| ((v as f64 * self.0).round() as u32).max(1);
        (scale(width), scale(height))
    }
}

impl Default for Scale {
    fn default() -> Self {
        Scale::ORIGINAL
    }
}

impl TryFrom<f64> for Scale {
    type Error = ConversionError;

    fn try_from(factor: f64) -> Result<Self> {
        Scale::new(factor)
    }
}

impl From<Scale> for f64 {
    fn from(scale: Scale) -> f64 {
        scale.0
    }
}

impl FromStr for Scale {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self> {
        let factor: f64 = s
            .trim()
            .parse()
            .map_err(|_| ConversionError::InvalidScale(s.to_string()))?;
        Scale::new(factor)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single conversion request.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Path to the source file.
    pub source_path: PathBuf,

    /// Detected format of the source.
    pub source_format: Format,

    /// Format to produce.
    pub target_format: Format,

    /// Resize factor (images only).
    pub scale: Scale,

    /// File to create or overwrite.
    pub output_path: PathBuf,
}

impl ConversionRequest {
    /// Create a new conversion request at the original size.
    pub fn new(
        source_path: impl Into<PathBuf>,
        source_format: Format,
        target_format: Format,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            source_format,
            target_format,
            scale: Scale::ORIGINAL,
            output_path: output_path.into(),
        }
    }

    /// Set the resize factor.
    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }
}

/// A successfully written output file.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    /// Original input path.
    pub input_path: PathBuf,

    /// Path of the written output.
    pub output_path: PathBuf,

    /// Size of the output in bytes.
    pub bytes_written: u64,

    /// Processing time.
    pub duration: Duration,
}

/// Outcome of a conversion as reported to the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,

    /// Output path written, or the one that was attempted.
    pub output_path: Option<PathBuf>,

    /// User-visible error message on failure.
    pub error: Option<String>,
}

impl ConversionResult {
    pub fn succeeded(output_path: PathBuf) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            error: None,
        }
    }

    pub fn failed(output_path: Option<PathBuf>, error: &ConversionError) -> Self {
        Self {
            success: false,
            output_path,
            error: Some(error.to_string()),
        }
    }
}

/// Byte size with a human-readable rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEstimate {
    /// Size in bytes, `None` when it could not be computed.
    pub bytes: Option<u64>,

    /// Display string such as `"1.5 MB"` or `"unavailable"`.
    pub human: String,
}

impl SizeEstimate {
    pub const UNAVAILABLE: &'static str = "unavailable";

    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            bytes: Some(bytes),
            human: format_size(bytes),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            bytes: None,
            human: Self::UNAVAILABLE.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.bytes.is_some()
    }
}

/// Format a byte size into a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit_index = 0usize;
    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }
    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", value, UNITS[unit_index])
    }
}
