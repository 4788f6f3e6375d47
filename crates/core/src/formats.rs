//! Format catalog: extension lookup, categories and magic-byte sniffing.
//!
//! The catalog is a static table mapping every recognized extension to a
//! [`Format`]. Image files are additionally confirmed against their content
//! header, so a PNG saved as `photo.jpg` is still detected as PNG.

use crate::config::DEFAULT_SNIFF_BYTES;
use crate::error::{ConversionError, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Broad family a format belongs to. Each category has exactly one converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Document,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Image => write!(f, "image"),
            Category::Document => write!(f, "document"),
        }
    }
}

/// A catalog format, identified by its canonical lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Png,
    /// Both `jpg` and `jpeg` resolve here.
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    Bmp,
    Gif,
    /// Both `tif` and `tiff` resolve here.
    #[serde(alias = "tif")]
    Tiff,
    Webp,
    Pdf,
    Doc,
    Docx,
    Txt,
    Rtf,
    Odt,
}

/// Extension table. Aliases map to the same format.
static CATALOG: &[(&str, Format)] = &[
    ("png", Format::Png),
    ("jpg", Format::Jpeg),
    ("jpeg", Format::Jpeg),
    ("bmp", Format::Bmp),
    ("gif", Format::Gif),
    ("tif", Format::Tiff),
    ("tiff", Format::Tiff),
    ("webp", Format::Webp),
    ("pdf", Format::Pdf),
    ("doc", Format::Doc),
    ("docx", Format::Docx),
    ("txt", Format::Txt),
    ("rtf", Format::Rtf),
    ("odt", Format::Odt),
];

impl Format {
    /// Every catalog format, images first, in display order.
    pub const ALL: [Format; 12] = [
        Format::Png,
        Format::Jpeg,
        Format::Bmp,
        Format::Gif,
        Format::Tiff,
        Format::Webp,
        Format::Pdf,
        Format::Doc,
        Format::Docx,
        Format::Txt,
        Format::Rtf,
        Format::Odt,
    ];

    /// Resolve an extension or format name (`"JPG"`, `".jpeg"`, `"tif"`).
    pub fn from_extension(ext: &str) -> Option<Format> {
        let ext = ext.trim().trim_start_matches('.');
        CATALOG
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|&(_, format)| format)
    }

    /// Parse a user-facing format name such as `"JPEG"` or `"tif"`.
    pub fn parse(name: &str) -> Option<Format> {
        Self::from_extension(name)
    }

    /// Whether two formats are the same format under different names.
    ///
    /// Aliases collapse into one variant, so this is plain equality.
    pub fn is_equivalent(a: Format, b: Format) -> bool {
        a == b
    }

    /// Canonical lowercase name, also used as the output file extension.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Format::Png => "png",
            Format::Jpeg => "jpg",
            Format::Bmp => "bmp",
            Format::Gif => "gif",
            Format::Tiff => "tiff",
            Format::Webp => "webp",
            Format::Pdf => "pdf",
            Format::Doc => "doc",
            Format::Docx => "docx",
            Format::Txt => "txt",
            Format::Rtf => "rtf",
            Format::Odt => "odt",
        }
    }

    /// Extension written on output files.
    pub fn extension(self) -> &'static str {
        self.canonical_name()
    }

    pub fn category(self) -> Category {
        match self {
            Format::Png
            | Format::Jpeg
            | Format::Bmp
            | Format::Gif
            | Format::Tiff
            | Format::Webp => Category::Image,
            Format::Pdf
            | Format::Doc
            | Format::Docx
            | Format::Txt
            | Format::Rtf
            | Format::Odt => Category::Document,
        }
    }

    pub fn is_image(self) -> bool {
        self.category() == Category::Image
    }

    /// Whether the encoder for this format can store an alpha channel.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Format::Jpeg) && self.is_image()
    }

    /// The image crate's format for image targets.
    pub fn image_format(self) -> Option<ImageFormat> {
        match self {
            Format::Png => Some(ImageFormat::Png),
            Format::Jpeg => Some(ImageFormat::Jpeg),
            Format::Bmp => Some(ImageFormat::Bmp),
            Format::Gif => Some(ImageFormat::Gif),
            Format::Tiff => Some(ImageFormat::Tiff),
            Format::Webp => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Map a sniffed image format back into the catalog.
    pub fn from_image_format(format: ImageFormat) -> Option<Format> {
        match format {
            ImageFormat::Png => Some(Format::Png),
            ImageFormat::Jpeg => Some(Format::Jpeg),
            ImageFormat::Bmp => Some(Format::Bmp),
            ImageFormat::Gif => Some(Format::Gif),
            ImageFormat::Tiff => Some(Format::Tiff),
            ImageFormat::WebP => Some(Format::Webp),
            _ => None,
        }
    }

    pub fn info(self) -> FormatInfo {
        FormatInfo {
            format: self,
            category: self.category(),
            canonical_name: self.canonical_name(),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Catalog entry for a recognized format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    pub format: Format,
    pub category: Category,
    pub canonical_name: &'static str,
}

/// Outcome of looking a file up in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedFormat {
    /// File that was inspected.
    pub path: PathBuf,
    /// Canonical name when recognized, otherwise the raw lowercase extension.
    pub identifier: String,
    /// Catalog entry, if the format is recognized.
    pub info: Option<FormatInfo>,
    /// Whether the content header overrode the extension.
    pub sniffed: bool,
}

impl DetectedFormat {
    pub fn format(&self) -> Option<Format> {
        self.info.map(|i| i.format)
    }

    /// The format, or `UnrecognizedFormat` when the file is outside the catalog.
    pub fn require_format(&self) -> Result<Format> {
        self.format()
            .ok_or_else(|| ConversionError::UnrecognizedFormat {
                path: self.path.clone(),
                extension: self.identifier.clone(),
            })
    }

    pub fn category(&self) -> Result<Category> {
        self.require_format().map(Format::category)
    }
}

/// Read-only view over the static format table.
#[derive(Debug, Clone)]
pub struct FormatCatalog {
    /// Number of header bytes read for content sniffing.
    sniff_bytes: usize,
}

impl Default for FormatCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatCatalog {
    pub fn new() -> Self {
        Self {
            sniff_bytes: DEFAULT_SNIFF_BYTES,
        }
    }

    /// Catalog reading `sniff_bytes` of header when confirming image formats.
    pub fn with_sniff_bytes(sniff_bytes: usize) -> Self {
        Self { sniff_bytes }
    }

    /// All catalog formats.
    pub fn formats(&self) -> &'static [Format] {
        &Format::ALL
    }

    /// Catalog formats of one category.
    pub fn formats_in(&self, category: Category) -> impl Iterator<Item = Format> {
        Format::ALL
            .into_iter()
            .filter(move |f| f.category() == category)
    }

    /// Formats offered for a file detected as `source`.
    ///
    /// Every catalog format except the source itself. Formats of the source's
    /// category come first, so the first entry is always a convertible pair
    /// when one exists; cross-category entries fail at convert time.
    pub fn targets_for(&self, source: &DetectedFormat) -> Vec<Format> {
        let Some(format) = source.format() else {
            return Format::ALL.to_vec();
        };

        let (mut targets, others): (Vec<Format>, Vec<Format>) = Format::ALL
            .into_iter()
            .filter(|&f| !Format::is_equivalent(f, format))
            .partition(|f| f.category() == format.category());
        targets.extend(others);
        targets
    }

    /// Detect the format of `path`.
    ///
    /// Extensions outside the image set are trusted as-is. Image extensions
    /// are confirmed against the file header and the header wins when it
    /// names a different catalog image format.
    pub fn lookup(&self, path: &Path) -> DetectedFormat {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_default();

        let by_extension = Format::from_extension(&extension);

        let Some(format) = by_extension.filter(|f| f.is_image()) else {
            return DetectedFormat {
                path: path.to_path_buf(),
                identifier: by_extension
                    .map(|f| f.canonical_name().to_string())
                    .unwrap_or(extension),
                info: by_extension.map(Format::info),
                sniffed: false,
            };
        };

        match self.sniff(path) {
            Some(sniffed) if sniffed != format => {
                warn!(
                    "{:?} has a .{} extension but contains {} data, using {}",
                    path, extension, sniffed, sniffed
                );
                DetectedFormat {
                    path: path.to_path_buf(),
                    identifier: sniffed.canonical_name().to_string(),
                    info: Some(sniffed.info()),
                    sniffed: true,
                }
            }
            Some(_) => {
                debug!("Confirmed {:?} as {}", path, format);
                DetectedFormat {
                    path: path.to_path_buf(),
                    identifier: format.canonical_name().to_string(),
                    info: Some(format.info()),
                    sniffed: false,
                }
            }
            None => {
                warn!(
                    "Could not confirm {:?} from its content, trusting the .{} extension",
                    path, extension
                );
                DetectedFormat {
                    path: path.to_path_buf(),
                    identifier: format.canonical_name().to_string(),
                    info: Some(format.info()),
                    sniffed: false,
                }
            }
        }
    }

    /// Guess a catalog image format from the file header.
    fn sniff(&self, path: &Path) -> Option<Format> {
        let mut header = Vec::with_capacity(self.sniff_bytes);
        let read = File::open(path)
            .and_then(|file| file.take(self.sniff_bytes as u64).read_to_end(&mut header));
        if let Err(e) = read {
            debug!("Cannot read header of {:?}: {}", path, e);
            return None;
        }

        image::guess_format(&header)
            .ok()
            .and_then(Format::from_image_format)
    }
}
