//! Integration tests for kommverter-core.
//!
//! Image tests are self-contained. Document tests that need LibreOffice are
//! skipped when `soffice` is not installed.
//!
//! Run with: cargo test --package kommverter-core --test integration_tests

use image::{
    DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgb, RgbImage, Rgba, RgbaImage,
};
use kommverter_core::{
    ConversionError, ConversionRequest, Converter, ConverterBuilder, ConverterConfig,
    DocumentBackend, Format, OutputLocation, Result, Scale, Session, SessionState,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::TempDir;

const IMAGE_FORMATS: [Format; 6] = [
    Format::Png,
    Format::Jpeg,
    Format::Bmp,
    Format::Gif,
    Format::Tiff,
    Format::Webp,
];

fn converter() -> Arc<Converter> {
    Arc::new(Converter::new(ConverterConfig::default()).unwrap())
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    })
}

/// RGBA image whose top half is fully transparent black.
fn transparent_top(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |_, y| {
        if y < height / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([20, 160, 60, 255])
        }
    }))
}

fn save(img: &DynamicImage, path: &Path, format: Format) {
    img.save_with_format(path, format.image_format().unwrap())
        .unwrap();
}

fn sniffed_format(path: &Path) -> Option<ImageFormat> {
    ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .format()
}

/// Name, length and modification time of every entry in `dir`.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, (u64, SystemTime)> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let entry = e.unwrap();
            let meta = entry.metadata().unwrap();
            (entry.path(), (meta.len(), meta.modified().unwrap()))
        })
        .collect()
}

fn libreoffice_available() -> bool {
    which::which("soffice").is_ok() || which::which("libreoffice").is_ok()
}

// ============================================================================
// Image conversion
// ============================================================================

#[test]
fn test_every_image_pair_produces_scaled_decodable_output() {
    let dir = TempDir::new().unwrap();
    let converter = converter();
    let scale = Scale::new(0.6).unwrap();
    let source_img = DynamicImage::ImageRgb8(gradient(25, 15));

    for from in IMAGE_FORMATS {
        let source = dir.path().join(format!("source.{}", from.extension()));
        save(&source_img, &source, from);

        for to in IMAGE_FORMATS.into_iter().filter(|&to| to != from) {
            let output = dir.path().join(format!("{}_to.{}", from, to.extension()));
            let request = ConversionRequest::new(&source, from, to, &output).with_scale(scale);

            converter
                .convert(&request)
                .unwrap_or_else(|e| panic!("{} -> {} failed: {}", from, to, e));

            assert_eq!(sniffed_format(&output), to.image_format(), "{} -> {}", from, to);
            let decoded = image::open(&output).unwrap();
            assert_eq!(decoded.dimensions(), (15, 9), "{} -> {}", from, to);
        }
    }
}

#[test]
fn test_transparent_png_to_jpeg_is_white_not_black() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("logo.png");
    let output = dir.path().join("logo.jpg");
    save(&transparent_top(32, 32), &source, Format::Png);

    let request = ConversionRequest::new(&source, Format::Png, Format::Jpeg, &output);
    converter().convert(&request).unwrap();

    assert_eq!(sniffed_format(&output), Some(ImageFormat::Jpeg));
    let decoded = image::open(&output).unwrap();
    assert!(!decoded.color().has_alpha());

    let rgb = decoded.to_rgb8();
    let corner = rgb.get_pixel(2, 2);
    assert!(corner.0.iter().all(|&c| c > 240), "transparent area rendered as {:?}", corner);
    let opaque = rgb.get_pixel(16, 28);
    assert!(opaque[1] > 120 && opaque[0] < 80, "opaque area rendered as {:?}", opaque);
}

#[test]
fn test_photo_png_scaled_to_jpeg_via_session() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("photo.PNG");
    save(&DynamicImage::ImageRgb8(gradient(3000, 2000)), &source, Format::Png);

    let mut session = Session::new(converter());
    session.set_file(&source).unwrap();
    session.set_target_format(Format::Jpeg).unwrap();
    session.set_scale("0.4".parse().unwrap());

    let result = session.convert();
    assert!(result.success, "{:?}", result.error);

    let output = result.output_path.unwrap();
    assert_eq!(output, dir.path().join("photo.jpg"));
    assert_eq!(sniffed_format(&output), Some(ImageFormat::Jpeg));

    let decoded = image::open(&output).unwrap();
    assert_eq!(decoded.dimensions(), (1200, 800));
    assert!(!decoded.color().has_alpha());
}

#[test]
fn test_mislabeled_source_is_converted_by_content() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("really_a_png.jpg");
    save(&transparent_top(8, 8), &source, Format::Png);

    let mut session = Session::new(converter());
    session.set_file(&source).unwrap();

    assert_eq!(session.file().unwrap().detected.format(), Some(Format::Png));
    assert!(session.target_formats().contains(&Format::Jpeg));
    assert!(!session.target_formats().contains(&Format::Png));

    session.set_target_format(Format::Jpeg).unwrap();
    let original = std::fs::read(&source).unwrap();
    let refused = session.convert();
    assert!(!refused.success);
    assert_eq!(std::fs::read(&source).unwrap(), original);

    session.set_output_override(Some(dir.path().join("fixed.jpg")));
    let result = session.convert();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(sniffed_format(&dir.path().join("fixed.jpg")), Some(ImageFormat::Jpeg));
    assert_eq!(std::fs::read(&source).unwrap(), original);
}

#[test]
fn test_failed_conversion_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("corrupt.png");
    std::fs::write(&source, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRgarbage").unwrap();

    let mut session = Session::new(converter());
    session.set_file(&source).unwrap();
    session.set_target_format(Format::Bmp).unwrap();

    let before = snapshot(dir.path());
    let result = session.convert();

    assert!(!result.success);
    assert_eq!(session.state(), SessionState::Loaded);
    assert_eq!(snapshot(dir.path()), before);
}

// ============================================================================
// Size estimation
// ============================================================================

#[test]
fn test_estimate_has_no_filesystem_side_effects() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("photo.png");
    save(&transparent_top(64, 48), &source, Format::Png);

    let mut session = Session::new(converter());
    session.set_file(&source).unwrap();

    let before = snapshot(dir.path());
    for target in [Format::Jpeg, Format::Webp, Format::Tiff] {
        session.set_target_format(target).unwrap();
        for scale in Scale::PRESETS {
            session.set_scale(scale);
            assert!(session.estimate_output_size().is_available());
        }
    }
    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn test_estimate_matches_actual_output() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("photo.png");
    save(&DynamicImage::ImageRgb8(gradient(50, 40)), &source, Format::Png);

    let mut session = Session::new(converter());
    session.set_file(&source).unwrap();
    session.set_target_format(Format::Bmp).unwrap();
    session.set_scale(Scale::new(0.8).unwrap());

    let estimate = session.estimate_output_size();
    let result = session.convert();
    let written = std::fs::metadata(result.output_path.unwrap()).unwrap().len();

    assert_eq!(estimate.bytes, Some(written));
}

#[test]
fn test_estimate_degrades_for_corrupt_source() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("broken.gif");
    std::fs::write(&source, b"GIF89a-not-really").unwrap();

    let mut session = Session::new(converter());
    session.set_file(&source).unwrap();

    let estimate = session.estimate_output_size();
    assert_eq!(estimate.bytes, None);
    assert_eq!(estimate.human, "unavailable");
}

// ============================================================================
// Output paths
// ============================================================================

#[test]
fn test_output_override_extension_follows_target() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("archive")).unwrap();
    let source = dir.path().join("photo.png");
    save(&DynamicImage::ImageRgb8(gradient(6, 6)), &source, Format::Png);

    let mut session = Session::new(converter());
    session.set_file(&source).unwrap();
    session.set_target_format(Format::Gif).unwrap();
    session.set_output_override(Some(dir.path().join("archive").join("out.bmp")));

    let result = session.convert();
    assert!(result.success, "{:?}", result.error);

    let expected = dir.path().join("archive").join("out.gif");
    assert_eq!(result.output_path, Some(expected.clone()));
    assert_eq!(sniffed_format(&expected), Some(ImageFormat::Gif));
    assert!(!dir.path().join("archive").join("out.bmp").exists());
}

#[test]
fn test_output_directory_is_not_created() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("photo.png");
    save(&DynamicImage::ImageRgb8(gradient(6, 6)), &source, Format::Png);
    let missing = dir.path().join("does-not-exist");

    let mut session = Session::new(converter());
    session.set_file(&source).unwrap();
    session.set_output_location(OutputLocation::Directory(missing.clone()));

    let result = session.convert();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Filesystem error"));
    assert!(!missing.exists());
}

// ============================================================================
// Document conversion
// ============================================================================

#[derive(Debug)]
struct CountingBackend(Arc<AtomicUsize>);

impl DocumentBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn supports(&self, _from: Format, _to: Format) -> bool {
        true
    }

    fn locate(&self) -> Option<PathBuf> {
        Some(PathBuf::from("/bin/true"))
    }

    fn convert(
        &self,
        _program: &Path,
        _input: &Path,
        _from: Format,
        _to: Format,
        output: &Path,
    ) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, b"%PDF-1.7").map_err(|e| ConversionError::Filesystem {
            path: output.to_path_buf(),
            source: e,
        })
    }
}

#[test]
fn test_unsupported_document_pair_never_invokes_converter() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("notes.odt");
    std::fs::write(&source, b"PK\x03\x04").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let converter = ConverterBuilder::new()
        .backend(Box::new(CountingBackend(Arc::clone(&calls))))
        .build()
        .unwrap();

    let mut session = Session::new(Arc::new(converter));
    session.set_file(&source).unwrap();
    session.set_target_format(Format::Pdf).unwrap();

    let result = session.convert();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("not supported"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("notes.pdf").exists());
}

#[test]
fn test_supported_document_pair_uses_backend() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("letter.docx");
    std::fs::write(&source, b"PK\x03\x04").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let converter = ConverterBuilder::new()
        .backend(Box::new(CountingBackend(Arc::clone(&calls))))
        .build()
        .unwrap();

    let mut session = Session::new(Arc::new(converter));
    session.set_file(&source).unwrap();
    assert_eq!(session.target_format(), Some(Format::Pdf));

    let result = session.convert();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output_path, Some(dir.path().join("letter.pdf")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_converter_is_actionable() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("letter.docx");
    std::fs::write(&source, b"PK\x03\x04").unwrap();

    let converter = ConverterBuilder::new()
        .soffice_path(PathBuf::from("/nonexistent/soffice"))
        .pdf2docx_path(PathBuf::from("/nonexistent/pdf2docx"))
        .build()
        .unwrap();

    let output = dir.path().join("letter.pdf");
    let request = ConversionRequest::new(&source, Format::Docx, Format::Pdf, output);
    match converter.convert(&request) {
        Err(ConversionError::MissingCapability { name }) => assert!(name.contains("LibreOffice")),
        other => panic!("Expected MissingCapability, got {:?}", other),
    }
}

#[test]
fn test_convert_text_doc_with_libreoffice() {
    if !libreoffice_available() {
        eprintln!("Skipping test: LibreOffice not found");
        return;
    }

    let dir = TempDir::new().unwrap();
    let source = dir.path().join("memo.doc");
    std::fs::write(&source, "Quarterly memo\n\nAll systems nominal.\n").unwrap();
    let output = dir.path().join("memo.pdf");

    let request = ConversionRequest::new(&source, Format::Doc, Format::Pdf, &output);
    match converter().convert(&request) {
        Ok(result) => {
            assert_eq!(result.output_path, output);
            let bytes = std::fs::read(&output).unwrap();
            assert!(bytes.starts_with(b"%PDF"));
        }
        Err(e) => {
            eprintln!("Conversion failed (may be expected): {:?}", e);
            assert!(!output.exists());
        }
    }
}
