//! Converter that dispatches requests to the image or document handler.
//!
//! Conversions are synchronous and run on the caller's thread. Front ends
//! that must stay responsive can use [`Converter::spawn_convert`], which
//! moves a single conversion onto tokio's blocking pool.

use crate::config::{ConversionRequest, ConvertedFile, ConverterConfig, ResampleFilter};
use crate::document::{Capability, DocumentBackend, DocumentConverter};
use crate::error::{ConversionError, Result};
use crate::formats::{Category, DetectedFormat, FormatCatalog};
use crate::image_converter::ImageConverter;
use crate::output;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Main entry point for conversions.
#[derive(Debug)]
pub struct Converter {
    /// Format detection.
    catalog: FormatCatalog,
    /// Handler for the image category.
    images: ImageConverter,
    /// Handler for the document category.
    documents: DocumentConverter,
    /// Configuration.
    config: ConverterConfig,
}

impl Converter {
    /// Create a new converter with the built-in document backends.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        let documents = DocumentConverter::new(&config.document);
        Self::with_documents(config, documents)
    }

    /// Create a converter with a custom document converter.
    pub fn with_documents(config: ConverterConfig, documents: DocumentConverter) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing converter with filter={:?}, background={:?}",
            config.image.filter, config.image.background_color
        );

        Ok(Self {
            catalog: FormatCatalog::with_sniff_bytes(config.image.sniff_bytes),
            images: ImageConverter::new(config.image.clone()),
            documents,
            config,
        })
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    /// Detect the format of a file.
    pub fn detect(&self, path: &Path) -> DetectedFormat {
        self.catalog.lookup(path)
    }

    /// Perform one conversion, writing `request.output_path`.
    pub fn convert(&self, request: &ConversionRequest) -> Result<ConvertedFile> {
        debug!(
            "Converting {:?} ({} -> {}) to {:?}",
            request.source_path, request.source_format, request.target_format, request.output_path
        );
        self.check_categories(request)?;
        output::ensure_not_source(&request.source_path, &request.output_path)?;

        match request.source_format.category() {
            Category::Image => self.images.convert(request),
            Category::Document => self.documents.convert(request),
        }
    }

    /// Output size `convert` would produce, computed without writing anything.
    ///
    /// Returns `Ok(None)` for documents, which cannot be previewed in memory.
    pub fn estimate_output_size(&self, request: &ConversionRequest) -> Result<Option<u64>> {
        self.check_categories(request)?;

        match request.source_format.category() {
            Category::Image => self.images.estimate(request).map(Some),
            Category::Document => Ok(None),
        }
    }

    /// Run one conversion on tokio's blocking pool.
    ///
    /// Must be called from within a tokio runtime. There is no cancellation:
    /// dropping the handle does not stop the conversion.
    pub fn spawn_convert(
        self: &Arc<Self>,
        request: ConversionRequest,
    ) -> JoinHandle<Result<ConvertedFile>> {
        let converter = Arc::clone(self);
        tokio::task::spawn_blocking(move || converter.convert(&request))
    }

    /// Installed state of the document backends.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.documents.capabilities()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    fn check_categories(&self, request: &ConversionRequest) -> Result<()> {
        if request.source_format.category() != request.target_format.category() {
            return Err(ConversionError::unsupported(
                request.source_format,
                request.target_format,
            ));
        }
        Ok(())
    }
}

/// Builder for creating a Converter with custom settings.
#[derive(Debug, Default)]
pub struct ConverterBuilder {
    config: ConverterConfig,
    backends: Option<Vec<Box<dyn DocumentBackend>>>,
}

impl ConverterBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resampling filter.
    pub fn filter(mut self, filter: ResampleFilter) -> Self {
        self.config.image.filter = filter;
        self
    }

    /// Set the background used when flattening transparency.
    pub fn background_color(mut self, color: (u8, u8, u8)) -> Self {
        self.config.image.background_color = color;
        self
    }

    /// Set the path to soffice binary.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.config.document.soffice_path = Some(path);
        self
    }

    /// Set the path to the pdf2docx binary.
    pub fn pdf2docx_path(mut self, path: PathBuf) -> Self {
        self.config.document.pdf2docx_path = Some(path);
        self
    }

    /// Set the temporary directory.
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.document.temp_dir = Some(dir);
        self
    }

    /// Replace the built-in document backends. Backends are tried in the order added.
    pub fn backend(mut self, backend: Box<dyn DocumentBackend>) -> Self {
        self.backends.get_or_insert_with(Vec::new).push(backend);
        self
    }

    /// Build the converter.
    pub fn build(self) -> Result<Converter> {
        match self.backends {
            Some(backends) => {
                Converter::with_documents(self.config, DocumentConverter::with_backends(backends))
            }
            None => Converter::new(self.config),
        }
    }
}
