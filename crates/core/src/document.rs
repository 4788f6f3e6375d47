//! Document conversion through external converters.
//!
//! Only three pairs are supported: pdf→docx and doc/docx→pdf. The actual
//! transformation is delegated to a [`DocumentBackend`]; the converter
//! validates the pair, picks the first backend that is installed and
//! reports [`ConversionError::MissingCapability`] when none is.

use crate::config::{ConversionRequest, ConvertedFile, DocumentConfig};
use crate::error::{ConversionError, Result};
use crate::formats::Format;
use crate::libreoffice::LibreOfficeBackend;
use crate::output;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, error, info};

/// Whether a document pair can be converted at all.
pub fn is_supported_pair(from: Format, to: Format) -> bool {
    matches!(
        (from, to),
        (Format::Pdf, Format::Docx) | (Format::Doc, Format::Pdf) | (Format::Docx, Format::Pdf)
    )
}

/// An external document-conversion capability.
pub trait DocumentBackend: fmt::Debug + Send + Sync {
    /// Name shown to users when the backend is missing.
    fn name(&self) -> &str;

    /// Whether this backend handles `from` → `to`.
    fn supports(&self, from: Format, to: Format) -> bool;

    /// Path to the backend's executable, if installed.
    fn locate(&self) -> Option<PathBuf>;

    /// Convert `input` to `output` using the executable found by `locate`.
    fn convert(
        &self,
        program: &Path,
        input: &Path,
        from: Format,
        to: Format,
        output: &Path,
    ) -> Result<()>;
}

/// Availability of one backend, for front ends that want to show guidance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub path: Option<PathBuf>,
}

impl Capability {
    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }
}

/// Dispatches supported document pairs to the installed backends.
#[derive(Debug)]
pub struct DocumentConverter {
    backends: Vec<Box<dyn DocumentBackend>>,
}

impl DocumentConverter {
    /// Converter with the built-in backends: pdf2docx first, then LibreOffice.
    pub fn new(config: &DocumentConfig) -> Self {
        Self::with_backends(vec![
            Box::new(Pdf2DocxBackend::new(config.pdf2docx_path.clone())),
            Box::new(LibreOfficeBackend::new(config)),
        ])
    }

    /// Converter with an explicit list of backends, tried in order.
    pub fn with_backends(backends: Vec<Box<dyn DocumentBackend>>) -> Self {
        Self { backends }
    }

    /// Installed state of every backend.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.backends
            .iter()
            .map(|b| Capability {
                name: b.name().to_string(),
                path: b.locate(),
            })
            .collect()
    }

    pub fn convert(&self, request: &ConversionRequest) -> Result<ConvertedFile> {
        let start = Instant::now();
        let (from, to) = (request.source_format, request.target_format);

        if !is_supported_pair(from, to) {
            return Err(ConversionError::unsupported(from, to));
        }

        if !request.source_path.exists() {
            return Err(ConversionError::InputNotFound(request.source_path.clone()));
        }

        let candidates: Vec<&dyn DocumentBackend> = self
            .backends
            .iter()
            .map(|b| b.as_ref())
            .filter(|b| b.supports(from, to))
            .collect();

        let (backend, program) = candidates
            .iter()
            .find_map(|b| b.locate().map(|program| (*b, program)))
            .ok_or_else(|| missing_capability(&candidates, from, to))?;

        output::output_dir(&request.output_path)?;

        debug!(
            "Converting {:?} from {} to {} with {} at {:?}",
            request.source_path,
            from,
            to,
            backend.name(),
            program
        );
        backend.convert(&program, &request.source_path, from, to, &request.output_path)?;

        let bytes_written = std::fs::metadata(&request.output_path)
            .map_err(|e| ConversionError::filesystem(&request.output_path, e))?
            .len();

        info!(
            "Converted {:?} to {} with {} in {:?}",
            request.source_path,
            to,
            backend.name(),
            start.elapsed()
        );

        Ok(ConvertedFile {
            input_path: request.source_path.clone(),
            output_path: request.output_path.clone(),
            bytes_written,
            duration: start.elapsed(),
        })
    }
}

fn missing_capability(
    candidates: &[&dyn DocumentBackend],
    from: Format,
    to: Format,
) -> ConversionError {
    let name = if candidates.is_empty() {
        format!("A {} to {} converter", from, to)
    } else {
        candidates
            .iter()
            .map(|b| b.name())
            .collect::<Vec<_>>()
            .join(" or ")
    };
    ConversionError::MissingCapability { name }
}

/// Run an external converter and map a failed exit to `ConversionFailed`.
pub(crate) fn run_tool(cmd: &mut Command, tool: &str, input: &Path) -> Result<()> {
    let output = cmd.output().map_err(|e| ConversionError::ConversionFailed {
        path: input.to_path_buf(),
        message: format!("Failed to start {}: {}", tool, e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("{} failed for {:?}: {}", tool, input, stderr);
        return Err(ConversionError::ConversionFailed {
            path: input.to_path_buf(),
            message: format!("{} exited with {}: {}", tool, output.status, stderr.trim()),
        });
    }
    Ok(())
}

/// pdf→docx through the `pdf2docx` command-line tool.
#[derive(Debug, Clone, Default)]
pub struct Pdf2DocxBackend {
    explicit_path: Option<PathBuf>,
}

impl Pdf2DocxBackend {
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }
}

impl DocumentBackend for Pdf2DocxBackend {
    fn name(&self) -> &str {
        "pdf2docx"
    }

    fn supports(&self, from: Format, to: Format) -> bool {
        from == Format::Pdf && to == Format::Docx
    }

    fn locate(&self) -> Option<PathBuf> {
        match &self.explicit_path {
            Some(path) => path.exists().then(|| path.clone()),
            None => which::which("pdf2docx").ok(),
        }
    }

    fn convert(
        &self,
        program: &Path,
        input: &Path,
        _from: Format,
        to: Format,
        output: &Path,
    ) -> Result<()> {
        let staging = output::staging_dir(output)?;
        let staged = staging.path().join(format!("converted.{}", to.extension()));

        let mut cmd = Command::new(program);
        cmd.arg("convert").arg(input).arg(&staged);
        run_tool(&mut cmd, self.name(), input)?;

        if !staged.exists() {
            return Err(ConversionError::ConversionFailed {
                path: input.to_path_buf(),
                message: "pdf2docx produced no output file".to_string(),
            });
        }
        output::publish(&staged, output)?;
        Ok(())
    }
}
