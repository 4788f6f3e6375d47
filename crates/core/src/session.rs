//! Conversion-screen controller.
//!
//! A [`Session`] holds the state of one conversion screen: the selected file,
//! the chosen target and scale, and where the output goes. It starts
//! [`SessionState::Empty`], becomes [`SessionState::Loaded`] once a file is
//! selected, and stays loaded across conversions, successful or not.
//!
//! ```rust,no_run
//! use kommverter_core::{Converter, ConverterConfig, Format, Scale, Session};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let converter = Arc::new(Converter::new(ConverterConfig::default())?);
//!     let mut session = Session::new(converter);
//!
//!     session.set_file("photo.PNG")?;
//!     session.set_target_format(Format::Jpeg)?;
//!     session.set_scale("0.4".parse::<Scale>()?);
//!
//!     println!("Estimated size: {}", session.estimate_output_size().human);
//!     let result = session.convert();
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```

use crate::config::{ConversionRequest, ConversionResult, Scale, SizeEstimate};
use crate::converter::Converter;
use crate::error::{ConversionError, Result};
use crate::formats::{DetectedFormat, Format};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where converted files are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputLocation {
    /// Next to the source file.
    #[default]
    SameFolder,
    /// A user-chosen folder, kept until set back to `SameFolder`.
    Directory(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loaded,
}

/// The selected source file.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub detected: DetectedFormat,
    pub size_bytes: u64,
}

/// Per-screen conversion state.
#[derive(Debug)]
pub struct Session {
    converter: Arc<Converter>,
    file: Option<LoadedFile>,
    target: Option<Format>,
    scale: Scale,
    location: OutputLocation,
    output_override: Option<PathBuf>,
    last_result: Option<ConversionResult>,
}

impl Session {
    pub fn new(converter: Arc<Converter>) -> Self {
        Self {
            converter,
            file: None,
            target: None,
            scale: Scale::ORIGINAL,
            location: OutputLocation::SameFolder,
            output_override: None,
            last_result: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.file {
            Some(_) => SessionState::Loaded,
            None => SessionState::Empty,
        }
    }

    /// Select the file to convert.
    ///
    /// On error the previous selection is kept.
    pub fn set_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .ok_or_else(|| ConversionError::InputNotFound(path.to_path_buf()))?;

        let detected = self.converter.detect(path);
        info!(
            "Loaded {:?} as {} ({} bytes)",
            path, detected.identifier, metadata.len()
        );

        self.file = Some(LoadedFile {
            path: path.to_path_buf(),
            detected,
            size_bytes: metadata.len(),
        });
        self.last_result = None;

        let targets = self.target_formats();
        if !self.target.is_some_and(|t| targets.contains(&t)) {
            self.target = targets.first().copied();
        }
        Ok(())
    }

    pub fn file(&self) -> Option<&LoadedFile> {
        self.file.as_ref()
    }

    /// Formats offered for the loaded file; the source's own format is never offered.
    pub fn target_formats(&self) -> Vec<Format> {
        match &self.file {
            Some(file) => self.converter.catalog().targets_for(&file.detected),
            None => Vec::new(),
        }
    }

    pub fn target_format(&self) -> Option<Format> {
        self.target
    }

    /// Choose the target format. Only offered targets are accepted.
    pub fn set_target_format(&mut self, format: Format) -> Result<()> {
        let file = self.file.as_ref().ok_or(ConversionError::NoFileSelected)?;
        if !self.target_formats().contains(&format) {
            debug!("Rejected target {} for {}", format, file.detected.identifier);
            return Err(ConversionError::unsupported(&file.detected.identifier, format));
        }
        self.target = Some(format);
        self.last_result = None;
        Ok(())
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
        self.last_result = None;
    }

    pub fn output_location(&self) -> &OutputLocation {
        &self.location
    }

    pub fn set_output_location(&mut self, location: OutputLocation) {
        self.location = location;
    }

    pub fn output_override(&self) -> Option<&Path> {
        self.output_override.as_deref()
    }

    /// Set a typed output name or path. Empty input clears the override.
    pub fn set_output_override(&mut self, path: Option<PathBuf>) {
        self.output_override = path.filter(|p| !p.as_os_str().is_empty());
        self.last_result = None;
    }

    /// Directory outputs go to by default.
    pub fn output_directory(&self) -> Option<PathBuf> {
        match &self.location {
            OutputLocation::Directory(dir) => Some(dir.clone()),
            OutputLocation::SameFolder => self.file.as_ref().map(|f| {
                f.path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
            }),
        }
    }

    /// `{output_directory}/{source_basename}.{target_extension}`.
    pub fn default_output_path(&self) -> Option<PathBuf> {
        let target = self.target?;
        let dir = self.output_directory()?;
        Some(dir.join(format!("{}.{}", self.source_basename()?, target.extension())))
    }

    /// Final output path, with the override applied.
    pub fn resolved_output_path(&self) -> Option<PathBuf> {
        match &self.output_override {
            Some(typed) => {
                let target = self.target?;
                Some(self.apply_override(typed, target))
            }
            None => self.default_output_path(),
        }
    }

    /// Human-readable size of the loaded file.
    pub fn source_size(&self) -> Option<SizeEstimate> {
        self.file.as_ref().map(|f| SizeEstimate::from_bytes(f.size_bytes))
    }

    /// Size the output would have with the current settings.
    ///
    /// Never writes to disk. Returns the unavailable estimate when nothing
    /// is loaded, for documents, and when the trial encode fails.
    pub fn estimate_output_size(&self) -> SizeEstimate {
        let request = match self.request() {
            Ok(request) => request,
            Err(e) => {
                debug!("No size estimate: {}", e);
                return SizeEstimate::unavailable();
            }
        };

        match self.converter.estimate_output_size(&request) {
            Ok(Some(bytes)) => SizeEstimate::from_bytes(bytes),
            Ok(None) => SizeEstimate::unavailable(),
            Err(e) => {
                warn!("Size estimate failed for {:?}: {}", request.source_path, e);
                SizeEstimate::unavailable()
            }
        }
    }

    /// Convert the loaded file with the current settings.
    ///
    /// Errors are reported in the result; the session stays loaded.
    pub fn convert(&mut self) -> ConversionResult {
        let result = match self.request() {
            Ok(request) => match self.converter.convert(&request) {
                Ok(file) => ConversionResult::succeeded(file.output_path),
                Err(e) => {
                    warn!("Conversion of {:?} failed: {}", request.source_path, e);
                    ConversionResult::failed(Some(request.output_path), &e)
                }
            },
            Err(e) => {
                warn!("Cannot convert: {}", e);
                ConversionResult::failed(None, &e)
            }
        };

        self.last_result = Some(result.clone());
        result
    }

    /// Outcome of the last conversion, cleared when settings change.
    pub fn last_result(&self) -> Option<&ConversionResult> {
        self.last_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_result.as_ref().and_then(|r| r.error.as_deref())
    }

    /// Return to the empty state, keeping the converter.
    pub fn reset(&mut self) {
        *self = Self::new(Arc::clone(&self.converter));
    }

    fn request(&self) -> Result<ConversionRequest> {
        let file = self.file.as_ref().ok_or(ConversionError::NoFileSelected)?;
        let source_format = file.detected.require_format()?;
        let target_format = self.target.ok_or(ConversionError::NoFileSelected)?;
        let output_path = self
            .resolved_output_path()
            .ok_or(ConversionError::NoFileSelected)?;

        Ok(
            ConversionRequest::new(&file.path, source_format, target_format, output_path)
                .with_scale(self.scale),
        )
    }

    fn source_basename(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        Some(
            file.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string()),
        )
    }

    /// Directory and base name come from the typed path; the extension always
    /// follows the target format.
    fn apply_override(&self, typed: &Path, target: Format) -> PathBuf {
        let default_dir = self.output_directory().unwrap_or_default();
        let default_base = self.source_basename().unwrap_or_else(|| "output".to_string());

        let typed_str = typed.to_string_lossy();
        if typed_str.ends_with('/') || typed_str.ends_with(std::path::MAIN_SEPARATOR) {
            return typed.join(format!("{}.{}", default_base, target.extension()));
        }

        let dir = match typed.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => default_dir,
        };

        let base = match (typed.file_name(), typed.extension().and_then(|e| e.to_str())) {
            (Some(_), Some(ext)) if Format::from_extension(ext).is_some() => typed
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or(default_base),
            (Some(name), _) => name.to_string_lossy().into_owned(),
            (None, _) => default_base,
        };

        dir.join(format!("{}.{}", base, target.extension()))
    }
}
