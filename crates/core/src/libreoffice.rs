//! LibreOffice backend for document conversion.
//!
//! Each conversion runs a one-shot headless `soffice` with its own throwaway
//! user profile, so a LibreOffice window the user already has open does not
//! swallow the request.

use crate::config::DocumentConfig;
use crate::document::{run_tool, DocumentBackend};
use crate::error::{ConversionError, Result};
use crate::formats::Format;
use crate::output;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, warn};

const NAME: &str = "LibreOffice (soffice)";

/// Well-known install locations, checked before PATH.
const SOFFICE_CANDIDATES: &[&str] = &[
    // macOS
    "/Applications/LibreOffice.app/Contents/MacOS/soffice",
    // Linux
    "/usr/bin/soffice",
    "/usr/lib/libreoffice/program/soffice",
    "/opt/libreoffice/program/soffice",
    // Snap (Ubuntu)
    "/snap/bin/libreoffice.soffice",
    // Windows
    "C:\\Program Files\\LibreOffice\\program\\soffice.exe",
];

/// doc/docx→pdf and pdf→docx through headless LibreOffice.
#[derive(Debug, Clone, Default)]
pub struct LibreOfficeBackend {
    /// Explicit path to soffice.
    soffice_path: Option<PathBuf>,
    /// Parent directory for user profiles.
    temp_dir: Option<PathBuf>,
}

impl LibreOfficeBackend {
    pub fn new(config: &DocumentConfig) -> Self {
        Self {
            soffice_path: config.soffice_path.clone(),
            temp_dir: config.temp_dir.clone(),
        }
    }

    /// Find the soffice binary.
    pub fn find_soffice(explicit: Option<&Path>) -> Result<PathBuf> {
        let missing = || ConversionError::MissingCapability {
            name: NAME.to_string(),
        };

        // An explicit path is authoritative
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(missing());
        }

        for candidate in SOFFICE_CANDIDATES {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        which::which("soffice")
            .or_else(|_| which::which("libreoffice"))
            .map_err(|_| missing())
    }

    fn profile_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("lo-profile-");
        match &self.temp_dir {
            Some(dir) => builder
                .tempdir_in(dir)
                .map_err(|e| ConversionError::filesystem(dir, e)),
            None => builder
                .tempdir()
                .map_err(|e| ConversionError::filesystem(std::env::temp_dir(), e)),
        }
    }
}

/// `--convert-to` argument for a target format.
fn export_filter(to: Format) -> Option<&'static str> {
    match to {
        Format::Pdf => Some("pdf:writer_pdf_Export"),
        Format::Docx => Some("docx:MS Word 2007 XML"),
        _ => None,
    }
}

/// `file:///` URL for an absolute path, as `-env:UserInstallation` expects.
///
/// Windows paths get forward slashes (`file:///C:/Users/...`).
fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut url = String::from("file://");
    if !raw.starts_with('/') {
        url.push('/');
    }
    for c in raw.chars() {
        match c {
            ' ' => url.push_str("%20"),
            '%' => url.push_str("%25"),
            '#' => url.push_str("%23"),
            _ => url.push(c),
        }
    }
    url
}

/// Find the file LibreOffice wrote into `dir`.
fn find_output(dir: &Path, input: &Path, to: Format) -> Option<PathBuf> {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let expected = dir.join(format!("{}.{}", stem, to.extension()));
    if expected.exists() {
        return Some(expected);
    }

    // LibreOffice might have created a file with slightly different name
    std::fs::read_dir(dir).ok().and_then(|entries| {
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case(to.extension()))
                    .unwrap_or(false)
            })
    })
}

impl DocumentBackend for LibreOfficeBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn supports(&self, from: Format, to: Format) -> bool {
        matches!(
            (from, to),
            (Format::Doc | Format::Docx, Format::Pdf) | (Format::Pdf, Format::Docx)
        )
    }

    fn locate(&self) -> Option<PathBuf> {
        Self::find_soffice(self.soffice_path.as_deref()).ok()
    }

    fn convert(
        &self,
        program: &Path,
        input: &Path,
        from: Format,
        to: Format,
        output: &Path,
    ) -> Result<()> {
        let filter =
            export_filter(to).ok_or_else(|| ConversionError::unsupported(from, to))?;
        let profile = self.profile_dir()?;
        let staging = output::staging_dir(output)?;

        let mut cmd = Command::new(program);
        cmd.args([
            "--headless",
            "--invisible",
            "--nologo",
            "--nofirststartwizard",
            "--norestore",
        ]);
        cmd.arg(format!(
            "-env:UserInstallation={}",
            file_url(profile.path())
        ));

        // PDFs open in Draw by default; the Writer import filter is needed for docx export
        if from == Format::Pdf {
            cmd.arg("--infilter=writer_pdf_import");
        }

        cmd.args(["--convert-to", filter, "--outdir"]);
        cmd.arg(staging.path());
        cmd.arg(input);

        debug!("Running {:?}", cmd);
        run_tool(&mut cmd, NAME, input)?;

        let produced = find_output(staging.path(), input, to).ok_or_else(|| {
            ConversionError::ConversionFailed {
                path: input.to_path_buf(),
                message: format!("{} output file not found", to),
            }
        })?;

        output::publish(&produced, output)?;

        let profile_path = profile.path().to_path_buf();
        if let Err(e) = profile.close() {
            warn!("Failed to remove LibreOffice profile {:?}: {}", profile_path, e);
        }
        Ok(())
    }
}
