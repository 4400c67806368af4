//! The external document converter that produces the working archive.

use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use exn::ResultExt;
use tempfile::NamedTempFile;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Turns a source document into an EPUB container at `output`.
pub trait Converter {
    fn convert(&self, document: &[u8], output: &Path) -> Result<()>;
}

impl<F> Converter for F
where
    F: Fn(&[u8], &Path) -> Result<()>,
{
    fn convert(&self, document: &[u8], output: &Path) -> Result<()> {
        self(document, output)
    }
}

/// Pandoc, converting `docx` input to `epub3`.
#[derive(Debug, Clone)]
pub struct Pandoc {
    executable: PathBuf,
}

impl Pandoc {
    pub fn discover() -> Result<Self> {
        match which::which("pandoc") {
            Ok(executable) => Ok(Self { executable }),
            Err(_) => {
                tracing::info!("pandoc executable not found in PATH");
                exn::bail!(ErrorKind::ConverterNotFound)
            },
        }
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self { executable: executable.into() }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Converter for Pandoc {
    #[instrument(skip_all, fields(executable = %self.executable.display(), size = document.len()))]
    fn convert(&self, document: &[u8], output: &Path) -> Result<()> {
        let mut input = tempfile::Builder::new().suffix(".docx").tempfile().or_raise(|| ErrorKind::Io)?;
        input.write_all(document).or_raise(|| ErrorKind::Io)?;
        input.flush().or_raise(|| ErrorKind::Io)?;
        run(&self.executable, &input, output)
    }
}

fn run(executable: &Path, input: &NamedTempFile, output: &Path) -> Result<()> {
    let result = Command::new(executable)
        .arg(input.path())
        .args(["--from", "docx", "--to", "epub3", "--output"])
        .arg(output)
        .output();
    let result = match result {
        Ok(result) => result,
        Err(e) if e.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::ConverterNotFound),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Io),
    };
    if !result.status.success() {
        let code = result.status.code().unwrap_or(-1);
        tracing::warn!(code, stderr = %String::from_utf8_lossy(&result.stderr), "conversion failed");
        exn::bail!(ErrorKind::ConversionFailed(code));
    }
    Ok(())
}
