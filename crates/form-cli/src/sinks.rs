use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use form_spec::{ExportSink, SinkError, SubmissionSink};
use serde_json::Value;
use tracing::debug;

/// Writes exported forms into a directory, refusing to clobber unless forced.
pub struct DirectorySink {
    root: PathBuf,
    force: bool,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            root: root.into(),
            force,
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ExportSink for DirectorySink {
    fn accept(&mut self, file_name: &str, html: &str) -> Result<(), SinkError> {
        let target = self.root.join(file_name);
        if target.exists() && !self.force {
            return Err(SinkError::AlreadyExists(target.display().to_string()));
        }
        fs::create_dir_all(&self.root).map_err(|source| io_error(&self.root, source))?;
        fs::write(&target, html).map_err(|source| io_error(&target, source))?;
        debug!(path = %target.display(), "wrote static form");
        self.written.push(target);
        Ok(())
    }
}

/// Pretty-prints submissions to a file, or to stdout without one.
pub struct JsonSink {
    path: Option<PathBuf>,
}

impl JsonSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl SubmissionSink for JsonSink {
    fn submit(&mut self, submission: &Value) -> Result<(), SinkError> {
        let rendered = serde_json::to_string_pretty(submission).map_err(SinkError::Encode)?;
        match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
                }
                fs::write(path, format!("{}\n", rendered))
                    .map_err(|source| io_error(path, source))?;
                debug!(path = %path.display(), "wrote submission");
            }
            None => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{}", rendered).map_err(|source| SinkError::Io {
                    name: "stdout".into(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

fn io_error(path: &Path, source: io::Error) -> SinkError {
    SinkError::Io {
        name: path.display().to_string(),
        source,
    }
}
