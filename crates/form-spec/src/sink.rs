//! Destinations for generated artifacts.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("'{0}' already exists")]
    AlreadyExists(String),
    #[error("failed to write '{name}'")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode submission: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Receives a generated static form.
pub trait ExportSink {
    fn accept(&mut self, file_name: &str, html: &str) -> Result<(), SinkError>;
}

/// Receives a serialized submission.
pub trait SubmissionSink {
    fn submit(&mut self, submission: &Value) -> Result<(), SinkError>;
}

/// Keeps everything it receives; used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub exports: Vec<(String, String)>,
    pub submissions: Vec<Value>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExportSink for MemorySink {
    fn accept(&mut self, file_name: &str, html: &str) -> Result<(), SinkError> {
        if self.exports.iter().any(|(name, _)| name == file_name) {
            return Err(SinkError::AlreadyExists(file_name.to_string()));
        }
        self.exports.push((file_name.to_string(), html.to_string()));
        Ok(())
    }
}

impl SubmissionSink for MemorySink {
    fn submit(&mut self, submission: &Value) -> Result<(), SinkError> {
        self.submissions.push(submission.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_sink_refuses_duplicate_names() {
        let mut sink = MemorySink::new();
        sink.accept("a-form.html", "<html>").expect("first");
        assert!(matches!(
            sink.accept("a-form.html", "<html>"),
            Err(SinkError::AlreadyExists(_))
        ));
        sink.submit(&json!({ "formData": {} })).expect("submit");
        assert_eq!(sink.exports.len(), 1);
        assert_eq!(sink.submissions.len(), 1);
    }
}
