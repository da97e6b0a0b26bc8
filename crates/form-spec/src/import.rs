//! Loading extracted form structures from JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::spec::{DependencyIssue, Document, Page, QuestionId};

/// Largest document accepted by [`import_path`].
pub const MAX_IMPORT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("'{}' is not a JSON document", .0.display())]
    UnsupportedFile(PathBuf),
    #[error("'{}' is {size} bytes, the limit is {limit} bytes", .path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("invalid form document: {0}")]
    Format(String),
    #[error("invalid question dependencies: {}", describe(.0))]
    Dependency(Vec<DependencyIssue>),
    #[error("failed to read '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe(issues: &[DependencyIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    source_name: Option<String>,
    #[serde(default)]
    document_info: Option<DocumentInfo>,
    #[serde(default)]
    pages: Option<Vec<Page>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentInfo {
    #[serde(default)]
    source_name: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

/// Reads and imports a `.json` file no larger than [`MAX_IMPORT_BYTES`].
pub fn import_path(path: impl AsRef<Path>) -> Result<Document, ImportError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(ImportError::UnsupportedFile(path.to_path_buf()));
    }

    let io_error = |source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = fs::metadata(path).map_err(io_error)?.len();
    if size > MAX_IMPORT_BYTES {
        return Err(ImportError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: MAX_IMPORT_BYTES,
        });
    }

    let bytes = fs::read(path).map_err(io_error)?;
    let fallback = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    import_bytes(&bytes, &fallback)
}

/// Parses and normalises a document.
///
/// `fallback_name` becomes the source name when neither the document nor its
/// `documentInfo` block carries one.
pub fn import_bytes(bytes: &[u8], fallback_name: &str) -> Result<Document, ImportError> {
    let raw: RawDocument =
        serde_json::from_slice(bytes).map_err(|error| ImportError::Format(error.to_string()))?;

    if raw.pages.is_none() && raw.document_info.is_none() {
        return Err(ImportError::Format(
            "expected a 'pages' array or a 'documentInfo' block".into(),
        ));
    }

    let info = raw.document_info.unwrap_or_default();
    let source_name = raw
        .source_name
        .or(info.source_name)
        .or(info.filename)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| fallback_name.to_string());

    let mut document = Document {
        source_name,
        pages: raw
            .pages
            .unwrap_or_default()
            .into_iter()
            .map(Arc::new)
            .collect(),
    };
    normalise(&mut document)?;

    let issues = document.check_dependencies();
    if !issues.is_empty() {
        return Err(ImportError::Dependency(issues));
    }

    debug!(
        source = %document.source_name,
        pages = document.pages.len(),
        questions = document.total_questions(),
        "imported form document"
    );
    Ok(document)
}

/// Page numbers, missing identifiers and the one-level sub-question rule.
fn normalise(document: &mut Document) -> Result<(), ImportError> {
    for (p, page) in document.pages.iter_mut().enumerate() {
        let page = Arc::make_mut(page);
        if page.page_number == 0 {
            page.page_number = p as u32 + 1;
        }
        for (s, section) in page.sections.iter_mut().enumerate() {
            for (g, group) in Arc::make_mut(section).groups.iter_mut().enumerate() {
                for (q, question) in Arc::make_mut(group).questions.iter_mut().enumerate() {
                    if question.id.is_empty() {
                        question.id = QuestionId::new(format!("q-{}-{}-{}-{}", p, s, g, q));
                    }
                    for (n, sub_question) in question.sub_questions.iter_mut().enumerate() {
                        if !sub_question.sub_questions.is_empty() {
                            return Err(ImportError::Format(format!(
                                "sub-question {} of '{}' has its own sub-questions",
                                n, question.id
                            )));
                        }
                        if sub_question.id.is_empty() {
                            sub_question.id = QuestionId::new(format!("{}-sub{}", question.id, n));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::AnswerType;
    use std::io::Write;

    #[test]
    fn assigns_ids_and_page_numbers() {
        let json = br#"{
            "sourceName": "w9.pdf",
            "pages": [{
                "title": "Main",
                "sections": [{
                    "title": "Taxpayer",
                    "groups": [{
                        "title": "Identity",
                        "questions": [
                            { "text": "Name", "type": "text" },
                            { "id": "kind", "text": "Kind", "type": "dropdown", "options": ["a", "b"] }
                        ]
                    }]
                }]
            }]
        }"#;
        let document = import_bytes(json, "ignored.json").expect("import");
        assert_eq!(document.source_name, "w9.pdf");
        assert_eq!(document.pages[0].page_number, 1);
        let ids: Vec<_> = document
            .questions()
            .map(|(_, question)| question.id.to_string())
            .collect();
        assert_eq!(ids, vec!["q-0-0-0-0", "kind"]);
        let (_, kind) = document.questions().nth(1).expect("second");
        assert_eq!(kind.answer_type, AnswerType::Dropdown);
        assert_eq!(kind.options[1].value, "b");
    }

    #[test]
    fn document_info_supplies_source_name() {
        let json = br#"{ "documentInfo": { "filename": "1040.pdf" } }"#;
        let document = import_bytes(json, "fallback.json").expect("import");
        assert_eq!(document.source_name, "1040.pdf");
        assert!(!document.is_usable());

        let json = br#"{ "pages": [] }"#;
        let document = import_bytes(json, "fallback.json").expect("import");
        assert_eq!(document.source_name, "fallback.json");
    }

    #[test]
    fn rejects_documents_without_structure() {
        let error = import_bytes(br#"{ "title": "nothing" }"#, "x").expect_err("format");
        assert!(matches!(error, ImportError::Format(_)));
        let error = import_bytes(b"not json", "x").expect_err("format");
        assert!(matches!(error, ImportError::Format(_)));
    }

    #[test]
    fn rejects_nested_sub_questions() {
        let json = br#"{ "pages": [{ "sections": [{ "groups": [{ "questions": [{
            "text": "Outer",
            "subQuestions": [{ "text": "Inner", "subQuestions": [{ "text": "Too deep" }] }]
        }] }] }] }] }"#;
        let error = import_bytes(json, "x").expect_err("nesting");
        assert!(matches!(error, ImportError::Format(_)));
    }

    #[test]
    fn rejects_broken_dependencies() {
        let json = br#"{ "pages": [{ "sections": [{ "groups": [{ "questions": [
            { "id": "a", "text": "Free text", "type": "text" },
            { "id": "b", "text": "Child", "parentQuestionId": "a", "showWhen": "x" }
        ] }] }] }] }"#;
        let error = import_bytes(json, "x").expect_err("dependency");
        match error {
            ImportError::Dependency(issues) => assert_eq!(issues.len(), 1),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn path_import_checks_extension_and_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let text_path = dir.path().join("form.txt");
        fs::write(&text_path, "{}").expect("write");
        assert!(matches!(
            import_path(&text_path),
            Err(ImportError::UnsupportedFile(_))
        ));

        let json_path = dir.path().join("form.json");
        let mut file = fs::File::create(&json_path).expect("create");
        file.write_all(br#"{ "pages": [{ "title": "Only" }] }"#)
            .expect("write");
        let document = import_path(&json_path).expect("import");
        assert_eq!(document.source_name, "form.json");
        assert_eq!(document.pages[0].title, "Only");

        assert!(matches!(
            import_path(dir.path().join("missing.json")),
            Err(ImportError::Io { .. })
        ));

        let large_path = dir.path().join("large.json");
        let large = fs::File::create(&large_path).expect("create large");
        large.set_len(MAX_IMPORT_BYTES + 1).expect("grow");
        match import_path(&large_path) {
            Err(ImportError::TooLarge { size, limit, .. }) => {
                assert_eq!(size, MAX_IMPORT_BYTES + 1);
                assert_eq!(limit, MAX_IMPORT_BYTES);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let json = br#"{ "pages": [{ "sections": [{ "groups": [{ "questions": [
            { "id": "name", "text": "First name", "type": "text" },
            { "id": "name", "text": "Last name", "type": "text" }
        ] }] }] }] }"#;
        match import_bytes(json, "x") {
            Err(ImportError::Dependency(issues)) => {
                assert_eq!(issues, vec![DependencyIssue::DuplicateId("name".into())]);
            }
            other => panic!("expected duplicate id, got {:?}", other),
        }
    }
}
