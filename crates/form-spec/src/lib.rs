#![allow(missing_docs)]

pub mod address;
pub mod answers;
pub mod edit;
pub mod export;
pub mod import;
pub mod instances;
pub mod session;
pub mod sink;
pub mod spec;
pub mod submission;
pub mod validate;
pub mod visibility;

pub use address::{
    FieldKey, GroupKey, KeyError, QuestionCoords, field_key, group_key, parse_field_key,
    parse_group_key,
};
pub use answers::{AnswerStore, AnswerValue, FileDescriptor};
pub use edit::EditError;
pub use export::{
    ExportError, ExportOptions, InstanceFidelity, StaticExport, escape_html, export_document,
};
pub use import::{ImportError, MAX_IMPORT_BYTES, import_bytes, import_path};
pub use instances::{InstanceTable, RemovalPolicy};
pub use session::{PreviewSession, PreviewState, SessionError, SessionSnapshot};
pub use sink::{ExportSink, MemorySink, SinkError, SubmissionSink};
pub use spec::{
    AnswerType, ChoiceOption, DependencyIssue, Document, Group, Page, Question, QuestionId,
    Section, ShowWhen, ValidationSpec,
};
pub use submission::{InteractiveSubmission, indexed_submission, interactive_submission, slugify};
pub use validate::{ValidationReport, validate_answer, validate_form};
pub use visibility::{VisibilityMap, VisibilityMode, is_visible, resolve_visibility};

/// JSON schema describing an importable document.
pub fn document_schema() -> schemars::Schema {
    schemars::schema_for!(Document)
}
