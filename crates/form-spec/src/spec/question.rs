use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::option::ChoiceOption;

/// Stable question identifier assigned when the question is created.
///
/// Parent links use this identifier instead of positional coordinates so
/// reordering the document never silently rewires a dependency.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for questions created by the editor.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QuestionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Widget family of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    #[default]
    Text,
    Email,
    Tel,
    Date,
    Number,
    Textarea,
    Dropdown,
    Radio,
    Checkbox,
    RadioMultiPerson,
    File,
    DisplayText,
}

impl AnswerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Text => "text",
            AnswerType::Email => "email",
            AnswerType::Tel => "tel",
            AnswerType::Date => "date",
            AnswerType::Number => "number",
            AnswerType::Textarea => "textarea",
            AnswerType::Dropdown => "dropdown",
            AnswerType::Radio => "radio",
            AnswerType::Checkbox => "checkbox",
            AnswerType::RadioMultiPerson => "radio_multi_person",
            AnswerType::File => "file",
            AnswerType::DisplayText => "display_text",
        }
    }

    /// Whether the question collects an answer at all.
    pub fn is_answerable(&self) -> bool {
        !matches!(self, AnswerType::DisplayText)
    }

    /// Types a dependent question may name as its parent.
    pub fn can_be_parent(&self) -> bool {
        matches!(
            self,
            AnswerType::Radio | AnswerType::Checkbox | AnswerType::Dropdown
        )
    }

    pub fn is_multi_select(&self) -> bool {
        matches!(self, AnswerType::Checkbox)
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parent answer value(s) that reveal a dependent question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ShowWhen {
    One(String),
    Any(Vec<String>),
}

impl ShowWhen {
    pub fn contains(&self, candidate: &str) -> bool {
        match self {
            ShowWhen::One(value) => value == candidate,
            ShowWhen::Any(values) => values.iter().any(|value| value == candidate),
        }
    }

    /// JSON encoding embedded into static exports.
    pub fn to_json(&self) -> String {
        match self {
            ShowWhen::One(value) => serde_json::Value::String(value.clone()).to_string(),
            ShowWhen::Any(values) => serde_json::Value::Array(
                values
                    .iter()
                    .cloned()
                    .map(serde_json::Value::String)
                    .collect(),
            )
            .to_string(),
        }
    }
}

/// Optional per-question validation rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Comma separated extensions (`.pdf`) or mime types (`image/*`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    /// Upper bound for uploads, in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<f64>,
}

impl ValidationSpec {
    pub fn is_empty(&self) -> bool {
        self == &ValidationSpec::default()
    }
}

/// A single question of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default, skip_serializing_if = "QuestionId::is_empty")]
    pub id: QuestionId,
    pub text: String,
    #[serde(default, alias = "type")]
    pub answer_type: AnswerType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_question_id: Option<QuestionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_when: Option<ShowWhen>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,
}

impl Question {
    /// New question with a freshly generated identifier.
    pub fn new(text: impl Into<String>, answer_type: AnswerType) -> Self {
        Self {
            id: QuestionId::generate(),
            text: text.into(),
            answer_type,
            required: false,
            options: Vec::new(),
            validation: None,
            parent_question_id: None,
            show_when: None,
            sub_questions: Vec::new(),
            applies_to: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<QuestionId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = labels.into_iter().map(ChoiceOption::plain).collect();
        self
    }

    pub fn with_validation(mut self, validation: ValidationSpec) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn depends_on(mut self, parent: impl Into<QuestionId>, show_when: Option<ShowWhen>) -> Self {
        self.parent_question_id = Some(parent.into());
        self.show_when = show_when;
        self
    }

    pub fn with_sub_question(mut self, question: Question) -> Self {
        self.sub_questions.push(question);
        self
    }

    pub fn applies_to<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applies_to = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.parent_question_id.is_some()
    }
}
