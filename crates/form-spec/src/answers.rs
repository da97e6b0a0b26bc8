use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::{FieldKey, GroupKey, split_field_key};

/// Metadata of an uploaded file; the bytes never enter the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// A single answer held by the preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Multi(Vec<String>),
    File(FileDescriptor),
    /// One choice per person role of a `radio_multi_person` question.
    PerPerson(BTreeMap<String, String>),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        AnswerValue::Text(value.into())
    }

    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::Multi(values.into_iter().map(Into::into).collect())
    }

    /// Non-empty string, non-empty list, a file, or a non-empty role map.
    pub fn is_truthy(&self) -> bool {
        match self {
            AnswerValue::Text(text) => !text.is_empty(),
            AnswerValue::Multi(values) => !values.is_empty(),
            AnswerValue::File(_) => true,
            AnswerValue::PerPerson(choices) => !choices.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileDescriptor> {
        match self {
            AnswerValue::File(file) => Some(file),
            _ => None,
        }
    }

    /// Plain JSON rendering used by submissions.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AnswerValue::File(file) => serde_json::Value::String(file.name.clone()),
            other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::text(value)
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(values: Vec<String>) -> Self {
        AnswerValue::Multi(values)
    }
}

impl From<FileDescriptor> for AnswerValue {
    fn from(file: FileDescriptor) -> Self {
        AnswerValue::File(file)
    }
}

/// Field key to answer mapping owned by the interactive engine.
///
/// Keys are plain strings so extension keys (sub-questions, option detail
/// inputs) live next to canonical field keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerStore {
    entries: BTreeMap<String, AnswerValue>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.entries.get(key)
    }

    pub fn field(&self, key: &FieldKey) -> Option<&AnswerValue> {
        self.entries.get(&key.to_string())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AnswerValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnswerValue)> {
        self.entries.iter()
    }

    /// Keys addressed inside `group`, with their parsed prefix and suffix.
    pub fn keys_in_group(&self, group: &GroupKey) -> Vec<(String, FieldKey, String)> {
        self.entries
            .keys()
            .filter_map(|key| {
                let (field, rest) = split_field_key(key)?;
                if group.contains(&field) {
                    Some((key.clone(), field, rest.to_string()))
                } else {
                    None
                }
            })
            .collect()
    }
}

impl FromIterator<(String, AnswerValue)> for AnswerStore {
    fn from_iter<T: IntoIterator<Item = (String, AnswerValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
