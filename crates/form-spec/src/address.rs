//! Canonical string addresses for answers and repeatable groups.
//!
//! A field key is `p{page}_s{section}_g{group}_q{question}_i{instance}`, all
//! coordinates zero-based decimal without leading zeros. Group keys drop the
//! question and instance parts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("malformed field key '{0}'")]
    Malformed(String),
    #[error("malformed group key '{0}'")]
    MalformedGroup(String),
}

/// Address of a group; keys the instance count table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub page: usize,
    pub section: usize,
    pub group: usize,
}

/// Position of a question inside a document, independent of instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuestionCoords {
    pub page: usize,
    pub section: usize,
    pub group: usize,
    pub question: usize,
}

/// Address of one question's answer at one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub page: usize,
    pub section: usize,
    pub group: usize,
    pub question: usize,
    pub instance: usize,
}

pub fn field_key(
    page: usize,
    section: usize,
    group: usize,
    question: usize,
    instance: usize,
) -> FieldKey {
    FieldKey {
        page,
        section,
        group,
        question,
        instance,
    }
}

pub fn group_key(page: usize, section: usize, group: usize) -> GroupKey {
    GroupKey {
        page,
        section,
        group,
    }
}

pub fn parse_field_key(key: &str) -> Result<FieldKey, KeyError> {
    match split_field_key(key) {
        Some((field, "")) => Ok(field),
        _ => Err(KeyError::Malformed(key.to_string())),
    }
}

pub fn parse_group_key(key: &str) -> Result<GroupKey, KeyError> {
    split_group_key(key).ok_or_else(|| KeyError::MalformedGroup(key.to_string()))
}

fn split_group_key(key: &str) -> Option<GroupKey> {
    let mut parts = key.split('_');
    let page = coordinate(parts.next()?, 'p')?;
    let section = coordinate(parts.next()?, 's')?;
    let group = coordinate(parts.next()?, 'g')?;
    match parts.next() {
        None => Some(group_key(page, section, group)),
        Some(_) => None,
    }
}

/// Parses the five-coordinate prefix of `key` and returns the remainder.
///
/// The remainder is empty for plain field keys and starts with `_` for
/// extension keys (sub-question and option-detail answers).
pub fn split_field_key(key: &str) -> Option<(FieldKey, &str)> {
    let mut parts = key.splitn(6, '_');
    let page = coordinate(parts.next()?, 'p')?;
    let section = coordinate(parts.next()?, 's')?;
    let group = coordinate(parts.next()?, 'g')?;
    let question = coordinate(parts.next()?, 'q')?;
    let instance = coordinate(parts.next()?, 'i')?;
    let field = field_key(page, section, group, question, instance);
    let rest = match parts.next() {
        Some(_) => &key[field.to_string().len()..],
        None => "",
    };
    Some((field, rest))
}

fn coordinate(segment: &str, prefix: char) -> Option<usize> {
    let digits = segment.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

impl GroupKey {
    pub fn question(&self, question: usize) -> QuestionCoords {
        QuestionCoords {
            page: self.page,
            section: self.section,
            group: self.group,
            question,
        }
    }

    pub fn contains(&self, field: &FieldKey) -> bool {
        field.group_key() == *self
    }
}

impl QuestionCoords {
    pub fn group_key(&self) -> GroupKey {
        group_key(self.page, self.section, self.group)
    }

    pub fn field_key(&self, instance: usize) -> FieldKey {
        field_key(self.page, self.section, self.group, self.question, instance)
    }
}

impl FieldKey {
    pub fn group_key(&self) -> GroupKey {
        group_key(self.page, self.section, self.group)
    }

    pub fn coords(&self) -> QuestionCoords {
        self.group_key().question(self.question)
    }

    pub fn with_instance(&self, instance: usize) -> FieldKey {
        FieldKey { instance, ..*self }
    }

    /// Answer key of the `index`-th sub-question.
    pub fn sub(&self, index: usize) -> String {
        format!("{}_sub{}", self, index)
    }

    /// Answer key of the free-text input attached to the `index`-th option.
    pub fn option_detail(&self, index: usize) -> String {
        format!("{}_opt{}", self, index)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}_s{}_g{}", self.page, self.section, self.group)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p{}_s{}_g{}_q{}_i{}",
            self.page, self.section, self.group, self.question, self.instance
        )
    }
}

impl FromStr for FieldKey {
    type Err = KeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_field_key(value)
    }
}

impl FromStr for GroupKey {
    type Err = KeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_group_key(value)
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
