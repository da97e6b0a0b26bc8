use std::collections::HashMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::{GroupKey, QuestionCoords};
use crate::spec::question::{AnswerType, Question, QuestionId};

/// Full hierarchical form definition.
///
/// Pages, sections and groups sit behind `Arc` so edits can share every
/// subtree they do not touch with the previous version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub pages: Vec<Arc<Page>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub sections: Vec<Arc<Section>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub groups: Vec<Arc<Group>>,
}

/// Unit of repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Group {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// Broken parent link found by [`Document::check_dependencies`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyIssue {
    #[error("question '{0}' appears more than once")]
    DuplicateId(QuestionId),
    #[error("question '{question}' depends on unknown question '{parent}'")]
    UnknownParent {
        question: QuestionId,
        parent: QuestionId,
    },
    #[error("question '{question}' depends on '{parent}' which is a {kind} question")]
    ParentNotChoice {
        question: QuestionId,
        parent: QuestionId,
        kind: AnswerType,
    },
    #[error("question '{question}' depends on '{parent}' which does not precede it")]
    ParentNotEarlier {
        question: QuestionId,
        parent: QuestionId,
    },
}

impl Document {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            pages: Vec::new(),
        }
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.pages.push(Arc::new(page));
        self
    }

    /// A document without pages cannot be previewed or exported.
    pub fn is_usable(&self) -> bool {
        !self.pages.is_empty()
    }

    /// Every group with its key, in document order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupKey, &Group)> + '_ {
        self.pages.iter().enumerate().flat_map(|(p, page)| {
            page.sections.iter().enumerate().flat_map(move |(s, section)| {
                section
                    .groups
                    .iter()
                    .enumerate()
                    .map(move |(g, group)| (crate::address::group_key(p, s, g), &**group))
            })
        })
    }

    /// Every top-level question with its coordinates, in document order.
    pub fn questions(&self) -> impl Iterator<Item = (QuestionCoords, &Question)> + '_ {
        self.groups().flat_map(|(key, group)| {
            group
                .questions
                .iter()
                .enumerate()
                .map(move |(q, question)| (key.question(q), question))
        })
    }

    pub fn group(&self, key: &GroupKey) -> Option<&Group> {
        self.pages
            .get(key.page)?
            .sections
            .get(key.section)?
            .groups
            .get(key.group)
            .map(Arc::as_ref)
    }

    pub fn question(&self, coords: &QuestionCoords) -> Option<&Question> {
        self.group(&coords.group_key())?
            .questions
            .get(coords.question)
    }

    pub fn locate(&self, id: &QuestionId) -> Option<QuestionCoords> {
        self.questions()
            .find(|(_, question)| &question.id == id)
            .map(|(coords, _)| coords)
    }

    /// Identifier lookup table for repeated parent resolution.
    pub fn index(&self) -> QuestionIndex<'_> {
        let mut entries = HashMap::new();
        for (coords, question) in self.questions() {
            entries.entry(&question.id).or_insert((coords, question));
        }
        QuestionIndex { entries }
    }

    pub fn total_questions(&self) -> usize {
        self.questions().count()
    }

    /// Checks every parent link: the parent must exist, be a choice
    /// question and come earlier in document order.
    pub fn check_dependencies(&self) -> Vec<DependencyIssue> {
        let mut issues = Vec::new();
        let mut seen: HashMap<&QuestionId, &Question> = HashMap::new();

        for (_, question) in self.questions() {
            if seen.contains_key(&question.id) {
                issues.push(DependencyIssue::DuplicateId(question.id.clone()));
                continue;
            }

            if let Some(parent_id) = &question.parent_question_id {
                match seen.get(parent_id) {
                    Some(parent) if !parent.answer_type.can_be_parent() => {
                        issues.push(DependencyIssue::ParentNotChoice {
                            question: question.id.clone(),
                            parent: parent_id.clone(),
                            kind: parent.answer_type,
                        });
                    }
                    Some(_) => {}
                    None if self.locate(parent_id).is_some() => {
                        issues.push(DependencyIssue::ParentNotEarlier {
                            question: question.id.clone(),
                            parent: parent_id.clone(),
                        });
                    }
                    None => {
                        issues.push(DependencyIssue::UnknownParent {
                            question: question.id.clone(),
                            parent: parent_id.clone(),
                        });
                    }
                }
            }

            seen.insert(&question.id, question);
        }

        issues
    }
}

/// Borrowed identifier index over a document.
pub struct QuestionIndex<'a> {
    entries: HashMap<&'a QuestionId, (QuestionCoords, &'a Question)>,
}

impl<'a> QuestionIndex<'a> {
    pub fn get(&self, id: &QuestionId) -> Option<(QuestionCoords, &'a Question)> {
        self.entries.get(id).copied()
    }
}

impl Page {
    pub fn new(title: impl Into<String>, page_number: u32) -> Self {
        Self {
            title: title.into(),
            page_number,
            sections: Vec::new(),
        }
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(Arc::new(section));
        self
    }
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(Arc::new(group));
        self
    }
}

impl Group {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            repeatable: false,
            questions: Vec::new(),
        }
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn with_question(mut self, question: Question) -> Self {
        self.questions.push(question);
        self
    }
}
