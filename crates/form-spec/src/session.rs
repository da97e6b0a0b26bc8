//! Interactive preview engine.
//!
//! [`PreviewSession`] owns the answers and instance table of one person
//! filling in one document. State sits behind `Arc` and is mutated through
//! `Arc::make_mut`, so a [`SessionSnapshot`] taken before a mutation keeps
//! seeing the old state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::address::{FieldKey, GroupKey};
use crate::answers::{AnswerStore, AnswerValue};
use crate::instances::{InstanceTable, RemovalPolicy};
use crate::spec::Document;
use crate::submission::{InteractiveSubmission, interactive_submission, timestamp_now};
use crate::validate::{ValidationReport, validate_form};
use crate::visibility::{VisibilityMap, VisibilityMode, resolve_visibility};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("document has no pages")]
    EmptyDocument,
    #[error("no group at {0}")]
    UnknownGroup(GroupKey),
    #[error("group {0} is not repeatable")]
    NotRepeatable(GroupKey),
}

/// Serializable answers plus instance counts, e.g. loaded from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewState {
    #[serde(default)]
    pub answers: AnswerStore,
    #[serde(default)]
    pub instances: InstanceTable,
}

/// Consistent read-only view of a session at one point in time.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub document: Arc<Document>,
    pub answers: Arc<AnswerStore>,
    pub instances: Arc<InstanceTable>,
}

impl SessionSnapshot {
    pub fn visibility(&self) -> VisibilityMap {
        resolve_visibility(
            &self.document,
            &self.answers,
            &self.instances,
            VisibilityMode::Visible,
        )
    }

    pub fn validate(&self) -> ValidationReport {
        validate_form(&self.document, &self.answers, &self.instances)
    }
}

#[derive(Debug, Clone)]
pub struct PreviewSession {
    document: Arc<Document>,
    answers: Arc<AnswerStore>,
    instances: Arc<InstanceTable>,
    policy: RemovalPolicy,
}

impl PreviewSession {
    pub fn new(document: impl Into<Arc<Document>>) -> Result<Self, SessionError> {
        let document = document.into();
        if !document.is_usable() {
            return Err(SessionError::EmptyDocument);
        }
        Ok(Self {
            document,
            answers: Arc::new(AnswerStore::new()),
            instances: Arc::new(InstanceTable::new()),
            policy: RemovalPolicy::default(),
        })
    }

    /// Resumes a session from previously saved state.
    pub fn with_state(
        document: impl Into<Arc<Document>>,
        state: PreviewState,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(document)?;
        session.answers = Arc::new(state.answers);
        session.instances = Arc::new(state.instances);
        Ok(session)
    }

    pub fn with_policy(mut self, policy: RemovalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    pub fn answer(&self, key: &str) -> Option<&AnswerValue> {
        self.answers.get(key)
    }

    /// Stores an answer under a field key or extension key.
    pub fn set_answer(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) {
        Arc::make_mut(&mut self.answers).insert(key, value);
    }

    pub fn clear_answer(&mut self, key: &str) -> Option<AnswerValue> {
        if self.answers.get(key).is_none() {
            return None;
        }
        Arc::make_mut(&mut self.answers).remove(key)
    }

    /// Adds an instance to a repeatable group and returns the new count.
    pub fn add_instance(&mut self, group: &GroupKey) -> Result<usize, SessionError> {
        self.repeatable(group)?;
        let count = Arc::make_mut(&mut self.instances).add(group);
        debug!(group = %group, count, "added instance");
        Ok(count)
    }

    /// Removes one instance; `Ok(false)` when nothing was removed.
    pub fn remove_instance(&mut self, group: &GroupKey, index: usize) -> Result<bool, SessionError> {
        self.repeatable(group)?;
        if self.instances.count(group) <= 1 || index >= self.instances.count(group) {
            return Ok(false);
        }
        let policy = self.policy;
        let removed = Arc::make_mut(&mut self.instances).remove(
            group,
            index,
            Arc::make_mut(&mut self.answers),
            policy,
        );
        debug!(group = %group, index, removed, "removed instance");
        Ok(removed)
    }

    pub fn visibility(&self) -> VisibilityMap {
        resolve_visibility(
            &self.document,
            &self.answers,
            &self.instances,
            VisibilityMode::Visible,
        )
    }

    pub fn is_visible(&self, key: &FieldKey) -> bool {
        self.visibility().get(key).copied().unwrap_or(false)
    }

    pub fn validate(&self) -> ValidationReport {
        validate_form(&self.document, &self.answers, &self.instances)
    }

    pub fn submission(&self) -> InteractiveSubmission {
        self.submission_at(timestamp_now())
    }

    /// Submission with a caller supplied `exportedAt` value.
    pub fn submission_at(&self, exported_at: impl Into<String>) -> InteractiveSubmission {
        interactive_submission(&self.document, &self.answers, &self.instances, exported_at)
    }

    /// Clears answers and instance counts, keeping the document.
    pub fn reset(&mut self) {
        self.answers = Arc::new(AnswerStore::new());
        self.instances = Arc::new(InstanceTable::new());
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            document: Arc::clone(&self.document),
            answers: Arc::clone(&self.answers),
            instances: Arc::clone(&self.instances),
        }
    }

    pub fn state(&self) -> PreviewState {
        PreviewState {
            answers: (*self.answers).clone(),
            instances: (*self.instances).clone(),
        }
    }

    /// Swaps in an edited document. Groups that are no longer repeatable
    /// drop every instance beyond the first.
    pub fn replace_document(
        &mut self,
        document: impl Into<Arc<Document>>,
    ) -> Result<(), SessionError> {
        let document = document.into();
        if !document.is_usable() {
            return Err(SessionError::EmptyDocument);
        }

        let collapsed: Vec<GroupKey> = self
            .instances
            .iter()
            .filter(|(key, count)| {
                **count > 1 && document.group(key).is_none_or(|group| !group.repeatable)
            })
            .map(|(key, _)| *key)
            .collect();
        for key in collapsed {
            debug!(group = %key, "collapsing instances of non-repeatable group");
            Arc::make_mut(&mut self.instances).collapse(&key, Arc::make_mut(&mut self.answers));
        }

        self.document = document;
        Ok(())
    }

    fn repeatable(&self, key: &GroupKey) -> Result<(), SessionError> {
        match self.document.group(key) {
            Some(group) if group.repeatable => Ok(()),
            Some(_) => Err(SessionError::NotRepeatable(*key)),
            None => Err(SessionError::UnknownGroup(*key)),
        }
    }
}
