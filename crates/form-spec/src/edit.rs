//! Document editing with structural sharing.
//!
//! Every operation takes the current document and returns a new one. Pages,
//! sections and groups that the edit does not touch are shared with the
//! input through their `Arc`s, so snapshots of older versions stay cheap.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::address::{GroupKey, QuestionCoords};
use crate::spec::{DependencyIssue, Document, Group, Question, QuestionId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("no question with id '{0}'")]
    UnknownQuestion(QuestionId),
    #[error("no group at {0}")]
    UnknownGroup(GroupKey),
    #[error("position {position} is outside group {group} with {len} questions")]
    OutOfBounds {
        group: GroupKey,
        position: usize,
        len: usize,
    },
    #[error("edit would leave the document inconsistent: {0}")]
    Dependency(DependencyIssue),
}

/// Replaces the question with `id`, keeping it in place.
///
/// The replacement keeps the original identifier so dependents stay linked.
pub fn update_question(
    document: &Document,
    id: &QuestionId,
    mut question: Question,
) -> Result<Document, EditError> {
    let coords = document
        .locate(id)
        .ok_or_else(|| EditError::UnknownQuestion(id.clone()))?;
    question.id = id.clone();

    let mut next = document.clone();
    let group = group_mut(&mut next, &coords.group_key())?;
    group.questions[coords.question] = question;
    ensure_consistent(next)
}

/// Inserts `question` at `position` inside `group`; `None` appends.
pub fn insert_question(
    document: &Document,
    group: &GroupKey,
    position: Option<usize>,
    question: Question,
) -> Result<Document, EditError> {
    let mut next = document.clone();
    let target = group_mut(&mut next, group)?;
    let len = target.questions.len();
    let position = position.unwrap_or(len);
    if position > len {
        return Err(EditError::OutOfBounds {
            group: *group,
            position,
            len,
        });
    }
    target.questions.insert(position, question);
    ensure_consistent(next)
}

/// Removes the question with `id`. Questions that depended on it lose their
/// parent link and become unconditional.
pub fn remove_question(document: &Document, id: &QuestionId) -> Result<Document, EditError> {
    let coords = document
        .locate(id)
        .ok_or_else(|| EditError::UnknownQuestion(id.clone()))?;

    let mut next = document.clone();
    group_mut(&mut next, &coords.group_key())?
        .questions
        .remove(coords.question);

    let dependents: Vec<QuestionCoords> = next
        .questions()
        .filter(|(_, question)| question.parent_question_id.as_ref() == Some(id))
        .map(|(coords, _)| coords)
        .collect();
    for coords in dependents {
        let group = group_mut(&mut next, &coords.group_key())?;
        let question = &mut group.questions[coords.question];
        warn!(question = %question.id, parent = %id, "dropping link to removed parent");
        question.parent_question_id = None;
        question.show_when = None;
    }

    ensure_consistent(next)
}

/// Moves the question with `id` to `position` inside `group`.
///
/// Fails with [`EditError::Dependency`] when the move would put a parent
/// after one of its dependents.
pub fn move_question(
    document: &Document,
    id: &QuestionId,
    group: &GroupKey,
    position: usize,
) -> Result<Document, EditError> {
    let coords = document
        .locate(id)
        .ok_or_else(|| EditError::UnknownQuestion(id.clone()))?;

    let mut next = document.clone();
    let question = group_mut(&mut next, &coords.group_key())?
        .questions
        .remove(coords.question);
    let target = group_mut(&mut next, group)?;
    let len = target.questions.len();
    if position > len {
        return Err(EditError::OutOfBounds {
            group: *group,
            position,
            len,
        });
    }
    target.questions.insert(position, question);
    ensure_consistent(next)
}

pub fn set_group_repeatable(
    document: &Document,
    group: &GroupKey,
    repeatable: bool,
) -> Result<Document, EditError> {
    let mut next = document.clone();
    group_mut(&mut next, group)?.repeatable = repeatable;
    Ok(next)
}

/// Copy-on-write access to one group; siblings stay shared.
fn group_mut<'a>(document: &'a mut Document, key: &GroupKey) -> Result<&'a mut Group, EditError> {
    let missing = || EditError::UnknownGroup(*key);
    let page = document.pages.get_mut(key.page).ok_or_else(missing)?;
    let section = Arc::make_mut(page)
        .sections
        .get_mut(key.section)
        .ok_or_else(missing)?;
    let group = Arc::make_mut(section)
        .groups
        .get_mut(key.group)
        .ok_or_else(missing)?;
    Ok(Arc::make_mut(group))
}

fn ensure_consistent(document: Document) -> Result<Document, EditError> {
    match document.check_dependencies().into_iter().next() {
        Some(issue) => Err(EditError::Dependency(issue)),
        None => Ok(document),
    }
}
