use std::collections::BTreeMap;

use crate::address::{FieldKey, GroupKey, QuestionCoords};
use crate::answers::{AnswerStore, AnswerValue};
use crate::instances::InstanceTable;
use crate::spec::{Document, Question, QuestionIndex, ShowWhen};

pub type VisibilityMap = BTreeMap<FieldKey, bool>;

/// Outcome for a question whose parent cannot be found in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityMode {
    #[default]
    Visible,
    Hidden,
}

/// Decides whether `question` is shown for the given parent answer.
///
/// The exported script embeds a line-by-line re-encoding of this rule, keep
/// the two in sync.
pub fn is_visible(question: &Question, parent_answer: Option<&AnswerValue>) -> bool {
    if question.parent_question_id.is_none() {
        return true;
    }
    let Some(answer) = parent_answer else {
        return false;
    };

    match &question.show_when {
        None => answer.is_truthy(),
        Some(ShowWhen::One(expected)) => match answer {
            AnswerValue::Multi(values) => values.iter().any(|value| value == expected),
            other => scalar(other) == Some(expected.as_str()),
        },
        Some(ShowWhen::Any(expected)) => match answer {
            AnswerValue::Multi(values) => values.iter().any(|value| expected.contains(value)),
            other => scalar(other).is_some_and(|value| expected.iter().any(|e| e == value)),
        },
    }
}

fn scalar(answer: &AnswerValue) -> Option<&str> {
    match answer {
        AnswerValue::Text(text) => Some(text),
        AnswerValue::File(file) => Some(&file.name),
        AnswerValue::Multi(_) | AnswerValue::PerPerson(_) => None,
    }
}

/// Field key holding the parent answer for `question` at `instance`.
///
/// A parent in the same group is read at the dependent's own instance; any
/// other parent is read at instance 0 of its group.
pub fn parent_field_key(
    index: &QuestionIndex<'_>,
    coords: &QuestionCoords,
    question: &Question,
    instance: usize,
) -> Option<FieldKey> {
    let parent_id = question.parent_question_id.as_ref()?;
    let (parent_coords, _) = index.get(parent_id)?;
    let parent_instance = if parent_coords.group_key() == coords.group_key() {
        instance
    } else {
        0
    };
    Some(parent_coords.field_key(parent_instance))
}

/// Visibility of one question at one instance against the answer store.
pub fn question_visible(
    index: &QuestionIndex<'_>,
    answers: &AnswerStore,
    coords: &QuestionCoords,
    question: &Question,
    instance: usize,
    mode: VisibilityMode,
) -> bool {
    if question.parent_question_id.is_none() {
        return true;
    }
    match parent_field_key(index, coords, question, instance) {
        Some(parent_key) => is_visible(question, answers.field(&parent_key)),
        None => matches!(mode, VisibilityMode::Visible),
    }
}

/// Evaluates every question at every live instance.
pub fn resolve_visibility(
    document: &Document,
    answers: &AnswerStore,
    instances: &InstanceTable,
    mode: VisibilityMode,
) -> VisibilityMap {
    let index = document.index();
    let mut map = VisibilityMap::new();

    for (coords, question) in document.questions() {
        let group_key = coords.group_key();
        let count = live_instances(document, instances, &group_key);
        for instance in 0..count {
            let visible = question_visible(&index, answers, &coords, question, instance, mode);
            map.insert(coords.field_key(instance), visible);
        }
    }

    map
}

/// Instance count honoring the one-instance rule for non-repeatable groups.
pub(crate) fn live_instances(
    document: &Document,
    instances: &InstanceTable,
    group_key: &GroupKey,
) -> usize {
    match document.group(group_key) {
        Some(group) if group.repeatable => instances.count(group_key),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::field_key;
    use crate::spec::{AnswerType, Group, Page, Section};

    fn dependent(show_when: Option<ShowWhen>) -> Question {
        Question::new("child", AnswerType::Text).depends_on("parent", show_when)
    }

    #[test]
    fn unconditional_questions_are_visible() {
        let question = Question::new("free", AnswerType::Text);
        assert!(is_visible(&question, None));
    }

    #[test]
    fn scalar_match_shows_question() {
        let question = dependent(Some(ShowWhen::One("yes".into())));
        assert!(is_visible(&question, Some(&AnswerValue::text("yes"))));
        assert!(!is_visible(&question, Some(&AnswerValue::text("no"))));
        assert!(!is_visible(&question, Some(&AnswerValue::text(""))));
        assert!(!is_visible(&question, None));
    }

    #[test]
    fn list_show_when_intersects_array_answer() {
        let question = dependent(Some(ShowWhen::Any(vec!["yes".into(), "maybe".into()])));
        assert!(is_visible(
            &question,
            Some(&AnswerValue::multi(["maybe", "no"]))
        ));
        assert!(!is_visible(&question, Some(&AnswerValue::multi(["no"]))));
        assert!(is_visible(&question, Some(&AnswerValue::text("yes"))));
        assert!(!is_visible(&question, Some(&AnswerValue::text("never"))));
    }

    #[test]
    fn single_show_when_against_array_answer_checks_membership() {
        let question = dependent(Some(ShowWhen::One("b".into())));
        assert!(is_visible(&question, Some(&AnswerValue::multi(["a", "b"]))));
        assert!(!is_visible(&question, Some(&AnswerValue::multi(["a"]))));
    }

    #[test]
    fn missing_show_when_uses_truthiness() {
        let question = dependent(None);
        assert!(is_visible(&question, Some(&AnswerValue::text("anything"))));
        assert!(!is_visible(&question, Some(&AnswerValue::text(""))));
        assert!(!is_visible(&question, Some(&AnswerValue::Multi(vec![]))));
        assert!(is_visible(&question, Some(&AnswerValue::multi(["x"]))));
    }

    fn repeatable_document() -> Document {
        Document::new("kids.pdf").with_page(
            Page::new("Family", 1).with_section(
                Section::new("Household")
                    .with_group(
                        Group::new("Guardian").with_question(
                            Question::new("Has children?", AnswerType::Radio)
                                .with_id("has_children")
                                .with_options(["yes", "no"]),
                        ),
                    )
                    .with_group(
                        Group::new("Child")
                            .repeatable()
                            .with_question(
                                Question::new("Name", AnswerType::Text)
                                    .with_id("child_name")
                                    .depends_on("has_children", Some(ShowWhen::One("yes".into()))),
                            )
                            .with_question(
                                Question::new("In school?", AnswerType::Radio)
                                    .with_id("in_school")
                                    .with_options(["yes", "no"]),
                            )
                            .with_question(
                                Question::new("School name", AnswerType::Text)
                                    .with_id("school")
                                    .depends_on("in_school", Some(ShowWhen::One("yes".into()))),
                            ),
                    ),
            ),
        )
    }

    #[test]
    fn outside_parent_is_read_at_instance_zero() {
        let document = repeatable_document();
        let mut answers = AnswerStore::new();
        answers.insert(field_key(0, 0, 0, 0, 0).to_string(), "yes");
        let mut instances = InstanceTable::new();
        instances.add(&crate::address::group_key(0, 0, 1));

        let map = resolve_visibility(&document, &answers, &instances, VisibilityMode::Visible);
        assert_eq!(map.get(&field_key(0, 0, 1, 0, 0)), Some(&true));
        assert_eq!(map.get(&field_key(0, 0, 1, 0, 1)), Some(&true));
    }

    #[test]
    fn same_group_parent_is_read_at_own_instance() {
        let document = repeatable_document();
        let mut answers = AnswerStore::new();
        answers.insert(field_key(0, 0, 1, 1, 1).to_string(), "yes");
        let mut instances = InstanceTable::new();
        instances.add(&crate::address::group_key(0, 0, 1));

        let map = resolve_visibility(&document, &answers, &instances, VisibilityMode::Visible);
        assert_eq!(map.get(&field_key(0, 0, 1, 2, 0)), Some(&false));
        assert_eq!(map.get(&field_key(0, 0, 1, 2, 1)), Some(&true));
    }

    #[test]
    fn dangling_parent_follows_mode() {
        let document = Document::new("x").with_page(
            Page::new("p", 1).with_section(Section::new("s").with_group(
                Group::new("g").with_question(dependent(Some(ShowWhen::One("a".into())))),
            )),
        );
        let answers = AnswerStore::new();
        let instances = InstanceTable::new();
        let shown = resolve_visibility(&document, &answers, &instances, VisibilityMode::Visible);
        let hidden = resolve_visibility(&document, &answers, &instances, VisibilityMode::Hidden);
        assert_eq!(shown.get(&field_key(0, 0, 0, 0, 0)), Some(&true));
        assert_eq!(hidden.get(&field_key(0, 0, 0, 0, 0)), Some(&false));
    }
}
