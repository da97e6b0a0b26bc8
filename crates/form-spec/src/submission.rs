//! Submission serializers.
//!
//! Two distinct output shapes exist and are kept apart on purpose:
//!
//! * the interactive shape ([`interactive_submission`]) mirrors the document
//!   tree with one-based page/instance numbers and slugified question text as
//!   leaf keys;
//! * the indexed shape ([`indexed_submission`]) is what the static export's
//!   script produces: zero-based `page_N.sections.section_N...question_N`
//!   paths and bare values.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::answers::{AnswerStore, AnswerValue, FileDescriptor};
use crate::instances::InstanceTable;
use crate::spec::{ChoiceOption, Document, Question};
use crate::visibility::{VisibilityMode, live_instances, question_visible};

const SLUG_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveSubmission {
    pub form_data: IndexMap<String, PageEntry>,
    pub metadata: InteractiveMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageEntry {
    pub title: String,
    pub sections: Vec<SectionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionEntry {
    pub title: String,
    pub groups: Vec<GroupEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupEntry {
    pub title: String,
    pub repeatable: bool,
    pub instances: Vec<InstanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceEntry {
    pub instance: usize,
    pub questions: IndexMap<String, AnswerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerEntry {
    pub question: String,
    pub answer: Value,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileDescriptor>,
    /// Free text typed next to chosen `requiresInput` options, by option value.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub details: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveMetadata {
    pub exported_at: String,
    pub total_pages: usize,
    pub source_document: String,
}

/// Current UTC time in RFC 3339, as stamped into submissions.
pub fn timestamp_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Lowercase, drop everything but ASCII word characters and whitespace, turn
/// each whitespace run into `_`, cap at 50 characters.
///
/// Leading and trailing runs are kept, so `" Name "` becomes `_name_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut in_space = false;
    for ch in text.to_lowercase().chars() {
        if is_browser_space(ch) {
            if !in_space {
                slug.push('_');
            }
            in_space = true;
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            slug.push(ch);
            in_space = false;
        }
    }
    slug.chars().take(SLUG_LIMIT).collect()
}

/// Whitespace as a browser `\s` class sees it.
fn is_browser_space(ch: char) -> bool {
    ch == '\u{feff}' || (ch.is_whitespace() && ch != '\u{85}')
}

/// Builds the interactive submission for every visible answerable question.
///
/// Slug collisions inside one instance get a `_2`, `_3`... suffix and an
/// empty slug falls back to `question_<n>`.
pub fn interactive_submission(
    document: &Document,
    answers: &AnswerStore,
    instances: &InstanceTable,
    exported_at: impl Into<String>,
) -> InteractiveSubmission {
    let index = document.index();
    let mut form_data = IndexMap::new();

    for (p, page) in document.pages.iter().enumerate() {
        let mut sections = Vec::new();
        for (s, section) in page.sections.iter().enumerate() {
            let mut groups = Vec::new();
            for (g, group) in section.groups.iter().enumerate() {
                let group_key = crate::address::group_key(p, s, g);
                let count = live_instances(document, instances, &group_key);
                let mut entries = Vec::new();
                for instance in 0..count {
                    let mut questions = IndexMap::new();
                    for (q, question) in group.questions.iter().enumerate() {
                        if !question.answer_type.is_answerable() {
                            continue;
                        }
                        let coords = group_key.question(q);
                        if !question_visible(
                            &index,
                            answers,
                            &coords,
                            question,
                            instance,
                            VisibilityMode::Visible,
                        ) {
                            continue;
                        }
                        let key = coords.field_key(instance).to_string();
                        let slug = unique_slug(&questions, question, q);
                        questions.insert(slug, answer_entry(question, answers, &key));
                        for (position, sub_question) in question.sub_questions.iter().enumerate() {
                            if !sub_question.answer_type.is_answerable() {
                                continue;
                            }
                            let slug = unique_slug(&questions, sub_question, q);
                            let sub_key = format!("{}_sub{}", key, position);
                            questions.insert(slug, answer_entry(sub_question, answers, &sub_key));
                        }
                    }
                    entries.push(InstanceEntry {
                        instance: instance + 1,
                        questions,
                    });
                }
                groups.push(GroupEntry {
                    title: group.title.clone(),
                    repeatable: group.repeatable,
                    instances: entries,
                });
            }
            sections.push(SectionEntry {
                title: section.title.clone(),
                groups,
            });
        }
        form_data.insert(
            format!("page_{}", p + 1),
            PageEntry {
                title: page.title.clone(),
                sections,
            },
        );
    }

    InteractiveSubmission {
        form_data,
        metadata: InteractiveMetadata {
            exported_at: exported_at.into(),
            total_pages: document.pages.len(),
            source_document: document.source_name.clone(),
        },
    }
}

fn unique_slug(taken: &IndexMap<String, AnswerEntry>, question: &Question, position: usize) -> String {
    let mut base = slugify(&question.text);
    if base.is_empty() {
        base = format!("question_{}", position + 1);
    }
    if !taken.contains_key(&base) {
        return base;
    }
    (2..)
        .map(|suffix| format!("{}_{}", base, suffix))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or(base)
}

fn answer_entry(question: &Question, answers: &AnswerStore, key: &str) -> AnswerEntry {
    let answer = answers.get(key);
    AnswerEntry {
        question: question.text.clone(),
        answer: answer.map(AnswerValue::to_json).unwrap_or(Value::Null),
        kind: question.answer_type.as_str().to_string(),
        file: answer.and_then(AnswerValue::as_file).cloned(),
        details: option_details(question, answers, key)
            .map(|(_, option, text)| (option.value.clone(), text.to_string()))
            .collect(),
    }
}

/// Non-empty detail answers (`{key}_opt{n}`) of the options currently chosen
/// for the question stored under `key`.
fn option_details<'a>(
    question: &'a Question,
    answers: &'a AnswerStore,
    key: &'a str,
) -> impl Iterator<Item = (usize, &'a ChoiceOption, &'a str)> + 'a {
    let answer = answers.get(key);
    question
        .options
        .iter()
        .enumerate()
        .filter(move |(_, option)| option.requires_input && option_chosen(answer, &option.value))
        .filter_map(move |(n, option)| {
            answers
                .get(&format!("{}_opt{}", key, n))
                .and_then(AnswerValue::as_text)
                .filter(|text| !text.is_empty())
                .map(|text| (n, option, text))
        })
}

fn option_chosen(answer: Option<&AnswerValue>, value: &str) -> bool {
    match answer {
        Some(AnswerValue::Text(text)) => text == value,
        Some(AnswerValue::Multi(values)) => values.iter().any(|chosen| chosen == value),
        _ => false,
    }
}

/// Builds the index-based shape produced by the static export's script.
///
/// Only canonical field keys of visible questions with a non-empty answer are
/// included, matching what a browser form would post. Detail text of a chosen
/// `requiresInput` option sits next to its question as `question_<q>_opt<n>`.
pub fn indexed_submission(
    document: &Document,
    answers: &AnswerStore,
    instances: &InstanceTable,
    exported_at: impl Into<String>,
) -> Value {
    let index = document.index();
    let mut tree: IndexedTree = IndexMap::new();

    for (coords, question) in document.questions() {
        if !question.answer_type.is_answerable() {
            continue;
        }
        let count = live_instances(document, instances, &coords.group_key());
        for instance in 0..count {
            if !question_visible(
                &index,
                answers,
                &coords,
                question,
                instance,
                VisibilityMode::Visible,
            ) {
                continue;
            }
            let key = coords.field_key(instance);
            let Some(answer) = answers.field(&key).filter(|answer| answer.is_truthy()) else {
                continue;
            };
            let slot = tree
                .entry(key.page)
                .or_default()
                .entry(key.section)
                .or_default()
                .entry(key.group)
                .or_default()
                .entry(key.instance)
                .or_default();
            slot.insert(format!("question_{}", key.question), answer.to_json());
            let field = key.to_string();
            for (n, _, text) in option_details(question, answers, &field) {
                slot.insert(
                    format!("question_{}_opt{}", key.question, n),
                    Value::String(text.to_string()),
                );
            }
        }
    }

    json!({
        "formData": indexed_form_data(tree),
        "metadata": {
            "exportedAt": exported_at.into(),
            "totalPages": document.pages.len(),
        }
    })
}

/// page -> section -> group -> instance -> `question_<q>` answers.
type IndexedTree = IndexMap<usize, IndexMap<usize, IndexMap<usize, IndexMap<usize, Map<String, Value>>>>>;

fn indexed_form_data(tree: IndexedTree) -> Map<String, Value> {
    let named = |prefix: &str, position: usize| format!("{}_{}", prefix, position);
    tree.into_iter()
        .map(|(page, sections)| {
            let sections: Map<String, Value> = sections
                .into_iter()
                .map(|(section, groups)| {
                    let groups: Map<String, Value> = groups
                        .into_iter()
                        .map(|(group, instances)| {
                            let instances: Map<String, Value> = instances
                                .into_iter()
                                .map(|(instance, questions)| {
                                    (named("instance", instance), Value::Object(questions))
                                })
                                .collect();
                            (named("group", group), json!({ "instances": instances }))
                        })
                        .collect();
                    (named("section", section), json!({ "groups": groups }))
                })
                .collect();
            (named("page", page), json!({ "sections": sections }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{field_key, group_key};
    use crate::spec::{AnswerType, Group, Page, Section, ShowWhen};

    #[test]
    fn slug_rule() {
        assert_eq!(slugify("What is your  Full Name?"), "what_is_your_full_name");
        assert_eq!(slugify("  Date of birth (DD/MM/YYYY) "), "_date_of_birth_ddmmyyyy_");
        assert_eq!(slugify("Caf\u{e9} name"), "caf_name");
        assert_eq!(slugify("Name - first"), "name_first");
        assert_eq!(slugify("snake_case stays"), "snake_case_stays");
        let long = "word ".repeat(30);
        assert_eq!(slugify(&long).chars().count(), 50);
        assert_eq!(slugify("???"), "");
    }

    fn document() -> Document {
        Document::new("tax.pdf").with_page(
            Page::new("Personal", 1).with_section(
                Section::new("Identity")
                    .with_group(
                        Group::new("Basics")
                            .with_question(Question::new("Intro", AnswerType::DisplayText))
                            .with_question(
                                Question::new("Has dependents?", AnswerType::Radio)
                                    .with_id("deps")
                                    .with_options(["yes", "no"]),
                            )
                            .with_question(
                                Question::new("Name", AnswerType::Text)
                                    .depends_on("deps", Some(ShowWhen::One("yes".into()))),
                            ),
                    )
                    .with_group(
                        Group::new("Dependents")
                            .repeatable()
                            .with_question(Question::new("Name", AnswerType::Text))
                            .with_question(Question::new("Name", AnswerType::Text)),
                    ),
            ),
        )
    }

    #[test]
    fn interactive_shape_uses_one_based_numbers_and_slugs() {
        let document = document();
        let mut answers = AnswerStore::new();
        answers.insert(field_key(0, 0, 0, 1, 0).to_string(), "no");
        answers.insert(field_key(0, 0, 1, 0, 1).to_string(), "Bo");
        let mut instances = InstanceTable::new();
        instances.add(&group_key(0, 0, 1));

        let submission =
            interactive_submission(&document, &answers, &instances, "2024-01-01T00:00:00Z");
        let value = serde_json::to_value(&submission).expect("json");

        let basics = &value["formData"]["page_1"]["sections"][0]["groups"][0];
        let first = &basics["instances"][0];
        assert_eq!(first["instance"], 1);
        assert_eq!(first["questions"]["has_dependents"]["answer"], "no");
        assert_eq!(first["questions"]["has_dependents"]["type"], "radio");
        assert!(first["questions"].get("intro").is_none());
        assert!(first["questions"].get("name").is_none());

        let dependents = &value["formData"]["page_1"]["sections"][0]["groups"][1];
        assert_eq!(dependents["repeatable"], true);
        assert_eq!(dependents["instances"][1]["instance"], 2);
        assert_eq!(dependents["instances"][1]["questions"]["name"]["answer"], "Bo");
        assert!(dependents["instances"][1]["questions"]["name_2"]["answer"].is_null());
        assert_eq!(value["metadata"]["totalPages"], 1);
        assert_eq!(value["metadata"]["sourceDocument"], "tax.pdf");
    }

    #[test]
    fn file_answers_carry_descriptor() {
        let document = Document::new("f").with_page(Page::new("p", 1).with_section(
            Section::new("s").with_group(
                Group::new("g").with_question(Question::new("Proof of address", AnswerType::File)),
            ),
        ));
        let mut answers = AnswerStore::new();
        answers.insert(
            field_key(0, 0, 0, 0, 0).to_string(),
            FileDescriptor {
                name: "bill.pdf".into(),
                size: 10,
                mime: Some("application/pdf".into()),
            },
        );
        let submission = interactive_submission(&document, &answers, &InstanceTable::new(), "t");
        let entry = &submission.form_data["page_1"].sections[0].groups[0].instances[0].questions
            ["proof_of_address"];
        assert_eq!(entry.answer, Value::String("bill.pdf".into()));
        assert_eq!(entry.file.as_ref().map(|file| file.size), Some(10));
    }

    fn pets_document() -> Document {
        let mut pets = Question::new("Pets", AnswerType::Checkbox);
        pets.options = vec![
            ChoiceOption::plain("Cat"),
            ChoiceOption::plain("Other").with_input("text"),
            ChoiceOption::plain("Bird").with_input("text"),
        ];
        Document::new("pets.pdf").with_page(
            Page::new("p", 1)
                .with_section(Section::new("s").with_group(Group::new("g").with_question(pets))),
        )
    }

    #[test]
    fn option_details_reach_both_shapes() {
        let document = pets_document();
        let key = field_key(0, 0, 0, 0, 0);
        let mut answers = AnswerStore::new();
        answers.insert(key.to_string(), AnswerValue::multi(["Cat", "Other"]));
        answers.insert(key.option_detail(1), "Parrot");
        // Detail of an option that is not chosen stays out.
        answers.insert(key.option_detail(2), "Finch");

        let submission = interactive_submission(&document, &answers, &InstanceTable::new(), "t");
        let entry = &submission.form_data["page_1"].sections[0].groups[0].instances[0].questions
            ["pets"];
        assert_eq!(entry.details.len(), 1);
        assert_eq!(entry.details["Other"], "Parrot");

        let value = indexed_submission(&document, &answers, &InstanceTable::new(), "t");
        let instance = &value["formData"]["page_0"]["sections"]["section_0"]["groups"]["group_0"]
            ["instances"]["instance_0"];
        assert_eq!(instance["question_0_opt1"], "Parrot");
        assert!(instance.get("question_0_opt2").is_none());
    }

    #[test]
    fn empty_details_are_omitted() {
        let document = pets_document();
        let key = field_key(0, 0, 0, 0, 0);
        let mut answers = AnswerStore::new();
        answers.insert(key.to_string(), AnswerValue::multi(["Other"]));
        answers.insert(key.option_detail(1), "");

        let submission = interactive_submission(&document, &answers, &InstanceTable::new(), "t");
        let value = serde_json::to_value(&submission).expect("json");
        let entry = &value["formData"]["page_1"]["sections"][0]["groups"][0]["instances"][0]
            ["questions"]["pets"];
        assert!(entry.get("details").is_none());
    }

    #[test]
    fn indexed_shape_uses_zero_based_paths() {
        let document = document();
        let mut answers = AnswerStore::new();
        answers.insert(field_key(0, 0, 0, 1, 0).to_string(), "yes");
        answers.insert(field_key(0, 0, 0, 2, 0).to_string(), "Ada");
        answers.insert(field_key(0, 0, 1, 1, 1).to_string(), "Bo");
        answers.insert(field_key(0, 0, 1, 0, 0).to_string(), "");
        let mut instances = InstanceTable::new();
        instances.add(&group_key(0, 0, 1));

        let value = indexed_submission(&document, &answers, &instances, "now");
        let section = &value["formData"]["page_0"]["sections"]["section_0"]["groups"];
        assert_eq!(section["group_0"]["instances"]["instance_0"]["question_1"], "yes");
        assert_eq!(section["group_0"]["instances"]["instance_0"]["question_2"], "Ada");
        assert_eq!(section["group_1"]["instances"]["instance_1"]["question_1"], "Bo");
        assert!(section["group_1"]["instances"].get("instance_0").is_none());
        assert_eq!(value["metadata"]["totalPages"], 1);
        assert_eq!(value["metadata"]["exportedAt"], "now");
    }
}
