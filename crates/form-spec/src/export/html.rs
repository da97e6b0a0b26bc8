use crate::address::{GroupKey, QuestionCoords};
use crate::export::{InstanceFidelity, escape_html};
use crate::spec::{AnswerType, ChoiceOption, Document, Group, Question};

/// Stands in for the instance index inside `<template>` markup.
pub const INSTANCE_PLACEHOLDER: &str = "__INSTANCE__";

#[derive(Debug, Clone, Copy)]
enum Slot {
    Index(usize),
    Placeholder,
}

impl Slot {
    fn label(self) -> String {
        match self {
            Slot::Index(index) => index.to_string(),
            Slot::Placeholder => INSTANCE_PLACEHOLDER.to_string(),
        }
    }
}

pub(super) fn render_body(document: &Document, fidelity: InstanceFidelity) -> String {
    let mut out = String::new();
    for (p, page) in document.pages.iter().enumerate() {
        out.push_str(&format!(
            "<section class=\"fc-page\" data-page=\"{}\" data-page-number=\"{}\">\n",
            p, page.page_number
        ));
        out.push_str(&format!(
            "<h2 class=\"fc-page-title\">{}</h2>\n",
            escape_html(&page.title)
        ));
        for (s, section) in page.sections.iter().enumerate() {
            out.push_str(&format!(
                "<fieldset class=\"fc-section\" data-section=\"{}\">\n<legend>{}</legend>\n",
                s,
                escape_html(&section.title)
            ));
            for (g, group) in section.groups.iter().enumerate() {
                let key = crate::address::group_key(p, s, g);
                render_group(&mut out, &key, group, fidelity);
            }
            out.push_str("</fieldset>\n");
        }
        out.push_str("</section>\n");
    }
    out
}

fn render_group(out: &mut String, key: &GroupKey, group: &Group, fidelity: InstanceFidelity) {
    out.push_str(&format!(
        "<div class=\"fc-group\" data-group-key=\"{}\" data-repeatable=\"{}\">\n",
        key, group.repeatable
    ));
    if !group.title.is_empty() {
        out.push_str(&format!(
            "<h3 class=\"fc-group-title\">{}</h3>\n",
            escape_html(&group.title)
        ));
    }
    out.push_str("<div class=\"fc-instances\">\n");
    render_instance(out, key, group, Slot::Index(0));
    out.push_str("</div>\n");

    if group.repeatable {
        out.push_str(&format!(
            "<button type=\"button\" class=\"fc-add-instance\" data-group-key=\"{}\">Add another</button>\n",
            key
        ));
        if fidelity == InstanceFidelity::Template {
            out.push_str(&format!("<template data-instance-template=\"{}\">\n", key));
            render_instance(out, key, group, Slot::Placeholder);
            out.push_str("</template>\n");
        }
    }
    out.push_str("</div>\n");
}

fn render_instance(out: &mut String, key: &GroupKey, group: &Group, slot: Slot) {
    out.push_str(&format!(
        "<div class=\"fc-instance\" data-instance=\"{}\">\n",
        slot.label()
    ));
    if group.repeatable {
        let number = match slot {
            Slot::Index(index) => (index + 1).to_string(),
            Slot::Placeholder => String::new(),
        };
        out.push_str(&format!(
            "<div class=\"fc-instance-header\"><span class=\"fc-instance-number\">{}</span>\
             <button type=\"button\" class=\"fc-remove-instance\">Remove</button></div>\n",
            number
        ));
    }
    for (q, question) in group.questions.iter().enumerate() {
        let field = field_key_text(&key.question(q), slot);
        render_question(out, question, &field, false);
    }
    out.push_str("</div>\n");
}

fn field_key_text(coords: &QuestionCoords, slot: Slot) -> String {
    match slot {
        Slot::Index(index) => coords.field_key(index).to_string(),
        Slot::Placeholder => format!(
            "p{}_s{}_g{}_q{}_i{}",
            coords.page, coords.section, coords.group, coords.question, INSTANCE_PLACEHOLDER
        ),
    }
}

fn render_question(out: &mut String, question: &Question, key: &str, sub: bool) {
    let class = if sub {
        "fc-question fc-subquestion"
    } else {
        "fc-question"
    };
    let mut attrs = format!(
        "class=\"{}\" data-field-key=\"{}\" data-question-id=\"{}\" data-type=\"{}\" data-required=\"{}\"",
        class,
        escape_html(key),
        escape_html(question.id.as_str()),
        question.answer_type,
        question.required
    );
    if !sub && let Some(parent) = &question.parent_question_id {
        attrs.push_str(&format!(" data-parent-id=\"{}\"", escape_html(parent.as_str())));
        if let Some(show_when) = &question.show_when {
            attrs.push_str(&format!(
                " data-show-when=\"{}\"",
                escape_html(&show_when.to_json())
            ));
        }
    }
    if let Some(validation) = question.validation.as_ref().filter(|spec| !spec.is_empty())
        && let Ok(json) = serde_json::to_string(validation)
    {
        attrs.push_str(&format!(" data-validation=\"{}\"", escape_html(&json)));
    }
    if question.answer_type == AnswerType::RadioMultiPerson
        && let Ok(json) = serde_json::to_string(&question.applies_to)
    {
        attrs.push_str(&format!(" data-applies-to=\"{}\"", escape_html(&json)));
    }
    out.push_str(&format!("<div {}>\n", attrs));

    let text = escape_html(&question.text);
    let required = if question.required {
        "<span class=\"fc-required\" aria-hidden=\"true\">*</span>"
    } else {
        ""
    };
    let id = escape_html(key);

    match question.answer_type {
        AnswerType::DisplayText => {
            out.push_str(&format!("<p class=\"fc-display\">{}</p>\n", text));
        }
        AnswerType::Text
        | AnswerType::Email
        | AnswerType::Tel
        | AnswerType::Date
        | AnswerType::Number => {
            out.push_str(&label_for(&id, &text, required));
            out.push_str(&format!(
                "<input type=\"{}\" id=\"{}\" name=\"{}\">\n",
                question.answer_type, id, id
            ));
        }
        AnswerType::Textarea => {
            out.push_str(&label_for(&id, &text, required));
            out.push_str(&format!(
                "<textarea id=\"{}\" name=\"{}\" rows=\"3\"></textarea>\n",
                id, id
            ));
        }
        AnswerType::Dropdown => {
            out.push_str(&label_for(&id, &text, required));
            out.push_str(&format!("<select id=\"{}\" name=\"{}\">\n", id, id));
            out.push_str("<option value=\"\">Select...</option>\n");
            for option in &question.options {
                out.push_str(&format!(
                    "<option value=\"{}\">{}</option>\n",
                    escape_html(&option.value),
                    escape_html(&option.label)
                ));
            }
            out.push_str("</select>\n");
            render_option_details(out, &question.options, key);
        }
        AnswerType::Radio | AnswerType::Checkbox => {
            out.push_str(&format!("<span class=\"fc-label\">{}{}</span>\n", text, required));
            out.push_str("<div class=\"fc-options\">\n");
            let input_type = if question.answer_type == AnswerType::Radio {
                "radio"
            } else {
                "checkbox"
            };
            for (n, option) in question.options.iter().enumerate() {
                out.push_str(&format!(
                    "<label><input type=\"{}\" id=\"{}-o{}\" name=\"{}\" value=\"{}\"> {}</label>\n",
                    input_type,
                    id,
                    n,
                    id,
                    escape_html(&option.value),
                    escape_html(&option.label)
                ));
            }
            out.push_str("</div>\n");
            render_option_details(out, &question.options, key);
        }
        AnswerType::RadioMultiPerson => {
            out.push_str(&format!("<span class=\"fc-label\">{}{}</span>\n", text, required));
            out.push_str("<div class=\"fc-people\">\n");
            for (r, role) in question.applies_to.iter().enumerate() {
                out.push_str(&format!(
                    "<div class=\"fc-person\" data-role=\"{}\"><span class=\"fc-role\">{}</span>\n",
                    escape_html(role),
                    escape_html(role)
                ));
                for option in &question.options {
                    out.push_str(&format!(
                        "<label><input type=\"radio\" name=\"{}:{}\" value=\"{}\"> {}</label>\n",
                        id,
                        r,
                        escape_html(&option.value),
                        escape_html(&option.label)
                    ));
                }
                out.push_str("</div>\n");
            }
            out.push_str("</div>\n");
        }
        AnswerType::File => {
            out.push_str(&label_for(&id, &text, required));
            let accept = question
                .validation
                .as_ref()
                .and_then(|spec| spec.accept.as_deref())
                .map(|accept| format!(" accept=\"{}\"", escape_html(accept)))
                .unwrap_or_default();
            out.push_str(&format!(
                "<input type=\"file\" id=\"{}\" name=\"{}\"{}>\n",
                id, id, accept
            ));
        }
    }

    if !sub && !question.sub_questions.is_empty() {
        out.push_str("<div class=\"fc-subquestions\">\n");
        for (n, sub_question) in question.sub_questions.iter().enumerate() {
            render_question(out, sub_question, &format!("{}_sub{}", key, n), true);
        }
        out.push_str("</div>\n");
    }

    if question.answer_type.is_answerable() {
        out.push_str(&format!(
            "<div class=\"fc-error\" data-error-for=\"{}\" role=\"alert\" hidden></div>\n",
            id
        ));
    }
    out.push_str("</div>\n");
}

fn label_for(id: &str, text: &str, required: &str) -> String {
    format!(
        "<label class=\"fc-label\" for=\"{}\">{}{}</label>\n",
        id, text, required
    )
}

/// Free-text inputs revealed by the script when their option is chosen.
fn render_option_details(out: &mut String, options: &[ChoiceOption], key: &str) {
    for (n, option) in options.iter().enumerate() {
        if !option.requires_input {
            continue;
        }
        let input_type = option.input_type.as_deref().unwrap_or("text");
        let detail = escape_html(&format!("{}_opt{}", key, n));
        out.push_str(&format!(
            "<input type=\"{}\" class=\"fc-option-detail\" id=\"{}\" name=\"{}\" data-option-value=\"{}\" aria-label=\"{}\" hidden>\n",
            escape_html(input_type),
            detail,
            detail,
            escape_html(&option.value),
            escape_html(&option.label)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Page, Section, ShowWhen, ValidationSpec};

    fn document() -> Document {
        Document::new("render.pdf").with_page(
            Page::new("Page <1>", 1).with_section(
                Section::new("Household").with_group(
                    Group::new("Members")
                        .repeatable()
                        .with_question(
                            Question::new("Relation", AnswerType::Dropdown)
                                .with_id("rel")
                                .with_options(["spouse", "child"]),
                        )
                        .with_question(
                            Question::new("Age", AnswerType::Number)
                                .with_id("age")
                                .required()
                                .depends_on("rel", Some(ShowWhen::One("child".into())))
                                .with_validation(ValidationSpec {
                                    min: Some(0.0),
                                    ..Default::default()
                                }),
                        ),
                ),
            ),
        )
    }

    #[test]
    fn questions_carry_data_attributes() {
        let html = render_body(&document(), InstanceFidelity::GenericText);
        assert!(html.contains("<h2 class=\"fc-page-title\">Page &lt;1&gt;</h2>"));
        assert!(html.contains("data-field-key=\"p0_s0_g0_q1_i0\""));
        assert!(html.contains("data-question-id=\"age\""));
        assert!(html.contains("data-type=\"number\""));
        assert!(html.contains("data-required=\"true\""));
        assert!(html.contains("data-parent-id=\"rel\""));
        assert!(html.contains("data-show-when=\"&quot;child&quot;\""));
        assert!(html.contains("data-validation=\"{&quot;min&quot;:0.0}\""));
        assert!(html.contains("class=\"fc-add-instance\""));
        assert!(!html.contains("<template"));
    }

    #[test]
    fn template_fidelity_emits_placeholder_instance() {
        let html = render_body(&document(), InstanceFidelity::Template);
        assert!(html.contains("<template data-instance-template=\"p0_s0_g0\">"));
        assert!(html.contains("data-field-key=\"p0_s0_g0_q0_i__INSTANCE__\""));
        assert!(html.contains("<select id=\"p0_s0_g0_q0_i__INSTANCE__\""));
    }

    #[test]
    fn option_details_and_sub_questions_use_extension_keys() {
        let mut choice = Question::new("Income source", AnswerType::Radio).with_id("src");
        choice.options = vec![
            ChoiceOption::plain("Salary"),
            ChoiceOption::plain("Other").with_input("text"),
        ];
        let choice = choice.with_sub_question(Question::new("Employer", AnswerType::Text));
        let document = Document::new("x").with_page(
            Page::new("p", 1)
                .with_section(Section::new("s").with_group(Group::new("g").with_question(choice))),
        );
        let html = render_body(&document, InstanceFidelity::GenericText);
        assert!(html.contains("name=\"p0_s0_g0_q0_i0_opt1\""));
        assert!(html.contains("data-option-value=\"Other\""));
        assert!(!html.contains("p0_s0_g0_q0_i0_opt0"));
        assert!(html.contains("class=\"fc-question fc-subquestion\" data-field-key=\"p0_s0_g0_q0_i0_sub0\""));
    }
}
