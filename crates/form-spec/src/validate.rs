use fancy_regex::Regex;
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::answers::{AnswerStore, AnswerValue, FileDescriptor};
use crate::instances::InstanceTable;
use crate::spec::{AnswerType, Document, Question, ValidationSpec};
use crate::visibility::{VisibilityMode, live_instances, question_visible};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

const WORD: &str = "0-9A-Za-z_";
const NOT_WORD: &str = r"\x{0}-\x{2F}\x{3A}-\x{40}\x{5B}-\x{5E}\x{60}\x{7B}-\x{10FFFF}";
const DIGIT: &str = "0-9";
const NOT_DIGIT: &str = r"\x{0}-\x{2F}\x{3A}-\x{10FFFF}";
const SPACE: &str = r"\x{9}-\x{D}\x{20}\x{A0}\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}";
const WORD_BOUNDARY: &str =
    "(?:(?<=[0-9A-Za-z_])(?![0-9A-Za-z_])|(?<![0-9A-Za-z_])(?=[0-9A-Za-z_]))";
const NOT_WORD_BOUNDARY: &str =
    "(?:(?<=[0-9A-Za-z_])(?=[0-9A-Za-z_])|(?<![0-9A-Za-z_])(?![0-9A-Za-z_]))";

/// Invalid regular expression in a validation spec. Never fatal: the rule
/// is skipped.
#[derive(Debug, Error)]
#[error("invalid validation pattern '{pattern}': {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: Box<fancy_regex::Error>,
}

/// Compiles a validation pattern with the semantics of a browser `RegExp`:
/// lookaround and backreferences are available, and `\d`, `\w`, `\b` and
/// `\s` use the ASCII (and JavaScript whitespace) classes.
pub fn compile_pattern(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(&browser_classes(pattern)).map_err(|source| PatternError {
        pattern: pattern.to_string(),
        source: Box::new(source),
    })
}

/// Whether `text` matches `pattern` anywhere, as `RegExp.prototype.test` does.
pub fn pattern_matches(pattern: &str, text: &str) -> Result<bool, PatternError> {
    compile_pattern(pattern)?
        .is_match(text)
        .map_err(|source| PatternError {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })
}

/// Rewrites shorthand classes into explicit ranges so they match what the
/// browser matches instead of their Unicode meaning.
fn browser_classes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let Some(next) = chars.next() else {
                    out.push(ch);
                    break;
                };
                match shorthand(next, in_class) {
                    Some(expanded) => out.push_str(&expanded),
                    None => {
                        out.push(ch);
                        out.push(next);
                    }
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(ch);
            }
            ']' if in_class => {
                in_class = false;
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

fn shorthand(escape: char, in_class: bool) -> Option<String> {
    let ranges = match escape {
        'd' => DIGIT,
        'D' => NOT_DIGIT,
        'w' => WORD,
        'W' => NOT_WORD,
        's' => SPACE,
        'S' if !in_class => return Some(format!("[^{}]", SPACE)),
        'b' if in_class => return Some(r"\x{8}".to_string()),
        'b' => return Some(WORD_BOUNDARY.to_string()),
        'B' if !in_class => return Some(NOT_WORD_BOUNDARY.to_string()),
        _ => return None,
    };
    if in_class {
        Some(ranges.to_string())
    } else {
        Some(format!("[{}]", ranges))
    }
}

/// Rule that rejected an answer, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Required,
    Accept,
    MaxSize,
    MinLength,
    MaxLength,
    Min,
    Max,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule: Rule,
    pub message: String,
}

/// Aggregated per-field failures of a whole form, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    errors: IndexMap<String, String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn message(&self, key: &str) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.errors.iter()
    }

    fn insert(&mut self, key: String, message: String) {
        self.errors.insert(key, message);
    }
}

/// Validates one answer; `None` means valid.
pub fn validate_answer(question: &Question, answer: Option<&AnswerValue>) -> Option<String> {
    check_answer(question, answer).map(|failure| failure.message)
}

/// Like [`validate_answer`] but also reports which rule failed.
pub fn check_answer(question: &Question, answer: Option<&AnswerValue>) -> Option<RuleFailure> {
    if !question.answer_type.is_answerable() {
        return None;
    }

    let rules = question.validation.as_ref();
    let fail = |rule: Rule, default: String| {
        let message = rules
            .and_then(|spec| spec.error_message.clone())
            .unwrap_or(default);
        Some(RuleFailure { rule, message })
    };

    if question.required && is_missing(question, answer) {
        return fail(Rule::Required, "This field is required".into());
    }

    let (Some(answer), Some(spec)) = (answer, rules) else {
        return None;
    };
    if !answer.is_truthy() {
        return None;
    }

    if let AnswerValue::File(file) = answer {
        if let Some(accept) = &spec.accept
            && !file_accepted(file, accept)
        {
            return fail(Rule::Accept, format!("File type must be one of: {}", accept));
        }
        if let Some(max_size) = spec.max_size
            && (file.size as f64) > max_size * BYTES_PER_MEGABYTE
        {
            return fail(
                Rule::MaxSize,
                format!("File must be smaller than {} MB", max_size),
            );
        }
    }

    if let Some(length) = answer_length(answer) {
        if let Some(min_length) = spec.min_length
            && length < min_length
        {
            return fail(
                Rule::MinLength,
                format!("Minimum length is {}", min_length),
            );
        }
        if let Some(max_length) = spec.max_length
            && length > max_length
        {
            return fail(
                Rule::MaxLength,
                format!("Maximum length is {}", max_length),
            );
        }
    }

    if let Some(number) = answer.as_text().and_then(parse_number) {
        if let Some(min) = spec.min
            && number < min
        {
            return fail(Rule::Min, format!("Value must be at least {}", min));
        }
        if let Some(max) = spec.max
            && number > max
        {
            return fail(Rule::Max, format!("Value must be at most {}", max));
        }
    }

    if let Some(text) = answer.as_text()
        && let Some(failure) = check_pattern(question, spec, text)
    {
        return fail(failure, "Invalid format".into());
    }

    None
}

fn check_pattern(question: &Question, spec: &ValidationSpec, text: &str) -> Option<Rule> {
    let pattern = spec.pattern.as_deref().filter(|p| !p.is_empty())?;
    match pattern_matches(pattern, text) {
        Ok(true) => None,
        Ok(false) => Some(Rule::Pattern),
        Err(error) => {
            warn!(question = %question.id, %error, "skipping validation pattern");
            None
        }
    }
}

fn is_missing(question: &Question, answer: Option<&AnswerValue>) -> bool {
    match answer {
        None => true,
        Some(AnswerValue::Text(text)) => text.trim().is_empty(),
        Some(AnswerValue::Multi(values)) => values.is_empty(),
        Some(AnswerValue::File(_)) => false,
        Some(AnswerValue::PerPerson(choices)) => {
            if question.answer_type == AnswerType::RadioMultiPerson
                && !question.applies_to.is_empty()
            {
                question.applies_to.iter().any(|role| {
                    choices
                        .get(role)
                        .is_none_or(|choice| choice.trim().is_empty())
                })
            } else {
                choices.is_empty()
            }
        }
    }
}

/// Length as the browser counts it (UTF-16 units), or item count for lists.
fn answer_length(answer: &AnswerValue) -> Option<usize> {
    match answer {
        AnswerValue::Text(text) => Some(text.encode_utf16().count()),
        AnswerValue::Multi(values) => Some(values.len()),
        AnswerValue::File(_) | AnswerValue::PerPerson(_) => None,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn file_accepted(file: &FileDescriptor, accept: &str) -> bool {
    let name = file.name.to_lowercase();
    let mime = file.mime.as_deref().unwrap_or("").to_lowercase();
    let mut entries = accept
        .split(',')
        .map(|entry| entry.trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .peekable();
    if entries.peek().is_none() {
        return true;
    }
    entries.any(|entry| {
        if entry.starts_with('.') {
            name.ends_with(&entry)
        } else if let Some(family) = entry.strip_suffix("/*") {
            mime.split('/').next() == Some(family) && !mime.is_empty()
        } else {
            mime == entry
        }
    })
}

/// Runs [`validate_answer`] for every visible answerable question at every
/// live instance, sub-questions included.
pub fn validate_form(
    document: &Document,
    answers: &AnswerStore,
    instances: &InstanceTable,
) -> ValidationReport {
    let index = document.index();
    let mut report = ValidationReport::default();

    for (coords, question) in document.questions() {
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
            if let Some(message) = validate_answer(question, answers.field(&key)) {
                report.insert(key.to_string(), message);
            }
            for (position, sub_question) in question.sub_questions.iter().enumerate() {
                let sub_key = key.sub(position);
                if let Some(message) = validate_answer(sub_question, answers.get(&sub_key)) {
                    report.insert(sub_key, message);
                }
            }
        }
    }

    report
}
