//! Line-oriented preview shell driven from stdin.

use std::io::{BufRead, Write};

use form_spec::{AnswerValue, PreviewSession, parse_field_key, parse_group_key};

use crate::CliResult;

const HELP: &str = "\
commands:
  show                     list visible questions with their answers
  set <key> <value>        answer a question (JSON arrays/objects accepted)
  clear <key>              remove an answer
  add <group>              add an instance to a repeatable group
  remove <group> <index>   remove an instance
  validate                 run validation
  submit                   print the submission
  reset                    clear every answer
  quit                     leave the preview";

/// Runs commands until `quit` or end of input.
pub fn run<R: BufRead, W: Write>(
    session: &mut PreviewSession,
    input: R,
    output: &mut W,
) -> CliResult<()> {
    writeln!(
        output,
        "Previewing '{}'. Type 'help' for commands.",
        session.document().source_name
    )?;
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (command, rest) = trimmed
            .split_once(char::is_whitespace)
            .map(|(command, rest)| (command, rest.trim()))
            .unwrap_or((trimmed, ""));

        match command {
            "quit" | "exit" => break,
            "help" => writeln!(output, "{}", HELP)?,
            "show" => show(session, output)?,
            "set" => match rest.split_once(char::is_whitespace) {
                Some((key, value)) => match parse_field_key_prefix(key) {
                    Ok(()) => {
                        session.set_answer(key, parse_value(value.trim()));
                        writeln!(output, "ok")?;
                    }
                    Err(message) => writeln!(output, "error: {}", message)?,
                },
                None => writeln!(output, "error: usage: set <key> <value>")?,
            },
            "clear" => {
                let removed = session.clear_answer(rest).is_some();
                writeln!(output, "{}", if removed { "cleared" } else { "no answer" })?;
            }
            "add" => match parse_group_key(rest) {
                Ok(group) => match session.add_instance(&group) {
                    Ok(count) => writeln!(output, "{} now has {} instances", group, count)?,
                    Err(error) => writeln!(output, "error: {}", error)?,
                },
                Err(error) => writeln!(output, "error: {}", error)?,
            },
            "remove" => {
                let mut parts = rest.split_whitespace();
                let group = parts.next().map(parse_group_key);
                let index = parts.next().and_then(|raw| raw.parse::<usize>().ok());
                match (group, index) {
                    (Some(Ok(group)), Some(index)) => match session.remove_instance(&group, index) {
                        Ok(true) => writeln!(output, "removed instance {} of {}", index, group)?,
                        Ok(false) => writeln!(output, "nothing removed")?,
                        Err(error) => writeln!(output, "error: {}", error)?,
                    },
                    (Some(Err(error)), _) => writeln!(output, "error: {}", error)?,
                    _ => writeln!(output, "error: usage: remove <group> <index>")?,
                }
            }
            "validate" => {
                let report = session.validate();
                if report.is_valid() {
                    writeln!(output, "valid")?;
                } else {
                    for (key, message) in report.iter() {
                        writeln!(output, "  {} - {}", key, message)?;
                    }
                    writeln!(output, "{} error(s)", report.len())?;
                }
            }
            "submit" => {
                let submission = serde_json::to_string_pretty(&session.submission())?;
                writeln!(output, "{}", submission)?;
            }
            "reset" => {
                session.reset();
                writeln!(output, "reset")?;
            }
            other => writeln!(output, "unknown command '{}', try 'help'", other)?,
        }
    }
    Ok(())
}

fn show<W: Write>(session: &PreviewSession, output: &mut W) -> CliResult<()> {
    let visibility = session.visibility();
    let document = session.document();
    for (key, visible) in &visibility {
        if !visible {
            continue;
        }
        let Some(question) = document.question(&key.coords()) else {
            continue;
        };
        let answer = session
            .answers()
            .field(key)
            .map(|answer| answer.to_json().to_string())
            .unwrap_or_else(|| "-".into());
        let marker = if question.required { "*" } else { "" };
        writeln!(
            output,
            "{} [{}] {}{} = {}",
            key, question.answer_type, question.text, marker, answer
        )?;
    }
    Ok(())
}

/// Answers live under field keys or their `_sub`/`_opt` extensions.
fn parse_field_key_prefix(key: &str) -> Result<(), String> {
    match form_spec::address::split_field_key(key) {
        Some((_, rest)) if rest.is_empty() => Ok(()),
        Some((_, rest)) if is_extension(rest) => Ok(()),
        _ => parse_field_key(key).map(|_| ()).map_err(|error| error.to_string()),
    }
}

fn is_extension(rest: &str) -> bool {
    ["_sub", "_opt"].iter().any(|prefix| {
        rest.strip_prefix(prefix)
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
    })
}

fn parse_value(raw: &str) -> AnswerValue {
    if (raw.starts_with('[') || raw.starts_with('{'))
        && let Ok(value) = serde_json::from_str::<AnswerValue>(raw)
    {
        return value;
    }
    AnswerValue::text(raw)
}
