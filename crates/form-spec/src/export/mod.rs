//! Static, self-contained HTML clone of a document.
//!
//! The body is produced by [`html`], the surrounding page by a handlebars
//! shell whose escape function is [`escape_html`]. The embedded script
//! re-implements visibility, validation, instance management and the
//! indexed submission without any framework.

mod html;

use std::path::Path;

use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::spec::Document;

pub use html::INSTANCE_PLACEHOLDER;

const SHELL: &str = include_str!("assets/shell.hbs");
const STYLE: &str = include_str!("assets/form.css");
const RUNTIME: &str = include_str!("assets/runtime.js");

/// How faithfully dynamically added instances reproduce their group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceFidelity {
    /// New instances render every question as a plain text input.
    #[default]
    GenericText,
    /// New instances are cloned from a `<template>` rendered with the same
    /// question renderer as the first instance.
    Template,
}

impl InstanceFidelity {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceFidelity::GenericText => "generic_text",
            InstanceFidelity::Template => "template",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    pub fidelity: InstanceFidelity,
    /// Page title; defaults to the document's source name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticExport {
    pub file_name: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("document has no pages")]
    EmptyDocument,
    #[error("invalid page template: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("failed to render page: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Escapes `& < > " '` for text and attribute positions.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders `document` into a single HTML file.
///
/// Pure: the same document and options always produce the same bytes.
pub fn export_document(
    document: &Document,
    options: &ExportOptions,
) -> Result<StaticExport, ExportError> {
    if !document.is_usable() {
        return Err(ExportError::EmptyDocument);
    }

    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(escape_html);
    handlebars.register_template_string("shell", SHELL)?;

    let title = options
        .title
        .clone()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| document.source_name.clone());
    let body = html::render_body(document, options.fidelity);
    let data = json!({
        "title": title,
        "source": document.source_name,
        "totalPages": document.pages.len(),
        "fidelity": options.fidelity.as_str(),
        "style": STYLE,
        "body": body,
        "script": RUNTIME,
    });
    let html = handlebars.render("shell", &data)?;
    let file_name = export_file_name(&document.source_name);

    debug!(
        file = %file_name,
        bytes = html.len(),
        fidelity = options.fidelity.as_str(),
        "exported static form"
    );
    Ok(StaticExport { file_name, html })
}

/// Sanitized stem of the source name plus `-form.html`.
pub fn export_file_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut sanitized = String::with_capacity(stem.len());
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            sanitized.push(ch);
        } else if !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let sanitized = sanitized.trim_matches('-');
    if sanitized.is_empty() {
        "form-form.html".to_string()
    } else {
        format!("{}-form.html", sanitized)
    }
}
