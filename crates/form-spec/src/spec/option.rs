use std::borrow::Cow;

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// Canonical choice option used by dropdown, radio and checkbox questions.
///
/// Extracted documents describe options either as a bare label or as an
/// object; both shapes are normalised here so downstream code never looks at
/// the raw shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOption", rename_all = "camelCase")]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub requires_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

impl ChoiceOption {
    /// Option whose value and label are the same text.
    pub fn plain(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            value: label.clone(),
            label,
            requires_input: false,
            input_type: None,
        }
    }

    pub fn with_input(mut self, input_type: impl Into<String>) -> Self {
        self.requires_input = true;
        self.input_type = Some(input_type.into());
        self
    }
}

/// Wire shape accepted from extraction output.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
enum RawOption {
    Label(String),
    #[serde(rename_all = "camelCase")]
    Detailed {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        requires_input: bool,
        #[serde(default)]
        input_type: Option<String>,
    },
}

impl TryFrom<RawOption> for ChoiceOption {
    type Error = String;

    fn try_from(raw: RawOption) -> Result<Self, Self::Error> {
        match raw {
            RawOption::Label(label) => Ok(ChoiceOption::plain(label)),
            RawOption::Detailed {
                value,
                label,
                requires_input,
                input_type,
            } => {
                let (value, label) = match (value, label) {
                    (Some(value), Some(label)) => (value, label),
                    (Some(value), None) => (value.clone(), value),
                    (None, Some(label)) => (label.clone(), label),
                    (None, None) => {
                        return Err("option requires a value or a label".to_string());
                    }
                };
                Ok(ChoiceOption {
                    value,
                    label,
                    requires_input,
                    input_type: input_type.filter(|kind| !kind.trim().is_empty()),
                })
            }
        }
    }
}

impl JsonSchema for ChoiceOption {
    fn schema_name() -> Cow<'static, str> {
        "ChoiceOption".into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        RawOption::json_schema(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_label_becomes_value_and_label() {
        let option: ChoiceOption = serde_json::from_value(json!("Yes")).expect("option");
        assert_eq!(option, ChoiceOption::plain("Yes"));
    }

    #[test]
    fn missing_label_falls_back_to_value() {
        let option: ChoiceOption =
            serde_json::from_value(json!({ "value": "other", "requiresInput": true }))
                .expect("option");
        assert_eq!(option.label, "other");
        assert!(option.requires_input);
    }

    #[test]
    fn missing_value_falls_back_to_label() {
        let option: ChoiceOption =
            serde_json::from_value(json!({ "label": "Married" })).expect("option");
        assert_eq!(option.value, "Married");
    }

    #[test]
    fn empty_object_is_rejected() {
        let result = serde_json::from_value::<ChoiceOption>(json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn serializes_canonical_shape() {
        let value = serde_json::to_value(ChoiceOption::plain("a").with_input("text")).expect("json");
        assert_eq!(
            value,
            json!({ "value": "a", "label": "a", "requiresInput": true, "inputType": "text" })
        );
    }
}
