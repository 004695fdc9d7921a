//! Diagnostic rules: a set of required symptom tokens mapped to a conclusion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{json_type_name, normalize_tokens};

/// A single diagnostic rule.
///
/// `conditions` is kept in declaration order with blanks removed and
/// duplicates collapsed, so its length is the rule's specificity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub conditions: Vec<String>,
    pub conclusion: String,
    /// Confidence in [0, 1].
    pub certainty: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<String>,
    #[serde(default)]
    pub required_repairs: Vec<String>,
    #[serde(default)]
    pub client_explanation: String,
    #[serde(default)]
    pub technical_explanation: String,
}

impl Rule {
    /// Create a rule with the given conditions. Certainty is clamped to [0, 1].
    pub fn new<I, S>(
        id: impl Into<String>,
        conditions: I,
        conclusion: impl Into<String>,
        certainty: f32,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: id.into(),
            name: None,
            conditions: normalize_tokens(conditions),
            conclusion: conclusion.into(),
            certainty: certainty.clamp(0.0, 1.0),
            failure_type: None,
            required_repairs: Vec::new(),
            client_explanation: String::new(),
            technical_explanation: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_failure_type(mut self, failure_type: impl Into<String>) -> Self {
        self.failure_type = Some(failure_type.into());
        self
    }

    pub fn with_repairs<I, S>(mut self, repairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_repairs = repairs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_explanations(
        mut self,
        client: impl Into<String>,
        technical: impl Into<String>,
    ) -> Self {
        self.client_explanation = client.into();
        self.technical_explanation = technical.into();
        self
    }

    /// Only rules with at least one condition can ever match.
    pub fn is_eligible(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Number of distinct conditions.
    pub fn specificity(&self) -> usize {
        self.conditions.len()
    }

    /// `id (name)` when the rule is named, otherwise just the id.
    pub fn label(&self) -> String {
        rule_label(&self.id, self.name.as_deref())
    }

    /// Read a rule from its dataset representation.
    ///
    /// Returns a description of the problem when the entry is malformed; the
    /// loader records it and skips the entry.
    pub(crate) fn from_value(index: usize, value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("rules[{index}] is not an object, skipped"))?;

        let id = non_empty_str(obj, "id")
            .ok_or_else(|| format!("rules[{index}] has no id, skipped"))?
            .to_string();

        let conditions = match obj.get("conditions") {
            Some(Value::Array(items)) => {
                let mut tokens = Vec::with_capacity(items.len());
                for item in items {
                    let token = item.as_str().ok_or_else(|| {
                        format!("rule '{id}': conditions must be strings, skipped")
                    })?;
                    tokens.push(token);
                }
                normalize_tokens(tokens)
            }
            Some(other) => {
                return Err(format!(
                    "rule '{id}': conditions must be a list, found {}, skipped",
                    json_type_name(other)
                ));
            }
            None => return Err(format!("rule '{id}' has no conditions list, skipped")),
        };

        let conclusion = non_empty_str(obj, "conclusion")
            .ok_or_else(|| format!("rule '{id}' has no conclusion, skipped"))?
            .to_string();

        let certainty = match obj.get("certainty") {
            None | Some(Value::Null) => 0.0,
            Some(value) => value
                .as_f64()
                .filter(|c| (0.0..=1.0).contains(c))
                .ok_or_else(|| {
                    format!("rule '{id}': certainty must be a number in [0, 1], skipped")
                })? as f32,
        };

        let required_repairs = match obj.get("required_repairs") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                normalize_tokens(items.iter().filter_map(Value::as_str))
            }
            Some(other) => {
                return Err(format!(
                    "rule '{id}': required_repairs must be a list, found {}, skipped",
                    json_type_name(other)
                ));
            }
        };

        Ok(Self {
            name: non_empty_str(obj, "name").map(String::from),
            failure_type: non_empty_str(obj, "failure_type").map(String::from),
            client_explanation: text(obj, "client_explanation"),
            technical_explanation: text(obj, "technical_explanation"),
            id,
            conditions,
            conclusion,
            certainty,
            required_repairs,
        })
    }
}

/// Format a rule reference as `id (name)`, or just `id`.
pub(crate) fn rule_label(id: &str, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("{id} ({name})"),
        _ => id.to_string(),
    }
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn text(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}
