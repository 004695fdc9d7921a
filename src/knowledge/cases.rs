//! Test cases and acquisition scenarios carried by a dataset.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{json_type_name, normalize_tokens};

/// The diagnosis a test case accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expected {
    Label(String),
    AnyOf(Vec<String>),
}

impl Expected {
    /// Whether `label` satisfies this expectation. Comparison ignores
    /// surrounding whitespace.
    pub fn accepts(&self, label: &str) -> bool {
        let label = label.trim();
        match self {
            Self::Label(expected) => expected.trim() == label,
            Self::AnyOf(options) => options.iter().any(|o| o.trim() == label),
        }
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(label) => f.write_str(label),
            Self::AnyOf(options) => f.write_str(&options.join(" | ")),
        }
    }
}

/// A symptom set with the diagnosis it should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub symptoms: Vec<String>,
    pub expected: Expected,
}

impl TestCase {
    pub fn new<I, S>(id: impl Into<String>, symptoms: I, expected: Expected) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: id.into(),
            symptoms: normalize_tokens(symptoms),
            expected,
        }
    }

    /// Read a test case. Symptoms may be a list of tokens or a mapping of
    /// token to presence, where only `false` means absent.
    pub(crate) fn from_value(index: usize, value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("test_cases[{index}] is not an object, skipped"))?;

        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("test_cases[{index}] has no id, skipped"))?
            .to_string();

        let symptoms = match obj.get("symptoms") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => normalize_tokens(items.iter().filter_map(Value::as_str)),
            Some(Value::Object(map)) => normalize_tokens(
                map.iter()
                    .filter(|(_, present)| !matches!(present, Value::Bool(false)))
                    .map(|(token, _)| token.as_str()),
            ),
            Some(other) => {
                return Err(format!(
                    "test case '{id}': symptoms must be a list or a mapping, found {}, skipped",
                    json_type_name(other)
                ));
            }
        };

        let expected = match obj.get("expected") {
            Some(Value::String(label)) if !label.trim().is_empty() => {
                Expected::Label(label.trim().to_string())
            }
            Some(Value::Array(items)) => {
                let options = normalize_tokens(items.iter().filter_map(Value::as_str));
                if options.is_empty() {
                    return Err(format!("test case '{id}' has an empty expected list, skipped"));
                }
                Expected::AnyOf(options)
            }
            _ => return Err(format!("test case '{id}' has no expected diagnosis, skipped")),
        };

        Ok(Self {
            id,
            symptoms,
            expected,
        })
    }
}

/// A scripted knowledge-acquisition interview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub context: String,
    pub suggested_questions: Vec<String>,
    pub base_answer: String,
    /// Keyword to extra answer text, in document order.
    pub keyword_answers: Vec<(String, String)>,
    /// Rule id the interview is meant to elicit.
    pub extracted_rule: Option<String>,
}

impl Scenario {
    /// Read a scenario. Entries without an id get a positional one
    /// (`SCN_01`, `SCN_02`, ...).
    pub(crate) fn from_value(index: usize, value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("acquisition_scenarios[{index}] is not an object, skipped"))?;

        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let id = match text("id") {
            id if id.is_empty() => format!("SCN_{:02}", index + 1),
            id => id,
        };

        let suggested_questions = obj
            .get("suggested_questions")
            .and_then(Value::as_array)
            .map(|items| normalize_tokens(items.iter().filter_map(Value::as_str)))
            .unwrap_or_default();

        let keyword_answers = obj
            .get("keyword_answers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(keyword, answer)| {
                        let keyword = keyword.trim();
                        let answer = answer.as_str()?.trim();
                        (!keyword.is_empty() && !answer.is_empty())
                            .then(|| (keyword.to_string(), answer.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let extracted_rule = Some(text("extracted_rule")).filter(|s| !s.is_empty());

        Ok(Self {
            context: text("context"),
            base_answer: text("base_answer"),
            id,
            suggested_questions,
            keyword_answers,
            extracted_rule,
        })
    }
}
