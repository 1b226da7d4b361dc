//! Declarative step schema: the ordered list of questions shown by one
//! wizard step.
//!
//! A [`Question`] carries up to three input groups (radio, checkbox, select).
//! A question with a checkbox and selects is a "combo" question; the answer
//! predicate in [`crate::answer`] decides how the groups combine.
//!
//! [`Schema`] wraps the question list and keeps an index from every field key
//! to its owning question, used by the prefill flattener and the reconciler.
//! It is immutable for the lifetime of a mounted step.
//!
//! JSON shape (matches the external schema source):
//! ```json
//! [
//!   { "question": "Previous insurer?", "radio": { "name": "insurer", "options": ["A", "B"] } },
//!   { "question": "Expiry date", "select": { "selects": [
//!       { "name": "exp-y", "options": ["2024", "2025"] },
//!       { "name": "exp-m", "options": ["1", "2"] } ] } }
//! ]
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::values::checkbox_key;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioSpec {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckboxSpec {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl CheckboxSpec {
    /// Indexed flag keys, one per option.
    pub fn option_keys(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.options.len()).map(move |i| checkbox_key(&self.name, i))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectMember {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectSpec {
    pub selects: Vec<SelectMember>,
}

/// One logical prompt of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default, alias = "radioGroup", skip_serializing_if = "Option::is_none")]
    pub radio: Option<RadioSpec>,
    #[serde(default, alias = "checkboxGroup", skip_serializing_if = "Option::is_none")]
    pub checkbox: Option<CheckboxSpec>,
    #[serde(default, alias = "selectGroup", skip_serializing_if = "Option::is_none")]
    pub select: Option<SelectSpec>,
}

impl Question {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            radio: None,
            checkbox: None,
            select: None,
        }
    }

    pub fn radio(mut self, name: impl Into<String>, options: &[&str]) -> Self {
        self.radio = Some(RadioSpec {
            name: name.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        });
        self
    }

    pub fn checkbox(mut self, name: impl Into<String>, options: &[&str]) -> Self {
        self.checkbox = Some(CheckboxSpec {
            name: name.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        });
        self
    }

    /// Append one member select (creating the select group if needed).
    pub fn select(mut self, name: impl Into<String>, options: &[&str]) -> Self {
        let member = SelectMember {
            name: name.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        };
        match self.select.as_mut() {
            Some(group) => group.selects.push(member),
            None => {
                self.select = Some(SelectSpec {
                    selects: vec![member],
                })
            }
        }
        self
    }

    /// Every field key this question owns: radio name, checkbox group name
    /// plus its indexed option keys, and the select member names.
    pub fn field_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(radio) = &self.radio {
            keys.push(radio.name.clone());
        }
        if let Some(checkbox) = &self.checkbox {
            keys.push(checkbox.name.clone());
            keys.extend(checkbox.option_keys());
        }
        if let Some(select) = &self.select {
            keys.extend(select.selects.iter().map(|s| s.name.clone()));
        }
        keys
    }

    /// True when the question has no input group at all (pure label).
    pub fn is_informational(&self) -> bool {
        self.radio.is_none() && self.checkbox.is_none() && self.select.is_none()
    }
}

/// Ordered, immutable question list of one step.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    questions: Vec<Question>,
    owners: HashMap<String, usize>,
}

impl Schema {
    pub fn new(questions: Vec<Question>) -> Self {
        let mut owners = HashMap::new();
        for (index, question) in questions.iter().enumerate() {
            for key in question.field_keys() {
                // First owner wins when two questions share a key.
                owners.entry(key).or_insert(index);
            }
        }
        Self { questions, owners }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Index of the question owning `key`, if any.
    pub fn owner_of(&self, key: &str) -> Option<usize> {
        self.owners.get(key).copied()
    }
}

impl From<Vec<Question>> for Schema {
    fn from(questions: Vec<Question>) -> Self {
        Schema::new(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn owners_cover_every_constituent_key() {
        let schema = Schema::new(vec![
            Question::new("q0").radio("r", &["yes", "no"]),
            Question::new("q1")
                .checkbox("c", &["A", "B"])
                .select("x", &["1", "2"]),
        ]);
        assert_eq!(schema.owner_of("r"), Some(0));
        assert_eq!(schema.owner_of("c"), Some(1));
        assert_eq!(schema.owner_of("c-1"), Some(1));
        assert_eq!(schema.owner_of("x"), Some(1));
        assert_eq!(schema.owner_of("unknown"), None);
    }

    #[test]
    fn first_owner_wins_for_shared_keys() {
        let schema = Schema::new(vec![
            Question::new("a").radio("shared", &["1"]),
            Question::new("b").radio("shared", &["1"]),
        ]);
        assert_eq!(schema.owner_of("shared"), Some(0));
    }

    #[test]
    fn deserializes_group_aliases() {
        let q: Question = serde_json::from_str(
            r#"{"question":"q","radioGroup":{"name":"r","options":["a"]},
                "selectGroup":{"selects":[{"name":"s","options":[]}]}}"#,
        )
        .unwrap();
        assert_eq!(q.radio.as_ref().map(|r| r.name.as_str()), Some("r"));
        assert_eq!(q.field_keys(), vec!["r".to_string(), "s".to_string()]);
    }
}
