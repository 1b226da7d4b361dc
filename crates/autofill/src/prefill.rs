//! Bulk autofill payloads.
//!
//! An extraction source answers with question-shaped records that carry
//! pre-filled values. [`flatten`] turns them into a seed map plus the queue
//! entries the processor plays back, tagging each entry with the question that
//! owns its key in the current schema.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::queue::QueueEntry;
use crate::schema::Schema;
use crate::values::{checkbox_key, FieldValue, FieldValueMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefillRadio {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefillSelectMember {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl PrefillSelectMember {
    /// Field key: `name`, falling back to `id`.
    pub fn key(&self) -> Option<&str> {
        self.name.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefillSelect {
    #[serde(default)]
    pub selects: Vec<PrefillSelectMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefillCheckbox {
    pub name: String,
    /// Raw value stored under `name` as-is.
    #[serde(default)]
    pub value: Option<FieldValue>,
    /// Selected option labels; mapped to indexed flags through the schema.
    #[serde(default)]
    pub values: Vec<String>,
}

/// One question-shaped record of the extraction result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefillRecord {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio: Option<PrefillRadio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<PrefillSelect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkbox: Option<PrefillCheckbox>,
}

/// Flattened extraction result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prefill {
    pub seed: FieldValueMap,
    pub entries: Vec<QueueEntry>,
}

impl Prefill {
    pub fn is_empty(&self) -> bool {
        self.seed.is_empty()
    }

    /// Prefill built straight from a value map (e.g. a stored record).
    pub fn from_values(schema: &Schema, values: FieldValueMap, placeholder: &str) -> Self {
        let mut prefill = Prefill::default();
        for (key, value) in values.iter() {
            prefill.push(schema, key, value.clone(), placeholder);
        }
        prefill
    }

    fn push(&mut self, schema: &Schema, key: &str, value: FieldValue, placeholder: &str) {
        if !value.is_meaningful(placeholder) {
            return;
        }
        match schema.owner_of(key) {
            Some(question) => self.entries.push(QueueEntry::new(key, value.clone(), question)),
            None => debug!(key, "prefill key has no owning question; seeded only"),
        }
        self.seed.set(key, value);
    }
}

/// Flatten extraction records against `schema`.
///
/// Empty and placeholder values are dropped. Keys without an owning question
/// are kept in the seed but never queued.
pub fn flatten(schema: &Schema, records: &[PrefillRecord], placeholder: &str) -> Prefill {
    let mut prefill = Prefill::default();
    for record in records {
        if let Some(radio) = &record.radio {
            if let Some(value) = &radio.value {
                prefill.push(schema, &radio.name, value.as_str().into(), placeholder);
            }
        }
        if let Some(select) = &record.select {
            for member in &select.selects {
                if let (Some(key), Some(value)) = (member.key(), &member.value) {
                    prefill.push(schema, key, value.as_str().into(), placeholder);
                }
            }
        }
        if let Some(checkbox) = &record.checkbox {
            if let Some(value) = &checkbox.value {
                prefill.push(schema, &checkbox.name, value.clone(), placeholder);
            }
            if !checkbox.values.is_empty() {
                flatten_checkbox_labels(schema, checkbox, &mut prefill, placeholder);
            }
        }
    }
    prefill
}

fn flatten_checkbox_labels(
    schema: &Schema,
    checkbox: &PrefillCheckbox,
    prefill: &mut Prefill,
    placeholder: &str,
) {
    let options = schema
        .owner_of(&checkbox.name)
        .and_then(|q| schema.get(q))
        .and_then(|q| q.checkbox.as_ref())
        .map(|spec| spec.options.clone())
        .unwrap_or_default();
    for label in &checkbox.values {
        match options.iter().position(|o| o == label) {
            Some(index) => {
                prefill.push(schema, &checkbox_key(&checkbox.name, index), true.into(), placeholder)
            }
            None => debug!(name = %checkbox.name, label = %label, "unknown checkbox label in prefill"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Question;
    use pretty_assertions::assert_eq;

    const PH: &str = "please select";

    fn schema() -> Schema {
        Schema::new(vec![
            Question::new("insurer").radio("insurer", &["A", "B"]),
            Question::new("expiry").select("exp-y", &["2025"]).select("exp-m", &["4"]),
            Question::new("extras").checkbox("extras", &["glass", "towing"]),
        ])
    }

    #[test]
    fn flattens_every_group_kind() {
        let records: Vec<PrefillRecord> = serde_json::from_str(
            r#"[
              {"question":"insurer","radio":{"name":"insurer","value":"B"}},
              {"select":{"selects":[{"id":"exp-y","value":"2025"},{"name":"exp-m","value":"4"}]}},
              {"checkbox":{"name":"extras","values":["towing"]}}
            ]"#,
        )
        .unwrap();
        let prefill = flatten(&schema(), &records, PH);
        assert_eq!(
            prefill.entries,
            vec![
                QueueEntry::new("insurer", "B", 0),
                QueueEntry::new("exp-y", "2025", 1),
                QueueEntry::new("exp-m", "4", 1),
                QueueEntry::new("extras-1", true, 2),
            ]
        );
        assert_eq!(prefill.seed.len(), 4);
    }

    #[test]
    fn placeholder_and_unowned_values() {
        let records = vec![
            PrefillRecord {
                select: Some(PrefillSelect {
                    selects: vec![PrefillSelectMember {
                        id: None,
                        name: Some("exp-y".into()),
                        value: Some(PH.into()),
                    }],
                }),
                ..Default::default()
            },
            PrefillRecord {
                radio: Some(PrefillRadio {
                    name: "ghost".into(),
                    value: Some("x".into()),
                }),
                ..Default::default()
            },
        ];
        let prefill = flatten(&schema(), &records, PH);
        assert!(prefill.entries.is_empty());
        assert_eq!(prefill.seed.text("ghost"), Some("x"));
        assert_eq!(prefill.seed.get("exp-y"), None);
    }

    #[test]
    fn stored_record_becomes_prefill() {
        let mut stored = FieldValueMap::new();
        stored.set("insurer", "A");
        stored.set("exp-m", PH);
        stored.set("notes", "free text");
        let prefill = Prefill::from_values(&schema(), stored, PH);
        assert_eq!(prefill.entries, vec![QueueEntry::new("insurer", "A", 0)]);
        assert_eq!(prefill.seed.len(), 2);
        assert!(!prefill.is_empty());
    }
}
