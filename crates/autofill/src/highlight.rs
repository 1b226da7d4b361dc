//! Highlight overlay: the keys still waiting for manual input once an
//! autofill pass is complete. Presentation only.

use std::collections::BTreeSet;

use crate::answer::is_answered;
use crate::schema::Schema;
use crate::values::FieldValueMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightOverlay {
    keys: BTreeSet<String>,
}

impl HighlightOverlay {
    /// Rebuild the set from every unanswered question of `schema`.
    pub fn recompute(&mut self, schema: &Schema, values: &FieldValueMap, placeholder: &str) {
        self.keys = schema
            .questions()
            .iter()
            .filter(|q| !is_answered(q, values, placeholder))
            .flat_map(|q| q.field_keys())
            .collect();
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Question;

    #[test]
    fn unanswered_questions_contribute_all_keys() {
        let schema = Schema::new(vec![
            Question::new("a").radio("r", &["1"]),
            Question::new("b").checkbox("c", &["A", "B"]).select("s", &["1"]),
        ]);
        let values: FieldValueMap = [("r", "1")].into_iter().collect();
        let mut overlay = HighlightOverlay::default();
        overlay.recompute(&schema, &values, "please select");
        let keys: Vec<&str> = overlay.keys().iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["c", "c-0", "c-1", "s"]);
        assert!(!overlay.contains("r"));
        overlay.clear();
        assert!(overlay.is_empty());
    }
}
