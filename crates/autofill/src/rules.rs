//! Conditional rule engine.
//!
//! A static table of `(trigger field, trigger value) -> (target field,
//! visible)` rules. Every write is run through [`RuleTable::apply`] and the
//! resulting patch is merged into [`VisibilityOverrides`], which the
//! presentation layer consults when rendering.
//!
//! Rules are one hop: a target becoming visible does not fire rules of its own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::values::FieldValue;

/// How a rule compares the written value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueMatch {
    Is(FieldValue),
    IsNot(FieldValue),
}

impl ValueMatch {
    fn matches(&self, value: &FieldValue) -> bool {
        match self {
            ValueMatch::Is(expected) => expected == value,
            ValueMatch::IsNot(expected) => expected != value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub trigger: String,
    pub when: ValueMatch,
    pub target: String,
    pub visible: bool,
}

impl ConditionalRule {
    pub fn new(
        trigger: impl Into<String>,
        when: ValueMatch,
        target: impl Into<String>,
        visible: bool,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            when,
            target: target.into(),
            visible,
        }
    }
}

/// Visibility patch produced by one write.
pub type RulePatch = BTreeMap<String, bool>;

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<ConditionalRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<ConditionalRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule triggered by `field`. Later rules win when two
    /// rules target the same field.
    pub fn apply(&self, field: &str, value: &FieldValue) -> RulePatch {
        let mut patch = RulePatch::new();
        for rule in self.rules.iter().filter(|r| r.trigger == field) {
            if rule.when.matches(value) {
                trace!(trigger = field, rule_target = %rule.target, visible = rule.visible, "rule fired");
                patch.insert(rule.target.clone(), rule.visible);
            }
        }
        patch
    }
}

/// Accumulated visibility overrides, keyed by target field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VisibilityOverrides {
    fields: BTreeMap<String, bool>,
}

impl VisibilityOverrides {
    pub fn merge(&mut self, patch: RulePatch) {
        self.fields.extend(patch);
    }

    /// Override for `field`, if any rule has touched it.
    pub fn get(&self, field: &str) -> Option<bool> {
        self.fields.get(field).copied()
    }

    /// Whether `field` should render; untouched fields are shown.
    pub fn is_shown(&self, field: &str) -> bool {
        self.get(field).unwrap_or(true)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accident_rules() -> RuleTable {
        let none = FieldValue::from("no accident");
        RuleTable::new(vec![
            ConditionalRule::new("accident", ValueMatch::IsNot(none.clone()), "accident-type", true),
            ConditionalRule::new("accident", ValueMatch::Is(none), "accident-type", false),
        ])
    }

    #[test]
    fn not_equal_rule_reveals_target() {
        let patch = accident_rules().apply("accident", &FieldValue::from("one"));
        assert_eq!(patch.get("accident-type"), Some(&true));
    }

    #[test]
    fn equal_rule_hides_target() {
        let mut overrides = VisibilityOverrides::default();
        overrides.merge(accident_rules().apply("accident", &FieldValue::from("one")));
        overrides.merge(accident_rules().apply("accident", &FieldValue::from("no accident")));
        assert!(!overrides.is_shown("accident-type"));
        assert!(overrides.is_shown("untouched"));
    }

    #[test]
    fn rules_do_not_cascade() {
        let table = RuleTable::new(vec![
            ConditionalRule::new("a", ValueMatch::Is("x".into()), "b", true),
            ConditionalRule::new("b", ValueMatch::IsNot("".into()), "c", true),
        ]);
        let patch = table.apply("a", &"x".into());
        assert_eq!(patch.len(), 1);
        assert!(patch.contains_key("b"));
    }

    #[test]
    fn unrelated_field_yields_empty_patch() {
        assert!(accident_rules().apply("other", &"one".into()).is_empty());
    }
}
