//! Field answer predicate.
//!
//! Decides whether one question counts as answered under a given value map.
//! The result depends only on its inputs; the reveal boundary, the queue
//! validator and the highlight overlay all call into here.

use crate::schema::{CheckboxSpec, Question, SelectSpec};
use crate::values::{checkbox_key, FieldValueMap};

/// Is `question` answered under `values`?
///
/// `placeholder` is the select sentinel that does not count as a choice.
pub fn is_answered(question: &Question, values: &FieldValueMap, placeholder: &str) -> bool {
    if question.is_informational() {
        return true;
    }
    match (&question.radio, &question.checkbox, &question.select) {
        (Some(radio), None, None) => values.is_filled(&radio.name),
        (None, Some(checkbox), Some(select)) => {
            any_checked(checkbox, values) || all_selected(select, values, placeholder)
        }
        (None, Some(checkbox), None) => any_checked(checkbox, values),
        (None, None, Some(select)) => all_selected(select, values, placeholder),
        // Mixed groups: any constituent answer is enough.
        (radio, checkbox, select) => {
            radio.as_ref().is_some_and(|r| values.is_filled(&r.name))
                || checkbox.as_ref().is_some_and(|c| any_checked(c, values))
                || select.as_ref().is_some_and(|s| {
                    s.selects
                        .iter()
                        .any(|m| values.is_meaningful(&m.name, placeholder))
                })
        }
    }
}

/// Index of the first unanswered question, or `questions.len()` when all are
/// answered.
pub fn first_unanswered(questions: &[Question], values: &FieldValueMap, placeholder: &str) -> usize {
    questions
        .iter()
        .position(|q| !is_answered(q, values, placeholder))
        .unwrap_or(questions.len())
}

fn any_checked(checkbox: &CheckboxSpec, values: &FieldValueMap) -> bool {
    (0..checkbox.options.len()).any(|i| values.flag(&checkbox_key(&checkbox.name, i)))
        || values.is_filled(&checkbox.name)
}

fn all_selected(select: &SelectSpec, values: &FieldValueMap, placeholder: &str) -> bool {
    select
        .selects
        .iter()
        .all(|m| values.is_meaningful(&m.name, placeholder))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PH: &str = "please select";

    fn combo() -> Question {
        Question::new("combo")
            .checkbox("checkboxName", &["A", "B"])
            .select("x", &["1", "2"])
    }

    #[test]
    fn radio_needs_non_empty_string() {
        let q = Question::new("r").radio("radioA", &["yes", "no"]);
        let mut v = FieldValueMap::new();
        assert!(!is_answered(&q, &v, PH));
        v.set("radioA", "");
        assert!(!is_answered(&q, &v, PH));
        v.set("radioA", "yes");
        assert!(is_answered(&q, &v, PH));
    }

    #[test]
    fn combo_answered_via_checkbox_alone() {
        let mut v = FieldValueMap::new();
        v.set("checkboxName-0", true);
        assert!(is_answered(&combo(), &v, PH));
    }

    #[test]
    fn combo_answered_via_all_selects() {
        let mut v = FieldValueMap::new();
        v.set("checkboxName-0", false);
        assert!(!is_answered(&combo(), &v, PH));
        v.set("x", "2");
        assert!(is_answered(&combo(), &v, PH));
    }

    #[test]
    fn select_only_rejects_placeholder() {
        let q = Question::new("date")
            .select("x", &["1", "2"])
            .select("y", &["1", "2"]);
        let mut v = FieldValueMap::new();
        v.set("x", PH);
        v.set("y", "1");
        assert!(!is_answered(&q, &v, PH));
        v.set("x", "1");
        assert!(is_answered(&q, &v, PH));
    }

    #[test]
    fn checkbox_only_accepts_label_list() {
        let q = Question::new("c").checkbox("extras", &["A", "B"]);
        let mut v = FieldValueMap::new();
        assert!(!is_answered(&q, &v, PH));
        v.toggle_checkbox_label("extras", "B", true);
        assert!(is_answered(&q, &v, PH));
        v.toggle_checkbox_label("extras", "B", false);
        assert!(!is_answered(&q, &v, PH));
    }

    #[test]
    fn mixed_radio_and_select_is_disjunctive() {
        let q = Question::new("m")
            .radio("r", &["a"])
            .select("s1", &["1"])
            .select("s2", &["1"]);
        let mut v = FieldValueMap::new();
        assert!(!is_answered(&q, &v, PH));
        v.set("s2", "1");
        assert!(is_answered(&q, &v, PH));
        let mut w = FieldValueMap::new();
        w.set("r", "a");
        assert!(is_answered(&q, &w, PH));
    }

    #[test]
    fn informational_question_counts_as_answered() {
        assert!(is_answered(&Question::new("notice"), &FieldValueMap::new(), PH));
    }

    #[test]
    fn first_unanswered_falls_back_to_len() {
        let qs = vec![
            Question::new("a").radio("a", &["1"]),
            Question::new("b").radio("b", &["1"]),
        ];
        let mut v = FieldValueMap::new();
        assert_eq!(first_unanswered(&qs, &v, PH), 0);
        v.set("a", "1");
        assert_eq!(first_unanswered(&qs, &v, PH), 1);
        v.set("b", "1");
        assert_eq!(first_unanswered(&qs, &v, PH), 2);
    }
}
