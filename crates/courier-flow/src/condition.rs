// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Condition evaluation over session variables.

use std::collections::HashMap;

use regex::RegexBuilder;

use crate::model::{Condition, ConditionOp};

/// Evaluate a condition against the current variable bindings.
///
/// String comparisons are case-insensitive. A missing variable fails every
/// operator, and a malformed regex evaluates to false instead of erroring.
pub fn evaluate(condition: &Condition, variables: &HashMap<String, String>) -> bool {
    let bound = variables.get(&condition.variable);
    if condition.op == ConditionOp::Exists {
        return bound.is_some_and(|v| !v.is_empty());
    }
    let Some(actual) = bound else {
        return false;
    };
    let expected = condition.value.as_deref().unwrap_or("");

    match condition.op {
        ConditionOp::Equals => actual.eq_ignore_ascii_case(expected),
        ConditionOp::Contains => actual.to_lowercase().contains(&expected.to_lowercase()),
        ConditionOp::StartsWith => actual.to_lowercase().starts_with(&expected.to_lowercase()),
        ConditionOp::EndsWith => actual.to_lowercase().ends_with(&expected.to_lowercase()),
        ConditionOp::Regex => match RegexBuilder::new(expected).case_insensitive(true).build() {
            Ok(re) => re.is_match(actual),
            Err(_) => false,
        },
        ConditionOp::Exists => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn cond(variable: &str, op: ConditionOp, value: Option<&str>) -> Condition {
        Condition {
            variable: variable.to_string(),
            op,
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn comparisons_ignore_case() {
        let v = vars(&[("answer", "YES")]);
        assert!(evaluate(&cond("answer", ConditionOp::Equals, Some("yes")), &v));
        assert!(evaluate(&cond("answer", ConditionOp::Contains, Some("es")), &v));
        assert!(evaluate(&cond("answer", ConditionOp::StartsWith, Some("y")), &v));
        assert!(evaluate(&cond("answer", ConditionOp::EndsWith, Some("s")), &v));
        assert!(!evaluate(&cond("answer", ConditionOp::Equals, Some("no")), &v));
    }

    #[test]
    fn missing_variable_fails_everything() {
        let v = HashMap::new();
        assert!(!evaluate(&cond("x", ConditionOp::Equals, Some("")), &v));
        assert!(!evaluate(&cond("x", ConditionOp::Exists, None), &v));
        assert!(!evaluate(&cond("x", ConditionOp::Regex, Some(".*")), &v));
    }

    #[test]
    fn exists_requires_non_empty() {
        assert!(evaluate(&cond("x", ConditionOp::Exists, None), &vars(&[("x", "1")])));
        assert!(!evaluate(&cond("x", ConditionOp::Exists, None), &vars(&[("x", "")])));
    }

    #[test]
    fn malformed_regex_is_false_not_an_error() {
        let v = vars(&[("x", "anything")]);
        assert!(!evaluate(&cond("x", ConditionOp::Regex, Some("([unclosed")), &v));
        assert!(evaluate(&cond("x", ConditionOp::Regex, Some("^ANY")), &v));
    }
}
