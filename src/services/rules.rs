// src/services/rules.rs

//! Turns a paper's authored rule list into a complete per-type policy.
//!
//! Accepted shapes, all optional:
//!
//! ```json
//! [{"type": "single", "full_score": 2, "partial_score": 0, "time_limit": 15}]
//! {"multiple": {"fullScore": "4", "partialScore": 2, "timeLimit": 30}}
//! ```
//!
//! Anything that cannot be read falls back instead of failing.

use serde_json::{Map, Value};

use crate::models::{
    paper::{RuleEntry, RuleMap},
    question::QuestionType,
};

pub const DEFAULT_SINGLE: RuleEntry = RuleEntry {
    full_score: 2.0,
    partial_score: 0.0,
    time_limit_seconds: 15,
};

pub const DEFAULT_MULTIPLE: RuleEntry = RuleEntry {
    full_score: 4.0,
    partial_score: 2.0,
    time_limit_seconds: 30,
};

pub const DEFAULT_JUDGE: RuleEntry = RuleEntry {
    full_score: 2.0,
    partial_score: 0.0,
    time_limit_seconds: 20,
};

const TYPE_KEYS: [&str; 3] = ["type", "question_type", "questionType"];
const FULL_KEYS: [&str; 4] = ["full_score", "fullScore", "score", "points"];
const PARTIAL_KEYS: [&str; 2] = ["partial_score", "partialScore"];
const TIME_KEYS: [&str; 4] = ["time_limit", "timeLimit", "time_limit_seconds", "timeLimitSeconds"];

pub fn default_rule(question_type: QuestionType) -> RuleEntry {
    match question_type {
        QuestionType::Single => DEFAULT_SINGLE,
        QuestionType::Multiple => DEFAULT_MULTIPLE,
        QuestionType::Judge => DEFAULT_JUDGE,
    }
}

impl Default for RuleMap {
    fn default() -> Self {
        Self {
            single: DEFAULT_SINGLE,
            multiple: DEFAULT_MULTIPLE,
            judge: DEFAULT_JUDGE,
        }
    }
}

/// Resolves the raw rules of a paper. Never fails.
///
/// Types without an entry get the defaults. For a type that has an entry,
/// unreadable or negative scores become 0, a partial score above the full
/// score is capped to it, and an unreadable or non-positive time limit falls
/// back to the type's default limit.
pub fn resolve(raw: &Value) -> RuleMap {
    let mut map = RuleMap::default();

    for (question_type, entry) in rule_objects(raw) {
        let full_score = read_number(entry, &FULL_KEYS)
            .filter(|v| *v >= 0.0)
            .unwrap_or(0.0);
        let partial_score = read_number(entry, &PARTIAL_KEYS)
            .filter(|v| *v >= 0.0)
            .unwrap_or(0.0)
            .min(full_score);
        let time_limit_seconds = read_number(entry, &TIME_KEYS)
            .map(|v| v.floor() as i64)
            .filter(|v| *v > 0)
            .unwrap_or(default_rule(question_type).time_limit_seconds);

        *map.get_mut(question_type) = RuleEntry {
            full_score,
            partial_score,
            time_limit_seconds,
        };
    }

    map
}

/// Collects `(type, entry)` pairs from either supported shape. Later entries
/// for the same type win.
fn rule_objects(raw: &Value) -> Vec<(QuestionType, &Map<String, Value>)> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|entry| {
                TYPE_KEYS
                    .iter()
                    .find_map(|k| entry.get(*k).and_then(Value::as_str))
                    .and_then(|t| t.parse::<QuestionType>().ok())
                    .map(|t| (t, entry))
            })
            .collect(),
        Value::Object(by_type) => by_type
            .iter()
            .filter_map(|(k, v)| {
                let question_type = k.parse::<QuestionType>().ok()?;
                v.as_object().map(|entry| (question_type, entry))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn read_number(entry: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| entry.get(*k))
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_rules_use_defaults() {
        assert_eq!(resolve(&json!([])), RuleMap::default());
        assert_eq!(resolve(&Value::Null), RuleMap::default());
        assert_eq!(resolve(&json!("garbage")), RuleMap::default());
    }

    #[test]
    fn test_list_shape_overrides_only_named_types() {
        let rules = resolve(&json!([
            {"type": "single", "full_score": 5, "partial_score": 0, "time_limit": 40}
        ]));
        assert_eq!(rules.single.full_score, 5.0);
        assert_eq!(rules.single.time_limit_seconds, 40);
        assert_eq!(rules.multiple, DEFAULT_MULTIPLE);
        assert_eq!(rules.judge, DEFAULT_JUDGE);
    }

    #[test]
    fn test_object_shape_with_camel_case_and_strings() {
        let rules = resolve(&json!({
            "multiple": {"fullScore": "6", "partialScore": 3, "timeLimit": "45"}
        }));
        assert_eq!(rules.multiple.full_score, 6.0);
        assert_eq!(rules.multiple.partial_score, 3.0);
        assert_eq!(rules.multiple.time_limit_seconds, 45);
    }

    #[test]
    fn test_malformed_fields_coerce() {
        let rules = resolve(&json!([
            {"type": "judge", "full_score": "lots", "partial_score": -1, "time_limit": 0},
            {"type": "multiple", "full_score": 2, "partial_score": 9},
            {"type": "essay", "full_score": 100},
            42
        ]));
        assert_eq!(rules.judge.full_score, 0.0);
        assert_eq!(rules.judge.partial_score, 0.0);
        assert_eq!(rules.judge.time_limit_seconds, DEFAULT_JUDGE.time_limit_seconds);
        assert_eq!(rules.multiple.partial_score, 2.0);
        assert_eq!(rules.multiple.time_limit_seconds, DEFAULT_MULTIPLE.time_limit_seconds);
        assert_eq!(rules.single, DEFAULT_SINGLE);
    }
}
