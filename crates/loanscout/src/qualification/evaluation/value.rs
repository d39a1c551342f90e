use crate::qualification::domain::{AnswerValue, ValueType};

/// A rule value or answer after typed parsing, ready for comparison.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedValue {
    Number(f64),
    Text(String),
    Bool(bool),
    NumberList(Vec<f64>),
    TextList(Vec<String>),
}

impl ParsedValue {
    pub(crate) fn as_number(&self) -> Option<f64> {
        match self {
            ParsedValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// Errors raised while parsing or coercing values. These never escape a
/// rule evaluation; the rule fails instead.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ValueError {
    #[error("invalid number format: {0}")]
    InvalidNumber(String),
    #[error("invalid boolean format: {0}")]
    InvalidBoolean(String),
    #[error("invalid {expected:?} list: {raw}")]
    InvalidList { expected: ValueType, raw: String },
    #[error("cannot coerce answer {answer:?} to {expected:?}")]
    Coercion {
        expected: ValueType,
        answer: AnswerValue,
    },
}

/// Parses the raw string a simple rule stores into its declared type.
/// List values must be valid JSON arrays of the matching element type.
pub(crate) fn parse_rule_value(raw: &str, value_type: ValueType) -> Result<ParsedValue, ValueError> {
    match value_type {
        ValueType::Number => raw
            .trim()
            .parse::<f64>()
            .map(ParsedValue::Number)
            .map_err(|_| ValueError::InvalidNumber(raw.to_string())),
        ValueType::String => Ok(ParsedValue::Text(raw.to_string())),
        ValueType::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                Ok(ParsedValue::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Ok(ParsedValue::Bool(false))
            } else {
                Err(ValueError::InvalidBoolean(raw.to_string()))
            }
        }
        ValueType::ListString => serde_json::from_str::<Vec<String>>(raw)
            .map(ParsedValue::TextList)
            .map_err(|_| ValueError::InvalidList {
                expected: value_type,
                raw: raw.to_string(),
            }),
        ValueType::ListNumber => serde_json::from_str::<Vec<f64>>(raw)
            .map(ParsedValue::NumberList)
            .map_err(|_| ValueError::InvalidList {
                expected: value_type,
                raw: raw.to_string(),
            }),
    }
}

/// Coerces the user's answer toward the rule's declared type.
///
/// Numbers accept numeric strings; booleans accept only the literal
/// strings "true"/"false"; strings accept anything scalar. For list
/// types the answer stays in its own family so the membership test can
/// decide (a mismatched family simply never matches).
pub(crate) fn coerce_answer(
    answer: &AnswerValue,
    expected: ValueType,
) -> Result<ParsedValue, ValueError> {
    let mismatch = || ValueError::Coercion {
        expected,
        answer: answer.clone(),
    };

    match expected {
        ValueType::Number => match answer {
            AnswerValue::Number(value) => Ok(ParsedValue::Number(*value)),
            AnswerValue::Text(value) => value
                .trim()
                .parse::<f64>()
                .map(ParsedValue::Number)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ValueType::String => match answer {
            AnswerValue::Text(value) => Ok(ParsedValue::Text(value.clone())),
            AnswerValue::Number(value) => Ok(ParsedValue::Text(format_number(*value))),
            AnswerValue::Bool(value) => Ok(ParsedValue::Text(value.to_string())),
            _ => Err(mismatch()),
        },
        ValueType::Boolean => match answer {
            AnswerValue::Bool(value) => Ok(ParsedValue::Bool(*value)),
            AnswerValue::Text(value) if value.eq_ignore_ascii_case("true") => {
                Ok(ParsedValue::Bool(true))
            }
            AnswerValue::Text(value) if value.eq_ignore_ascii_case("false") => {
                Ok(ParsedValue::Bool(false))
            }
            _ => Err(mismatch()),
        },
        ValueType::ListString | ValueType::ListNumber => Ok(match answer {
            AnswerValue::Number(value) => ParsedValue::Number(*value),
            AnswerValue::Text(value) => ParsedValue::Text(value.clone()),
            AnswerValue::Bool(value) => ParsedValue::Bool(*value),
            AnswerValue::NumberList(values) => ParsedValue::NumberList(values.clone()),
            AnswerValue::TextList(values) => ParsedValue::TextList(values.clone()),
        }),
    }
}

/// Renders a number the way clients wrote it where possible, so string
/// comparisons against integer-like answers behave predictably.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Infers the declared type of a complex-rule leaf literal. Arrays are
/// classified by their first element; empty arrays count as numeric.
pub(crate) fn detect_value_type(value: &serde_json::Value) -> ValueType {
    match value {
        serde_json::Value::Array(items) => match items.first() {
            Some(serde_json::Value::Number(_)) | None => ValueType::ListNumber,
            _ => ValueType::ListString,
        },
        serde_json::Value::Number(_) => ValueType::Number,
        serde_json::Value::Bool(_) => ValueType::Boolean,
        _ => ValueType::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_declared_type() {
        assert_eq!(
            parse_rule_value("100000", ValueType::Number).expect("number"),
            ParsedValue::Number(100000.0)
        );
        assert_eq!(
            parse_rule_value("TRUE", ValueType::Boolean).expect("boolean"),
            ParsedValue::Bool(true)
        );
        assert_eq!(
            parse_rule_value(r#"["VIC","NSW"]"#, ValueType::ListString).expect("list"),
            ParsedValue::TextList(vec!["VIC".to_string(), "NSW".to_string()])
        );
        assert_eq!(
            parse_rule_value("[1, 2, 3]", ValueType::ListNumber).expect("list"),
            ParsedValue::NumberList(vec![1.0, 2.0, 3.0])
        );
    }

    #[test]
    fn malformed_values_error() {
        assert!(parse_rule_value("abc", ValueType::Number).is_err());
        assert!(parse_rule_value("yes", ValueType::Boolean).is_err());
        assert!(parse_rule_value("not json", ValueType::ListString).is_err());
        assert!(parse_rule_value(r#"["a"]"#, ValueType::ListNumber).is_err());
    }

    #[test]
    fn numeric_strings_coerce_to_numbers() {
        let coerced =
            coerce_answer(&AnswerValue::Text("85000".to_string()), ValueType::Number).expect("ok");
        assert_eq!(coerced, ParsedValue::Number(85000.0));

        assert!(coerce_answer(&AnswerValue::Bool(true), ValueType::Number).is_err());
    }

    #[test]
    fn booleans_require_strict_literals() {
        assert_eq!(
            coerce_answer(&AnswerValue::Text("True".to_string()), ValueType::Boolean)
                .expect("ok"),
            ParsedValue::Bool(true)
        );
        assert!(coerce_answer(&AnswerValue::Text("yes".to_string()), ValueType::Boolean).is_err());
        assert!(coerce_answer(&AnswerValue::Number(1.0), ValueType::Boolean).is_err());
    }

    #[test]
    fn detects_leaf_literal_types() {
        assert_eq!(detect_value_type(&serde_json::json!(3)), ValueType::Number);
        assert_eq!(
            detect_value_type(&serde_json::json!("Citizen")),
            ValueType::String
        );
        assert_eq!(
            detect_value_type(&serde_json::json!([1, 2])),
            ValueType::ListNumber
        );
        assert_eq!(
            detect_value_type(&serde_json::json!(["a"])),
            ValueType::ListString
        );
    }
}
