//! Answer validation against a question's declared type and constraints.
//!
//! Runs at the API edge before an answer is merged into the session, so
//! the evaluation engine can assume answers are at least type-plausible.

use crate::qualification::domain::{AnswerValue, Question, ValidationRules, ValueType};

#[derive(Debug, thiserror::Error)]
pub enum AnswerValidationError {
    #[error("answer for '{question_key}' must be of type {expected}")]
    WrongType {
        question_key: String,
        expected: &'static str,
    },
    #[error("answer for '{question_key}' must be at least {min}")]
    BelowMin { question_key: String, min: f64 },
    #[error("answer for '{question_key}' must be at most {max}")]
    AboveMax { question_key: String, max: f64 },
    #[error("answer for '{question_key}' must be at least {min_length} characters")]
    TooShort {
        question_key: String,
        min_length: usize,
    },
    #[error("answer for '{question_key}' must be at most {max_length} characters")]
    TooLong {
        question_key: String,
        max_length: usize,
    },
    #[error("answer for '{question_key}' must be one of the allowed values")]
    NotAllowed { question_key: String },
}

/// Checks the answer's shape against the question's declared type, then
/// its declarative constraints. Numeric strings are accepted for Number
/// questions; everything else must match its family.
pub fn validate_answer(
    question: &Question,
    answer: &AnswerValue,
) -> Result<(), AnswerValidationError> {
    let key = &question.question_key;

    match question.answer_type {
        ValueType::Number => {
            if numeric_value(answer).is_none() {
                return Err(wrong_type(key, "Number"));
            }
        }
        ValueType::String => {
            if !matches!(answer, AnswerValue::Text(_)) {
                return Err(wrong_type(key, "String"));
            }
        }
        ValueType::Boolean => {
            if !matches!(answer, AnswerValue::Bool(_)) {
                return Err(wrong_type(key, "Boolean"));
            }
        }
        ValueType::ListString => {
            if !matches!(answer, AnswerValue::TextList(_)) {
                return Err(wrong_type(key, "List_String"));
            }
        }
        ValueType::ListNumber => {
            if !matches!(answer, AnswerValue::NumberList(_)) {
                return Err(wrong_type(key, "List_Number"));
            }
        }
    }

    if let Some(rules) = &question.validation_rules {
        apply_rules(key, rules, answer)?;
    }

    Ok(())
}

fn apply_rules(
    key: &str,
    rules: &ValidationRules,
    answer: &AnswerValue,
) -> Result<(), AnswerValidationError> {
    if let Some(number) = numeric_value(answer) {
        if let Some(min) = rules.min {
            if number < min {
                return Err(AnswerValidationError::BelowMin {
                    question_key: key.to_string(),
                    min,
                });
            }
        }
        if let Some(max) = rules.max {
            if number > max {
                return Err(AnswerValidationError::AboveMax {
                    question_key: key.to_string(),
                    max,
                });
            }
        }
    }

    if let AnswerValue::Text(text) = answer {
        if let Some(min_length) = rules.min_length {
            if text.chars().count() < min_length {
                return Err(AnswerValidationError::TooShort {
                    question_key: key.to_string(),
                    min_length,
                });
            }
        }
        if let Some(max_length) = rules.max_length {
            if text.chars().count() > max_length {
                return Err(AnswerValidationError::TooLong {
                    question_key: key.to_string(),
                    max_length,
                });
            }
        }
        if let Some(allowed) = &rules.allowed_values {
            if !allowed.iter().any(|value| value == text) {
                return Err(AnswerValidationError::NotAllowed {
                    question_key: key.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn numeric_value(answer: &AnswerValue) -> Option<f64> {
    match answer {
        AnswerValue::Number(value) => Some(*value),
        AnswerValue::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn wrong_type(key: &str, expected: &'static str) -> AnswerValidationError {
    AnswerValidationError::WrongType {
        question_key: key.to_string(),
        expected,
    }
}
