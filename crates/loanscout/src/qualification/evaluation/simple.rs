use tracing::warn;

use super::value::{coerce_answer, parse_rule_value, ParsedValue, ValueError};
use crate::qualification::domain::{AnswerMap, AnswerValue, Operator, SimpleRule};

/// Evaluates one simple policy rule against the answer snapshot.
///
/// Missing answers follow the pass-by-default policy: a rule about an
/// attribute the user has not answered yet does not eliminate anything.
/// Malformed rule data is different — the rule fails (returns false)
/// rather than surfacing an error.
pub fn evaluate_rule(rule: &SimpleRule, answers: &AnswerMap, pass_by_default: bool) -> bool {
    let answer = answers
        .get(&rule.policy_attribute)
        .filter(|value| value.is_present());

    match rule.operator {
        Operator::Exists => return answer.is_some(),
        Operator::NotExists => return answer.is_none(),
        _ => {}
    }

    let Some(answer) = answer else {
        return pass_by_default;
    };

    match evaluate_present(rule, answer) {
        Ok(result) => result,
        Err(err) => {
            warn!(
                rule_id = rule.rule_id,
                attribute = %rule.policy_attribute,
                error = %err,
                "simple rule evaluation failed; treating rule as failed"
            );
            false
        }
    }
}

fn evaluate_present(rule: &SimpleRule, answer: &AnswerValue) -> Result<bool, ValueError> {
    let rule_value = parse_rule_value(&rule.rule_value, rule.value_type)?;
    let coerced = coerce_answer(answer, rule.value_type)?;

    Ok(match rule.operator {
        Operator::Eq => values_equal(&coerced, &rule_value),
        Operator::Ne => !values_equal(&coerced, &rule_value),
        Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
            match (coerced.as_number(), rule_value.as_number()) {
                (Some(lhs), Some(rhs)) => match rule.operator {
                    Operator::Gt => lhs > rhs,
                    Operator::Lt => lhs < rhs,
                    Operator::Ge => lhs >= rhs,
                    _ => lhs <= rhs,
                },
                _ => {
                    warn!(
                        rule_id = rule.rule_id,
                        operator = ?rule.operator,
                        "ordering comparison on non-numeric operands"
                    );
                    false
                }
            }
        }
        Operator::In => membership(&coerced, &rule_value).unwrap_or_else(|| {
            warn!(rule_id = rule.rule_id, "IN rule value is not a list");
            false
        }),
        Operator::NotIn => match membership(&coerced, &rule_value) {
            Some(contained) => !contained,
            None => {
                warn!(rule_id = rule.rule_id, "NOT IN rule value is not a list");
                false
            }
        },
        // Existence checks are handled before values are parsed.
        Operator::Exists | Operator::NotExists => false,
    })
}

fn values_equal(lhs: &ParsedValue, rhs: &ParsedValue) -> bool {
    match (lhs, rhs) {
        (ParsedValue::Number(a), ParsedValue::Number(b)) => a == b,
        (ParsedValue::Text(a), ParsedValue::Text(b)) => a == b,
        (ParsedValue::Bool(a), ParsedValue::Bool(b)) => a == b,
        (ParsedValue::NumberList(a), ParsedValue::NumberList(b)) => a == b,
        (ParsedValue::TextList(a), ParsedValue::TextList(b)) => a == b,
        _ => false,
    }
}

/// Membership of a single coerced answer in a list-typed rule value.
/// Returns None when the rule value is not actually a list; a family
/// mismatch between answer and list is simply "not contained".
fn membership(answer: &ParsedValue, list: &ParsedValue) -> Option<bool> {
    match list {
        ParsedValue::NumberList(values) => Some(match answer {
            ParsedValue::Number(value) => values.contains(value),
            _ => false,
        }),
        ParsedValue::TextList(values) => Some(match answer {
            ParsedValue::Text(value) => values.contains(value),
            _ => false,
        }),
        _ => None,
    }
}
