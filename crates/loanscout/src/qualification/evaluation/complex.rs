use tracing::warn;

use super::simple::evaluate_rule;
use super::value::detect_value_type;
use crate::qualification::domain::{
    AnswerMap, BoolOp, ComplexRule, Condition, LogicNode, RuleScope, SimpleRule,
};

/// Evaluates a complex rule's AND/OR tree against the answer snapshot.
///
/// `required_keys` is the set of question keys resolved from the rule's
/// `related_question_ids`; the caller performs that store lookup so the
/// tree evaluation itself stays pure.
///
/// Missing answers behave differently from simple rules: a leaf over an
/// unanswered attribute is false, and when no leaf anywhere in the tree
/// is an existence check, any absent required key makes the whole rule
/// false ("not yet triggered"). Since hard-knockout complex rules
/// disqualify when they PASS, both behaviors keep knockouts from firing
/// on incomplete data.
pub fn evaluate_complex_rule(
    rule: &ComplexRule,
    required_keys: &[String],
    answers: &AnswerMap,
) -> bool {
    let LogicNode::Group { .. } = &rule.logic else {
        warn!(
            complex_rule_id = rule.complex_rule_id,
            "complex rule logic must be an AND/OR group at the top level"
        );
        return false;
    };

    if !has_existence_leaf(&rule.logic) {
        let all_present = required_keys
            .iter()
            .all(|key| crate::qualification::domain::answer_present(answers, key));
        if !required_keys.is_empty() && !all_present {
            return false;
        }
    }

    evaluate_node(&rule.logic, rule.complex_rule_id, answers)
}

fn evaluate_node(node: &LogicNode, complex_rule_id: i64, answers: &AnswerMap) -> bool {
    match node {
        LogicNode::Group {
            operator: BoolOp::And,
            conditions,
        } => conditions
            .iter()
            .all(|child| evaluate_node(child, complex_rule_id, answers)),
        LogicNode::Group {
            operator: BoolOp::Or,
            conditions,
        } => conditions
            .iter()
            .any(|child| evaluate_node(child, complex_rule_id, answers)),
        LogicNode::Leaf(condition) => evaluate_leaf(condition, complex_rule_id, answers),
    }
}

fn evaluate_leaf(condition: &Condition, complex_rule_id: i64, answers: &AnswerMap) -> bool {
    // A leaf over an unanswered attribute never satisfies the rule's
    // conditions (no pass-by-default at this level).
    if !condition.op.is_existence_check()
        && !crate::qualification::domain::answer_present(answers, &condition.attribute)
    {
        return false;
    }

    let value_type = detect_value_type(&condition.value);
    let rule_value = match &condition.value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    let synthetic = SimpleRule {
        rule_id: complex_rule_id,
        rule_scope: RuleScope::Global,
        lender_id: None,
        product_id: None,
        policy_attribute: condition.attribute.clone(),
        operator: condition.op,
        rule_value,
        value_type,
        is_hard_knockout: false,
        related_question_id: None,
        policy_category: None,
    };

    evaluate_rule(&synthetic, answers, true)
}

/// Whether any leaf anywhere in the tree is an Exists/NotExists check.
pub fn has_existence_leaf(node: &LogicNode) -> bool {
    match node {
        LogicNode::Group { conditions, .. } => conditions.iter().any(has_existence_leaf),
        LogicNode::Leaf(condition) => condition.op.is_existence_check(),
    }
}
