use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier wrappers for the reference data the engine consumes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ProductId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LenderId(pub i64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct QuestionId(pub i64);

/// A single user-supplied answer. The untagged representation accepts the
/// JSON shapes clients naturally send: booleans, numbers, strings, and
/// homogeneous lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Number(f64),
    NumberList(Vec<f64>),
    TextList(Vec<String>),
    Text(String),
}

impl AnswerValue {
    /// An answer counts as present unless it is an empty string. Absent
    /// keys are handled by the map lookup, not here.
    pub fn is_present(&self) -> bool {
        !matches!(self, AnswerValue::Text(text) if text.is_empty())
    }

    /// Loose truthiness used by the value-based prerequisite overrides:
    /// `false`, `0`, and `""` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            AnswerValue::Bool(value) => *value,
            AnswerValue::Number(value) => *value != 0.0,
            AnswerValue::Text(value) => !value.is_empty(),
            AnswerValue::NumberList(_) | AnswerValue::TextList(_) => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// Snapshot of the user's answers, keyed by question key. The engine only
/// reads it; the caller owns mutation between evaluation calls.
pub type AnswerMap = BTreeMap<String, AnswerValue>;

/// Returns whether the key holds a present (non-empty) answer.
pub fn answer_present(answers: &AnswerMap, key: &str) -> bool {
    answers.get(key).is_some_and(AnswerValue::is_present)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleScope {
    Global,
    Lender,
    Product,
}

/// Comparison operators supported by policy rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    Exists,
    NotExists,
}

impl Operator {
    pub fn is_existence_check(self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }
}

/// Declared type of a rule value or question answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Number,
    String,
    Boolean,
    #[serde(rename = "List_String")]
    ListString,
    #[serde(rename = "List_Number")]
    ListNumber,
}

/// A flat attribute rule scoped Global, per-lender, or per-product.
///
/// Simple rules use knockout-on-failure semantics: when a hard-knockout
/// rule FAILS against the answers, the product is ineligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleRule {
    pub rule_id: i64,
    pub rule_scope: RuleScope,
    pub lender_id: Option<LenderId>,
    pub product_id: Option<ProductId>,
    pub policy_attribute: String,
    pub operator: Operator,
    pub rule_value: String,
    pub value_type: ValueType,
    pub is_hard_knockout: bool,
    pub related_question_id: Option<QuestionId>,
    pub policy_category: Option<String>,
}

impl SimpleRule {
    /// Composite identity used to collapse scope-overlapping copies of
    /// logically the same rule before scoring. The lender part only
    /// matters for Lender scope and the product part only for Product
    /// scope.
    pub fn dedup_key(&self) -> (RuleScope, Option<LenderId>, Option<ProductId>, String) {
        let lender = match self.rule_scope {
            RuleScope::Lender => self.lender_id,
            _ => None,
        };
        let product = match self.rule_scope {
            RuleScope::Product => self.product_id,
            _ => None,
        };
        (self.rule_scope, lender, product, self.policy_attribute.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolOp {
    And,
    Or,
}

/// A leaf condition inside a complex rule. The value is already typed
/// JSON, not the string encoding simple rules use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub op: Operator,
    pub value: serde_json::Value,
}

/// Recursive AND/OR tree. A node is either a boolean group over child
/// nodes or a leaf condition; nesting is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogicNode {
    Group {
        operator: BoolOp,
        conditions: Vec<LogicNode>,
    },
    Leaf(Condition),
}

impl LogicNode {
    pub fn all(conditions: Vec<LogicNode>) -> Self {
        LogicNode::Group {
            operator: BoolOp::And,
            conditions,
        }
    }

    pub fn any(conditions: Vec<LogicNode>) -> Self {
        LogicNode::Group {
            operator: BoolOp::Or,
            conditions,
        }
    }

    pub fn leaf(attribute: &str, op: Operator, value: serde_json::Value) -> Self {
        LogicNode::Leaf(Condition {
            attribute: attribute.to_string(),
            op,
            value,
        })
    }
}

/// A nested boolean rule over several attributes.
///
/// NOTE: knockout semantics are INVERTED relative to [`SimpleRule`]. A
/// complex rule's tree encodes the disqualifying condition directly:
/// when a hard-knockout complex rule PASSES, the product is ineligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexRule {
    pub complex_rule_id: i64,
    pub rule_scope: RuleScope,
    pub lender_id: Option<LenderId>,
    pub product_id: Option<ProductId>,
    pub is_hard_knockout: bool,
    pub related_question_ids: Vec<QuestionId>,
    #[serde(rename = "logic_structure")]
    pub logic: LogicNode,
    pub policy_category: Option<String>,
}

/// Immutable question reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: QuestionId,
    pub question_key: String,
    pub question_text: String,
    pub question_group: String,
    pub answer_type: ValueType,
    /// Lower number means more urgent.
    pub display_priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_answers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<ValidationRules>,
}

/// Declarative per-question answer constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "minLength")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "maxLength")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "enum")]
    pub allowed_values: Option<Vec<String>>,
}

/// Product catalog entry surfaced to clients once eligibility settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub product_name: String,
    pub lender_id: LenderId,
    pub lender_name: String,
    pub loan_type: String,
    pub min_loan_amount: f64,
    pub max_loan_amount: f64,
    pub base_rate: f64,
    pub worst_case_rate: f64,
}
