use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;

use loanscout::qualification::session::SessionError;
use loanscout::qualification::{
    ComplexRule, LenderId, LogicNode, Operator, ProductId, ProductSummary, Question, QuestionId,
    QuestionStore, RuleScope, RuleSet, RuleStore, SessionState, SessionStore, SimpleRule,
    StoreError, ValidationRules, ValueType,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory product, rule, and question catalog backing the service.
/// Seeded with a demonstration panel of Australian home-loan lenders.
pub(crate) struct InMemoryCatalog {
    summaries: Vec<ProductSummary>,
    simple: Vec<SimpleRule>,
    complex: Vec<ComplexRule>,
    questions: Vec<Question>,
    prerequisites: HashMap<QuestionId, Vec<QuestionId>>,
}

impl InMemoryCatalog {
    fn lender_of(&self, product: ProductId) -> Result<LenderId, StoreError> {
        self.summaries
            .iter()
            .find(|summary| summary.product_id == product)
            .map(|summary| summary.lender_id)
            .ok_or(StoreError::ProductNotFound(product.0))
    }

    fn scoped(&self, product: ProductId) -> Result<RuleSet, StoreError> {
        let lender = self.lender_of(product)?;
        let applies = |scope: RuleScope,
                       rule_lender: Option<LenderId>,
                       rule_product: Option<ProductId>| match scope {
            RuleScope::Global => true,
            RuleScope::Lender => rule_lender == Some(lender),
            RuleScope::Product => rule_product == Some(product),
        };

        Ok(RuleSet {
            simple: self
                .simple
                .iter()
                .filter(|rule| applies(rule.rule_scope, rule.lender_id, rule.product_id))
                .cloned()
                .collect(),
            complex: self
                .complex
                .iter()
                .filter(|rule| applies(rule.rule_scope, rule.lender_id, rule.product_id))
                .cloned()
                .collect(),
        })
    }
}

#[async_trait]
impl RuleStore for InMemoryCatalog {
    async fn rules_for_product(&self, product: ProductId) -> Result<RuleSet, StoreError> {
        self.scoped(product)
    }

    async fn rules_for_products(&self, products: &[ProductId]) -> Result<RuleSet, StoreError> {
        let mut combined = RuleSet::default();
        for product in products {
            let scoped = self.scoped(*product)?;
            combined.simple.extend(scoped.simple);
            combined.complex.extend(scoped.complex);
        }
        Ok(combined)
    }

    async fn all_product_ids(&self) -> Result<Vec<ProductId>, StoreError> {
        Ok(self
            .summaries
            .iter()
            .map(|summary| summary.product_id)
            .collect())
    }

    async fn product_summaries(
        &self,
        products: &[ProductId],
    ) -> Result<Vec<ProductSummary>, StoreError> {
        Ok(self
            .summaries
            .iter()
            .filter(|summary| products.contains(&summary.product_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuestionStore for InMemoryCatalog {
    async fn question_by_id(&self, id: QuestionId) -> Result<Question, StoreError> {
        self.questions
            .iter()
            .find(|question| question.question_id == id)
            .cloned()
            .ok_or(StoreError::QuestionNotFound(id.0))
    }

    async fn question_by_key(&self, key: &str) -> Result<Question, StoreError> {
        self.questions
            .iter()
            .find(|question| question.question_key == key)
            .cloned()
            .ok_or_else(|| StoreError::QuestionKeyNotFound(key.to_string()))
    }

    async fn prerequisites_of(&self, id: QuestionId) -> Result<Vec<QuestionId>, StoreError> {
        Ok(self.prerequisites.get(&id).cloned().unwrap_or_default())
    }

    async fn dependents_among(&self, ids: &[QuestionId]) -> Result<Vec<QuestionId>, StoreError> {
        Ok(ids
            .iter()
            .copied()
            .filter(|id| self.prerequisites.contains_key(id))
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: SessionState) -> Result<(), SessionError> {
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn fetch(&self, session_id: &str) -> Result<Option<SessionState>, SessionError> {
        Ok(self
            .sessions
            .lock()
            .expect("session mutex poisoned")
            .get(session_id)
            .cloned())
    }

    async fn update(&self, session: SessionState) -> Result<(), SessionError> {
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .insert(session.session_id.clone(), session);
        Ok(())
    }
}

pub(crate) fn seed_catalog() -> InMemoryCatalog {
    let meridian = LenderId(1);
    let federation = LenderId(2);
    let ironbark = LenderId(3);

    let summaries = vec![
        summary(
            ProductId(1001),
            "Meridian Standard Variable",
            meridian,
            "Meridian Bank",
            "Variable",
            50_000.0,
            1_500_000.0,
            5.94,
            7.35,
        ),
        summary(
            ProductId(1002),
            "Meridian First Home Fixed",
            meridian,
            "Meridian Bank",
            "Fixed",
            100_000.0,
            900_000.0,
            5.69,
            6.99,
        ),
        summary(
            ProductId(2001),
            "Federation Everyday Variable",
            federation,
            "Federation Mutual",
            "Variable",
            30_000.0,
            750_000.0,
            6.04,
            7.48,
        ),
        summary(
            ProductId(2002),
            "Federation Premium Offset",
            federation,
            "Federation Mutual",
            "Variable",
            250_000.0,
            2_000_000.0,
            5.84,
            7.10,
        ),
        summary(
            ProductId(3001),
            "Ironbark Flexi",
            ironbark,
            "Ironbark Capital",
            "Variable",
            20_000.0,
            500_000.0,
            6.49,
            8.25,
        ),
    ];

    let simple = vec![
        SimpleRule {
            rule_id: 1,
            rule_scope: RuleScope::Global,
            lender_id: None,
            product_id: None,
            policy_attribute: "state".to_string(),
            operator: Operator::In,
            rule_value: r#"["VIC", "NSW", "QLD", "SA", "WA", "ACT"]"#.to_string(),
            value_type: ValueType::ListString,
            is_hard_knockout: true,
            related_question_id: Some(QuestionId(1)),
            policy_category: None,
        },
        SimpleRule {
            rule_id: 2,
            rule_scope: RuleScope::Global,
            lender_id: None,
            product_id: None,
            policy_attribute: "bankruptcy_status".to_string(),
            operator: Operator::Ne,
            rule_value: "Current".to_string(),
            value_type: ValueType::String,
            is_hard_knockout: true,
            related_question_id: Some(QuestionId(2)),
            policy_category: Some("CreditScore".to_string()),
        },
        SimpleRule {
            rule_id: 3,
            rule_scope: RuleScope::Lender,
            lender_id: Some(meridian),
            product_id: None,
            policy_attribute: "employment_status".to_string(),
            operator: Operator::NotIn,
            rule_value: r#"["Unemployed"]"#.to_string(),
            value_type: ValueType::ListString,
            is_hard_knockout: true,
            related_question_id: Some(QuestionId(6)),
            policy_category: Some("IncomeVerification".to_string()),
        },
        SimpleRule {
            rule_id: 4,
            rule_scope: RuleScope::Lender,
            lender_id: Some(federation),
            product_id: None,
            policy_attribute: "has_default_over_1k".to_string(),
            operator: Operator::Eq,
            rule_value: "false".to_string(),
            value_type: ValueType::Boolean,
            is_hard_knockout: true,
            related_question_id: Some(QuestionId(3)),
            policy_category: Some("CreditScore".to_string()),
        },
        SimpleRule {
            rule_id: 5,
            rule_scope: RuleScope::Product,
            lender_id: None,
            product_id: Some(ProductId(2002)),
            policy_attribute: "loan_amount_requested".to_string(),
            operator: Operator::Ge,
            rule_value: "250000".to_string(),
            value_type: ValueType::Number,
            is_hard_knockout: true,
            related_question_id: Some(QuestionId(10)),
            policy_category: Some("LVR".to_string()),
        },
        SimpleRule {
            rule_id: 6,
            rule_scope: RuleScope::Product,
            lender_id: None,
            product_id: Some(ProductId(1002)),
            policy_attribute: "loan_purpose".to_string(),
            operator: Operator::Eq,
            rule_value: "OwnerOccupied".to_string(),
            value_type: ValueType::String,
            is_hard_knockout: true,
            related_question_id: Some(QuestionId(9)),
            policy_category: Some("LoanPurpose".to_string()),
        },
        SimpleRule {
            rule_id: 7,
            rule_scope: RuleScope::Lender,
            lender_id: Some(ironbark),
            product_id: None,
            policy_attribute: "annual_income".to_string(),
            operator: Operator::Ge,
            rule_value: "40000".to_string(),
            value_type: ValueType::Number,
            is_hard_knockout: false,
            related_question_id: Some(QuestionId(7)),
            policy_category: Some("Income".to_string()),
        },
        SimpleRule {
            rule_id: 8,
            rule_scope: RuleScope::Global,
            lender_id: None,
            product_id: None,
            policy_attribute: "employment_status".to_string(),
            operator: Operator::In,
            rule_value: r#"["FullTime", "PartTime"]"#.to_string(),
            value_type: ValueType::ListString,
            is_hard_knockout: false,
            related_question_id: Some(QuestionId(6)),
            policy_category: Some("IncomeVerification".to_string()),
        },
    ];

    let complex = vec![
        // Meridian declines adverse-credit applicants under an income
        // threshold.
        ComplexRule {
            complex_rule_id: 501,
            rule_scope: RuleScope::Lender,
            lender_id: Some(meridian),
            product_id: None,
            is_hard_knockout: true,
            related_question_ids: vec![QuestionId(4), QuestionId(7)],
            logic: LogicNode::all(vec![
                LogicNode::leaf("has_adverse_credit", Operator::Eq, json!(true)),
                LogicNode::leaf("annual_income", Operator::Lt, json!(80_000)),
            ]),
            policy_category: Some("CreditScore".to_string()),
        },
        // Ironbark declines investment loans for casual or unemployed
        // applicants.
        ComplexRule {
            complex_rule_id: 502,
            rule_scope: RuleScope::Lender,
            lender_id: Some(ironbark),
            product_id: None,
            is_hard_knockout: true,
            related_question_ids: vec![QuestionId(9), QuestionId(6)],
            logic: LogicNode::all(vec![
                LogicNode::leaf("loan_purpose", Operator::Eq, json!("Investment")),
                LogicNode::any(vec![
                    LogicNode::leaf("employment_status", Operator::Eq, json!("Casual")),
                    LogicNode::leaf("employment_status", Operator::Eq, json!("Unemployed")),
                ]),
            ]),
            policy_category: Some("LoanPurpose".to_string()),
        },
    ];

    let questions = vec![
        question(
            1,
            "state",
            "Which state or territory do you live in?",
            "ApplicantInfo",
            ValueType::String,
            1,
            Some(vec!["VIC", "NSW", "QLD", "SA", "WA", "TAS", "NT", "ACT"]),
            None,
        ),
        question(
            2,
            "bankruptcy_status",
            "Have you ever been declared bankrupt?",
            "ApplicantInfo",
            ValueType::String,
            2,
            Some(vec!["Never", "Current", "Discharged"]),
            Some(ValidationRules {
                allowed_values: Some(
                    ["Never", "Current", "Discharged"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                ),
                ..ValidationRules::default()
            }),
        ),
        question(
            3,
            "has_default_over_1k",
            "Do you have any defaults over $1,000 on your credit file?",
            "ApplicantInfo",
            ValueType::Boolean,
            3,
            None,
            None,
        ),
        question(
            4,
            "has_adverse_credit",
            "Is there any other adverse history on your credit file?",
            "ApplicantInfo",
            ValueType::Boolean,
            4,
            None,
            None,
        ),
        question(
            5,
            "has_adverse_credit_explanation",
            "Briefly describe the adverse credit history.",
            "ApplicantInfo",
            ValueType::String,
            5,
            None,
            Some(ValidationRules {
                min_length: Some(10),
                max_length: Some(500),
                ..ValidationRules::default()
            }),
        ),
        question(
            6,
            "employment_status",
            "What is your employment status?",
            "Employment",
            ValueType::String,
            6,
            Some(vec![
                "FullTime",
                "PartTime",
                "Casual",
                "SelfEmployed",
                "Unemployed",
            ]),
            None,
        ),
        question(
            7,
            "annual_income",
            "What is your gross annual income?",
            "Income",
            ValueType::Number,
            7,
            None,
            Some(ValidationRules {
                min: Some(0.0),
                ..ValidationRules::default()
            }),
        ),
        question(
            8,
            "monthly_expenses",
            "What are your typical monthly living expenses?",
            "Expenses",
            ValueType::Number,
            8,
            None,
            Some(ValidationRules {
                min: Some(0.0),
                ..ValidationRules::default()
            }),
        ),
        question(
            9,
            "loan_purpose",
            "What is the loan for?",
            "LoanDetails",
            ValueType::String,
            9,
            Some(vec!["OwnerOccupied", "Investment", "Refinance"]),
            None,
        ),
        question(
            10,
            "loan_amount_requested",
            "How much would you like to borrow?",
            "LoanDetails",
            ValueType::Number,
            10,
            None,
            Some(ValidationRules {
                min: Some(10_000.0),
                max: Some(5_000_000.0),
                ..ValidationRules::default()
            }),
        ),
        question(
            11,
            "deposit_amount",
            "How much deposit do you have available?",
            "LoanDetails",
            ValueType::Number,
            11,
            None,
            Some(ValidationRules {
                min: Some(0.0),
                ..ValidationRules::default()
            }),
        ),
    ];

    let mut prerequisites = HashMap::new();
    prerequisites.insert(QuestionId(3), vec![QuestionId(2)]);
    prerequisites.insert(QuestionId(4), vec![QuestionId(2)]);
    prerequisites.insert(QuestionId(5), vec![QuestionId(4)]);

    InMemoryCatalog {
        summaries,
        simple,
        complex,
        questions,
        prerequisites,
    }
}

#[allow(clippy::too_many_arguments)]
fn summary(
    product_id: ProductId,
    product_name: &str,
    lender_id: LenderId,
    lender_name: &str,
    loan_type: &str,
    min_loan_amount: f64,
    max_loan_amount: f64,
    base_rate: f64,
    worst_case_rate: f64,
) -> ProductSummary {
    ProductSummary {
        product_id,
        product_name: product_name.to_string(),
        lender_id,
        lender_name: lender_name.to_string(),
        loan_type: loan_type.to_string(),
        min_loan_amount,
        max_loan_amount,
        base_rate,
        worst_case_rate,
    }
}

#[allow(clippy::too_many_arguments)]
fn question(
    id: i64,
    key: &str,
    text: &str,
    group: &str,
    answer_type: ValueType,
    priority: u32,
    possible_answers: Option<Vec<&str>>,
    validation_rules: Option<ValidationRules>,
) -> Question {
    Question {
        question_id: QuestionId(id),
        question_key: key.to_string(),
        question_text: text.to_string(),
        question_group: group.to_string(),
        answer_type,
        display_priority: priority,
        possible_answers: possible_answers
            .map(|answers| answers.into_iter().map(String::from).collect()),
        validation_rules,
    }
}
