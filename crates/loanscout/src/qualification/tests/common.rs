use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Value};

use crate::qualification::domain::{
    AnswerMap, AnswerValue, ComplexRule, LenderId, LogicNode, Operator, ProductId, ProductSummary,
    Question, QuestionId, RuleScope, SimpleRule, ValidationRules, ValueType,
};
use crate::qualification::scoring::ScoringConfig;
use crate::qualification::service::QualificationService;
use crate::qualification::session::{SessionError, SessionState, SessionStore};
use crate::qualification::store::{QuestionStore, RuleSet, RuleStore, StoreError};

pub(super) const AURORA_VARIABLE: ProductId = ProductId(101);
pub(super) const AURORA_JUMBO: ProductId = ProductId(102);
pub(super) const SOUTHERN_ESSENTIALS: ProductId = ProductId(201);
pub(super) const SOUTHERN_PACKAGE: ProductId = ProductId(202);

pub(super) const Q_STATE: QuestionId = QuestionId(1);
pub(super) const Q_BANKRUPTCY: QuestionId = QuestionId(2);
pub(super) const Q_ADVERSE_CREDIT: QuestionId = QuestionId(3);
pub(super) const Q_ADVERSE_EXPLANATION: QuestionId = QuestionId(4);
pub(super) const Q_EMPLOYMENT: QuestionId = QuestionId(5);
pub(super) const Q_INCOME: QuestionId = QuestionId(6);
pub(super) const Q_LOAN_AMOUNT: QuestionId = QuestionId(7);

pub(super) fn answers(entries: &[(&str, AnswerValue)]) -> AnswerMap {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

pub(super) fn text(value: &str) -> AnswerValue {
    AnswerValue::Text(value.to_string())
}

fn question(
    id: QuestionId,
    key: &str,
    group: &str,
    answer_type: ValueType,
    priority: u32,
) -> Question {
    Question {
        question_id: id,
        question_key: key.to_string(),
        question_text: format!("Please provide {}", key.replace('_', " ")),
        question_group: group.to_string(),
        answer_type,
        display_priority: priority,
        possible_answers: None,
        validation_rules: None,
    }
}

/// In-memory catalog covering products, rules, questions, and the
/// dependency graph, seeded with a small Australian home-loan panel.
pub(super) struct MemoryCatalog {
    summaries: Vec<ProductSummary>,
    product_lenders: HashMap<ProductId, LenderId>,
    simple: Vec<SimpleRule>,
    complex: Vec<ComplexRule>,
    questions: Vec<Question>,
    prerequisites: HashMap<QuestionId, Vec<QuestionId>>,
}

impl MemoryCatalog {
    pub(super) fn seeded() -> Self {
        let aurora = LenderId(1);
        let southern = LenderId(2);

        let summaries = vec![
            ProductSummary {
                product_id: AURORA_VARIABLE,
                product_name: "Aurora Standard Variable".to_string(),
                lender_id: aurora,
                lender_name: "Aurora Bank".to_string(),
                loan_type: "Variable".to_string(),
                min_loan_amount: 50_000.0,
                max_loan_amount: 800_000.0,
                base_rate: 5.89,
                worst_case_rate: 7.24,
            },
            ProductSummary {
                product_id: AURORA_JUMBO,
                product_name: "Aurora Jumbo Fixed".to_string(),
                lender_id: aurora,
                lender_name: "Aurora Bank".to_string(),
                loan_type: "Fixed".to_string(),
                min_loan_amount: 500_000.0,
                max_loan_amount: 3_000_000.0,
                base_rate: 5.49,
                worst_case_rate: 6.85,
            },
            ProductSummary {
                product_id: SOUTHERN_ESSENTIALS,
                product_name: "Southern Cross Essentials".to_string(),
                lender_id: southern,
                lender_name: "Southern Cross Lending".to_string(),
                loan_type: "Variable".to_string(),
                min_loan_amount: 20_000.0,
                max_loan_amount: 600_000.0,
                base_rate: 6.19,
                worst_case_rate: 7.92,
            },
        ];
        let product_lenders = summaries
            .iter()
            .map(|summary| (summary.product_id, summary.lender_id))
            .collect();

        let simple = vec![
            SimpleRule {
                rule_id: 10,
                rule_scope: RuleScope::Global,
                lender_id: None,
                product_id: None,
                policy_attribute: "state".to_string(),
                operator: Operator::In,
                rule_value: r#"["VIC", "NSW"]"#.to_string(),
                value_type: ValueType::ListString,
                is_hard_knockout: true,
                related_question_id: Some(Q_STATE),
                policy_category: None,
            },
            SimpleRule {
                rule_id: 11,
                rule_scope: RuleScope::Lender,
                lender_id: Some(aurora),
                product_id: None,
                policy_attribute: "bankruptcy_status".to_string(),
                operator: Operator::Ne,
                rule_value: "Current".to_string(),
                value_type: ValueType::String,
                is_hard_knockout: true,
                related_question_id: Some(Q_BANKRUPTCY),
                policy_category: Some("CreditScore".to_string()),
            },
            SimpleRule {
                rule_id: 12,
                rule_scope: RuleScope::Product,
                lender_id: None,
                product_id: Some(AURORA_JUMBO),
                policy_attribute: "loan_amount_requested".to_string(),
                operator: Operator::Ge,
                rule_value: "500000".to_string(),
                value_type: ValueType::Number,
                is_hard_knockout: true,
                related_question_id: Some(Q_LOAN_AMOUNT),
                policy_category: Some("LVR".to_string()),
            },
            SimpleRule {
                rule_id: 13,
                rule_scope: RuleScope::Global,
                lender_id: None,
                product_id: None,
                policy_attribute: "employment_status".to_string(),
                operator: Operator::Eq,
                rule_value: "FullTime".to_string(),
                value_type: ValueType::String,
                is_hard_knockout: false,
                related_question_id: Some(Q_EMPLOYMENT),
                policy_category: Some("IncomeVerification".to_string()),
            },
        ];

        // Southern Cross declines applicants reporting adverse credit on
        // a low income; the tree IS the disqualifying condition.
        let complex = vec![ComplexRule {
            complex_rule_id: 50,
            rule_scope: RuleScope::Lender,
            lender_id: Some(southern),
            product_id: None,
            is_hard_knockout: true,
            related_question_ids: vec![Q_ADVERSE_CREDIT, Q_INCOME],
            logic: LogicNode::all(vec![
                LogicNode::leaf("has_adverse_credit", Operator::Eq, json!(true)),
                LogicNode::leaf("annual_income", Operator::Lt, json!(50_000)),
            ]),
            policy_category: Some("CreditScore".to_string()),
        }];

        let questions = vec![
            question(Q_STATE, "state", "ApplicantInfo", ValueType::String, 1),
            Question {
                possible_answers: Some(vec![
                    "Never".to_string(),
                    "Current".to_string(),
                    "Discharged".to_string(),
                ]),
                validation_rules: Some(ValidationRules {
                    allowed_values: Some(vec![
                        "Never".to_string(),
                        "Current".to_string(),
                        "Discharged".to_string(),
                    ]),
                    ..ValidationRules::default()
                }),
                ..question(
                    Q_BANKRUPTCY,
                    "bankruptcy_status",
                    "ApplicantInfo",
                    ValueType::String,
                    2,
                )
            },
            question(
                Q_ADVERSE_CREDIT,
                "has_adverse_credit",
                "ApplicantInfo",
                ValueType::Boolean,
                3,
            ),
            question(
                Q_ADVERSE_EXPLANATION,
                "has_adverse_credit_explanation",
                "ApplicantInfo",
                ValueType::String,
                4,
            ),
            question(
                Q_EMPLOYMENT,
                "employment_status",
                "Employment",
                ValueType::String,
                5,
            ),
            question(Q_INCOME, "annual_income", "Income", ValueType::Number, 6),
            Question {
                validation_rules: Some(ValidationRules {
                    min: Some(10_000.0),
                    max: Some(2_000_000.0),
                    ..ValidationRules::default()
                }),
                ..question(
                    Q_LOAN_AMOUNT,
                    "loan_amount_requested",
                    "LoanDetails",
                    ValueType::Number,
                    7,
                )
            },
        ];

        let mut prerequisites = HashMap::new();
        prerequisites.insert(Q_ADVERSE_CREDIT, vec![Q_BANKRUPTCY]);
        prerequisites.insert(Q_ADVERSE_EXPLANATION, vec![Q_ADVERSE_CREDIT]);

        Self {
            summaries,
            product_lenders,
            simple,
            complex,
            questions,
            prerequisites,
        }
    }

    /// Seeded catalog plus a second Southern Cross product, so that
    /// lender's rules arrive once per product when both are in play.
    pub(super) fn seeded_with_southern_pair() -> Self {
        let mut catalog = Self::seeded();
        catalog.summaries.push(ProductSummary {
            product_id: SOUTHERN_PACKAGE,
            product_name: "Southern Cross Package".to_string(),
            lender_id: LenderId(2),
            lender_name: "Southern Cross Lending".to_string(),
            loan_type: "Variable".to_string(),
            min_loan_amount: 40_000.0,
            max_loan_amount: 900_000.0,
            base_rate: 5.99,
            worst_case_rate: 7.55,
        });
        catalog.product_lenders.insert(SOUTHERN_PACKAGE, LenderId(2));
        catalog
    }

    /// Seeded catalog where annual_income additionally depends on
    /// employment_status being answered first.
    pub(super) fn seeded_with_income_prerequisite() -> Self {
        let mut catalog = Self::seeded();
        catalog.prerequisites.insert(Q_INCOME, vec![Q_EMPLOYMENT]);
        catalog
    }

    fn scoped_rules(&self, product: ProductId) -> Result<RuleSet, StoreError> {
        let lender = *self
            .product_lenders
            .get(&product)
            .ok_or(StoreError::ProductNotFound(product.0))?;

        let simple = self
            .simple
            .iter()
            .filter(|rule| match rule.rule_scope {
                RuleScope::Global => true,
                RuleScope::Lender => rule.lender_id == Some(lender),
                RuleScope::Product => rule.product_id == Some(product),
            })
            .cloned()
            .collect();
        let complex = self
            .complex
            .iter()
            .filter(|rule| match rule.rule_scope {
                RuleScope::Global => true,
                RuleScope::Lender => rule.lender_id == Some(lender),
                RuleScope::Product => rule.product_id == Some(product),
            })
            .cloned()
            .collect();

        Ok(RuleSet { simple, complex })
    }
}

#[async_trait]
impl RuleStore for MemoryCatalog {
    async fn rules_for_product(&self, product: ProductId) -> Result<RuleSet, StoreError> {
        self.scoped_rules(product)
    }

    async fn rules_for_products(&self, products: &[ProductId]) -> Result<RuleSet, StoreError> {
        let mut combined = RuleSet::default();
        for product in products {
            let scoped = self.scoped_rules(*product)?;
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
impl QuestionStore for MemoryCatalog {
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

/// Rule store that fails every call, for fail-closed assertions.
pub(super) struct UnavailableRuleStore;

#[async_trait]
impl RuleStore for UnavailableRuleStore {
    async fn rules_for_product(&self, _product: ProductId) -> Result<RuleSet, StoreError> {
        Err(StoreError::Unavailable("catalog offline".to_string()))
    }

    async fn rules_for_products(&self, _products: &[ProductId]) -> Result<RuleSet, StoreError> {
        Err(StoreError::Unavailable("catalog offline".to_string()))
    }

    async fn all_product_ids(&self) -> Result<Vec<ProductId>, StoreError> {
        Err(StoreError::Unavailable("catalog offline".to_string()))
    }

    async fn product_summaries(
        &self,
        _products: &[ProductId],
    ) -> Result<Vec<ProductSummary>, StoreError> {
        Err(StoreError::Unavailable("catalog offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemorySessions {
    sessions: Mutex<HashMap<String, SessionState>>,
}

#[async_trait]
impl SessionStore for MemorySessions {
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

pub(super) fn build_service() -> (
    Arc<QualificationService<MemoryCatalog, MemoryCatalog>>,
    Arc<MemoryCatalog>,
) {
    let catalog = Arc::new(MemoryCatalog::seeded());
    let service = Arc::new(QualificationService::new(
        catalog.clone(),
        catalog.clone(),
        ScoringConfig::default(),
    ));
    (service, catalog)
}

pub(super) fn build_service_with(
    catalog: MemoryCatalog,
) -> Arc<QualificationService<MemoryCatalog, MemoryCatalog>> {
    let catalog = Arc::new(catalog);
    Arc::new(QualificationService::new(
        catalog.clone(),
        catalog,
        ScoringConfig::default(),
    ))
}

pub(super) fn all_products() -> Vec<ProductId> {
    vec![AURORA_VARIABLE, AURORA_JUMBO, SOUTHERN_ESSENTIALS]
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
