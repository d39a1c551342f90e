//! Adaptive loan-qualification engine.
//!
//! A session starts with every product in the catalog and narrows the
//! set as the applicant answers questions. Simple rules knock a product
//! out when a hard-knockout rule FAILS; complex rules encode the
//! disqualifying condition directly and knock a product out when they
//! PASS. Unanswered questions never eliminate anything: simple rules
//! pass by default and complex rules defer until their related
//! questions are answered.

pub mod domain;
pub mod evaluation;
pub mod prerequisites;
pub mod router;
pub mod scoring;
pub mod service;
pub mod session;
pub mod store;
pub mod validation;

pub use domain::{
    AnswerMap, AnswerValue, ComplexRule, Condition, LenderId, LogicNode, Operator, ProductId,
    ProductSummary, Question, QuestionId, RuleScope, SimpleRule, ValidationRules, ValueType,
};
pub use evaluation::{evaluate_complex_rule, evaluate_rule};
pub use router::{session_router, SessionApi};
pub use scoring::ScoringConfig;
pub use service::{AvailableQuestions, QualificationService, ScoredQuestion};
pub use session::{SessionState, SessionStatus, SessionStore};
pub use store::{CachedQuestionStore, QuestionStore, RuleSet, RuleStore, StoreError};
pub use validation::validate_answer;

#[cfg(test)]
mod tests;
