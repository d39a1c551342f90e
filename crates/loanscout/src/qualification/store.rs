//! Read contracts for the rule and question reference data. The engine
//! consumes these through narrow traits so adapters (in-memory, SQL,
//! remote) can be swapped without touching the evaluation logic. Timeout
//! and retry belong behind these traits, never inside the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{ComplexRule, ProductId, ProductSummary, Question, QuestionId, SimpleRule};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("product {0} not found")]
    ProductNotFound(i64),
    #[error("question {0} not found")]
    QuestionNotFound(i64),
    #[error("question key '{0}' not found")]
    QuestionKeyNotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The simple and complex rules applicable to a product or product set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub simple: Vec<SimpleRule>,
    pub complex: Vec<ComplexRule>,
}

/// Rule and product reference data reads.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Rules in scope for one product: Global, its lender's, and its own.
    async fn rules_for_product(&self, product: ProductId) -> Result<RuleSet, StoreError>;

    /// Rules in scope for a candidate set: Global, any candidate's
    /// lender's, and any candidate's own. May contain scope-overlapping
    /// duplicates; de-duplication is the caller's concern.
    async fn rules_for_products(&self, products: &[ProductId]) -> Result<RuleSet, StoreError>;

    /// The full baseline product list a fresh session starts from.
    async fn all_product_ids(&self) -> Result<Vec<ProductId>, StoreError>;

    /// Catalog details for the given products, for client display.
    async fn product_summaries(&self, products: &[ProductId])
        -> Result<Vec<ProductSummary>, StoreError>;
}

/// Question reference data reads.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn question_by_id(&self, id: QuestionId) -> Result<Question, StoreError>;

    async fn question_by_key(&self, key: &str) -> Result<Question, StoreError>;

    /// Direct prerequisites of the given question.
    async fn prerequisites_of(&self, id: QuestionId) -> Result<Vec<QuestionId>, StoreError>;

    /// The subset of `ids` that appear as the dependent side of some
    /// dependency edge (questions that have prerequisites of their own).
    async fn dependents_among(&self, ids: &[QuestionId]) -> Result<Vec<QuestionId>, StoreError>;
}

/// Decorator adding a key-to-id cache over any question store.
///
/// The cache is populated lazily and never invalidated: question keys
/// and ids are immutable reference data, so entries stay valid for the
/// life of the process.
pub struct CachedQuestionStore<Q> {
    inner: Arc<Q>,
    key_to_id: Mutex<HashMap<String, QuestionId>>,
}

impl<Q: QuestionStore> CachedQuestionStore<Q> {
    pub fn new(inner: Arc<Q>) -> Self {
        Self {
            inner,
            key_to_id: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a question key to its id, hitting the store only on the
    /// first lookup per key.
    pub async fn question_id_by_key(&self, key: &str) -> Result<QuestionId, StoreError> {
        if let Some(id) = self.cached_id(key) {
            return Ok(id);
        }
        let question = self.inner.question_by_key(key).await?;
        self.remember(&question);
        Ok(question.question_id)
    }

    fn cached_id(&self, key: &str) -> Option<QuestionId> {
        self.key_to_id
            .lock()
            .expect("question cache mutex poisoned")
            .get(key)
            .copied()
    }

    fn remember(&self, question: &Question) {
        self.key_to_id
            .lock()
            .expect("question cache mutex poisoned")
            .insert(question.question_key.clone(), question.question_id);
    }
}

#[async_trait]
impl<Q: QuestionStore> QuestionStore for CachedQuestionStore<Q> {
    async fn question_by_id(&self, id: QuestionId) -> Result<Question, StoreError> {
        let question = self.inner.question_by_id(id).await?;
        self.remember(&question);
        Ok(question)
    }

    async fn question_by_key(&self, key: &str) -> Result<Question, StoreError> {
        let question = self.inner.question_by_key(key).await?;
        self.remember(&question);
        Ok(question)
    }

    async fn prerequisites_of(&self, id: QuestionId) -> Result<Vec<QuestionId>, StoreError> {
        self.inner.prerequisites_of(id).await
    }

    async fn dependents_among(&self, ids: &[QuestionId]) -> Result<Vec<QuestionId>, StoreError> {
        self.inner.dependents_among(ids).await
    }
}
