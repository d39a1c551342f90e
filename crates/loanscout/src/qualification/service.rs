//! Orchestration over the stores: eligibility, product filtering,
//! prerequisite resolution, and adaptive question selection.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    AnswerMap, ComplexRule, ProductId, ProductSummary, Question, QuestionId, SimpleRule,
};
use super::evaluation::{evaluate_complex_rule, evaluate_rule};
use super::prerequisites::{credit_history_skip_rules, skipped_by_value_rules, BANKRUPTCY_STATUS};
use super::scoring::{rank_candidates, score_candidate, ScoreInputs, ScoringConfig};
use super::store::{CachedQuestionStore, QuestionStore, RuleSet, RuleStore, StoreError};

/// A candidate question with its selection score, as surfaced by the
/// available-questions report.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableQuestions {
    pub questions: Vec<ScoredQuestion>,
    pub candidate_question_ids: Vec<QuestionId>,
}

pub struct QualificationService<R, Q> {
    rules: Arc<R>,
    questions: CachedQuestionStore<Q>,
    scoring: ScoringConfig,
}

impl<R, Q> QualificationService<R, Q>
where
    R: RuleStore,
    Q: QuestionStore,
{
    pub fn new(rules: Arc<R>, questions: Arc<Q>, scoring: ScoringConfig) -> Self {
        Self {
            rules,
            questions: CachedQuestionStore::new(questions),
            scoring,
        }
    }

    /// Whether the product survives every hard-knockout rule in scope.
    ///
    /// Fails closed: any store error while gathering rules or resolving a
    /// complex rule's question keys marks the product ineligible rather
    /// than letting it through unchecked.
    pub async fn is_product_eligible(&self, product: ProductId, answers: &AnswerMap) -> bool {
        match self.check_product_eligibility(product, answers).await {
            Ok(eligible) => eligible,
            Err(err) => {
                warn!(product_id = product.0, error = %err, "eligibility check failed, treating product as ineligible");
                false
            }
        }
    }

    async fn check_product_eligibility(
        &self,
        product: ProductId,
        answers: &AnswerMap,
    ) -> Result<bool, StoreError> {
        let rule_set = self.rules.rules_for_product(product).await?;

        for rule in &rule_set.simple {
            if rule.is_hard_knockout && !evaluate_rule(rule, answers, true) {
                debug!(
                    product_id = product.0,
                    rule_id = rule.rule_id,
                    attribute = %rule.policy_attribute,
                    "hard knockout simple rule failed"
                );
                return Ok(false);
            }
        }

        for rule in &rule_set.complex {
            if !rule.is_hard_knockout {
                continue;
            }
            let required_keys = self.question_keys(&rule.related_question_ids).await?;
            if evaluate_complex_rule(rule, &required_keys, answers) {
                debug!(
                    product_id = product.0,
                    complex_rule_id = rule.complex_rule_id,
                    "hard knockout complex rule triggered"
                );
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Filters the candidate set down to products still eligible under
    /// the current answers, preserving input order. Checks run
    /// concurrently; an empty input short-circuits.
    pub async fn filter_products(
        &self,
        products: &[ProductId],
        answers: &AnswerMap,
    ) -> Vec<ProductId> {
        if products.is_empty() {
            return Vec::new();
        }

        let checks = products
            .iter()
            .map(|product| self.is_product_eligible(*product, answers));
        let results = join_all(checks).await;

        let remaining: Vec<ProductId> = products
            .iter()
            .zip(results)
            .filter_map(|(product, eligible)| eligible.then_some(*product))
            .collect();

        info!(
            before = products.len(),
            after = remaining.len(),
            "filtered product set"
        );
        remaining
    }

    /// Whether every prerequisite of the question is answered and no
    /// value-based skip rule removes it. Store errors resolve to false so
    /// a flaky lookup holds a question back instead of surfacing it out
    /// of order.
    pub async fn question_prerequisites_met(
        &self,
        question_id: QuestionId,
        answers: &AnswerMap,
    ) -> bool {
        let prerequisites = match self.questions.prerequisites_of(question_id).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(question_id = question_id.0, error = %err, "prerequisite lookup failed");
                return false;
            }
        };

        if prerequisites.is_empty() {
            return true;
        }

        for prerequisite in prerequisites {
            match self.questions.question_by_id(prerequisite).await {
                Ok(question) => {
                    if !answers.contains_key(&question.question_key) {
                        return false;
                    }
                }
                Err(err) => {
                    warn!(question_id = prerequisite.0, error = %err, "prerequisite question lookup failed");
                    return false;
                }
            }
        }

        match self.questions.question_by_id(question_id).await {
            Ok(question) => !skipped_by_value_rules(
                &question.question_key,
                answers,
                credit_history_skip_rules(),
            ),
            Err(err) => {
                warn!(question_id = question_id.0, error = %err, "question lookup failed");
                false
            }
        }
    }

    /// Picks the single best next question for the interview, or `None`
    /// when no askable question remains.
    pub async fn select_next_question(
        &self,
        products: &[ProductId],
        answers: &AnswerMap,
        last_asked_group: Option<&str>,
    ) -> Result<Option<Question>, StoreError> {
        if products.is_empty() {
            return Ok(None);
        }

        let rule_set = self.in_scope_rules(products).await?;
        let candidates = self.candidate_questions(&rule_set, answers).await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let met_flags = join_all(
            candidates
                .iter()
                .map(|question| self.question_prerequisites_met(question.question_id, answers)),
        )
        .await;

        // The first blocked candidate redirects the interview to its
        // first unanswered prerequisite instead of being scored. When it
        // is held back with all prerequisites answered (a value skip),
        // selection falls through to scoring the rest.
        if let Some(blocked) = candidates
            .iter()
            .zip(&met_flags)
            .find_map(|(question, met)| (!met).then_some(question))
        {
            if let Some(prerequisite) = self
                .first_unanswered_prerequisite(blocked.question_id, answers)
                .await?
            {
                debug!(
                    blocked_question = %blocked.question_key,
                    prerequisite = %prerequisite.question_key,
                    "prerequisite overrides question selection"
                );
                return Ok(Some(prerequisite));
            }
        }

        let eligible: Vec<Question> = candidates
            .into_iter()
            .zip(met_flags)
            .filter_map(|(question, met)| met.then_some(question))
            .collect();
        if eligible.is_empty() {
            return Ok(None);
        }

        let mut scored = self
            .score_questions(eligible, &rule_set, last_asked_group)
            .await?;
        rank_candidates(&mut scored, |question| question.display_priority);

        Ok(scored.into_iter().next().map(|(question, _)| question))
    }

    /// The full ranked candidate list, sharing the selector's derivation
    /// and scoring so the report can never disagree with the pick.
    /// Prerequisite filtering is deliberately absent: the report shows
    /// everything still in play.
    pub async fn available_questions(
        &self,
        products: &[ProductId],
        answers: &AnswerMap,
        last_asked_group: Option<&str>,
    ) -> Result<AvailableQuestions, StoreError> {
        if products.is_empty() {
            return Ok(AvailableQuestions {
                questions: Vec::new(),
                candidate_question_ids: Vec::new(),
            });
        }

        let rule_set = self.in_scope_rules(products).await?;
        let candidates = self.candidate_questions(&rule_set, answers).await?;
        let candidate_question_ids: Vec<QuestionId> = candidates
            .iter()
            .map(|question| question.question_id)
            .collect();

        let mut scored = self
            .score_questions(candidates, &rule_set, last_asked_group)
            .await?;
        rank_candidates(&mut scored, |question| question.display_priority);

        Ok(AvailableQuestions {
            questions: scored
                .into_iter()
                .map(|(question, score)| ScoredQuestion {
                    question,
                    score: score.total,
                })
                .collect(),
            candidate_question_ids,
        })
    }

    /// The baseline product list a fresh session starts from.
    pub async fn baseline_product_ids(&self) -> Result<Vec<ProductId>, StoreError> {
        self.rules.all_product_ids().await
    }

    pub async fn product_summaries(
        &self,
        products: &[ProductId],
    ) -> Result<Vec<ProductSummary>, StoreError> {
        self.rules.product_summaries(products).await
    }

    pub async fn question_by_key(&self, key: &str) -> Result<Question, StoreError> {
        self.questions.question_by_key(key).await
    }

    /// Rules in scope for the candidate set, with scope-overlapping
    /// duplicates collapsed first-occurrence-wins: simple rules by their
    /// composite key, complex rules by id.
    async fn in_scope_rules(&self, products: &[ProductId]) -> Result<RuleSet, StoreError> {
        let mut rule_set = self.rules.rules_for_products(products).await?;
        rule_set.simple = dedup_simple_rules(rule_set.simple);
        rule_set.complex = dedup_complex_rules(rule_set.complex);
        Ok(rule_set)
    }

    /// Questions referenced by any in-scope rule that are still
    /// unanswered, in rule order without duplicates.
    async fn candidate_questions(
        &self,
        rule_set: &RuleSet,
        answers: &AnswerMap,
    ) -> Result<Vec<Question>, StoreError> {
        let mut seen = HashSet::new();
        let mut candidate_ids = Vec::new();

        for rule in &rule_set.simple {
            if let Some(question_id) = rule.related_question_id {
                if !answers.contains_key(&rule.policy_attribute) && seen.insert(question_id) {
                    candidate_ids.push(question_id);
                }
            }
        }
        for rule in &rule_set.complex {
            for question_id in &rule.related_question_ids {
                if seen.insert(*question_id) {
                    candidate_ids.push(*question_id);
                }
            }
        }

        let mut candidates = Vec::with_capacity(candidate_ids.len());
        for question_id in candidate_ids {
            let question = self.questions.question_by_id(question_id).await?;
            if !answers.contains_key(&question.question_key) {
                candidates.push(question);
            }
        }
        Ok(candidates)
    }

    async fn score_questions(
        &self,
        candidates: Vec<Question>,
        rule_set: &RuleSet,
        last_asked_group: Option<&str>,
    ) -> Result<Vec<(Question, super::scoring::CandidateScore)>, StoreError> {
        let candidate_ids: Vec<QuestionId> = candidates
            .iter()
            .map(|question| question.question_id)
            .collect();

        // Dependency scoring is an optimisation, not a correctness
        // concern: on lookup failure score without it.
        let dependents: HashSet<QuestionId> =
            match self.questions.dependents_among(&candidate_ids).await {
                Ok(ids) => ids.into_iter().collect(),
                Err(err) => {
                    warn!(error = %err, "dependent lookup failed, scoring without dependency bonus");
                    HashSet::new()
                }
            };
        let unblockers = self.unblocking_candidates(&candidate_ids, &dependents).await;

        let bankruptcy_id = self
            .questions
            .question_id_by_key(BANKRUPTCY_STATUS)
            .await
            .ok();

        let mut scored = Vec::with_capacity(candidates.len());
        for question in candidates {
            let inputs = ScoreInputs {
                question: &question,
                simple_rules: &rule_set.simple,
                complex_rules: &rule_set.complex,
                unblocks_dependent: unblockers.contains(&question.question_id),
                is_bankruptcy_question: bankruptcy_id == Some(question.question_id),
                last_asked_group,
            };
            let score = score_candidate(&inputs, &self.scoring);
            debug!(
                question_key = %question.question_key,
                elimination = score.elimination,
                rate_diff = score.rate_diff,
                dependency = score.dependency,
                flow = score.flow,
                total = score.total,
                "scored candidate question"
            );
            scored.push((question, score));
        }
        Ok(scored)
    }

    /// Candidates that are a prerequisite of some dependent candidate,
    /// so answering them unblocks another question.
    async fn unblocking_candidates(
        &self,
        candidate_ids: &[QuestionId],
        dependents: &HashSet<QuestionId>,
    ) -> HashSet<QuestionId> {
        let mut unblockers = HashSet::new();
        for dependent in dependents {
            match self.questions.prerequisites_of(*dependent).await {
                Ok(prerequisites) => {
                    for prerequisite in prerequisites {
                        if candidate_ids.contains(&prerequisite) {
                            unblockers.insert(prerequisite);
                        }
                    }
                }
                Err(err) => {
                    warn!(question_id = dependent.0, error = %err, "prerequisite lookup failed during scoring");
                }
            }
        }
        unblockers
    }

    async fn first_unanswered_prerequisite(
        &self,
        question_id: QuestionId,
        answers: &AnswerMap,
    ) -> Result<Option<Question>, StoreError> {
        let prerequisites = self.questions.prerequisites_of(question_id).await?;
        for prerequisite in prerequisites {
            let question = self.questions.question_by_id(prerequisite).await?;
            if !answers.contains_key(&question.question_key) {
                return Ok(Some(question));
            }
        }
        Ok(None)
    }

    async fn question_keys(&self, ids: &[QuestionId]) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::with_capacity(ids.len());
        for id in ids {
            keys.push(self.questions.question_by_id(*id).await?.question_key);
        }
        Ok(keys)
    }
}

fn dedup_simple_rules(rules: Vec<SimpleRule>) -> Vec<SimpleRule> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| seen.insert(rule.dedup_key()))
        .collect()
}

// A lender- or global-scoped complex rule arrives once per in-scope
// product; scoring must tally it once.
fn dedup_complex_rules(rules: Vec<ComplexRule>) -> Vec<ComplexRule> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| seen.insert(rule.complex_rule_id))
        .collect()
}
