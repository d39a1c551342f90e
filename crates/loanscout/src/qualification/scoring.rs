//! Candidate question scoring, shared between the next-question selector
//! and the available-questions reporter so the two can never drift.

use serde::Serialize;

use crate::qualification::domain::{ComplexRule, Question, SimpleRule};

/// Weights and flow configuration for candidate scoring. Overridable
/// through the environment (see the config module).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub weight_elimination: f64,
    pub weight_rate_diff: f64,
    pub weight_flow: f64,
    pub weight_dependency: f64,
    /// Rule categories that influence the offered rate; answering their
    /// questions differentiates products, not just eliminates them.
    pub rate_influencing_categories: Vec<String>,
    /// Preferred topical progression through the interview.
    pub question_group_order: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_elimination: 0.2,
            weight_rate_diff: 0.4,
            weight_flow: 0.4,
            weight_dependency: 3.0,
            rate_influencing_categories: [
                "CreditScore",
                "LVR",
                "LoanPurpose",
                "SecurityValue",
                "IncomeVerification",
                "Income",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            question_group_order: [
                "ApplicantInfo",
                "Employment",
                "Income",
                "Expenses",
                "Assets",
                "Liabilities",
                "LoanDetails",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Flat bonus that forces the bankruptcy question to the front of the
/// interview whenever it is a candidate.
pub const BANKRUPTCY_PRIORITY_BONUS: f64 = 100.0;

/// Everything the shared scoring routine needs about one candidate.
pub(crate) struct ScoreInputs<'a> {
    pub question: &'a Question,
    pub simple_rules: &'a [SimpleRule],
    pub complex_rules: &'a [ComplexRule],
    /// True when another in-scope candidate lists this question as a
    /// prerequisite, so answering it unblocks that candidate.
    pub unblocks_dependent: bool,
    pub is_bankruptcy_question: bool,
    pub last_asked_group: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateScore {
    pub elimination: f64,
    pub rate_diff: f64,
    pub dependency: f64,
    pub flow: f64,
    pub total: f64,
}

pub(crate) fn score_candidate(inputs: &ScoreInputs<'_>, config: &ScoringConfig) -> CandidateScore {
    let question_id = inputs.question.question_id;

    let mut elimination = 0.0;
    let mut rate_diff = 0.0;

    let mut tally = |is_hard_knockout: bool, category: Option<&String>| {
        elimination += if is_hard_knockout { 2.0 } else { 1.0 };
        if category.is_some_and(|category| config.rate_influencing_categories.contains(category)) {
            rate_diff = 1.0;
        }
    };

    for rule in inputs.simple_rules {
        if rule.related_question_id == Some(question_id) {
            tally(rule.is_hard_knockout, rule.policy_category.as_ref());
        }
    }
    for rule in inputs.complex_rules {
        if rule.related_question_ids.contains(&question_id) {
            tally(rule.is_hard_knockout, rule.policy_category.as_ref());
        }
    }

    if inputs.is_bankruptcy_question {
        elimination += BANKRUPTCY_PRIORITY_BONUS;
    }

    let dependency = if inputs.unblocks_dependent { 1.0 } else { 0.0 };
    let flow = flow_score(inputs.question, inputs.last_asked_group, config);

    let total = elimination * config.weight_elimination
        + rate_diff * config.weight_rate_diff
        + flow * config.weight_flow
        + dependency * config.weight_dependency;

    CandidateScore {
        elimination,
        rate_diff,
        dependency,
        flow,
        total,
    }
}

fn flow_score(question: &Question, last_asked_group: Option<&str>, config: &ScoringConfig) -> f64 {
    let priority = question.display_priority.max(1);
    let mut score = (1.0 / f64::from(priority)) * 0.1;

    let current_index = group_index(&config.question_group_order, &question.question_group);
    let last_index =
        last_asked_group.and_then(|group| group_index(&config.question_group_order, group));

    match (last_asked_group, last_index) {
        // Nothing asked yet, or the last group is outside the configured
        // ordering: small flat bonus.
        (None, _) | (Some(_), None) => score += 0.1,
        (Some(last_group), Some(last)) => {
            if question.question_group == last_group {
                score += 1.0;
            } else if current_index == Some(last + 1) {
                score += 0.5;
            }
        }
    }

    score
}

fn group_index(order: &[String], group: &str) -> Option<usize> {
    order.iter().position(|entry| entry == group)
}

/// Ranking helper: score descending, then display priority ascending.
pub(crate) fn rank_candidates<T>(
    candidates: &mut Vec<(T, CandidateScore)>,
    priority_of: impl Fn(&T) -> u32,
) {
    candidates.sort_by(|(a, score_a), (b, score_b)| {
        score_b
            .total
            .total_cmp(&score_a.total)
            .then_with(|| priority_of(a).cmp(&priority_of(b)))
    });
}
