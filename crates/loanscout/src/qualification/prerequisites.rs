//! Value-based prerequisite overrides.
//!
//! Plain presence checking (every prerequisite answered) is handled by
//! the service; this module holds the declarative skip table layered on
//! top of it for the credit-history flow, so the rule set is data rather
//! than hard-coded branches.

use crate::qualification::domain::AnswerMap;

pub const BANKRUPTCY_STATUS: &str = "bankruptcy_status";
pub const HAS_DEFAULT_OVER_1K: &str = "has_default_over_1k";
pub const HAS_DEFAULT_LAST_6_MONTHS: &str = "has_default_last_6_months";
pub const HAS_RHI_2_LAST_12_MONTHS: &str = "has_rhi_2_last_12_months";
pub const HAS_COURT_WRIT_JUDGEMENT: &str = "has_court_writ_judgement";
pub const HAS_ADVERSE_CREDIT: &str = "has_adverse_credit";
pub const HAS_ADVERSE_CREDIT_EXPLANATION: &str = "has_adverse_credit_explanation";

/// When the governing answer matches the trigger, the affected questions
/// are skipped (their prerequisites count as unmet).
#[derive(Debug, Clone)]
pub struct SkipRule {
    pub governing_key: &'static str,
    pub trigger: SkipTrigger,
    pub affected_keys: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub enum SkipTrigger {
    /// Skip when the governing answer is one of these strings.
    AnswerIn(&'static [&'static str]),
    /// Skip when the governing answer is falsy.
    AnswerFalsy,
}

/// Adverse-credit questions are irrelevant for never-bankrupt and
/// currently-bankrupt applicants, and the explanation question only
/// applies once adverse credit has been reported.
pub fn credit_history_skip_rules() -> &'static [SkipRule] {
    static RULES: &[SkipRule] = &[
        SkipRule {
            governing_key: BANKRUPTCY_STATUS,
            trigger: SkipTrigger::AnswerIn(&["Never", "Current"]),
            affected_keys: &[
                HAS_DEFAULT_OVER_1K,
                HAS_DEFAULT_LAST_6_MONTHS,
                HAS_RHI_2_LAST_12_MONTHS,
                HAS_COURT_WRIT_JUDGEMENT,
                HAS_ADVERSE_CREDIT,
            ],
        },
        SkipRule {
            governing_key: HAS_ADVERSE_CREDIT,
            trigger: SkipTrigger::AnswerFalsy,
            affected_keys: &[HAS_ADVERSE_CREDIT_EXPLANATION],
        },
    ];
    RULES
}

/// Whether the question should be skipped given the current answers. A
/// rule only fires when its governing question has been answered.
pub fn skipped_by_value_rules(
    question_key: &str,
    answers: &AnswerMap,
    rules: &[SkipRule],
) -> bool {
    for rule in rules {
        if !rule.affected_keys.contains(&question_key) {
            continue;
        }
        let Some(governing) = answers.get(rule.governing_key) else {
            continue;
        };
        let triggered = match &rule.trigger {
            SkipTrigger::AnswerIn(values) => governing
                .as_text()
                .is_some_and(|text| values.contains(&text)),
            SkipTrigger::AnswerFalsy => !governing.is_truthy(),
        };
        if triggered {
            return true;
        }
    }
    false
}
