//! Session state and its persistence contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AnswerMap, ProductId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

/// One applicant's interview in progress: their answers so far and the
/// products not yet eliminated by them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub status: SessionStatus,
    pub user_answers: AnswerMap,
    pub potential_product_ids: Vec<ProductId>,
    pub last_asked_question_group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: String, potential_product_ids: Vec<ProductId>) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            status: SessionStatus::Active,
            user_answers: AnswerMap::new(),
            potential_product_ids,
            last_asked_question_group: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: SessionState) -> Result<(), SessionError>;

    async fn fetch(&self, session_id: &str) -> Result<Option<SessionState>, SessionError>;

    /// Replaces the stored state for the session, by id.
    async fn update(&self, session: SessionState) -> Result<(), SessionError>;
}
