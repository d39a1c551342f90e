use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::domain::AnswerValue;
use super::service::QualificationService;
use super::session::{SessionState, SessionStatus, SessionStore};
use super::store::{QuestionStore, RuleStore, StoreError};
use super::validation::validate_answer;

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> String {
    format!("sess-{:06}", SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// Shared state for the session endpoints.
pub struct SessionApi<R, Q, S> {
    pub service: Arc<QualificationService<R, Q>>,
    pub sessions: Arc<S>,
}

// Derived Clone would demand Clone on the type parameters; the Arcs are
// what actually gets cloned.
impl<R, Q, S> Clone for SessionApi<R, Q, S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

/// Router builder exposing the adaptive interview over HTTP.
pub fn session_router<R, Q, S>(api: SessionApi<R, Q, S>) -> Router
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
    S: SessionStore + 'static,
{
    Router::new()
        .route("/api/v1/sessions", post(create_session::<R, Q, S>))
        .route(
            "/api/v1/sessions/:session_id/next_question",
            get(next_question::<R, Q, S>),
        )
        .route(
            "/api/v1/sessions/:session_id/answers",
            post(submit_answer::<R, Q, S>),
        )
        .route(
            "/api/v1/sessions/:session_id/answers/:question_key",
            patch(change_answer::<R, Q, S>),
        )
        .route(
            "/api/v1/sessions/:session_id/eligible_products",
            get(eligible_products::<R, Q, S>),
        )
        .route(
            "/api/v1/sessions/:session_id/available_questions",
            get(available_questions::<R, Q, S>),
        )
        .with_state(api)
}

#[derive(Debug, Deserialize)]
struct AnswerSubmission {
    question_key: String,
    answer: AnswerValue,
}

#[derive(Debug, Deserialize)]
struct AnswerChange {
    answer: AnswerValue,
}

async fn create_session<R, Q, S>(State(api): State<SessionApi<R, Q, S>>) -> Response
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
    S: SessionStore + 'static,
{
    let products = match api.service.baseline_product_ids().await {
        Ok(products) => products,
        Err(err) => return internal_error(err),
    };

    let mut session = SessionState::new(next_session_id(), products);

    let first_question = match api
        .service
        .select_next_question(&session.potential_product_ids, &session.user_answers, None)
        .await
    {
        Ok(question) => question,
        Err(err) => return internal_error(err),
    };
    if let Some(question) = &first_question {
        session.last_asked_question_group = Some(question.question_group.clone());
    }

    if let Err(err) = api.sessions.create(session.clone()).await {
        return internal_error(err);
    }

    info!(session_id = %session.session_id, "created qualification session");
    let payload = json!({
        "session_id": session.session_id,
        "status": session.status.label(),
        "next_question": first_question,
    });
    (StatusCode::CREATED, axum::Json(payload)).into_response()
}

async fn next_question<R, Q, S>(
    State(api): State<SessionApi<R, Q, S>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
    S: SessionStore + 'static,
{
    let mut session = match load_active_session(api.sessions.as_ref(), &session_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let question = match api
        .service
        .select_next_question(
            &session.potential_product_ids,
            &session.user_answers,
            session.last_asked_question_group.as_deref(),
        )
        .await
    {
        Ok(question) => question,
        Err(err) => return internal_error(err),
    };

    match question {
        Some(question) => {
            session.last_asked_question_group = Some(question.question_group.clone());
            session.touch();
            if let Err(err) = api.sessions.update(session).await {
                return internal_error(err);
            }
            let payload = json!({
                "session_id": session_id,
                "status": SessionStatus::Active.label(),
                "next_question": question,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        // No askable question left: the interview is complete.
        None => {
            session.status = SessionStatus::Completed;
            session.touch();
            if let Err(err) = api.sessions.update(session).await {
                return internal_error(err);
            }
            let payload = json!({
                "session_id": session_id,
                "status": SessionStatus::Completed.label(),
                "next_question": serde_json::Value::Null,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
    }
}

async fn submit_answer<R, Q, S>(
    State(api): State<SessionApi<R, Q, S>>,
    Path(session_id): Path<String>,
    axum::Json(submission): axum::Json<AnswerSubmission>,
) -> Response
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
    S: SessionStore + 'static,
{
    let mut session = match load_active_session(api.sessions.as_ref(), &session_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let question = match api.service.question_by_key(&submission.question_key).await {
        Ok(question) => question,
        Err(StoreError::QuestionKeyNotFound(key)) => {
            return bad_request(format!("unknown question key '{key}'"));
        }
        Err(err) => return internal_error(err),
    };
    if let Err(err) = validate_answer(&question, &submission.answer) {
        return bad_request(err.to_string());
    }

    session
        .user_answers
        .insert(submission.question_key, submission.answer);
    session.potential_product_ids = api
        .service
        .filter_products(&session.potential_product_ids, &session.user_answers)
        .await;
    session.touch();

    let remaining = session.potential_product_ids.len();
    if let Err(err) = api.sessions.update(session).await {
        return internal_error(err);
    }

    let payload = json!({
        "session_id": session_id,
        "remaining_products": remaining,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

async fn change_answer<R, Q, S>(
    State(api): State<SessionApi<R, Q, S>>,
    Path((session_id, question_key)): Path<(String, String)>,
    axum::Json(change): axum::Json<AnswerChange>,
) -> Response
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
    S: SessionStore + 'static,
{
    let mut session = match load_active_session(api.sessions.as_ref(), &session_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    if !session.user_answers.contains_key(&question_key) {
        let payload = json!({
            "error": format!("no answer recorded for '{question_key}'"),
        });
        return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
    }

    let question = match api.service.question_by_key(&question_key).await {
        Ok(question) => question,
        Err(StoreError::QuestionKeyNotFound(key)) => {
            return bad_request(format!("unknown question key '{key}'"));
        }
        Err(err) => return internal_error(err),
    };
    if let Err(err) = validate_answer(&question, &change.answer) {
        return bad_request(err.to_string());
    }

    session.user_answers.insert(question_key, change.answer);

    // A changed answer can bring products back, so re-filter from the
    // full baseline rather than the already-narrowed set.
    let baseline = match api.service.baseline_product_ids().await {
        Ok(products) => products,
        Err(err) => return internal_error(err),
    };
    session.potential_product_ids = api
        .service
        .filter_products(&baseline, &session.user_answers)
        .await;
    session.touch();

    let remaining = session.potential_product_ids.len();
    if let Err(err) = api.sessions.update(session).await {
        return internal_error(err);
    }

    let payload = json!({
        "session_id": session_id,
        "remaining_products": remaining,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

async fn eligible_products<R, Q, S>(
    State(api): State<SessionApi<R, Q, S>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
    S: SessionStore + 'static,
{
    let session = match load_session(api.sessions.as_ref(), &session_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match api
        .service
        .product_summaries(&session.potential_product_ids)
        .await
    {
        Ok(products) => {
            let payload = json!({
                "session_id": session_id,
                "products": products,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => internal_error(err),
    }
}

async fn available_questions<R, Q, S>(
    State(api): State<SessionApi<R, Q, S>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
    S: SessionStore + 'static,
{
    let session = match load_session(api.sessions.as_ref(), &session_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match api
        .service
        .available_questions(
            &session.potential_product_ids,
            &session.user_answers,
            session.last_asked_question_group.as_deref(),
        )
        .await
    {
        Ok(report) => {
            let payload = json!({
                "session_id": session_id,
                "questions": report.questions,
                "candidate_question_ids": report.candidate_question_ids,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => internal_error(err),
    }
}

async fn load_session<S: SessionStore>(
    sessions: &S,
    session_id: &str,
) -> Result<SessionState, Response> {
    match sessions.fetch(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => {
            let payload = json!({
                "error": format!("session '{session_id}' not found"),
            });
            Err((StatusCode::NOT_FOUND, axum::Json(payload)).into_response())
        }
        Err(err) => Err(internal_error(err)),
    }
}

async fn load_active_session<S: SessionStore>(
    sessions: &S,
    session_id: &str,
) -> Result<SessionState, Response> {
    let session = load_session(sessions, session_id).await?;
    if !session.is_active() {
        let payload = json!({
            "error": format!("session '{session_id}' is {}", session.status.label()),
        });
        return Err((StatusCode::BAD_REQUEST, axum::Json(payload)).into_response());
    }
    Ok(session)
}

fn bad_request(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    let payload = json!({ "error": err.to_string() });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
