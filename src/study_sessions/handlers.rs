use axum::extract::State;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::model::{validate_study_session, StudySession, StudySessionFilter, StudySessionSort};
use crate::{
    auth::Permitted,
    envelope::Envelope,
    error::AppError,
    extract::{IdParam, JsonBody},
    filters::{Filters, QueryParams},
    permissions::{StudySessionsRead, StudySessionsWrite},
    state::AppState,
    validator::Validator,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateStudySessionInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStudySessionInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub is_completed: Option<bool>,
}

#[instrument(skip(state, caller, input))]
pub async fn create(
    State(state): State<AppState>,
    caller: Permitted<StudySessionsWrite>,
    JsonBody(input): JsonBody<CreateStudySessionInput>,
) -> Result<Envelope, AppError> {
    let mut v = Validator::new();
    v.check(input.start_time.is_some(), "start_time", "must be provided");
    v.check(input.end_time.is_some(), "end_time", "must be provided");

    let mut session = StudySession {
        id: 0,
        user_id: caller.user().id,
        title: input.title,
        description: input.description,
        subject: input.subject,
        start_time: input.start_time.unwrap_or(OffsetDateTime::UNIX_EPOCH),
        end_time: input.end_time.unwrap_or(OffsetDateTime::UNIX_EPOCH),
        is_completed: input.is_completed,
        created_at: OffsetDateTime::now_utc(),
    };
    validate_study_session(&mut v, &session);
    if !v.valid() {
        return Err(v.into());
    }

    state.study_sessions.insert(&mut session).await?;
    info!(session_id = session.id, user_id = session.user_id, "study session created");
    Envelope::created(format!("/v1/study-sessions/{}", session.id))
        .with("study_session", &session)
}

#[instrument(skip(state, _caller))]
pub async fn show(
    State(state): State<AppState>,
    _caller: Permitted<StudySessionsRead>,
    IdParam(id): IdParam,
) -> Result<Envelope, AppError> {
    let session = state.study_sessions.get(id).await?;
    Envelope::ok().with("study_session", &session)
}

#[instrument(skip(state, _caller, query))]
pub async fn list(
    State(state): State<AppState>,
    _caller: Permitted<StudySessionsRead>,
    query: QueryParams,
) -> Result<Envelope, AppError> {
    let mut v = Validator::new();
    let filter = StudySessionFilter {
        title: query.string("title", ""),
        subject: query.string("subject", ""),
        is_completed: query.bool("is_completed", &mut v),
    };
    let filters = Filters::<StudySessionSort>::from_query(&query, &mut v);
    if !v.valid() {
        return Err(v.into());
    }

    let (sessions, metadata) = state.study_sessions.get_all(&filter, &filters).await?;
    Envelope::ok()
        .with("study_sessions", &sessions)?
        .with("@metadata", &metadata)
}

#[instrument(skip(state, caller, input))]
pub async fn update(
    State(state): State<AppState>,
    caller: Permitted<StudySessionsWrite>,
    IdParam(id): IdParam,
    JsonBody(input): JsonBody<UpdateStudySessionInput>,
) -> Result<Envelope, AppError> {
    let mut session = state.study_sessions.get(id).await?;
    if let Some(title) = input.title {
        session.title = title;
    }
    if let Some(description) = input.description {
        session.description = description;
    }
    if let Some(subject) = input.subject {
        session.subject = subject;
    }
    if let Some(start_time) = input.start_time {
        session.start_time = start_time;
    }
    if let Some(end_time) = input.end_time {
        session.end_time = end_time;
    }
    if let Some(is_completed) = input.is_completed {
        session.is_completed = is_completed;
    }

    let mut v = Validator::new();
    validate_study_session(&mut v, &session);
    if !v.valid() {
        return Err(v.into());
    }

    state.study_sessions.update(&session).await?;
    info!(session_id = id, by = caller.user().id, "study session updated");
    Envelope::ok().with("study_session", &session)
}

#[instrument(skip(state, caller))]
pub async fn delete(
    State(state): State<AppState>,
    caller: Permitted<StudySessionsWrite>,
    IdParam(id): IdParam,
) -> Result<Envelope, AppError> {
    state.study_sessions.delete(id).await?;
    info!(session_id = id, by = caller.user().id, "study session deleted");
    Ok(Envelope::message("study session successfully deleted"))
}
