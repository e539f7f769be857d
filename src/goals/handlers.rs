use axum::extract::State;
use serde::Deserialize;
use time::{OffsetDateTime, UtcOffset};
use tracing::{info, instrument};

use super::model::{validate_goal, Goal, GoalFilter, GoalSort};
use crate::{
    auth::Permitted,
    envelope::Envelope,
    error::AppError,
    extract::{IdParam, JsonBody},
    filters::{Filters, QueryParams},
    permissions::{GoalsRead, GoalsWrite},
    state::AppState,
    validator::Validator,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGoalInput {
    #[serde(default)]
    pub goal_text: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub target_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateGoalInput {
    pub goal_text: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub target_date: Option<OffsetDateTime>,
    pub is_completed: Option<bool>,
}

#[instrument(skip(state, caller, input))]
pub async fn create(
    State(state): State<AppState>,
    caller: Permitted<GoalsWrite>,
    JsonBody(input): JsonBody<CreateGoalInput>,
) -> Result<Envelope, AppError> {
    let mut v = Validator::new();
    v.check(input.target_date.is_some(), "target_date", "must be provided");

    let mut goal = Goal::new(
        caller.user().id,
        input.goal_text,
        input.target_date.unwrap_or(OffsetDateTime::UNIX_EPOCH),
        input.is_completed,
    );
    validate_goal(&mut v, &goal);
    if !v.valid() {
        return Err(v.into());
    }

    state.goals.insert(&mut goal).await?;
    info!(goal_id = goal.id, user_id = goal.user_id, "goal created");
    Envelope::created(format!("/v1/goals/{}", goal.id)).with("goal", &goal)
}

#[instrument(skip(state, _caller))]
pub async fn show(
    State(state): State<AppState>,
    _caller: Permitted<GoalsRead>,
    IdParam(id): IdParam,
) -> Result<Envelope, AppError> {
    let goal = state.goals.get(id).await?;
    Envelope::ok().with("goal", &goal)
}

#[instrument(skip(state, _caller, query))]
pub async fn list(
    State(state): State<AppState>,
    _caller: Permitted<GoalsRead>,
    query: QueryParams,
) -> Result<Envelope, AppError> {
    let mut v = Validator::new();
    let filter = GoalFilter {
        goal_text: query.string("goal_text", ""),
        is_completed: query.bool("is_completed", &mut v),
        target_date: query.date("target_date", &mut v),
    };
    let filters = Filters::<GoalSort>::from_query(&query, &mut v);
    if !v.valid() {
        return Err(v.into());
    }

    let (goals, metadata) = state.goals.get_all(&filter, &filters).await?;
    Envelope::ok()
        .with("goals", &goals)?
        .with("@metadata", &metadata)
}

#[instrument(skip(state, caller, input))]
pub async fn update(
    State(state): State<AppState>,
    caller: Permitted<GoalsWrite>,
    IdParam(id): IdParam,
    JsonBody(input): JsonBody<UpdateGoalInput>,
) -> Result<Envelope, AppError> {
    let mut goal = state.goals.get(id).await?;
    if let Some(goal_text) = input.goal_text {
        goal.goal_text = goal_text;
    }
    if let Some(target_date) = input.target_date {
        goal.target_date = target_date.to_offset(UtcOffset::UTC);
    }
    if let Some(is_completed) = input.is_completed {
        goal.is_completed = is_completed;
    }

    let mut v = Validator::new();
    validate_goal(&mut v, &goal);
    if !v.valid() {
        return Err(v.into());
    }

    state.goals.update(&goal).await?;
    info!(goal_id = id, by = caller.user().id, "goal updated");
    Envelope::ok().with("goal", &goal)
}

#[instrument(skip(state, caller))]
pub async fn delete(
    State(state): State<AppState>,
    caller: Permitted<GoalsWrite>,
    IdParam(id): IdParam,
) -> Result<Envelope, AppError> {
    state.goals.delete(id).await?;
    info!(goal_id = id, by = caller.user().id, "goal deleted");
    Ok(Envelope::message("goal successfully deleted"))
}
