use anyhow::Context;
use axum::{extract::State, http::StatusCode};
use tracing::{info, instrument, warn};

use super::{
    dto::{ActivateInput, RegisterInput, UpdatePasswordInput, UpdateUserInput},
    model::{validate_password_plaintext, validate_user, User, UserFilter, UserSort},
    password::Password,
};
use crate::{
    auth::Permitted,
    db::DataError,
    envelope::Envelope,
    error::AppError,
    extract::{IdParam, JsonBody},
    filters::{Filters, QueryParams},
    mailer::welcome_email,
    permissions::{PermissionCode, QuotesRead, UsersRead, UsersWrite},
    state::AppState,
    tokens::model::{validate_token_plaintext, Scope},
    validator::Validator,
};

const DUPLICATE_EMAIL: &str = "a user with this email address already exists";

fn hash(plaintext: &str) -> Result<Password, AppError> {
    Password::from_plaintext(plaintext)
        .context("hash password")
        .map_err(AppError::from)
}

fn duplicate_email_as_field(err: DataError) -> AppError {
    match err {
        DataError::DuplicateEmail => AppError::field("email", DUPLICATE_EMAIL),
        other => other.into(),
    }
}

/// POST /v1/users
#[instrument(skip(state, input))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<Envelope, AppError> {
    let password = hash(&input.password)?;
    let mut user = User::new(input.username, input.email, password);

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    if !v.valid() {
        return Err(v.into());
    }

    state
        .users
        .insert(&mut user)
        .await
        .map_err(duplicate_email_as_field)?;

    state
        .permissions
        .add_for_user(user.id, &[QuotesRead::CODE])
        .await?;

    let token = state
        .tokens
        .new_token(user.id, state.config.activation_token_ttl, Scope::Activation)
        .await?;

    let email = welcome_email(&state.config.mail_sender, &user, &token);
    let mailer = state.mailer.clone();
    state.background.spawn("welcome_email", async move {
        mailer.send(&email).await.context("send welcome email")
    });

    info!(user_id = user.id, "user registered");
    Envelope::new(StatusCode::CREATED).with("user", &user)
}

/// PUT /v1/users/activated
#[instrument(skip(state, input))]
pub async fn activate(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ActivateInput>,
) -> Result<Envelope, AppError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(v.into());
    }

    let mut user = match state
        .tokens
        .user_for_token(Scope::Activation, &input.token)
        .await
    {
        Ok(user) => user,
        Err(DataError::RecordNotFound) => {
            warn!("activation with unknown or expired token");
            return Err(AppError::field("token", "invalid or expired activation token"));
        }
        Err(e) => return Err(e.into()),
    };

    state.users.activate(&mut user).await?;
    state.permissions.add_activated_permissions(user.id).await?;
    state
        .tokens
        .delete_all_for_user(Scope::Activation, user.id)
        .await?;

    info!(user_id = user.id, "user activated");
    Envelope::ok().with("user", &user)
}

/// GET /v1/users/accounts
#[instrument(skip(state, _caller, query))]
pub async fn list(
    State(state): State<AppState>,
    _caller: Permitted<UsersRead>,
    query: QueryParams,
) -> Result<Envelope, AppError> {
    let filter = UserFilter {
        username: query.string("username", ""),
        email: query.string("email", ""),
    };
    let mut v = Validator::new();
    let filters = Filters::<UserSort>::from_query(&query, &mut v);
    if !v.valid() {
        return Err(v.into());
    }

    let (users, metadata) = state.users.get_all(&filter, &filters).await?;
    Envelope::ok()
        .with("users", &users)?
        .with("@metadata", &metadata)
}

/// PATCH /v1/users/update/:id
#[instrument(skip(state, caller, input))]
pub async fn update(
    State(state): State<AppState>,
    caller: Permitted<UsersWrite>,
    IdParam(id): IdParam,
    JsonBody(input): JsonBody<UpdateUserInput>,
) -> Result<Envelope, AppError> {
    let mut user = state.users.get(id).await?;

    if let Some(username) = input.username {
        user.username = username;
    }
    if let Some(email) = input.email {
        user.email = email;
    }
    if let Some(password) = input.password {
        user.password = hash(&password)?;
    }

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    if !v.valid() {
        return Err(v.into());
    }

    state
        .users
        .update(&mut user)
        .await
        .map_err(duplicate_email_as_field)?;

    info!(user_id = user.id, by = caller.user().id, "user updated");
    Envelope::ok().with("user", &user)
}

/// PATCH /v1/users/update-password/:id
#[instrument(skip(state, caller, input))]
pub async fn update_password(
    State(state): State<AppState>,
    caller: Permitted<UsersWrite>,
    IdParam(id): IdParam,
    JsonBody(input): JsonBody<UpdatePasswordInput>,
) -> Result<Envelope, AppError> {
    let mut v = Validator::new();
    validate_password_plaintext(&mut v, "new_password", &input.new_password);
    if !v.valid() {
        return Err(v.into());
    }

    let password = hash(&input.new_password)?;
    state.users.update_password(id, &password).await?;

    info!(user_id = id, by = caller.user().id, "password updated");
    Ok(Envelope::message("password successfully updated"))
}

/// DELETE /v1/users/delete/:id
#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Permitted<UsersWrite>,
    IdParam(id): IdParam,
) -> Result<Envelope, AppError> {
    state.users.delete(id).await?;
    info!(user_id = id, by = caller.user().id, "user deleted");
    Ok(Envelope::message("user successfully deleted"))
}
