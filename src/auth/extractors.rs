use std::marker::PhantomData;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{
    error::AppError, permissions::PermissionCode, state::AppState, users::model::User,
};

/// Identity attached by the `authenticate` middleware; `None` is anonymous.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Any authenticated user.
pub struct Authenticated(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser(Some(user)) => Ok(Self(user)),
            CurrentUser(None) => Err(AppError::AuthenticationRequired),
        }
    }
}

/// An authenticated user whose account is activated.
pub struct Activated(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for Activated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(user) = Authenticated::from_request_parts(parts, state).await?;
        if !user.activated {
            warn!(user_id = user.id, "inactive account");
            return Err(AppError::InactiveAccount);
        }
        Ok(Self(user))
    }
}

/// An activated user holding permission `P`. Handlers taking this can
/// assume both identity and permission are established.
pub struct Permitted<P>(pub User, PhantomData<P>);

impl<P> Permitted<P> {
    pub fn user(&self) -> &User {
        &self.0
    }
}

#[async_trait]
impl<P: PermissionCode> FromRequestParts<AppState> for Permitted<P> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Activated(user) = Activated::from_request_parts(parts, state).await?;
        let permissions = state.permissions.get_all_for_user(user.id).await?;
        if !permissions.include(P::CODE) {
            warn!(
                user_id = user.id,
                permission = P::CODE,
                held = ?permissions.codes(),
                "permission denied"
            );
            return Err(AppError::NotPermitted);
        }
        Ok(Self(user, PhantomData))
    }
}
