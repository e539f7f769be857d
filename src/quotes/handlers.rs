use axum::extract::State;
use serde::Deserialize;
use tracing::{info, instrument};

use super::model::{validate_quote, Quote, QuoteFilter, QuoteSort};
use crate::{
    auth::Permitted,
    envelope::Envelope,
    error::AppError,
    extract::{IdParam, JsonBody},
    filters::{Filters, QueryParams},
    permissions::{QuotesRead, QuotesWrite},
    state::AppState,
    validator::Validator,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuoteInput {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuoteInput {
    pub content: Option<String>,
}

#[instrument(skip(state, caller, input))]
pub async fn create(
    State(state): State<AppState>,
    caller: Permitted<QuotesWrite>,
    JsonBody(input): JsonBody<CreateQuoteInput>,
) -> Result<Envelope, AppError> {
    let user = caller.user();
    let mut quote = Quote::new(user.id, user.username.clone(), input.content);

    let mut v = Validator::new();
    validate_quote(&mut v, &quote);
    if !v.valid() {
        return Err(v.into());
    }

    state.quotes.insert(&mut quote).await?;
    info!(quote_id = quote.id, user_id = user.id, "quote created");
    Envelope::created(format!("/v1/quotes/{}", quote.id)).with("quote", &quote)
}

#[instrument(skip(state, _caller))]
pub async fn show(
    State(state): State<AppState>,
    _caller: Permitted<QuotesRead>,
    IdParam(id): IdParam,
) -> Result<Envelope, AppError> {
    let quote = state.quotes.get(id).await?;
    Envelope::ok().with("quote", &quote)
}

#[instrument(skip(state, _caller, query))]
pub async fn list(
    State(state): State<AppState>,
    _caller: Permitted<QuotesRead>,
    query: QueryParams,
) -> Result<Envelope, AppError> {
    let filter = QuoteFilter {
        content: query.string("content", ""),
    };
    let mut v = Validator::new();
    let filters = Filters::<QuoteSort>::from_query(&query, &mut v);
    if !v.valid() {
        return Err(v.into());
    }

    let (quotes, metadata) = state.quotes.get_all(&filter, &filters).await?;
    Envelope::ok()
        .with("quotes", &quotes)?
        .with("@metadata", &metadata)
}

#[instrument(skip(state, caller, input))]
pub async fn update(
    State(state): State<AppState>,
    caller: Permitted<QuotesWrite>,
    IdParam(id): IdParam,
    JsonBody(input): JsonBody<UpdateQuoteInput>,
) -> Result<Envelope, AppError> {
    let mut quote = state.quotes.get(id).await?;
    if let Some(content) = input.content {
        quote.content = content;
    }

    let mut v = Validator::new();
    validate_quote(&mut v, &quote);
    if !v.valid() {
        return Err(v.into());
    }

    state.quotes.update(&quote).await?;
    info!(quote_id = id, by = caller.user().id, "quote updated");
    Envelope::ok().with("quote", &quote)
}

#[instrument(skip(state, caller))]
pub async fn delete(
    State(state): State<AppState>,
    caller: Permitted<QuotesWrite>,
    IdParam(id): IdParam,
) -> Result<Envelope, AppError> {
    state.quotes.delete(id).await?;
    info!(quote_id = id, by = caller.user().id, "quote deleted");
    Ok(Envelope::message("quote successfully deleted"))
}
