//! # API Endpoint Handlers
//!
//! Every engine call is blocking, so handlers move it onto the blocking pool.
//! Reads go through `run_blocking`, bounded by the configured resolve timeout.
//! When the timeout fires the request's `CancelFlag` is set and a running
//! closure stops at its next round.
//!
//! Writes go through `run_write` and are never timed out. The response
//! always reports the committed outcome.

use super::{
    AppState,
    types::{ApiError, HealthResponse, LikeResponse, SearchQuery, VoteResponse},
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use slices_core::primitives::DEFAULT_SAMPLE_SIZE;
use slices_core::{
    CancelFlag, ClosureLimits, GraphResolver, InsertOutcome, Mutator, Slice, SliceError, SliceId,
    SliceStore, Vote,
};
use std::sync::Arc;

type Slices = (StatusCode, Json<Vec<Slice>>);

// =============================================================================
// BLOCKING EXECUTION
// =============================================================================

/// Run `op` against the store on the blocking pool.
async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn SliceStore, ClosureLimits) -> Result<T, SliceError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let cancel = CancelFlag::new();
    let limits = state.resolver.limits(cancel.clone());

    let task = tokio::task::spawn_blocking(move || op(store.as_ref(), limits));

    match tokio::time::timeout(state.resolver.timeout(), task).await {
        Ok(Ok(result)) => result.map_err(ApiError::from),
        Ok(Err(join_error)) => Err(ApiError::Internal(format!(
            "worker failed: {join_error}"
        ))),
        Err(_) => {
            cancel.cancel();
            tracing::warn!(
                timeout_ms = state.resolver.timeout_ms,
                "request timed out, cancelling"
            );
            Err(ApiError::Timeout)
        }
    }
}

/// Run a single-document write on the blocking pool and wait for it to commit.
async fn run_write<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn SliceStore) -> Result<T, SliceError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|join_error| ApiError::Internal(format!("worker failed: {join_error}")))?
        .map_err(ApiError::from)
}

fn parse_id(raw: &str) -> Result<SliceId, ApiError> {
    raw.parse::<SliceId>().map_err(ApiError::from)
}

fn ok(slices: Vec<Slice>) -> Slices {
    (StatusCode::OK, Json(slices))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// READ HANDLERS
// =============================================================================

/// `GET /api/slices`
pub async fn list_handler(State(state): State<AppState>) -> Result<Slices, ApiError> {
    let slices = run_blocking(&state, |store, _| GraphResolver::new(store).all()).await?;
    Ok(ok(slices))
}

/// `GET /api/slices/sample`
pub async fn sample_default_handler(State(state): State<AppState>) -> Result<Slices, ApiError> {
    sample(&state, DEFAULT_SAMPLE_SIZE).await
}

/// `GET /api/slices/sample/{amount}`
pub async fn sample_handler(
    State(state): State<AppState>,
    Path(amount): Path<String>,
) -> Result<Slices, ApiError> {
    let amount = amount
        .trim()
        .parse::<usize>()
        .map_err(|_| ApiError::BadRequest(format!("invalid sample amount: {amount:?}")))?;
    sample(&state, amount).await
}

async fn sample(state: &AppState, amount: usize) -> Result<Slices, ApiError> {
    let slices =
        run_blocking(state, move |store, _| GraphResolver::new(store).sample(amount)).await?;
    Ok(ok(slices))
}

/// `GET /api/slices/withInstances`
pub async fn with_instances_handler(State(state): State<AppState>) -> Result<Slices, ApiError> {
    let slices = run_blocking(&state, |store, _| GraphResolver::new(store).with_instances()).await?;
    Ok(ok(slices))
}

/// `GET /api/slices/withReferences`
pub async fn with_references_handler(State(state): State<AppState>) -> Result<Slices, ApiError> {
    let slices =
        run_blocking(&state, |store, _| GraphResolver::new(store).with_references()).await?;
    Ok(ok(slices))
}

/// `GET /api/slices/withoutReferences`
pub async fn without_references_handler(
    State(state): State<AppState>,
) -> Result<Slices, ApiError> {
    let slices =
        run_blocking(&state, |store, _| GraphResolver::new(store).without_references()).await?;
    Ok(ok(slices))
}

/// `GET /api/slices/liked`
pub async fn liked_handler(State(state): State<AppState>) -> Result<Slices, ApiError> {
    let slices = run_blocking(&state, |store, _| GraphResolver::new(store).liked()).await?;
    Ok(ok(slices))
}

/// `GET /api/slices/{ids}`: closure of one ID or a comma-separated list.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Path(ids): Path<String>,
) -> Result<Slices, ApiError> {
    let seeds = SliceId::parse_list(&ids)?;
    let closure = run_blocking(&state, move |store, limits| {
        GraphResolver::with_limits(store, limits).resolve_closure(&seeds)
    })
    .await?;
    Ok(ok(closure.into_slices()))
}

/// `GET /api/slices/{id}/refs`: the closure without the seed.
pub async fn refs_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Slices, ApiError> {
    let id = parse_id(&id)?;
    let slices = run_blocking(&state, move |store, limits| {
        GraphResolver::with_limits(store, limits).references_only(id)
    })
    .await?;
    Ok(ok(slices))
}

// =============================================================================
// WRITE HANDLERS
// =============================================================================

/// `POST /api/slices`
pub async fn insert_handler(
    State(state): State<AppState>,
    body: Result<Json<Slice>, JsonRejection>,
) -> Result<(StatusCode, Json<Slice>), ApiError> {
    let Json(slice) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let outcome = run_write(&state, move |store| Mutator::new(store).insert(slice)).await?;
    match outcome {
        InsertOutcome::Inserted(slice) => Ok((StatusCode::CREATED, Json(slice))),
        InsertOutcome::Conflict(id) => Err(ApiError::Conflict(id)),
    }
}

/// `POST /api/slices/{id}/upvote`
pub async fn upvote_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VoteResponse>, ApiError> {
    vote(&state, &id, Vote::Up).await
}

/// `POST /api/slices/{id}/downvote`
pub async fn downvote_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VoteResponse>, ApiError> {
    vote(&state, &id, Vote::Down).await
}

async fn vote(state: &AppState, raw_id: &str, vote: Vote) -> Result<Json<VoteResponse>, ApiError> {
    let id = parse_id(raw_id)?;
    let upvotes = run_write(state, move |store| Mutator::new(store).vote(id, vote)).await?;
    Ok(Json(VoteResponse {
        slice_id: id.value(),
        upvotes,
    }))
}

/// `POST /api/slices/{id}/like`
pub async fn like_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>, ApiError> {
    let id = parse_id(&id)?;
    let liked = run_write(&state, move |store| Mutator::new(store).toggle_like(id)).await?;
    Ok(Json(LikeResponse {
        slice_id: id.value(),
        liked,
    }))
}

// =============================================================================
// SEARCH HANDLER
// =============================================================================

/// `GET /api/slices/search/{word}?size=N`: upstream payload passthrough.
pub async fn search_handler(
    State(state): State<AppState>,
    Path(word): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let result = state.search.search(&word, query.size).await?;
    let content_type = result
        .content_type
        .unwrap_or_else(|| "application/json".to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], result.body).into_response())
}
