//! The request pipeline for `POST /v1/chat/completions`.
//!
//! Stage order is strict and observable: authenticate and rate-limit (both
//! middleware) → validate → scrub → fingerprint → exact lookup → semantic
//! lookup with confirming exact lookup → resolve provider → invoke →
//! populate both caches → respond. Metrics are recorded for every outcome
//! once the body has validated (the labels need an owner and a model).

use std::time::Instant;

use axum::{
    Extension, Json,
    extract::State,
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, instrument, warn};

use super::error::GatewayError;
use super::state::AppState;
use crate::api::{ChatRequest, ChatResponse};
use crate::auth::{ApiKeyRecord, KeyStore};
use crate::cache::{CACHE_STATUS_HEADER, CacheStatus, ExactCacheBackend};
use crate::dlp::scrub_request;
use crate::hashing::fingerprint;
use crate::metrics;
use crate::vectordb::VectorIndex;

/// Chat-completions handler.
#[instrument(skip(state, api_key, payload), fields(owner = %api_key.owner, model = tracing::field::Empty))]
pub async fn chat_completions_handler<C, V, K>(
    State(state): State<AppState<C, V, K>>,
    Extension(api_key): Extension<ApiKeyRecord>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response
where
    C: ExactCacheBackend + 'static,
    V: VectorIndex + 'static,
    K: KeyStore + 'static,
{
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return GatewayError::InvalidRequest(format!("Invalid request body: {rejection}"))
                .into_response();
        }
    };

    let request: ChatRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(error) => {
            return GatewayError::InvalidRequest(format!("Invalid request schema: {error}"))
                .into_response();
        }
    };
    if let Err(error) = request.validate() {
        return GatewayError::InvalidRequest(error.to_string()).into_response();
    }
    tracing::Span::current().record("model", tracing::field::display(&request.model));

    let owner = api_key.owner.clone();
    let model = request.model.clone();
    let started = Instant::now();

    let outcome = process_chat(&state, request).await;

    // Deferred accounting: success, error, and cache-hit paths all emit.
    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(error) => error.status_code(),
    };
    metrics::record_request(&owner, &model, status.as_u16(), started.elapsed());

    match outcome {
        Ok((response, cache_status)) => {
            // Cached responses carry their stored usage and are re-counted
            // on every hit.
            metrics::record_token_usage(&owner, &model, &response.usage);

            let mut headers = HeaderMap::new();
            headers.insert(
                CACHE_STATUS_HEADER,
                HeaderValue::from_static(cache_status.as_header_value()),
            );
            (StatusCode::OK, headers, Json(response)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

/// Runs the scrub → cache → provider → populate sequence.
async fn process_chat<C, V, K>(
    state: &AppState<C, V, K>,
    mut request: ChatRequest,
) -> Result<(ChatResponse, CacheStatus), GatewayError>
where
    C: ExactCacheBackend + 'static,
    V: VectorIndex + 'static,
    K: KeyStore + 'static,
{
    // Redact before fingerprinting: the caches are keyed on scrubbed text.
    scrub_request(state.detector.as_ref(), &mut request);

    let fp = fingerprint(&request);

    if let Some(cached) = state.exact_cache.get(&fp).await {
        info!("exact cache hit");
        return Ok((cached, CacheStatus::HitExact));
    }

    let last_user_text = request.last_user_text().map(str::to_owned);

    if let Some(text) = last_user_text.as_deref() {
        match state.semantic_cache.search(text).await {
            Ok(Some(candidate_fp)) => {
                // The vector layer only names a fingerprint; the entry is
                // real only if the exact layer still holds it.
                if let Some(cached) = state.exact_cache.get(&candidate_fp).await {
                    info!("semantic cache hit");
                    return Ok((cached, CacheStatus::HitSemantic));
                }
                debug!("semantic hit pointed at an expired exact entry");
            }
            Ok(None) => {}
            Err(error) => {
                warn!(error = %error, "semantic search failed; continuing as miss");
            }
        }
    }

    let adapter = state.registry.resolve(&request.model)?;
    debug!(
        provider = adapter.provider_name(),
        "cache miss, calling provider"
    );
    let response = adapter.invoke(&request).await?;

    // Population order does not matter and neither write may fail the
    // request; ExactCache::put and the warn below absorb the errors.
    state.exact_cache.put(&fp, &response).await;
    if let Some(text) = last_user_text.as_deref() {
        if let Err(error) = state.semantic_cache.add(&fp, text).await {
            warn!(error = %error, "semantic cache population failed");
        }
    }

    Ok((response, CacheStatus::Miss))
}
