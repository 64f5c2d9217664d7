//! API-key authentication.
//!
//! Clients present a plaintext key in `X-API-Key`; the store holds only the
//! SHA-256 digest. Lookup failures, unknown keys, and deactivated rows all
//! produce the same 401 body so callers cannot enumerate key material.

pub mod error;
pub mod store;

pub use error::KeyStoreError;
#[cfg(any(test, feature = "mock"))]
pub use store::MockKeyStore;
pub use store::{ApiKeyRecord, KeyStore, SqliteKeyStore};

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use rand::RngCore;
use tracing::warn;

use crate::hashing::hash_api_key;

/// Header carrying the plaintext API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Uniform diagnostic for every authentication failure.
pub const INVALID_KEY_DETAIL: &str = "Invalid or inactive API key";

/// Generates a fresh plaintext key: `sk-` + 32 random url-safe base64 bytes.
///
/// The caller is responsible for showing this exactly once and persisting
/// only [`hash_api_key`] of it.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!(
        "sk-{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    )
}

/// Authentication middleware.
///
/// Terminal on failure: the pipeline does not run without a resolved key.
/// On success the [`ApiKeyRecord`] is attached to request extensions so the
/// handler can read `owner` without a second lookup.
pub async fn require_api_key<K>(
    State(store): State<Arc<K>>,
    mut request: Request,
    next: Next,
) -> Response
where
    K: KeyStore + 'static,
{
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let Some(plaintext) = presented else {
        return unauthorized();
    };

    match store.find_by_hash(&hash_api_key(plaintext)).await {
        Ok(Some(record)) if record.is_active => {
            request.extensions_mut().insert(record);
            next.run(request).await
        }
        Ok(_) => unauthorized(),
        Err(error) => {
            // Fail closed: a broken store must not admit anyone.
            warn!(error = %error, "key store lookup failed");
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "detail": INVALID_KEY_DETAIL })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, Router, body::Body, http::Request as HttpRequest, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn whoami(Extension(record): Extension<ApiKeyRecord>) -> String {
        record.owner
    }

    fn router(store: Arc<MockKeyStore>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(axum::middleware::from_fn_with_state(
                store,
                require_api_key::<MockKeyStore>,
            ))
    }

    async fn send(router: Router, key: Option<&str>) -> (StatusCode, String) {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[test]
    fn test_generate_api_key_shape() {
        let key = generate_api_key();
        assert!(key.starts_with("sk-"));
        // 32 bytes → 43 unpadded url-safe base64 chars.
        assert_eq!(key.len(), 3 + 43);
        assert!(
            key[3..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(key, generate_api_key());
    }

    #[tokio::test]
    async fn test_valid_key_passes_and_attaches_record() {
        let store = Arc::new(MockKeyStore::new());
        store.insert_active("sk-good", "alice");

        let (status, body) = send(router(store), Some("sk-good")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice");
    }

    #[tokio::test]
    async fn test_missing_key_rejected() {
        let store = Arc::new(MockKeyStore::new());
        let (status, body) = send(router(store), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains(INVALID_KEY_DETAIL));
    }

    #[tokio::test]
    async fn test_unknown_key_rejected() {
        let store = Arc::new(MockKeyStore::new());
        store.insert_active("sk-good", "alice");

        let (status, body) = send(router(store), Some("sk-wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains(INVALID_KEY_DETAIL));
    }

    #[tokio::test]
    async fn test_inactive_key_rejected() {
        let store = Arc::new(MockKeyStore::new());
        store.insert_inactive("sk-retired", "alice");

        let (status, _) = send(router(store), Some("sk-retired")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_store_error_fails_closed() {
        let store = Arc::new(MockKeyStore::new());
        store.insert_active("sk-good", "alice");
        store.fail_lookups();

        let (status, _) = send(router(store), Some("sk-good")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_empty_header_rejected() {
        let store = Arc::new(MockKeyStore::new());
        let (status, _) = send(router(store), Some("  ")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
