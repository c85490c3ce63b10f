//! HTTP transport: `POST /` to deliver an envelope, `GET /{key}` to poll a
//! retrieval.
//!
//! The GET surface keeps a cache of in-flight and completed retrievals so
//! repeated polls against the same key share one underlying lookup instead
//! of starting a fresh one each time; `Cache-Control: no-cache` forces a
//! fresh lookup regardless. Cache entries with no read in the last five
//! minutes are swept away on a timer, mirroring the reference
//! implementation's `_sweep_and_clean_cache`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use drogulus_types::{Envelope, Identifier, SignedItem};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex;

use crate::transport::MessageSink;

/// How long a cached GET lookup survives without being polled again.
pub const CACHE_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// A boxed, cloneable future resolving to a retrieved item.
///
/// `Shared` lets every poller of the same in-flight key await the same
/// underlying lookup rather than each starting a new one.
pub type RetrieveFuture = Shared<BoxFuture<'static, std::result::Result<SignedItem, String>>>;

/// Something that can start a `FIND_VALUE` lookup for a key. Implemented
/// by `drogulus_dht::Node` in the binary that wires this transport up; kept
/// abstract here so `drogulus-transport` does not depend on `drogulus-dht`.
pub trait ValueSource: Send + Sync {
    fn retrieve(&self, key: Identifier) -> RetrieveFuture;
}

struct CacheEntry {
    future: RetrieveFuture,
    last_access: Instant,
}

/// Bridges the HTTP surface to a [`ValueSource`] and a [`MessageSink`].
pub struct HttpConnector {
    source: Arc<dyn ValueSource>,
    sink: Arc<dyn MessageSink>,
    cache: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl HttpConnector {
    pub fn new(source: Arc<dyn ValueSource>, sink: Arc<dyn MessageSink>) -> Arc<Self> {
        let connector = Arc::new(HttpConnector {
            source,
            sink,
            cache: Arc::new(Mutex::new(HashMap::new())),
        });
        connector.clone().spawn_sweeper();
        connector
    }

    fn spawn_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CACHE_EXPIRY);
            loop {
                interval.tick().await;
                let now = Instant::now();
                let mut cache = self.cache.lock().await;
                cache.retain(|_, entry| now.duration_since(entry.last_access) < CACHE_EXPIRY);
            }
        });
    }

    /// Poll (or start) a retrieval for `key`, returning the JSON body the
    /// HTTP surface exposes: `{key, status, value?, error?}`.
    async fn get(&self, key: &str, forced: bool) -> serde_json::Value {
        let future = {
            let mut cache = self.cache.lock().await;
            if forced {
                cache.remove(key);
            }
            if let Some(entry) = cache.get_mut(key) {
                entry.last_access = Instant::now();
                entry.future.clone()
            } else {
                let Ok(id) = key.parse::<Identifier>() else {
                    return serde_json::json!({"key": key, "status": "error", "error": true});
                };
                let future = self.source.retrieve(id);
                cache.insert(
                    key.to_string(),
                    CacheEntry {
                        future: future.clone(),
                        last_access: Instant::now(),
                    },
                );
                future
            }
        };

        if future.peek().is_none() {
            return serde_json::json!({"key": key, "status": "pending"});
        }
        match future.await {
            Ok(item) => serde_json::json!({"key": key, "status": "done", "value": item}),
            Err(_) => serde_json::json!({"key": key, "status": "done", "error": true}),
        }
    }
}

async fn post_envelope(
    State(connector): State<Arc<HttpConnector>>,
    headers: HeaderMap,
    Json(envelope): Json<Envelope>,
) -> StatusCode {
    let sender_addr = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    connector.sink.receive(envelope, &sender_addr).await;
    StatusCode::OK
}

async fn get_key(
    State(connector): State<Arc<HttpConnector>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> std::result::Result<Json<serde_json::Value>, StatusCode> {
    let key = key.to_lowercase();
    let is_valid = key.len() == 128 && key.chars().all(|c| c.is_ascii_hexdigit());
    if !is_valid {
        return Err(StatusCode::BAD_REQUEST);
    }
    let forced = headers
        .get("cache-control")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("no-cache"))
        .unwrap_or(false);
    Ok(Json(connector.get(&key, forced).await))
}

/// Build the axum router exposing `POST /` and `GET /{key}`.
pub fn router(connector: Arc<HttpConnector>) -> Router {
    Router::new()
        .route("/", post(post_envelope))
        .route("/:key", get(get_key))
        .with_state(connector)
}

#[async_trait]
impl MessageSink for HttpConnector {
    async fn receive(&self, envelope: Envelope, sender_addr: &str) {
        self.sink.receive(envelope, sender_addr).await;
    }
}
