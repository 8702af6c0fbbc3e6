//! Shared doubles for unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::api::{ApiError, ApiRequest, Transport};
use crate::cache::QueryKey;

/// Build an unsigned three-part token around `claims`.
pub fn make_token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

enum Scripted {
    Ready(Result<Value, ApiError>),
    Gated(oneshot::Receiver<Result<Value, ApiError>>),
}

/// Transport that records every request and answers from a queue.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, body: Value) {
        self.push(Scripted::Ready(Ok(body)));
    }

    pub fn push_err(&self, error: ApiError) {
        self.push(Scripted::Ready(Err(error)));
    }

    /// Queue a response that is only delivered once the returned sender fires.
    pub fn push_gated(&self) -> oneshot::Sender<Result<Value, ApiError>> {
        let (tx, rx) = oneshot::channel();
        self.push(Scripted::Gated(rx));
        tx
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, response: Scripted) {
        self.responses.lock().unwrap().push_back(response);
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        async move {
            match next {
                Some(Scripted::Ready(result)) => result,
                Some(Scripted::Gated(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(ApiError::Network("gate dropped".to_string()))),
                None => Err(ApiError::Network("no scripted response".to_string())),
            }
        }
        .boxed()
    }
}

/// Fetcher that resolves with whatever is sent on `rx`. Only the first call
/// gets the gate; later calls fail.
pub fn gated_fetcher(
    rx: oneshot::Receiver<Value>,
) -> impl Fn(QueryKey) -> BoxFuture<'static, Result<Value, ApiError>> + Clone + Send + Sync + 'static
{
    let gate = Arc::new(Mutex::new(Some(rx)));
    move |_key: QueryKey| {
        let rx = gate.lock().unwrap().take();
        async move {
            match rx {
                Some(rx) => rx
                    .await
                    .map_err(|_| ApiError::Network("gate dropped".to_string())),
                None => Err(ApiError::Network("gate already used".to_string())),
            }
        }
        .boxed()
    }
}

/// Wrap a fetcher so every invocation is counted.
pub fn counting_fetcher<F, Fut>(
    calls: Arc<AtomicUsize>,
    inner: F,
) -> impl Fn(QueryKey) -> Fut + Clone + Send + Sync + 'static
where
    F: Fn(QueryKey) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
{
    move |key: QueryKey| {
        calls.fetch_add(1, Ordering::SeqCst);
        inner(key)
    }
}
