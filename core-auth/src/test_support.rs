//! Scripted HTTP backend shared by the unit tests.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use std::sync::Mutex;
use std::time::Duration;

type Handler = dyn Fn(&HttpRequest) -> BridgeResult<HttpResponse> + Send + Sync;

/// Answers every request with `handler` and records what was sent.
pub(crate) struct ScriptedHttpClient {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
    refresh_delay: Option<Duration>,
}

impl ScriptedHttpClient {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> BridgeResult<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            refresh_delay: None,
        }
    }

    /// Hold refresh calls for `delay` so concurrent callers pile up behind them.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.url == url)
            .count()
    }
}

#[async_trait::async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.refresh_delay {
            if request.url.contains("/token/refresh/") {
                tokio::time::sleep(delay).await;
            }
        }

        (self.handler)(&request)
    }
}

pub(crate) fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, serde_json::to_vec(&body).unwrap())
}
