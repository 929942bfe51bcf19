//! In-memory upstream for pipeline tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::upstream::{Upstream, UpstreamError, UpstreamResult};

/// Canned responses keyed by `path[?k=v&...]`, with a log of every call made
#[derive(Default)]
pub(crate) struct FakeUpstream {
    routes: HashMap<String, Result<Value, u16>>,
    calls: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ok(mut self, key: &str, body: Value) -> Self {
        self.routes.insert(key.to_string(), Ok(body));
        self
    }

    pub(crate) fn fail(mut self, key: &str, status: u16) -> Self {
        self.routes.insert(key.to_string(), Err(status));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn key(path: &str, query: &[(&str, String)]) -> String {
        if query.is_empty() {
            return path.to_string();
        }
        let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}?{}", path, pairs.join("&"))
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> UpstreamResult<Value> {
        let key = Self::key(path, query);
        self.calls.lock().unwrap().push(key.clone());

        match self.routes.get(&key) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(UpstreamError::Status {
                status: *status,
                body: format!("canned failure for {key}"),
            }),
            None => Err(UpstreamError::Status {
                status: 404,
                body: format!("no route for {key}"),
            }),
        }
    }
}
