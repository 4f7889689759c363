//! Scripted in-memory gateway shared by the transport tests.

use async_trait::async_trait;
use herald_core::{error::HeraldError, traits::RequestGateway};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Answers `getUpdates` from a script, then idles like an empty long-poll.
/// Every other method succeeds.
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    script: Mutex<VecDeque<Result<Value, HeraldError>>>,
    calls: Mutex<Vec<(String, Option<Value>)>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a successful `getUpdates` batch.
    pub(crate) fn push_batch(&self, updates: Value) {
        self.script.lock().unwrap().push_back(Ok(updates));
    }

    /// Queue a failed `getUpdates` call.
    pub(crate) fn push_error(&self, err: HeraldError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(method, _)| method).collect()
    }

    /// `offset` of every `getUpdates` call so far.
    pub(crate) fn offsets(&self) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter(|(method, _)| method == "getUpdates")
            .filter_map(|(_, params)| params.and_then(|p| p["offset"].as_i64()))
            .collect()
    }
}

#[async_trait]
impl RequestGateway for ScriptedGateway {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, HeraldError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        match method {
            "getUpdates" => {
                let next = self.script.lock().unwrap().pop_front();
                match next {
                    Some(result) => result,
                    None => {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Ok(json!([]))
                    }
                }
            }
            "getMe" => Ok(json!({"id": 1, "is_bot": true, "first_name": "Herald", "username": "herald_bot"})),
            _ => Ok(json!(true)),
        }
    }
}

/// A text update with a leading `/command` entity when `text` starts with `/`.
pub(crate) fn text_update(id: i64, text: &str) -> Value {
    let entities = match text.strip_prefix('/') {
        Some(rest) => {
            let len = rest.split(' ').next().unwrap_or("").len() + 1;
            json!([{"type": "bot_command", "offset": 0, "length": len}])
        }
        None => json!([]),
    };
    json!({
        "update_id": id,
        "message": {
            "message_id": id,
            "chat": {"id": 42, "type": "private"},
            "text": text,
            "entities": entities,
        }
    })
}

/// Poll `check` until it holds or two seconds pass.
pub(crate) async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
