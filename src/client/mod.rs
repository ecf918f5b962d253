// Remote session client boundary

mod error;
mod lcu;

pub use error::ClientError;
pub use lcu::LcuClient;

use async_trait::async_trait;
use serde_json::Value;

/// Endpoints consumed by the automation core. Field names and paths match
/// the client's session service; keep them in one place so the components
/// never hardcode a path.
pub mod endpoints {
    pub const PHASE: &str = "/phase";
    pub const READY_CHECK: &str = "/ready-check";
    pub const READY_CHECK_ACCEPT: &str = "/ready-check/accept";
    pub const DRAFT_SESSION: &str = "/draft-session";
    pub const WINDOW_MINIMIZE: &str = "/window/minimize";
    pub const WINDOW_SHOW: &str = "/window/show";

    pub fn draft_action(action_id: i64) -> String {
        format!("/draft-session/actions/{}", action_id)
    }
}

/// Abstract boundary to the locally running client's session service.
///
/// Every call is independently timeoutable and returns a tagged error value
/// rather than panicking; the connection is shared read-only by all pollers.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, ClientError>;
    async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError>;
    async fn patch(&self, path: &str, body: Value) -> Result<Value, ClientError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A recording client for component tests: scripted GET responses,
    //! captured mutations.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub method: &'static str,
        pub path: String,
        pub body: Value,
    }

    #[derive(Default)]
    pub struct RecordingClient {
        get_responses: Mutex<VecDeque<Result<Value, ClientError>>>,
        pub calls: Mutex<Vec<RecordedCall>>,
        pub fail_posts: Mutex<bool>,
        pub patch_response: Mutex<Option<Value>>,
    }

    impl RecordingClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_get(&self, response: Result<Value, ClientError>) {
            self.get_responses.lock().unwrap().push_back(response);
        }

        pub fn set_patch_response(&self, response: Value) {
            *self.patch_response.lock().unwrap() = Some(response);
        }

        pub fn set_fail_posts(&self, fail: bool) {
            *self.fail_posts.lock().unwrap() = fail;
        }

        pub fn calls_to(&self, method: &str, path: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.method == method && c.path == path)
                .count()
        }

        pub fn patches(&self) -> Vec<RecordedCall> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.method == "PATCH")
                .cloned()
                .collect()
        }

        fn record(&self, method: &'static str, path: &str, body: Value) {
            self.calls.lock().unwrap().push(RecordedCall {
                method,
                path: path.to_string(),
                body,
            });
        }
    }

    #[async_trait]
    impl SessionClient for RecordingClient {
        async fn get(&self, path: &str) -> Result<Value, ClientError> {
            self.record("GET", path, Value::Null);
            match self.get_responses.lock().unwrap().pop_front() {
                Some(response) => response,
                None => Err(ClientError::Transport {
                    path: path.to_string(),
                    message: "no scripted response".into(),
                }),
            }
        }

        async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
            self.record("POST", path, body);
            if *self.fail_posts.lock().unwrap() {
                return Err(ClientError::Transport {
                    path: path.to_string(),
                    message: "simulated failure".into(),
                });
            }
            Ok(Value::Null)
        }

        async fn patch(&self, path: &str, body: Value) -> Result<Value, ClientError> {
            self.record("PATCH", path, body.clone());
            let scripted = self.patch_response.lock().unwrap().clone();
            Ok(scripted.unwrap_or(body))
        }
    }
}
