// Timed action scheduler: hover early, commit late, verify the response.
//
// Committing a ban or pick is irreversible in-game, so the one hard rule
// here is at-most-one committing call per logical action. A failed or
// unverified commit is dropped, never retried.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::{endpoints, ClientError, SessionClient};
use crate::config::TimingConfig;
use crate::draft::{ActionKind, DraftAction, DraftAnalysis, SessionIdentity};

/// A scheduled-but-not-yet-committed action.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub action_id: i64,
    pub kind: ActionKind,
    pub champion_id: i64,
    /// Commit once the phase timer is at or below this many seconds.
    pub commit_below_secs: u64,
}

type CommitKey = (String, ActionKind, i64);

pub struct ActionScheduler {
    client: Arc<dyn SessionClient>,
    timing: Mutex<TimingConfig>,
    pending: Mutex<HashMap<i64, PendingAction>>,
    committed: Mutex<HashSet<CommitKey>>,
}

impl ActionScheduler {
    pub fn new(client: Arc<dyn SessionClient>, timing: TimingConfig) -> Self {
        Self {
            client,
            timing: Mutex::new(timing),
            pending: Mutex::new(HashMap::new()),
            committed: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_timing(&self, timing: TimingConfig) {
        *self.timing.lock().unwrap() = timing;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Record the intent to drive `action` to `champion_id`. When hovering is
    /// enabled, a non-committing update goes out right away so teammates see
    /// the intent without locking it in.
    pub async fn schedule(
        &self,
        session: &SessionIdentity,
        action: &DraftAction,
        champion_id: i64,
    ) {
        let key = commit_key(session, action.kind, action.id);
        if self.committed.lock().unwrap().contains(&key) {
            return;
        }

        let timing = self.timing.lock().unwrap().clone();
        {
            let mut pending = self.pending.lock().unwrap();
            if pending.contains_key(&action.id) {
                return;
            }
            pending.insert(
                action.id,
                PendingAction {
                    action_id: action.id,
                    kind: action.kind,
                    champion_id,
                    commit_below_secs: timing.commit_below_secs(action.kind),
                },
            );
        }
        debug!(
            action = action.id,
            kind = %action.kind,
            champion = champion_id,
            "scheduled action"
        );

        if timing.hover {
            if let Err(e) = self.hover(action.id, champion_id).await {
                // Hovering is a courtesy preview; losing one is harmless.
                debug!(action = action.id, "hover failed: {}", e);
            }
        }
    }

    /// Issue a non-committing preview update for an action.
    pub async fn hover(&self, action_id: i64, champion_id: i64) -> Result<(), ClientError> {
        self.client
            .patch(
                &endpoints::draft_action(action_id),
                json!({ "championId": champion_id, "completed": false }),
            )
            .await
            .map(|_| ())
    }

    /// One scheduler pass: commit every pending action whose remaining-time
    /// threshold has been crossed.
    pub async fn tick(&self, session: &SessionIdentity, remaining_ms: i64) {
        let due: Vec<PendingAction> = {
            let mut pending = self.pending.lock().unwrap();
            let ids: Vec<i64> = pending
                .values()
                .filter(|p| remaining_ms <= p.commit_below_secs as i64 * 1000)
                .map(|p| p.action_id)
                .collect();
            ids.into_iter().filter_map(|id| pending.remove(&id)).collect()
        };

        for action in due {
            self.commit(session, action.kind, action.action_id, action.champion_id)
                .await;
        }
    }

    /// Issue the committing update for one action and verify it stuck.
    /// Returns whether the response confirmed the commit. Either way the
    /// action is marked committed: a blind retry could double-submit an
    /// irreversible choice.
    pub async fn commit(
        &self,
        session: &SessionIdentity,
        kind: ActionKind,
        action_id: i64,
        champion_id: i64,
    ) -> bool {
        let key = commit_key(session, kind, action_id);
        {
            let mut committed = self.committed.lock().unwrap();
            if !committed.insert(key) {
                debug!(action = action_id, "already committed, skipping");
                return false;
            }
        }
        self.pending.lock().unwrap().remove(&action_id);

        info!(action = action_id, kind = %kind, champion = champion_id, "committing");
        match self
            .client
            .patch(
                &endpoints::draft_action(action_id),
                json!({ "championId": champion_id, "completed": true }),
            )
            .await
        {
            Ok(response) if commit_verified(&response, champion_id) => {
                info!(action = action_id, champion = champion_id, "commit confirmed");
                true
            }
            Ok(response) => {
                warn!(
                    action = action_id,
                    champion = champion_id,
                    response = %response,
                    "commit not confirmed by response, dropping without retry"
                );
                false
            }
            Err(e) => {
                warn!(action = action_id, "commit request failed: {}, not retrying", e);
                false
            }
        }
    }

    /// Forget all pending actions; called when the phase leaves the draft.
    pub fn clear_pending(&self) {
        let mut pending = self.pending.lock().unwrap();
        if !pending.is_empty() {
            debug!(count = pending.len(), "discarding pending actions");
            pending.clear();
        }
    }

    /// Full reset when a new logical session starts.
    pub fn reset_session(&self) {
        self.clear_pending();
        self.committed.lock().unwrap().clear();
    }
}

/// The response is authoritative: either it echoes the committed record, or
/// it carries an explicit success marker for endpoints that omit it.
fn commit_verified(response: &Value, champion_id: i64) -> bool {
    if response.get("success").and_then(|v| v.as_bool()) == Some(true) {
        return true;
    }
    response.get("championId").and_then(|v| v.as_i64()) == Some(champion_id)
        && response.get("completed").and_then(|v| v.as_bool()) == Some(true)
}

/// First preferred champion that is still available in this draft.
pub fn select_preferred(preferences: &[i64], analysis: &DraftAnalysis) -> Option<i64> {
    preferences
        .iter()
        .copied()
        .find(|champion| !analysis.champion_taken(*champion))
}

fn commit_key(session: &SessionIdentity, kind: ActionKind, action_id: i64) -> CommitKey {
    (session.as_str().to_string(), kind, action_id)
}
