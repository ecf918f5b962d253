// Window pop-up suppression.
//
// Hides the client window once per notable event (ready check popped, our
// draft action started) and restores it when the pre-match flow returns to
// a neutral phase. Repeated window-call failures trip a circuit breaker
// that restores the window and disables the controller for a cooldown, so a
// misbehaving loop can never leave the user staring at a hidden client.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{endpoints, SessionClient};
use crate::config::SuppressionFlags;
use crate::draft::{ready_check_identity, DraftAnalysis, SessionIdentity};
use crate::phase::GamePhase;

const READY_CHECK_KIND: &str = "ready-check";

#[derive(Default)]
struct SuppressionState {
    session: Option<SessionIdentity>,
    /// `(sessionId, kind, actionId)` keys already acted on.
    handled: HashSet<(String, &'static str, i64)>,
    hidden: bool,
    consecutive_failures: u32,
    disabled_until: Option<Instant>,
    last_window_call: Option<Instant>,
}

pub struct SuppressionController {
    client: Arc<dyn SessionClient>,
    flags: Mutex<SuppressionFlags>,
    state: Mutex<SuppressionState>,
}

impl SuppressionController {
    pub fn new(client: Arc<dyn SessionClient>, flags: SuppressionFlags) -> Self {
        Self {
            client,
            flags: Mutex::new(flags),
            state: Mutex::new(SuppressionState::default()),
        }
    }

    pub fn set_flags(&self, flags: SuppressionFlags) {
        *self.flags.lock().unwrap() = flags;
    }

    /// Whether the breaker currently holds the controller disabled.
    pub fn is_disabled(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        Self::recover_if_cooled_down(&mut state);
        state.disabled_until.is_some()
    }

    pub fn handled_count(&self) -> usize {
        self.state.lock().unwrap().handled.len()
    }

    /// A new logical draft session started: previous dedup keys no longer
    /// apply.
    pub fn reset_session(&self, session: &SessionIdentity) {
        let mut state = self.state.lock().unwrap();
        if state.session.as_ref() != Some(session) {
            debug!(session = %session, "suppression state reset for new session");
            state.session = Some(session.clone());
            state.handled.clear();
        }
    }

    /// Phase edge handling: leaving the draft flow drops all dedup state;
    /// reaching a neutral phase additionally restores the window.
    pub async fn on_phase_change(&self, phase: GamePhase) {
        let must_restore = {
            let mut state = self.state.lock().unwrap();
            if !phase.in_draft_flow() {
                state.handled.clear();
                state.session = None;
            }
            phase.is_neutral() && state.hidden
        };

        if must_restore {
            self.show_window().await;
        }
    }

    /// Ready-check tick: hide once per distinct ready check, identified by
    /// its declared time.
    pub async fn on_ready_check(&self, declared_time: i64) {
        let enabled = self.flags.lock().unwrap().on_ready_check;
        if !enabled {
            return;
        }
        let identity = ready_check_identity(declared_time);
        let key = (identity.as_str().to_string(), READY_CHECK_KIND, 0);
        if self.state.lock().unwrap().handled.contains(&key) {
            return;
        }

        if self.hide_window().await {
            info!(%identity, "window hidden for ready check");
            self.state.lock().unwrap().handled.insert(key);
        }
    }

    /// Draft tick: hide once when the local player's own action becomes
    /// actionable.
    pub async fn on_draft_tick(&self, session: &SessionIdentity, analysis: &DraftAnalysis) {
        let enabled = self.flags.lock().unwrap().on_draft;
        if !enabled {
            return;
        }
        let Some(action) = analysis.current_player_action.as_ref() else {
            return;
        };
        let key = (session.as_str().to_string(), action.kind.as_str(), action.id);
        if self.state.lock().unwrap().handled.contains(&key) {
            return;
        }

        if self.hide_window().await {
            info!(action = action.id, kind = %action.kind, "window hidden for draft action");
            self.state.lock().unwrap().handled.insert(key);
        }
    }

    /// Attempt to hide the window. Returns whether the call was actually
    /// issued and succeeded; a throttled or breaker-disabled attempt returns
    /// false so the caller leaves the event unhandled and retries next tick.
    async fn hide_window(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            Self::recover_if_cooled_down(&mut state);
            if state.disabled_until.is_some() {
                return false;
            }
            let min_interval = Duration::from_millis(self.flags.lock().unwrap().min_interval_ms);
            if let Some(last) = state.last_window_call {
                if last.elapsed() < min_interval {
                    debug!("window call throttled");
                    return false;
                }
            }
            state.last_window_call = Some(Instant::now());
        }

        match self.client.post(endpoints::WINDOW_MINIMIZE, Value::Null).await {
            Ok(_) => {
                let mut state = self.state.lock().unwrap();
                state.hidden = true;
                state.consecutive_failures = 0;
                true
            }
            Err(e) => {
                warn!("window minimize failed: {}", e);
                self.record_failure().await;
                false
            }
        }
    }

    /// Restore the window. Restoration is the safe default, so it is never
    /// throttled; failures still feed the breaker.
    async fn show_window(&self) -> bool {
        match self.client.post(endpoints::WINDOW_SHOW, Value::Null).await {
            Ok(_) => {
                let mut state = self.state.lock().unwrap();
                state.hidden = false;
                state.consecutive_failures = 0;
                state.last_window_call = Some(Instant::now());
                true
            }
            Err(e) => {
                warn!("window restore failed: {}", e);
                self.record_failure().await;
                false
            }
        }
    }

    async fn record_failure(&self) {
        let tripped = {
            let mut state = self.state.lock().unwrap();
            if state.disabled_until.is_some() {
                return;
            }
            state.consecutive_failures += 1;
            let threshold = self.flags.lock().unwrap().failure_threshold;
            if state.consecutive_failures >= threshold {
                let cooldown =
                    Duration::from_secs(self.flags.lock().unwrap().cooldown_secs);
                state.disabled_until = Some(Instant::now() + cooldown);
                state.hidden = false;
                true
            } else {
                false
            }
        };

        if tripped {
            warn!("suppression disabled after repeated window failures, restoring window");
            // Best-effort forced restore; the breaker is already tripped, so
            // a failure here is only logged.
            if let Err(e) = self.client.post(endpoints::WINDOW_SHOW, Value::Null).await {
                warn!("forced window restore failed: {}", e);
            }
        }
    }

    fn recover_if_cooled_down(state: &mut SuppressionState) {
        if let Some(until) = state.disabled_until {
            if Instant::now() >= until {
                info!("suppression cooldown elapsed, re-enabling");
                state.disabled_until = None;
                state.consecutive_failures = 0;
            }
        }
    }
}
