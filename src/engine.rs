// Supervisor wiring for the automation core.
//
// One task per poller, all owned by this engine and stopped together
// through a single cancellation token. Components are constructed and
// connected here; none of them knows about the others.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{endpoints, ClientError, SessionClient};
use crate::config::{AutomationConfig, SuppressionFlags, TimingConfig};
use crate::draft::{
    analyze_draft_session, resolve_session_identity, ActionKind, SessionIdentity,
};
use crate::events::{AutomationEvent, EventBus};
use crate::monitor::PhaseMonitor;
use crate::phase::GamePhase;
use crate::scheduler::{select_preferred, ActionScheduler};
use crate::suppression::SuppressionController;

pub struct DraftAutomation {
    client: Arc<dyn SessionClient>,
    config: AutomationConfig,
    events: EventBus,
    monitor: Arc<PhaseMonitor>,
    scheduler: Arc<ActionScheduler>,
    suppression: Arc<SuppressionController>,
    session: Mutex<Option<SessionIdentity>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl DraftAutomation {
    pub fn new(client: Arc<dyn SessionClient>, config: AutomationConfig) -> Self {
        let events = EventBus::new();
        let monitor = Arc::new(PhaseMonitor::new(
            client.clone(),
            events.clone(),
            config.auto_accept,
            config.accept_delay_secs,
        ));
        let scheduler = Arc::new(ActionScheduler::new(client.clone(), config.timing.clone()));
        let suppression = Arc::new(SuppressionController::new(
            client.clone(),
            config.suppression.clone(),
        ));
        Self {
            client,
            config,
            events,
            monitor,
            scheduler,
            suppression,
            session: Mutex::new(None),
            cancel: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AutomationEvent> {
        self.events.subscribe()
    }

    pub fn current_phase(&self) -> GamePhase {
        self.monitor.current_phase()
    }

    /// Probe the session service and start all pollers. Returns `false`
    /// when the service is unreachable: monitoring never starts and no
    /// automation runs.
    pub async fn start(self: &Arc<Self>) -> bool {
        if let Err(e) = self.client.get(endpoints::PHASE).await {
            warn!("session service unreachable, not starting: {}", e);
            return false;
        }

        let token = CancellationToken::new();
        {
            let mut guard = self.cancel.lock().unwrap();
            if let Some(previous) = guard.take() {
                previous.cancel();
            }
            *guard = Some(token.clone());
        }

        self.spawn_phase_loop(token.clone());
        self.spawn_ready_check_loop(token.clone());
        self.spawn_draft_loop(token);
        info!("draft automation started");
        true
    }

    /// Cancel all future ticks. In-flight requests are left to finish; their
    /// results are discarded by the cancellation checks in each loop.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().unwrap().take() {
            token.cancel();
            info!("draft automation stopped");
        }
    }

    fn spawn_phase_loop(self: &Arc<Self>, token: CancellationToken) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(engine.config.phase_poll_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let edge = engine.monitor.poll_phase_once().await;
                        if token.is_cancelled() {
                            break;
                        }
                        if let Some((old, new)) = edge {
                            engine.on_phase_edge(old, new).await;
                        }
                    }
                }
            }
        });
    }

    fn spawn_ready_check_loop(self: &Arc<Self>, token: CancellationToken) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(engine.config.ready_check_poll_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let observation = engine.monitor.poll_ready_check_once().await;
                        if token.is_cancelled() {
                            break;
                        }
                        if let Some(obs) = observation {
                            if obs.active {
                                engine.suppression.on_ready_check(obs.declared_time).await;
                            }
                        }
                    }
                }
            }
        });
    }

    fn spawn_draft_loop(self: &Arc<Self>, token: CancellationToken) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(engine.config.draft_poll_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if engine.monitor.current_phase() == GamePhase::ChampSelect {
                            engine.draft_tick(&token).await;
                        }
                    }
                }
            }
        });
    }

    /// Phase edge fan-out: session-scoped state is dropped whenever the
    /// phase leaves the draft flow.
    async fn on_phase_edge(&self, old: GamePhase, new: GamePhase) {
        if old == GamePhase::ChampSelect && new != GamePhase::ChampSelect {
            self.scheduler.clear_pending();
            *self.session.lock().unwrap() = None;
        }
        self.suppression.on_phase_change(new).await;
    }

    /// One full pass over the draft-session document: identity, analysis,
    /// auto-intent, scheduled commits, suppression.
    async fn draft_tick(&self, token: &CancellationToken) {
        let doc = match self.client.get(endpoints::DRAFT_SESSION).await {
            Ok(doc) => doc,
            Err(e) => {
                debug!("draft-session poll failed: {}", e);
                return;
            }
        };
        // The response may have raced a phase change or shutdown; stale
        // observations are discarded, not applied.
        if token.is_cancelled() || self.monitor.current_phase() != GamePhase::ChampSelect {
            return;
        }

        let Some(analysis) = analyze_draft_session(&doc) else {
            debug!("draft-session document not usable this tick");
            return;
        };
        let analysis = Arc::new(analysis);

        let identity = resolve_session_identity(&doc);
        {
            let mut session = self.session.lock().unwrap();
            if session.as_ref() != Some(&identity) {
                if let Some(previous) = session.as_ref() {
                    info!(from = %previous, to = %identity, "draft session changed");
                }
                self.scheduler.reset_session();
                self.suppression.reset_session(&identity);
                *session = Some(identity.clone());
            }
        }

        self.events
            .emit(AutomationEvent::DraftSessionChanged(analysis.clone()));

        if let Some(action) = analysis.current_player_action.as_ref() {
            let (enabled, preferences) = match action.kind {
                ActionKind::Ban => (self.config.auto_ban, &self.config.preferred_bans),
                ActionKind::Pick => (self.config.auto_pick, &self.config.preferred_picks),
            };
            if enabled {
                match select_preferred(preferences, &analysis) {
                    Some(champion) => {
                        self.scheduler.schedule(&identity, action, champion).await;
                    }
                    None => debug!(kind = %action.kind, "no preferred champion available"),
                }
            }
        }

        self.scheduler
            .tick(&identity, analysis.remaining_time_ms)
            .await;
        self.suppression.on_draft_tick(&identity, &analysis).await;
    }

    fn current_session(&self) -> SessionIdentity {
        self.session
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| resolve_session_identity(&Value::Null))
    }

    // ---- command surface -------------------------------------------------

    pub async fn accept_ready_check(&self) -> Result<(), ClientError> {
        self.client
            .post(endpoints::READY_CHECK_ACCEPT, Value::Null)
            .await
            .map(|_| ())
    }

    pub async fn hover(&self, champion_id: i64, action_id: i64) -> Result<(), ClientError> {
        self.scheduler.hover(action_id, champion_id).await
    }

    pub async fn commit_ban(&self, champion_id: i64, action_id: i64) -> bool {
        let session = self.current_session();
        self.scheduler
            .commit(&session, ActionKind::Ban, action_id, champion_id)
            .await
    }

    pub async fn commit_pick(&self, champion_id: i64, action_id: i64) -> bool {
        let session = self.current_session();
        self.scheduler
            .commit(&session, ActionKind::Pick, action_id, champion_id)
            .await
    }

    pub fn configure_suppression(&self, flags: SuppressionFlags) {
        self.suppression.set_flags(flags);
    }

    pub fn configure_timing(&self, timing: TimingConfig) {
        self.scheduler.set_timing(timing);
    }
}

impl Drop for DraftAutomation {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.lock().unwrap().take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::RecordingClient;
    use serde_json::json;

    fn draft_doc(game_id: i64, remaining_ms: i64) -> Value {
        json!({
            "gameId": game_id,
            "localPlayerSeatId": 2,
            "myTeam": [
                { "seatId": 0 }, { "seatId": 1 }, { "seatId": 2 },
                { "seatId": 3 }, { "seatId": 4 }
            ],
            "theirTeam": [
                { "seatId": 5 }, { "seatId": 6 }, { "seatId": 7 },
                { "seatId": 8 }, { "seatId": 9 }
            ],
            "actions": [[{
                "id": 7,
                "actorSeatId": 2,
                "type": "pick",
                "championId": 0,
                "isInProgress": true,
                "completed": false
            }]],
            "timer": { "totalTimeInPhase": 30000, "adjustedTimeLeftInPhase": remaining_ms }
        })
    }

    fn engine_config() -> AutomationConfig {
        AutomationConfig {
            auto_pick: true,
            preferred_picks: vec![103],
            timing: TimingConfig {
                hover: false,
                ban_commit_below_secs: 5,
                pick_commit_below_secs: 5,
            },
            suppression: SuppressionFlags {
                min_interval_ms: 0,
                ..SuppressionFlags::default()
            },
            ..AutomationConfig::default()
        }
    }

    /// Drive the monitor into ChampSelect so draft ticks are applied.
    async fn enter_champ_select(engine: &DraftAutomation, client: &RecordingClient) {
        client.push_get(Ok(json!("ChampSelect")));
        engine.monitor.poll_phase_once().await;
        assert_eq!(engine.current_phase(), GamePhase::ChampSelect);
    }

    #[tokio::test]
    async fn repeated_documents_commit_and_hide_at_most_once() {
        let client = Arc::new(RecordingClient::new());
        client.set_patch_response(json!({ "championId": 103, "completed": true }));
        let engine = Arc::new(DraftAutomation::new(client.clone(), engine_config()));
        let token = CancellationToken::new();
        enter_champ_select(&engine, &client).await;

        for _ in 0..5 {
            client.push_get(Ok(draft_doc(900, 3_000)));
            engine.draft_tick(&token).await;
        }

        assert_eq!(client.patches().len(), 1);
        assert_eq!(client.calls_to("POST", endpoints::WINDOW_MINIMIZE), 1);
    }

    #[tokio::test]
    async fn commit_waits_for_remaining_time_threshold() {
        let client = Arc::new(RecordingClient::new());
        client.set_patch_response(json!({ "championId": 103, "completed": true }));
        let engine = Arc::new(DraftAutomation::new(client.clone(), engine_config()));
        let token = CancellationToken::new();
        enter_champ_select(&engine, &client).await;

        for remaining in [20_000, 15_000, 10_000] {
            client.push_get(Ok(draft_doc(900, remaining)));
            engine.draft_tick(&token).await;
            assert!(client.patches().is_empty(), "fired early at {remaining}ms");
        }

        client.push_get(Ok(draft_doc(900, 4_000)));
        engine.draft_tick(&token).await;
        assert_eq!(client.patches().len(), 1);
    }

    #[tokio::test]
    async fn new_session_identity_resets_dedup_state() {
        let client = Arc::new(RecordingClient::new());
        client.set_patch_response(json!({ "championId": 103, "completed": true }));
        let engine = Arc::new(DraftAutomation::new(client.clone(), engine_config()));
        let token = CancellationToken::new();
        enter_champ_select(&engine, &client).await;

        client.push_get(Ok(draft_doc(900, 3_000)));
        engine.draft_tick(&token).await;
        assert_eq!(client.patches().len(), 1);

        // A fresh draft reuses action id 7; it must be actionable again.
        client.push_get(Ok(draft_doc(901, 3_000)));
        engine.draft_tick(&token).await;
        assert_eq!(client.patches().len(), 2);
        assert_eq!(client.calls_to("POST", endpoints::WINDOW_MINIMIZE), 2);
    }

    #[tokio::test]
    async fn leaving_draft_clears_pending_and_suppression() {
        let client = Arc::new(RecordingClient::new());
        let engine = Arc::new(DraftAutomation::new(client.clone(), engine_config()));
        let token = CancellationToken::new();
        enter_champ_select(&engine, &client).await;

        // Far from the threshold: the action stays pending.
        client.push_get(Ok(draft_doc(900, 25_000)));
        engine.draft_tick(&token).await;
        assert_eq!(engine.scheduler.pending_count(), 1);
        assert_eq!(engine.suppression.handled_count(), 1);

        engine
            .on_phase_edge(GamePhase::ChampSelect, GamePhase::Lobby)
            .await;
        assert_eq!(engine.scheduler.pending_count(), 0);
        assert_eq!(engine.suppression.handled_count(), 0);
        assert!(engine.session.lock().unwrap().is_none());
        assert_eq!(client.calls_to("POST", endpoints::WINDOW_SHOW), 1);
    }

    #[tokio::test]
    async fn malformed_document_skips_the_tick() {
        let client = Arc::new(RecordingClient::new());
        let engine = Arc::new(DraftAutomation::new(client.clone(), engine_config()));
        let token = CancellationToken::new();
        enter_champ_select(&engine, &client).await;

        client.push_get(Ok(json!({ "unexpected": true })));
        engine.draft_tick(&token).await;
        assert!(client.patches().is_empty());
        assert_eq!(engine.scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn start_fails_closed_when_service_unreachable() {
        let client = Arc::new(RecordingClient::new());
        client.push_get(Err(ClientError::Transport {
            path: endpoints::PHASE.into(),
            message: "connection refused".into(),
        }));
        let engine = Arc::new(DraftAutomation::new(client.clone(), engine_config()));

        assert!(!engine.start().await);
        assert!(engine.cancel.lock().unwrap().is_none());
    }
}
