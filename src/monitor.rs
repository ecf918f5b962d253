// Phase and ready-check polling.
//
// Two independent observers: a coarse gameflow-phase poll and a fine
// ready-check poll that only runs while the phase is ReadyCheck. Both are
// edge-triggered; a failed or malformed poll is "no observation" and can
// never force a transition on its own.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::client::{endpoints, SessionClient};
use crate::events::{AutomationEvent, EventBus};
use crate::phase::GamePhase;

#[derive(Default)]
struct ReadyCheckState {
    last_active: Option<bool>,
    /// Declared time of the check we are currently watching, and when we
    /// first saw it (the accept delay counts from there).
    watching: Option<(i64, Instant)>,
    accepted: HashSet<i64>,
}

pub struct PhaseMonitor {
    client: Arc<dyn SessionClient>,
    events: EventBus,
    phase_tx: watch::Sender<GamePhase>,
    phase_rx: watch::Receiver<GamePhase>,
    ready_check: Mutex<ReadyCheckState>,
    auto_accept: bool,
    accept_delay: Duration,
}

/// One ready-check observation, handed to the suppression controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadyCheckObservation {
    pub active: bool,
    pub declared_time: i64,
}

impl PhaseMonitor {
    pub fn new(
        client: Arc<dyn SessionClient>,
        events: EventBus,
        auto_accept: bool,
        accept_delay_secs: u64,
    ) -> Self {
        let (phase_tx, phase_rx) = watch::channel(GamePhase::None);
        Self {
            client,
            events,
            phase_tx,
            phase_rx,
            ready_check: Mutex::new(ReadyCheckState::default()),
            auto_accept,
            accept_delay: Duration::from_secs(accept_delay_secs),
        }
    }

    pub fn current_phase(&self) -> GamePhase {
        *self.phase_rx.borrow()
    }

    pub fn phase_receiver(&self) -> watch::Receiver<GamePhase> {
        self.phase_rx.clone()
    }

    /// One coarse poll of the phase endpoint. Returns the `(old, new)` edge
    /// when the phase changed.
    pub async fn poll_phase_once(&self) -> Option<(GamePhase, GamePhase)> {
        let doc = match self.client.get(endpoints::PHASE).await {
            Ok(doc) => doc,
            Err(e) => {
                debug!("phase poll failed: {}", e);
                return None;
            }
        };
        let Some(raw) = doc.as_str() else {
            debug!("phase endpoint returned a non-string payload, ignoring");
            return None;
        };

        let new_phase = GamePhase::from_wire(raw);
        let old_phase = self.current_phase();
        if new_phase == old_phase {
            return None;
        }

        info!(from = %old_phase, to = %new_phase, "phase changed");
        if old_phase == GamePhase::ReadyCheck {
            // Phase-local comparison state must not leak into the next
            // ready check.
            *self.ready_check.lock().unwrap() = ReadyCheckState::default();
        }
        self.phase_tx.send_replace(new_phase);
        self.events.emit(AutomationEvent::PhaseChanged(new_phase));
        Some((old_phase, new_phase))
    }

    /// One fine poll of the ready-check endpoint; a no-op outside the
    /// ReadyCheck phase.
    pub async fn poll_ready_check_once(&self) -> Option<ReadyCheckObservation> {
        if self.current_phase() != GamePhase::ReadyCheck {
            return None;
        }

        let doc = match self.client.get(endpoints::READY_CHECK).await {
            Ok(doc) => doc,
            Err(e) => {
                debug!("ready-check poll failed: {}", e);
                return None;
            }
        };
        let Some(state) = doc.get("state").and_then(|v| v.as_str()) else {
            debug!("ready-check document has no state field, ignoring");
            return None;
        };
        let declared_time = doc
            .get("declaredTime")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0);
        let active = state == "InProgress";

        let should_accept = {
            let mut rc = self.ready_check.lock().unwrap();
            if rc.last_active != Some(active) {
                rc.last_active = Some(active);
                self.events.emit(AutomationEvent::ReadyCheckChanged(active));
            }

            if active {
                match rc.watching {
                    Some((watched, _)) if watched == declared_time => {}
                    _ => rc.watching = Some((declared_time, Instant::now())),
                }
            } else {
                rc.watching = None;
            }

            active
                && self.auto_accept
                && !rc.accepted.contains(&declared_time)
                && rc
                    .watching
                    .map(|(_, first_seen)| first_seen.elapsed() >= self.accept_delay)
                    .unwrap_or(false)
        };

        if should_accept {
            match self
                .client
                .post(endpoints::READY_CHECK_ACCEPT, Value::Null)
                .await
            {
                Ok(_) => {
                    info!(declared_time, "ready check accepted");
                    self.ready_check.lock().unwrap().accepted.insert(declared_time);
                }
                Err(e) => {
                    // Leave it unaccepted; the next tick retries while the
                    // check is still open.
                    debug!("ready-check accept failed: {}", e);
                }
            }
        }

        Some(ReadyCheckObservation {
            active,
            declared_time,
        })
    }
}
