// Typed event channel between the automation core and its consumers.
//
// Components receive the bus at construction and emit into it; consumers
// subscribe for edge-triggered notifications. No listener fields, no
// globals.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::draft::DraftAnalysis;
use crate::phase::GamePhase;

#[derive(Debug, Clone)]
pub enum AutomationEvent {
    PhaseChanged(GamePhase),
    ReadyCheckChanged(bool),
    DraftSessionChanged(Arc<DraftAnalysis>),
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AutomationEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.tx.subscribe()
    }

    /// Emitting with no subscribers is not an error; automation runs the
    /// same whether or not anyone is listening.
    pub(crate) fn emit(&self, event: AutomationEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
