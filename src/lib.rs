//! Draft-phase automation for the locally running game client.
//!
//! The engine watches the client's session service, follows the pre-match
//! flow (matchmaking, ready check, champion draft), and issues accept, ban,
//! and pick actions on the player's behalf at the right moment. It can also
//! keep the client window out of the way while it works, with a circuit
//! breaker that restores the window if that ever starts failing.
//!
//! Entry point is [`DraftAutomation`]: construct it with a
//! [`client::SessionClient`] (usually [`client::LcuClient`]) and an
//! [`AutomationConfig`], call `start()`, and subscribe to
//! [`AutomationEvent`]s.

pub mod client;
pub mod config;
pub mod draft;
pub mod engine;
pub mod events;
pub mod monitor;
pub mod phase;
pub mod scheduler;
pub mod suppression;

pub use client::{ClientError, LcuClient, SessionClient};
pub use config::{AutomationConfig, ConfigError, SuppressionFlags, TimingConfig};
pub use draft::{
    analyze_draft_session, resolve_session_identity, ActionKind, DraftAction, DraftAnalysis,
    DraftPhase, SessionIdentity,
};
pub use engine::DraftAutomation;
pub use events::AutomationEvent;
pub use monitor::PhaseMonitor;
pub use phase::GamePhase;
pub use scheduler::{ActionScheduler, PendingAction};
pub use suppression::SuppressionController;
