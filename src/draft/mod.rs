// Draft-session analysis: typed model, analyzer, session identity

mod analyzer;
mod identity;
mod types;

pub use analyzer::analyze_draft_session;
pub use identity::{ready_check_identity, resolve_session_identity, SessionIdentity};
pub use types::{ActionKind, DraftAction, DraftAnalysis, DraftPhase};
