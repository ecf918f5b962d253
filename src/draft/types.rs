// Typed model of a draft session snapshot

use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Ban,
    Pick,
}

impl ActionKind {
    /// Wire strings other than "ban"/"pick" (reveal markers and the like)
    /// yield `None` and are dropped at the parse boundary.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "ban" => Some(Self::Ban),
            "pick" => Some(Self::Pick),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ban => "ban",
            Self::Pick => "pick",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic ban/pick slot. Immutable once constructed for a poll; the next
/// poll rebuilds everything from scratch.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftAction {
    pub id: i64,
    pub seat_id: i64,
    pub kind: ActionKind,
    /// 0 = nothing chosen yet.
    pub champion_id: i64,
    pub in_progress: bool,
    pub completed: bool,
    /// 1-based turn number (phase index + 1).
    pub turn: u32,
    pub is_ally: bool,
}

impl DraftAction {
    pub fn is_resolved(&self) -> bool {
        self.completed
    }
}

/// One ordered stage of the draft (a ban round or a pick round).
#[derive(Debug, Clone, PartialEq)]
pub struct DraftPhase {
    pub index: usize,
    pub kind: ActionKind,
    pub actions: Vec<DraftAction>,
    /// Whether any action in this stage is still unresolved.
    pub active: bool,
}

/// Complete derived snapshot for one poll of the draft-session document.
///
/// Always rebuilt whole; never patched incrementally, because the remote
/// document can be inconsistent between polls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftAnalysis {
    pub phases: Vec<DraftPhase>,
    /// Index of the first phase with an unresolved action.
    pub active_phase: Option<usize>,
    /// The local player's own in-progress, uncompleted action, if any.
    pub current_player_action: Option<DraftAction>,
    /// Turn number of the current player action; 0 while we have none.
    pub current_turn: u32,
    /// More than two stages with at least one ban and one pick stage:
    /// a multi-round draft rather than a single blind pick.
    pub is_draft_pick: bool,
    pub ally_seats: Vec<i64>,
    pub enemy_seats: Vec<i64>,
    pub banned_champions: BTreeSet<i64>,
    pub picked_champions: BTreeSet<i64>,
    pub seat_champions: HashMap<i64, i64>,
    /// Phase timer, milliseconds.
    pub total_time_ms: i64,
    pub remaining_time_ms: i64,
}

impl DraftAnalysis {
    pub fn champion_taken(&self, champion_id: i64) -> bool {
        self.banned_champions.contains(&champion_id)
            || self.picked_champions.contains(&champion_id)
    }
}
