// Gameflow phase enumeration and wire-string mapping

use std::fmt;

/// The client's current pre-match stage, derived from the phase endpoint.
///
/// The remote value is an opaque string; anything we do not recognize maps
/// to `None` so a weird payload can never drive automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GamePhase {
    #[default]
    None,
    Lobby,
    Matchmaking,
    ReadyCheck,
    ChampSelect,
    GameStart,
    InProgress,
    Reconnect,
    WaitingForStats,
    PreEndOfGame,
    EndOfGame,
    TerminatedInError,
}

impl GamePhase {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "Lobby" => Self::Lobby,
            "Matchmaking" => Self::Matchmaking,
            "ReadyCheck" => Self::ReadyCheck,
            "ChampSelect" => Self::ChampSelect,
            "GameStart" => Self::GameStart,
            "InProgress" => Self::InProgress,
            "Reconnect" => Self::Reconnect,
            "WaitingForStats" => Self::WaitingForStats,
            "PreEndOfGame" => Self::PreEndOfGame,
            "EndOfGame" => Self::EndOfGame,
            "TerminatedInError" => Self::TerminatedInError,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Lobby => "Lobby",
            Self::Matchmaking => "Matchmaking",
            Self::ReadyCheck => "ReadyCheck",
            Self::ChampSelect => "ChampSelect",
            Self::GameStart => "GameStart",
            Self::InProgress => "InProgress",
            Self::Reconnect => "Reconnect",
            Self::WaitingForStats => "WaitingForStats",
            Self::PreEndOfGame => "PreEndOfGame",
            Self::EndOfGame => "EndOfGame",
            Self::TerminatedInError => "TerminatedInError",
        }
    }

    /// Phases where no match is being set up and the window should be
    /// visible again. Leaving the draft flow for one of these clears all
    /// session-scoped automation state.
    pub fn is_neutral(self) -> bool {
        matches!(self, Self::None | Self::Lobby)
    }

    /// Phases in which per-session dedup state is meaningful.
    pub fn in_draft_flow(self) -> bool {
        matches!(self, Self::ReadyCheck | Self::ChampSelect)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
