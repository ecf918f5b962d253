// Automation configuration: loading, defaults, validation

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    Validation { field: String, message: String },
}

/// Commit timing for scheduled actions. Thresholds are "commit once the
/// phase timer drops to N seconds or below"; hovering previews the choice
/// as soon as it is scheduled.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TimingConfig {
    pub hover: bool,
    pub ban_commit_below_secs: u64,
    pub pick_commit_below_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            hover: true,
            ban_commit_below_secs: 5,
            pick_commit_below_secs: 8,
        }
    }
}

impl TimingConfig {
    pub fn commit_below_secs(&self, kind: crate::draft::ActionKind) -> u64 {
        match kind {
            crate::draft::ActionKind::Ban => self.ban_commit_below_secs,
            crate::draft::ActionKind::Pick => self.pick_commit_below_secs,
        }
    }
}

/// Window pop-up suppression behavior and its failure circuit breaker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SuppressionFlags {
    pub on_ready_check: bool,
    pub on_draft: bool,
    /// Minimum spacing between window hide/show calls, no matter how many
    /// events fire in a burst.
    pub min_interval_ms: u64,
    /// Consecutive window-call failures before the controller disables
    /// itself and restores the window.
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for SuppressionFlags {
    fn default() -> Self {
        Self {
            on_ready_check: true,
            on_draft: true,
            min_interval_ms: 750,
            failure_threshold: 5,
            cooldown_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AutomationConfig {
    /// Coarse gameflow phase poll.
    pub phase_poll_ms: u64,
    /// Fine ready-check poll, only evaluated while in ReadyCheck.
    pub ready_check_poll_ms: u64,
    /// Draft-session poll plus scheduler/suppression tick.
    pub draft_poll_ms: u64,

    pub auto_accept: bool,
    /// Seconds to wait after a ready check pops before accepting it.
    pub accept_delay_secs: u64,

    pub auto_ban: bool,
    pub auto_pick: bool,
    /// Champion ids tried in order when auto-banning; already banned or
    /// picked champions are skipped.
    pub preferred_bans: Vec<i64>,
    /// Champion ids tried in order when auto-picking.
    pub preferred_picks: Vec<i64>,

    pub timing: TimingConfig,
    pub suppression: SuppressionFlags,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            phase_poll_ms: 1000,
            ready_check_poll_ms: 500,
            draft_poll_ms: 500,
            auto_accept: true,
            accept_delay_secs: 0,
            auto_ban: false,
            auto_pick: false,
            preferred_bans: Vec::new(),
            preferred_picks: Vec::new(),
            timing: TimingConfig::default(),
            suppression: SuppressionFlags::default(),
        }
    }
}

impl AutomationConfig {
    /// Load from a JSON config file. Missing fields fall back to defaults so
    /// old config files keep working after upgrades.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("phase_poll_ms", self.phase_poll_ms),
            ("ready_check_poll_ms", self.ready_check_poll_ms),
            ("draft_poll_ms", self.draft_poll_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Validation {
                    field: field.into(),
                    message: "poll interval must be greater than 0".into(),
                });
            }
        }

        if self.suppression.failure_threshold == 0 {
            return Err(ConfigError::Validation {
                field: "suppression.failure_threshold".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.auto_ban && self.preferred_bans.is_empty() {
            return Err(ConfigError::Validation {
                field: "preferred_bans".into(),
                message: "auto_ban is enabled but no ban preferences are set".into(),
            });
        }
        if self.auto_pick && self.preferred_picks.is_empty() {
            return Err(ConfigError::Validation {
                field: "preferred_picks".into(),
                message: "auto_pick is enabled but no pick preferences are set".into(),
            });
        }

        Ok(())
    }
}
