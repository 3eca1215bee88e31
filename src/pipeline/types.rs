//! Core data structures for the kill-event pipeline
//!
//! All types match the SQL schema created by `db::init_schema`:
//! - `kill_events` → `KillEvent` (append-only audit log)
//! - `player_stats` → `PlayerStats` (per guild/player/server counters)
//! - `leaderboard_configs` → `LeaderboardConfig`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Boxed error type used at component boundaries.
///
/// Send + Sync so per-event units can be fanned out across tasks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One combat occurrence, parsed from the game-log watcher's raw telemetry.
///
/// Created by the external watcher, consumed exactly once by the pipeline
/// (accepted into the buffer or rejected), never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillEvent {
    /// Community/tenant identifier
    pub guild_id: i64,
    /// Actor credited with the kill (subject to flood detection)
    pub killer: String,
    pub victim: String,
    pub weapon: String,
    /// Game-server instance identifier
    pub server_id: String,
    /// Seconds since epoch (must be finite)
    pub timestamp: f64,
    pub is_suicide: bool,
}

/// Accumulated per (guild, player, server) counters.
///
/// Counters only grow through the pipeline; resets are an administrative
/// operation outside the core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub kills: u64,
    pub deaths: u64,
    pub suicides: u64,
}

impl PlayerStats {
    /// Kill/death ratio: `kills / deaths` when deaths > 0, else raw kills.
    pub fn kd_ratio(&self) -> f64 {
        kd_ratio(self.kills, self.deaths)
    }
}

/// K/D ratio with the deathless case defined as the raw kill count.
pub fn kd_ratio(kills: u64, deaths: u64) -> f64 {
    if deaths > 0 {
        kills as f64 / deaths as f64
    } else {
        kills as f64
    }
}

/// Leaderboard ranking criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardType {
    Kills,
    Deaths,
    Kdr,
}

impl LeaderboardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardType::Kills => "kills",
            LeaderboardType::Deaths => "deaths",
            LeaderboardType::Kdr => "kdr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kills" => Some(LeaderboardType::Kills),
            "deaths" => Some(LeaderboardType::Deaths),
            "kdr" => Some(LeaderboardType::Kdr),
            _ => None,
        }
    }
}

impl fmt::Display for LeaderboardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked row returned by a leaderboard query.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub player_name: String,
    pub kills: u64,
    pub deaths: u64,
    pub kdr: f64,
}

/// Persisted configuration for an automated leaderboard.
///
/// This is the source of truth for task existence across restarts; the
/// in-memory registry only prevents duplicate concurrent tasks.
#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    pub guild_id: i64,
    pub channel_id: i64,
    pub leaderboard_type: LeaderboardType,
    pub server_id: String,
    /// Hours between refreshes (valid range 1..=720)
    pub update_interval: u64,
    /// Opaque handle to the last-posted display, if any
    pub message_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kd_ratio_with_deaths() {
        assert_eq!(kd_ratio(10, 5), 2.0);
    }

    #[test]
    fn test_kd_ratio_deathless() {
        // Deathless ratio is defined as the raw kill count
        assert_eq!(kd_ratio(10, 0), 10.0);
    }

    #[test]
    fn test_kd_ratio_zeroed() {
        assert_eq!(kd_ratio(0, 0), 0.0);
    }

    #[test]
    fn test_leaderboard_type_round_trip() {
        for ty in [
            LeaderboardType::Kills,
            LeaderboardType::Deaths,
            LeaderboardType::Kdr,
        ] {
            assert_eq!(LeaderboardType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(LeaderboardType::parse("weapons"), None);
    }
}
