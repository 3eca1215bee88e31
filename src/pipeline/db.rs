//! Persistence layer for kill events, player stats and leaderboard config
//!
//! Tables:
//! - `kill_events` - INSERT (append-only audit trail)
//! - `player_stats` - UPSERT on (guild_id, player_name, server_id)
//! - `leaderboard_configs` - CRUD for automated leaderboard definitions
//! - `premium_guilds` - entitlement table read by `premium`
//!
//! The store is an abstract collaborator interface; the pipeline never
//! depends on SQLite directly.

use super::types::{
    kd_ratio, BoxError, KillEvent, LeaderboardConfig, LeaderboardRow, LeaderboardType, PlayerStats,
};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// Persistence operations consumed by the pipeline.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Append one event to the audit log.
    async fn record_kill_event(&self, event: &KillEvent) -> Result<(), BoxError>;

    /// Current counters for a player, `None` if never seen.
    async fn get_player_stats(
        &self,
        guild_id: i64,
        player: &str,
        server_id: &str,
    ) -> Result<Option<PlayerStats>, BoxError>;

    /// Write the full counter set for a player (read-modify-write by callers).
    async fn update_player_stats(
        &self,
        guild_id: i64,
        player: &str,
        server_id: &str,
        stats: &PlayerStats,
    ) -> Result<(), BoxError>;

    /// Top players for a guild/server ranked by the given criterion.
    async fn get_leaderboard(
        &self,
        leaderboard_type: LeaderboardType,
        guild_id: i64,
        server_id: &str,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>, BoxError>;

    async fn add_leaderboard_config(&self, config: &LeaderboardConfig) -> Result<(), BoxError>;

    async fn remove_leaderboard_config(
        &self,
        guild_id: i64,
        channel_id: i64,
        leaderboard_type: LeaderboardType,
        server_id: &str,
    ) -> Result<(), BoxError>;

    /// All persisted leaderboard configs, used to recreate tasks at startup.
    async fn list_leaderboard_configs(&self) -> Result<Vec<LeaderboardConfig>, BoxError>;

    /// Persist the display reference after a new message is created.
    async fn update_leaderboard_message_id(
        &self,
        guild_id: i64,
        channel_id: i64,
        leaderboard_type: LeaderboardType,
        server_id: &str,
        message_id: u64,
    ) -> Result<(), BoxError>;
}

/// Create all tables if absent and enable WAL mode. Idempotent.
pub fn init_schema(conn: &Connection) -> Result<(), BoxError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::info!("📊 Enabled WAL mode for SQLite database");

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kill_events (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id    INTEGER NOT NULL,
            killer      TEXT NOT NULL,
            victim      TEXT NOT NULL,
            weapon      TEXT NOT NULL,
            server_id   TEXT NOT NULL,
            timestamp   REAL NOT NULL,
            is_suicide  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS player_stats (
            guild_id    INTEGER NOT NULL,
            player_name TEXT NOT NULL,
            server_id   TEXT NOT NULL,
            kills       INTEGER NOT NULL DEFAULT 0,
            deaths      INTEGER NOT NULL DEFAULT 0,
            suicides    INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (guild_id, player_name, server_id)
        );

        CREATE TABLE IF NOT EXISTS leaderboard_configs (
            guild_id         INTEGER NOT NULL,
            channel_id       INTEGER NOT NULL,
            leaderboard_type TEXT NOT NULL,
            server_id        TEXT NOT NULL,
            update_interval  INTEGER NOT NULL DEFAULT 24,
            message_id       INTEGER,
            PRIMARY KEY (guild_id, channel_id, leaderboard_type, server_id)
        );

        CREATE TABLE IF NOT EXISTS premium_guilds (
            guild_id    INTEGER PRIMARY KEY,
            expires_at  INTEGER
        );
        "#,
    )?;

    log::info!("✅ Schema initialization complete");
    Ok(())
}

/// SQLite implementation of `StatsStore`.
pub struct SqliteStatsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStatsStore {
    /// Open the database at `db_path` and ensure the schema exists.
    pub fn new(db_path: &str) -> Result<Self, BoxError> {
        let conn = Connection::open(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared connection handle, for collaborators reading the same file
    /// (e.g. the SQLite entitlement provider).
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn order_clause(leaderboard_type: LeaderboardType) -> &'static str {
        match leaderboard_type {
            LeaderboardType::Kills => "kills DESC, deaths ASC",
            LeaderboardType::Deaths => "deaths DESC, kills DESC",
            // Deathless players rank by raw kill count
            LeaderboardType::Kdr => {
                "(CASE WHEN deaths > 0 THEN CAST(kills AS REAL) / deaths
                       ELSE CAST(kills AS REAL) END) DESC"
            }
        }
    }
}

#[async_trait]
impl StatsStore for SqliteStatsStore {
    async fn record_kill_event(&self, event: &KillEvent) -> Result<(), BoxError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO kill_events (
                guild_id, killer, victim, weapon, server_id, timestamp, is_suicide
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                event.guild_id,
                event.killer,
                event.victim,
                event.weapon,
                event.server_id,
                event.timestamp,
                event.is_suicide,
            ],
        )?;
        Ok(())
    }

    async fn get_player_stats(
        &self,
        guild_id: i64,
        player: &str,
        server_id: &str,
    ) -> Result<Option<PlayerStats>, BoxError> {
        let conn = self.conn.lock().unwrap();
        let stats = conn
            .query_row(
                "SELECT kills, deaths, suicides FROM player_stats
                 WHERE guild_id = ? AND player_name = ? AND server_id = ?",
                rusqlite::params![guild_id, player, server_id],
                |row| {
                    Ok(PlayerStats {
                        kills: row.get(0)?,
                        deaths: row.get(1)?,
                        suicides: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }

    async fn update_player_stats(
        &self,
        guild_id: i64,
        player: &str,
        server_id: &str,
        stats: &PlayerStats,
    ) -> Result<(), BoxError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO player_stats (guild_id, player_name, server_id, kills, deaths, suicides)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id, player_name, server_id) DO UPDATE SET
                kills = excluded.kills,
                deaths = excluded.deaths,
                suicides = excluded.suicides
            "#,
            rusqlite::params![
                guild_id,
                player,
                server_id,
                stats.kills,
                stats.deaths,
                stats.suicides
            ],
        )?;
        Ok(())
    }

    async fn get_leaderboard(
        &self,
        leaderboard_type: LeaderboardType,
        guild_id: i64,
        server_id: &str,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>, BoxError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT player_name, kills, deaths FROM player_stats
             WHERE guild_id = ? AND server_id = ?
             ORDER BY {} LIMIT ?",
            Self::order_clause(leaderboard_type)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                rusqlite::params![guild_id, server_id, limit as i64],
                |row| {
                    let kills: u64 = row.get(1)?;
                    let deaths: u64 = row.get(2)?;
                    Ok(LeaderboardRow {
                        player_name: row.get(0)?,
                        kills,
                        deaths,
                        kdr: kd_ratio(kills, deaths),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn add_leaderboard_config(&self, config: &LeaderboardConfig) -> Result<(), BoxError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO leaderboard_configs (
                guild_id, channel_id, leaderboard_type, server_id, update_interval, message_id
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id, channel_id, leaderboard_type, server_id) DO UPDATE SET
                update_interval = excluded.update_interval
            "#,
            rusqlite::params![
                config.guild_id,
                config.channel_id,
                config.leaderboard_type.as_str(),
                config.server_id,
                config.update_interval,
                config.message_id,
            ],
        )?;
        Ok(())
    }

    async fn remove_leaderboard_config(
        &self,
        guild_id: i64,
        channel_id: i64,
        leaderboard_type: LeaderboardType,
        server_id: &str,
    ) -> Result<(), BoxError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM leaderboard_configs
             WHERE guild_id = ? AND channel_id = ? AND leaderboard_type = ? AND server_id = ?",
            rusqlite::params![guild_id, channel_id, leaderboard_type.as_str(), server_id],
        )?;
        Ok(())
    }

    async fn list_leaderboard_configs(&self) -> Result<Vec<LeaderboardConfig>, BoxError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guild_id, channel_id, leaderboard_type, server_id, update_interval, message_id
             FROM leaderboard_configs",
        )?;
        let mut configs = Vec::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, Option<u64>>(5)?,
            ))
        })?;
        for row in rows {
            let (guild_id, channel_id, type_str, server_id, update_interval, message_id) = row?;
            let leaderboard_type = match LeaderboardType::parse(&type_str) {
                Some(ty) => ty,
                None => {
                    log::warn!("Skipping leaderboard config with unknown type '{}'", type_str);
                    continue;
                }
            };
            configs.push(LeaderboardConfig {
                guild_id,
                channel_id,
                leaderboard_type,
                server_id,
                update_interval,
                message_id,
            });
        }
        Ok(configs)
    }

    async fn update_leaderboard_message_id(
        &self,
        guild_id: i64,
        channel_id: i64,
        leaderboard_type: LeaderboardType,
        server_id: &str,
        message_id: u64,
    ) -> Result<(), BoxError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE leaderboard_configs SET message_id = ?
             WHERE guild_id = ? AND channel_id = ? AND leaderboard_type = ? AND server_id = ?",
            rusqlite::params![
                message_id,
                guild_id,
                channel_id,
                leaderboard_type.as_str(),
                server_id
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (NamedTempFile, SqliteStatsStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = SqliteStatsStore::new(db_path).unwrap();
        (temp_file, store)
    }

    fn make_event(killer: &str, victim: &str, is_suicide: bool) -> KillEvent {
        KillEvent {
            guild_id: 1001,
            killer: killer.to_string(),
            victim: victim.to_string(),
            weapon: "SVD".to_string(),
            server_id: "default".to_string(),
            timestamp: 1_700_000_000.0,
            is_suicide,
        }
    }

    #[tokio::test]
    async fn test_record_kill_event_appends() {
        let (_temp, store) = create_test_store();

        store.record_kill_event(&make_event("A", "B", false)).await.unwrap();
        store.record_kill_event(&make_event("A", "B", false)).await.unwrap();

        let conn = store.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kill_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_stats_missing_player_is_none() {
        let (_temp, store) = create_test_store();
        let stats = store.get_player_stats(1001, "Nobody", "default").await.unwrap();
        assert!(stats.is_none());
    }

    #[tokio::test]
    async fn test_update_then_read_stats() {
        let (_temp, store) = create_test_store();
        let written = PlayerStats { kills: 3, deaths: 1, suicides: 0 };

        store.update_player_stats(1001, "A", "default", &written).await.unwrap();
        let read = store.get_player_stats(1001, "A", "default").await.unwrap().unwrap();
        assert_eq!(read, written);

        // Upsert overwrites the counter set
        let updated = PlayerStats { kills: 4, deaths: 1, suicides: 0 };
        store.update_player_stats(1001, "A", "default", &updated).await.unwrap();
        let read = store.get_player_stats(1001, "A", "default").await.unwrap().unwrap();
        assert_eq!(read, updated);
    }

    #[tokio::test]
    async fn test_stats_keyed_per_server() {
        let (_temp, store) = create_test_store();
        let stats = PlayerStats { kills: 7, deaths: 2, suicides: 1 };

        store.update_player_stats(1001, "A", "emerald-1", &stats).await.unwrap();
        assert!(store.get_player_stats(1001, "A", "emerald-2").await.unwrap().is_none());
        assert!(store.get_player_stats(2002, "A", "emerald-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leaderboard_ordering() {
        let (_temp, store) = create_test_store();

        for (name, kills, deaths) in [("A", 10u64, 5u64), ("B", 8, 0), ("C", 20, 40)] {
            let stats = PlayerStats { kills, deaths, suicides: 0 };
            store.update_player_stats(1, name, "default", &stats).await.unwrap();
        }

        let by_kills = store
            .get_leaderboard(LeaderboardType::Kills, 1, "default", 10)
            .await
            .unwrap();
        let names: Vec<_> = by_kills.iter().map(|r| r.player_name.as_str()).collect();
        assert_eq!(names, ["C", "A", "B"]);

        let by_deaths = store
            .get_leaderboard(LeaderboardType::Deaths, 1, "default", 10)
            .await
            .unwrap();
        assert_eq!(by_deaths[0].player_name, "C");

        // KDR: B is deathless with 8 kills (ratio 8), A is 2.0, C is 0.5
        let by_kdr = store
            .get_leaderboard(LeaderboardType::Kdr, 1, "default", 10)
            .await
            .unwrap();
        let names: Vec<_> = by_kdr.iter().map(|r| r.player_name.as_str()).collect();
        assert_eq!(names, ["B", "A", "C"]);
        assert_eq!(by_kdr[0].kdr, 8.0);
    }

    #[tokio::test]
    async fn test_leaderboard_limit() {
        let (_temp, store) = create_test_store();
        for i in 0..15u64 {
            let stats = PlayerStats { kills: i, deaths: 0, suicides: 0 };
            store
                .update_player_stats(1, &format!("P{}", i), "default", &stats)
                .await
                .unwrap();
        }
        let top = store
            .get_leaderboard(LeaderboardType::Kills, 1, "default", 10)
            .await
            .unwrap();
        assert_eq!(top.len(), 10);
    }

    #[tokio::test]
    async fn test_leaderboard_empty_guild() {
        let (_temp, store) = create_test_store();
        let rows = store
            .get_leaderboard(LeaderboardType::Kills, 404, "default", 10)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_config_crud() {
        let (_temp, store) = create_test_store();
        let config = LeaderboardConfig {
            guild_id: 1001,
            channel_id: 42,
            leaderboard_type: LeaderboardType::Kdr,
            server_id: "default".to_string(),
            update_interval: 24,
            message_id: None,
        };

        store.add_leaderboard_config(&config).await.unwrap();

        let listed = store.list_leaderboard_configs().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].leaderboard_type, LeaderboardType::Kdr);
        assert_eq!(listed[0].message_id, None);

        store
            .update_leaderboard_message_id(1001, 42, LeaderboardType::Kdr, "default", 777)
            .await
            .unwrap();
        let listed = store.list_leaderboard_configs().await.unwrap();
        assert_eq!(listed[0].message_id, Some(777));

        store
            .remove_leaderboard_config(1001, 42, LeaderboardType::Kdr, "default")
            .await
            .unwrap();
        assert!(store.list_leaderboard_configs().await.unwrap().is_empty());
    }
}
