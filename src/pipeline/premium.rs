//! Premium entitlement resolution
//!
//! Statistics are only aggregated for premium tenants. Entitlement is
//! re-checked per event, not cached, because it can change between buffer
//! admission and flush.
//!
//! Resolution order: primary provider, then fallback provider. Provider
//! errors and the absence of both providers resolve to `false` (fail-closed).

use super::types::BoxError;
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Trait answering whether a tenant is entitled to stat aggregation.
#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    async fn has_premium_access(&self, guild_id: i64) -> Result<bool, BoxError>;
}

/// Primary-then-fallback entitlement resolution, fail-closed.
#[derive(Clone, Default)]
pub struct EntitlementChain {
    primary: Option<Arc<dyn EntitlementProvider>>,
    fallback: Option<Arc<dyn EntitlementProvider>>,
}

impl EntitlementChain {
    pub fn new(
        primary: Option<Arc<dyn EntitlementProvider>>,
        fallback: Option<Arc<dyn EntitlementProvider>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Resolve entitlement for a tenant.
    ///
    /// A provider error falls through to the next provider; if every
    /// provider errors or none is configured, the answer is `false`.
    pub async fn has_premium_access(&self, guild_id: i64) -> bool {
        for provider in [&self.primary, &self.fallback].into_iter().flatten() {
            match provider.has_premium_access(guild_id).await {
                Ok(answer) => return answer,
                Err(e) => {
                    log::error!("Premium check failed for guild {}: {}", guild_id, e);
                }
            }
        }
        false
    }
}

/// SQLite-backed entitlement provider.
///
/// Reads the `premium_guilds` table:
/// - no row: not premium
/// - `expires_at` NULL: permanently premium
/// - `expires_at > now`: premium until expiry
/// - `expires_at <= now`: entitlement lapsed
pub struct SqliteEntitlementProvider {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntitlementProvider {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl EntitlementProvider for SqliteEntitlementProvider {
    async fn has_premium_access(&self, guild_id: i64) -> Result<bool, BoxError> {
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guild_id FROM premium_guilds
             WHERE guild_id = ? AND (expires_at IS NULL OR expires_at > ?)",
        )?;
        let entitled = stmt.exists(rusqlite::params![guild_id, now])?;
        Ok(entitled)
    }
}
