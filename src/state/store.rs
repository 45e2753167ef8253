//! SQLite swap history store

use crate::config::DatabaseConfig;
use crate::error::{SwapError, SwapResult};
use crate::swap::{ActiveSwap, Asset, ProviderKind, SwapDirection, SwapStatus};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

const SWAP_COLUMNS: &str = r#"
    id, direction, status, provider, quote_id, intent_id,
    from_asset, from_amount, to_asset, to_amount,
    deposit_address, recipient_address, refund_address,
    settlement_tx_ref, settled_from_amount, settled_to_amount, error,
    created_at, expires_at, completed_at
"#;

const TERMINAL_STATUSES: &str = "('completed', 'failed', 'refunded')";

/// Persistent record of executed swaps
pub struct SwapStore {
    pool: SqlitePool,
}

impl SwapStore {
    /// Create a new store
    pub async fn new(config: &DatabaseConfig) -> SwapResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> SwapResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS swaps (
                id TEXT PRIMARY KEY,
                direction TEXT NOT NULL,
                status TEXT NOT NULL,
                provider TEXT NOT NULL,
                quote_id TEXT NOT NULL,
                intent_id TEXT,
                from_asset TEXT NOT NULL,
                from_amount TEXT NOT NULL,
                to_asset TEXT NOT NULL,
                to_amount TEXT NOT NULL,
                deposit_address TEXT,
                recipient_address TEXT NOT NULL,
                refund_address TEXT,
                settlement_tx_ref TEXT,
                settled_from_amount TEXT,
                settled_to_amount TEXT,
                error TEXT,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                completed_at INTEGER,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_swaps_status ON swaps (status)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_swaps_created ON swaps (created_at)")
            .execute(&self.pool)
            .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> SwapResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Record a newly executed swap
    pub async fn save_swap(&self, swap: &ActiveSwap) -> SwapResult<()> {
        let query = format!(
            "INSERT INTO swaps ({SWAP_COLUMNS}, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        sqlx::query(&query)
            .bind(&swap.id)
            .bind(swap.direction.as_str())
            .bind(swap.status.as_str())
            .bind(swap.provider.as_str())
            .bind(&swap.quote_id)
            .bind(&swap.intent_id)
            .bind(serde_json::to_string(&swap.from_asset)?)
            .bind(&swap.from_amount)
            .bind(serde_json::to_string(&swap.to_asset)?)
            .bind(&swap.to_amount)
            .bind(&swap.deposit_address)
            .bind(&swap.recipient_address)
            .bind(&swap.refund_address)
            .bind(&swap.settlement_tx_ref)
            .bind(&swap.settled_from_amount)
            .bind(&swap.settled_to_amount)
            .bind(&swap.error)
            .bind(swap.created_at.timestamp_millis())
            .bind(swap.expires_at.timestamp_millis())
            .bind(swap.completed_at.map(|t| t.timestamp_millis()))
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;

        debug!("Saved swap {} ({})", swap.id, swap.status);
        Ok(())
    }

    /// Persist tracked fields. Terminal records are never rewritten; returns
    /// false when the stored record was already terminal.
    pub async fn update_status(&self, swap: &ActiveSwap) -> SwapResult<bool> {
        let query = format!(
            "UPDATE swaps SET status = ?, settlement_tx_ref = ?, settled_from_amount = ?, \
             settled_to_amount = ?, error = ?, completed_at = ?, updated_at = ? \
             WHERE id = ? AND status NOT IN {TERMINAL_STATUSES}"
        );

        let result = sqlx::query(&query)
            .bind(swap.status.as_str())
            .bind(&swap.settlement_tx_ref)
            .bind(&swap.settled_from_amount)
            .bind(&swap.settled_to_amount)
            .bind(&swap.error)
            .bind(swap.completed_at.map(|t| t.timestamp_millis()))
            .bind(Utc::now().timestamp_millis())
            .bind(&swap.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!("Updated swap {} to {}", swap.id, swap.status);
            return Ok(true);
        }

        match self.get_swap(&swap.id).await? {
            Some(_) => Ok(false),
            None => Err(SwapError::NotFound(swap.id.clone())),
        }
    }

    /// Get a swap by id
    pub async fn get_swap(&self, id: &str) -> SwapResult<Option<ActiveSwap>> {
        let query = format!("SELECT {SWAP_COLUMNS} FROM swaps WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| swap_from_row(&r)).transpose()
    }

    /// Most recent swaps first
    pub async fn get_swap_history(&self, limit: u32) -> SwapResult<Vec<ActiveSwap>> {
        let query = format!("SELECT {SWAP_COLUMNS} FROM swaps ORDER BY created_at DESC LIMIT ?");
        let rows = sqlx::query(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(swap_from_row).collect()
    }

    /// Swaps that have not reached a terminal status
    pub async fn get_active_swaps(&self) -> SwapResult<Vec<ActiveSwap>> {
        let query = format!(
            "SELECT {SWAP_COLUMNS} FROM swaps WHERE status NOT IN {TERMINAL_STATUSES} \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(swap_from_row).collect()
    }

    /// Get swap statistics
    pub async fn get_stats(&self) -> SwapResult<SwapStats> {
        let query = format!(
            r#"
            SELECT
                COUNT(*) as total,
                COALESCE(SUM(CASE WHEN status NOT IN {TERMINAL_STATUSES} THEN 1 ELSE 0 END), 0) as active,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) as completed,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) as failed,
                COALESCE(SUM(CASE WHEN status = 'refunded' THEN 1 ELSE 0 END), 0) as refunded
            FROM swaps
            "#
        );
        let row = sqlx::query(&query).fetch_one(&self.pool).await?;

        Ok(SwapStats {
            total: row.try_get::<i64, _>("total")? as u64,
            active: row.try_get::<i64, _>("active")? as u64,
            completed: row.try_get::<i64, _>("completed")? as u64,
            failed: row.try_get::<i64, _>("failed")? as u64,
            refunded: row.try_get::<i64, _>("refunded")? as u64,
        })
    }
}

fn swap_from_row(row: &SqliteRow) -> SwapResult<ActiveSwap> {
    let direction: String = row.try_get("direction")?;
    let status: String = row.try_get("status")?;
    let provider: String = row.try_get("provider")?;
    let from_asset: String = row.try_get("from_asset")?;
    let to_asset: String = row.try_get("to_asset")?;

    Ok(ActiveSwap {
        id: row.try_get("id")?,
        direction: direction.parse::<SwapDirection>().map_err(SwapError::Internal)?,
        status: status.parse::<SwapStatus>().map_err(SwapError::Internal)?,
        provider: provider.parse::<ProviderKind>().map_err(SwapError::Internal)?,
        quote_id: row.try_get("quote_id")?,
        intent_id: row.try_get("intent_id")?,
        from_asset: serde_json::from_str::<Asset>(&from_asset)?,
        from_amount: row.try_get("from_amount")?,
        to_asset: serde_json::from_str::<Asset>(&to_asset)?,
        to_amount: row.try_get("to_amount")?,
        deposit_address: row.try_get("deposit_address")?,
        recipient_address: row.try_get("recipient_address")?,
        refund_address: row.try_get("refund_address")?,
        settlement_tx_ref: row.try_get("settlement_tx_ref")?,
        settled_from_amount: row.try_get("settled_from_amount")?,
        settled_to_amount: row.try_get("settled_to_amount")?,
        error: row.try_get("error")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        expires_at: from_millis(row.try_get("expires_at")?)?,
        completed_at: row
            .try_get::<Option<i64>, _>("completed_at")?
            .map(from_millis)
            .transpose()?,
    })
}

fn from_millis(millis: i64) -> SwapResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| SwapError::Internal(format!("invalid timestamp {millis}")))
}

/// Swap statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwapStats {
    pub total: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub refunded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::StatusSnapshot;
    use chrono::Duration;
    use uuid::Uuid;

    async fn store() -> SwapStore {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
        };
        let store = SwapStore::new(&config).await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    fn swap(created_at: DateTime<Utc>) -> ActiveSwap {
        ActiveSwap {
            id: Uuid::new_v4().to_string(),
            direction: SwapDirection::Inbound,
            status: SwapStatus::AwaitingDeposit,
            from_asset: Asset::new("BTC", "BTC", "Bitcoin", 8, None, Some("nep141:btc.omft.near")),
            from_amount: "1.0".to_string(),
            to_asset: Asset::home(),
            to_amount: "1680.00000000".to_string(),
            deposit_address: Some("t1MockDeposit".to_string()),
            recipient_address: "t1VpYecBW4UudbGcy4ufh61eWxQCoFaUrPs".to_string(),
            refund_address: Some("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".to_string()),
            quote_id: "mock-1".to_string(),
            provider: ProviderKind::Simulator,
            intent_id: Some("mock-intent-1".to_string()),
            settlement_tx_ref: None,
            settled_from_amount: None,
            settled_to_amount: None,
            error: None,
            created_at,
            expires_at: created_at + Duration::seconds(60),
            completed_at: None,
        }
    }

    fn at_millis(t: DateTime<Utc>) -> DateTime<Utc> {
        from_millis(t.timestamp_millis()).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let store = store().await;
        let swap = swap(at_millis(Utc::now()));
        store.save_swap(&swap).await.unwrap();

        let loaded = store.get_swap(&swap.id).await.unwrap().unwrap();
        assert_eq!(loaded, swap);
        assert!(store.get_swap("missing").await.unwrap().is_none());
        tokio_test::assert_ok!(store.health_check().await);
    }

    #[tokio::test]
    async fn test_history_and_active() {
        let store = store().await;
        let now = at_millis(Utc::now());
        let older = swap(now - Duration::minutes(10));
        let mut newer = swap(now);
        store.save_swap(&older).await.unwrap();
        store.save_swap(&newer).await.unwrap();

        newer.apply_snapshot(&StatusSnapshot::new(SwapStatus::Completed), now);
        assert!(store.update_status(&newer).await.unwrap());

        let history = store.get_swap_history(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, newer.id);
        assert_eq!(history[0].status, SwapStatus::Completed);

        let active = store.get_active_swaps().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, older.id);

        let stats = store.get_stats().await.unwrap();
        assert_eq!(
            stats,
            SwapStats {
                total: 2,
                active: 1,
                completed: 1,
                failed: 0,
                refunded: 0
            }
        );
    }

    #[tokio::test]
    async fn test_terminal_records_are_not_rewritten() {
        let store = store().await;
        let now = at_millis(Utc::now());
        let mut swap = swap(now);
        store.save_swap(&swap).await.unwrap();

        swap.apply_snapshot(&StatusSnapshot::new(SwapStatus::Refunded), now);
        assert!(store.update_status(&swap).await.unwrap());

        swap.status = SwapStatus::Completed;
        assert!(!store.update_status(&swap).await.unwrap());
        let stored = store.get_swap(&swap.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SwapStatus::Refunded);
    }

    #[tokio::test]
    async fn test_update_unknown_swap() {
        let store = store().await;
        let err = store.update_status(&swap(Utc::now())).await.unwrap_err();
        assert!(matches!(err, SwapError::NotFound(_)));
    }
}
