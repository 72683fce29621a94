use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Row, params};
use uuid::Uuid;

use super::models::{
    Endpoint, HistoryEntry, i64_to_timestamp, status_from_columns, status_to_columns, timestamp_to_i64,
};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Storage seam the engine reads endpoints from and writes results to
#[async_trait]
pub trait Repository: Send + Sync {
    /// Enabled endpoints whose next due time is at or before `now`
    async fn fetch_due(&self, now: DateTime<Utc>) -> Result<Vec<Endpoint>>;

    /// Every enabled endpoint, regardless of due time
    async fn fetch_enabled(&self) -> Result<Vec<Endpoint>>;

    /// Append one probe record
    async fn insert_history(&self, entry: &HistoryEntry) -> Result<()>;

    /// Insert an endpoint, or update its engine-owned fields if it exists
    async fn upsert_endpoint(&self, endpoint: &Endpoint) -> Result<()>;

    async fn get_endpoint(&self, id: Uuid) -> Result<Option<Endpoint>>;

    /// Most recent history first
    async fn history_for(&self, endpoint_id: Uuid, limit: usize) -> Result<Vec<HistoryEntry>>;
}

const ENDPOINT_COLUMNS: &str = "id, name, description, url, rescue_url, interval_minutes, last_status_kind, \
     last_status_code, created_at, modified_at, last_probed_at, next_due, content, enabled";

/// LibSQL-backed repository
pub struct LibsqlRepository {
    pool: LibsqlPool,
}

impl LibsqlRepository {
    pub fn new(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    async fn query_endpoints(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Endpoint>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, params).await?;
        let mut endpoints = Vec::new();

        while let Some(row) = rows.next().await? {
            endpoints.push(endpoint_from_row(&row)?);
        }

        Ok(endpoints)
    }
}

fn endpoint_from_row(row: &Row) -> Result<Endpoint> {
    let id: String = row.get(0)?;
    let interval: i64 = row.get(5)?;

    Ok(Endpoint {
        id: Uuid::parse_str(&id)?,
        name: row.get(1)?,
        description: row.get(2)?,
        url: row.get(3)?,
        rescue_url: row.get(4)?,
        interval_minutes: u32::try_from(interval).unwrap_or(1),
        last_status: status_from_columns(row.get(6)?, row.get(7)?),
        created_at: i64_to_timestamp(row.get(8)?),
        modified_at: i64_to_timestamp(row.get(9)?),
        last_probed_at: row.get::<Option<i64>>(10)?.map(i64_to_timestamp),
        next_due: i64_to_timestamp(row.get(11)?),
        content: row.get(12)?,
        enabled: row.get::<i64>(13)? != 0,
    })
}

fn history_from_row(row: &Row) -> Result<HistoryEntry> {
    let id: String = row.get(0)?;
    let endpoint_id: String = row.get(1)?;
    let kind: String = row.get(2)?;

    let status = status_from_columns(Some(kind.clone()), row.get(3)?)
        .ok_or_else(|| anyhow::anyhow!("Unknown history status kind: {kind}"))?;

    Ok(HistoryEntry {
        id: Uuid::parse_str(&id)?,
        endpoint_id: Uuid::parse_str(&endpoint_id)?,
        status,
        error: row.get(4)?,
        load_seconds: row.get(5)?,
        content: row.get(6)?,
        created_at: i64_to_timestamp(row.get(7)?),
    })
}

#[async_trait]
impl Repository for LibsqlRepository {
    async fn fetch_due(&self, now: DateTime<Utc>) -> Result<Vec<Endpoint>> {
        let sql = format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE enabled = 1 AND next_due <= ? ORDER BY next_due"
        );
        self.query_endpoints(&sql, params![timestamp_to_i64(now)]).await
    }

    async fn fetch_enabled(&self) -> Result<Vec<Endpoint>> {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE enabled = 1 ORDER BY next_due");
        self.query_endpoints(&sql, ()).await
    }

    async fn insert_history(&self, entry: &HistoryEntry) -> Result<()> {
        let conn = self.get_conn().await?;
        let (kind, code) = status_to_columns(Some(entry.status));

        conn.execute(
            "INSERT INTO history_entries (id, endpoint_id, status_kind, status_code, error, load_seconds, content, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.id.to_string(),
                entry.endpoint_id.to_string(),
                kind,
                code,
                entry.error.clone(),
                entry.load_seconds,
                entry.content.clone(),
                timestamp_to_i64(entry.created_at)
            ],
        )
        .await?;

        Ok(())
    }

    async fn upsert_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        let conn = self.get_conn().await?;
        let (kind, code) = status_to_columns(endpoint.last_status);

        // Existing rows only take the fields the engine owns.
        conn.execute(
            "INSERT INTO endpoints (id, name, description, url, rescue_url, interval_minutes, last_status_kind, last_status_code, created_at, modified_at, last_probed_at, next_due, content, enabled)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                last_status_kind = excluded.last_status_kind,
                last_status_code = excluded.last_status_code,
                modified_at = excluded.modified_at,
                last_probed_at = excluded.last_probed_at,
                next_due = excluded.next_due,
                content = excluded.content",
            params![
                endpoint.id.to_string(),
                endpoint.name.clone(),
                endpoint.description.clone(),
                endpoint.url.clone(),
                endpoint.rescue_url.clone(),
                i64::from(endpoint.interval_minutes),
                kind,
                code,
                timestamp_to_i64(endpoint.created_at),
                timestamp_to_i64(endpoint.modified_at),
                endpoint.last_probed_at.map(timestamp_to_i64),
                timestamp_to_i64(endpoint.next_due),
                endpoint.content.clone(),
                if endpoint.enabled { 1 } else { 0 }
            ],
        )
        .await?;

        Ok(())
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Option<Endpoint>> {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE id = ?");
        Ok(self.query_endpoints(&sql, params![id.to_string()]).await?.into_iter().next())
    }

    async fn history_for(&self, endpoint_id: Uuid, limit: usize) -> Result<Vec<HistoryEntry>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, endpoint_id, status_kind, status_code, error, load_seconds, content, created_at FROM history_entries WHERE endpoint_id = ? ORDER BY created_at DESC LIMIT ?",
                params![endpoint_id.to_string(), limit as i64],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(history_from_row(&row)?);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::StatusCode;
    use crate::pool::open_pool;
    use chrono::Duration;
    use tempfile::{TempDir, tempdir};

    async fn create_test_repository() -> Result<(LibsqlRepository, TempDir)> {
        let dir = tempdir()?;
        let pool = open_pool(&dir.path().join("test.db"), 4).await?;
        let conn = pool.get().await?;
        crate::database::initialize_database(&conn).await?;
        drop(conn);

        Ok((LibsqlRepository::new(pool), dir))
    }

    fn seconds_only(time: DateTime<Utc>) -> DateTime<Utc> {
        i64_to_timestamp(timestamp_to_i64(time))
    }

    #[tokio::test]
    async fn test_fetch_due_respects_time_and_flag() -> Result<()> {
        let (repo, _dir) = create_test_repository().await?;
        let now = Utc::now();

        let mut due = Endpoint::new("due", "http://a.example", 5);
        due.next_due = now - Duration::minutes(1);
        let mut later = Endpoint::new("later", "http://b.example", 5);
        later.next_due = now + Duration::minutes(3);
        let mut off = Endpoint::new("off", "http://c.example", 5);
        off.next_due = now - Duration::minutes(10);
        off.enabled = false;

        for endpoint in [&due, &later, &off] {
            repo.upsert_endpoint(endpoint).await?;
        }

        let selected = repo.fetch_due(now).await?;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, due.id);

        let enabled = repo.fetch_enabled().await?;
        assert_eq!(enabled.len(), 2);
        assert!(enabled.iter().all(|endpoint| endpoint.enabled));

        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_only_touches_engine_fields() -> Result<()> {
        let (repo, _dir) = create_test_repository().await?;

        let mut endpoint = Endpoint::new("api", "http://api.example", 2);
        endpoint.description = "public api".into();
        endpoint.rescue_url = Some("http://backup.example".into());
        repo.upsert_endpoint(&endpoint).await?;

        let mut probed = endpoint.clone();
        probed.name = "renamed by engine".into();
        probed.last_status = Some(StatusCode::Unreachable);
        probed.content = "gateway timeout".into();
        probed.next_due = endpoint.next_due + Duration::minutes(2);
        probed.last_probed_at = Some(endpoint.created_at);
        repo.upsert_endpoint(&probed).await?;

        let stored = repo.get_endpoint(endpoint.id).await?.expect("endpoint stored");
        assert_eq!(stored.name, "api");
        assert_eq!(stored.description, "public api");
        assert_eq!(stored.rescue_url.as_deref(), Some("http://backup.example"));
        assert_eq!(stored.last_status, Some(StatusCode::Unreachable));
        assert_eq!(stored.content, "gateway timeout");
        assert_eq!(stored.next_due, seconds_only(probed.next_due));
        assert_eq!(stored.last_probed_at, Some(seconds_only(endpoint.created_at)));

        Ok(())
    }

    #[tokio::test]
    async fn test_history_is_appended_newest_first() -> Result<()> {
        let (repo, _dir) = create_test_repository().await?;
        let endpoint = Endpoint::new("api", "http://api.example", 1);
        repo.upsert_endpoint(&endpoint).await?;

        let base = Utc::now();
        let first = HistoryEntry {
            id: Uuid::new_v4(),
            endpoint_id: endpoint.id,
            status: StatusCode::Http(500),
            error: None,
            load_seconds: 0.25,
            content: "boom".into(),
            created_at: base - Duration::minutes(1),
        };
        let second = HistoryEntry {
            id: Uuid::new_v4(),
            endpoint_id: endpoint.id,
            status: StatusCode::Unreachable,
            error: Some("connection failed".into()),
            load_seconds: 0.0,
            content: String::new(),
            created_at: base,
        };
        repo.insert_history(&first).await?;
        repo.insert_history(&second).await?;

        let history = repo.history_for(endpoint.id, 10).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[0].error.as_deref(), Some("connection failed"));
        assert_eq!(history[1].status, StatusCode::Http(500));
        assert_eq!(history[1].content, "boom");

        assert_eq!(repo.history_for(endpoint.id, 1).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_history_requires_known_endpoint() -> Result<()> {
        let (repo, _dir) = create_test_repository().await?;
        let orphan = HistoryEntry {
            id: Uuid::new_v4(),
            endpoint_id: Uuid::new_v4(),
            status: StatusCode::Http(200),
            error: None,
            load_seconds: 0.1,
            content: String::new(),
            created_at: Utc::now(),
        };

        assert!(repo.insert_history(&orphan).await.is_err());
        Ok(())
    }
}
