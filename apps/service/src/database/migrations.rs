use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Bring the schema up to `SCHEMA_VERSION`.
///
/// Safe to call on every start; applied versions are tracked in
/// `schema_migrations`.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Initial schema").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
    Ok(())
}

async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: endpoints and their probe history
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS endpoints (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL,
            rescue_url TEXT,
            interval_minutes INTEGER NOT NULL DEFAULT 1,
            last_status_kind TEXT,
            last_status_code INTEGER,
            created_at INTEGER NOT NULL,
            modified_at INTEGER NOT NULL,
            last_probed_at INTEGER,
            next_due INTEGER NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            enabled INTEGER NOT NULL DEFAULT 1
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS history_entries (
            id TEXT PRIMARY KEY,
            endpoint_id TEXT NOT NULL,
            status_kind TEXT NOT NULL,
            status_code INTEGER,
            error TEXT,
            load_seconds REAL NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            FOREIGN KEY (endpoint_id) REFERENCES endpoints(id) ON DELETE CASCADE
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_endpoint_created ON history_entries(endpoint_id, created_at DESC)",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_endpoints_enabled_next_due ON endpoints(enabled, next_due)",
        (),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrations_are_idempotent() -> Result<()> {
        let dir = tempdir()?;
        let db = libsql::Builder::new_local(dir.path().join("migrate.db")).build().await?;
        let conn = db.connect()?;

        run_migrations(&conn).await?;
        run_migrations(&conn).await?;

        assert_eq!(get_current_version(&conn).await?, SCHEMA_VERSION);

        let mut rows = conn.query("SELECT COUNT(*) FROM schema_migrations", ()).await?;
        let count: i64 = rows.next().await?.map(|row| row.get(0)).transpose()?.unwrap_or_default();
        assert_eq!(count, i64::from(SCHEMA_VERSION));

        Ok(())
    }

    #[tokio::test]
    async fn test_new_endpoints_start_enabled() -> Result<()> {
        let dir = tempdir()?;
        let db = libsql::Builder::new_local(dir.path().join("enabled.db")).build().await?;
        let conn = db.connect()?;
        run_migrations(&conn).await?;

        conn.execute(
            "INSERT INTO endpoints (id, name, url, created_at, modified_at, next_due) VALUES ('a', 'shop', 'http://shop.example', 0, 0, 0)",
            (),
        )
        .await?;

        let mut rows = conn.query("SELECT enabled FROM endpoints WHERE id = 'a'", ()).await?;
        let enabled: i64 = rows.next().await?.map(|row| row.get(0)).transpose()?.unwrap_or_default();
        assert_eq!(enabled, 1);

        Ok(())
    }
}
