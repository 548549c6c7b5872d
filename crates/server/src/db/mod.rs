use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

mod admins;
mod content;
mod guests;
mod messages;
mod models;

pub use models::*;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(url: &str) -> Result<Self> {
        // Ensure the directory exists for file-backed databases
        if let Some(path) = file_path(url) {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database that lives as long as the pool
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        let db = Self { pool };
        db.run_migrations().await.unwrap();
        db
    }

    /// Breaks a table so tests can exercise database failures
    #[cfg(test)]
    pub async fn drop_table(&self, table: &str) {
        sqlx::query(&format!("DROP TABLE {}", table))
            .execute(&self.pool)
            .await
            .unwrap();
    }

    /// Makes every UPDATE on `table` fail while reads keep working
    #[cfg(test)]
    pub async fn reject_updates(&self, table: &str) {
        let sql = format!(
            "CREATE TRIGGER reject_{table}_updates BEFORE UPDATE ON {table} \
             BEGIN SELECT RAISE(ABORT, 'updates rejected'); END"
        );
        sqlx::query(&sql).execute(&self.pool).await.unwrap();
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guests (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL COLLATE NOCASE UNIQUE,
                phone TEXT,
                whatsapp_number TEXT,
                adult_count INTEGER NOT NULL DEFAULT 1,
                kid_count INTEGER NOT NULL DEFAULT 0,
                rsvp_status TEXT NOT NULL DEFAULT 'pending',
                requires_accommodation BOOLEAN NOT NULL DEFAULT 0,
                transport_mode TEXT,
                flight_number TEXT,
                train_number TEXT,
                pickup_required BOOLEAN NOT NULL DEFAULT 0,
                pickup_date TEXT,
                pickup_time TEXT,
                pickup_location TEXT,
                dropoff_required BOOLEAN NOT NULL DEFAULT 0,
                dropoff_date TEXT,
                dropoff_time TEXT,
                dropoff_location TEXT,
                room_number TEXT,
                id_document_urls TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                step1_completed BOOLEAN NOT NULL DEFAULT 0,
                step2_completed BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admins (
                email TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL DEFAULT '',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admin_sessions (
                token TEXT PRIMARY KEY,
                admin_email TEXT NOT NULL REFERENCES admins(email) ON DELETE CASCADE,
                expires_at TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dashboard_content (
                section TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gallery_images (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                caption TEXT,
                uploaded_by TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_templates (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL COLLATE NOCASE UNIQUE,
                body TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_logs (
                id TEXT PRIMARY KEY,
                guest_id TEXT REFERENCES guests(id),
                recipient TEXT NOT NULL,
                body TEXT NOT NULL,
                status TEXT NOT NULL,
                provider_message_id TEXT,
                error TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_message_logs_guest ON message_logs(guest_id)")
            .execute(&self.pool)
            .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

/// Filesystem path of a `sqlite:` URL, or `None` for in-memory databases
fn file_path(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path() {
        assert_eq!(file_path("sqlite:./data/wedding.db"), Some("./data/wedding.db"));
        assert_eq!(file_path("sqlite://data/w.db?mode=rwc"), Some("data/w.db"));
        assert_eq!(file_path("sqlite::memory:"), None);
        assert_eq!(file_path("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::in_memory().await;
        db.run_migrations().await.unwrap();
        assert!(db.ping().await);
    }
}
