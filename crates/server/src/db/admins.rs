use super::{Admin, AdminSession, Database};
use crate::error::{AppError, Result};

impl Database {
    // Admin operations
    pub async fn create_admin(&self, email: &str, name: &str, password_hash: &str) -> Result<Admin> {
        sqlx::query("INSERT INTO admins (email, name, password_hash) VALUES (?, ?, ?)")
            .bind(email)
            .bind(name)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::conflict_on_unique(e, format!("Admin {} already exists", email)))?;

        self.get_admin(email)
            .await?
            .ok_or_else(|| AppError::Internal(format!("admin {} vanished after insert", email)))
    }

    /// Inserts the admin unless a row already exists. Returns whether one was created.
    pub async fn ensure_admin(&self, email: &str, name: &str) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO admins (email, name) VALUES (?, ?)")
            .bind(email)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_admin(&self, email: &str) -> Result<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT email, name, password_hash, created_at FROM admins WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    pub async fn list_admins(&self) -> Result<Vec<Admin>> {
        let admins = sqlx::query_as::<_, Admin>(
            "SELECT email, name, password_hash, created_at FROM admins ORDER BY created_at, email",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(admins)
    }

    // Session operations
    pub async fn create_admin_session(
        &self,
        token: &str,
        admin_email: &str,
        expires_at: &str,
    ) -> Result<()> {
        sqlx::query("INSERT INTO admin_sessions (token, admin_email, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(admin_email)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_admin_session(&self, token: &str) -> Result<Option<AdminSession>> {
        let session = sqlx::query_as::<_, AdminSession>(
            r#"
            SELECT s.token, s.admin_email, a.name AS admin_name, s.expires_at
            FROM admin_sessions s
            JOIN admins a ON a.email = s.admin_email
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn delete_admin_session(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes sessions that expired at or before `now` (RFC 3339), plus unreadable ones
    pub async fn purge_expired_sessions(&self, now: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM admin_sessions \
             WHERE julianday(expires_at) IS NULL OR julianday(expires_at) <= julianday(?)",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_admin_conflict() {
        let db = Database::in_memory().await;
        let admin = db.create_admin("ana@example.com", "Ana", "").await.unwrap();
        assert!(!admin.has_password());

        let err = db.create_admin("ana@example.com", "Ana", "").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let db = Database::in_memory().await;
        assert!(db.ensure_admin("ana@example.com", "Ana").await.unwrap());
        assert!(!db.ensure_admin("ana@example.com", "Someone else").await.unwrap());

        let admin = db.get_admin("ana@example.com").await.unwrap().unwrap();
        assert_eq!(admin.name, "Ana");
        assert_eq!(db.list_admins().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let db = Database::in_memory().await;
        db.ensure_admin("ana@example.com", "Ana").await.unwrap();
        db.create_admin_session("tok", "ana@example.com", "2030-01-01T00:00:00Z")
            .await
            .unwrap();

        let session = db.get_admin_session("tok").await.unwrap().unwrap();
        assert_eq!(session.admin_name, "Ana");

        assert!(db.delete_admin_session("tok").await.unwrap());
        assert!(db.get_admin_session("tok").await.unwrap().is_none());
        assert!(!db.delete_admin_session("tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired_sessions() {
        let db = Database::in_memory().await;
        db.ensure_admin("ana@example.com", "Ana").await.unwrap();
        db.create_admin_session("old", "ana@example.com", "2026-01-01T00:00:00Z").await.unwrap();
        db.create_admin_session("edge", "ana@example.com", "2026-10-19T10:00:00+00:00").await.unwrap();
        db.create_admin_session("live", "ana@example.com", "2026-10-19T10:00:00.5+00:00").await.unwrap();
        db.create_admin_session("junk", "ana@example.com", "not a date").await.unwrap();

        let purged = db.purge_expired_sessions("2026-10-19T10:00:00Z").await.unwrap();
        assert_eq!(purged, 3);
        assert!(db.get_admin_session("old").await.unwrap().is_none());
        assert!(db.get_admin_session("edge").await.unwrap().is_none());
        assert!(db.get_admin_session("junk").await.unwrap().is_none());
        assert!(db.get_admin_session("live").await.unwrap().is_some());

        assert_eq!(db.purge_expired_sessions("2026-10-19T10:00:00Z").await.unwrap(), 0);
    }
}
