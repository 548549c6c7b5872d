use shared::{DashboardContent, GalleryImage};

use super::{ContentRow, Database, GalleryRow};
use crate::error::Result;

impl Database {
    // Dashboard content
    pub async fn list_content(&self) -> Result<Vec<DashboardContent>> {
        let rows = sqlx::query_as::<_, ContentRow>(
            "SELECT section, title, body, updated_at FROM dashboard_content ORDER BY section",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DashboardContent::from).collect())
    }

    pub async fn get_content(&self, section: &str) -> Result<Option<DashboardContent>> {
        let row = sqlx::query_as::<_, ContentRow>(
            "SELECT section, title, body, updated_at FROM dashboard_content WHERE section = ?",
        )
        .bind(section)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DashboardContent::from))
    }

    pub async fn upsert_content(&self, section: &str, title: &str, body: &str) -> Result<DashboardContent> {
        let row = sqlx::query_as::<_, ContentRow>(
            r#"
            INSERT INTO dashboard_content (section, title, body) VALUES (?, ?, ?)
            ON CONFLICT(section) DO UPDATE SET
                title = excluded.title,
                body = excluded.body,
                updated_at = CURRENT_TIMESTAMP
            RETURNING section, title, body, updated_at
            "#,
        )
        .bind(section)
        .bind(title)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn delete_content(&self, section: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dashboard_content WHERE section = ?")
            .bind(section)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Gallery
    pub async fn insert_gallery_image(
        &self,
        id: &str,
        url: &str,
        caption: Option<&str>,
        uploaded_by: Option<&str>,
    ) -> Result<GalleryImage> {
        // New images go to the end of the gallery
        let row = sqlx::query_as::<_, GalleryRow>(
            r#"
            INSERT INTO gallery_images (id, url, caption, uploaded_by, sort_order)
            VALUES (?, ?, ?, ?, (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM gallery_images))
            RETURNING id, url, caption, uploaded_by, sort_order, created_at
            "#,
        )
        .bind(id)
        .bind(url)
        .bind(caption)
        .bind(uploaded_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn list_gallery(&self) -> Result<Vec<GalleryImage>> {
        let rows = sqlx::query_as::<_, GalleryRow>(
            "SELECT id, url, caption, uploaded_by, sort_order, created_at \
             FROM gallery_images ORDER BY sort_order, created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(GalleryImage::from).collect())
    }

    pub async fn get_gallery_image(&self, id: &str) -> Result<Option<GalleryImage>> {
        let row = sqlx::query_as::<_, GalleryRow>(
            "SELECT id, url, caption, uploaded_by, sort_order, created_at FROM gallery_images WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(GalleryImage::from))
    }

    pub async fn update_gallery_image(
        &self,
        id: &str,
        caption: Option<&str>,
        sort_order: i64,
    ) -> Result<Option<GalleryImage>> {
        let row = sqlx::query_as::<_, GalleryRow>(
            r#"
            UPDATE gallery_images SET caption = ?, sort_order = ? WHERE id = ?
            RETURNING id, url, caption, uploaded_by, sort_order, created_at
            "#,
        )
        .bind(caption)
        .bind(sort_order)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(GalleryImage::from))
    }

    pub async fn delete_gallery_image(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM gallery_images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
