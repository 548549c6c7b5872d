use shared::{Guest, GuestSummary, RsvpStatus};

use super::{Database, GuestRow};
use crate::error::{AppError, Result};

const GUEST_COLUMNS: &str = "id, first_name, last_name, email, phone, whatsapp_number, \
    adult_count, kid_count, rsvp_status, requires_accommodation, transport_mode, \
    flight_number, train_number, pickup_required, pickup_date, pickup_time, pickup_location, \
    dropoff_required, dropoff_date, dropoff_time, dropoff_location, room_number, \
    id_document_urls, notes, step1_completed, step2_completed, created_at, updated_at";

const DUPLICATE_EMAIL: &str = "A guest with this email has already RSVP'd";

fn document_urls_json(guest: &Guest) -> Result<String> {
    serde_json::to_string(&guest.id_document_urls)
        .map_err(|e| AppError::Internal(format!("encode id_document_urls: {}", e)))
}

impl Database {
    pub async fn insert_guest(&self, guest: &Guest) -> Result<()> {
        let urls = document_urls_json(guest)?;
        sqlx::query(
            r#"
            INSERT INTO guests (
                id, first_name, last_name, email, phone, whatsapp_number,
                adult_count, kid_count, rsvp_status, requires_accommodation,
                transport_mode, flight_number, train_number,
                pickup_required, pickup_date, pickup_time, pickup_location,
                dropoff_required, dropoff_date, dropoff_time, dropoff_location,
                room_number, id_document_urls, notes, step1_completed, step2_completed
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&guest.id)
        .bind(&guest.first_name)
        .bind(&guest.last_name)
        .bind(&guest.email)
        .bind(&guest.phone)
        .bind(&guest.whatsapp_number)
        .bind(guest.adult_count as i64)
        .bind(guest.kid_count as i64)
        .bind(guest.rsvp_status.as_str())
        .bind(guest.requires_accommodation)
        .bind(guest.travel.transport_mode.map(|m| m.as_str()))
        .bind(&guest.travel.flight_number)
        .bind(&guest.travel.train_number)
        .bind(guest.travel.pickup_required)
        .bind(&guest.travel.pickup_date)
        .bind(&guest.travel.pickup_time)
        .bind(&guest.travel.pickup_location)
        .bind(guest.travel.dropoff_required)
        .bind(&guest.travel.dropoff_date)
        .bind(&guest.travel.dropoff_time)
        .bind(&guest.travel.dropoff_location)
        .bind(&guest.room_number)
        .bind(urls)
        .bind(&guest.notes)
        .bind(guest.step1_completed)
        .bind(guest.step2_completed)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, DUPLICATE_EMAIL))?;
        Ok(())
    }

    /// Writes every mutable column of an existing guest
    pub async fn update_guest(&self, guest: &Guest) -> Result<()> {
        let urls = document_urls_json(guest)?;
        let result = sqlx::query(
            r#"
            UPDATE guests SET
                first_name = ?, last_name = ?, email = ?, phone = ?, whatsapp_number = ?,
                adult_count = ?, kid_count = ?, rsvp_status = ?, requires_accommodation = ?,
                transport_mode = ?, flight_number = ?, train_number = ?,
                pickup_required = ?, pickup_date = ?, pickup_time = ?, pickup_location = ?,
                dropoff_required = ?, dropoff_date = ?, dropoff_time = ?, dropoff_location = ?,
                room_number = ?, id_document_urls = ?, notes = ?,
                step1_completed = ?, step2_completed = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&guest.first_name)
        .bind(&guest.last_name)
        .bind(&guest.email)
        .bind(&guest.phone)
        .bind(&guest.whatsapp_number)
        .bind(guest.adult_count as i64)
        .bind(guest.kid_count as i64)
        .bind(guest.rsvp_status.as_str())
        .bind(guest.requires_accommodation)
        .bind(guest.travel.transport_mode.map(|m| m.as_str()))
        .bind(&guest.travel.flight_number)
        .bind(&guest.travel.train_number)
        .bind(guest.travel.pickup_required)
        .bind(&guest.travel.pickup_date)
        .bind(&guest.travel.pickup_time)
        .bind(&guest.travel.pickup_location)
        .bind(guest.travel.dropoff_required)
        .bind(&guest.travel.dropoff_date)
        .bind(&guest.travel.dropoff_time)
        .bind(&guest.travel.dropoff_location)
        .bind(&guest.room_number)
        .bind(urls)
        .bind(&guest.notes)
        .bind(guest.step1_completed)
        .bind(guest.step2_completed)
        .bind(&guest.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, DUPLICATE_EMAIL))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Guest {} not found", guest.id)));
        }
        Ok(())
    }

    pub async fn get_guest(&self, id: &str) -> Result<Option<Guest>> {
        let row = sqlx::query_as::<_, GuestRow>(&format!(
            "SELECT {} FROM guests WHERE id = ?",
            GUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Guest::from))
    }

    /// Returning-guest lookup; both keys compare case-insensitively
    pub async fn find_guest_by_name_and_email(
        &self,
        first_name: &str,
        email: &str,
    ) -> Result<Option<Guest>> {
        let row = sqlx::query_as::<_, GuestRow>(&format!(
            "SELECT {} FROM guests WHERE first_name = ? COLLATE NOCASE AND email = ? COLLATE NOCASE",
            GUEST_COLUMNS
        ))
        .bind(first_name.trim())
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Guest::from))
    }

    /// Newest first, optionally narrowed to one RSVP status
    pub async fn list_guests(&self, status: Option<RsvpStatus>) -> Result<Vec<Guest>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, GuestRow>(&format!(
                    "SELECT {} FROM guests WHERE rsvp_status = ? ORDER BY created_at DESC, rowid DESC",
                    GUEST_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, GuestRow>(&format!(
                    "SELECT {} FROM guests ORDER BY created_at DESC, rowid DESC",
                    GUEST_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(Guest::from).collect())
    }

    pub async fn guest_summary(&self) -> Result<GuestSummary> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(rsvp_status = 'pending'), 0),
                COALESCE(SUM(rsvp_status = 'attending'), 0),
                COALESCE(SUM(rsvp_status = 'tentative'), 0),
                COALESCE(SUM(rsvp_status = 'declined'), 0),
                COALESCE(SUM(CASE WHEN rsvp_status = 'attending' THEN adult_count ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN rsvp_status = 'attending' THEN kid_count ELSE 0 END), 0),
                COALESCE(SUM(step2_completed), 0),
                COALESCE(SUM(requires_accommodation), 0)
            FROM guests
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let count = |n: i64| n.max(0) as u32;
        Ok(GuestSummary {
            total_guests: count(row.0),
            pending: count(row.1),
            attending: count(row.2),
            tentative: count(row.3),
            declined: count(row.4),
            attending_adults: count(row.5),
            attending_kids: count(row.6),
            travel_details_completed: count(row.7),
            accommodation_requests: count(row.8),
        })
    }
}
