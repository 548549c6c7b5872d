use shared::{
    AdminInfo, DashboardContent, GalleryImage, Guest, MessageLog, MessageTemplate, RsvpStatus,
    TransportMode, TravelDetails,
};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct GuestRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub whatsapp_number: Option<String>,
    pub adult_count: i64,
    pub kid_count: i64,
    pub rsvp_status: String,
    pub requires_accommodation: bool,
    pub transport_mode: Option<String>,
    pub flight_number: Option<String>,
    pub train_number: Option<String>,
    pub pickup_required: bool,
    pub pickup_date: Option<String>,
    pub pickup_time: Option<String>,
    pub pickup_location: Option<String>,
    pub dropoff_required: bool,
    pub dropoff_date: Option<String>,
    pub dropoff_time: Option<String>,
    pub dropoff_location: Option<String>,
    pub room_number: Option<String>,
    pub id_document_urls: String,
    pub notes: Option<String>,
    pub step1_completed: bool,
    pub step2_completed: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<GuestRow> for Guest {
    fn from(row: GuestRow) -> Self {
        let rsvp_status = row.rsvp_status.parse().unwrap_or_else(|_| {
            tracing::warn!("Guest {} has unknown rsvp_status '{}'", row.id, row.rsvp_status);
            RsvpStatus::Pending
        });
        let transport_mode = row
            .transport_mode
            .as_deref()
            .and_then(|mode| mode.parse::<TransportMode>().ok());
        let id_document_urls = serde_json::from_str(&row.id_document_urls).unwrap_or_else(|e| {
            tracing::warn!("Guest {} has unreadable id_document_urls: {}", row.id, e);
            Vec::new()
        });

        Guest {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            whatsapp_number: row.whatsapp_number,
            adult_count: row.adult_count.max(0) as u32,
            kid_count: row.kid_count.max(0) as u32,
            rsvp_status,
            requires_accommodation: row.requires_accommodation,
            travel: TravelDetails {
                transport_mode,
                flight_number: row.flight_number,
                train_number: row.train_number,
                pickup_required: row.pickup_required,
                pickup_date: row.pickup_date,
                pickup_time: row.pickup_time,
                pickup_location: row.pickup_location,
                dropoff_required: row.dropoff_required,
                dropoff_date: row.dropoff_date,
                dropoff_time: row.dropoff_time,
                dropoff_location: row.dropoff_location,
            },
            room_number: row.room_number,
            id_document_urls,
            notes: row.notes,
            step1_completed: row.step1_completed,
            step2_completed: row.step2_completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Admin {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: Option<String>,
}

impl Admin {
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

impl From<Admin> for AdminInfo {
    fn from(admin: Admin) -> Self {
        AdminInfo {
            has_password: admin.has_password(),
            email: admin.email,
            name: admin.name,
            created_at: admin.created_at,
        }
    }
}

/// A session joined with the admin it belongs to
#[derive(Debug, Clone, FromRow)]
pub struct AdminSession {
    pub token: String,
    pub admin_email: String,
    pub admin_name: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ContentRow {
    pub section: String,
    pub title: String,
    pub body: String,
    pub updated_at: Option<String>,
}

impl From<ContentRow> for DashboardContent {
    fn from(row: ContentRow) -> Self {
        DashboardContent {
            section: row.section,
            title: row.title,
            body: row.body,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct GalleryRow {
    pub id: String,
    pub url: String,
    pub caption: Option<String>,
    pub uploaded_by: Option<String>,
    pub sort_order: i64,
    pub created_at: Option<String>,
}

impl From<GalleryRow> for GalleryImage {
    fn from(row: GalleryRow) -> Self {
        GalleryImage {
            id: row.id,
            url: row.url,
            caption: row.caption,
            uploaded_by: row.uploaded_by,
            sort_order: row.sort_order,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    pub id: String,
    pub name: String,
    pub body: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<TemplateRow> for MessageTemplate {
    fn from(row: TemplateRow) -> Self {
        MessageTemplate {
            id: row.id,
            name: row.name,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageLogRow {
    pub id: String,
    pub guest_id: Option<String>,
    pub recipient: String,
    pub body: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: Option<String>,
}

impl From<MessageLogRow> for MessageLog {
    fn from(row: MessageLogRow) -> Self {
        MessageLog {
            id: row.id,
            guest_id: row.guest_id,
            recipient: row.recipient,
            body: row.body,
            status: row.status,
            provider_message_id: row.provider_message_id,
            error: row.error,
            created_at: row.created_at,
        }
    }
}

/// A delivery attempt about to be recorded
#[derive(Debug, Clone)]
pub struct NewMessageLog {
    pub guest_id: Option<String>,
    pub recipient: String,
    pub body: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}
