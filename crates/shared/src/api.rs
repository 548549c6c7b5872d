use serde::{Deserialize, Serialize};

use crate::guest::{RsvpStatus, TransportMode};

// ============================================================================
// Admin auth
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
    pub name: String,
    pub expires_at: String,
}

/// Server-side view of the caller's admin session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub email: String,
    pub name: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    pub name: String,
    /// Omitted for admins who log in through the shared admin password
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminInfo {
    pub email: String,
    pub name: String,
    pub has_password: bool,
    pub created_at: Option<String>,
}

// ============================================================================
// Guest administration
// ============================================================================

/// Partial update applied by an admin. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp_number: Option<String>,
    pub adult_count: Option<u32>,
    pub kid_count: Option<u32>,
    pub rsvp_status: Option<RsvpStatus>,
    pub requires_accommodation: Option<bool>,
    pub transport_mode: Option<TransportMode>,
    pub flight_number: Option<String>,
    pub train_number: Option<String>,
    pub pickup_required: Option<bool>,
    pub pickup_date: Option<String>,
    pub pickup_time: Option<String>,
    pub pickup_location: Option<String>,
    pub dropoff_required: Option<bool>,
    pub dropoff_date: Option<String>,
    pub dropoff_time: Option<String>,
    pub dropoff_location: Option<String>,
    pub room_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GuestSummary {
    pub total_guests: u32,
    pub pending: u32,
    pub attending: u32,
    pub tentative: u32,
    pub declined: u32,
    pub attending_adults: u32,
    pub attending_kids: u32,
    pub travel_details_completed: u32,
    pub accommodation_requests: u32,
}

// ============================================================================
// Site content and gallery
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardContent {
    pub section: String,
    pub title: String,
    pub body: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentInput {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryImage {
    pub id: String,
    pub url: String,
    pub caption: Option<String>,
    pub uploaded_by: Option<String>,
    pub sort_order: i64,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryUpdate {
    pub caption: Option<String>,
    pub sort_order: Option<i64>,
}

// ============================================================================
// Messaging
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageTemplate {
    pub id: String,
    pub name: String,
    pub body: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInput {
    pub name: String,
    pub body: String,
}

/// One outbound message attempt, as recorded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageLog {
    pub id: String,
    pub guest_id: Option<String>,
    pub recipient: String,
    pub body: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub phone: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Personalize the message for this guest
    #[serde(default)]
    pub guest_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSendRequest {
    pub guest_ids: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
    /// Guest has no WhatsApp number on file
    Skipped,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSendResult {
    pub guest_id: String,
    pub guest_name: Option<String>,
    pub outcome: DeliveryOutcome,
    /// Id of the message log row, when a dispatch was attempted
    pub log_id: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSendResponse {
    pub results: Vec<BulkSendResult>,
    pub sent: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl BulkSendResponse {
    pub fn from_results(results: Vec<BulkSendResult>) -> Self {
        let count = |outcome: DeliveryOutcome| {
            results.iter().filter(|r| r.outcome == outcome).count() as u32
        };
        let sent = count(DeliveryOutcome::Sent);
        let failed = count(DeliveryOutcome::Failed);
        let skipped = count(DeliveryOutcome::Skipped) + count(DeliveryOutcome::NotFound);
        Self {
            results,
            sent,
            failed,
            skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub guest_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub rendered: String,
}

// ============================================================================
// Tests
// ============================================================================
