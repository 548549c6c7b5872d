//! Public RSVP flow: step 1, step 2 with ID documents, and returning-guest lookup.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use shared::{
    clean_optional, normalize_email,
    rsvp::{check_document_count, ensure_step2_allowed, validate_step1, validate_travel},
    Guest, LookupRequest, RsvpResponse, Step1Request, TransportMode,
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    notify,
    state::AppState,
    uploads::{self, StagedUpload, UploadKind},
};

/// POST /api/guests/step1
pub async fn submit_step1(
    State(state): State<AppState>,
    Json(req): Json<Step1Request>,
) -> Result<(StatusCode, Json<RsvpResponse>)> {
    validate_step1(&req)?;

    let (guest, status) = match req.guest_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(id) => {
            let mut guest = state
                .db
                .get_guest(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Guest {} not found", id)))?;
            apply_step1(&mut guest, req);
            state.db.update_guest(&guest).await?;
            tracing::info!("Guest {} updated step 1 ({})", guest.id, guest.rsvp_status);
            (guest, StatusCode::OK)
        }
        None => {
            let mut guest = new_guest(Uuid::new_v4().to_string());
            apply_step1(&mut guest, req);
            state.db.insert_guest(&guest).await?;
            tracing::info!("New RSVP from {} ({})", guest.full_name(), guest.rsvp_status);
            (guest, StatusCode::CREATED)
        }
    };

    notify::spawn_rsvp_notification(&state.config.smtp, &guest);

    // Re-read for database timestamps
    let guest = state.db.get_guest(&guest.id).await?.unwrap_or(guest);
    Ok((status, Json(RsvpResponse::new(guest))))
}

fn new_guest(id: String) -> Guest {
    Guest {
        id,
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        phone: None,
        whatsapp_number: None,
        adult_count: 1,
        kid_count: 0,
        rsvp_status: Default::default(),
        requires_accommodation: false,
        travel: Default::default(),
        room_number: None,
        id_document_urls: Vec::new(),
        notes: None,
        step1_completed: false,
        step2_completed: false,
        created_at: None,
        updated_at: None,
    }
}

/// Step 1 answers overwrite identity and party fields. Step 2 data is left alone.
fn apply_step1(guest: &mut Guest, req: Step1Request) {
    guest.first_name = req.first_name.trim().to_string();
    guest.last_name = req.last_name.trim().to_string();
    guest.email = normalize_email(&req.email);
    guest.phone = clean_optional(req.phone);
    guest.whatsapp_number = clean_optional(req.whatsapp_number);
    guest.adult_count = req.adult_count;
    guest.kid_count = req.kid_count;
    guest.rsvp_status = req.rsvp_status;
    guest.requires_accommodation = req.requires_accommodation;
    guest.step1_completed = true;
}

// ============================================================================
// Step 2
// ============================================================================

/// Text fields of the step 2 form
#[derive(Debug, Default)]
struct Step2Form {
    transport_mode: Option<String>,
    flight_number: Option<String>,
    train_number: Option<String>,
    pickup_required: Option<bool>,
    pickup_date: Option<String>,
    pickup_time: Option<String>,
    pickup_location: Option<String>,
    dropoff_required: Option<bool>,
    dropoff_date: Option<String>,
    dropoff_time: Option<String>,
    dropoff_location: Option<String>,
    requires_accommodation: Option<bool>,
    notes: Option<String>,
    existing_document_urls: Vec<String>,
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

impl Step2Form {
    fn set(&mut self, name: &str, value: String) -> Result<()> {
        let text = || clean_optional(Some(value.clone()));
        match name {
            "transport_mode" => self.transport_mode = text(),
            "flight_number" => self.flight_number = text(),
            "train_number" => self.train_number = text(),
            "pickup_required" => self.pickup_required = Some(parse_flag(&value)),
            "pickup_date" => self.pickup_date = text(),
            "pickup_time" => self.pickup_time = text(),
            "pickup_location" => self.pickup_location = text(),
            "dropoff_required" => self.dropoff_required = Some(parse_flag(&value)),
            "dropoff_date" => self.dropoff_date = text(),
            "dropoff_time" => self.dropoff_time = text(),
            "dropoff_location" => self.dropoff_location = text(),
            "requires_accommodation" => self.requires_accommodation = Some(parse_flag(&value)),
            "notes" => self.notes = text(),
            "existing_document_urls" => {
                if !value.trim().is_empty() {
                    self.existing_document_urls = serde_json::from_str(&value).map_err(|_| {
                        AppError::validation(
                            "existing_document_urls",
                            "Expected a JSON list of document URLs",
                        )
                    })?;
                }
            }
            other => tracing::debug!("Ignoring unknown step 2 field '{}'", other),
        }
        Ok(())
    }

    /// Applies the form to `guest`. Kept URLs must already belong to the guest.
    fn apply(self, guest: &mut Guest) -> Result<()> {
        let transport_mode = match self.transport_mode.as_deref() {
            Some(mode) => Some(mode.parse::<TransportMode>()?),
            None => None,
        };
        let travel = &mut guest.travel;
        travel.transport_mode = transport_mode;
        travel.flight_number = self.flight_number;
        travel.train_number = self.train_number;
        travel.pickup_required = self.pickup_required.unwrap_or(false);
        travel.pickup_date = self.pickup_date;
        travel.pickup_time = self.pickup_time;
        travel.pickup_location = self.pickup_location;
        travel.dropoff_required = self.dropoff_required.unwrap_or(false);
        travel.dropoff_date = self.dropoff_date;
        travel.dropoff_time = self.dropoff_time;
        travel.dropoff_location = self.dropoff_location;
        if let Some(accommodation) = self.requires_accommodation {
            guest.requires_accommodation = accommodation;
        }
        if self.notes.is_some() {
            guest.notes = self.notes;
        }
        validate_travel(&guest.travel)?;

        let kept: Vec<String> = self
            .existing_document_urls
            .into_iter()
            .filter(|url| guest.id_document_urls.contains(url))
            .collect();
        guest.id_document_urls = kept;
        Ok(())
    }
}

/// POST /api/guests/{id}/step2
pub async fn submit_step2(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<RsvpResponse>> {
    let mut guest = state
        .db
        .get_guest(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Guest {} not found", id)))?;
    ensure_step2_allowed(&guest)?;

    let staging_dir = state.config.uploads.staging_path();
    let max_bytes = state.config.uploads.max_file_bytes;
    let mut form = Step2Form::default();
    let mut staged: Vec<StagedUpload> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "id_documents" {
            staged.push(StagedUpload::from_field(field, UploadKind::IdDocument, &staging_dir, max_bytes).await?);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid form field {}: {}", name, e)))?;
            form.set(&name, value)?;
        }
    }

    form.apply(&mut guest)?;
    // Nothing is stored until the count is known to be sufficient
    check_document_count(guest.adult_count, guest.id_document_urls.len() + staged.len())?;

    let mut stored = Vec::with_capacity(staged.len());
    for upload in staged {
        let key = upload.object_key();
        match state.store.put(&key, upload).await {
            Ok(url) => stored.push(url),
            Err(e) => {
                uploads::discard(state.store.as_ref(), &stored).await;
                return Err(e.into());
            }
        }
    }
    guest.id_document_urls.extend(stored.iter().cloned());
    guest.step2_completed = true;
    if let Err(e) = state.db.update_guest(&guest).await {
        uploads::discard(state.store.as_ref(), &stored).await;
        return Err(e);
    }
    tracing::info!(
        "Guest {} completed step 2 with {} ID documents",
        guest.id,
        guest.id_document_urls.len()
    );

    let guest = state.db.get_guest(&guest.id).await?.unwrap_or(guest);
    Ok(Json(RsvpResponse::new(guest)))
}

// ============================================================================
// Lookup
// ============================================================================

/// POST /api/guests/lookup
pub async fn lookup(
    State(state): State<AppState>,
    Json(req): Json<LookupRequest>,
) -> Result<Json<RsvpResponse>> {
    if req.first_name.trim().is_empty() {
        return Err(AppError::validation("first_name", "First name is required"));
    }
    if req.email.trim().is_empty() {
        return Err(AppError::validation("email", "Email is required"));
    }

    let guest = state
        .db
        .find_guest_by_name_and_email(&req.first_name, &req.email)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("We couldn't find an RSVP with that name and email".to_string())
        })?;
    tracing::debug!("Returning guest {} found", guest.id);
    Ok(Json(RsvpResponse::new(guest)))
}

/// GET /api/guests/{id}
pub async fn get_guest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RsvpResponse>> {
    let guest = state
        .db
        .get_guest(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Guest {} not found", id)))?;
    Ok(Json(RsvpResponse::new(guest)))
}
