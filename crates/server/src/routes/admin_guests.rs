use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{
    clean_optional, normalize_email,
    rsvp::{check_party_size, validate_email, validate_phone},
    Guest, GuestSummary, GuestUpdate, RsvpStatus,
};

use crate::{
    auth::AuthAdmin,
    error::{AppError, Result},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct GuestFilter {
    pub status: Option<String>,
}

/// GET /api/admin/guests?status=
pub async fn list_guests(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Query(filter): Query<GuestFilter>,
) -> Result<Json<Vec<Guest>>> {
    let status = match filter.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<RsvpStatus>()?),
        None => None,
    };
    Ok(Json(state.db.list_guests(status).await?))
}

/// GET /api/admin/guests/summary
pub async fn summary(State(state): State<AppState>, _admin: AuthAdmin) -> Result<Json<GuestSummary>> {
    Ok(Json(state.db.guest_summary().await?))
}

/// GET /api/admin/guests/{id}
pub async fn get_guest(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<Json<Guest>> {
    let guest = state
        .db
        .get_guest(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Guest {} not found", id)))?;
    Ok(Json(guest))
}

/// PATCH /api/admin/guests/{id}
pub async fn update_guest(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Path(id): Path<String>,
    Json(update): Json<GuestUpdate>,
) -> Result<Json<Guest>> {
    let mut guest = state
        .db
        .get_guest(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Guest {} not found", id)))?;

    apply_update(&mut guest, update)?;
    state.db.update_guest(&guest).await?;
    tracing::info!("Guest {} updated by {}", guest.id, admin.email);

    let guest = state.db.get_guest(&id).await?.unwrap_or(guest);
    Ok(Json(guest))
}

fn required_text(field: &str, label: &str, value: String) -> Result<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::validation(field, format!("{} cannot be empty", label)));
    }
    Ok(value)
}

/// Present fields overwrite the guest. Blank optional text clears the field.
fn apply_update(guest: &mut Guest, update: GuestUpdate) -> Result<()> {
    if let Some(first_name) = update.first_name {
        guest.first_name = required_text("first_name", "First name", first_name)?;
    }
    if let Some(last_name) = update.last_name {
        guest.last_name = required_text("last_name", "Last name", last_name)?;
    }
    if let Some(email) = update.email {
        validate_email(&email)?;
        guest.email = normalize_email(&email);
    }
    if let Some(phone) = update.phone {
        validate_phone("phone", &phone)?;
        guest.phone = clean_optional(Some(phone));
    }
    if let Some(number) = update.whatsapp_number {
        validate_phone("whatsapp_number", &number)?;
        guest.whatsapp_number = clean_optional(Some(number));
    }
    if let Some(adults) = update.adult_count {
        if adults < 1 {
            return Err(AppError::validation("adult_count", "At least one adult must be included"));
        }
        guest.adult_count = adults;
    }
    if let Some(kids) = update.kid_count {
        guest.kid_count = kids;
    }
    check_party_size(guest.adult_count, guest.kid_count)?;
    if let Some(status) = update.rsvp_status {
        guest.rsvp_status = status;
    }
    if let Some(accommodation) = update.requires_accommodation {
        guest.requires_accommodation = accommodation;
    }

    let travel = &mut guest.travel;
    if let Some(mode) = update.transport_mode {
        travel.transport_mode = Some(mode);
    }
    if update.flight_number.is_some() {
        travel.flight_number = clean_optional(update.flight_number);
    }
    if update.train_number.is_some() {
        travel.train_number = clean_optional(update.train_number);
    }
    if let Some(required) = update.pickup_required {
        travel.pickup_required = required;
    }
    if update.pickup_date.is_some() {
        travel.pickup_date = clean_optional(update.pickup_date);
    }
    if update.pickup_time.is_some() {
        travel.pickup_time = clean_optional(update.pickup_time);
    }
    if update.pickup_location.is_some() {
        travel.pickup_location = clean_optional(update.pickup_location);
    }
    if let Some(required) = update.dropoff_required {
        travel.dropoff_required = required;
    }
    if update.dropoff_date.is_some() {
        travel.dropoff_date = clean_optional(update.dropoff_date);
    }
    if update.dropoff_time.is_some() {
        travel.dropoff_time = clean_optional(update.dropoff_time);
    }
    if update.dropoff_location.is_some() {
        travel.dropoff_location = clean_optional(update.dropoff_location);
    }

    if update.room_number.is_some() {
        guest.room_number = clean_optional(update.room_number);
    }
    if update.notes.is_some() {
        guest.notes = clean_optional(update.notes);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{authed, get, json_request, read_json, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use shared::TravelDetails;

    fn guest(id: &str, email: &str, status: RsvpStatus) -> Guest {
        Guest {
            id: id.to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            phone: None,
            whatsapp_number: None,
            adult_count: 2,
            kid_count: 0,
            rsvp_status: status,
            requires_accommodation: false,
            travel: TravelDetails::default(),
            room_number: None,
            id_document_urls: Vec::new(),
            notes: None,
            step1_completed: true,
            step2_completed: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_apply_update_sets_and_clears() {
        let mut g = guest("g1", "jane@example.com", RsvpStatus::Attending);
        g.notes = Some("vegetarian".to_string());
        let update = GuestUpdate {
            room_number: Some("12B".to_string()),
            notes: Some("  ".to_string()),
            rsvp_status: Some(RsvpStatus::Declined),
            ..Default::default()
        };
        apply_update(&mut g, update).unwrap();
        assert_eq!(g.room_number.as_deref(), Some("12B"));
        assert_eq!(g.notes, None);
        assert_eq!(g.rsvp_status, RsvpStatus::Declined);
        assert_eq!(g.first_name, "Jane");
    }

    #[test]
    fn test_apply_update_validates() {
        let mut g = guest("g1", "jane@example.com", RsvpStatus::Attending);
        let err = apply_update(&mut g, GuestUpdate { adult_count: Some(0), ..Default::default() }).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = apply_update(&mut g, GuestUpdate { email: Some("nope".into()), ..Default::default() }).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = apply_update(&mut g, GuestUpdate { first_name: Some(" ".into()), ..Default::default() }).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = apply_update(&mut g, GuestUpdate { kid_count: Some(u32::MAX), ..Default::default() }).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_list_filter_and_summary() {
        let app = TestApp::new().await;
        app.state.db.insert_guest(&guest("g1", "a@example.com", RsvpStatus::Attending)).await.unwrap();
        app.state.db.insert_guest(&guest("g2", "b@example.com", RsvpStatus::Declined)).await.unwrap();
        let token = app.login("x").await;

        let response = app.call(authed(get("/api/admin/guests?status=attending"), &token)).await;
        let list = read_json(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["id"], "g1");

        let response = app.call(authed(get("/api/admin/guests?status=maybe"), &token)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app.call(authed(get("/api/admin/guests/summary"), &token)).await;
        let summary = read_json(response).await;
        assert_eq!(summary["total_guests"], 2);
        assert_eq!(summary["attending_adults"], 2);
    }

    #[tokio::test]
    async fn test_patch_assigns_room_and_translates_conflict() {
        let app = TestApp::new().await;
        app.state.db.insert_guest(&guest("g1", "a@example.com", RsvpStatus::Attending)).await.unwrap();
        app.state.db.insert_guest(&guest("g2", "b@example.com", RsvpStatus::Attending)).await.unwrap();
        let token = app.login("x").await;

        let response = app
            .call(authed(
                json_request(Method::PATCH, "/api/admin/guests/g1", &json!({ "room_number": "Suite 4" })),
                &token,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["room_number"], "Suite 4");

        let response = app
            .call(authed(
                json_request(Method::PATCH, "/api/admin/guests/g2", &json!({ "email": "A@example.com" })),
                &token,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .call(authed(json_request(Method::PATCH, "/api/admin/guests/nope", &json!({})), &token))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
