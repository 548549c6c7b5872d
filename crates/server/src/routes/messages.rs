use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{
    template, BulkSendRequest, BulkSendResponse, MessageLog, MessageTemplate, PreviewRequest,
    PreviewResponse, SendMessageRequest, TemplateInput,
};

use crate::{
    auth::AuthAdmin,
    error::{AppError, Result},
    messaging,
    state::AppState,
};

/// POST /api/admin/messages/send
pub async fn send(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<MessageLog>> {
    let transport = state.transport()?;
    let body = messaging::resolve_body(&state.db, req.message.as_deref(), req.template_id.as_deref()).await?;

    let (guest_id, body) = match req.guest_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => {
            let guest = state
                .db
                .get_guest(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Guest {} not found", id)))?;
            (Some(guest.id.clone()), template::render(&body, &guest))
        }
        None => (None, body),
    };

    let log = messaging::send_one(&state.db, transport.as_ref(), guest_id.as_deref(), &req.phone, &body).await?;
    tracing::info!("Admin {} sent message {}", admin.email, log.id);
    Ok(Json(log))
}

/// POST /api/admin/messages/bulk
pub async fn bulk(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Json(req): Json<BulkSendRequest>,
) -> Result<Json<BulkSendResponse>> {
    let transport = state.transport()?;
    if req.guest_ids.is_empty() {
        return Err(AppError::validation("guest_ids", "Select at least one guest"));
    }
    let body = messaging::resolve_body(&state.db, req.message.as_deref(), req.template_id.as_deref()).await?;

    tracing::info!("Admin {} started bulk send to {} guests", admin.email, req.guest_ids.len());
    let response = messaging::send_bulk(&state.db, transport.as_ref(), &req.guest_ids, &body).await?;
    Ok(Json(response))
}

/// POST /api/admin/messages/preview
pub async fn preview(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>> {
    let guest = state
        .db
        .get_guest(&req.guest_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Guest {} not found", req.guest_id)))?;
    let body = messaging::resolve_body(&state.db, req.message.as_deref(), req.template_id.as_deref()).await?;
    Ok(Json(PreviewResponse {
        rendered: template::render(&body, &guest),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryFilter {
    pub guest_id: Option<String>,
}

/// GET /api/admin/messages?guest_id=
pub async fn history(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Query(filter): Query<HistoryFilter>,
) -> Result<Json<Vec<MessageLog>>> {
    let guest_id = filter.guest_id.as_deref().filter(|id| !id.is_empty());
    Ok(Json(state.db.list_message_logs(guest_id).await?))
}

// ============================================================================
// Templates
// ============================================================================

fn validate_template(input: &TemplateInput) -> Result<(&str, &str)> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name", "Template name is required"));
    }
    let body = input.body.trim();
    if body.is_empty() {
        return Err(AppError::validation("body", "Template text is required"));
    }
    Ok((name, body))
}

/// GET /api/admin/templates
pub async fn list_templates(
    State(state): State<AppState>,
    _admin: AuthAdmin,
) -> Result<Json<Vec<MessageTemplate>>> {
    Ok(Json(state.db.list_templates().await?))
}

/// POST /api/admin/templates
pub async fn create_template(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Json(input): Json<TemplateInput>,
) -> Result<(StatusCode, Json<MessageTemplate>)> {
    let (name, body) = validate_template(&input)?;
    let template = state.db.create_template(name, body).await?;
    tracing::info!("Template '{}' created by {}", template.name, admin.email);
    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /api/admin/templates/{id}
pub async fn update_template(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
    Json(input): Json<TemplateInput>,
) -> Result<Json<MessageTemplate>> {
    let (name, body) = validate_template(&input)?;
    let template = state
        .db
        .update_template(&id, name, body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {} not found", id)))?;
    Ok(Json(template))
}

/// DELETE /api/admin/templates/{id}
pub async fn delete_template(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_template(&id).await? {
        return Err(AppError::NotFound(format!("Template {} not found", id)));
    }
    tracing::info!("Template {} deleted by {}", id, admin.email);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::messaging::fake::FakeTransport;
    use crate::test_support::{authed, delete, get, json_request, read_json, TestApp};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use shared::{Guest, RsvpStatus, TravelDetails};

    fn guest(id: &str, first: &str, whatsapp: Option<&str>, accommodation: bool) -> Guest {
        Guest {
            id: id.to_string(),
            first_name: first.to_string(),
            last_name: "Smith".to_string(),
            email: format!("{}@example.com", id),
            phone: None,
            whatsapp_number: whatsapp.map(str::to_string),
            adult_count: 2,
            kid_count: 1,
            rsvp_status: RsvpStatus::Attending,
            requires_accommodation: accommodation,
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

    #[tokio::test]
    async fn test_preview_renders_template_for_guest() {
        let app = TestApp::new().await;
        app.state.db.insert_guest(&guest("g1", "John", None, true)).await.unwrap();
        let token = app.login("x").await;

        let body = json!({
            "guest_id": "g1",
            "message": "Hi {{firstName}}, party of {{guestCount}}.{{ifAccommodation}} Room: {{roomNumber}}{{/ifAccommodation}}",
        });
        let response = app
            .call(authed(json_request(Method::POST, "/api/admin/messages/preview", &body), &token))
            .await;
        assert_eq!(
            read_json(response).await["rendered"],
            "Hi John, party of 3. Room: not assigned"
        );
        assert_eq!(app.transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_send_with_guest_personalizes_and_logs() {
        let app = TestApp::new().await;
        app.state.db.insert_guest(&guest("g1", "John", Some("+15550002"), false)).await.unwrap();
        let token = app.login("x").await;

        let body = json!({ "phone": "+15550002", "message": "Hello {{fullName}}", "guest_id": "g1" });
        let response = app
            .call(authed(json_request(Method::POST, "/api/admin/messages/send", &body), &token))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let log = read_json(response).await;
        assert_eq!(log["body"], "Hello John Smith");
        assert_eq!(log["guest_id"], "g1");

        let history = read_json(app.call(authed(get("/api/admin/messages?guest_id=g1"), &token)).await).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_is_upstream_error() {
        let app = TestApp::with_transport(FakeTransport::rejecting(&["+15550009"])).await;
        let token = app.login("x").await;
        let body = json!({ "phone": "+15550009", "message": "Hello" });
        let response = app
            .call(authed(json_request(Method::POST, "/api/admin/messages/send", &body), &token))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(read_json(response).await["error"]["message"]
            .as_str()
            .unwrap()
            .contains("not a valid WhatsApp number"));
        assert_eq!(app.state.db.list_message_logs(None).await.unwrap()[0].status, "failed");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_log() {
        let app = TestApp::without_messaging().await;
        let token = app.login("x").await;
        let body = json!({ "phone": "+15550002", "message": "Hello" });
        let response = app
            .call(authed(json_request(Method::POST, "/api/admin/messages/send", &body), &token))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["error"]["code"], "config_error");
        assert!(json["error"]["message"].as_str().unwrap().contains("TWILIO_ACCOUNT_SID"));
        assert!(app.state.db.list_message_logs(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_skips_guest_without_whatsapp() {
        let app = TestApp::new().await;
        app.state.db.insert_guest(&guest("g1", "Ana", Some("+15550001"), false)).await.unwrap();
        app.state.db.insert_guest(&guest("g2", "Ben", None, false)).await.unwrap();
        app.state.db.insert_guest(&guest("g3", "Cy", Some("+15550003"), false)).await.unwrap();
        let token = app.login("x").await;

        let template = read_json(
            app.call(authed(
                json_request(
                    Method::POST,
                    "/api/admin/templates",
                    &json!({ "name": "Reminder", "body": "See you soon, {{firstName}}!" }),
                ),
                &token,
            ))
            .await,
        )
        .await;

        let body = json!({ "guest_ids": ["g1", "g2", "g3"], "template_id": template["id"] });
        let response = app
            .call(authed(json_request(Method::POST, "/api/admin/messages/bulk", &body), &token))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["sent"], 2);
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["results"][1]["outcome"], "skipped");
        assert_eq!(app.transport.attempts(), 2);
        assert_eq!(app.transport.sent.lock().unwrap()[0].1, "See you soon, Ana!");
    }

    #[tokio::test]
    async fn test_template_crud_and_conflict() {
        let app = TestApp::new().await;
        let token = app.login("x").await;
        let create = |name: &str| {
            authed(
                json_request(Method::POST, "/api/admin/templates", &json!({ "name": name, "body": "Hi" })),
                &token,
            )
        };

        let response = app.call(create("Welcome")).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = read_json(response).await["id"].as_str().unwrap().to_string();
        assert_eq!(app.call(create("Welcome")).await.status(), StatusCode::CONFLICT);

        let update = json!({ "name": "Welcome back", "body": "Hello again" });
        let response = app
            .call(authed(json_request(Method::PUT, &format!("/api/admin/templates/{}", id), &update), &token))
            .await;
        assert_eq!(read_json(response).await["name"], "Welcome back");

        let response = app
            .call(authed(delete(&format!("/api/admin/templates/{}", id)), &token))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let listed = read_json(app.call(authed(get("/api/admin/templates"), &token)).await).await;
        assert!(listed.as_array().unwrap().is_empty());
    }
}
