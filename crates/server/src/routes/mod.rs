use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::{config::UploadBackend, state::AppState};

mod admin_guests;
mod auth;
mod content;
mod gallery;
mod guests;
mod health;
mod messages;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let uploads = &state.config.uploads;

    let public = Router::new()
        .route("/health", get(health::health_check))
        // Guest RSVP flow
        .route("/api/guests/step1", post(guests::submit_step1))
        .route("/api/guests/lookup", post(guests::lookup))
        .route("/api/guests/:id", get(guests::get_guest))
        .route("/api/guests/:id/step2", post(guests::submit_step2))
        // Dashboard
        .route("/api/content", get(content::list_content))
        .route("/api/content/:section", get(content::get_content))
        .route("/api/gallery", get(gallery::list_gallery).post(gallery::guest_upload));

    let admin = Router::new()
        .route("/api/admin/login", post(auth::login))
        .route("/api/admin/logout", post(auth::logout))
        .route("/api/admin/session", get(auth::session))
        .route("/api/admin/admins", get(auth::list_admins).post(auth::create_admin))
        // Guests
        .route("/api/admin/guests", get(admin_guests::list_guests))
        .route("/api/admin/guests/summary", get(admin_guests::summary))
        .route(
            "/api/admin/guests/:id",
            get(admin_guests::get_guest).patch(admin_guests::update_guest),
        )
        // Content and gallery
        .route(
            "/api/admin/content/:section",
            put(content::put_content).delete(content::delete_content),
        )
        .route("/api/admin/gallery", post(gallery::admin_upload))
        .route(
            "/api/admin/gallery/:id",
            patch(gallery::update_image).delete(gallery::delete_image),
        )
        // Messaging
        .route("/api/admin/messages", get(messages::history))
        .route("/api/admin/messages/send", post(messages::send))
        .route("/api/admin/messages/bulk", post(messages::bulk))
        .route("/api/admin/messages/preview", post(messages::preview))
        .route(
            "/api/admin/templates",
            get(messages::list_templates).post(messages::create_template),
        )
        .route(
            "/api/admin/templates/:id",
            put(messages::update_template).delete(messages::delete_template),
        );

    let mut router = public.merge(admin);

    // Locally stored files are served from the same origin
    if uploads.backend == UploadBackend::Local && uploads.public_prefix.starts_with('/') {
        router = router.nest_service(&uploads.public_prefix, ServeDir::new(&uploads.dir));
    }

    router
        // Multipart bodies are bounded by the request limit, not axum's 2MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(uploads.max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    // Credentialed CORS cannot use wildcards
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}
