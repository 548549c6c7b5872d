use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{ContentInput, DashboardContent};

use crate::{
    auth::AuthAdmin,
    error::{AppError, Result},
    state::AppState,
};

/// Section names are lowercase identifiers like `our_story`
fn validate_section(section: &str) -> Result<()> {
    let valid = !section.is_empty()
        && section
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(AppError::validation(
            "section",
            "Section names may only contain lowercase letters, digits and underscores",
        ));
    }
    Ok(())
}

/// GET /api/content
pub async fn list_content(State(state): State<AppState>) -> Result<Json<Vec<DashboardContent>>> {
    Ok(Json(state.db.list_content().await?))
}

/// GET /api/content/{section}
pub async fn get_content(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Json<DashboardContent>> {
    let content = state
        .db
        .get_content(&section)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No content for section '{}'", section)))?;
    Ok(Json(content))
}

/// PUT /api/admin/content/{section}
pub async fn put_content(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Path(section): Path<String>,
    Json(input): Json<ContentInput>,
) -> Result<Json<DashboardContent>> {
    validate_section(&section)?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title", "Title is required"));
    }

    let content = state.db.upsert_content(&section, title, &input.body).await?;
    tracing::info!("Content section '{}' saved by {}", section, admin.email);
    Ok(Json(content))
}

/// DELETE /api/admin/content/{section}
pub async fn delete_content(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Path(section): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_content(&section).await? {
        return Err(AppError::NotFound(format!("No content for section '{}'", section)));
    }
    tracing::info!("Content section '{}' deleted by {}", section, admin.email);
    Ok(StatusCode::NO_CONTENT)
}
