use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use shared::{clean_optional, GalleryImage, GalleryUpdate};
use uuid::Uuid;

use crate::{
    auth::AuthAdmin,
    error::{AppError, Result},
    state::AppState,
    uploads::{self, StagedUpload, UploadKind},
};

/// GET /api/gallery
pub async fn list_gallery(State(state): State<AppState>) -> Result<Json<Vec<GalleryImage>>> {
    Ok(Json(state.db.list_gallery().await?))
}

/// POST /api/gallery
pub async fn guest_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<GalleryImage>)> {
    let image = upload_photo(&state, multipart).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// POST /api/admin/gallery
pub async fn admin_upload(
    State(state): State<AppState>,
    admin: AuthAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<GalleryImage>)> {
    let image = upload_photo(&state, multipart).await?;
    tracing::debug!("Gallery image {} uploaded by admin {}", image.id, admin.email);
    Ok((StatusCode::CREATED, Json(image)))
}

/// Reads `photo`, `caption` and `uploaded_by`, stores the photo, and records it
async fn upload_photo(state: &AppState, mut multipart: Multipart) -> Result<GalleryImage> {
    let staging_dir = state.config.uploads.staging_path();
    let mut photo: Option<StagedUpload> = None;
    let mut caption = None;
    let mut uploaded_by = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "photo" => {
                photo = Some(
                    StagedUpload::from_field(
                        field,
                        UploadKind::Gallery,
                        &staging_dir,
                        state.config.uploads.max_file_bytes,
                    )
                    .await?,
                );
            }
            "caption" => caption = clean_optional(Some(field_text(field).await?)),
            "uploaded_by" => uploaded_by = clean_optional(Some(field_text(field).await?)),
            _ => {}
        }
    }

    let photo = photo.ok_or_else(|| AppError::validation("photo", "Please choose a photo to upload"))?;
    let key = photo.object_key();
    let url = state.store.put(&key, photo).await?;

    let image = match state
        .db
        .insert_gallery_image(
            &Uuid::new_v4().to_string(),
            &url,
            caption.as_deref(),
            uploaded_by.as_deref(),
        )
        .await
    {
        Ok(image) => image,
        Err(e) => {
            uploads::discard(state.store.as_ref(), &[url]).await;
            return Err(e);
        }
    };
    tracing::info!("Gallery image {} added", image.id);
    Ok(image)
}

async fn field_text(field: Field<'_>) -> Result<String> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form field {}: {}", name, e)))
}

/// PATCH /api/admin/gallery/{id}
pub async fn update_image(
    State(state): State<AppState>,
    _admin: AuthAdmin,
    Path(id): Path<String>,
    Json(update): Json<GalleryUpdate>,
) -> Result<Json<GalleryImage>> {
    let current = state
        .db
        .get_gallery_image(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))?;

    let caption = match update.caption {
        Some(caption) => clean_optional(Some(caption)),
        None => current.caption,
    };
    let sort_order = update.sort_order.unwrap_or(current.sort_order);

    let image = state
        .db
        .update_gallery_image(&id, caption.as_deref(), sort_order)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))?;
    Ok(Json(image))
}

/// DELETE /api/admin/gallery/{id}
pub async fn delete_image(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let image = state
        .db
        .get_gallery_image(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))?;
    state.db.delete_gallery_image(&id).await?;
    tracing::info!("Gallery image {} deleted by {}", id, admin.email);

    if let Err(e) = state.store.remove(&image.url).await {
        tracing::warn!("Could not remove stored file {}: {}", image.url, e);
    }
    Ok(StatusCode::NO_CONTENT)
}
