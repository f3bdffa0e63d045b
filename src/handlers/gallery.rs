use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State, rejection::QueryRejection},
    http::{StatusCode, header},
};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    handlers::uploads::read_multipart,
    models::{
        CreateGalleryItemRequest, GalleryFilter, GalleryItem, GalleryItemCreated, GalleryQuery,
        MessageResponse, NewGalleryItem, UpdateGalleryItemRequest, UploadForm,
    },
    validation::ValidatedJson,
};

/// Folder gallery uploads are stored under (below the CDN root folder for the CDN).
pub const GALLERY_FOLDER: &str = "galeria";

fn not_found() -> ApiError {
    ApiError::NotFound("Item de galería no encontrado".to_string())
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// list_gallery
///
/// [Public Route] Newest first. `category` filters by exact label, `q` by title.
#[utoipa::path(
    get,
    path = "/api/galeria",
    params(GalleryQuery),
    responses((status = 200, description = "Gallery items", body = [GalleryItem]))
)]
pub async fn list_gallery(
    State(state): State<AppState>,
    query: Result<Query<GalleryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<GalleryItem>>> {
    let Query(query) = query?;
    let filter = GalleryFilter::from(query);
    Ok(Json(state.repo.list_gallery(&filter).await?))
}

/// get_gallery_item
///
/// [Public Route]
#[utoipa::path(
    get,
    path = "/api/galeria/{id}",
    params(("id" = i32, Path, description = "Gallery item ID")),
    responses(
        (status = 200, description = "Found", body = GalleryItem),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<GalleryItem>> {
    state
        .repo
        .find_gallery_item(id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// create_gallery_item
///
/// [Admin Route] Two request shapes on one path:
/// - `multipart/form-data` with a `file` part: the file goes through the upload backend
///   and the response carries the strategy name and metadata.
/// - JSON with `title` and `url`: an externally hosted file, stored as is.
#[utoipa::path(
    post,
    path = "/api/galeria",
    request_body(
        content(
            (UploadForm = "multipart/form-data"),
            (CreateGalleryItemRequest = "application/json")
        )
    ),
    responses(
        (status = 201, description = "Created", body = GalleryItemCreated),
        (status = 400, description = "Missing file, title or url"),
        (status = 415, description = "Extension not allowed"),
        (status = 500, description = "Strategy failure")
    )
)]
pub async fn create_gallery_item(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<(StatusCode, Json<GalleryItemCreated>)> {
    if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        return create_from_upload(&state, multipart).await;
    }

    let ValidatedJson(payload) =
        ValidatedJson::<CreateGalleryItemRequest>::from_request(request, &state).await?;

    let item = state
        .repo
        .create_gallery_item(NewGalleryItem {
            title: payload.title.trim().to_string(),
            url: payload.url.trim().to_string(),
            caption: payload.caption,
            category: payload.category,
        })
        .await?;

    tracing::info!(gallery_id = item.id, "gallery item created from external url");
    Ok((
        StatusCode::CREATED,
        Json(GalleryItemCreated {
            item,
            upload_method: None,
            metadata: None,
            msg: "item de galería creado con URL externa".to_string(),
        }),
    ))
}

async fn create_from_upload(
    state: &AppState,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<GalleryItemCreated>)> {
    let mut form = read_multipart(multipart).await?;
    let file = form.take_file()?;
    let title = form
        .field("title")
        .unwrap_or_else(|| file.filename.clone());
    let caption = form.field("caption");
    let category = form.field("category");

    let stored = state.uploads.store(file, GALLERY_FOLDER).await?;

    let created = state
        .repo
        .create_gallery_item(NewGalleryItem {
            title,
            url: stored.secure_url.clone(),
            caption,
            category,
        })
        .await;

    let item = match created {
        Ok(item) => item,
        Err(e) => {
            // The row was never written; do not leave the file behind.
            if let Err(cleanup) = state
                .uploads
                .remove(&stored.public_id, Some(&stored.resource_type))
                .await
            {
                tracing::warn!(public_id = %stored.public_id, error = %cleanup, "orphaned upload left behind");
            }
            return Err(e.into());
        }
    };

    tracing::info!(gallery_id = item.id, method = state.uploads.method(), "gallery item created from upload");
    Ok((
        StatusCode::CREATED,
        Json(GalleryItemCreated {
            item,
            upload_method: Some(state.uploads.method().to_string()),
            metadata: Some(stored.metadata),
            msg: "item de galería creado con upload".to_string(),
        }),
    ))
}

/// update_gallery_item
///
/// [Admin Route] Partial update of the metadata. Replacing `url` does not touch the old
/// file.
#[utoipa::path(
    put,
    path = "/api/galeria/{id}",
    params(("id" = i32, Path, description = "Gallery item ID")),
    request_body = UpdateGalleryItemRequest,
    responses(
        (status = 200, description = "Updated", body = GalleryItem),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<UpdateGalleryItemRequest>,
) -> ApiResult<Json<GalleryItem>> {
    state
        .repo
        .update_gallery_item(id, payload)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// delete_gallery_item
///
/// [Admin Route] Deletes the row, then the stored file when the URL points at local
/// storage. A file that cannot be removed is logged and the deletion still succeeds.
/// External and CDN URLs never touch any file.
#[utoipa::path(
    delete,
    path = "/api/galeria/{id}",
    params(("id" = i32, Path, description = "Gallery item ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let item = state
        .repo
        .delete_gallery_item(id)
        .await?
        .ok_or_else(not_found)?;

    match state.uploads.remove_if_local(&item.url).await {
        Ok(Some(outcome)) => {
            tracing::debug!(gallery_id = id, url = %item.url, ?outcome, "local gallery file removed")
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(gallery_id = id, url = %item.url, error = %e, "could not remove gallery file")
        }
    }

    tracing::info!(gallery_id = id, "gallery item deleted");
    Ok(Json(MessageResponse::new("item de galería eliminado")))
}
