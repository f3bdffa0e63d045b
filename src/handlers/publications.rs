use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    auth::CurrentUser,
    error::{ApiError, ApiResult},
    models::{
        CreatePublicationRequest, MessageResponse, NewPublication, Publication,
        PublicationFilter, PublicationPage, PublicationQuery, STATUS_PUBLISHED,
        UpdatePublicationRequest,
    },
    validation::ValidatedJson,
};

fn not_found() -> ApiError {
    ApiError::NotFound("Publicación no encontrada".to_string())
}

/// slugify
///
/// Default slug for a title: lower-cased, spaces turned into `-`.
pub fn slugify(title: &str) -> String {
    title.trim().to_lowercase().replace(' ', "-")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// list_publications
///
/// [Public Route] Paginated listing. Without `status` only published entries are shown;
/// a `category_id` that is not a number is ignored.
#[utoipa::path(
    get,
    path = "/api/publicaciones",
    params(PublicationQuery),
    responses((status = 200, description = "One page of publications", body = PublicationPage))
)]
pub async fn list_publications(
    State(state): State<AppState>,
    query: Result<Query<PublicationQuery>, QueryRejection>,
) -> ApiResult<Json<PublicationPage>> {
    let Query(query) = query?;
    let filter = PublicationFilter::from(query);
    let (items, total) = state.repo.list_publications(&filter).await?;

    Ok(Json(PublicationPage {
        items,
        total,
        page: filter.page.page,
        per_page: filter.page.per_page,
    }))
}

/// get_publication
///
/// [Public Route]
#[utoipa::path(
    get,
    path = "/api/publicaciones/{id}",
    params(("id" = i32, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Found", body = Publication),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_publication(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Publication>> {
    state
        .repo
        .find_publication(id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// create_publication
///
/// [Admin Route] The author is the calling principal. Publishing without an explicit date
/// stamps the current time.
#[utoipa::path(
    post,
    path = "/api/publicaciones",
    request_body = CreatePublicationRequest,
    responses(
        (status = 201, description = "Created", body = Publication),
        (status = 400, description = "Missing title or content"),
        (status = 409, description = "Slug already exists")
    )
)]
pub async fn create_publication(
    CurrentUser(author): CurrentUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePublicationRequest>,
) -> ApiResult<(StatusCode, Json<Publication>)> {
    let slug = non_blank(payload.slug).unwrap_or_else(|| slugify(&payload.title));
    let status = non_blank(payload.status).unwrap_or_else(|| STATUS_PUBLISHED.to_string());
    let published_at = payload
        .published_at
        .or_else(|| (status == STATUS_PUBLISHED).then(Utc::now));

    let publication = state
        .repo
        .create_publication(NewPublication {
            title: payload.title.trim().to_string(),
            slug,
            excerpt: payload.excerpt,
            content: payload.content,
            status,
            published_at,
            image_url: payload.image_url,
            author_id: Some(author.id),
            category_id: payload.category_id,
        })
        .await?;

    tracing::info!(publication_id = publication.id, slug = %publication.slug, author_id = author.id, "publication created");
    Ok((StatusCode::CREATED, Json(publication)))
}

/// update_publication
///
/// [Admin Route] Partial update. Switching to "Publicado" stamps `published_at` if the
/// publication never had one.
#[utoipa::path(
    put,
    path = "/api/publicaciones/{id}",
    params(("id" = i32, Path, description = "Publication ID")),
    request_body = UpdatePublicationRequest,
    responses(
        (status = 200, description = "Updated", body = Publication),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Slug already exists")
    )
)]
pub async fn update_publication(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(mut payload): ValidatedJson<UpdatePublicationRequest>,
) -> ApiResult<Json<Publication>> {
    let current = state
        .repo
        .find_publication(id)
        .await?
        .ok_or_else(not_found)?;

    payload.slug = non_blank(payload.slug);
    if payload.status.as_deref() == Some(STATUS_PUBLISHED)
        && payload.published_at.is_none()
        && current.published_at.is_none()
    {
        payload.published_at = Some(Utc::now());
    }

    let publication = state
        .repo
        .update_publication(id, payload)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(publication_id = id, "publication updated");
    Ok(Json(publication))
}

/// delete_publication
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/api/publicaciones/{id}",
    params(("id" = i32, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_publication(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.repo.delete_publication(id).await? {
        return Err(not_found());
    }
    tracing::info!(publication_id = id, "publication deleted");
    Ok(Json(MessageResponse::new("publicación eliminada")))
}
