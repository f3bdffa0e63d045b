use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{Category, CreateCategoryRequest, MessageResponse, UpdateCategoryRequest},
    validation::ValidatedJson,
};

fn not_found() -> ApiError {
    ApiError::NotFound("Categoría no encontrada".to_string())
}

/// list_categories
///
/// [Public Route]
#[utoipa::path(
    get,
    path = "/api/categorias",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.repo.list_categories().await?))
}

/// get_category
///
/// [Public Route]
#[utoipa::path(
    get,
    path = "/api/categorias/{id}",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = Category),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Category>> {
    state
        .repo
        .find_category(id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// create_category
///
/// [Admin Route] A duplicate slug answers 409 (enforced by the unique index).
#[utoipa::path(
    post,
    path = "/api/categorias",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Missing slug or name"),
        (status = 409, description = "Slug already exists")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    ValidatedJson(mut payload): ValidatedJson<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    payload.slug = payload.slug.trim().to_string();
    let category = state.repo.create_category(payload).await?;
    tracing::info!(category_id = category.id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Admin Route] Partial update.
#[utoipa::path(
    put,
    path = "/api/categorias/{id}",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Slug already exists")
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(mut payload): ValidatedJson<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    payload.slug = payload.slug.map(|s| s.trim().to_string());
    state
        .repo
        .update_category(id, payload)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// delete_category
///
/// [Admin Route] Publications that referenced it keep existing without a category.
#[utoipa::path(
    delete,
    path = "/api/categorias/{id}",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.repo.delete_category(id).await? {
        return Err(not_found());
    }
    tracing::info!(category_id = id, "category deleted");
    Ok(Json(MessageResponse::new("categoría eliminada")))
}
