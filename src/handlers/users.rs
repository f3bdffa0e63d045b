use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{CurrentUser, hash_password},
    error::{ApiError, ApiResult},
    models::{
        CreateUserRequest, DEFAULT_ROLE, MessageResponse, NewUser, Role, UpdateUserRequest,
        UserChanges, UserProfile,
    },
    validation::ValidatedJson,
};

fn parse_role(value: &str) -> ApiResult<Role> {
    Role::parse(value.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("Rol inválido: {}", value)))
}

/// list_users
///
/// [Admin Route] All principals, without password hashes.
#[utoipa::path(
    get,
    path = "/api/usuarios",
    responses((status = 200, description = "Principals", body = [UserProfile]))
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserProfile>>> {
    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// get_user
///
/// [Public Route]
#[utoipa::path(
    get,
    path = "/api/usuarios/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario"))?;
    Ok(Json(user.into()))
}

/// create_user
///
/// [Superadmin Route] Creates an `admin` principal (or another non-superadmin role).
/// New superadmins can only come from the seed binary.
#[utoipa::path(
    post,
    path = "/api/usuarios",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = UserProfile),
        (status = 400, description = "Missing email or password"),
        (status = 403, description = "Superadmin role requested"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let role = match payload.role.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(value) => parse_role(value)?,
        None => DEFAULT_ROLE,
    };
    if role == Role::Superadmin {
        return Err(ApiError::Forbidden(
            "No se puede crear otro superadmin".to_string(),
        ));
    }

    let email = payload.email.trim().to_string();
    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email ya registrado".to_string()));
    }

    let user = state
        .repo
        .create_user(NewUser {
            email,
            password_hash: hash_password(&payload.password)?,
            name: payload.name,
            role: role.as_str().to_string(),
        })
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, "user created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// update_user
///
/// [Admin Route] Partial update. An empty password is ignored; only a superadmin may
/// hand out the superadmin role.
#[utoipa::path(
    put,
    path = "/api/usuarios/{id}",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 403, description = "Role escalation refused"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_user(
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    let target = state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario"))?;

    let email = payload.email.map(|e| e.trim().to_string());
    if let Some(email) = &email {
        if *email != target.email {
            if let Some(other) = state.repo.find_user_by_email(email).await? {
                if other.id != target.id {
                    return Err(ApiError::Conflict("Email ya registrado".to_string()));
                }
            }
        }
    }

    let role = match payload.role.as_deref() {
        Some(value) => Some(parse_role(value)?),
        None => None,
    };
    if role == Some(Role::Superadmin) && !actor.is_superadmin() {
        return Err(ApiError::Forbidden(
            "Solo un superadmin puede asignar el rol superadmin".to_string(),
        ));
    }

    let password_hash = match payload.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let changes = UserChanges {
        email,
        password_hash,
        name: payload.name,
        role: role.map(|r| r.as_str().to_string()),
    };

    let user = state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario"))?;

    tracing::info!(user_id = user.id, actor_id = actor.id, "user updated");
    Ok(Json(user.into()))
}

/// delete_user
///
/// [Superadmin Route] Nobody deletes themselves, and superadmins cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/usuarios/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "Self deletion"),
        (status = 403, description = "Target is a superadmin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let target = state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario"))?;

    if target.id == actor.id {
        return Err(ApiError::BadRequest(
            "No puedes eliminarte a ti mismo".to_string(),
        ));
    }
    if target.is_superadmin() {
        return Err(ApiError::Forbidden(
            "No se puede eliminar al superadmin".to_string(),
        ));
    }

    if !state.repo.delete_user(id).await? {
        return Err(ApiError::not_found("Usuario"));
    }

    tracing::info!(user_id = id, actor_id = actor.id, "user deleted");
    Ok(Json(MessageResponse::new("usuario eliminado")))
}
