use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::ApiResult,
    models::{LoginRequest, LoginResponse, UserProfile},
    validation::ValidatedJson,
};

/// login
///
/// [Public Route] Exchanges email and password for a bearer token. Unknown email and wrong
/// password get the same 401 answer.
#[utoipa::path(
    post,
    path = "/api/administracion/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = auth::verify_credentials(&state.repo, payload.email.trim(), &payload.password).await?;
    let access_token = auth::issue_token(user.id, &state.config)?;

    tracing::info!(user_id = user.id, role = %user.role, "login succeeded");

    Ok(Json(LoginResponse {
        access_token,
        user: user.into(),
    }))
}

/// my_profile
///
/// [Authenticated Route] Profile of the token's principal.
#[utoipa::path(
    get,
    path = "/api/administracion/mi-perfil",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn my_profile(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(user.into())
}
