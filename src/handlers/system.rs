use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::{AppState, config::Env, models::HealthResponse};

/// api_index
///
/// [Public Route] Lists the endpoint groups.
#[utoipa::path(
    get,
    path = "/api",
    responses((status = 200, description = "API index"))
)]
pub async fn api_index() -> Json<Value> {
    Json(json!({
        "name": "colegio-cms",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/administracion",
            "usuarios": "/api/usuarios",
            "categorias": "/api/categorias",
            "publicaciones": "/api/publicaciones",
            "galeria": "/api/galeria",
            "mensajes_contacto": "/api/mensajes_contacto",
            "upload": "/api/upload",
            "dashboard": "/api/dashboard",
            "health": "/api/health",
            "docs": "/swagger-ui"
        }
    }))
}

/// health
///
/// [Public Route] Liveness probe; does not touch the database.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let environment = match state.config.env {
        Env::Local => "development",
        Env::Production => "production",
    };
    Json(HealthResponse {
        status: "healthy".to_string(),
        environment: environment.to_string(),
    })
}
