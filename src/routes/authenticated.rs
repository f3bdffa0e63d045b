use crate::{
    AppState,
    handlers::{dashboard, session},
};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes open to any principal holding a valid token, whatever its role. Handlers take
/// the `AuthUser` extractor, and the router is additionally wrapped in `auth_middleware`
/// so a handler that forgets the extractor is still protected.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/administracion/mi-perfil
        .route("/api/administracion/mi-perfil", get(session::my_profile))
        // GET /api/dashboard/stats, GET /api/dashboard/recent
        .route("/api/dashboard/stats", get(dashboard::get_stats))
        .route("/api/dashboard/recent", get(dashboard::get_recent))
}
