use crate::{
    AppState,
    handlers::{categories, gallery, messages, publications, session, system, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: read access to the published content, the login
/// exchange and the contact form.
///
/// Several paths here also exist in the admin router with other methods (e.g. `GET` here,
/// `POST` there). Axum merges them per method, so the gate only wraps the protected
/// methods.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /api, GET /api/health
        .route("/api", get(system::api_index))
        .route("/api/health", get(system::health))
        // POST /api/administracion/login
        // Exchanges credentials for a bearer token.
        .route("/api/administracion/login", post(session::login))
        // --- Read-only content ---
        .route("/api/categorias", get(categories::list_categories))
        .route("/api/categorias/{id}", get(categories::get_category))
        // Defaults to status = "Publicado" unless the query asks otherwise.
        .route("/api/publicaciones", get(publications::list_publications))
        .route("/api/publicaciones/{id}", get(publications::get_publication))
        .route("/api/galeria", get(gallery::list_gallery))
        .route("/api/galeria/{id}", get(gallery::get_gallery_item))
        .route("/api/usuarios/{id}", get(users::get_user))
        // POST /api/mensajes_contacto
        // Anyone may leave a message; the administrator is notified by email.
        .route("/api/mensajes_contacto", post(messages::create_message))
}
