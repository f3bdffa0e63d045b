use crate::{
    AppState,
    handlers::{categories, gallery, messages, publications, uploads, users},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Content management. The router is wrapped by `require_role` with `Access::Admin`, so
/// every handler here runs with a resolved `CurrentUser` whose role is `admin` or
/// `superadmin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Categories ---
        .route("/api/categorias", post(categories::create_category))
        .route(
            "/api/categorias/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        // --- Publications ---
        // The author is stamped from the calling principal.
        .route("/api/publicaciones", post(publications::create_publication))
        .route(
            "/api/publicaciones/{id}",
            put(publications::update_publication).delete(publications::delete_publication),
        )
        // --- Gallery ---
        // POST accepts multipart (file upload) or JSON (external url).
        .route("/api/galeria", post(gallery::create_gallery_item))
        .route(
            "/api/galeria/{id}",
            put(gallery::update_gallery_item).delete(gallery::delete_gallery_item),
        )
        // --- Contact messages ---
        .route("/api/mensajes_contacto", get(messages::list_messages))
        .route(
            "/api/mensajes_contacto/{id}",
            get(messages::get_message).delete(messages::delete_message),
        )
        // --- Principals ---
        // Role escalation to superadmin is refused inside the handler.
        .route("/api/usuarios", get(users::list_users))
        .route("/api/usuarios/{id}", put(users::update_user))
        // --- Uploads ---
        .route(
            "/api/upload/image",
            post(uploads::upload_image).delete(uploads::delete_upload),
        )
}

/// Superadmin Router Module
///
/// Principal lifecycle. Wrapped by `require_role` with `Access::SuperAdmin`.
pub fn superadmin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/usuarios", post(users::create_user))
        .route("/api/usuarios/{id}", delete(users::delete_user))
}
