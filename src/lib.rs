use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod repository;
pub mod storage;
pub mod validation;

// Module for routing segregation (Public, Authenticated, Admin/Superadmin).
pub mod routes;
use auth::{Access, AuthUser, RoleGate, require_role};
use handlers::{
    categories, dashboard, gallery, messages, publications, session, system, uploads, users,
};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use notifier::{MockNotifier, NotifierState, ResendNotifier};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{CloudinaryStorage, LocalStorage, MockMediaStore, UploadBackend};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/api-docs/openapi.json` and browsable at
/// `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        system::api_index, system::health,
        session::login, session::my_profile,
        users::list_users, users::get_user, users::create_user, users::update_user,
        users::delete_user,
        categories::list_categories, categories::get_category, categories::create_category,
        categories::update_category, categories::delete_category,
        publications::list_publications, publications::get_publication,
        publications::create_publication, publications::update_publication,
        publications::delete_publication,
        gallery::list_gallery, gallery::get_gallery_item, gallery::create_gallery_item,
        gallery::update_gallery_item, gallery::delete_gallery_item,
        messages::create_message, messages::list_messages, messages::get_message,
        messages::delete_message,
        uploads::upload_image, uploads::delete_upload,
        dashboard::get_stats, dashboard::get_recent,
    ),
    components(
        schemas(
            models::UserProfile, models::Category, models::Publication, models::GalleryItem,
            models::ContactMessage, models::LoginRequest, models::LoginResponse,
            models::CreateUserRequest, models::UpdateUserRequest,
            models::CreateCategoryRequest, models::UpdateCategoryRequest,
            models::CreatePublicationRequest, models::UpdatePublicationRequest,
            models::CreateGalleryItemRequest, models::UpdateGalleryItemRequest,
            models::CreateContactMessageRequest, models::DeleteUploadRequest,
            models::UploadForm, models::MessageResponse, models::PublicationPage,
            models::GalleryItemCreated, models::ContactMessageCreated, models::UploadResponse,
            models::DashboardStats, models::RecentActivity, models::HealthResponse,
            storage::MediaMetadata,
        )
    ),
    tags(
        (name = "colegio-cms", description = "School website content management API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Single, cloneable container for every shared service. Built once at startup; the
/// upload strategy and notifier inside it never change afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer.
    pub repo: RepositoryState,
    /// Configured upload strategy plus the local store used for `/uploads` cleanup.
    pub uploads: UploadBackend,
    /// Contact-message email notices.
    pub notifier: NotifierState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for UploadBackend {
    fn from_ref(app_state: &AppState) -> UploadBackend {
        app_state.uploads.clone()
    }
}

impl FromRef<AppState> for NotifierState {
    fn from_ref(app_state: &AppState) -> NotifierState {
        app_state.notifier.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated group: `AuthUser` rejects the request before the handler runs
/// when the token is missing, invalid or names no principal.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// cors_layer
///
/// A single `*` entry allows any origin; otherwise only the listed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// create_router
///
/// Assembles the routing tree, attaches the access layers to each group and wraps
/// everything in the observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let x_request_id = HeaderName::from_static("x-request-id");

    let admin_gate = RoleGate::new(&state, Access::Admin);
    let superadmin_gate = RoleGate::new(&state, Access::SuperAdmin);
    let uploads_dir = state.config.uploads_dir.clone();
    let max_upload_bytes = state.config.max_upload_bytes;

    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: any valid principal.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin Routes: role gate {admin, superadmin}. Uploads go through here, so this
        // group also gets the raised body limit.
        .merge(
            admin::admin_routes()
                .route_layer(DefaultBodyLimit::max(max_upload_bytes))
                .route_layer(middleware::from_fn_with_state(admin_gate, require_role)),
        )
        // Superadmin Routes: role gate {superadmin}.
        .merge(
            admin::superadmin_routes()
                .route_layer(middleware::from_fn_with_state(superadmin_gate, require_role)),
        )
        // The role gates also wrap each path's method fallback; unknown methods get 405.
        .method_not_allowed_fallback(method_not_allowed)
        // Files written by the local upload strategy.
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .with_state(state);

    // Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // Request ID Generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // Request Tracing: one span per request, carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` header, so every log
/// line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
