use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::storage::MediaMetadata;

// --- Roles ---

/// Role
///
/// The roles the authorization layer knows about. Principals store their role as free
/// text, so a row may carry a value that is neither of these; such principals pass no
/// role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

pub const DEFAULT_ROLE: Role = Role::Admin;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A principal as stored in `usuarios`. Carries the password hash, so it is never
/// serialized directly; responses use `UserProfile`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    pub fn is_superadmin(&self) -> bool {
        self.role() == Some(Role::Superadmin)
    }
}

/// UserProfile
///
/// Public view of a principal: everything except the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

/// Category
///
/// Classification for publications (`categorias`). The slug is unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Category {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Publication
///
/// An article or news item (`publicaciones`). `author_id` is stamped from the
/// authenticated principal at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Publication {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub status: String,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub author_id: Option<i32>,
    pub category_id: Option<i32>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

pub const STATUS_DRAFT: &str = "Borrador";
pub const STATUS_PUBLISHED: &str = "Publicado";

/// GalleryItem
///
/// A media entry (`galeria`). `url` is either an external link or a URL produced by the
/// upload strategy; `category` is a free-text label, not a foreign key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct GalleryItem {
    pub id: i32,
    pub title: String,
    pub url: String,
    pub caption: Option<String>,
    pub category: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ContactMessage
///
/// A message left through the public contact form (`mensajes_contacto`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct ContactMessage {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    // Stored and exposed as "leido" for compatibility with existing clients.
    #[serde(rename = "leido")]
    #[sqlx(rename = "leido")]
    pub is_read: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_SUBJECT: &str = "Sin asunto";

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Both fields default to empty so a missing field and an empty one get the same answer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    /// Defaults to "admin". "superadmin" is rejected.
    pub role: Option<String>,
}

/// UpdateUserRequest
///
/// Partial update: absent fields are left untouched. An empty password is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreateCategoryRequest {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CreatePublicationRequest
///
/// `slug` is derived from the title when absent. `status` defaults to "Publicado".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreatePublicationRequest {
    pub title: String,
    pub content: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<i32>,
    pub status: Option<String>,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePublicationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
}

/// CreateGalleryItemRequest
///
/// JSON variant of gallery creation, pointing at an externally hosted file.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreateGalleryItemRequest {
    pub title: String,
    pub url: String,
    pub caption: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateGalleryItemRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreateContactMessageRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
}

/// DeleteUploadRequest
///
/// Opaque handle returned as `public_id` by the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct DeleteUploadRequest {
    pub public_id: String,
    pub resource_type: Option<String>,
}

/// UploadForm
///
/// Documentation-only description of the multipart body accepted by the upload routes.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub folder: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub category: Option<String>,
}

// --- Query Parameters ---

/// PublicationQuery
///
/// Query string of the publication listing. `category_id` stays textual so that a
/// malformed value is ignored rather than rejected.
#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PublicationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Case-insensitive substring match on the title.
    pub q: Option<String>,
    pub category_id: Option<String>,
    /// Defaults to "Publicado" when absent.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GalleryQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MessageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub leido: Option<bool>,
}

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// Page
///
/// Resolved LIMIT/OFFSET window. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    /// Only paginate when the caller asked for it.
    pub fn optional(page: Option<i64>, per_page: Option<i64>) -> Option<Self> {
        if page.is_none() && per_page.is_none() {
            None
        } else {
            Some(Self::new(page, per_page))
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// Saturates instead of overflowing on absurd page numbers; such a page is simply empty.
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

// --- Repository Filters ---

#[derive(Debug, Clone, PartialEq)]
pub struct PublicationFilter {
    pub status: String,
    pub search: Option<String>,
    pub category_id: Option<i32>,
    pub page: Page,
}

impl From<PublicationQuery> for PublicationFilter {
    fn from(query: PublicationQuery) -> Self {
        Self {
            status: query
                .status
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| STATUS_PUBLISHED.to_string()),
            search: query.q.filter(|q| !q.trim().is_empty()),
            category_id: query.category_id.and_then(|c| c.trim().parse().ok()),
            page: Page::new(query.page, query.per_page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GalleryFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<Page>,
}

impl From<GalleryQuery> for GalleryFilter {
    fn from(query: GalleryQuery) -> Self {
        Self {
            search: query.q.filter(|q| !q.trim().is_empty()),
            category: query.category.filter(|c| !c.trim().is_empty()),
            page: Page::optional(query.page, query.per_page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageFilter {
    pub is_read: Option<bool>,
    pub page: Option<Page>,
}

impl From<MessageQuery> for MessageFilter {
    fn from(query: MessageQuery) -> Self {
        Self {
            is_read: query.leido,
            page: Page::optional(query.page, query.per_page),
        }
    }
}

// --- Repository Inputs ---

/// NewUser
///
/// Insert payload for `usuarios`, with the secret already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPublication {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub author_id: Option<i32>,
    pub category_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewGalleryItem {
    pub title: String,
    pub url: String,
    pub caption: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

// --- Responses ---

/// MessageResponse
///
/// Plain acknowledgement, used by delete endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// PublicationPage
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicationPage {
    pub items: Vec<Publication>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// GalleryItemCreated
///
/// Creation response. `upload_method` and `metadata` are present only when the item was
/// created from an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GalleryItemCreated {
    #[serde(flatten)]
    pub item: GalleryItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
    pub msg: String,
}

/// ContactMessageCreated
///
/// The message is persisted regardless of `email_sent`; a failed notification only
/// flips the flag and adds `email_note`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ContactMessageCreated {
    pub id: i32,
    pub msg: String,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_note: Option<String>,
}

/// UploadResponse
///
/// Result of `POST /api/upload/image`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub url: String,
    pub secure_url: String,
    pub public_id: String,
    pub resource_type: String,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub msg: String,
}

/// DashboardStats
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct DashboardStats {
    pub publications: i64,
    pub categories: i64,
    pub gallery: i64,
    /// Unread messages only.
    pub messages: i64,
    pub total_messages: i64,
    pub users: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RecentActivity {
    pub publications: Vec<Publication>,
    pub messages: Vec<ContactMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
}
