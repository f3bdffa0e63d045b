use crate::models::{
    Category, ContactMessage, CreateCategoryRequest, DashboardStats, GalleryFilter, GalleryItem,
    MessageFilter, NewContactMessage, NewGalleryItem, NewPublication, NewUser, Publication,
    PublicationFilter, UpdateCategoryRequest, UpdateGalleryItemRequest, UpdatePublicationRequest,
    User, UserChanges,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;

/// RepositoryError
///
/// Persistence failures surfaced to the handlers. Unique-index violations are split out so
/// they can be answered with 409 instead of a generic 500.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Carries a human label of the duplicated value, e.g. "El email".
    #[error("{0} ya existe")]
    UniqueViolation(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return RepositoryError::UniqueViolation(
                    unique_label(db_err.constraint()).to_string(),
                );
            }
        }
        tracing::error!("database error: {:?}", err);
        RepositoryError::Database(err)
    }
}

/// Maps the unique indexes created by the migrations to the field they protect.
fn unique_label(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("usuarios_email_key") => "El email",
        Some("categorias_slug_key") | Some("publicaciones_slug_key") => "El slug",
        _ => "El registro",
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Abstract contract for every persistence operation. Handlers only see this trait, so the
/// Postgres implementation can be swapped for an in-memory one in tests.
///
/// **Send + Sync + async_trait** make the trait object (`Arc<dyn Repository>`) shareable
/// across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Principals ---
    async fn find_user(&self, id: i32) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    // Absent fields are left untouched.
    async fn update_user(&self, id: i32, changes: UserChanges) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: i32) -> RepoResult<bool>;

    // --- Categories ---
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn find_category(&self, id: i32) -> RepoResult<Option<Category>>;
    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category>;
    async fn update_category(
        &self,
        id: i32,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>>;
    async fn delete_category(&self, id: i32) -> RepoResult<bool>;

    // --- Publications ---
    // Returns the requested page and the total number of matching rows.
    async fn list_publications(
        &self,
        filter: &PublicationFilter,
    ) -> RepoResult<(Vec<Publication>, i64)>;
    async fn find_publication(&self, id: i32) -> RepoResult<Option<Publication>>;
    async fn create_publication(&self, publication: NewPublication) -> RepoResult<Publication>;
    async fn update_publication(
        &self,
        id: i32,
        req: UpdatePublicationRequest,
    ) -> RepoResult<Option<Publication>>;
    async fn delete_publication(&self, id: i32) -> RepoResult<bool>;
    async fn recent_publications(&self, limit: i64) -> RepoResult<Vec<Publication>>;

    // --- Gallery ---
    async fn list_gallery(&self, filter: &GalleryFilter) -> RepoResult<Vec<GalleryItem>>;
    async fn find_gallery_item(&self, id: i32) -> RepoResult<Option<GalleryItem>>;
    async fn create_gallery_item(&self, item: NewGalleryItem) -> RepoResult<GalleryItem>;
    async fn update_gallery_item(
        &self,
        id: i32,
        req: UpdateGalleryItemRequest,
    ) -> RepoResult<Option<GalleryItem>>;
    // Returns the deleted row so the caller can clean up the file behind its URL.
    async fn delete_gallery_item(&self, id: i32) -> RepoResult<Option<GalleryItem>>;

    // --- Contact messages ---
    async fn list_messages(&self, filter: &MessageFilter) -> RepoResult<Vec<ContactMessage>>;
    async fn find_message(&self, id: i32) -> RepoResult<Option<ContactMessage>>;
    async fn create_message(&self, message: NewContactMessage) -> RepoResult<ContactMessage>;
    async fn delete_message(&self, id: i32) -> RepoResult<bool>;
    async fn recent_messages(&self, limit: i64) -> RepoResult<Vec<ContactMessage>>;

    // --- Dashboard ---
    async fn get_stats(&self) -> RepoResult<DashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share persistence access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, email, password_hash, name, role, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, slug, name, description, created_at";
const PUBLICATION_COLUMNS: &str = "id, title, slug, excerpt, content, status, published_at, \
     image_url, author_id, category_id, created_at, updated_at";
const GALLERY_COLUMNS: &str = "id, title, url, caption, category, created_at";
const MESSAGE_COLUMNS: &str = "id, name, email, phone, subject, message, leido, created_at";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `ILIKE` pattern matching `search` as a literal substring, for use with `ESCAPE '\'`.
pub fn contains_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Appends the WHERE clause of the publication listing. Shared by the page query and the
/// count query so both always agree.
fn push_publication_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &PublicationFilter) {
    builder.push(" WHERE status = ");
    builder.push_bind(filter.status.clone());

    if let Some(search) = &filter.search {
        builder.push(" AND title ILIKE ");
        builder.push_bind(contains_pattern(search));
        builder.push(r" ESCAPE '\'");
    }

    if let Some(category_id) = filter.category_id {
        builder.push(" AND category_id = ");
        builder.push_bind(category_id);
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- PRINCIPALS ---

    async fn find_user(&self, id: i32) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {} FROM usuarios WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {} FROM usuarios WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let sql = format!("SELECT {} FROM usuarios ORDER BY id ASC", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO usuarios (email, password_hash, name, role) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.name)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await?)
    }

    /// update_user
    ///
    /// `COALESCE` keeps the stored value for every `None` field.
    async fn update_user(&self, id: i32, changes: UserChanges) -> RepoResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE usuarios
            SET email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                name = COALESCE($4, name),
                role = COALESCE($5, role),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.email)
            .bind(changes.password_hash)
            .bind(changes.name)
            .bind(changes.role)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM usuarios WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let sql = format!("SELECT {} FROM categorias ORDER BY name ASC", CATEGORY_COLUMNS);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_category(&self, id: i32) -> RepoResult<Option<Category>> {
        let sql = format!("SELECT {} FROM categorias WHERE id = $1", CATEGORY_COLUMNS);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category> {
        let sql = format!(
            "INSERT INTO categorias (slug, name, description) VALUES ($1, $2, $3) RETURNING {}",
            CATEGORY_COLUMNS
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(req.slug)
            .bind(req.name)
            .bind(req.description)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_category(
        &self,
        id: i32,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>> {
        let sql = format!(
            r#"
            UPDATE categorias
            SET slug = COALESCE($2, slug),
                name = COALESCE($3, name),
                description = COALESCE($4, description)
            WHERE id = $1
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(req.slug)
            .bind(req.name)
            .bind(req.description)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_category(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM categorias WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- PUBLICATIONS ---

    /// list_publications
    ///
    /// Dynamic filtering with `QueryBuilder`; every user value goes through `push_bind`.
    /// Undated publications sort after dated ones.
    async fn list_publications(
        &self,
        filter: &PublicationFilter,
    ) -> RepoResult<(Vec<Publication>, i64)> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM publicaciones");
        push_publication_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM publicaciones", PUBLICATION_COLUMNS));
        push_publication_filters(&mut builder, filter);
        builder.push(" ORDER BY published_at DESC NULLS LAST, created_at DESC");
        builder.push(" LIMIT ");
        builder.push_bind(filter.page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(filter.page.offset());

        let items = builder
            .build_query_as::<Publication>()
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }

    async fn find_publication(&self, id: i32) -> RepoResult<Option<Publication>> {
        let sql = format!("SELECT {} FROM publicaciones WHERE id = $1", PUBLICATION_COLUMNS);
        Ok(sqlx::query_as::<_, Publication>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_publication(&self, publication: NewPublication) -> RepoResult<Publication> {
        let sql = format!(
            r#"
            INSERT INTO publicaciones
                (title, slug, excerpt, content, status, published_at, image_url, author_id, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PUBLICATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Publication>(&sql)
            .bind(publication.title)
            .bind(publication.slug)
            .bind(publication.excerpt)
            .bind(publication.content)
            .bind(publication.status)
            .bind(publication.published_at)
            .bind(publication.image_url)
            .bind(publication.author_id)
            .bind(publication.category_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_publication(
        &self,
        id: i32,
        req: UpdatePublicationRequest,
    ) -> RepoResult<Option<Publication>> {
        let sql = format!(
            r#"
            UPDATE publicaciones
            SET title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                content = COALESCE($4, content),
                excerpt = COALESCE($5, excerpt),
                image_url = COALESCE($6, image_url),
                author_id = COALESCE($7, author_id),
                category_id = COALESCE($8, category_id),
                status = COALESCE($9, status),
                published_at = COALESCE($10, published_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PUBLICATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Publication>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.slug)
            .bind(req.content)
            .bind(req.excerpt)
            .bind(req.image_url)
            .bind(req.author_id)
            .bind(req.category_id)
            .bind(req.status)
            .bind(req.published_at)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_publication(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM publicaciones WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn recent_publications(&self, limit: i64) -> RepoResult<Vec<Publication>> {
        let sql = format!(
            "SELECT {} FROM publicaciones ORDER BY created_at DESC LIMIT $1",
            PUBLICATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Publication>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    // --- GALLERY ---

    async fn list_gallery(&self, filter: &GalleryFilter) -> RepoResult<Vec<GalleryItem>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM galeria WHERE 1 = 1", GALLERY_COLUMNS));

        if let Some(category) = &filter.category {
            builder.push(" AND category = ");
            builder.push_bind(category.clone());
        }
        if let Some(search) = &filter.search {
            builder.push(" AND title ILIKE ");
            builder.push_bind(contains_pattern(search));
            builder.push(r" ESCAPE '\'");
        }

        builder.push(" ORDER BY created_at DESC");

        if let Some(page) = filter.page {
            builder.push(" LIMIT ");
            builder.push_bind(page.limit());
            builder.push(" OFFSET ");
            builder.push_bind(page.offset());
        }

        Ok(builder
            .build_query_as::<GalleryItem>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_gallery_item(&self, id: i32) -> RepoResult<Option<GalleryItem>> {
        let sql = format!("SELECT {} FROM galeria WHERE id = $1", GALLERY_COLUMNS);
        Ok(sqlx::query_as::<_, GalleryItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_gallery_item(&self, item: NewGalleryItem) -> RepoResult<GalleryItem> {
        let sql = format!(
            "INSERT INTO galeria (title, url, caption, category) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            GALLERY_COLUMNS
        );
        Ok(sqlx::query_as::<_, GalleryItem>(&sql)
            .bind(item.title)
            .bind(item.url)
            .bind(item.caption)
            .bind(item.category)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_gallery_item(
        &self,
        id: i32,
        req: UpdateGalleryItemRequest,
    ) -> RepoResult<Option<GalleryItem>> {
        let sql = format!(
            r#"
            UPDATE galeria
            SET title = COALESCE($2, title),
                url = COALESCE($3, url),
                caption = COALESCE($4, caption),
                category = COALESCE($5, category)
            WHERE id = $1
            RETURNING {}
            "#,
            GALLERY_COLUMNS
        );
        Ok(sqlx::query_as::<_, GalleryItem>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.url)
            .bind(req.caption)
            .bind(req.category)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_gallery_item(&self, id: i32) -> RepoResult<Option<GalleryItem>> {
        let sql = format!("DELETE FROM galeria WHERE id = $1 RETURNING {}", GALLERY_COLUMNS);
        Ok(sqlx::query_as::<_, GalleryItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // --- CONTACT MESSAGES ---

    async fn list_messages(&self, filter: &MessageFilter) -> RepoResult<Vec<ContactMessage>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM mensajes_contacto WHERE 1 = 1",
            MESSAGE_COLUMNS
        ));

        if let Some(is_read) = filter.is_read {
            builder.push(" AND leido = ");
            builder.push_bind(is_read);
        }

        builder.push(" ORDER BY created_at DESC");

        if let Some(page) = filter.page {
            builder.push(" LIMIT ");
            builder.push_bind(page.limit());
            builder.push(" OFFSET ");
            builder.push_bind(page.offset());
        }

        Ok(builder
            .build_query_as::<ContactMessage>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_message(&self, id: i32) -> RepoResult<Option<ContactMessage>> {
        let sql = format!("SELECT {} FROM mensajes_contacto WHERE id = $1", MESSAGE_COLUMNS);
        Ok(sqlx::query_as::<_, ContactMessage>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_message(&self, message: NewContactMessage) -> RepoResult<ContactMessage> {
        let sql = format!(
            "INSERT INTO mensajes_contacto (name, email, phone, subject, message) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            MESSAGE_COLUMNS
        );
        Ok(sqlx::query_as::<_, ContactMessage>(&sql)
            .bind(message.name)
            .bind(message.email)
            .bind(message.phone)
            .bind(message.subject)
            .bind(message.message)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_message(&self, id: i32) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM mensajes_contacto WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn recent_messages(&self, limit: i64) -> RepoResult<Vec<ContactMessage>> {
        let sql = format!(
            "SELECT {} FROM mensajes_contacto ORDER BY created_at DESC LIMIT $1",
            MESSAGE_COLUMNS
        );
        Ok(sqlx::query_as::<_, ContactMessage>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    // --- DASHBOARD ---

    /// get_stats
    ///
    /// All dashboard counters in a single round trip.
    async fn get_stats(&self) -> RepoResult<DashboardStats> {
        let (publications, categories, gallery, messages, total_messages, users): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM publicaciones),
                (SELECT COUNT(*) FROM categorias),
                (SELECT COUNT(*) FROM galeria),
                (SELECT COUNT(*) FROM mensajes_contacto WHERE leido = false),
                (SELECT COUNT(*) FROM mensajes_contacto),
                (SELECT COUNT(*) FROM usuarios)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            publications,
            categories,
            gallery,
            messages,
            total_messages,
            users,
        })
    }
}
