#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use colegio_cms::{
    AppConfig, AppState, MockNotifier, create_router,
    auth::{hash_password, issue_token},
    models::{
        Category, ContactMessage, CreateCategoryRequest, DashboardStats, GalleryFilter,
        GalleryItem, MessageFilter, NewContactMessage, NewGalleryItem, NewPublication, NewUser,
        Publication, PublicationFilter, UpdateCategoryRequest, UpdateGalleryItemRequest,
        UpdatePublicationRequest, User, UserChanges,
    },
    notifier::NotifierState,
    repository::{RepoResult, Repository, RepositoryError, RepositoryState},
    storage::{LocalStorage, MediaStoreState, MockMediaStore, UploadBackend},
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const PASSWORD: &str = "clave-segura-123";

// --- In-Memory Repository ---

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: Vec<User>,
    categories: Vec<Category>,
    publications: Vec<Publication>,
    gallery: Vec<GalleryItem>,
    messages: Vec<ContactMessage>,
}

impl Tables {
    fn id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// InMemoryRepository
///
/// Vector-backed stand-in for Postgres. Mirrors the unique constraints of the schema so
/// duplicate handling can be exercised without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a principal with `PASSWORD` as its secret.
    pub fn seed_user(&self, email: &str, role: &str) -> User {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let user = User {
            id: tables.id(),
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            name: None,
            role: role.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        user
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn message_count(&self) -> usize {
        self.tables.lock().unwrap().messages.len()
    }

    pub fn gallery_count(&self) -> usize {
        self.tables.lock().unwrap().gallery.len()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user(&self, id: i32) -> RepoResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.tables.lock().unwrap().users.clone())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::UniqueViolation("El email".to_string()));
        }
        let now = Utc::now();
        let created = User {
            id: tables.id(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(email) = &changes.email {
            if tables.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(RepositoryError::UniqueViolation("El email".to_string()));
            }
        }
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(name) = changes.name {
            user.name = Some(name);
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i32) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        Ok(tables.users.len() < before)
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut categories = self.tables.lock().unwrap().categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: i32) -> RepoResult<Option<Category>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category> {
        let mut tables = self.tables.lock().unwrap();
        if tables.categories.iter().any(|c| c.slug == req.slug) {
            return Err(RepositoryError::UniqueViolation("El slug".to_string()));
        }
        let category = Category {
            id: tables.id(),
            slug: req.slug,
            name: req.name,
            description: req.description,
            created_at: Utc::now(),
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: i32,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(slug) = &req.slug {
            if tables.categories.iter().any(|c| c.id != id && &c.slug == slug) {
                return Err(RepositoryError::UniqueViolation("El slug".to_string()));
            }
        }
        let Some(category) = tables.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(slug) = req.slug {
            category.slug = slug;
        }
        if let Some(name) = req.name {
            category.name = name;
        }
        if let Some(description) = req.description {
            category.description = Some(description);
        }
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: i32) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        for publication in tables.publications.iter_mut() {
            if publication.category_id == Some(id) {
                publication.category_id = None;
            }
        }
        Ok(tables.categories.len() < before)
    }

    async fn list_publications(
        &self,
        filter: &PublicationFilter,
    ) -> RepoResult<(Vec<Publication>, i64)> {
        let tables = self.tables.lock().unwrap();
        let mut matching: Vec<Publication> = tables
            .publications
            .iter()
            .filter(|p| p.status == filter.status)
            .filter(|p| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&p.title, q))
            })
            .filter(|p| filter.category_id.is_none_or(|c| p.category_id == Some(c)))
            .cloned()
            .collect();
        // Dated first, newest first; undated last.
        matching.sort_by(|a, b| {
            match (a.published_at, b.published_at) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then(b.created_at.cmp(&a.created_at))
        });
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(filter.page.offset() as usize)
            .take(filter.page.limit() as usize)
            .collect();
        Ok((items, total))
    }

    async fn find_publication(&self, id: i32) -> RepoResult<Option<Publication>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.publications.iter().find(|p| p.id == id).cloned())
    }

    async fn create_publication(&self, publication: NewPublication) -> RepoResult<Publication> {
        let mut tables = self.tables.lock().unwrap();
        if tables.publications.iter().any(|p| p.slug == publication.slug) {
            return Err(RepositoryError::UniqueViolation("El slug".to_string()));
        }
        let now = Utc::now();
        let created = Publication {
            id: tables.id(),
            title: publication.title,
            slug: publication.slug,
            excerpt: publication.excerpt,
            content: publication.content,
            status: publication.status,
            published_at: publication.published_at,
            image_url: publication.image_url,
            author_id: publication.author_id,
            category_id: publication.category_id,
            created_at: now,
            updated_at: now,
        };
        tables.publications.push(created.clone());
        Ok(created)
    }

    async fn update_publication(
        &self,
        id: i32,
        req: UpdatePublicationRequest,
    ) -> RepoResult<Option<Publication>> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(slug) = &req.slug {
            if tables.publications.iter().any(|p| p.id != id && &p.slug == slug) {
                return Err(RepositoryError::UniqueViolation("El slug".to_string()));
            }
        }
        let Some(publication) = tables.publications.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            publication.title = title;
        }
        if let Some(slug) = req.slug {
            publication.slug = slug;
        }
        if let Some(content) = req.content {
            publication.content = content;
        }
        if let Some(excerpt) = req.excerpt {
            publication.excerpt = Some(excerpt);
        }
        if let Some(image_url) = req.image_url {
            publication.image_url = Some(image_url);
        }
        if let Some(author_id) = req.author_id {
            publication.author_id = Some(author_id);
        }
        if let Some(category_id) = req.category_id {
            publication.category_id = Some(category_id);
        }
        if let Some(status) = req.status {
            publication.status = status;
        }
        if let Some(published_at) = req.published_at {
            publication.published_at = Some(published_at);
        }
        publication.updated_at = Utc::now();
        Ok(Some(publication.clone()))
    }

    async fn delete_publication(&self, id: i32) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.publications.len();
        tables.publications.retain(|p| p.id != id);
        Ok(tables.publications.len() < before)
    }

    async fn recent_publications(&self, limit: i64) -> RepoResult<Vec<Publication>> {
        let mut publications = self.tables.lock().unwrap().publications.clone();
        publications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        publications.truncate(limit as usize);
        Ok(publications)
    }

    async fn list_gallery(&self, filter: &GalleryFilter) -> RepoResult<Vec<GalleryItem>> {
        let tables = self.tables.lock().unwrap();
        let mut items: Vec<GalleryItem> = tables
            .gallery
            .iter()
            .filter(|g| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|c| g.category.as_deref() == Some(c))
            })
            .filter(|g| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&g.title, q))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(page) = filter.page {
            items = items
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .collect();
        }
        Ok(items)
    }

    async fn find_gallery_item(&self, id: i32) -> RepoResult<Option<GalleryItem>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.gallery.iter().find(|g| g.id == id).cloned())
    }

    async fn create_gallery_item(&self, item: NewGalleryItem) -> RepoResult<GalleryItem> {
        let mut tables = self.tables.lock().unwrap();
        let created = GalleryItem {
            id: tables.id(),
            title: item.title,
            url: item.url,
            caption: item.caption,
            category: item.category,
            created_at: Utc::now(),
        };
        tables.gallery.push(created.clone());
        Ok(created)
    }

    async fn update_gallery_item(
        &self,
        id: i32,
        req: UpdateGalleryItemRequest,
    ) -> RepoResult<Option<GalleryItem>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(item) = tables.gallery.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            item.title = title;
        }
        if let Some(url) = req.url {
            item.url = url;
        }
        if let Some(caption) = req.caption {
            item.caption = Some(caption);
        }
        if let Some(category) = req.category {
            item.category = Some(category);
        }
        Ok(Some(item.clone()))
    }

    async fn delete_gallery_item(&self, id: i32) -> RepoResult<Option<GalleryItem>> {
        let mut tables = self.tables.lock().unwrap();
        let position = tables.gallery.iter().position(|g| g.id == id);
        Ok(position.map(|i| tables.gallery.remove(i)))
    }

    async fn list_messages(&self, filter: &MessageFilter) -> RepoResult<Vec<ContactMessage>> {
        let tables = self.tables.lock().unwrap();
        let mut messages: Vec<ContactMessage> = tables
            .messages
            .iter()
            .filter(|m| filter.is_read.is_none_or(|r| m.is_read == r))
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(messages)
    }

    async fn find_message(&self, id: i32) -> RepoResult<Option<ContactMessage>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn create_message(&self, message: NewContactMessage) -> RepoResult<ContactMessage> {
        let mut tables = self.tables.lock().unwrap();
        let created = ContactMessage {
            id: tables.id(),
            name: message.name,
            email: message.email,
            phone: message.phone,
            subject: message.subject,
            message: message.message,
            is_read: false,
            created_at: Utc::now(),
        };
        tables.messages.push(created.clone());
        Ok(created)
    }

    async fn delete_message(&self, id: i32) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.messages.len();
        tables.messages.retain(|m| m.id != id);
        Ok(tables.messages.len() < before)
    }

    async fn recent_messages(&self, limit: i64) -> RepoResult<Vec<ContactMessage>> {
        let mut messages = self.tables.lock().unwrap().messages.clone();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn get_stats(&self) -> RepoResult<DashboardStats> {
        let tables = self.tables.lock().unwrap();
        Ok(DashboardStats {
            publications: tables.publications.len() as i64,
            categories: tables.categories.len() as i64,
            gallery: tables.gallery.len() as i64,
            messages: tables.messages.iter().filter(|m| !m.is_read).count() as i64,
            total_messages: tables.messages.len() as i64,
            users: tables.users.len() as i64,
        })
    }
}

// --- Test Application ---

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
    pub config: AppConfig,
    pub client: reqwest::Client,
    // Keeps the upload directory alive for the duration of the test.
    pub uploads_dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Seeds a principal and returns it with a freshly issued token.
    pub fn principal(&self, email: &str, role: &str) -> (User, String) {
        let user = self.repo.seed_user(email, role);
        let token = issue_token(user.id, &self.config).unwrap();
        (user, token)
    }
}

pub struct AppOptions {
    pub strategy: Option<MediaStoreState>,
    pub notifier: NotifierState,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            strategy: None,
            notifier: Arc::new(MockNotifier::new()),
        }
    }
}

/// Local upload strategy, working notifier.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppOptions::default()).await
}

/// Uploads go to `MockMediaStore`; local cleanup still targets the temp directory.
pub async fn spawn_app_with_mock_cdn() -> TestApp {
    spawn_app_with(AppOptions {
        strategy: Some(Arc::new(MockMediaStore::new())),
        ..AppOptions::default()
    })
    .await
}

pub async fn spawn_app_with(options: AppOptions) -> TestApp {
    let uploads_dir = tempfile::tempdir().expect("Failed to create upload dir");
    let config = AppConfig {
        uploads_dir: uploads_dir.path().to_path_buf(),
        ..AppConfig::default()
    };

    let uploads = match options.strategy {
        Some(strategy) => UploadBackend::new(strategy, LocalStorage::new(uploads_dir.path())),
        None => UploadBackend::local(uploads_dir.path()),
    };

    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        uploads,
        notifier: options.notifier,
        config: config.clone(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        config,
        client: reqwest::Client::new(),
        uploads_dir,
    }
}
