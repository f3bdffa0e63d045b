mod common;

use colegio_cms::MockNotifier;
use common::{AppOptions, TestApp, spawn_app, spawn_app_with};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;

async fn create_publication(app: &TestApp, token: &str, body: Value) -> Value {
    let response = app
        .client
        .post(app.url("/api/publicaciones"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

// --- System ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/api/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "development");
}

#[tokio::test]
async fn test_api_index_lists_endpoints() {
    let app = spawn_app().await;

    let body: Value = app
        .client
        .get(app.url("/api"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["endpoints"]["publicaciones"], "/api/publicaciones");
    assert_eq!(body["endpoints"]["health"], "/api/health");
}

// --- Categories ---

#[tokio::test]
async fn test_category_lifecycle() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    let response = app
        .client
        .post(app.url("/api/categorias"))
        .bearer_auth(&token)
        .json(&json!({ "slug": "noticias", "name": "Noticias" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    let duplicate = app
        .client
        .post(app.url("/api/categorias"))
        .bearer_auth(&token)
        .json(&json!({ "slug": "noticias", "name": "Otra" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let original: Value = app
        .client
        .get(app.url(&format!("/api/categorias/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(original["name"], "Noticias");

    let updated: Value = app
        .client
        .put(app.url(&format!("/api/categorias/{}", id)))
        .bearer_auth(&token)
        .json(&json!({ "description": "Novedades del colegio" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["name"], "Noticias");
    assert_eq!(updated["description"], "Novedades del colegio");

    let deleted = app
        .client
        .delete(app.url(&format!("/api/categorias/{}", id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let missing = app
        .client
        .get(app.url(&format!("/api/categorias/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["msg"], "Categoría no encontrada");
}

#[tokio::test]
async fn test_category_update_to_taken_slug_is_conflict() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    let mut ids = Vec::new();
    for (slug, name) in [("noticias", "Noticias"), ("eventos", "Eventos")] {
        let created: Value = app
            .client
            .post(app.url("/api/categorias"))
            .bearer_auth(&token)
            .json(&json!({ "slug": slug, "name": name }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(created["id"].as_i64().unwrap());
    }

    let response = app
        .client
        .put(app.url(&format!("/api/categorias/{}", ids[1])))
        .bearer_auth(&token)
        .json(&json!({ "slug": "noticias", "name": "Renombrada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let untouched: Value = app
        .client
        .get(app.url(&format!("/api/categorias/{}", ids[1])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(untouched["slug"], "eventos");
    assert_eq!(untouched["name"], "Eventos");

    // Keeping its own slug is not a clash.
    let same = app
        .client
        .put(app.url(&format!("/api/categorias/{}", ids[0])))
        .bearer_auth(&token)
        .json(&json!({ "slug": "noticias" }))
        .send()
        .await
        .unwrap();
    assert_eq!(same.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_category_requires_slug_and_name() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    let response = app
        .client
        .post(app.url("/api/categorias"))
        .bearer_auth(&token)
        .json(&json!({ "slug": "  " }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "Slug y nombre son requeridos");
}

// --- Publications ---

#[tokio::test]
async fn test_publication_defaults() {
    let app = spawn_app().await;
    let (author, token) = app.principal("admin@colegio.edu", "admin");

    let created = create_publication(
        &app,
        &token,
        json!({ "title": "Feria de Ciencias", "content": "Este viernes..." }),
    )
    .await;

    assert_eq!(created["slug"], "feria-de-ciencias");
    assert_eq!(created["status"], "Publicado");
    assert!(created["published_at"].is_string());
    assert_eq!(created["author_id"], author.id);
}

#[tokio::test]
async fn test_draft_is_not_stamped_until_published() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    let draft = create_publication(
        &app,
        &token,
        json!({ "title": "Borrador", "content": "...", "status": "Borrador" }),
    )
    .await;
    assert!(draft["published_at"].is_null());

    let id = draft["id"].as_i64().unwrap();
    let published: Value = app
        .client
        .put(app.url(&format!("/api/publicaciones/{}", id)))
        .bearer_auth(&token)
        .json(&json!({ "status": "Publicado" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(published["status"], "Publicado");
    assert!(published["published_at"].is_string());
}

#[tokio::test]
async fn test_publication_missing_content_is_bad_request() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    let response = app
        .client
        .post(app.url("/api/publicaciones"))
        .bearer_auth(&token)
        .json(&json!({ "title": "Sin contenido" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "Título y contenido son requeridos");
}

#[tokio::test]
async fn test_duplicate_slug_is_conflict() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    let first =
        create_publication(&app, &token, json!({ "title": "Acto", "content": "a" })).await;

    let response = app
        .client
        .post(app.url("/api/publicaciones"))
        .bearer_auth(&token)
        .json(&json!({ "title": "Acto", "content": "b" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let original: Value = app
        .client
        .get(app.url(&format!("/api/publicaciones/{}", first["id"])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(original["content"], "a");
}

#[tokio::test]
async fn test_publication_update_to_taken_slug_is_conflict() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    create_publication(&app, &token, json!({ "title": "Acto", "content": "a" })).await;
    let other =
        create_publication(&app, &token, json!({ "title": "Feria", "content": "b" })).await;

    let response = app
        .client
        .put(app.url(&format!("/api/publicaciones/{}", other["id"])))
        .bearer_auth(&token)
        .json(&json!({ "slug": "acto", "title": "Cambiada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let untouched: Value = app
        .client
        .get(app.url(&format!("/api/publicaciones/{}", other["id"])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(untouched["slug"], "feria");
    assert_eq!(untouched["title"], "Feria");
}

#[tokio::test]
async fn test_publication_listing_pages_and_filters() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    for i in 1..=3 {
        create_publication(
            &app,
            &token,
            json!({ "title": format!("Noticia {}", i), "content": "..." }),
        )
        .await;
    }
    create_publication(
        &app,
        &token,
        json!({ "title": "Archivada", "content": "...", "status": "Archivado" }),
    )
    .await;

    let page: Value = app
        .client
        .get(app.url("/api/publicaciones?page=2&per_page=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 3);
    assert_eq!(page["page"], 2);
    assert_eq!(page["per_page"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let archived: Value = app
        .client
        .get(app.url("/api/publicaciones?status=Archivado"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(archived["total"], 1);
    assert_eq!(archived["items"][0]["title"], "Archivada");

    let searched: Value = app
        .client
        .get(app.url("/api/publicaciones?q=noticia%202&category_id=abc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(searched["total"], 1);
    assert_eq!(searched["items"][0]["title"], "Noticia 2");
}

#[tokio::test]
async fn test_publication_page_far_past_the_end_is_empty() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");
    create_publication(&app, &token, json!({ "title": "Acto", "content": "a" })).await;

    let response = app
        .client
        .get(app.url(&format!("/api/publicaciones?page={}&per_page=100", i64::MAX)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_missing_publication_is_not_found() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    let response = app
        .client
        .delete(app.url("/api/publicaciones/999"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "Publicación no encontrada");
}

// --- Users ---

#[tokio::test]
async fn test_superadmin_creates_admin() {
    let app = spawn_app().await;
    let (_, token) = app.principal("root@colegio.edu", "superadmin");

    let response = app
        .client
        .post(app.url("/api/usuarios"))
        .bearer_auth(&token)
        .json(&json!({ "email": "profe@colegio.edu", "password": "clave", "name": "Profe" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "admin");
    assert!(body.get("password_hash").is_none());

    let duplicate = app
        .client
        .post(app.url("/api/usuarios"))
        .bearer_auth(&token)
        .json(&json!({ "email": "profe@colegio.edu", "password": "otra" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let body: Value = duplicate.json().await.unwrap();
    assert_eq!(body["msg"], "Email ya registrado");
}

#[tokio::test]
async fn test_cannot_create_second_superadmin() {
    let app = spawn_app().await;
    let (_, token) = app.principal("root@colegio.edu", "superadmin");

    let response = app
        .client
        .post(app.url("/api/usuarios"))
        .bearer_auth(&token)
        .json(&json!({ "email": "otro@colegio.edu", "password": "clave", "role": "superadmin" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.repo.user_count(), 1);
}

#[tokio::test]
async fn test_user_deletion_rules() {
    let app = spawn_app().await;
    let (root, root_token) = app.principal("root@colegio.edu", "superadmin");
    let (other_root, _) = app.principal("root2@colegio.edu", "superadmin");
    let (admin, _) = app.principal("admin@colegio.edu", "admin");

    let own = app
        .client
        .delete(app.url(&format!("/api/usuarios/{}", root.id)))
        .bearer_auth(&root_token)
        .send()
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);
    let body: Value = own.json().await.unwrap();
    assert_eq!(body["msg"], "No puedes eliminarte a ti mismo");

    let superadmin = app
        .client
        .delete(app.url(&format!("/api/usuarios/{}", other_root.id)))
        .bearer_auth(&root_token)
        .send()
        .await
        .unwrap();
    assert_eq!(superadmin.status(), StatusCode::FORBIDDEN);

    let ok = app
        .client
        .delete(app.url(&format!("/api/usuarios/{}", admin.id)))
        .bearer_auth(&root_token)
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(app.repo.user_count(), 2);
}

#[tokio::test]
async fn test_admin_cannot_grant_superadmin() {
    let app = spawn_app().await;
    let (admin, token) = app.principal("admin@colegio.edu", "admin");

    let response = app
        .client
        .put(app.url(&format!("/api/usuarios/{}", admin.id)))
        .bearer_auth(&token)
        .json(&json!({ "role": "superadmin" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_user_ignores_empty_password() {
    let app = spawn_app().await;
    let (_, token) = app.principal("root@colegio.edu", "superadmin");
    let (admin, _) = app.principal("admin@colegio.edu", "admin");

    let updated: Value = app
        .client
        .put(app.url(&format!("/api/usuarios/{}", admin.id)))
        .bearer_auth(&token)
        .json(&json!({ "name": "Ana", "password": "" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["name"], "Ana");

    // The old secret still works.
    let login = app
        .client
        .post(app.url("/api/administracion/login"))
        .json(&json!({ "email": "admin@colegio.edu", "password": common::PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_user_rejects_taken_email_and_bad_role() {
    let app = spawn_app().await;
    let (_, token) = app.principal("root@colegio.edu", "superadmin");
    let (admin, _) = app.principal("admin@colegio.edu", "admin");

    let taken = app
        .client
        .put(app.url(&format!("/api/usuarios/{}", admin.id)))
        .bearer_auth(&token)
        .json(&json!({ "email": "root@colegio.edu" }))
        .send()
        .await
        .unwrap();
    assert_eq!(taken.status(), StatusCode::CONFLICT);

    let bad_role = app
        .client
        .put(app.url(&format!("/api/usuarios/{}", admin.id)))
        .bearer_auth(&token)
        .json(&json!({ "role": "director" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_role.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_user_lookup() {
    let app = spawn_app().await;
    let (admin, _) = app.principal("admin@colegio.edu", "admin");

    let found: Value = app
        .client
        .get(app.url(&format!("/api/usuarios/{}", admin.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found["email"], "admin@colegio.edu");

    let missing = app
        .client
        .get(app.url("/api/usuarios/999"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

// --- Contact Messages ---

#[tokio::test]
async fn test_contact_message_with_working_notifier() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/mensajes_contacto"))
        .json(&json!({ "name": "Lucía", "email": "lucia@mail.com", "message": "Hola" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email_sent"], true);
    assert!(body.get("email_note").is_none());
    assert_eq!(app.repo.message_count(), 1);
}

#[tokio::test]
async fn test_contact_message_kept_when_notifier_fails() {
    let app = spawn_app_with(AppOptions {
        notifier: Arc::new(MockNotifier::new_failing()),
        ..AppOptions::default()
    })
    .await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    let response = app
        .client
        .post(app.url("/api/mensajes_contacto"))
        .json(&json!({ "name": "Lucía", "email": "lucia@mail.com", "message": "Hola" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email_sent"], false);
    assert!(body["email_note"].is_string());

    let stored: Value = app
        .client
        .get(app.url("/api/mensajes_contacto?leido=false"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored[0]["subject"], "Sin asunto");
    assert_eq!(stored[0]["leido"], false);
}

#[tokio::test]
async fn test_contact_message_requires_fields() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/mensajes_contacto"))
        .json(&json!({ "name": "Lucía", "message": "Hola" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "Nombre, email y mensaje son requeridos");
    assert_eq!(app.repo.message_count(), 0);
}

#[tokio::test]
async fn test_reading_messages_requires_admin() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api/mensajes_contacto"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- Dashboard ---

#[tokio::test]
async fn test_dashboard_stats_and_recent() {
    let app = spawn_app().await;
    let (_, token) = app.principal("admin@colegio.edu", "admin");

    create_publication(&app, &token, json!({ "title": "Uno", "content": "..." })).await;
    app.client
        .post(app.url("/api/mensajes_contacto"))
        .json(&json!({ "name": "A", "email": "a@mail.com", "message": "m" }))
        .send()
        .await
        .unwrap();

    let stats: Value = app
        .client
        .get(app.url("/api/dashboard/stats"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["publications"], 1);
    assert_eq!(stats["messages"], 1);
    assert_eq!(stats["total_messages"], 1);
    assert_eq!(stats["users"], 1);

    let recent: Value = app
        .client
        .get(app.url("/api/dashboard/recent"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(recent["publications"].as_array().unwrap().len(), 1);
    assert_eq!(recent["messages"].as_array().unwrap().len(), 1);
}
