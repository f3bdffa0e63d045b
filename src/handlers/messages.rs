use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{
        ContactMessage, ContactMessageCreated, CreateContactMessageRequest, DEFAULT_SUBJECT,
        MessageFilter, MessageQuery, MessageResponse, NewContactMessage,
    },
    notifier::{ContactNotice, NotifyError},
    validation::ValidatedJson,
};

const EMAIL_FAILED_NOTE: &str = "Mensaje guardado, pero notificación por email falló";

fn not_found() -> ApiError {
    ApiError::NotFound("Mensaje no encontrado".to_string())
}

/// create_message
///
/// [Public Route] Stores the message, then tries to notify the administrator. The
/// notification outcome only changes `email_sent`; the message is kept either way.
#[utoipa::path(
    post,
    path = "/api/mensajes_contacto",
    request_body = CreateContactMessageRequest,
    responses(
        (status = 201, description = "Stored", body = ContactMessageCreated),
        (status = 400, description = "Missing name, email or message")
    )
)]
pub async fn create_message(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateContactMessageRequest>,
) -> ApiResult<(StatusCode, Json<ContactMessageCreated>)> {
    let subject = payload
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

    let message = state
        .repo
        .create_message(NewContactMessage {
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_string(),
            phone: payload.phone,
            subject,
            message: payload.message,
        })
        .await?;

    let notice = ContactNotice {
        name: message.name.clone(),
        email: message.email.clone(),
        phone: message.phone.clone(),
        subject: message.subject.clone(),
        message: message.message.clone(),
    };

    let email_sent = match state.notifier.notify_contact(&notice).await {
        Ok(()) => true,
        Err(NotifyError::NotConfigured) => {
            tracing::info!(message_id = message.id, "email notifications disabled, skipping");
            false
        }
        Err(e) => {
            tracing::warn!(message_id = message.id, error = %e, "contact notification failed");
            false
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(ContactMessageCreated {
            id: message.id,
            msg: "mensaje enviado correctamente".to_string(),
            email_sent,
            email_note: (!email_sent).then(|| EMAIL_FAILED_NOTE.to_string()),
        }),
    ))
}

/// list_messages
///
/// [Admin Route] Newest first, optionally filtered by the read flag (`leido`).
#[utoipa::path(
    get,
    path = "/api/mensajes_contacto",
    params(MessageQuery),
    responses((status = 200, description = "Messages", body = [ContactMessage]))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    query: Result<Query<MessageQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ContactMessage>>> {
    let Query(query) = query?;
    let filter = MessageFilter::from(query);
    Ok(Json(state.repo.list_messages(&filter).await?))
}

/// get_message
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/api/mensajes_contacto/{id}",
    params(("id" = i32, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Found", body = ContactMessage),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<ContactMessage>> {
    state
        .repo
        .find_message(id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// delete_message
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/api/mensajes_contacto/{id}",
    params(("id" = i32, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.repo.delete_message(id).await? {
        return Err(not_found());
    }
    tracing::info!(message_id = id, "contact message deleted");
    Ok(Json(MessageResponse::new("mensaje eliminado")))
}
