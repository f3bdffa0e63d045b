use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{DeleteUploadRequest, MessageResponse, UploadForm, UploadResponse},
    storage::{RemovalOutcome, UploadError, UploadFile},
    validation::ValidatedJson,
};

/// Destination folder when the client does not name one.
pub const DEFAULT_UPLOAD_FOLDER: &str = "publicaciones";

/// MultipartUpload
///
/// A drained multipart body: the `file` part, if any, plus every text field.
#[derive(Debug, Default)]
pub struct MultipartUpload {
    pub file: Option<UploadFile>,
    pub fields: HashMap<String, String>,
}

impl MultipartUpload {
    /// Text field value, with blank values treated as absent.
    pub fn field(&mut self, name: &str) -> Option<String> {
        self.fields
            .remove(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self) -> Result<UploadFile, UploadError> {
        self.file.take().ok_or(UploadError::MissingFile)
    }
}

fn malformed(msg: String) -> ApiError {
    ApiError::BadRequest(format!("Formulario inválido: {}", msg))
}

/// read_multipart
///
/// Reads the whole body. Only the first `file` part is kept.
pub async fn read_multipart(mut multipart: Multipart) -> ApiResult<MultipartUpload> {
    let mut upload = MultipartUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| malformed(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(|e| malformed(e.body_text()))?;
            if upload.file.is_none() {
                upload.file = Some(UploadFile::new(filename, bytes));
            }
        } else {
            let value = field.text().await.map_err(|e| malformed(e.body_text()))?;
            upload.fields.insert(name, value);
        }
    }

    Ok(upload)
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// upload_image
///
/// [Admin Route] Stores an image or video through the configured strategy and returns
/// its URLs and opaque handle. Extensions outside the allow-list answer 415 together with
/// both allowed lists.
#[utoipa::path(
    post,
    path = "/api/upload/image",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored", body = UploadResponse),
        (status = 400, description = "No file sent"),
        (status = 415, description = "Extension not allowed"),
        (status = 500, description = "Strategy failure")
    )
)]
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let multipart = multipart.map_err(|e| malformed(e.body_text()))?;
    let mut form = read_multipart(multipart).await?;
    let file = form.take_file()?;
    let folder = form
        .field("folder")
        .unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.to_string());

    let stored = state.uploads.store(file, &folder).await?;

    Ok(Json(UploadResponse {
        msg: format!("{} subido exitosamente", capitalize(&stored.resource_type)),
        url: stored.url,
        secure_url: stored.secure_url,
        public_id: stored.public_id,
        resource_type: stored.resource_type,
        format: stored.format,
        width: stored.width,
        height: stored.height,
    }))
}

/// delete_upload
///
/// [Admin Route] Removes a stored asset by the handle `upload_image` returned. An asset
/// that is already gone is not an error.
#[utoipa::path(
    delete,
    path = "/api/upload/image",
    request_body = DeleteUploadRequest,
    responses(
        (status = 200, description = "Removed or already absent", body = MessageResponse),
        (status = 500, description = "Strategy failure")
    )
)]
pub async fn delete_upload(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<DeleteUploadRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let outcome = state
        .uploads
        .remove(payload.public_id.trim(), payload.resource_type.as_deref())
        .await?;

    tracing::info!(public_id = %payload.public_id, ?outcome, "upload removal requested");

    let msg = match outcome {
        RemovalOutcome::Removed => "archivo eliminado",
        RemovalOutcome::Missing => "el archivo no existía",
    };
    Ok(Json(MessageResponse::new(msg)))
}
