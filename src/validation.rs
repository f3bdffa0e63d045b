use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::{
    error::ApiError,
    models::{
        CreateCategoryRequest, CreateContactMessageRequest, CreateGalleryItemRequest,
        CreatePublicationRequest, CreateUserRequest, DeleteUploadRequest, LoginRequest,
        UpdateCategoryRequest, UpdateGalleryItemRequest, UpdatePublicationRequest,
        UpdateUserRequest,
    },
};

/// Validate
///
/// Field-level checks a payload must pass before a handler sees it.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// ValidatedJson
///
/// `Json<T>` followed by `T::validate`. Malformed bodies and failed checks both answer
/// 400 with the `ApiError` body.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn require_all(fields: &[&str], msg: &str) -> Result<(), ApiError> {
    if fields.iter().any(|f| is_blank(f)) {
        return Err(ApiError::BadRequest(msg.to_string()));
    }
    Ok(())
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_all(&[&self.email, &self.password], "Credenciales incompletas")
    }
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_all(&[&self.email, &self.password], "Email y contraseña son requeridos")
    }
}

impl Validate for CreateCategoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_all(&[&self.slug, &self.name], "Slug y nombre son requeridos")
    }
}

impl Validate for CreatePublicationRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_all(&[&self.title, &self.content], "Título y contenido son requeridos")
    }
}

impl Validate for CreateGalleryItemRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_all(&[&self.title, &self.url], "Título y URL son requeridos")
    }
}

impl Validate for CreateContactMessageRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_all(
            &[&self.name, &self.email, &self.message],
            "Nombre, email y mensaje son requeridos",
        )
    }
}

impl Validate for DeleteUploadRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_all(&[&self.public_id], "public_id es requerido")
    }
}

// Partial updates: every field is optional, but a slug or title that is sent must not be
// blank.

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.email.as_deref().is_some_and(is_blank) {
            return Err(ApiError::BadRequest("El email no puede estar vacío".to_string()));
        }
        Ok(())
    }
}

impl Validate for UpdateCategoryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.slug.as_deref().is_some_and(is_blank) || self.name.as_deref().is_some_and(is_blank)
        {
            return Err(ApiError::BadRequest(
                "Slug y nombre no pueden estar vacíos".to_string(),
            ));
        }
        Ok(())
    }
}

impl Validate for UpdatePublicationRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.title.as_deref().is_some_and(is_blank) || self.slug.as_deref().is_some_and(is_blank)
        {
            return Err(ApiError::BadRequest(
                "Título y slug no pueden estar vacíos".to_string(),
            ));
        }
        Ok(())
    }
}

impl Validate for UpdateGalleryItemRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.title.as_deref().is_some_and(is_blank) || self.url.as_deref().is_some_and(is_blank)
        {
            return Err(ApiError::BadRequest(
                "Título y URL no pueden estar vacíos".to_string(),
            ));
        }
        Ok(())
    }
}
