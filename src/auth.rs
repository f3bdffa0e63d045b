use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::{Role, User},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the access token. `sub` is the principal id rendered as a string; `exp` is
/// only present when a token lifetime is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

const INVALID_CREDENTIALS: &str = "Credenciales inválidas";
const MISSING_TOKEN: &str = "Token de acceso requerido";
const INVALID_TOKEN: &str = "Token inválido";
const EXPIRED_TOKEN: &str = "Token expirado";

// --- Tokens ---

/// issue_token
///
/// Signs a stateless bearer token (HS256) for the given principal.
pub fn issue_token(user_id: i32, config: &AppConfig) -> ApiResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: config.jwt_ttl_hours.map(|hours| now + hours * 3600),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))
}

/// decode_token
///
/// Verifies signature and, when present, expiry. Tokens without `exp` are accepted.
pub fn decode_token(token: &str, secret: &str) -> ApiResult<Claims> {
    let mut validation = Validation::default();
    // `exp` is optional; it is still checked whenever the token carries one.
    validation.required_spec_claims.clear();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => ApiError::Unauthenticated(EXPIRED_TOKEN.to_string()),
        _ => ApiError::Unauthenticated(INVALID_TOKEN.to_string()),
    })
}

/// Value of `Authorization: Bearer <token>`, if well formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// --- Secrets ---

/// hash_password
///
/// Argon2id with a random salt, stored in PHC string format.
pub fn hash_password(plain: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

/// A stored hash that cannot be parsed never matches.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hash checked against when the identifier is unknown, so both failures cost one
/// verification.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("colegio-cms-dummy-secret").ok())
        .as_deref()
}

/// verify_credentials
///
/// Resolves a login identifier and secret to a principal. Unknown identifier and wrong
/// secret produce the same error.
pub async fn verify_credentials(
    repo: &RepositoryState,
    email: &str,
    password: &str,
) -> ApiResult<User> {
    match repo.find_user_by_email(email).await? {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        Some(user) => {
            tracing::info!(user_id = user.id, "login rejected: wrong password");
            Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.to_string()))
        }
        None => {
            if let Some(hash) = dummy_hash() {
                let _ = verify_password(password, hash);
            }
            tracing::info!("login rejected: unknown identifier");
            Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.to_string()))
        }
    }
}

/// resolve_principal
///
/// Bearer token -> verified claims -> principal row.
///
/// A verified token naming a principal that no longer exists yields
/// `ApiError::PrincipalNotFound` (404), not 401.
pub async fn resolve_principal(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> ApiResult<User> {
    let token =
        bearer_token(headers).ok_or_else(|| ApiError::Unauthenticated(MISSING_TOKEN.to_string()))?;
    let claims = decode_token(token, &config.jwt_secret)?;
    let user_id: i32 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::Unauthenticated(INVALID_TOKEN.to_string()))?;

    repo.find_user(user_id)
        .await?
        .ok_or(ApiError::PrincipalNotFound)
}

// --- Role Gate ---

/// Access
///
/// Role sets the gate can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `admin` or `superadmin`.
    Admin,
    /// `superadmin` only.
    SuperAdmin,
}

impl Access {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Access::Admin => &[Role::Admin, Role::Superadmin],
            Access::SuperAdmin => &[Role::Superadmin],
        }
    }

    /// Unknown role strings are never permitted.
    pub fn permits(&self, role: &str) -> bool {
        Role::parse(role).is_some_and(|role| self.allowed_roles().contains(&role))
    }

    fn denial(&self) -> &'static str {
        match self {
            Access::Admin => "Se requieren permisos de administrador",
            Access::SuperAdmin => "Se requieren permisos de superadministrador",
        }
    }
}

/// RoleGate
///
/// State of the `require_role` middleware: what it needs to resolve a principal plus the
/// role set this particular route group demands.
#[derive(Clone)]
pub struct RoleGate {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub access: Access,
}

impl RoleGate {
    pub fn new<S>(state: &S, access: Access) -> Self
    where
        RepositoryState: FromRef<S>,
        AppConfig: FromRef<S>,
    {
        Self {
            repo: RepositoryState::from_ref(state),
            config: AppConfig::from_ref(state),
            access,
        }
    }
}

/// require_role
///
/// Applied with `middleware::from_fn_with_state(RoleGate::new(&state, access), require_role)`.
/// On success the resolved principal is stored in the request extensions as `CurrentUser`.
pub async fn require_role(
    State(gate): State<RoleGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_principal(request.headers(), &gate.repo, &gate.config).await?;

    if !gate.access.permits(&user.role) {
        tracing::info!(user_id = user.id, role = %user.role, access = ?gate.access, "role gate denied");
        return Err(ApiError::Forbidden(gate.access.denial().to_string()));
    }

    tracing::debug!(user_id = user.id, role = %user.role, "role gate passed");
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// CurrentUser
///
/// The principal injected by `require_role`. Only usable on gated routes.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthenticated(MISSING_TOKEN.to_string()))
    }
}

/// AuthUser
///
/// Any authenticated principal, whatever its role. Reuses the principal already resolved
/// by a role gate when there is one. Unlike the gate, a vanished principal is answered
/// with 401 here.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(CurrentUser(user)) = parts.extensions.get::<CurrentUser>() {
            return Ok(AuthUser(user.clone()));
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        match resolve_principal(&parts.headers, &repo, &config).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(ApiError::PrincipalNotFound) => {
                Err(ApiError::Unauthenticated("No autorizado".to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
