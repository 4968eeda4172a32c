//! Account endpoints: registration, login, token renewal and admin grants.
//!
//! Flow Overview:
//! 1) Register/login verify or create password material (PBKDF2).
//! 2) On success a token is composed from the email plus stored claims.
//! 3) Renewal re-composes for the email of an already valid bearer token.
//! 4) Admin grants add or remove the `isAdmin` claim; they require `IsAdmin`.

mod storage;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::{ServiceError, normalize_email, valid_email};
use crate::auth::{
    AuthError, AuthState, Claim, ClaimsStore, IS_ADMIN_POLICY, IssuedToken, Principal,
    SecretVerifier, accounts,
};
use storage::{CredentialSource, InsertOutcome, StoredCredential, insert_claim, insert_user};

#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AdminRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub expiration: DateTime<Utc>,
}

impl From<IssuedToken> for AuthResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            expiration: issued.expiration,
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/accounts/register",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "User registered, token issued.", body = AuthResponse),
        (status = 400, description = "Invalid email or email already registered."),
    ),
    tag = "accounts"
)]
#[instrument(skip(auth, pool))]
pub async fn register(
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(request): Json<CredentialsRequest>,
) -> impl IntoResponse {
    match register_user(&auth, &pool, request).await {
        Ok(issued) => (StatusCode::OK, Json(AuthResponse::from(issued))).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn register_user(
    auth: &AuthState,
    pool: &PgPool,
    request: CredentialsRequest,
) -> Result<IssuedToken, ServiceError> {
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ServiceError::BadRequest("Invalid email."));
    }

    let hashed = auth.hasher().hash(&request.password)?;

    // User row and bootstrap claim commit together.
    let mut tx = pool.begin().await?;
    let user_id = match insert_user(&mut tx, &email, &hashed).await? {
        InsertOutcome::Created(user_id) => user_id,
        InsertOutcome::Conflict => {
            return Err(ServiceError::BadRequest("Email already registered."));
        }
    };
    let bootstrap_admin = auth.is_bootstrap_admin(&email);
    if bootstrap_admin {
        insert_claim(&mut tx, user_id, &Claim::admin()).await?;
    }
    tx.commit().await?;
    info!(%user_id, bootstrap_admin, "user registered");

    Ok(accounts::build_token(auth.issuer(), pool, &email).await?)
}

#[utoipa::path(
    post,
    path = "/v1/accounts/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Credentials verified, token issued.", body = AuthResponse),
        (status = 401, description = "Invalid credentials."),
    ),
    tag = "accounts"
)]
#[instrument(skip(auth, pool))]
pub async fn login(
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let issued = login_user(&auth, &*pool, request).await?;
    Ok(Json(issued.into()))
}

async fn login_user<S>(
    auth: &AuthState,
    store: &S,
    request: CredentialsRequest,
) -> Result<IssuedToken, AuthError>
where
    S: CredentialSource + ClaimsStore,
{
    let email = normalize_email(&request.email);
    let stored = store.credential(&email).await?;
    check_password(auth.hasher(), &request.password, stored.as_ref())?;
    accounts::build_token(auth.issuer(), store, &email).await
}

/// Unknown email and wrong password fail identically, after one derivation each.
fn check_password<V: SecretVerifier>(
    verifier: &V,
    password: &str,
    stored: Option<&StoredCredential>,
) -> Result<(), AuthError> {
    let Some(stored) = stored else {
        verifier.dummy_verify(password);
        debug!("login for unknown email");
        return Err(AuthError::InvalidCredential);
    };

    if verifier.verify(password, &stored.password_hash, &stored.password_salt) {
        Ok(())
    } else {
        debug!("login with wrong password");
        Err(AuthError::InvalidCredential)
    }
}

#[utoipa::path(
    get,
    path = "/v1/accounts/renew",
    responses(
        (status = 200, description = "Fresh token with current claims.", body = AuthResponse),
        (status = 401, description = "Missing, invalid or expired bearer token."),
    ),
    security(("bearer" = [])),
    tag = "accounts"
)]
pub async fn renew(
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<Json<AuthResponse>, AuthError> {
    let issued = accounts::renew(auth.issuer(), &*pool, &principal).await?;
    Ok(Json(issued.into()))
}

#[utoipa::path(
    post,
    path = "/v1/accounts/admin",
    request_body = AdminRequest,
    responses(
        (status = 204, description = "Admin claim granted."),
        (status = 401, description = "Missing, invalid or expired bearer token."),
        (status = 403, description = "Forbidden."),
        (status = 404, description = "User not found."),
    ),
    security(("bearer" = [])),
    tag = "accounts"
)]
#[instrument(skip(principal, auth, pool))]
pub async fn grant_admin(
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(request): Json<AdminRequest>,
) -> impl IntoResponse {
    set_admin(&principal, &auth, &*pool, &request.email, true).await
}

#[utoipa::path(
    post,
    path = "/v1/accounts/admin/remove",
    request_body = AdminRequest,
    responses(
        (status = 204, description = "Admin claim removed."),
        (status = 401, description = "Missing, invalid or expired bearer token."),
        (status = 403, description = "Forbidden."),
        (status = 404, description = "User not found."),
    ),
    security(("bearer" = [])),
    tag = "accounts"
)]
#[instrument(skip(principal, auth, pool))]
pub async fn revoke_admin(
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(request): Json<AdminRequest>,
) -> impl IntoResponse {
    set_admin(&principal, &auth, &*pool, &request.email, false).await
}

async fn set_admin<S: ClaimsStore>(
    principal: &Principal,
    auth: &AuthState,
    store: &S,
    email: &str,
    grant: bool,
) -> Result<StatusCode, ServiceError> {
    principal.ensure(auth.policies(), IS_ADMIN_POLICY)?;

    let email = normalize_email(email);
    let found = if grant {
        store.add_claim(&email, &Claim::admin()).await?
    } else {
        store.remove_claim(&email, &Claim::admin()).await?
    };

    if found {
        info!(actor = %principal.email, target = %email, grant, "admin claim updated");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServiceError::NotFound)
    }
}
