//! Banner and discovery document.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, header::AUTHORIZATION},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::debug;

use crate::auth::{AuthState, IS_ADMIN_POLICY, principal::authenticate};
use crate::discovery::{Affordance, affordances};

pub async fn root() -> impl IntoResponse {
    format!(
        "{} {} - authors and books catalog, see /v1",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

#[utoipa::path(
    get,
    path = "/v1",
    responses(
        (status = 200, description = "Links the caller may follow; admins get the create links too.", body = [Affordance]),
    ),
    security((), ("bearer" = [])),
    tag = "discovery"
)]
pub async fn discovery(headers: HeaderMap, auth: Extension<Arc<AuthState>>) -> Json<Vec<Affordance>> {
    // Anonymous callers and bad tokens both get the public set.
    let is_admin = match authenticate(&auth, &headers) {
        Ok(principal) => principal
            .evaluate(auth.policies(), IS_ADMIN_POLICY)
            .is_allowed(),
        Err(err) => {
            if headers.contains_key(AUTHORIZATION) {
                debug!("discovery with unusable token: {err}");
            }
            false
        }
    };

    Json(affordances("", is_admin))
}
