use crate::api::handlers::{health, root};
use crate::auth::AuthState;
use crate::pagination::TOTAL_COUNT_HEADER;
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, options},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

pub(crate) const SCHEMA_SQL: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

pub use crate::GIT_COMMIT_HASH;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Full application: documented routes plus `/`, `OPTIONS /health` and the
/// request-id, tracing, CORS and state layers.
pub fn app(auth_state: Arc<AuthState>, pool: PgPool, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(AllowOrigin::exact(allowed_origin))
        .expose_headers([HeaderName::from_static(TOTAL_COUNT_HEADER)]);

    let (router, _openapi) = router().split_for_parts();
    router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(pool)),
        )
}

/// Start the server
/// # Errors
/// Return error if the database is unreachable, the schema cannot be applied
/// or the listener fails
pub async fn new(
    port: u16,
    dsn: String,
    auth_state: Arc<AuthState>,
    allowed_origin: HeaderValue,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::raw_sql(SCHEMA_SQL)
        .execute(&pool)
        .await
        .context("Failed to apply database schema")?;

    let app = app(auth_state, pool, allowed_origin);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, Claim};
    use crate::discovery::Affordance;
    use anyhow::anyhow;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use secrecy::SecretString;
    use tower::ServiceExt;

    // Never connects: every request below is settled before any query runs.
    fn test_app() -> Result<(Router, Arc<AuthState>)> {
        let auth_state = Arc::new(AuthState::from_config(
            AuthConfig::new(SecretString::from("router-test-key")).with_kdf_iterations(1_000),
        )?);
        let pool = PgPoolOptions::new().connect_lazy("postgres://autores@127.0.0.1:1/autores")?;
        let app = app(
            auth_state.clone(),
            pool,
            HeaderValue::from_static("https://apirequest.io"),
        );
        Ok((app, auth_state))
    }

    fn bearer(auth_state: &AuthState, admin: bool) -> Result<String> {
        let mut claims = vec![Claim::email("caller@example.com")];
        if admin {
            claims.push(Claim::admin());
        }
        Ok(format!("Bearer {}", auth_state.issuer().issue(claims)?.token))
    }

    fn request(method: Method, uri: &str, token: Option<&str>) -> Result<Request<Body>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token);
        }
        Ok(builder.body(Body::empty())?)
    }

    async fn discovery_links(app: Router, token: Option<&str>) -> Result<Vec<Affordance>> {
        let response = app.oneshot(request(Method::GET, "/v1", token)?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await?.to_bytes();
        Ok(serde_json::from_slice(&body)?)
    }

    #[tokio::test]
    async fn discovery_depends_on_admin_claim() -> Result<()> {
        let (app, auth_state) = test_app()?;

        let anonymous = discovery_links(app.clone(), None).await?;
        assert_eq!(anonymous.len(), 2);

        let plain = bearer(&auth_state, false)?;
        assert_eq!(discovery_links(app.clone(), Some(&plain)).await?.len(), 2);

        let admin = bearer(&auth_state, true)?;
        assert_eq!(discovery_links(app.clone(), Some(&admin)).await?.len(), 4);

        let garbage = discovery_links(app, Some("Bearer nope")).await?;
        assert_eq!(garbage.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn renew_without_token_is_unauthorized() -> Result<()> {
        let (app, _) = test_app()?;
        let response = app
            .oneshot(request(Method::GET, "/v1/accounts/renew", None)?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn admin_routes_forbid_plain_users() -> Result<()> {
        let (app, auth_state) = test_app()?;
        let plain = bearer(&auth_state, false)?;

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/v1/authors/1", Some(&plain))?)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request(Method::DELETE, "/v1/authors/1", None)?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn admin_grants_require_admin_token() -> Result<()> {
        let (app, auth_state) = test_app()?;
        let plain = bearer(&auth_state, false)?;

        for uri in ["/v1/accounts/admin", "/v1/accounts/admin/remove"] {
            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(AUTHORIZATION, &plain)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"target@example.com"}"#))?;
            let response = app.clone().oneshot(request).await?;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn non_positive_page_size_is_bad_request() -> Result<()> {
        let (app, _) = test_app()?;
        for uri in ["/v1/authors?page_size=0", "/v1/books?page=3&page_size=-1"] {
            let response = app.clone().oneshot(request(Method::GET, uri, None)?).await?;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn responses_carry_request_id() -> Result<()> {
        let (app, _) = test_app()?;
        let response = app.oneshot(request(Method::GET, "/", None)?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response
            .headers()
            .get("x-request-id")
            .ok_or_else(|| anyhow!("missing x-request-id"))?;
        assert!(Ulid::from_string(request_id.to_str()?).is_ok());
        Ok(())
    }
}
