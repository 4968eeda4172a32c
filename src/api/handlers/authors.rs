//! Author catalog endpoints.
//!
//! Listing is anonymous and paginated; every other operation requires the
//! `IsAdmin` policy.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::{ServiceError, is_unique_violation, normalize_name};
use crate::auth::{AuthState, IS_ADMIN_POLICY, Principal};
use crate::pagination::{Page, Pagination, PaginationQuery};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorDetail {
    pub id: i64,
    pub name: String,
    pub books: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AuthorRequest {
    pub name: String,
}

#[utoipa::path(
    get,
    path = "/v1/authors",
    params(PaginationQuery),
    responses(
        (status = 200, description = "One page of authors ordered by name; total in x-total-count.", body = [AuthorSummary]),
        (status = 400, description = "Page size must be positive."),
    ),
    tag = "authors"
)]
pub async fn list_authors(
    Query(query): Query<PaginationQuery>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let page = match query.resolve() {
        Ok(pagination) => fetch_author_page(&pool, pagination).await,
        Err(err) => Err(err.into()),
    };

    match page {
        Ok(page) => (StatusCode::OK, page.headers(), Json(page.items)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/authors/{id}",
    params(
        ("id" = i64, Path, description = "Author id")
    ),
    responses(
        (status = 200, description = "Author with book titles.", body = AuthorDetail),
        (status = 401, description = "Missing, invalid or expired bearer token."),
        (status = 403, description = "Forbidden."),
        (status = 404, description = "Author not found."),
    ),
    security(("bearer" = [])),
    tag = "authors"
)]
pub async fn get_author(
    Path(id): Path<i64>,
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<Json<AuthorDetail>, ServiceError> {
    principal.ensure(auth.policies(), IS_ADMIN_POLICY)?;
    fetch_author_detail(&pool, id)
        .await?
        .map(Json)
        .ok_or(ServiceError::NotFound)
}

#[utoipa::path(
    get,
    path = "/v1/authors/search/{name}",
    params(
        ("name" = String, Path, description = "Case-insensitive fragment of the author name")
    ),
    responses(
        (status = 200, description = "Matching authors ordered by name.", body = [AuthorSummary]),
        (status = 401, description = "Missing, invalid or expired bearer token."),
        (status = 403, description = "Forbidden."),
    ),
    security(("bearer" = [])),
    tag = "authors"
)]
pub async fn search_authors(
    Path(name): Path<String>,
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<Json<Vec<AuthorSummary>>, ServiceError> {
    principal.ensure(auth.policies(), IS_ADMIN_POLICY)?;
    Ok(Json(search_author_names(&pool, name.trim()).await?))
}

#[utoipa::path(
    post,
    path = "/v1/authors",
    request_body = AuthorRequest,
    responses(
        (status = 201, description = "Author created.", body = AuthorSummary),
        (status = 400, description = "Missing or duplicate name."),
        (status = 401, description = "Missing, invalid or expired bearer token."),
        (status = 403, description = "Forbidden."),
    ),
    security(("bearer" = [])),
    tag = "authors"
)]
pub async fn create_author(
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(payload): Json<AuthorRequest>,
) -> Result<(StatusCode, Json<AuthorSummary>), ServiceError> {
    principal.ensure(auth.policies(), IS_ADMIN_POLICY)?;
    let name =
        normalize_name(&payload.name).ok_or(ServiceError::BadRequest("Name is required."))?;
    let author = insert_author(&pool, &name).await?;
    info!(actor = %principal.email, author_id = author.id, "author created");
    Ok((StatusCode::CREATED, Json(author)))
}

#[utoipa::path(
    put,
    path = "/v1/authors/{id}",
    params(
        ("id" = i64, Path, description = "Author id")
    ),
    request_body = AuthorRequest,
    responses(
        (status = 204, description = "Author renamed."),
        (status = 400, description = "Missing or duplicate name."),
        (status = 401, description = "Missing, invalid or expired bearer token."),
        (status = 403, description = "Forbidden."),
        (status = 404, description = "Author not found."),
    ),
    security(("bearer" = [])),
    tag = "authors"
)]
pub async fn update_author(
    Path(id): Path<i64>,
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(payload): Json<AuthorRequest>,
) -> Result<StatusCode, ServiceError> {
    principal.ensure(auth.policies(), IS_ADMIN_POLICY)?;
    let name =
        normalize_name(&payload.name).ok_or(ServiceError::BadRequest("Name is required."))?;
    if rename_author(&pool, id, &name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServiceError::NotFound)
    }
}

#[utoipa::path(
    delete,
    path = "/v1/authors/{id}",
    params(
        ("id" = i64, Path, description = "Author id")
    ),
    responses(
        (status = 204, description = "Author deleted."),
        (status = 401, description = "Missing, invalid or expired bearer token."),
        (status = 403, description = "Forbidden."),
        (status = 404, description = "Author not found."),
    ),
    security(("bearer" = [])),
    tag = "authors"
)]
pub async fn delete_author(
    Path(id): Path<i64>,
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
) -> Result<StatusCode, ServiceError> {
    principal.ensure(auth.policies(), IS_ADMIN_POLICY)?;
    let deleted = sqlx::query("DELETE FROM authors WHERE id = $1")
        .bind(id)
        .execute(&*pool)
        .await?
        .rows_affected()
        > 0;
    if deleted {
        info!(actor = %principal.email, author_id = id, "author deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServiceError::NotFound)
    }
}

pub(crate) async fn fetch_author_page(
    pool: &PgPool,
    pagination: Pagination,
) -> Result<Page<AuthorSummary>, ServiceError> {
    let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
        .fetch_one(pool)
        .await?;

    let query = r"
        SELECT id, name
        FROM authors
        ORDER BY name, id
        LIMIT $1 OFFSET $2
    ";
    let rows = sqlx::query(query)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page {
        items: rows.into_iter().map(summary_from_row).collect(),
        total_count,
    })
}

async fn fetch_author_detail(pool: &PgPool, id: i64) -> Result<Option<AuthorDetail>, sqlx::Error> {
    let Some(row) = sqlx::query("SELECT id, name FROM authors WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let query = r"
        SELECT b.title
        FROM author_books ab
        JOIN books b ON b.id = ab.book_id
        WHERE ab.author_id = $1
        ORDER BY b.title, b.id
    ";
    let books = sqlx::query_scalar(query).bind(id).fetch_all(pool).await?;

    Ok(Some(AuthorDetail {
        id: row.get("id"),
        name: row.get("name"),
        books,
    }))
}

async fn search_author_names(pool: &PgPool, fragment: &str) -> Result<Vec<AuthorSummary>, sqlx::Error> {
    let query = r"
        SELECT id, name
        FROM authors
        WHERE strpos(lower(name), lower($1)) > 0
        ORDER BY name, id
    ";
    let rows = sqlx::query(query).bind(fragment).fetch_all(pool).await?;
    Ok(rows.into_iter().map(summary_from_row).collect())
}

async fn insert_author(pool: &PgPool, name: &str) -> Result<AuthorSummary, ServiceError> {
    match sqlx::query("INSERT INTO authors (name) VALUES ($1) RETURNING id, name")
        .bind(name)
        .fetch_one(pool)
        .await
    {
        Ok(row) => Ok(summary_from_row(row)),
        Err(err) if is_unique_violation(&err) => {
            Err(ServiceError::BadRequest("Author already exists."))
        }
        Err(err) => Err(err.into()),
    }
}

async fn rename_author(pool: &PgPool, id: i64, name: &str) -> Result<bool, ServiceError> {
    match sqlx::query("UPDATE authors SET name = $1 WHERE id = $2")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await
    {
        Ok(result) => Ok(result.rows_affected() > 0),
        Err(err) if is_unique_violation(&err) => {
            Err(ServiceError::BadRequest("Author already exists."))
        }
        Err(err) => Err(err.into()),
    }
}

fn summary_from_row(row: sqlx::postgres::PgRow) -> AuthorSummary {
    AuthorSummary {
        id: row.get("id"),
        name: row.get("name"),
    }
}
