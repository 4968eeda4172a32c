//! Book catalog endpoints.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::{ServiceError, normalize_name};
use crate::auth::{AuthState, IS_ADMIN_POLICY, Principal};
use crate::pagination::{Page, Pagination, PaginationQuery};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub published_on: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookDetail {
    pub id: i64,
    pub title: String,
    pub published_on: Option<NaiveDate>,
    /// Author ids in the order they were given at creation.
    pub author_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BookRequest {
    pub title: String,
    pub published_on: Option<NaiveDate>,
    pub author_ids: Vec<i64>,
}

#[utoipa::path(
    get,
    path = "/v1/books",
    params(PaginationQuery),
    responses(
        (status = 200, description = "One page of books ordered by title; total in x-total-count.", body = [BookSummary]),
        (status = 400, description = "Page size must be positive."),
    ),
    tag = "books"
)]
pub async fn list_books(
    Query(query): Query<PaginationQuery>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let page = match query.resolve() {
        Ok(pagination) => fetch_book_page(&pool, pagination).await,
        Err(err) => Err(err.into()),
    };

    match page {
        Ok(page) => (StatusCode::OK, page.headers(), Json(page.items)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/books/{id}",
    params(
        ("id" = i64, Path, description = "Book id")
    ),
    responses(
        (status = 200, description = "Book with author ids.", body = BookDetail),
        (status = 404, description = "Book not found."),
    ),
    tag = "books"
)]
pub async fn get_book(
    Path(id): Path<i64>,
    pool: Extension<PgPool>,
) -> Result<Json<BookDetail>, ServiceError> {
    fetch_book_detail(&pool, id)
        .await?
        .map(Json)
        .ok_or(ServiceError::NotFound)
}

#[utoipa::path(
    post,
    path = "/v1/books",
    request_body = BookRequest,
    responses(
        (status = 201, description = "Book created.", body = BookDetail),
        (status = 400, description = "Missing title, no authors or unknown author id."),
        (status = 401, description = "Missing, invalid or expired bearer token."),
        (status = 403, description = "Forbidden."),
    ),
    security(("bearer" = [])),
    tag = "books"
)]
pub async fn create_book(
    principal: Principal,
    auth: Extension<Arc<AuthState>>,
    pool: Extension<PgPool>,
    Json(payload): Json<BookRequest>,
) -> Result<(StatusCode, Json<BookDetail>), ServiceError> {
    principal.ensure(auth.policies(), IS_ADMIN_POLICY)?;
    let book = insert_book(&pool, payload).await?;
    info!(actor = %principal.email, book_id = book.id, "book created");
    Ok((StatusCode::CREATED, Json(book)))
}

async fn fetch_book_page(
    pool: &PgPool,
    pagination: Pagination,
) -> Result<Page<BookSummary>, ServiceError> {
    let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await?;

    let query = r"
        SELECT id, title, published_on
        FROM books
        ORDER BY title, id
        LIMIT $1 OFFSET $2
    ";
    let rows = sqlx::query(query)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page {
        items: rows
            .into_iter()
            .map(|row| BookSummary {
                id: row.get("id"),
                title: row.get("title"),
                published_on: row.get("published_on"),
            })
            .collect(),
        total_count,
    })
}

async fn fetch_book_detail(pool: &PgPool, id: i64) -> Result<Option<BookDetail>, sqlx::Error> {
    let Some(row) = sqlx::query("SELECT id, title, published_on FROM books WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let author_ids = sqlx::query_scalar(
        "SELECT author_id FROM author_books WHERE book_id = $1 ORDER BY position",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Some(BookDetail {
        id: row.get("id"),
        title: row.get("title"),
        published_on: row.get("published_on"),
        author_ids,
    }))
}

/// Insert the book and its author links in one transaction.
async fn insert_book(pool: &PgPool, payload: BookRequest) -> Result<BookDetail, ServiceError> {
    let title =
        normalize_name(&payload.title).ok_or(ServiceError::BadRequest("Title is required."))?;
    let author_ids = dedup_keep_order(payload.author_ids);
    if author_ids.is_empty() {
        return Err(ServiceError::BadRequest("At least one author is required."));
    }

    let mut tx = pool.begin().await?;

    let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors WHERE id = ANY($1)")
        .bind(&author_ids)
        .fetch_one(&mut *tx)
        .await?;
    if usize::try_from(known).ok() != Some(author_ids.len()) {
        return Err(ServiceError::BadRequest("Unknown author id."));
    }

    let id: i64 =
        sqlx::query_scalar("INSERT INTO books (title, published_on) VALUES ($1, $2) RETURNING id")
            .bind(&title)
            .bind(payload.published_on)
            .fetch_one(&mut *tx)
            .await?;

    for (position, author_id) in author_ids.iter().enumerate() {
        sqlx::query("INSERT INTO author_books (author_id, book_id, position) VALUES ($1, $2, $3)")
            .bind(author_id)
            .bind(id)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(BookDetail {
        id,
        title,
        published_on: payload.published_on,
        author_ids,
    })
}

fn dedup_keep_order(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
