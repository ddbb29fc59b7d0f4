//! 도서 카탈로그 API.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/books` - 도서 목록 (카테고리/상태/검색어 필터)
//! - `GET /api/v1/books/{id}` - 도서 상세
//! - `POST /api/v1/books` - 도서 등록 (staff)
//! - `PUT /api/v1/books/{id}` - 도서 정보 수정 (staff)
//! - `DELETE /api/v1/books/{id}` - 도서 삭제 (staff)
//!
//! 대출 상태(`availability`)는 요청으로 변경할 수 없습니다.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use library_core::{Book, BookUpdate, NewBook};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::StaffAuth;
use crate::error::{library_error, validate_request, ApiErrorResponse, ApiResult};
use crate::repository::{BookQuery, BookRepository};
use crate::state::AppState;

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 도서 목록 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct BookListResponse {
    pub books: Vec<Book>,
    pub total: usize,
}

/// 도서 등록 요청
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateBookRequest {
    #[validate(length(min = 1, max = 300, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publication: String,
    #[validate(length(min = 1, max = 32, message = "isbn is required"))]
    pub isbn: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub edition: String,
    /// 보유 권수 (기본 1)
    #[validate(range(min = 1, message = "copies must be at least 1"))]
    pub copies: Option<i32>,
    #[validate(range(min = 1, message = "category_id is required"))]
    pub category_id: i64,
}

impl From<CreateBookRequest> for NewBook {
    fn from(request: CreateBookRequest) -> Self {
        Self {
            name: request.name,
            author: request.author,
            publication: request.publication,
            isbn: request.isbn,
            genre: request.genre,
            edition: request.edition,
            copies: request.copies.unwrap_or(1),
            category_id: request.category_id,
        }
    }
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 도서 목록 조회.
#[utoipa::path(
    get,
    path = "/api/v1/books",
    params(BookQuery),
    responses(
        (status = 200, description = "도서 목록", body = BookListResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "books"
)]
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookQuery>,
) -> ApiResult<Json<BookListResponse>> {
    debug!(?query, "GET /books");
    let pool = state.require_db()?;

    let books = BookRepository::list(pool, &query)
        .await
        .map_err(library_error)?;
    let total = books.len();

    Ok(Json(BookListResponse { books, total }))
}

/// 도서 상세 조회.
#[utoipa::path(
    get,
    path = "/api/v1/books/{id}",
    params(("id" = i64, Path, description = "도서 ID")),
    responses(
        (status = 200, description = "도서 정보", body = Book),
        (status = 404, description = "도서 없음", body = ApiErrorResponse)
    ),
    tag = "books"
)]
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Book>> {
    let pool = state.require_db()?;
    let book = BookRepository::get(pool, id).await.map_err(library_error)?;
    Ok(Json(book))
}

/// 도서 등록 (staff).
#[utoipa::path(
    post,
    path = "/api/v1/books",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "등록 완료", body = Book),
        (status = 400, description = "입력 오류 또는 없는 카테고리", body = ApiErrorResponse),
        (status = 403, description = "staff 권한 필요", body = ApiErrorResponse),
        (status = 409, description = "ISBN 중복", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "books"
)]
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Json(request): Json<CreateBookRequest>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    validate_request(&request)?;
    let pool = state.require_db()?;

    let book = BookRepository::create(pool, &request.into())
        .await
        .map_err(library_error)?;

    info!(book_id = book.id, isbn = %book.isbn, staff = %claims.sub, "Book created");
    Ok((StatusCode::CREATED, Json(book)))
}

/// 도서 정보 수정 (staff).
#[utoipa::path(
    put,
    path = "/api/v1/books/{id}",
    params(("id" = i64, Path, description = "도서 ID")),
    request_body = BookUpdate,
    responses(
        (status = 200, description = "수정 완료", body = Book),
        (status = 400, description = "입력 오류", body = ApiErrorResponse),
        (status = 404, description = "도서 없음", body = ApiErrorResponse),
        (status = 409, description = "ISBN 중복", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "books"
)]
pub async fn update_book(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Path(id): Path<i64>,
    Json(update): Json<BookUpdate>,
) -> ApiResult<Json<Book>> {
    let pool = state.require_db()?;

    let book = BookRepository::update(pool, id, &update)
        .await
        .map_err(library_error)?;

    info!(book_id = id, staff = %claims.sub, "Book updated");
    Ok(Json(book))
}

/// 도서 삭제 (staff).
#[utoipa::path(
    delete,
    path = "/api/v1/books/{id}",
    params(("id" = i64, Path, description = "도서 ID")),
    responses(
        (status = 204, description = "삭제 완료"),
        (status = 404, description = "도서 없음", body = ApiErrorResponse),
        (status = 409, description = "대출/예약 기록이 있는 도서", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "books"
)]
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let pool = state.require_db()?;

    BookRepository::delete(pool, id)
        .await
        .map_err(library_error)?;

    info!(book_id = id, staff = %claims.sub, "Book deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 도서 라우터 생성.
pub fn books_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{create_token, Claims, Role};
    use crate::state::{create_test_state, TEST_JWT_SECRET};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn app() -> Router {
        books_router().with_state(Arc::new(create_test_state()))
    }

    fn bearer(role: Role) -> String {
        let claims = Claims::new(1, "tester", role, 60);
        format!("Bearer {}", create_token(&claims, TEST_JWT_SECRET).unwrap())
    }

    fn create_request(auth: Option<String>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn valid_book() -> serde_json::Value {
        serde_json::json!({"name": "Dune", "isbn": "978-0441013593", "category_id": 1})
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateBookRequest = serde_json::from_value(valid_book()).unwrap();
        assert!(request.validate().is_ok());

        let book = NewBook::from(request);
        assert_eq!(book.copies, 1);
        assert!(book.author.is_empty());
    }

    #[test]
    fn test_create_request_rejects_availability() {
        let mut body = valid_book();
        body["availability"] = serde_json::json!("Borrowed");

        let result: Result<CreateBookRequest, _> = serde_json::from_value(body);
        assert!(result.is_err());
    }

    #[test]
    fn test_update_rejects_availability() {
        let result: Result<BookUpdate, _> =
            serde_json::from_str(r#"{"availability": "Available"}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_requires_token() {
        let response = app()
            .oneshot(create_request(None, valid_book()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_forbidden_for_student() {
        let response = app()
            .oneshot(create_request(Some(bearer(Role::Student)), valid_book()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_create_validates_before_database() {
        let response = app()
            .oneshot(create_request(
                Some(bearer(Role::Staff)),
                serde_json::json!({"name": "", "isbn": "1", "category_id": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_without_database() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
