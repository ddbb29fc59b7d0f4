//! 카테고리 API.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/categories` - 카테고리 목록 (도서 수 포함)
//! - `GET /api/v1/categories/{id}` - 카테고리 상세
//! - `POST /api/v1/categories` - 생성 (staff)
//! - `PUT /api/v1/categories/{id}` - 이름 변경 (staff)
//! - `DELETE /api/v1/categories/{id}` - 삭제 (staff, 도서가 없을 때만)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use library_core::Category;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::StaffAuth;
use crate::error::{library_error, validate_request, ApiErrorResponse, ApiResult};
use crate::repository::{CategoryRepository, CategoryWithCount};
use crate::state::AppState;

/// 카테고리 목록 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryWithCount>,
    pub total: usize,
}

/// 카테고리 생성/이름 변경 요청
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
}

/// 카테고리 목록 조회.
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "카테고리 목록", body = CategoryListResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CategoryListResponse>> {
    let pool = state.require_db()?;
    let categories = CategoryRepository::list(pool)
        .await
        .map_err(library_error)?;
    let total = categories.len();
    Ok(Json(CategoryListResponse { categories, total }))
}

/// 카테고리 상세 조회.
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = i64, Path, description = "카테고리 ID")),
    responses(
        (status = 200, description = "카테고리", body = Category),
        (status = 404, description = "카테고리 없음", body = ApiErrorResponse)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Category>> {
    let pool = state.require_db()?;
    let category = CategoryRepository::get(pool, id)
        .await
        .map_err(library_error)?;
    Ok(Json(category))
}

/// 카테고리 생성 (staff).
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "생성 완료", body = Category),
        (status = 409, description = "이름 중복", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Json(request): Json<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    validate_request(&request)?;
    let pool = state.require_db()?;

    let category = CategoryRepository::create(pool, &request.name)
        .await
        .map_err(library_error)?;

    info!(category_id = category.id, staff = %claims.sub, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// 카테고리 이름 변경 (staff).
#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    params(("id" = i64, Path, description = "카테고리 ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "변경 완료", body = Category),
        (status = 404, description = "카테고리 없음", body = ApiErrorResponse),
        (status = 409, description = "이름 중복", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Path(id): Path<i64>,
    Json(request): Json<CategoryRequest>,
) -> ApiResult<Json<Category>> {
    validate_request(&request)?;
    let pool = state.require_db()?;

    let category = CategoryRepository::rename(pool, id, &request.name)
        .await
        .map_err(library_error)?;

    info!(category_id = id, staff = %claims.sub, "Category renamed");
    Ok(Json(category))
}

/// 카테고리 삭제 (staff).
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = i64, Path, description = "카테고리 ID")),
    responses(
        (status = 204, description = "삭제 완료"),
        (status = 404, description = "카테고리 없음", body = ApiErrorResponse),
        (status = 409, description = "소속 도서가 남아 있음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let pool = state.require_db()?;

    CategoryRepository::delete(pool, id)
        .await
        .map_err(library_error)?;

    info!(category_id = id, staff = %claims.sub, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 카테고리 라우터 생성.
pub fn categories_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}
