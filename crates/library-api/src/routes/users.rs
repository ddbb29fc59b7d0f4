//! 사용자 관리 API (staff 전용).
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/users` - 사용자 목록
//! - `POST /api/v1/users` - 사용자 생성 (역할 지정 가능)
//! - `GET /api/v1/users/{id}` - 사용자 상세
//! - `PUT /api/v1/users/{id}` - 사용자 수정
//! - `DELETE /api/v1/users/{id}` - 사용자 삭제
//! - `GET /api/v1/users/{id}/transactions` - 대출 이력

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use library_core::{Role, Transaction, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::auth::build_user_record;
use crate::auth::StaffAuth;
use crate::error::{library_error, validate_request, ApiErrorResponse, ApiResult};
use crate::repository::{UserRepository, UserUpdate};
use crate::state::AppState;

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 사용자 목록 응답
#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: usize,
}

/// 사용자 생성 요청
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 50, message = "membership_id must be 1-50 characters"))]
    pub membership_id: Option<String>,
    /// 기본값 student
    #[serde(default)]
    pub role: Role,
}

/// 대출 이력 쿼리
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TransactionHistoryQuery {
    /// true면 미반납 거래만
    #[serde(default)]
    pub open_only: bool,
}

/// 대출 이력 응답
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionHistoryResponse {
    pub user_id: i64,
    pub transactions: Vec<Transaction>,
    pub total: usize,
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 사용자 목록 조회.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "사용자 목록", body = UserListResponse),
        (status = 403, description = "staff 권한 필요", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    StaffAuth(_claims): StaffAuth,
) -> ApiResult<Json<UserListResponse>> {
    let pool = state.require_db()?;
    let users = UserRepository::list(pool).await.map_err(library_error)?;
    let total = users.len();
    Ok(Json(UserListResponse { users, total }))
}

/// 사용자 생성.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "생성 완료", body = User),
        (status = 400, description = "입력 오류", body = ApiErrorResponse),
        (status = 409, description = "이메일/회원 번호 중복", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    validate_request(&request)?;
    let pool = state.require_db()?;

    let record = build_user_record(
        request.name,
        request.email,
        request.password,
        request.membership_id,
        request.role,
    )
    .await?;

    let user = UserRepository::create(pool, record)
        .await
        .map_err(library_error)?;

    info!(user_id = user.id, role = %user.role, staff = %claims.sub, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// 사용자 상세 조회.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "사용자", body = User),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    StaffAuth(_claims): StaffAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    let pool = state.require_db()?;
    let user = UserRepository::get(pool, id).await.map_err(library_error)?;
    Ok(Json(user))
}

/// 사용자 수정.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "사용자 ID")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "수정 완료", body = User),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 409, description = "이메일/회원 번호 중복", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Path(id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<Json<User>> {
    validate_request(&update)?;
    let pool = state.require_db()?;

    let user = UserRepository::update(pool, id, &update)
        .await
        .map_err(library_error)?;

    info!(user_id = id, staff = %claims.sub, "User updated");
    Ok(Json(user))
}

/// 사용자 삭제.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "사용자 ID")),
    responses(
        (status = 204, description = "삭제 완료"),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 409, description = "대출/예약 기록이 있는 사용자", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let pool = state.require_db()?;

    UserRepository::delete(pool, id)
        .await
        .map_err(library_error)?;

    info!(user_id = id, staff = %claims.sub, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 사용자 대출 이력 (최신순).
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/transactions",
    params(("id" = i64, Path, description = "사용자 ID"), TransactionHistoryQuery),
    responses(
        (status = 200, description = "대출 이력", body = TransactionHistoryResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn user_transactions(
    State(state): State<Arc<AppState>>,
    StaffAuth(_claims): StaffAuth,
    Path(id): Path<i64>,
    Query(query): Query<TransactionHistoryQuery>,
) -> ApiResult<Json<TransactionHistoryResponse>> {
    let transactions = state
        .lending
        .user_transactions(id, query.open_only)
        .await
        .map_err(library_error)?;
    let total = transactions.len();

    Ok(Json(TransactionHistoryResponse {
        user_id: id,
        transactions,
        total,
    }))
}

/// 사용자 라우터 생성.
pub fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/transactions", get(user_transactions))
}
