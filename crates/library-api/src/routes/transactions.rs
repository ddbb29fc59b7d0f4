//! 대출/반납 API.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/transactions/borrow` - 대출
//! - `PUT /api/v1/transactions/{id}/return` - 반납
//! - `GET /api/v1/transactions/{id}` - 거래 조회
//!
//! student는 자신의 거래만 다룰 수 있고, staff는 다른 사용자를 대신해 처리할 수 있습니다.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use library_core::{Role, Transaction};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{Claims, JwtAuth};
use crate::error::{library_error, validate_request, ApiError, ApiErrorResponse, ApiResult};
use crate::metrics::{record_fine, record_lending_operation};
use crate::state::AppState;

/// 대출 요청
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    /// 대출자 ID. 생략 시 토큰의 사용자. student는 자신만 지정 가능
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: Option<i64>,
    #[validate(range(min = 1, message = "book_id must be positive"))]
    pub book_id: i64,
}

/// 토큰의 사용자 ID.
pub(crate) fn caller_id(claims: &Claims) -> ApiResult<i64> {
    claims.user_id().ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ApiErrorResponse::new("INVALID_TOKEN", "유효하지 않은 토큰")),
        )
    })
}

/// 다른 사용자의 거래에 접근하려는 경우.
pub(crate) fn not_owner() -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(ApiErrorResponse::new(
            "INSUFFICIENT_PERMISSION",
            "다른 사용자의 대출 기록에는 접근할 수 없습니다",
        )),
    )
}

/// staff가 아니면 자신의 거래만 허용합니다.
fn ensure_owner(claims: &Claims, transaction: &Transaction) -> ApiResult<()> {
    if claims.has_role(Role::Staff) || caller_id(claims)? == transaction.user_id {
        Ok(())
    } else {
        Err(not_owner())
    }
}

/// 도서 대출.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/borrow",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "대출 완료", body = Transaction),
        (status = 403, description = "대출 한도 초과 또는 다른 사용자 지정", body = ApiErrorResponse),
        (status = 404, description = "사용자/도서 없음", body = ApiErrorResponse),
        (status = 409, description = "대출 불가 상태", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Json(request): Json<BorrowRequest>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    validate_request(&request)?;

    let caller = caller_id(&claims)?;
    let user_id = request.user_id.unwrap_or(caller);
    if user_id != caller && !claims.has_role(Role::Staff) {
        return Err(not_owner());
    }

    let result = state.lending.borrow(user_id, request.book_id).await;
    record_lending_operation("borrow", &result);
    let transaction = result.map_err(library_error)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// 도서 반납.
///
/// 연체 시 연체료가 계산되어 사용자 누적 연체료에 더해집니다.
#[utoipa::path(
    put,
    path = "/api/v1/transactions/{id}/return",
    params(("id" = i64, Path, description = "거래 ID")),
    responses(
        (status = 200, description = "반납 완료", body = Transaction),
        (status = 403, description = "다른 사용자의 거래", body = ApiErrorResponse),
        (status = 404, description = "거래 없음", body = ApiErrorResponse),
        (status = 409, description = "이미 반납됨", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transaction>> {
    let existing = state
        .lending
        .get_transaction(id)
        .await
        .map_err(library_error)?;
    ensure_owner(&claims, &existing)?;

    let result = state.lending.return_book(id).await;
    record_lending_operation("return", &result);
    let transaction = result.map_err(library_error)?;
    record_fine(transaction.fine);

    Ok(Json(transaction))
}

/// 거래 조회.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}",
    params(("id" = i64, Path, description = "거래 ID")),
    responses(
        (status = 200, description = "거래", body = Transaction),
        (status = 403, description = "다른 사용자의 거래", body = ApiErrorResponse),
        (status = 404, description = "거래 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<Transaction>> {
    debug!(transaction_id = id, "GET /transactions");
    let transaction = state
        .lending
        .get_transaction(id)
        .await
        .map_err(library_error)?;
    ensure_owner(&claims, &transaction)?;
    Ok(Json(transaction))
}

/// 대출 라우터 생성.
pub fn transactions_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/borrow", post(borrow_book))
        .route("/{id}", get(get_transaction))
        .route("/{id}/return", put(return_book))
}
