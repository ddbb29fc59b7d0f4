//! 예약 API (staff 전용).
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/reservations` - 대출 중인 도서 예약
//! - `GET /api/v1/reservations` - 예약 목록 (user_id/book_id/status 필터)
//! - `GET /api/v1/reservations/{id}` - 예약 조회
//! - `PUT /api/v1/reservations/{id}/cancel` - 예약 취소

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use library_core::{Reservation, ReservationFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::StaffAuth;
use crate::error::{library_error, validate_request, ApiErrorResponse, ApiResult};
use crate::metrics::record_lending_operation;
use crate::state::AppState;

/// 예약 요청
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReserveRequest {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
    #[validate(range(min = 1, message = "book_id must be positive"))]
    pub book_id: i64,
}

/// 예약 목록 응답
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationListResponse {
    pub reservations: Vec<Reservation>,
    pub total: usize,
}

/// 도서 예약.
#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    request_body = ReserveRequest,
    responses(
        (status = 201, description = "예약 완료", body = Reservation),
        (status = 404, description = "사용자/도서 없음", body = ApiErrorResponse),
        (status = 409, description = "대출 중이 아니거나 중복 예약", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Json(request): Json<ReserveRequest>,
) -> ApiResult<(StatusCode, Json<Reservation>)> {
    validate_request(&request)?;

    let result = state.lending.reserve(request.user_id, request.book_id).await;
    record_lending_operation("reserve", &result);
    let reservation = result.map_err(library_error)?;

    info!(reservation_id = reservation.id, staff = %claims.sub, "Reservation created");
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// 예약 목록 (생성순).
#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    params(ReservationFilter),
    responses(
        (status = 200, description = "예약 목록", body = ReservationListResponse),
        (status = 403, description = "staff 권한 필요", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
    StaffAuth(_claims): StaffAuth,
    Query(filter): Query<ReservationFilter>,
) -> ApiResult<Json<ReservationListResponse>> {
    let reservations = state
        .lending
        .list_reservations(&filter)
        .await
        .map_err(library_error)?;
    let total = reservations.len();
    Ok(Json(ReservationListResponse {
        reservations,
        total,
    }))
}

/// 예약 조회.
#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    params(("id" = i64, Path, description = "예약 ID")),
    responses(
        (status = 200, description = "예약", body = Reservation),
        (status = 404, description = "예약 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    StaffAuth(_claims): StaffAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<Reservation>> {
    let reservation = state
        .lending
        .get_reservation(id)
        .await
        .map_err(library_error)?;
    Ok(Json(reservation))
}

/// 예약 취소.
///
/// 대기 중 예약, 또는 아직 대출되지 않은 확보 예약만 취소할 수 있습니다.
#[utoipa::path(
    put,
    path = "/api/v1/reservations/{id}/cancel",
    params(("id" = i64, Path, description = "예약 ID")),
    responses(
        (status = 200, description = "취소 완료", body = Reservation),
        (status = 404, description = "예약 없음", body = ApiErrorResponse),
        (status = 409, description = "취소할 수 없는 상태", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    StaffAuth(claims): StaffAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<Reservation>> {
    let result = state.lending.cancel_reservation(id).await;
    record_lending_operation("cancel_reservation", &result);
    let reservation = result.map_err(library_error)?;

    info!(reservation_id = id, staff = %claims.sub, "Reservation cancelled");
    Ok(Json(reservation))
}

/// 예약 라우터 생성.
pub fn reservations_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_reservations).post(create_reservation))
        .route("/{id}", get(get_reservation))
        .route("/{id}/cancel", put(cancel_reservation))
}
