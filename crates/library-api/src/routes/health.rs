//! 헬스 체크.
//!
//! `/health`는 프로세스 생존 여부만, `/health/ready`는 저장소 연결과
//! 현재 적용 중인 대출 정책을 함께 보고합니다.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// `/health/ready` 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" | "degraded"
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    /// RFC 3339
    pub timestamp: String,
    pub components: ComponentHealth,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    pub lending: LendingHealth,
}

/// 컴포넌트 상태 값.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Up,
    Down,
    /// `DATABASE_URL` 없이 메모리 저장소로 실행 중
    NotConfigured,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub status: ComponentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn new(status: ComponentState, message: Option<String>) -> Self {
        Self { status, message }
    }
}

/// 대출 상태 머신이 사용하는 저장소와 정책.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LendingHealth {
    /// "postgres" | "memory"
    pub store: String,
    pub borrow_limit: i64,
    pub loan_period_days: i64,
    pub fine_per_day: Decimal,
}

/// 생존 확인.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "서버 응답 가능")),
    tag = "health"
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 준비 상태 확인.
///
/// 데이터베이스가 설정되었지만 응답하지 않으면 503.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "준비 완료", body = HealthResponse),
        (status = 503, description = "데이터베이스 연결 실패", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (database, store) = match &state.db_pool {
        Some(_) if state.is_db_healthy().await => {
            (ComponentStatus::new(ComponentState::Up, None), "postgres")
        }
        Some(_) => (
            ComponentStatus::new(ComponentState::Down, Some("연결 실패".to_string())),
            "postgres",
        ),
        None => (
            ComponentStatus::new(
                ComponentState::NotConfigured,
                Some("대출 기록은 메모리에만 저장됩니다".to_string()),
            ),
            "memory",
        ),
    };

    let degraded = database.status == ComponentState::Down;
    let policy = state.lending.policy();
    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            database,
            lending: LendingHealth {
                store: store.to_string(),
                borrow_limit: policy.borrow_limit,
                loan_period_days: policy.loan_period_days,
                fine_per_day: policy.fine_per_day,
            },
        },
    };

    let status_code = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status_code, Json(response))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
