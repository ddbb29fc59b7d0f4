//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 대출 작업 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use library_core::LibraryResult;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Prometheus 메트릭 레코더를 설치하고 렌더링 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("library_fine_amount".to_string()),
            &[1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 대출 메트릭 헬퍼 함수
// ============================================================================

/// 대출 작업 결과 카운터 증가.
///
/// `outcome` 라벨은 성공 시 `ok`, 실패 시 에러 코드 (`NOT_AVAILABLE` 등).
pub fn record_lending_operation<T>(operation: &'static str, result: &LibraryResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    counter!(
        "library_lending_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// 부과된 연체료 기록. 0은 기록하지 않습니다.
pub fn record_fine(amount: Decimal) {
    if amount.is_zero() {
        return;
    }
    histogram!("library_fine_amount").record(amount.to_f64().unwrap_or_default());
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로의 숫자 ID 세그먼트를 정규화합니다.
///
/// 예: `/api/v1/books/42` → `/api/v1/books/:id`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
