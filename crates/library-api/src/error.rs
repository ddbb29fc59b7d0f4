//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.
//! 도메인 에러(`LibraryError`)와 요청 검증 에러를 HTTP 상태 코드로 변환합니다.

use axum::http::StatusCode;
use axum::Json;
use library_core::LibraryError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

/// 통합 API 에러 응답.
///
/// 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.
///
/// # 예시
///
/// ```json
/// {
///   "code": "NOT_AVAILABLE",
///   "message": "도서 42은(는) 현재 대출할 수 없습니다",
///   "details": null,
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "NOT_FOUND", "NOT_AVAILABLE", "LIMIT_EXCEEDED")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    ///
    /// # Arguments
    ///
    /// * `code` - 에러 코드
    /// * `message` - 에러 메시지
    ///
    /// # Example
    ///
    /// ```
    /// use library_api::error::ApiErrorResponse;
    ///
    /// let error = ApiErrorResponse::new("NOT_FOUND", "book 42");
    /// ```
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 포함 에러 생성.
    ///
    /// 검증 실패 시 필드별 메시지, 한도 초과 시 한도 값 등을 `details`에 담습니다.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

// ==================== Result Type Alias ====================

/// 핸들러 에러 타입 (상태 코드 + 에러 본문).
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
///
/// # Example
///
/// ```ignore
/// async fn get_book(
///     Path(id): Path<i64>,
///     State(state): State<Arc<AppState>>,
/// ) -> ApiResult<Json<Book>> {
///     let pool = state.require_db()?;
///     let book = BookRepository::get(pool, id)
///         .await
///         .map_err(library_error)?;
///
///     Ok(Json(book))
/// }
/// ```
pub type ApiResult<T> = Result<T, ApiError>;

// ==================== 도메인 에러 변환 ====================

/// 도메인 에러에 대응하는 HTTP 상태 코드.
pub fn status_for(err: &LibraryError) -> StatusCode {
    match err {
        LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
        LibraryError::NotAvailable { .. }
        | LibraryError::NotReservable { .. }
        | LibraryError::DuplicateReservation { .. }
        | LibraryError::AlreadyReturned { .. }
        | LibraryError::InvalidState(_)
        | LibraryError::Conflict(_) => StatusCode::CONFLICT,
        LibraryError::LimitExceeded { .. } => StatusCode::FORBIDDEN,
        LibraryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LibraryError::Persistence(_) | LibraryError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// 도메인 에러를 API 에러로 변환합니다.
///
/// 저장소 에러는 로그에 남기고 내부 메시지를 그대로 노출하지 않습니다.
pub fn library_error(err: LibraryError) -> ApiError {
    let status = status_for(&err);
    let message = match &err {
        LibraryError::Persistence(detail) => {
            tracing::error!(error = %detail, "Persistence failure");
            "저장소 처리 중 오류가 발생했습니다".to_string()
        }
        _ => err.to_string(),
    };
    let body = match &err {
        LibraryError::LimitExceeded { user_id, limit } => ApiErrorResponse::with_details(
            err.code(),
            message,
            json!({ "user_id": user_id, "limit": limit }),
        ),
        _ => ApiErrorResponse::new(err.code(), message),
    };
    (status, Json(body))
}

/// 데이터베이스 미연결 에러.
pub fn database_unavailable() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiErrorResponse::new(
            "DATABASE_ERROR",
            "Database not available",
        )),
    )
}

/// 요청 DTO 검증.
///
/// 실패 시 필드별 메시지를 `; `로 연결한 400 응답을 반환합니다.
pub fn validate_request<T: Validate>(request: &T) -> Result<(), ApiError> {
    request.validate().map_err(validation_error)
}

fn validation_error(errors: ValidationErrors) -> ApiError {
    let mut messages = Vec::new();
    let mut fields = serde_json::Map::new();
    for (field, errors) in errors.field_errors() {
        let field_messages = errors
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
            .collect::<Vec<_>>();
        messages.extend(field_messages.iter().cloned());
        fields.insert(field.to_string(), json!(field_messages));
    }
    messages.sort();
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorResponse::with_details(
            "VALIDATION_ERROR",
            messages.join("; "),
            json!({ "fields": fields }),
        )),
    )
}
