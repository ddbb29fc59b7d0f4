//! 계정 등록 및 로그인.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/auth/register` - 회원 가입 (항상 student)
//! - `POST /api/v1/auth/login` - 로그인, Bearer 토큰 발급
//! - `GET /api/v1/auth/me` - 현재 토큰 정보

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use library_core::{Role, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    hash_password_async, issue_token, validate_password_strength, verify_password_async, Claims,
    JwtAuth, PasswordError, TokenResponse,
};
use crate::error::{library_error, validate_request, ApiError, ApiErrorResponse, ApiResult};
use crate::repository::{NewUserRecord, UserRepository};
use crate::state::AppState;

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 회원 가입 요청
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub password: String,
    /// 생략 시 자동 발급
    #[validate(length(min = 1, max = 50, message = "membership_id must be 1-50 characters"))]
    pub membership_id: Option<String>,
}

/// 로그인 요청
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// 현재 사용자 정보 (토큰 기준)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: i64,
    pub name: String,
    pub role: Role,
    /// 토큰 만료 시각 (Unix timestamp)
    pub expires_at: i64,
}

// ================================================================================================
// Helpers
// ================================================================================================

/// 비밀번호 처리 에러를 API 에러로 변환합니다.
pub(crate) fn password_error(err: PasswordError) -> ApiError {
    match err {
        PasswordError::TooWeak => (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::new("WEAK_PASSWORD", err.to_string())),
        ),
        other => {
            warn!(error = %other, "Password hashing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::new("INTERNAL_ERROR", "비밀번호 처리 실패")),
            )
        }
    }
}

/// 회원 번호 발급 (예: `M-3F2A9C01B4`).
pub(crate) fn generate_membership_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("M-{}", id[..10].to_uppercase())
}

/// 검증 완료된 입력으로 사용자 레코드를 만듭니다.
pub(crate) async fn build_user_record(
    name: String,
    email: String,
    password: String,
    membership_id: Option<String>,
    role: Role,
) -> ApiResult<NewUserRecord> {
    validate_password_strength(&password).map_err(password_error)?;
    let password_hash = hash_password_async(password)
        .await
        .map_err(password_error)?;

    Ok(NewUserRecord {
        name,
        email,
        membership_id: membership_id.unwrap_or_else(generate_membership_id),
        password_hash,
        role,
    })
}

fn invalid_credentials() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiErrorResponse::new(
            "INVALID_CREDENTIALS",
            "이메일 또는 비밀번호가 올바르지 않습니다",
        )),
    )
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 회원 가입. 역할은 항상 student입니다.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "가입 완료", body = User),
        (status = 400, description = "입력 오류", body = ApiErrorResponse),
        (status = 409, description = "이메일/회원 번호 중복", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    validate_request(&request)?;
    let pool = state.require_db()?;

    let record = build_user_record(
        request.name,
        request.email,
        request.password,
        request.membership_id,
        Role::Student,
    )
    .await?;

    let user = UserRepository::create(pool, record)
        .await
        .map_err(library_error)?;

    info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// 로그인.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "토큰 발급", body = TokenResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    validate_request(&request)?;
    let pool = state.require_db()?;

    let credentials = UserRepository::find_credentials_by_email(pool, &request.email)
        .await
        .map_err(library_error)?
        .ok_or_else(invalid_credentials)?;

    verify_password_async(request.password, credentials.password_hash)
        .await
        .map_err(|_| invalid_credentials())?;

    let user = credentials.user;
    let claims = Claims::new(user.id, &user.name, user.role, state.jwt.token_ttl_minutes);
    let token = issue_token(&claims, state.jwt.secret()).map_err(|e| {
        warn!(error = %e, "Token issue failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiErrorResponse::new("INTERNAL_ERROR", "토큰 발급 실패")),
        )
    })?;

    info!(user_id = user.id, role = %user.role, "User logged in");
    Ok(Json(token))
}

/// 현재 토큰 정보.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "토큰 정보", body = MeResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(JwtAuth(claims): JwtAuth) -> ApiResult<Json<MeResponse>> {
    let user_id = claims.user_id().unwrap_or_default();
    Ok(Json(MeResponse {
        user_id,
        name: claims.name,
        role: claims.role,
        expires_at: claims.exp,
    }))
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use crate::state::{create_test_state, TEST_JWT_SECRET};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn app() -> Router {
        auth_router().with_state(Arc::new(create_test_state()))
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_generate_membership_id() {
        let first = generate_membership_id();
        let second = generate_membership_id();

        assert!(first.starts_with("M-"));
        assert_eq!(first.len(), 12);
        assert_ne!(first, second);
    }

    #[test]
    fn test_register_request_validation() {
        let request = RegisterRequest {
            name: String::new(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            membership_id: None,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[tokio::test]
    async fn test_build_user_record_rejects_weak_password() {
        let result = build_user_record(
            "Reader".to_string(),
            "reader@example.com".to_string(),
            "onlyletters".to_string(),
            None,
            Role::Student,
        )
        .await;

        let (status, Json(body)) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "WEAK_PASSWORD");
    }

    #[tokio::test]
    async fn test_register_invalid_body_is_bad_request() {
        let response = app()
            .oneshot(json_request(
                "/register",
                serde_json::json!({"name": "", "email": "x", "password": "abc"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_without_database() {
        let response = app()
            .oneshot(json_request(
                "/login",
                serde_json::json!({"email": "reader@example.com", "password": "library1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ApiErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_me_reads_token() {
        let claims = Claims::new(7, "reader", Role::Student, 60);
        let token = create_token(&claims, TEST_JWT_SECRET).unwrap();

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let me: MeResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(me.user_id, 7);
        assert_eq!(me.role, Role::Student);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let response = app()
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
