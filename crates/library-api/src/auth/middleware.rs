//! Axum용 JWT 인증 추출기.
//!
//! 서명 비밀 키는 애플리케이션 상태의 [`JwtConfig`]에서 가져옵니다.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};

use super::{decode_token, jwt::JwtError, Claims, Role};
use crate::error::ApiErrorResponse;

/// JWT 인증 추출기.
///
/// Axum 핸들러에서 인증된 사용자 정보를 추출합니다.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn protected_handler(
///     JwtAuth(claims): JwtAuth,
/// ) -> impl IntoResponse {
///     format!("Authenticated user: {}", claims.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JwtAuth(pub Claims);

/// JWT 인증 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtAuthError {
    #[error("인증 토큰이 필요합니다")]
    MissingToken,
    #[error("잘못된 Authorization 헤더 형식")]
    InvalidAuthHeader,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    #[error("권한이 부족합니다")]
    InsufficientPermission,
}

impl IntoResponse for JwtAuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            JwtAuthError::MissingToken => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN"),
            JwtAuthError::InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "INVALID_AUTH_HEADER"),
            JwtAuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            JwtAuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            JwtAuthError::InsufficientPermission => {
                (StatusCode::FORBIDDEN, "INSUFFICIENT_PERMISSION")
            }
        };

        (status, Json(ApiErrorResponse::new(code, self.to_string()))).into_response()
    }
}

/// JWT 서명 설정.
///
/// 시작 시 설정에서 읽어 `AppState`에 주입됩니다.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    /// Access Token 유효 시간 (분)
    pub token_ttl_minutes: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<SecretString>, token_ttl_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            token_ttl_minutes,
        }
    }

    /// 서명 키 문자열.
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .finish()
    }
}

impl<S> FromRequestParts<S> for JwtAuth
where
    S: Send + Sync,
    JwtConfig: FromRef<S>,
{
    type Rejection = JwtAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Authorization 헤더에서 토큰 추출
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(JwtAuthError::MissingToken)?;

        // Bearer 토큰 형식 확인
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(JwtAuthError::InvalidAuthHeader)?;

        let config = JwtConfig::from_ref(state);

        // 토큰 검증
        let token_data = decode_token(token, config.secret()).map_err(|e| match e {
            JwtError::TokenExpired => JwtAuthError::TokenExpired,
            _ => JwtAuthError::InvalidToken,
        })?;

        // 숫자가 아닌 subject는 이 시스템에서 발급한 토큰이 아님
        if token_data.claims.user_id().is_none() {
            return Err(JwtAuthError::InvalidToken);
        }

        Ok(JwtAuth(token_data.claims))
    }
}

/// 특정 역할 이상의 권한을 요구합니다.
///
/// # Returns
///
/// 권한이 충분하면 Ok(()), 부족하면 Err(JwtAuthError)
pub fn require_role(required_role: Role, claims: &Claims) -> Result<(), JwtAuthError> {
    if claims.has_role(required_role) {
        Ok(())
    } else {
        Err(JwtAuthError::InsufficientPermission)
    }
}

/// Staff 권한을 요구하는 추출기.
#[derive(Debug, Clone)]
pub struct StaffAuth(pub Claims);

impl<S> FromRequestParts<S> for StaffAuth
where
    S: Send + Sync,
    JwtConfig: FromRef<S>,
{
    type Rejection = JwtAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let JwtAuth(claims) = JwtAuth::from_request_parts(parts, state).await?;
        require_role(Role::Staff, &claims)?;
        Ok(StaffAuth(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn test_config() -> JwtConfig {
        JwtConfig::new(TEST_SECRET, 60)
    }

    async fn whoami(JwtAuth(claims): JwtAuth) -> String {
        claims.name
    }

    async fn staff_only(StaffAuth(claims): StaffAuth) -> String {
        claims.name
    }

    fn app() -> Router {
        Router::new()
            .route("/me", get(whoami))
            .route("/staff", get(staff_only))
            .with_state(test_config())
    }

    fn bearer(role: Role) -> String {
        let claims = Claims::new(1, "alice", role, 60);
        format!("Bearer {}", create_token(&claims, TEST_SECRET).unwrap())
    }

    async fn status_of(uri: &str, auth: Option<String>) -> StatusCode {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn test_require_role() {
        let staff = Claims::new(1, "staff", Role::Staff, 60);
        let student = Claims::new(2, "student", Role::Student, 60);

        assert!(require_role(Role::Staff, &staff).is_ok());
        assert!(require_role(Role::Student, &staff).is_ok());
        assert!(require_role(Role::Staff, &student).is_err());
        assert!(require_role(Role::Student, &student).is_ok());
    }

    #[test]
    fn test_jwt_auth_error_responses() {
        let errors = vec![
            JwtAuthError::MissingToken,
            JwtAuthError::InvalidAuthHeader,
            JwtAuthError::TokenExpired,
            JwtAuthError::InvalidToken,
            JwtAuthError::InsufficientPermission,
        ];

        for error in errors {
            let response = error.into_response();
            let status = response.status();

            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {}
                _ => panic!("Unexpected status code: {}", status),
            }
        }
    }

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains(TEST_SECRET));
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        assert_eq!(status_of("/me", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of("/me", Some("Token abc".to_string())).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of("/me", Some("Bearer not-a-jwt".to_string())).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_valid_token_is_accepted() {
        assert_eq!(
            status_of("/me", Some(bearer(Role::Student))).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_staff_extractor_rejects_student() {
        assert_eq!(
            status_of("/staff", Some(bearer(Role::Student))).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of("/staff", Some(bearer(Role::Staff))).await,
            StatusCode::OK
        );
        assert_eq!(status_of("/staff", None).await, StatusCode::UNAUTHORIZED);
    }
}
