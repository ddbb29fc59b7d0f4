//! JWT 토큰 처리.
//!
//! Access Token 생성/검증 로직.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Permission, Role, RoleExt};

/// JWT Access Token 페이로드.
///
/// 사용자 인증 정보와 권한을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID
    pub sub: String,
    /// 사용자 이름
    pub name: String,
    /// 사용자 역할
    pub role: Role,
    /// Issued At - 토큰 발급 시간 (Unix timestamp)
    pub iat: i64,
    /// Expiration - 토큰 만료 시간 (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 토큰 고유 식별자
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// 새로운 Claims 생성.
    ///
    /// # Arguments
    ///
    /// * `user_id` - 사용자 ID
    /// * `name` - 사용자 이름
    /// * `role` - 사용자 역할
    /// * `expires_in_minutes` - 만료 시간 (분)
    pub fn new(user_id: i64, name: impl Into<String>, role: Role, expires_in_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            name: name.into(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(expires_in_minutes)).timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Subject에서 사용자 ID를 파싱합니다.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }

    /// 특정 권한을 가지는지 확인.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    /// 특정 역할 이상인지 확인.
    pub fn has_role(&self, required_role: Role) -> bool {
        self.role.level() >= required_role.level()
    }
}

/// 로그인 응답 토큰.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Access Token
    pub token: String,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
    /// 만료 시간 (초)
    pub expires_in: i64,
}

/// JWT 토큰 생성 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰 인코딩 실패: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),
    #[error("토큰 디코딩 실패")]
    DecodingError,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("잘못된 토큰 형식")]
    InvalidToken,
}

/// Access Token 생성.
///
/// # Arguments
///
/// * `claims` - JWT 페이로드
/// * `secret` - 비밀 키
///
/// # Returns
///
/// 인코딩된 JWT 문자열
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(JwtError::from)
}

/// Claims로부터 로그인 응답 토큰 생성.
pub fn issue_token(claims: &Claims, secret: &str) -> Result<TokenResponse, JwtError> {
    let token = create_token(claims, secret)?;
    Ok(TokenResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: claims.exp - claims.iat,
    })
}

/// JWT 토큰 디코딩 및 검증.
///
/// # Arguments
///
/// * `token` - JWT 토큰 문자열
/// * `secret` - 비밀 키
///
/// # Returns
///
/// 디코딩된 Claims
pub fn decode_token(token: &str, secret: &str) -> Result<TokenData<Claims>, JwtError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
        jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::InvalidToken,
        _ => JwtError::DecodingError,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    #[test]
    fn test_create_and_decode_token() {
        let claims = Claims::new(42, "alice", Role::Student, 60);

        let token = create_token(&claims, TEST_SECRET).unwrap();
        assert!(!token.is_empty());

        let decoded = decode_token(&token, TEST_SECRET).unwrap();
        assert_eq!(decoded.claims.sub, "42");
        assert_eq!(decoded.claims.user_id(), Some(42));
        assert_eq!(decoded.claims.name, "alice");
        assert_eq!(decoded.claims.role, Role::Student);
        assert!(decoded.claims.jti.is_some());
    }

    #[test]
    fn test_issue_token() {
        let claims = Claims::new(1, "librarian", Role::Staff, 24 * 60);
        let response = issue_token(&claims, TEST_SECRET).unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 24 * 60 * 60);
        let decoded = decode_token(&response.token, TEST_SECRET).unwrap();
        assert_eq!(decoded.claims.role, Role::Staff);
    }

    #[test]
    fn test_claims_permissions() {
        let claims = Claims::new(7, "student", Role::Student, 60);

        assert!(claims.has_permission(Permission::BorrowBooks));
        assert!(claims.has_permission(Permission::BrowseCatalog));
        assert!(!claims.has_permission(Permission::ManageUsers));
    }

    #[test]
    fn test_claims_has_role() {
        let staff = Claims::new(1, "staff", Role::Staff, 60);
        let student = Claims::new(2, "student", Role::Student, 60);

        assert!(staff.has_role(Role::Student));
        assert!(staff.has_role(Role::Staff));
        assert!(student.has_role(Role::Student));
        assert!(!student.has_role(Role::Staff));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = Claims::new(1, "alice", Role::Student, 60);
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = create_token(&claims, TEST_SECRET).unwrap();

        assert!(claims.exp < Utc::now().timestamp());
        assert!(matches!(
            decode_token(&token, TEST_SECRET),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let result = decode_token("invalid.token.here", TEST_SECRET);
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let claims = Claims::new(1, "alice", Role::Student, 60);
        let token = create_token(&claims, TEST_SECRET).unwrap();

        let result = decode_token(&token, "wrong-secret-key-for-testing-minimum-32-chars");
        assert!(result.is_err());
    }
}
