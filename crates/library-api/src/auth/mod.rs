//! 인증 및 권한 부여.
//!
//! JWT 기반 인증과 역할 기반 접근 제어를 제공합니다.
//!
//! - [`Claims`]: JWT 페이로드
//! - [`Role`]: 사용자 역할 (Staff, Student)
//! - [`JwtAuth`] / [`StaffAuth`]: Axum 추출기
//!
//! ```rust,ignore
//! async fn staff_only(StaffAuth(claims): StaffAuth) -> impl IntoResponse {
//!     format!("Hello, {}!", claims.name)
//! }
//! ```

mod jwt;
mod middleware;
mod password;
mod roles;

pub use jwt::{create_token, decode_token, issue_token, Claims, JwtError, TokenResponse};
pub use middleware::{require_role, JwtAuth, JwtAuthError, JwtConfig, StaffAuth};
pub use password::{
    hash_password, hash_password_async, validate_password_strength, verify_password,
    verify_password_async, PasswordError, MIN_PASSWORD_LEN,
};
pub use roles::{Permission, Role, RoleExt};
