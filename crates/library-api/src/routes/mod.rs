//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/auth` - 회원 가입, 로그인
//! - `/api/v1/books` - 도서 카탈로그
//! - `/api/v1/categories` - 카테고리
//! - `/api/v1/users` - 사용자 관리, 대출 이력
//! - `/api/v1/transactions` - 대출/반납
//! - `/api/v1/reservations` - 예약

pub mod auth;
pub mod books;
pub mod categories;
pub mod health;
pub mod reservations;
pub mod transactions;
pub mod users;

pub use auth::{auth_router, LoginRequest, MeResponse, RegisterRequest};
pub use books::{books_router, BookListResponse, CreateBookRequest};
pub use categories::{categories_router, CategoryListResponse, CategoryRequest};
pub use health::{
    health_router, ComponentHealth, ComponentState, ComponentStatus, HealthResponse, LendingHealth,
};
pub use reservations::{reservations_router, ReservationListResponse, ReserveRequest};
pub use transactions::{transactions_router, BorrowRequest};
pub use users::{users_router, CreateUserRequest, TransactionHistoryResponse, UserListResponse};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // API v1 엔드포인트
        .nest("/api/v1/auth", auth_router())
        .nest("/api/v1/books", books_router())
        .nest("/api/v1/categories", categories_router())
        .nest("/api/v1/users", users_router())
        .nest("/api/v1/transactions", transactions_router())
        .nest("/api/v1/reservations", reservations_router())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{create_token, Claims, Role};
    use crate::state::{create_test_state_with_store, TEST_JWT_SECRET};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn bearer(role: Role) -> String {
        let claims = Claims::new(1, "tester", role, 60);
        format!("Bearer {}", create_token(&claims, TEST_JWT_SECRET).unwrap())
    }

    async fn status_of(method: &str, uri: &str, auth: Option<String>) -> StatusCode {
        let (state, _) = create_test_state_with_store();
        let app = create_api_router().with_state(Arc::new(state));

        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        assert_eq!(status_of("GET", "/health", None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_staff_routes_reject_missing_token() {
        for (method, uri) in [
            ("GET", "/api/v1/users"),
            ("GET", "/api/v1/reservations"),
            ("DELETE", "/api/v1/books/1"),
            ("DELETE", "/api/v1/categories/1"),
            ("PUT", "/api/v1/reservations/1/cancel"),
            ("GET", "/api/v1/users/1/transactions"),
        ] {
            assert_eq!(
                status_of(method, uri, None).await,
                StatusCode::UNAUTHORIZED,
                "{} {}",
                method,
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_staff_routes_reject_student_token() {
        for (method, uri) in [
            ("GET", "/api/v1/users"),
            ("GET", "/api/v1/reservations"),
            ("DELETE", "/api/v1/books/1"),
            ("DELETE", "/api/v1/categories/1"),
            ("PUT", "/api/v1/reservations/1/cancel"),
            ("GET", "/api/v1/users/1/transactions"),
        ] {
            assert_eq!(
                status_of(method, uri, Some(bearer(Role::Student))).await,
                StatusCode::FORBIDDEN,
                "{} {}",
                method,
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_transaction_routes_require_token() {
        assert_eq!(
            status_of("GET", "/api/v1/transactions/1", None).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of("PUT", "/api/v1/transactions/1/return", None).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let mut claims = Claims::new(1, "tester", Role::Staff, 60);
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = create_token(&claims, TEST_JWT_SECRET).unwrap();

        assert_eq!(
            status_of("GET", "/api/v1/users", Some(format!("Bearer {}", token))).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
