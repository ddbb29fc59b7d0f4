//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가
//!
//! 도메인 타입(`Book`, `Transaction` 등)은 `library-core`의
//! `utoipa-support` feature로 `ToSchema`를 구현합니다.

use axum::Router;
use library_core::{
    Availability, Book, BookUpdate, Category, Reservation, ReservationStatus, Role, Transaction,
    User,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::TokenResponse;
use crate::error::ApiErrorResponse;
use crate::repository::{CategoryWithCount, UserUpdate};
use crate::routes::{
    BookListResponse, BorrowRequest, CategoryListResponse, CategoryRequest, ComponentHealth,
    ComponentState, ComponentStatus, CreateBookRequest, CreateUserRequest, HealthResponse,
    LendingHealth, LoginRequest, MeResponse, RegisterRequest, ReservationListResponse,
    ReserveRequest, TransactionHistoryResponse, UserListResponse,
};

// ==================== OpenAPI 문서 정의 ====================

/// Library API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "0.1.0",
        description = r#"
# 도서관 대출 관리 REST API

도서 카탈로그, 사용자, 대출/반납, 예약을 관리합니다.

## 대출 규칙

- 사용자당 미반납 대출은 최대 5권
- 대출 기간 14일, 연체 1일당 연체료 1
- 반납 시 가장 오래된 대기 예약자에게 도서가 확보됨 (`Reserved`)
- 도서의 대출 상태는 대출/반납으로만 변경되며 API로 직접 수정할 수 없음

## 인증

`POST /api/v1/auth/login`으로 발급받은 토큰을
`Authorization: Bearer <token>` 헤더에 포함하세요.
카탈로그 변경, 사용자 관리, 예약은 staff 역할이 필요합니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:9010", description = "로컬 개발 서버"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 회원 가입 및 로그인"),
        (name = "books", description = "도서 - 카탈로그 조회 및 관리"),
        (name = "categories", description = "카테고리 - 도서 분류"),
        (name = "users", description = "사용자 - 계정 관리 및 대출 이력"),
        (name = "transactions", description = "대출 - 대출/반납"),
        (name = "reservations", description = "예약 - 대출 중 도서 예약")
    ),
    // ==================== 스키마 등록 ====================
    components(
        schemas(
            // ===== Common =====
            ApiErrorResponse,
            HealthResponse,
            ComponentHealth,
            ComponentState,
            ComponentStatus,
            LendingHealth,

            // ===== Domain =====
            Availability,
            Book,
            BookUpdate,
            Category,
            CategoryWithCount,
            Role,
            User,
            UserUpdate,
            Transaction,
            Reservation,
            ReservationStatus,

            // ===== Requests/Responses =====
            RegisterRequest,
            LoginRequest,
            MeResponse,
            TokenResponse,
            BookListResponse,
            CreateBookRequest,
            CategoryListResponse,
            CategoryRequest,
            UserListResponse,
            CreateUserRequest,
            TransactionHistoryResponse,
            BorrowRequest,
            ReserveRequest,
            ReservationListResponse,
        )
    ),
    // ==================== 경로 등록 ====================
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::me,

        // ===== Books =====
        crate::routes::books::list_books,
        crate::routes::books::get_book,
        crate::routes::books::create_book,
        crate::routes::books::update_book,
        crate::routes::books::delete_book,

        // ===== Categories =====
        crate::routes::categories::list_categories,
        crate::routes::categories::get_category,
        crate::routes::categories::create_category,
        crate::routes::categories::update_category,
        crate::routes::categories::delete_category,

        // ===== Users =====
        crate::routes::users::list_users,
        crate::routes::users::create_user,
        crate::routes::users::get_user,
        crate::routes::users::update_user,
        crate::routes::users::delete_user,
        crate::routes::users::user_transactions,

        // ===== Transactions =====
        crate::routes::transactions::borrow_book,
        crate::routes::transactions::return_book,
        crate::routes::transactions::get_transaction,

        // ===== Reservations =====
        crate::routes::reservations::create_reservation,
        crate::routes::reservations::list_reservations,
        crate::routes::reservations::get_reservation,
        crate::routes::reservations::cancel_reservation,
    )
)]
pub struct ApiDoc;

/// Bearer 토큰 보안 스키마 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// ==================== Swagger UI 라우터 ====================

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

// ==================== 테스트 ====================
