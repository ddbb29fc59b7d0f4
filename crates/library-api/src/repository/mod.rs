//! PostgreSQL 저장소.
//!
//! 데이터베이스 접근 로직을 라우트 핸들러에서 분리합니다.
//! 카탈로그/계정 저장소는 static methods 패턴을 사용하고,
//! 대출 기록은 [`PgLendingStore`]가 `LendingStore`를 구현합니다.

pub mod books;
pub mod categories;
pub mod lending;
pub mod users;

pub use books::{BookQuery, BookRepository};
pub use categories::{CategoryRepository, CategoryWithCount};
pub use lending::PgLendingStore;
pub use users::{NewUserRecord, UserCredentials, UserRepository, UserUpdate};

use library_core::LibraryError;

/// sqlx 에러를 도메인 에러로 변환합니다.
///
/// 유일성/외래 키 제약 위반은 `Conflict`, 그 외는 `Persistence`.
pub(crate) fn db_error(err: sqlx::Error) -> LibraryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            return LibraryError::Conflict(format!(
                "constraint violation ({}): {}",
                constraint,
                db_err.message()
            ));
        }
    }
    LibraryError::Persistence(err.to_string())
}

/// 외래 키 제약 위반인지 확인합니다.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

/// 저장된 열거형 문자열을 해석하지 못한 경우.
pub(crate) fn corrupt_column(column: &str, value: &str) -> LibraryError {
    LibraryError::Persistence(format!("unexpected {} value in database: {}", column, value))
}
