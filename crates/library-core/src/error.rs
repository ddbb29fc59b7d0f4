//! 도서관 시스템의 에러 타입.
//!
//! 대출 상태 머신과 저장소 협력자가 반환하는 에러를 정의합니다.

use thiserror::Error;

/// 핵심 도서관 에러.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// 사용자, 도서, 거래, 예약, 카테고리를 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 도서가 대출 가능한 상태가 아님
    #[error("도서 {book_id}은(는) 현재 대출할 수 없습니다")]
    NotAvailable { book_id: i64 },

    /// 대출 중이 아닌 도서는 예약할 수 없음
    #[error("도서 {book_id}은(는) 대출 중이 아니므로 예약할 수 없습니다")]
    NotReservable { book_id: i64 },

    /// 대출 한도 초과
    #[error("사용자 {user_id}의 대출 한도({limit}권)에 도달했습니다")]
    LimitExceeded { user_id: i64, limit: i64 },

    /// 동일 (사용자, 도서)에 대기 중인 예약이 이미 존재
    #[error("사용자 {user_id}은(는) 도서 {book_id}에 대한 대기 중인 예약이 이미 있습니다")]
    DuplicateReservation { user_id: i64, book_id: i64 },

    /// 이미 반납된 거래
    #[error("거래 {transaction_id}은(는) 이미 반납되었습니다")]
    AlreadyReturned { transaction_id: i64 },

    /// 현재 상태에서 허용되지 않는 전이
    #[error("잘못된 상태 전이: {0}")]
    InvalidState(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 유일성/참조 제약 위반 등 저장소 충돌
    #[error("저장소 충돌: {0}")]
    Conflict(String),

    /// 저장소 쓰기/읽기 실패
    #[error("저장소 에러: {0}")]
    Persistence(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 도서관 작업을 위한 Result 타입.
pub type LibraryResult<T> = Result<T, LibraryError>;

impl LibraryError {
    /// 대출 상태 머신의 사전 조건 위반인지 확인합니다.
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            LibraryError::NotAvailable { .. }
                | LibraryError::NotReservable { .. }
                | LibraryError::LimitExceeded { .. }
                | LibraryError::DuplicateReservation { .. }
                | LibraryError::AlreadyReturned { .. }
                | LibraryError::InvalidState(_)
        )
    }

    /// 저장소 협력자 실패인지 확인합니다.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, LibraryError::Conflict(_) | LibraryError::Persistence(_))
    }

    /// 에러 코드 반환 (API 응답용).
    pub fn code(&self) -> &'static str {
        match self {
            LibraryError::NotFound(_) => "NOT_FOUND",
            LibraryError::NotAvailable { .. } => "NOT_AVAILABLE",
            LibraryError::NotReservable { .. } => "NOT_RESERVABLE",
            LibraryError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            LibraryError::DuplicateReservation { .. } => "DUPLICATE_RESERVATION",
            LibraryError::AlreadyReturned { .. } => "ALREADY_RETURNED",
            LibraryError::InvalidState(_) => "INVALID_STATE",
            LibraryError::InvalidInput(_) => "INVALID_INPUT",
            LibraryError::Conflict(_) => "CONFLICT",
            LibraryError::Persistence(_) => "PERSISTENCE_ERROR",
            LibraryError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<config::ConfigError> for LibraryError {
    fn from(err: config::ConfigError) -> Self {
        LibraryError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_failures() {
        assert!(LibraryError::NotAvailable { book_id: 1 }.is_precondition_failure());
        assert!(LibraryError::AlreadyReturned { transaction_id: 3 }.is_precondition_failure());
        assert!(!LibraryError::NotFound("book 1".into()).is_precondition_failure());
        assert!(!LibraryError::Persistence("io".into()).is_precondition_failure());
    }

    #[test]
    fn test_persistence_failures() {
        assert!(LibraryError::Conflict("isbn".into()).is_persistence_failure());
        assert!(LibraryError::Persistence("timeout".into()).is_persistence_failure());
        assert!(!LibraryError::LimitExceeded { user_id: 1, limit: 5 }.is_persistence_failure());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LibraryError::DuplicateReservation { user_id: 1, book_id: 2 }.code(),
            "DUPLICATE_RESERVATION"
        );
        assert_eq!(LibraryError::NotReservable { book_id: 2 }.code(), "NOT_RESERVABLE");
    }
}
