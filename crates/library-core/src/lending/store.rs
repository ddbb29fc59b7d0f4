//! 대출 상태 머신의 저장소 협력자.
//!
//! 상태를 바꾸는 메서드는 모두 조건부(compare-and-set)로 동작합니다.
//! 기대한 상태가 아니면 아무것도 변경하지 않고 `None`을 반환하며,
//! 호출자는 이를 사전 조건 위반으로 처리합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Availability, Book, NewReservation, NewTransaction, Reservation, ReservationFilter,
    ReservationStatus, Transaction, User,
};
use crate::error::LibraryResult;

/// 대출/예약 기록 저장소.
#[async_trait]
pub trait LendingStore: Send + Sync {
    // ==================== 조회 ====================

    /// 사용자 조회.
    async fn find_user(&self, user_id: i64) -> LibraryResult<Option<User>>;

    /// 도서 조회.
    async fn find_book(&self, book_id: i64) -> LibraryResult<Option<Book>>;

    /// 거래 조회.
    async fn find_transaction(&self, transaction_id: i64) -> LibraryResult<Option<Transaction>>;

    /// 예약 조회.
    async fn find_reservation(&self, reservation_id: i64) -> LibraryResult<Option<Reservation>>;

    /// 사용자의 미반납 거래 수.
    async fn count_open_transactions(&self, user_id: i64) -> LibraryResult<i64>;

    /// (사용자, 도서)에 대기 중인 예약이 있는지 확인.
    async fn has_pending_reservation(&self, user_id: i64, book_id: i64) -> LibraryResult<bool>;

    /// 도서의 가장 오래된 대기 중 예약 (생성 시각, ID 순).
    async fn oldest_pending_reservation(&self, book_id: i64)
        -> LibraryResult<Option<Reservation>>;

    /// 도서에 대해 가장 최근에 확보된(Fulfilled) 예약.
    async fn latest_fulfilled_reservation(
        &self,
        book_id: i64,
    ) -> LibraryResult<Option<Reservation>>;

    /// 사용자의 거래 목록 (최신순).
    async fn list_transactions_for_user(
        &self,
        user_id: i64,
        open_only: bool,
    ) -> LibraryResult<Vec<Transaction>>;

    /// 예약 목록 (생성순).
    async fn list_reservations(&self, filter: &ReservationFilter)
        -> LibraryResult<Vec<Reservation>>;

    // ==================== 원자적 변경 ====================
    //
    // 아래 메서드는 각각 하나의 작업 단위입니다. 중간 단계가 실패하면
    // 어떤 변경도 남기지 않습니다.

    /// 대출을 개설합니다.
    ///
    /// 사용자의 미반납 거래 수가 `borrow_limit` 미만이고 도서 상태가 `expected`일 때만
    /// 도서를 `Borrowed`로 바꾸고 거래를 생성합니다.
    ///
    /// - 도서 상태가 `expected`가 아니면 `None`
    /// - 한도 초과 시 `LimitExceeded`
    /// - 같은 도서에 미반납 거래가 이미 있으면 `Conflict`
    async fn open_loan(
        &self,
        new: NewTransaction,
        expected: Availability,
        borrow_limit: i64,
    ) -> LibraryResult<Option<Transaction>>;

    /// 반납을 완료합니다.
    ///
    /// 거래를 닫고 연체료를 사용자에게 더한 뒤, 가장 오래된 대기 예약을 확보하고
    /// 도서를 `Borrowed`에서 `Reserved` 또는 `Available`로 바꿉니다.
    ///
    /// - 이미 반납된 거래면 `None`
    /// - 도서가 `Borrowed`가 아니면 `InvalidState`
    async fn complete_return(
        &self,
        transaction_id: i64,
        returned_at: DateTime<Utc>,
        fine: Decimal,
    ) -> LibraryResult<Option<ReturnOutcome>>;

    /// 예약 생성.
    ///
    /// 같은 (사용자, 도서)에 대기 중 예약이 이미 있으면 `Conflict`.
    async fn insert_reservation(&self, new: NewReservation) -> LibraryResult<Reservation>;

    /// 예약 상태가 `expected`일 때만 `next`로 변경합니다.
    async fn update_reservation_status(
        &self,
        reservation_id: i64,
        expected: ReservationStatus,
        next: ReservationStatus,
        at: DateTime<Utc>,
    ) -> LibraryResult<Option<Reservation>>;

    /// 확보된 예약을 취소하고 도서를 다음 대기 예약자에게 넘깁니다.
    ///
    /// - 예약이 `Fulfilled`가 아니면 `None`
    /// - 도서가 `Reserved`가 아니면 `InvalidState`
    async fn release_hold(
        &self,
        reservation_id: i64,
        at: DateTime<Utc>,
    ) -> LibraryResult<Option<(Reservation, HandOver)>>;
}

/// 도서 인계 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct HandOver {
    /// 인계 후 도서 상태
    pub availability: Availability,
    /// 새로 확보된 예약
    pub fulfilled: Option<Reservation>,
}

/// 반납 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnOutcome {
    pub transaction: Transaction,
    pub hand_over: HandOver,
}
