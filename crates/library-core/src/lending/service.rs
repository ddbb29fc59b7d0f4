//! 대출 상태 머신.
//!
//! 도서 상태 전이: `Available → Borrowed → {Available | Reserved} → Borrowed → …`
//!
//! 도서 상태는 대출/반납/예약 처리로만 변경됩니다.
//! 같은 도서에 대한 작업은 도서 단위 잠금으로 직렬화되고, 대출/예약은
//! 사용자 단위 잠금도 함께 획득합니다 (항상 사용자 → 도서 순서).
//! 여러 레코드를 바꾸는 단계는 저장소의 단일 작업(`open_loan`, `complete_return`,
//! `release_hold`)으로 위임되어 부분 적용된 상태가 남지 않습니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn, Instrument};

use super::locks::KeyedLocks;
use super::policy::LendingPolicy;
use super::store::LendingStore;
use crate::domain::{
    Availability, Book, NewReservation, NewTransaction, Reservation, ReservationFilter,
    ReservationStatus, Transaction, User,
};
use crate::error::{LibraryError, LibraryResult};
use crate::lending_span;

/// 대출/반납/예약 서비스.
pub struct LendingService {
    store: Arc<dyn LendingStore>,
    policy: LendingPolicy,
    user_locks: KeyedLocks<i64>,
    book_locks: KeyedLocks<i64>,
}

impl std::fmt::Debug for LendingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LendingService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl LendingService {
    /// 새 서비스 생성.
    pub fn new(store: Arc<dyn LendingStore>, policy: LendingPolicy) -> Self {
        Self {
            store,
            policy,
            user_locks: KeyedLocks::new(),
            book_locks: KeyedLocks::new(),
        }
    }

    /// 대출 정책.
    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    /// 저장소 협력자.
    pub fn store(&self) -> &Arc<dyn LendingStore> {
        &self.store
    }

    // ==================== 대출 ====================

    /// 도서를 대출합니다.
    pub async fn borrow(&self, user_id: i64, book_id: i64) -> LibraryResult<Transaction> {
        self.borrow_at(user_id, book_id, Utc::now()).await
    }

    /// 지정된 시각에 도서를 대출합니다.
    ///
    /// `Reserved` 상태의 도서는 가장 최근에 확보된 예약의 예약자만 대출할 수 있습니다.
    pub async fn borrow_at(
        &self,
        user_id: i64,
        book_id: i64,
        now: DateTime<Utc>,
    ) -> LibraryResult<Transaction> {
        self.execute_borrow(user_id, book_id, now)
            .instrument(lending_span!("borrow", book = book_id, user = user_id))
            .await
    }

    // ==================== 반납 ====================

    /// 대출 거래를 반납 처리합니다.
    pub async fn return_book(&self, transaction_id: i64) -> LibraryResult<Transaction> {
        self.return_at(transaction_id, Utc::now()).await
    }

    /// 지정된 시각에 반납 처리합니다.
    ///
    /// 연체료를 계산하고, 가장 오래된 대기 중 예약이 있으면 그 예약자에게 도서를 확보합니다.
    pub async fn return_at(
        &self,
        transaction_id: i64,
        now: DateTime<Utc>,
    ) -> LibraryResult<Transaction> {
        self.execute_return(transaction_id, now)
            .instrument(lending_span!("return", transaction = transaction_id))
            .await
    }

    // ==================== 예약 ====================

    /// 대출 중인 도서를 예약합니다.
    pub async fn reserve(&self, user_id: i64, book_id: i64) -> LibraryResult<Reservation> {
        self.reserve_at(user_id, book_id, Utc::now()).await
    }

    /// 지정된 시각에 예약합니다.
    pub async fn reserve_at(
        &self,
        user_id: i64,
        book_id: i64,
        now: DateTime<Utc>,
    ) -> LibraryResult<Reservation> {
        self.execute_reserve(user_id, book_id, now)
            .instrument(lending_span!("reserve", book = book_id, user = user_id))
            .await
    }

    /// 예약을 취소합니다.
    pub async fn cancel_reservation(&self, reservation_id: i64) -> LibraryResult<Reservation> {
        self.cancel_reservation_at(reservation_id, Utc::now()).await
    }

    /// 지정된 시각에 예약을 취소합니다.
    ///
    /// 대기 중인 예약은 그대로 취소됩니다. 확보되었지만 아직 대출되지 않은 예약을
    /// 취소하면 도서는 다음 대기 예약자에게 넘어가거나 `Available`이 됩니다.
    pub async fn cancel_reservation_at(
        &self,
        reservation_id: i64,
        now: DateTime<Utc>,
    ) -> LibraryResult<Reservation> {
        self.execute_cancel(reservation_id, now)
            .instrument(lending_span!("cancel", reservation = reservation_id))
            .await
    }

    async fn execute_cancel(
        &self,
        reservation_id: i64,
        now: DateTime<Utc>,
    ) -> LibraryResult<Reservation> {
        let reservation = self.get_reservation(reservation_id).await?;
        let book_id = reservation.book_id;
        let _book_guard = self.book_locks.lock(book_id).await;

        let releasable = reservation.status == ReservationStatus::Fulfilled
            && self.is_unclaimed_hold(&reservation).await?;

        match reservation.status {
            ReservationStatus::Pending => {
                let cancelled = self
                    .store
                    .update_reservation_status(
                        reservation_id,
                        ReservationStatus::Pending,
                        ReservationStatus::Cancelled,
                        now,
                    )
                    .await?
                    .ok_or_else(|| {
                        LibraryError::InvalidState(format!(
                            "reservation {} is no longer pending",
                            reservation_id
                        ))
                    })?;
                info!(reservation_id, book_id, "Reservation cancelled");
                Ok(cancelled)
            }
            ReservationStatus::Fulfilled if releasable => {
                let (cancelled, hand_over) = self
                    .store
                    .release_hold(reservation_id, now)
                    .await?
                    .ok_or_else(|| {
                        LibraryError::InvalidState(format!(
                            "reservation {} changed concurrently",
                            reservation_id
                        ))
                    })?;
                info!(
                    reservation_id,
                    book_id,
                    availability = %hand_over.availability,
                    next_reservation_id = hand_over.fulfilled.as_ref().map(|r| r.id),
                    "Reserved hold released"
                );
                Ok(cancelled)
            }
            status => Err(LibraryError::InvalidState(format!(
                "reservation {} is {} and cannot be cancelled",
                reservation_id, status
            ))),
        }
    }

    // ==================== 조회 ====================

    /// 거래 조회.
    pub async fn get_transaction(&self, transaction_id: i64) -> LibraryResult<Transaction> {
        self.store
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("transaction {}", transaction_id)))
    }

    /// 예약 조회.
    pub async fn get_reservation(&self, reservation_id: i64) -> LibraryResult<Reservation> {
        self.store
            .find_reservation(reservation_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("reservation {}", reservation_id)))
    }

    /// 사용자의 거래 목록.
    pub async fn user_transactions(
        &self,
        user_id: i64,
        open_only: bool,
    ) -> LibraryResult<Vec<Transaction>> {
        self.require_user(user_id).await?;
        self.store.list_transactions_for_user(user_id, open_only).await
    }

    /// 예약 목록.
    pub async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> LibraryResult<Vec<Reservation>> {
        self.store.list_reservations(filter).await
    }

    // ==================== 내부 ====================

    async fn execute_borrow(
        &self,
        user_id: i64,
        book_id: i64,
        now: DateTime<Utc>,
    ) -> LibraryResult<Transaction> {
        let _user_guard = self.user_locks.lock(user_id).await;
        let _book_guard = self.book_locks.lock(book_id).await;

        self.require_user(user_id).await?;
        let book = self.require_book(book_id).await?;

        match book.availability {
            Availability::Available => {}
            Availability::Reserved => {
                let holder = self.store.latest_fulfilled_reservation(book_id).await?;
                if holder.map(|r| r.user_id) != Some(user_id) {
                    debug!(user_id, book_id, "Reserved book requested by non-holder");
                    return Err(LibraryError::NotAvailable { book_id });
                }
            }
            Availability::Borrowed => return Err(LibraryError::NotAvailable { book_id }),
        }

        let open = self.store.count_open_transactions(user_id).await?;
        if open >= self.policy.borrow_limit {
            return Err(LibraryError::LimitExceeded {
                user_id,
                limit: self.policy.borrow_limit,
            });
        }

        let new = NewTransaction {
            user_id,
            book_id,
            borrow_date: now,
            due_date: self.policy.due_date(now),
        };
        let transaction = match self
            .store
            .open_loan(new, book.availability, self.policy.borrow_limit)
            .await
        {
            Ok(Some(transaction)) => transaction,
            Ok(None) | Err(LibraryError::Conflict(_)) => {
                warn!(user_id, book_id, "Lost availability race on borrow");
                return Err(LibraryError::NotAvailable { book_id });
            }
            Err(err) => return Err(err),
        };

        info!(
            transaction_id = transaction.id,
            user_id,
            book_id,
            due_date = %transaction.due_date,
            "Book borrowed"
        );
        Ok(transaction)
    }

    async fn execute_return(
        &self,
        transaction_id: i64,
        now: DateTime<Utc>,
    ) -> LibraryResult<Transaction> {
        let transaction = self
            .store
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("transaction {}", transaction_id)))?;
        if !transaction.is_open() {
            return Err(LibraryError::AlreadyReturned { transaction_id });
        }

        let book_id = transaction.book_id;
        let _book_guard = self.book_locks.lock(book_id).await;

        let fine = self.policy.fine_for(transaction.due_date, now);
        let outcome = self
            .store
            .complete_return(transaction_id, now, fine)
            .await?
            .ok_or(LibraryError::AlreadyReturned { transaction_id })?;

        info!(
            transaction_id,
            user_id = outcome.transaction.user_id,
            book_id,
            fine = %fine,
            availability = %outcome.hand_over.availability,
            reservation_id = outcome.hand_over.fulfilled.as_ref().map(|r| r.id),
            "Book returned"
        );
        Ok(outcome.transaction)
    }

    async fn execute_reserve(
        &self,
        user_id: i64,
        book_id: i64,
        now: DateTime<Utc>,
    ) -> LibraryResult<Reservation> {
        let _user_guard = self.user_locks.lock(user_id).await;
        let _book_guard = self.book_locks.lock(book_id).await;

        self.require_user(user_id).await?;
        let book = self.require_book(book_id).await?;

        if book.availability != Availability::Borrowed {
            return Err(LibraryError::NotReservable { book_id });
        }
        if self.store.has_pending_reservation(user_id, book_id).await? {
            return Err(LibraryError::DuplicateReservation { user_id, book_id });
        }

        let reservation = self
            .store
            .insert_reservation(NewReservation {
                user_id,
                book_id,
                created_at: now,
            })
            .await
            .map_err(|err| match err {
                LibraryError::Conflict(_) => {
                    LibraryError::DuplicateReservation { user_id, book_id }
                }
                other => other,
            })?;

        info!(reservation_id = reservation.id, user_id, book_id, "Book reserved");
        Ok(reservation)
    }

    async fn require_user(&self, user_id: i64) -> LibraryResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("user {}", user_id)))
    }

    async fn require_book(&self, book_id: i64) -> LibraryResult<Book> {
        self.store
            .find_book(book_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(format!("book {}", book_id)))
    }

    /// 확보된 예약이 아직 대출로 이어지지 않았는지 확인합니다.
    async fn is_unclaimed_hold(&self, reservation: &Reservation) -> LibraryResult<bool> {
        let book = self.require_book(reservation.book_id).await?;
        if book.availability != Availability::Reserved {
            return Ok(false);
        }
        let holder = self
            .store
            .latest_fulfilled_reservation(reservation.book_id)
            .await?;
        Ok(holder.map(|r| r.id) == Some(reservation.id))
    }
}
