//! 메모리 기반 `LendingStore` 구현.
//!
//! 테스트와 데이터베이스 없이 실행되는 환경에서 사용합니다.
//! 모든 변경은 하나의 쓰기 잠금 안에서 검사 후 적용되므로 조건부 갱신이 원자적입니다.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::store::{HandOver, LendingStore, ReturnOutcome};
use crate::domain::{
    Availability, Book, NewReservation, NewTransaction, Reservation, ReservationFilter,
    ReservationStatus, Role, Transaction, User,
};
use crate::error::{LibraryError, LibraryResult};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    books: BTreeMap<i64, Book>,
    transactions: BTreeMap<i64, Transaction>,
    reservations: BTreeMap<i64, Reservation>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_open_loan(&self, book_id: i64) -> bool {
        self.transactions
            .values()
            .any(|tx| tx.book_id == book_id && tx.is_open())
    }

    fn oldest_pending(&self, book_id: i64) -> Option<i64> {
        self.reservations
            .values()
            .filter(|r| r.book_id == book_id && r.status == ReservationStatus::Pending)
            .min_by_key(|r| (r.created_at, r.id))
            .map(|r| r.id)
    }

    /// 도서 상태가 `from`인지 검사합니다. 변경 전에 호출합니다.
    fn expect_availability(&self, book_id: i64, from: Availability) -> LibraryResult<()> {
        let book = self
            .books
            .get(&book_id)
            .ok_or_else(|| LibraryError::NotFound(format!("book {}", book_id)))?;
        if book.availability != from {
            return Err(LibraryError::InvalidState(format!(
                "book {} is {}, expected {}",
                book_id, book.availability, from
            )));
        }
        Ok(())
    }

    /// 가장 오래된 대기 예약을 확보하고 도서 상태를 바꿉니다.
    ///
    /// `expect_availability`로 검사를 마친 뒤에만 호출합니다.
    fn hand_over(&mut self, book_id: i64, at: DateTime<Utc>) -> HandOver {
        let fulfilled = self.oldest_pending(book_id).and_then(|id| {
            self.reservations.get_mut(&id).map(|r| {
                r.status = ReservationStatus::Fulfilled;
                r.updated_at = at;
                r.clone()
            })
        });
        let availability = if fulfilled.is_some() {
            Availability::Reserved
        } else {
            Availability::Available
        };
        if let Some(book) = self.books.get_mut(&book_id) {
            book.availability = availability;
            book.updated_at = at;
        }
        HandOver {
            availability,
            fulfilled,
        }
    }
}

/// 메모리 저장소.
#[derive(Debug, Default)]
pub struct MemoryLendingStore {
    state: RwLock<MemoryState>,
}

impl MemoryLendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== 시드 헬퍼 ====================

    /// 사용자를 추가합니다.
    pub async fn add_user(&self, name: &str, email: &str, role: Role) -> User {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            membership_id: format!("M-{:05}", id),
            role,
            fines: Decimal::ZERO,
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        user
    }

    /// 대출 가능한 도서를 추가합니다.
    pub async fn add_book(&self, name: &str, isbn: &str) -> Book {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let now = Utc::now();
        let book = Book {
            id,
            name: name.to_string(),
            author: String::new(),
            publication: String::new(),
            isbn: isbn.to_string(),
            genre: String::new(),
            edition: String::new(),
            copies: 1,
            category_id: 1,
            availability: Availability::Available,
            created_at: now,
            updated_at: now,
        };
        state.books.insert(id, book.clone());
        book
    }
}

#[async_trait]
impl LendingStore for MemoryLendingStore {
    async fn find_user(&self, user_id: i64) -> LibraryResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_book(&self, book_id: i64) -> LibraryResult<Option<Book>> {
        Ok(self.state.read().await.books.get(&book_id).cloned())
    }

    async fn find_transaction(&self, transaction_id: i64) -> LibraryResult<Option<Transaction>> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .get(&transaction_id)
            .cloned())
    }

    async fn find_reservation(&self, reservation_id: i64) -> LibraryResult<Option<Reservation>> {
        Ok(self
            .state
            .read()
            .await
            .reservations
            .get(&reservation_id)
            .cloned())
    }

    async fn count_open_transactions(&self, user_id: i64) -> LibraryResult<i64> {
        let state = self.state.read().await;
        let count = state
            .transactions
            .values()
            .filter(|tx| tx.user_id == user_id && tx.is_open())
            .count();
        Ok(count as i64)
    }

    async fn has_pending_reservation(&self, user_id: i64, book_id: i64) -> LibraryResult<bool> {
        let state = self.state.read().await;
        Ok(state.reservations.values().any(|r| {
            r.user_id == user_id && r.book_id == book_id && r.status == ReservationStatus::Pending
        }))
    }

    async fn oldest_pending_reservation(
        &self,
        book_id: i64,
    ) -> LibraryResult<Option<Reservation>> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.book_id == book_id && r.status == ReservationStatus::Pending)
            .min_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn latest_fulfilled_reservation(
        &self,
        book_id: i64,
    ) -> LibraryResult<Option<Reservation>> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.book_id == book_id && r.status == ReservationStatus::Fulfilled)
            .max_by_key(|r| (r.updated_at, r.id))
            .cloned())
    }

    async fn list_transactions_for_user(
        &self,
        user_id: i64,
        open_only: bool,
    ) -> LibraryResult<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.user_id == user_id && (!open_only || tx.is_open()))
            .cloned()
            .collect())
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> LibraryResult<Vec<Reservation>> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn open_loan(
        &self,
        new: NewTransaction,
        expected: Availability,
        borrow_limit: i64,
    ) -> LibraryResult<Option<Transaction>> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&new.user_id) {
            return Err(LibraryError::NotFound(format!("user {}", new.user_id)));
        }
        let open = state
            .transactions
            .values()
            .filter(|tx| tx.user_id == new.user_id && tx.is_open())
            .count() as i64;
        if open >= borrow_limit {
            return Err(LibraryError::LimitExceeded {
                user_id: new.user_id,
                limit: borrow_limit,
            });
        }
        match state.books.get(&new.book_id) {
            Some(book) if book.availability == expected => {}
            _ => return Ok(None),
        }
        if state.has_open_loan(new.book_id) {
            return Err(LibraryError::Conflict(format!(
                "book {} already has an open transaction",
                new.book_id
            )));
        }

        let id = state.next_id();
        let transaction = Transaction {
            id,
            user_id: new.user_id,
            book_id: new.book_id,
            borrow_date: new.borrow_date,
            due_date: new.due_date,
            return_date: None,
            fine: Decimal::ZERO,
        };
        if let Some(book) = state.books.get_mut(&new.book_id) {
            book.availability = Availability::Borrowed;
            book.updated_at = new.borrow_date;
        }
        state.transactions.insert(id, transaction.clone());
        Ok(Some(transaction))
    }

    async fn complete_return(
        &self,
        transaction_id: i64,
        returned_at: DateTime<Utc>,
        fine: Decimal,
    ) -> LibraryResult<Option<ReturnOutcome>> {
        let mut state = self.state.write().await;
        let (user_id, book_id) = match state.transactions.get(&transaction_id) {
            Some(tx) if tx.is_open() => (tx.user_id, tx.book_id),
            _ => return Ok(None),
        };
        if !state.users.contains_key(&user_id) {
            return Err(LibraryError::NotFound(format!("user {}", user_id)));
        }
        state.expect_availability(book_id, Availability::Borrowed)?;

        let transaction = match state.transactions.get_mut(&transaction_id) {
            Some(tx) => {
                tx.return_date = Some(returned_at);
                tx.fine = fine;
                tx.clone()
            }
            None => return Ok(None),
        };
        if let Some(user) = state.users.get_mut(&user_id) {
            user.fines += fine;
        }
        let hand_over = state.hand_over(book_id, returned_at);

        Ok(Some(ReturnOutcome {
            transaction,
            hand_over,
        }))
    }

    async fn insert_reservation(&self, new: NewReservation) -> LibraryResult<Reservation> {
        let mut state = self.state.write().await;
        if state.reservations.values().any(|r| {
            r.user_id == new.user_id
                && r.book_id == new.book_id
                && r.status == ReservationStatus::Pending
        }) {
            return Err(LibraryError::Conflict(format!(
                "user {} already has a pending reservation for book {}",
                new.user_id, new.book_id
            )));
        }

        let id = state.next_id();
        let reservation = Reservation {
            id,
            user_id: new.user_id,
            book_id: new.book_id,
            status: ReservationStatus::Pending,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        state.reservations.insert(id, reservation.clone());
        Ok(reservation)
    }

    async fn update_reservation_status(
        &self,
        reservation_id: i64,
        expected: ReservationStatus,
        next: ReservationStatus,
        at: DateTime<Utc>,
    ) -> LibraryResult<Option<Reservation>> {
        let mut state = self.state.write().await;
        match state.reservations.get_mut(&reservation_id) {
            Some(r) if r.status == expected => {
                r.status = next;
                r.updated_at = at;
                Ok(Some(r.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_hold(
        &self,
        reservation_id: i64,
        at: DateTime<Utc>,
    ) -> LibraryResult<Option<(Reservation, HandOver)>> {
        let mut state = self.state.write().await;
        let book_id = match state.reservations.get(&reservation_id) {
            Some(r) if r.status == ReservationStatus::Fulfilled => r.book_id,
            _ => return Ok(None),
        };
        state.expect_availability(book_id, Availability::Reserved)?;

        let cancelled = match state.reservations.get_mut(&reservation_id) {
            Some(r) => {
                r.status = ReservationStatus::Cancelled;
                r.updated_at = at;
                r.clone()
            }
            None => return Ok(None),
        };
        let hand_over = state.hand_over(book_id, at);
        Ok(Some((cancelled, hand_over)))
    }
}
