//! 대출 경쟁 및 저장소 실패 테스트
//!
//! 메모리 저장소를 감싼 `ScriptedStore`로 호출 순서를 강제하거나
//! 저장소 실패를 주입합니다.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use library_core::{
    Availability, Book, HandOver, LendingPolicy, LendingService, LendingStore, LibraryError,
    LibraryResult, MemoryLendingStore, NewReservation, NewTransaction, Reservation,
    ReservationFilter, ReservationStatus, ReturnOutcome, Role, Transaction, User,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

/// 메모리 저장소 래퍼.
///
/// - `read_barrier`: `find_book` 직후 지정된 수의 호출자가 모일 때까지 대기
/// - `read_delay`: 조회 직후 지연
/// - `failing_returns`: 남은 횟수만큼 `complete_return`이 실패
#[derive(Default)]
struct ScriptedStore {
    inner: MemoryLendingStore,
    read_barrier: Option<Barrier>,
    read_delay: Option<StdDuration>,
    failing_returns: AtomicUsize,
}

impl ScriptedStore {
    async fn pause_after_read(&self) {
        if let Some(barrier) = &self.read_barrier {
            barrier.wait().await;
        }
        match self.read_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
    }
}

#[async_trait]
impl LendingStore for ScriptedStore {
    async fn find_user(&self, user_id: i64) -> LibraryResult<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn find_book(&self, book_id: i64) -> LibraryResult<Option<Book>> {
        let book = self.inner.find_book(book_id).await;
        self.pause_after_read().await;
        book
    }

    async fn find_transaction(&self, transaction_id: i64) -> LibraryResult<Option<Transaction>> {
        self.inner.find_transaction(transaction_id).await
    }

    async fn find_reservation(&self, reservation_id: i64) -> LibraryResult<Option<Reservation>> {
        self.inner.find_reservation(reservation_id).await
    }

    async fn count_open_transactions(&self, user_id: i64) -> LibraryResult<i64> {
        let count = self.inner.count_open_transactions(user_id).await;
        self.pause_after_read().await;
        count
    }

    async fn has_pending_reservation(&self, user_id: i64, book_id: i64) -> LibraryResult<bool> {
        self.inner.has_pending_reservation(user_id, book_id).await
    }

    async fn oldest_pending_reservation(
        &self,
        book_id: i64,
    ) -> LibraryResult<Option<Reservation>> {
        self.inner.oldest_pending_reservation(book_id).await
    }

    async fn latest_fulfilled_reservation(
        &self,
        book_id: i64,
    ) -> LibraryResult<Option<Reservation>> {
        self.inner.latest_fulfilled_reservation(book_id).await
    }

    async fn list_transactions_for_user(
        &self,
        user_id: i64,
        open_only: bool,
    ) -> LibraryResult<Vec<Transaction>> {
        self.inner.list_transactions_for_user(user_id, open_only).await
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> LibraryResult<Vec<Reservation>> {
        self.inner.list_reservations(filter).await
    }

    async fn open_loan(
        &self,
        new: NewTransaction,
        expected: Availability,
        borrow_limit: i64,
    ) -> LibraryResult<Option<Transaction>> {
        self.inner.open_loan(new, expected, borrow_limit).await
    }

    async fn complete_return(
        &self,
        transaction_id: i64,
        returned_at: DateTime<Utc>,
        fine: Decimal,
    ) -> LibraryResult<Option<ReturnOutcome>> {
        let remaining = self.failing_returns.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_returns.store(remaining - 1, Ordering::SeqCst);
            return Err(LibraryError::Persistence("connection reset".to_string()));
        }
        self.inner
            .complete_return(transaction_id, returned_at, fine)
            .await
    }

    async fn insert_reservation(&self, new: NewReservation) -> LibraryResult<Reservation> {
        self.inner.insert_reservation(new).await
    }

    async fn update_reservation_status(
        &self,
        reservation_id: i64,
        expected: ReservationStatus,
        next: ReservationStatus,
        at: DateTime<Utc>,
    ) -> LibraryResult<Option<Reservation>> {
        self.inner
            .update_reservation_status(reservation_id, expected, next, at)
            .await
    }

    async fn release_hold(
        &self,
        reservation_id: i64,
        at: DateTime<Utc>,
    ) -> LibraryResult<Option<(Reservation, HandOver)>> {
        self.inner.release_hold(reservation_id, at).await
    }
}

async fn add_students(store: &MemoryLendingStore, count: usize) -> Vec<User> {
    let mut users = Vec::with_capacity(count);
    for i in 0..count {
        users.push(
            store
                .add_user(&format!("user{}", i), &format!("user{}@example.com", i), Role::Student)
                .await,
        );
    }
    users
}

async fn open_loans_for_book(store: &MemoryLendingStore, users: &[User], book_id: i64) -> usize {
    let mut count = 0;
    for user in users {
        let transactions = store
            .list_transactions_for_user(user.id, true)
            .await
            .unwrap();
        count += transactions.iter().filter(|tx| tx.book_id == book_id).count();
    }
    count
}

// ==================== 경쟁 ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_of_one_book_exactly_one_succeeds() {
    let store = Arc::new(ScriptedStore {
        read_delay: Some(StdDuration::from_millis(5)),
        ..Default::default()
    });
    let service = Arc::new(LendingService::new(store.clone(), LendingPolicy::default()));
    let book = store.inner.add_book("Dune", "978-0441013593").await;
    let users = add_students(&store.inner, 8).await;

    let start = Arc::new(Barrier::new(users.len()));
    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let service = Arc::clone(&service);
            let start = Arc::clone(&start);
            let (user_id, book_id) = (user.id, book.id);
            tokio::spawn(async move {
                start.wait().await;
                service.borrow(user_id, book_id).await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LibraryError::NotAvailable { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(open_loans_for_book(&store.inner, &users, book.id).await, 1);
    let stored = store.inner.find_book(book.id).await.unwrap().unwrap();
    assert_eq!(stored.availability, Availability::Borrowed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stale_availability_read_loses_compare_and_set() {
    // 잠금을 공유하지 않는 두 서비스 인스턴스 (별도 프로세스에 해당)
    let store = Arc::new(ScriptedStore {
        read_barrier: Some(Barrier::new(2)),
        ..Default::default()
    });
    let first = LendingService::new(store.clone(), LendingPolicy::default());
    let second = LendingService::new(store.clone(), LendingPolicy::default());
    let book = store.inner.add_book("Dune", "978-0441013593").await;
    let users = add_students(&store.inner, 2).await;

    // 두 호출 모두 `Available`을 읽은 뒤에야 진행
    let (a, b) = tokio::join!(
        first.borrow(users[0].id, book.id),
        second.borrow(users[1].id, book.id)
    );

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let lost = results
        .iter()
        .filter(|r| matches!(r, Err(LibraryError::NotAvailable { book_id }) if *book_id == book.id))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(lost, 1);
    assert_eq!(open_loans_for_book(&store.inner, &users, book.id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_respect_limit() {
    let store = Arc::new(ScriptedStore {
        read_delay: Some(StdDuration::from_millis(5)),
        ..Default::default()
    });
    let service = Arc::new(LendingService::new(store.clone(), LendingPolicy::default()));
    let users = add_students(&store.inner, 1).await;
    let user_id = users[0].id;

    for i in 0..4 {
        let book = store
            .inner
            .add_book(&format!("Held {}", i), &format!("held-{}", i))
            .await;
        service.borrow(user_id, book.id).await.unwrap();
    }

    let mut books = Vec::new();
    for i in 0..4 {
        books.push(
            store
                .inner
                .add_book(&format!("Extra {}", i), &format!("extra-{}", i))
                .await,
        );
    }

    let start = Arc::new(Barrier::new(books.len()));
    let handles: Vec<_> = books
        .iter()
        .map(|book| {
            let service = Arc::clone(&service);
            let start = Arc::clone(&start);
            let book_id = book.id;
            tokio::spawn(async move {
                start.wait().await;
                service.borrow(user_id, book_id).await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LibraryError::LimitExceeded { limit: 5, .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.inner.count_open_transactions(user_id).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_limit_enforced_across_services_without_shared_locks() {
    let store = Arc::new(ScriptedStore {
        read_barrier: Some(Barrier::new(2)),
        ..Default::default()
    });
    let policy = LendingPolicy {
        borrow_limit: 1,
        ..LendingPolicy::default()
    };
    let first = LendingService::new(store.clone(), policy.clone());
    let second = LendingService::new(store.clone(), policy);
    let users = add_students(&store.inner, 1).await;
    let user_id = users[0].id;
    let dune = store.inner.add_book("Dune", "978-0441013593").await;
    let emma = store.inner.add_book("Emma", "978-0141439587").await;

    // find_book 과 count_open_transactions 양쪽에서 서로를 기다림
    let (a, b) = tokio::join!(first.borrow(user_id, dune.id), second.borrow(user_id, emma.id));

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(LibraryError::LimitExceeded { limit: 1, .. }))));
    assert_eq!(store.inner.count_open_transactions(user_id).await.unwrap(), 1);
}

// ==================== 저장소 실패 ====================

#[tokio::test]
async fn test_failed_return_leaves_loan_open_and_can_be_retried() {
    let store = Arc::new(ScriptedStore::default());
    let service = LendingService::new(store.clone(), LendingPolicy::default());
    let users = add_students(&store.inner, 2).await;
    let (alice, bob) = (&users[0], &users[1]);
    let book = store.inner.add_book("Dune", "978-0441013593").await;
    let borrowed_at = Utc::now();
    let tx = service.borrow_at(alice.id, book.id, borrowed_at).await.unwrap();

    store.failing_returns.store(1, Ordering::SeqCst);
    let returned_at = borrowed_at + Duration::days(20);
    let err = service.return_at(tx.id, returned_at).await.unwrap_err();
    assert!(matches!(err, LibraryError::Persistence(_)));

    // 아무것도 반영되지 않음
    let stored = store.inner.find_transaction(tx.id).await.unwrap().unwrap();
    assert!(stored.is_open());
    let stored_book = store.inner.find_book(book.id).await.unwrap().unwrap();
    assert_eq!(stored_book.availability, Availability::Borrowed);
    let stored_alice = store.inner.find_user(alice.id).await.unwrap().unwrap();
    assert_eq!(stored_alice.fines, Decimal::ZERO);

    // 재시도는 정상 처리
    let returned = service.return_at(tx.id, returned_at).await.unwrap();
    assert_eq!(returned.fine, dec!(6));
    let stored_alice = store.inner.find_user(alice.id).await.unwrap().unwrap();
    assert_eq!(stored_alice.fines, dec!(6));

    assert!(service.borrow(bob.id, book.id).await.is_ok());
}

#[tokio::test]
async fn test_failed_return_keeps_reservation_queue_intact() {
    let store = Arc::new(ScriptedStore::default());
    let service = LendingService::new(store.clone(), LendingPolicy::default());
    let users = add_students(&store.inner, 2).await;
    let (alice, bob) = (&users[0], &users[1]);
    let book = store.inner.add_book("Dune", "978-0441013593").await;
    let tx = service.borrow(alice.id, book.id).await.unwrap();
    let reservation = service.reserve(bob.id, book.id).await.unwrap();

    store.failing_returns.store(1, Ordering::SeqCst);
    assert!(service.return_book(tx.id).await.is_err());

    let pending = service.get_reservation(reservation.id).await.unwrap();
    assert_eq!(pending.status, ReservationStatus::Pending);

    service.return_book(tx.id).await.unwrap();
    let fulfilled = service.get_reservation(reservation.id).await.unwrap();
    assert_eq!(fulfilled.status, ReservationStatus::Fulfilled);
    let stored_book = store.inner.find_book(book.id).await.unwrap().unwrap();
    assert_eq!(stored_book.availability, Availability::Reserved);
}
