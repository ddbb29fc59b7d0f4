//! PostgreSQL 기반 대출 기록 저장소.
//!
//! 모든 상태 변경은 조건부 UPDATE로 수행되며, 부분 유니크 인덱스
//! (`uq_transactions_open_book`, `uq_reservations_pending`)가
//! 프로세스 간 경쟁도 차단합니다.
//!
//! 여러 행을 바꾸는 작업은 하나의 데이터베이스 트랜잭션 안에서 실행됩니다.
//! 중간에 반환하면 트랜잭션이 드롭되며 롤백됩니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use library_core::{
    Availability, Book, HandOver, LendingStore, LibraryError, LibraryResult, NewReservation,
    NewTransaction, Reservation, ReservationFilter, ReservationStatus, ReturnOutcome,
    Transaction, User,
};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};

use super::books::{BookRow, BOOK_COLUMNS};
use super::users::{UserRow, USER_COLUMNS};
use super::{corrupt_column, db_error};

const TRANSACTION_COLUMNS: &str =
    "id, user_id, book_id, borrow_date, due_date, return_date, fine";
const RESERVATION_COLUMNS: &str = "id, user_id, book_id, status, created_at, updated_at";

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: i64,
    user_id: i64,
    book_id: i64,
    borrow_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    fine: Decimal,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            book_id: row.book_id,
            borrow_date: row.borrow_date,
            due_date: row.due_date,
            return_date: row.return_date,
            fine: row.fine,
        }
    }
}

#[derive(Debug, FromRow)]
struct ReservationRow {
    id: i64,
    user_id: i64,
    book_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = LibraryError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = ReservationStatus::parse(&row.status)
            .ok_or_else(|| corrupt_column("reservations.status", &row.status))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            book_id: row.book_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_reservation(row: Option<ReservationRow>) -> LibraryResult<Option<Reservation>> {
    row.map(Reservation::try_from).transpose()
}

/// PostgreSQL `LendingStore` 구현.
#[derive(Debug, Clone)]
pub struct PgLendingStore {
    pool: PgPool,
}

impl PgLendingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 도서를 가장 오래된 대기 예약자에게 넘기거나 `Available`로 되돌립니다.
    ///
    /// 호출자의 트랜잭션 안에서 실행됩니다. 도서 상태가 `from`이 아니면 `InvalidState`.
    async fn hand_over(
        conn: &mut PgConnection,
        book_id: i64,
        from: Availability,
        at: DateTime<Utc>,
    ) -> LibraryResult<HandOver> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            UPDATE reservations
            SET status = 'Fulfilled', updated_at = $2
            WHERE id = (
                SELECT id FROM reservations
                WHERE book_id = $1 AND status = 'Pending'
                ORDER BY created_at, id
                LIMIT 1
                FOR UPDATE
            )
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(book_id)
        .bind(at)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
        let fulfilled = to_reservation(row)?;

        let availability = if fulfilled.is_some() {
            Availability::Reserved
        } else {
            Availability::Available
        };
        let result = sqlx::query(
            r#"
            UPDATE books
            SET availability = $3, updated_at = NOW()
            WHERE id = $1 AND availability = $2
            "#,
        )
        .bind(book_id)
        .bind(from.as_str())
        .bind(availability.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

        if result.rows_affected() != 1 {
            return Err(LibraryError::InvalidState(format!(
                "book {} is no longer {}",
                book_id, from
            )));
        }

        Ok(HandOver {
            availability,
            fulfilled,
        })
    }
}

#[async_trait]
impl LendingStore for PgLendingStore {
    async fn find_user(&self, user_id: i64) -> LibraryResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(User::try_from)
            .transpose()
    }

    async fn find_book(&self, book_id: i64) -> LibraryResult<Option<Book>> {
        sqlx::query_as::<_, BookRow>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Book::try_from)
            .transpose()
    }

    async fn find_transaction(&self, transaction_id: i64) -> LibraryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(Transaction::from))
    }

    async fn find_reservation(&self, reservation_id: i64) -> LibraryResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        to_reservation(row)
    }

    async fn count_open_transactions(&self, user_id: i64) -> LibraryResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND return_date IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn has_pending_reservation(&self, user_id: i64, book_id: i64) -> LibraryResult<bool> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE user_id = $1 AND book_id = $2 AND status = 'Pending'
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn oldest_pending_reservation(
        &self,
        book_id: i64,
    ) -> LibraryResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE book_id = $1 AND status = 'Pending'
            ORDER BY created_at, id
            LIMIT 1
            "#
        ))
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        to_reservation(row)
    }

    async fn latest_fulfilled_reservation(
        &self,
        book_id: i64,
    ) -> LibraryResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE book_id = $1 AND status = 'Fulfilled'
            ORDER BY updated_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        to_reservation(row)
    }

    async fn list_transactions_for_user(
        &self,
        user_id: i64,
        open_only: bool,
    ) -> LibraryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE user_id = $1 AND (NOT $2 OR return_date IS NULL)
            ORDER BY borrow_date DESC, id DESC
            "#
        ))
        .bind(user_id)
        .bind(open_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> LibraryResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::BIGINT IS NULL OR book_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY created_at, id
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.book_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Reservation::try_from).collect()
    }

    async fn open_loan(
        &self,
        new: NewTransaction,
        expected: Availability,
        borrow_limit: i64,
    ) -> LibraryResult<Option<Transaction>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // 같은 사용자의 동시 대출을 직렬화
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(new.user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
        if locked.is_none() {
            return Err(LibraryError::NotFound(format!("user {}", new.user_id)));
        }

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND return_date IS NULL",
        )
        .bind(new.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        if open >= borrow_limit {
            return Err(LibraryError::LimitExceeded {
                user_id: new.user_id,
                limit: borrow_limit,
            });
        }

        let result = sqlx::query(
            r#"
            UPDATE books
            SET availability = 'Borrowed', updated_at = NOW()
            WHERE id = $1 AND availability = $2
            "#,
        )
        .bind(new.book_id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if result.rows_affected() != 1 {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (user_id, book_id, borrow_date, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.book_id)
        .bind(new.borrow_date)
        .bind(new.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        Ok(Some(row.into()))
    }

    async fn complete_return(
        &self,
        transaction_id: i64,
        returned_at: DateTime<Utc>,
        fine: Decimal,
    ) -> LibraryResult<Option<ReturnOutcome>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET return_date = $2, fine = $3
            WHERE id = $1 AND return_date IS NULL
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction_id)
        .bind(returned_at)
        .bind(fine)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let Some(transaction) = row.map(Transaction::from) else {
            return Ok(None);
        };

        let result = sqlx::query(
            "UPDATE users SET fines = fines + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(transaction.user_id)
        .bind(fine)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound(format!("user {}", transaction.user_id)));
        }

        let hand_over =
            Self::hand_over(&mut *tx, transaction.book_id, Availability::Borrowed, returned_at)
                .await?;

        tx.commit().await.map_err(db_error)?;

        Ok(Some(ReturnOutcome {
            transaction,
            hand_over,
        }))
    }

    async fn insert_reservation(&self, new: NewReservation) -> LibraryResult<Reservation> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            INSERT INTO reservations (user_id, book_id, status, created_at, updated_at)
            VALUES ($1, $2, 'Pending', $3, $3)
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.book_id)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        row.try_into()
    }

    async fn update_reservation_status(
        &self,
        reservation_id: i64,
        expected: ReservationStatus,
        next: ReservationStatus,
        at: DateTime<Utc>,
    ) -> LibraryResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            UPDATE reservations
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(reservation_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        to_reservation(row)
    }

    async fn release_hold(
        &self,
        reservation_id: i64,
        at: DateTime<Utc>,
    ) -> LibraryResult<Option<(Reservation, HandOver)>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            UPDATE reservations
            SET status = 'Cancelled', updated_at = $2
            WHERE id = $1 AND status = 'Fulfilled'
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(reservation_id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let Some(cancelled) = to_reservation(row)? else {
            return Ok(None);
        };

        let hand_over =
            Self::hand_over(&mut *tx, cancelled.book_id, Availability::Reserved, at).await?;

        tx.commit().await.map_err(db_error)?;

        Ok(Some((cancelled, hand_over)))
    }
}
