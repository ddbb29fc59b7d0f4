//! Book Repository
//!
//! 도서 카탈로그 CRUD. `availability` 컬럼은 여기서 쓰지 않습니다.
//! 대출 상태는 [`super::PgLendingStore`]만 변경합니다.

use chrono::{DateTime, Utc};
use library_core::{Availability, Book, BookUpdate, LibraryError, LibraryResult, NewBook};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use utoipa::IntoParams;

use super::{corrupt_column, db_error, is_foreign_key_violation};

pub(crate) const BOOK_COLUMNS: &str = "id, name, author, publication, isbn, genre, edition, \
     copies, category_id, availability, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct BookRow {
    id: i64,
    name: String,
    author: String,
    publication: String,
    isbn: String,
    genre: String,
    edition: String,
    copies: i32,
    category_id: i64,
    availability: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookRow> for Book {
    type Error = LibraryError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let availability = Availability::parse(&row.availability)
            .ok_or_else(|| corrupt_column("books.availability", &row.availability))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            author: row.author,
            publication: row.publication,
            isbn: row.isbn,
            genre: row.genre,
            edition: row.edition,
            copies: row.copies,
            category_id: row.category_id,
            availability,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 도서 목록 필터
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct BookQuery {
    /// 카테고리 ID
    pub category_id: Option<i64>,
    /// 대출 상태
    pub availability: Option<Availability>,
    /// 제목/저자 부분 일치 검색
    pub search: Option<String>,
}

/// Book Repository
pub struct BookRepository;

impl BookRepository {
    /// 도서 목록 조회 (ID순)
    pub async fn list(pool: &PgPool, query: &BookQuery) -> LibraryResult<Vec<Book>> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let rows = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books
            WHERE ($1::BIGINT IS NULL OR category_id = $1)
              AND ($2::TEXT IS NULL OR availability = $2)
              AND ($3::TEXT IS NULL OR name ILIKE $3 OR author ILIKE $3)
            ORDER BY id
            "#
        ))
        .bind(query.category_id)
        .bind(query.availability.map(|a| a.as_str()))
        .bind(pattern)
        .fetch_all(pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Book::try_from).collect()
    }

    /// 도서 상세 조회
    pub async fn get(pool: &PgPool, id: i64) -> LibraryResult<Book> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| LibraryError::NotFound(format!("book {}", id)))?;

        row.try_into()
    }

    /// 도서 등록. 새 도서는 항상 `Available`로 시작합니다.
    pub async fn create(pool: &PgPool, input: &NewBook) -> LibraryResult<Book> {
        input.validate()?;

        let row = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            INSERT INTO books
                (name, author, publication, isbn, genre, edition, copies, category_id, availability)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'Available')
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(&input.name)
        .bind(&input.author)
        .bind(&input.publication)
        .bind(&input.isbn)
        .bind(&input.genre)
        .bind(&input.edition)
        .bind(input.copies)
        .bind(input.category_id)
        .fetch_one(pool)
        .await
        .map_err(|e| missing_category(e, input.category_id))?;

        row.try_into()
    }

    /// 도서 정보 수정. 지정된 필드만 변경됩니다.
    pub async fn update(pool: &PgPool, id: i64, input: &BookUpdate) -> LibraryResult<Book> {
        input.validate()?;

        let row = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            UPDATE books SET
                name        = COALESCE($2, name),
                author      = COALESCE($3, author),
                publication = COALESCE($4, publication),
                isbn        = COALESCE($5, isbn),
                genre       = COALESCE($6, genre),
                edition     = COALESCE($7, edition),
                copies      = COALESCE($8, copies),
                category_id = COALESCE($9, category_id),
                updated_at  = NOW()
            WHERE id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.author)
        .bind(&input.publication)
        .bind(&input.isbn)
        .bind(&input.genre)
        .bind(&input.edition)
        .bind(input.copies)
        .bind(input.category_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| missing_category(e, input.category_id.unwrap_or_default()))?
        .ok_or_else(|| LibraryError::NotFound(format!("book {}", id)))?;

        row.try_into()
    }

    /// 도서 삭제.
    ///
    /// 거래/예약 기록이 참조하는 도서는 `Conflict`.
    pub async fn delete(pool: &PgPool, id: i64) -> LibraryResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound(format!("book {}", id)));
        }
        Ok(())
    }
}

/// 존재하지 않는 카테고리 참조는 입력 오류로 처리합니다.
fn missing_category(err: sqlx::Error, category_id: i64) -> LibraryError {
    if is_foreign_key_violation(&err) {
        LibraryError::InvalidInput(format!("category {} does not exist", category_id))
    } else {
        db_error(err)
    }
}
