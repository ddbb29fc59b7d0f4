//! Category Repository
//!
//! 카테고리 CRUD. 도서가 남아 있는 카테고리는 삭제할 수 없습니다.

use chrono::{DateTime, Utc};
use library_core::{Category, LibraryError, LibraryResult};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;

use super::db_error;

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 카테고리 + 소속 도서 수
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CategoryWithCount {
    pub id: i64,
    pub name: String,
    pub book_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category Repository
pub struct CategoryRepository;

impl CategoryRepository {
    /// 모든 카테고리 조회 (도서 수 포함, 이름순)
    pub async fn list(pool: &PgPool) -> LibraryResult<Vec<CategoryWithCount>> {
        sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT
                c.id, c.name,
                COUNT(b.id) AS book_count,
                c.created_at, c.updated_at
            FROM categories c
            LEFT JOIN books b ON b.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(db_error)
    }

    /// 카테고리 상세 조회
    pub async fn get(pool: &PgPool, id: i64) -> LibraryResult<Category> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error)?
        .map(Category::from)
        .ok_or_else(|| LibraryError::NotFound(format!("category {}", id)))
    }

    /// 카테고리 생성. 이름이 중복되면 `Conflict`.
    pub async fn create(pool: &PgPool, name: &str) -> LibraryResult<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO categories (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(name.trim())
        .fetch_one(pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    /// 카테고리 이름 변경
    pub async fn rename(pool: &PgPool, id: i64, name: &str) -> LibraryResult<Category> {
        sqlx::query_as::<_, CategoryRow>(
            r#"
            UPDATE categories
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name.trim())
        .fetch_optional(pool)
        .await
        .map_err(db_error)?
        .map(Category::from)
        .ok_or_else(|| LibraryError::NotFound(format!("category {}", id)))
    }

    /// 카테고리 삭제.
    ///
    /// 소속 도서가 있으면 `Conflict`. 외래 키(RESTRICT)도 같은 결과를 보장합니다.
    pub async fn delete(pool: &PgPool, id: i64) -> LibraryResult<()> {
        let book_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE category_id = $1")
                .bind(id)
                .fetch_one(pool)
                .await
                .map_err(db_error)?;

        if book_count > 0 {
            return Err(LibraryError::Conflict(format!(
                "category {} still has {} book(s)",
                id, book_count
            )));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound(format!("category {}", id)));
        }
        Ok(())
    }
}
