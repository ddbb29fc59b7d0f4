//! User Repository
//!
//! 계정 관리. 비밀번호 해시는 [`UserCredentials`]로만 노출되며
//! API 응답 타입인 [`User`]에는 포함되지 않습니다.

use chrono::{DateTime, Utc};
use library_core::{LibraryError, LibraryResult, Role, User};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use validator::Validate;

use super::{corrupt_column, db_error};

pub(crate) const USER_COLUMNS: &str = "id, name, email, membership_id, role, fines, created_at";

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    id: i64,
    name: String,
    email: String,
    membership_id: String,
    role: String,
    fines: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = LibraryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| corrupt_column("users.role", &row.role))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            membership_id: row.membership_id,
            role,
            fines: row.fines,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// 로그인 검증용 사용자 + 비밀번호 해시
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// 새 사용자 레코드 (해싱 완료된 비밀번호)
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub name: String,
    pub email: String,
    pub membership_id: String,
    pub password_hash: String,
    pub role: Role,
}

/// 사용자 수정 입력
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 50, message = "membership_id must be 1-50 characters"))]
    pub membership_id: Option<String>,
    pub role: Option<Role>,
}

/// User Repository
pub struct UserRepository;

impl UserRepository {
    /// 사용자 목록 (ID순)
    pub async fn list(pool: &PgPool) -> LibraryResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// 사용자 조회
    pub async fn get(pool: &PgPool, id: i64) -> LibraryResult<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| LibraryError::NotFound(format!("user {}", id)))?
            .try_into()
    }

    /// 이메일로 로그인 정보 조회 (대소문자 무시)
    pub async fn find_credentials_by_email(
        pool: &PgPool,
        email: &str,
    ) -> LibraryResult<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email.trim())
        .fetch_optional(pool)
        .await
        .map_err(db_error)?;

        row.map(|row| -> LibraryResult<UserCredentials> {
            Ok(UserCredentials {
                user: row.user.try_into()?,
                password_hash: row.password_hash,
            })
        })
        .transpose()
    }

    /// 사용자 생성. 이메일/회원 번호가 중복되면 `Conflict`.
    pub async fn create(pool: &PgPool, input: NewUserRecord) -> LibraryResult<User> {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, membership_id, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&input.name)
        .bind(input.email.trim().to_lowercase())
        .bind(&input.membership_id)
        .bind(&input.password_hash)
        .bind(input.role.as_str())
        .fetch_one(pool)
        .await
        .map_err(db_error)?
        .try_into()
    }

    /// 사용자 정보 수정. 지정된 필드만 변경됩니다.
    pub async fn update(pool: &PgPool, id: i64, input: &UserUpdate) -> LibraryResult<User> {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                name          = COALESCE($2, name),
                email         = COALESCE($3, email),
                membership_id = COALESCE($4, membership_id),
                role          = COALESCE($5, role),
                updated_at    = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.email.as_deref().map(|e| e.trim().to_lowercase()))
        .bind(&input.membership_id)
        .bind(input.role.map(|r| r.as_str()))
        .fetch_optional(pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| LibraryError::NotFound(format!("user {}", id)))?
        .try_into()
    }

    /// 사용자 삭제.
    ///
    /// 거래/예약 기록이 있는 사용자는 `Conflict`.
    pub async fn delete(pool: &PgPool, id: i64) -> LibraryResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}
