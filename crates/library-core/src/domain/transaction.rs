//! 대출 거래 기록.
//!
//! 대출 시 생성되고 반납 시 한 번만 변경되며 삭제되지 않습니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 대출 거래.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// 반납 전에는 None
    pub return_date: Option<DateTime<Utc>>,
    /// 반납 시점에만 계산됨
    pub fine: Decimal,
}

impl Transaction {
    /// 아직 반납되지 않은 거래인지 확인합니다.
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    /// 주어진 시각 기준 연체 일수 (소수점 이하 버림).
    pub fn days_overdue_at(&self, at: DateTime<Utc>) -> i64 {
        if at > self.due_date {
            (at - self.due_date).num_days()
        } else {
            0
        }
    }
}

/// 새 대출 거래 입력.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: i64,
    pub book_id: i64,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}
