//! 대출 중인 도서에 대한 예약.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 예약 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum ReservationStatus {
    /// 반납 대기 중
    Pending,
    /// 반납된 도서가 예약자에게 확보됨
    Fulfilled,
    /// 취소됨
    Cancelled,
}

impl ReservationStatus {
    /// 문자열로 변환.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Fulfilled => "Fulfilled",
            Self::Cancelled => "Cancelled",
        }
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Fulfilled" => Some(Self::Fulfilled),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 예약 엔티티.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 새 예약 입력.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub user_id: i64,
    pub book_id: i64,
    pub created_at: DateTime<Utc>,
}

/// 예약 목록 필터.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::IntoParams))]
pub struct ReservationFilter {
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    pub status: Option<ReservationStatus>,
}

impl ReservationFilter {
    /// 필터 조건에 맞는지 확인합니다.
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.user_id.map_or(true, |id| id == reservation.user_id)
            && self.book_id.map_or(true, |id| id == reservation.book_id)
            && self.status.map_or(true, |s| s == reservation.status)
    }
}
