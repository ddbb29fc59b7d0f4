//! 사용자 및 역할.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 사용자 역할.
///
/// `staff`는 카탈로그/사용자/예약 관리 권한을 가집니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 사서
    Staff,
    /// 일반 이용자
    #[default]
    Student,
}

impl Role {
    /// 문자열로 변환.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Student => "student",
        }
    }

    /// 문자열에서 역할 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "staff" => Some(Role::Staff),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 도서관 이용자.
///
/// 비밀번호 해시는 저장소 계층에만 존재하며 이 타입에는 포함되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct User {
    pub id: i64,
    pub name: String,
    /// 고유 이메일
    pub email: String,
    /// 고유 회원 번호
    pub membership_id: String,
    pub role: Role,
    /// 누적 연체료
    pub fines: Decimal,
    pub created_at: DateTime<Utc>,
}
