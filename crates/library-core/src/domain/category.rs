//! 도서 카테고리.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 장르/분류 카테고리.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Category {
    pub id: i64,
    /// 고유 이름
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
