//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 `Arc`로 래핑되어 여러 요청 간에 공유됩니다.

use std::sync::Arc;

use axum::extract::FromRef;
use library_core::{LendingPolicy, LendingService, LendingStore};
use sqlx::PgPool;

use crate::auth::JwtConfig;
use crate::error::{database_unavailable, ApiError};
use crate::repository::PgLendingStore;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 데이터베이스 연결 풀 (PostgreSQL)
    ///
    /// 없으면 카탈로그/계정 API는 "Database not available"을 반환합니다.
    pub db_pool: Option<PgPool>,

    /// 대출 상태 머신
    pub lending: Arc<LendingService>,

    /// JWT 서명 설정
    pub jwt: JwtConfig,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 주어진 대출 저장소로 상태를 생성합니다.
    pub fn new(store: Arc<dyn LendingStore>, policy: LendingPolicy, jwt: JwtConfig) -> Self {
        Self {
            db_pool: None,
            lending: Arc::new(LendingService::new(store, policy)),
            jwt,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// PostgreSQL 기반 상태 생성.
    ///
    /// 대출 기록도 같은 풀을 사용하는 [`PgLendingStore`]에 저장됩니다.
    pub fn with_postgres(pool: PgPool, policy: LendingPolicy, jwt: JwtConfig) -> Self {
        let store = Arc::new(PgLendingStore::new(pool.clone()));
        Self::new(store, policy, jwt).with_db_pool(pool)
    }

    /// 데이터베이스 연결 설정.
    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// DB 풀을 반환합니다. 없으면 "Database not available" 에러.
    pub fn require_db(&self) -> Result<&PgPool, ApiError> {
        self.db_pool.as_ref().ok_or_else(database_unavailable)
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        if let Some(pool) = &self.db_pool {
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
        } else {
            false
        }
    }
}

impl FromRef<Arc<AppState>> for JwtConfig {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.jwt.clone()
    }
}

/// 테스트용 JWT 비밀 키.
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

/// 테스트용 AppState 생성 헬퍼.
///
/// DB 없이 메모리 저장소를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    create_test_state_with_store().0
}

/// 테스트용 AppState와 데이터 시딩용 메모리 저장소를 함께 반환합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state_with_store() -> (AppState, Arc<library_core::MemoryLendingStore>) {
    let store = Arc::new(library_core::MemoryLendingStore::new());
    let state = AppState::new(
        store.clone(),
        LendingPolicy::default(),
        JwtConfig::new(TEST_JWT_SECRET, 60),
    );
    (state, store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_without_database() {
        let state = create_test_state();

        assert!(state.db_pool.is_none());
        assert!(state.require_db().is_err());
        assert!(!state.is_db_healthy().await);
        assert!(state.uptime_secs() >= 0);
    }

    #[test]
    fn test_jwt_config_from_state() {
        let state = Arc::new(create_test_state());
        let config = JwtConfig::from_ref(&state);
        assert_eq!(config.secret(), TEST_JWT_SECRET);
        assert_eq!(config.token_ttl_minutes, 60);
    }
}
