//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 기본값 → `config/default.toml` (선택) → `LIBRARY__` 접두사 환경 변수 순으로 덮어씁니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

use crate::error::{LibraryError, LibraryResult};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 인증 설정
    pub auth: AuthConfig,
    /// 대출 정책
    pub lending: LendingConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9010,
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 접속 URL (없으면 `DATABASE_URL` 환경 변수 사용)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout_secs: 10,
        }
    }
}

/// 인증 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT 서명 비밀 키
    pub jwt_secret: Option<SecretString>,
    /// Access Token 유효 시간 (분)
    pub token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_minutes: 24 * 60,
        }
    }
}

/// 대출 정책 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LendingConfig {
    /// 사용자당 동시 대출 한도
    pub borrow_limit: i64,
    /// 대출 기간 (일)
    pub loan_period_days: i64,
    /// 연체 1일당 연체료
    pub fine_per_day: Decimal,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            borrow_limit: 5,
            loan_period_days: 14,
            fine_per_day: dec!(1),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// 대출/반납/예약 span의 시작과 종료를 기록
    pub span_events: bool,
    /// 소스 파일과 줄 번호 포함
    pub file_lines: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            span_events: false,
            file_lines: false,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> LibraryResult<Self> {
        let builder = config::Config::builder()
            // 파일에서 로드 (선택)
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("LIBRARY")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.apply_conventional_env();
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> LibraryResult<Self> {
        Self::load("config/default.toml")
    }

    /// `DATABASE_URL`, `JWT_SECRET` 같은 관례적 환경 변수를 반영합니다.
    fn apply_conventional_env(&mut self) {
        if self.database.url.is_none() {
            self.database.url = std::env::var("DATABASE_URL").ok();
        }
        if self.auth.jwt_secret.is_none() {
            self.auth.jwt_secret = std::env::var("JWT_SECRET").ok().map(SecretString::from);
        }
    }

    /// 설정 값의 유효성을 확인합니다.
    pub fn validate(&self) -> LibraryResult<()> {
        if self.lending.borrow_limit < 1 {
            return Err(LibraryError::Config(
                "lending.borrow_limit must be at least 1".to_string(),
            ));
        }
        if self.lending.loan_period_days < 1 {
            return Err(LibraryError::Config(
                "lending.loan_period_days must be at least 1".to_string(),
            ));
        }
        if self.lending.fine_per_day.is_sign_negative() {
            return Err(LibraryError::Config(
                "lending.fine_per_day must not be negative".to_string(),
            ));
        }
        if self.auth.token_ttl_minutes < 1 {
            return Err(LibraryError::Config(
                "auth.token_ttl_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lending_policy() {
        let config = AppConfig::default();
        assert_eq!(config.lending.borrow_limit, 5);
        assert_eq!(config.lending.loan_period_days, 14);
        assert_eq!(config.lending.fine_per_day, dec!(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_borrow_limit_rejected() {
        let mut config = AppConfig::default();
        config.lending.borrow_limit = 0;
        assert!(matches!(config.validate(), Err(LibraryError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.server.port, 9010);
        assert_eq!(config.auth.token_ttl_minutes, 24 * 60);
    }
}
