//! 로깅 초기화와 대출 작업 span.
//!
//! `[logging]` 설정 섹션을 `tracing-subscriber` 레이어로 변환합니다.
//! 운영 환경에서는 `format = "json"`으로 로그 수집기에 넘기고, 개발 중에는
//! 기본값인 `pretty`를 씁니다. `RUST_LOG`가 있으면 설정 파일의 레벨보다 우선합니다.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    /// 한 줄 출력
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 구독자 초기화 옵션.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 필터 지시문 (예: "info", "library_core::lending=debug")
    pub level: String,
    pub format: LogFormat,
    /// 대출 span의 생성/종료 이벤트 출력
    pub with_span_events: bool,
    /// 파일명과 줄 번호 출력
    pub with_file: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from(&LoggingConfig::default())
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.parse().unwrap_or_default(),
            with_span_events: config.span_events,
            with_file: config.file_lines,
            with_target: true,
        }
    }
}

/// 전역 구독자를 설치합니다. 프로세스당 한 번만 성공합니다.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_target(config.with_target)
        .with_span_events(span_events);

    let layer = match config.format {
        LogFormat::Pretty => base.pretty().with_filter(env_filter).boxed(),
        LogFormat::Json => base.json().with_filter(env_filter).boxed(),
        LogFormat::Compact => base.compact().with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    tracing::info!(
        format = ?config.format,
        level = %config.level,
        "Logging initialized"
    );

    Ok(())
}

/// 대출 작업 span.
///
/// 대상 레코드 ID를 필드로 붙여 하위 로그가 어느 도서/거래/예약에 대한 것인지 남깁니다.
#[macro_export]
macro_rules! lending_span {
    ($name:expr, book = $book:expr, user = $user:expr) => {
        tracing::info_span!($name, book_id = %$book, user_id = %$user)
    };
    ($name:expr, transaction = $tx:expr) => {
        tracing::info_span!($name, transaction_id = %$tx)
    };
    ($name:expr, reservation = $reservation:expr) => {
        tracing::info_span!($name, reservation_id = %$reservation)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("COMPACT".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("invalid".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_from_logging_section() {
        let section = LoggingConfig {
            level: "library_core::lending=debug".to_string(),
            format: "json".to_string(),
            span_events: true,
            file_lines: true,
        };
        let config = LogConfig::from(&section);

        assert_eq!(config.level, "library_core::lending=debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.with_span_events);
        assert!(config.with_file);
    }

    #[test]
    fn test_unknown_format_falls_back_to_pretty() {
        let section = LoggingConfig {
            format: "xml".to_string(),
            ..LoggingConfig::default()
        };
        let config = LogConfig::from(&section);

        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.with_span_events);
    }
}
