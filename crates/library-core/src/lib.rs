//! # Library Core
//!
//! 도서관 백엔드의 핵심 도메인 모델과 대출 규칙을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 도서, 카테고리, 사용자, 대출 거래, 예약 타입
//! - 대출 상태 머신 (`LendingService`)과 저장소 협력자 트레이트
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod lending;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use lending::*;
pub use logging::*;
