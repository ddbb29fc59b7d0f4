//! 대출 상태 머신과 저장소 협력자.
//!
//! - `LendingService` - 대출/반납/예약 규칙
//! - `LendingStore` - 저장소 협력자 트레이트
//! - `MemoryLendingStore` - 메모리 구현
//! - `LendingPolicy` - 한도, 대출 기간, 연체료

mod locks;
mod memory;
mod policy;
mod service;
mod store;

pub use locks::KeyedLocks;
pub use memory::MemoryLendingStore;
pub use policy::LendingPolicy;
pub use service::LendingService;
pub use store::{HandOver, LendingStore, ReturnOutcome};
