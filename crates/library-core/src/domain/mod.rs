//! 도서관 운영을 위한 도메인 모델.

mod book;
mod category;
mod reservation;
mod transaction;
mod user;

pub use book::*;
pub use category::*;
pub use reservation::*;
pub use transaction::*;
pub use user::*;
