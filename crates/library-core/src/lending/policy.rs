//! 대출 정책 (한도, 대출 기간, 연체료).

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::LendingConfig;

/// 대출 정책.
#[derive(Debug, Clone, PartialEq)]
pub struct LendingPolicy {
    /// 사용자당 동시 대출 한도
    pub borrow_limit: i64,
    /// 대출 기간 (일)
    pub loan_period_days: i64,
    /// 연체 1일당 연체료
    pub fine_per_day: Decimal,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            borrow_limit: 5,
            loan_period_days: 14,
            fine_per_day: dec!(1),
        }
    }
}

impl From<&LendingConfig> for LendingPolicy {
    fn from(config: &LendingConfig) -> Self {
        Self {
            borrow_limit: config.borrow_limit,
            loan_period_days: config.loan_period_days,
            fine_per_day: config.fine_per_day,
        }
    }
}

impl LendingPolicy {
    /// 대출 시각으로부터 반납 기한을 계산합니다.
    pub fn due_date(&self, borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
        borrowed_at + Duration::days(self.loan_period_days)
    }

    /// 연체료 계산.
    ///
    /// 연체 일수는 24시간 단위로 버림하며, 기한 이전 반납은 0입니다.
    pub fn fine_for(&self, due_date: DateTime<Utc>, returned_at: DateTime<Utc>) -> Decimal {
        if returned_at <= due_date {
            return Decimal::ZERO;
        }
        let days = (returned_at - due_date).num_days();
        Decimal::from(days) * self.fine_per_day
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_due_date_is_fourteen_days_later() {
        let policy = LendingPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.due_date(now) - now, Duration::days(14));
    }

    #[test]
    fn test_fine_on_day_twenty() {
        let policy = LendingPolicy::default();
        let borrowed = Utc::now();
        let due = policy.due_date(borrowed);
        let returned = borrowed + Duration::days(20);

        assert_eq!(policy.fine_for(due, returned), dec!(6));
    }

    #[test]
    fn test_no_fine_before_due_date() {
        let policy = LendingPolicy::default();
        let due = Utc::now();

        assert_eq!(policy.fine_for(due, due), Decimal::ZERO);
        assert_eq!(policy.fine_for(due, due - Duration::days(3)), Decimal::ZERO);
        assert_eq!(policy.fine_for(due, due + Duration::hours(23)), Decimal::ZERO);
    }

    #[test]
    fn test_custom_rate() {
        let policy = LendingPolicy {
            fine_per_day: dec!(0.50),
            ..Default::default()
        };
        let due = Utc::now();
        assert_eq!(policy.fine_for(due, due + Duration::days(3)), dec!(1.50));
    }

    proptest! {
        #[test]
        fn prop_fine_is_whole_days_times_rate(late_minutes in 0i64..(365 * 24 * 60)) {
            let policy = LendingPolicy::default();
            let due = Utc::now();
            let returned = due + Duration::minutes(late_minutes);

            let fine = policy.fine_for(due, returned);
            prop_assert_eq!(fine, Decimal::from(late_minutes / (24 * 60)));
        }

        #[test]
        fn prop_fine_never_negative(offset_minutes in -100_000i64..100_000) {
            let policy = LendingPolicy::default();
            let due = Utc::now();
            let fine = policy.fine_for(due, due + Duration::minutes(offset_minutes));
            prop_assert!(!fine.is_sign_negative());
        }
    }
}
