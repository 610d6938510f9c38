//! Refund eligibility from time remaining before a showtime starts.

use crate::config::BookingConfig;
use crate::domain::{Amount, Order, OrderStatus, Showtime};
use crate::{BoxOfficeError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundDecision {
    pub eligible: bool,
    pub refund_amount: Amount,
    pub fee_applied: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundPolicy {
    pub full_refund_window: Duration,
    pub partial_refund_percent: i64,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            full_refund_window: Duration::hours(2),
            partial_refund_percent: 80,
        }
    }
}

impl TryFrom<&BookingConfig> for RefundPolicy {
    type Error = BoxOfficeError;

    fn try_from(config: &BookingConfig) -> Result<Self> {
        config.validate()?;
        let full_refund_window = Duration::try_minutes(config.full_refund_window_minutes).ok_or_else(|| {
            BoxOfficeError::InvalidArgument(format!(
                "full_refund_window_minutes out of range: {}",
                config.full_refund_window_minutes
            ))
        })?;
        Ok(Self {
            full_refund_window,
            partial_refund_percent: config.partial_refund_percent,
        })
    }
}

impl RefundPolicy {
    /// Only paid orders can be evaluated; any other status is an error,
    /// not an ineligible decision.
    pub fn evaluate(&self, order: &Order, showtime: &Showtime, now: DateTime<Utc>) -> Result<RefundDecision> {
        if order.status != OrderStatus::Paid {
            return Err(BoxOfficeError::OrderNotRefundable {
                order_id: order.order_id.clone(),
                status: order.status,
            });
        }

        let until_start = showtime.start_time - now;

        if until_start >= self.full_refund_window {
            Ok(RefundDecision {
                eligible: true,
                refund_amount: order.total_price,
                fee_applied: false,
                reason: "full refund".to_string(),
            })
        } else if now < showtime.start_time {
            // Amounts are non-negative, so integer division floors.
            let refund_amount = order
                .total_price
                .checked_mul(self.partial_refund_percent)
                .map(|scaled| scaled / 100)
                .ok_or_else(|| {
                    BoxOfficeError::InvalidArgument(format!(
                        "Refund for order {} overflows: {} x {}%",
                        order.order_id, order.total_price, self.partial_refund_percent
                    ))
                })?;
            Ok(RefundDecision {
                eligible: true,
                refund_amount,
                fee_applied: true,
                reason: format!(
                    "partial refund ({}%) within {} minutes of showtime",
                    self.partial_refund_percent,
                    self.full_refund_window.num_minutes()
                ),
            })
        } else {
            Ok(RefundDecision {
                eligible: false,
                refund_amount: 0,
                fee_applied: false,
                reason: "showtime has already started".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Theater, TicketType};
    use std::collections::{BTreeMap, BTreeSet};

    fn fixture(now: DateTime<Utc>, starts_in: Duration, total: Amount) -> (Order, Showtime) {
        let theater = Theater {
            theater_id: "hall-1".to_string(),
            name: "Hall 1".to_string(),
            row_count: 1,
            col_count: 2,
            equipment: vec![],
            vip_rows: BTreeSet::new(),
            couple_rows: BTreeSet::new(),
        };
        let start = now + starts_in;
        let showtime = Showtime::schedule(
            "show-1".to_string(),
            "movie-1".to_string(),
            &theater,
            start,
            start + Duration::hours(2),
            BTreeMap::from([(TicketType::Normal, total / 2)]),
        );
        let mut order = Order::new(
            Some("user-1".to_string()),
            showtime.showtime_id.clone(),
            vec!["A1".to_string(), "A2".to_string()],
            TicketType::Normal,
            total,
            None,
            now,
        );
        order.mark_paid(now).unwrap();
        (order, showtime)
    }

    #[test]
    fn full_refund_three_hours_out() {
        let now = Utc::now();
        let (order, showtime) = fixture(now, Duration::hours(3), 100);
        let decision = RefundPolicy::default().evaluate(&order, &showtime, now).unwrap();
        assert!(decision.eligible);
        assert_eq!(decision.refund_amount, 100);
        assert!(!decision.fee_applied);
    }

    #[test]
    fn exactly_two_hours_is_still_full() {
        let now = Utc::now();
        let (order, showtime) = fixture(now, Duration::hours(2), 100);
        let decision = RefundPolicy::default().evaluate(&order, &showtime, now).unwrap();
        assert_eq!(decision.refund_amount, 100);
        assert!(!decision.fee_applied);
    }

    #[test]
    fn partial_refund_one_hour_out() {
        let now = Utc::now();
        let (order, showtime) = fixture(now, Duration::hours(1), 100);
        let decision = RefundPolicy::default().evaluate(&order, &showtime, now).unwrap();
        assert!(decision.eligible);
        assert_eq!(decision.refund_amount, 80);
        assert!(decision.fee_applied);
    }

    #[test]
    fn partial_refund_floors() {
        let now = Utc::now();
        let (order, showtime) = fixture(now, Duration::minutes(30), 99);
        let decision = RefundPolicy::default().evaluate(&order, &showtime, now).unwrap();
        assert_eq!(decision.refund_amount, 79);
    }

    #[test]
    fn denied_after_start() {
        let now = Utc::now();
        let (order, showtime) = fixture(now, Duration::minutes(-10), 100);
        let decision = RefundPolicy::default().evaluate(&order, &showtime, now).unwrap();
        assert!(!decision.eligible);
        assert_eq!(decision.refund_amount, 0);
    }

    #[test]
    fn unpaid_orders_are_not_refundable() {
        let now = Utc::now();
        let (mut order, showtime) = fixture(now, Duration::hours(3), 100);
        order.mark_checked_in(now).unwrap();
        assert!(matches!(
            RefundPolicy::default().evaluate(&order, &showtime, now),
            Err(BoxOfficeError::OrderNotRefundable { status: OrderStatus::CheckedIn, .. })
        ));
    }

    #[test]
    fn partial_refund_overflow_is_an_error() {
        let now = Utc::now();
        let (order, showtime) = fixture(now, Duration::minutes(30), i64::MAX / 2);
        assert!(matches!(
            RefundPolicy::default().evaluate(&order, &showtime, now),
            Err(BoxOfficeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn policy_from_config_rejects_huge_window() {
        let config = BookingConfig {
            full_refund_window_minutes: i64::MAX / 2,
            ..BookingConfig::default()
        };
        assert!(RefundPolicy::try_from(&config).is_err());

        let policy = RefundPolicy::try_from(&BookingConfig::default()).unwrap();
        assert_eq!(policy, RefundPolicy::default());
    }
}
