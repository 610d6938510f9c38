use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::showtime::{Amount, TicketType};
use crate::{BoxOfficeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BuyerInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    /// `None` for walk-up sales issued by staff.
    pub user_id: Option<String>,
    pub showtime_id: String,
    pub seats: Vec<String>,
    pub ticket_type: TicketType,
    pub total_price: Amount,
    pub status: OrderStatus,
    #[serde(default)]
    pub buyer: Option<BuyerInfo>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checked_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refunded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_amount: Option<Amount>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    CheckedIn,
    Refunded,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid)
                | (Self::Pending, Self::Cancelled)
                | (Self::Paid, Self::CheckedIn)
                | (Self::Paid, Self::Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::CheckedIn => "checked_in",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Order {
    pub fn new(
        user_id: Option<String>,
        showtime_id: String,
        seats: Vec<String>,
        ticket_type: TicketType,
        total_price: Amount,
        buyer: Option<BuyerInfo>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            showtime_id,
            seats,
            ticket_type,
            total_price,
            status: OrderStatus::Pending,
            buyer,
            created_at: now,
            paid_at: None,
            checked_in_at: None,
            refunded_at: None,
            refund_amount: None,
            cancelled_at: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }

    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(OrderStatus::Paid)?;
        self.paid_at = Some(now);
        Ok(())
    }

    pub fn mark_checked_in(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(OrderStatus::CheckedIn)?;
        self.checked_in_at = Some(now);
        Ok(())
    }

    pub fn mark_refunded(&mut self, refund_amount: Amount, now: DateTime<Utc>) -> Result<()> {
        self.transition(OrderStatus::Refunded)?;
        self.refunded_at = Some(now);
        self.refund_amount = Some(refund_amount);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(OrderStatus::Cancelled)?;
        self.cancelled_at = Some(now);
        Ok(())
    }

    /// Moves to `next` if the status table allows it; the status is left
    /// untouched on error.
    fn transition(&mut self, next: OrderStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        let order_id = self.order_id.clone();
        Err(match (self.status, next) {
            (OrderStatus::Paid, OrderStatus::Paid | OrderStatus::Cancelled) => {
                BoxOfficeError::AlreadyPaid(order_id)
            }
            (OrderStatus::CheckedIn, OrderStatus::CheckedIn) => BoxOfficeError::AlreadyCheckedIn(order_id),
            (OrderStatus::Pending, OrderStatus::CheckedIn) => BoxOfficeError::NotPaid(order_id),
            (status, OrderStatus::Refunded) => BoxOfficeError::OrderNotRefundable { order_id, status },
            (from, to) => BoxOfficeError::InvalidTransition { order_id, from, to },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Order {
        Order::new(
            Some("user-1".to_string()),
            "show-1".to_string(),
            vec!["A1".to_string(), "A2".to_string()],
            TicketType::Normal,
            200,
            None,
            Utc::now(),
        )
    }

    const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::CheckedIn,
        OrderStatus::Refunded,
        OrderStatus::Cancelled,
    ];

    fn at(status: OrderStatus) -> Order {
        let mut order = pending();
        order.status = status;
        order
    }

    fn apply(order: &mut Order, next: OrderStatus) -> Result<()> {
        let now = Utc::now();
        match next {
            OrderStatus::Paid => order.mark_paid(now),
            OrderStatus::CheckedIn => order.mark_checked_in(now),
            OrderStatus::Refunded => order.mark_refunded(50, now),
            OrderStatus::Cancelled => order.cancel(now),
            OrderStatus::Pending => unreachable!("no operation returns an order to pending"),
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in [OrderStatus::CheckedIn, OrderStatus::Refunded, OrderStatus::Cancelled] {
            for next in ALL {
                assert!(!status.can_transition_to(next));
            }
        }
    }

    #[test]
    fn operations_follow_the_status_table() {
        for from in ALL {
            for next in ALL.into_iter().filter(|s| *s != OrderStatus::Pending) {
                let mut order = at(from);
                let result = apply(&mut order, next);
                assert_eq!(result.is_ok(), from.can_transition_to(next), "{} -> {}", from, next);
                let expected = if result.is_ok() { next } else { from };
                assert_eq!(order.status, expected, "{} -> {}", from, next);
            }
        }
    }

    #[test]
    fn pay_then_check_in() {
        let mut order = pending();
        order.mark_paid(Utc::now()).unwrap();
        assert!(matches!(order.mark_paid(Utc::now()), Err(BoxOfficeError::AlreadyPaid(_))));

        order.mark_checked_in(Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::CheckedIn);
        assert!(matches!(
            order.mark_checked_in(Utc::now()),
            Err(BoxOfficeError::AlreadyCheckedIn(_))
        ));
    }

    #[test]
    fn check_in_requires_payment() {
        let mut order = pending();
        assert!(matches!(order.mark_checked_in(Utc::now()), Err(BoxOfficeError::NotPaid(_))));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.checked_in_at.is_none());
    }

    #[test]
    fn cancel_only_before_payment() {
        let mut order = pending();
        order.cancel(Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(matches!(
            order.mark_paid(Utc::now()),
            Err(BoxOfficeError::InvalidTransition { .. })
        ));

        let mut paid = pending();
        paid.mark_paid(Utc::now()).unwrap();
        assert!(matches!(paid.cancel(Utc::now()), Err(BoxOfficeError::AlreadyPaid(_))));
    }

    #[test]
    fn refund_requires_paid() {
        let mut order = pending();
        assert!(matches!(
            order.mark_refunded(100, Utc::now()),
            Err(BoxOfficeError::OrderNotRefundable { status: OrderStatus::Pending, .. })
        ));
    }
}
