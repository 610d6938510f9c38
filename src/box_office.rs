use crate::clock::{Clock, SystemClock};
use crate::config::MAX_SEATS_PER_ORDER;
use crate::domain::{
    Amount, AppContext, BuyerInfo, CurrentUser, Movie, OperationType, Order, OrderStatus, Role, Showtime,
    StaffOperation, Theater, TicketType, MAX_THEATER_COLS, MAX_THEATER_ROWS,
};
use crate::pricing::{self, PriceQuote};
use crate::refund::{RefundDecision, RefundPolicy};
use crate::seating::SeatGrid;
use crate::store::{ShowtimeDirectory, StoreBatch, TicketStore};
use crate::{BoxOfficeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShowtime {
    pub movie_id: String,
    pub theater_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub prices: BTreeMap<TicketType, Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub success: bool,
    pub message: String,
    pub refund_amount: Amount,
    pub fee_applied: bool,
    pub order: Order,
}

/// Order lifecycle over a [`TicketStore`].
///
/// Seats are claimed only when an order is paid. Every mutation that reads
/// and then writes a showtime's seats or orders runs under that showtime's
/// lock and commits as one batch.
#[derive(Clone)]
pub struct BoxOffice {
    store: TicketStore,
    clock: Arc<dyn Clock>,
}

impl BoxOffice {
    pub fn new(store: TicketStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn with_system_clock(store: TicketStore) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    pub fn store(&self) -> &TicketStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // Catalogue administration

    pub fn add_movie(&self, ctx: &AppContext, movie: Movie) -> Result<Movie> {
        require_admin(ctx)?;
        if movie.movie_id.trim().is_empty() || movie.title.trim().is_empty() {
            return Err(BoxOfficeError::InvalidArgument(
                "Movie id and title are required".to_string(),
            ));
        }
        self.store.put_movie(&movie)?;
        info!("Added movie: {} ({})", movie.title, movie.movie_id);
        Ok(movie)
    }

    pub fn add_theater(&self, ctx: &AppContext, theater: Theater) -> Result<Theater> {
        require_admin(ctx)?;
        if theater.theater_id.trim().is_empty() {
            return Err(BoxOfficeError::InvalidArgument("Theater id is required".to_string()));
        }
        if theater.row_count == 0 || theater.col_count == 0 {
            return Err(BoxOfficeError::InvalidArgument(format!(
                "Theater {} must have at least one row and column",
                theater.theater_id
            )));
        }
        if theater.row_count > MAX_THEATER_ROWS || theater.col_count > MAX_THEATER_COLS {
            return Err(BoxOfficeError::InvalidArgument(format!(
                "Theater {} is {}x{}, the largest layout is {}x{}",
                theater.theater_id, theater.row_count, theater.col_count, MAX_THEATER_ROWS, MAX_THEATER_COLS
            )));
        }
        if let Some(row) = theater
            .vip_rows
            .iter()
            .chain(theater.couple_rows.iter())
            .find(|row| **row >= theater.row_count)
        {
            return Err(BoxOfficeError::InvalidArgument(format!(
                "Seat type row {} is outside theater {}",
                row, theater.theater_id
            )));
        }
        self.store.put_theater(&theater)?;
        info!(
            "Added theater: {} ({}x{})",
            theater.theater_id, theater.row_count, theater.col_count
        );
        Ok(theater)
    }

    pub async fn schedule_showtime(&self, ctx: &AppContext, request: NewShowtime) -> Result<Showtime> {
        require_admin(ctx)?;

        if self.store.get_movie(&request.movie_id)?.is_none() {
            return Err(BoxOfficeError::MovieNotFound(request.movie_id));
        }
        let theater = self
            .store
            .get_theater(&request.theater_id)?
            .ok_or_else(|| BoxOfficeError::TheaterNotFound(request.theater_id.clone()))?;

        if request.end_time <= request.start_time {
            return Err(BoxOfficeError::InvalidArgument(
                "Showtime must end after it starts".to_string(),
            ));
        }
        if request.prices.is_empty() {
            return Err(BoxOfficeError::InvalidArgument(
                "Showtime needs at least one ticket price".to_string(),
            ));
        }
        if let Some((ticket_type, amount)) = request.prices.iter().find(|(_, amount)| **amount < 0) {
            return Err(BoxOfficeError::InvalidArgument(format!(
                "Negative price {} for {}",
                amount, ticket_type
            )));
        }

        let showtime = Showtime::schedule(
            uuid::Uuid::new_v4().to_string(),
            request.movie_id,
            &theater,
            request.start_time,
            request.end_time,
            request.prices,
        );

        let _guard = self.store.lock_showtime(&showtime.showtime_id).await;
        self.store.put_showtime(&showtime)?;

        info!(
            "Scheduled showtime {} in {} with {} seats",
            showtime.showtime_id,
            theater.theater_id,
            showtime.seats.len()
        );
        Ok(showtime)
    }

    // Browsing

    pub fn showtime(&self, showtime_id: &str) -> Result<Showtime> {
        self.store
            .get_showtime(showtime_id)?
            .ok_or_else(|| BoxOfficeError::ShowtimeNotFound(showtime_id.to_string()))
    }

    /// Seat map for a showtime. May be stale; payment re-validates.
    pub fn seat_grid(&self, showtime_id: &str, selected: &[String]) -> Result<SeatGrid> {
        let showtime = self.showtime(showtime_id)?;
        let theater = self
            .store
            .get_theater(&showtime.theater_id)?
            .ok_or_else(|| BoxOfficeError::TheaterNotFound(showtime.theater_id.clone()))?;
        SeatGrid::render(theater.row_count, theater.col_count, &showtime.seats, selected)
    }

    pub fn price(&self, showtime_id: &str, ticket_type: TicketType) -> Result<Amount> {
        pricing::price(&self.showtime(showtime_id)?, ticket_type)
    }

    pub fn quote(&self, showtime_id: &str, ticket_type: TicketType, seat_count: usize) -> Result<PriceQuote> {
        pricing::quote(&self.showtime(showtime_id)?, ticket_type, seat_count)
    }

    pub fn get_order(&self, ctx: &AppContext, order_id: &str) -> Result<Order> {
        let user = require_user(ctx)?;
        let order = self.load_order(order_id)?;
        authorize_order(user, &order)?;
        Ok(order)
    }

    pub fn list_orders_for_user(&self, ctx: &AppContext) -> Result<Vec<Order>> {
        let user = require_user(ctx)?;
        Ok(self
            .store
            .list_orders()?
            .into_iter()
            .filter(|order| order.is_owned_by(&user.id))
            .collect())
    }

    pub fn list_orders_for_showtime(&self, ctx: &AppContext, showtime_id: &str) -> Result<Vec<Order>> {
        require_box_office(ctx)?;
        Ok(self
            .store
            .list_orders()?
            .into_iter()
            .filter(|order| order.showtime_id == showtime_id)
            .collect())
    }

    pub fn list_operations(&self, ctx: &AppContext) -> Result<Vec<StaffOperation>> {
        require_box_office(ctx)?;
        self.store.list_operations()
    }

    // Order lifecycle

    /// Records a pending order. Seats stay available until payment.
    pub async fn create_order(
        &self,
        ctx: &AppContext,
        showtime_id: &str,
        seat_ids: Vec<String>,
        ticket_type: TicketType,
        buyer: Option<BuyerInfo>,
    ) -> Result<Order> {
        let user = require_user(ctx)?;
        validate_seat_ids(&seat_ids, ctx.config.max_seats_per_order.min(MAX_SEATS_PER_ORDER))?;

        let showtime = self.showtime(showtime_id)?;
        let now = self.clock.now();
        if showtime.has_started(now) {
            return Err(BoxOfficeError::ShowtimeStarted(showtime_id.to_string()));
        }

        for seat_id in &seat_ids {
            let seat = showtime
                .seat(seat_id)
                .ok_or_else(|| BoxOfficeError::SeatNotFound(seat_id.clone()))?;
            if !seat.available {
                warn!("Seat {} already sold for showtime {}", seat_id, showtime_id);
                return Err(BoxOfficeError::SeatUnavailable {
                    seat_id: seat_id.clone(),
                });
            }
        }

        let total_price = pricing::total_price(&showtime, ticket_type, seat_ids.len())?;
        let user_id = match user.role {
            Role::Customer => Some(user.id.clone()),
            Role::Staff | Role::Admin => None,
        };

        let order = Order::new(
            user_id,
            showtime_id.to_string(),
            seat_ids,
            ticket_type,
            total_price,
            buyer,
            now,
        );
        self.store.put_order(&order)?;

        info!(
            "Created order {} for showtime {}: {:?} x {} = {}",
            order.order_id, showtime_id, order.seats, ticket_type, total_price
        );
        Ok(order)
    }

    /// Simulated payment: claims every seat of the order or fails without changes.
    pub async fn confirm_payment(&self, ctx: &AppContext, order_id: &str) -> Result<Order> {
        let user = require_user(ctx)?;
        let showtime_id = {
            let order = self.load_order(order_id)?;
            authorize_order(user, &order)?;
            order.showtime_id
        };

        let _guard = self.store.lock_showtime(&showtime_id).await;
        let mut order = self.load_order(order_id)?;
        let mut showtime = self.showtime(&showtime_id)?;
        let now = self.clock.now();

        order.mark_paid(now)?;
        if showtime.has_started(now) {
            return Err(BoxOfficeError::ShowtimeStarted(showtime_id));
        }

        for seat_id in &order.seats {
            let seat = showtime
                .seat(seat_id)
                .ok_or_else(|| BoxOfficeError::SeatNotFound(seat_id.clone()))?;
            if !seat.available {
                warn!(
                    "Payment for order {} lost seat {} on showtime {}",
                    order_id, seat_id, showtime_id
                );
                return Err(BoxOfficeError::SeatUnavailable {
                    seat_id: seat_id.clone(),
                });
            }
        }
        for seat_id in &order.seats {
            if let Some(seat) = showtime.seat_mut(seat_id) {
                seat.available = false;
            }
        }

        let mut batch = StoreBatch::new();
        self.store.batch_order(&mut batch, &order)?;
        self.store.batch_showtime(&mut batch, &showtime)?;
        if user.role.is_box_office() {
            let operation = StaffOperation::new(
                OperationType::Sell,
                Some(user.id.clone()),
                Some(order.order_id.clone()),
                Some(showtime_id.clone()),
                json!({
                    "seats": order.seats,
                    "ticket_type": order.ticket_type,
                    "total_price": order.total_price,
                }),
                now,
            );
            self.store.batch_operation(&mut batch, &operation)?;
        }
        self.store.commit(batch)?;

        info!("Order {} paid, seats {:?} sold", order_id, order.seats);
        Ok(order)
    }

    pub async fn check_in(&self, ctx: &AppContext, order_id: &str) -> Result<Order> {
        let staff = require_box_office(ctx)?;
        let showtime_id = self.load_order(order_id)?.showtime_id;

        let _guard = self.store.lock_showtime(&showtime_id).await;
        let mut order = self.load_order(order_id)?;
        let now = self.clock.now();
        order.mark_checked_in(now)?;

        let operation = StaffOperation::new(
            OperationType::Check,
            Some(staff.id.clone()),
            Some(order.order_id.clone()),
            Some(showtime_id),
            json!({ "seats": order.seats }),
            now,
        );
        let mut batch = StoreBatch::new();
        self.store.batch_order(&mut batch, &order)?;
        self.store.batch_operation(&mut batch, &operation)?;
        self.store.commit(batch)?;

        info!("Order {} checked in by {}", order_id, staff.id);
        Ok(order)
    }

    /// Drops an unpaid order. Paid orders go through [`BoxOffice::refund_ticket`].
    pub async fn cancel_order(&self, ctx: &AppContext, order_id: &str) -> Result<Order> {
        let user = require_user(ctx)?;
        let showtime_id = {
            let order = self.load_order(order_id)?;
            authorize_order(user, &order)?;
            order.showtime_id
        };

        let _guard = self.store.lock_showtime(&showtime_id).await;
        let mut order = self.load_order(order_id)?;
        let now = self.clock.now();
        order.cancel(now)?;

        let mut batch = StoreBatch::new();
        self.store.batch_order(&mut batch, &order)?;
        if user.role.is_box_office() {
            let operation = StaffOperation::new(
                OperationType::Modify,
                Some(user.id.clone()),
                Some(order.order_id.clone()),
                Some(showtime_id),
                json!({ "action": "cancel", "status": OrderStatus::Cancelled }),
                now,
            );
            self.store.batch_operation(&mut batch, &operation)?;
        }
        self.store.commit(batch)?;

        info!("Order {} cancelled", order_id);
        Ok(order)
    }

    pub async fn refund_ticket(&self, ctx: &AppContext, order_id: &str, reason: &str) -> Result<RefundReceipt> {
        let user = require_user(ctx)?;
        let showtime_id = {
            let order = self.load_order(order_id)?;
            authorize_order(user, &order)?;
            order.showtime_id
        };

        let _guard = self.store.lock_showtime(&showtime_id).await;
        let mut order = self.load_order(order_id)?;
        let mut showtime = self.showtime(&showtime_id)?;
        let now = self.clock.now();

        let policy = RefundPolicy::try_from(ctx.config.as_ref())?;
        let RefundDecision {
            eligible,
            refund_amount,
            fee_applied,
            reason: decision_reason,
        } = policy.evaluate(&order, &showtime, now)?;

        if !eligible {
            warn!("Refund denied for order {}: {}", order_id, decision_reason);
            return Err(BoxOfficeError::RefundWindowClosed {
                order_id: order_id.to_string(),
                reason: decision_reason,
            });
        }

        order.mark_refunded(refund_amount, now)?;
        for seat_id in &order.seats {
            let seat = showtime
                .seat_mut(seat_id)
                .ok_or_else(|| BoxOfficeError::SeatNotFound(seat_id.clone()))?;
            seat.available = true;
        }

        let operation = StaffOperation::new(
            OperationType::Refund,
            Some(user.id.clone()),
            Some(order.order_id.clone()),
            Some(showtime_id),
            json!({
                "reason": reason,
                "refund_amount": refund_amount,
                "fee_applied": fee_applied,
                "original_total": order.total_price,
            }),
            now,
        );
        let mut batch = StoreBatch::new();
        self.store.batch_order(&mut batch, &order)?;
        self.store.batch_showtime(&mut batch, &showtime)?;
        self.store.batch_operation(&mut batch, &operation)?;
        self.store.commit(batch)?;

        info!(
            "Order {} refunded {} (fee applied: {}), seats {:?} released",
            order_id, refund_amount, fee_applied, order.seats
        );

        let message = if fee_applied {
            format!("Refunded {} after a handling fee", refund_amount)
        } else {
            format!("Refunded {} in full", refund_amount)
        };
        Ok(RefundReceipt {
            success: true,
            message,
            refund_amount,
            fee_applied,
            order,
        })
    }

    /// Creates an order and pays for it. A failed payment cancels the draft.
    pub async fn checkout(
        &self,
        ctx: &AppContext,
        showtime_id: &str,
        seat_ids: Vec<String>,
        ticket_type: TicketType,
        buyer: Option<BuyerInfo>,
    ) -> Result<Order> {
        let draft = self
            .create_order(ctx, showtime_id, seat_ids, ticket_type, buyer)
            .await?;

        match self.confirm_payment(ctx, &draft.order_id).await {
            Ok(order) => Ok(order),
            Err(e) => {
                if let Err(cancel_err) = self.cancel_order(ctx, &draft.order_id).await {
                    warn!(
                        "Failed to cancel draft order {} after payment error: {}",
                        draft.order_id, cancel_err
                    );
                }
                Err(e)
            }
        }
    }

    fn load_order(&self, order_id: &str) -> Result<Order> {
        self.store
            .get_order(order_id)?
            .ok_or_else(|| BoxOfficeError::OrderNotFound(order_id.to_string()))
    }
}

fn require_user(ctx: &AppContext) -> Result<&CurrentUser> {
    ctx.current_user
        .as_ref()
        .ok_or_else(|| BoxOfficeError::Forbidden("sign in required".to_string()))
}

fn require_box_office(ctx: &AppContext) -> Result<&CurrentUser> {
    let user = require_user(ctx)?;
    match user.role {
        Role::Staff | Role::Admin => Ok(user),
        Role::Customer => Err(BoxOfficeError::Forbidden(
            "box office staff only".to_string(),
        )),
    }
}

fn require_admin(ctx: &AppContext) -> Result<&CurrentUser> {
    let user = require_user(ctx)?;
    match user.role {
        Role::Admin => Ok(user),
        Role::Customer | Role::Staff => Err(BoxOfficeError::Forbidden("admin only".to_string())),
    }
}

/// Customers only see their own orders; others look like they do not exist.
fn authorize_order(user: &CurrentUser, order: &Order) -> Result<()> {
    match user.role {
        Role::Staff | Role::Admin => Ok(()),
        Role::Customer if order.is_owned_by(&user.id) => Ok(()),
        Role::Customer => Err(BoxOfficeError::OrderNotFound(order.order_id.clone())),
    }
}

fn validate_seat_ids(seat_ids: &[String], max: usize) -> Result<()> {
    if seat_ids.is_empty() || seat_ids.len() > max {
        return Err(BoxOfficeError::InvalidSeatCount {
            count: seat_ids.len(),
            max,
        });
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = seat_ids.iter().find(|id| !seen.insert(id.as_str())) {
        return Err(BoxOfficeError::InvalidArgument(format!(
            "Seat {} selected more than once",
            duplicate
        )));
    }
    Ok(())
}
