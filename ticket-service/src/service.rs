use box_office::metrics::Metrics;
use box_office::pricing::PriceQuote;
use box_office::retry::retry_store_operation;
use box_office::{
    AppContext, BookingConfig, BoxOffice, BoxOfficeError, CurrentUser, Movie, NewShowtime, Order,
    RefundReceipt, Result, SeatGrid, Showtime, ShowtimeDirectory, StaffOperation, Theater,
    TicketType,
};
use crate::{MovieRequest, OrderRequest, ShowtimeQuery, ShowtimeRequest, TheaterRequest};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct TicketService {
    box_office: BoxOffice,
    booking: Arc<BookingConfig>,
    metrics: Arc<Metrics>,
}

impl TicketService {
    pub fn new(box_office: BoxOffice, booking: BookingConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            box_office,
            booking: Arc::new(booking),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn context(&self, current_user: Option<CurrentUser>) -> AppContext {
        AppContext::new(current_user, Arc::clone(&self.booking))
    }

    pub fn create_movie(&self, ctx: &AppContext, request: MovieRequest) -> Result<Movie> {
        let movie = Movie {
            movie_id: request.movie_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: request.title,
            duration_minutes: request.duration_minutes,
            rating: request.rating,
            genres: request.genres,
        };
        self.box_office.add_movie(ctx, movie)
    }

    pub fn create_theater(&self, ctx: &AppContext, request: TheaterRequest) -> Result<Theater> {
        let theater = Theater {
            theater_id: request.theater_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: request.name,
            row_count: request.row_count,
            col_count: request.col_count,
            equipment: request.equipment,
            vip_rows: request.vip_rows.into_iter().collect(),
            couple_rows: request.couple_rows.into_iter().collect(),
        };
        self.box_office.add_theater(ctx, theater)
    }

    pub async fn schedule_showtime(&self, ctx: &AppContext, request: ShowtimeRequest) -> Result<Showtime> {
        info!("Scheduling showtime of {} in {}", request.movie_id, request.theater_id);

        let mut prices = BTreeMap::new();
        for (name, amount) in request.prices {
            prices.insert(parse_ticket_type(&name)?, amount);
        }

        let new_showtime = NewShowtime {
            movie_id: request.movie_id,
            theater_id: request.theater_id,
            start_time: parse_timestamp(&request.start_time)?,
            end_time: parse_timestamp(&request.end_time)?,
            prices,
        };
        self.box_office.schedule_showtime(ctx, new_showtime).await
    }

    pub async fn list_movies(&self) -> Result<Vec<Movie>> {
        let store = self.box_office.store();
        retry_store_operation("list_movies", move || async move { store.list_movies() }).await
    }

    pub async fn list_showtimes(&self, query: ShowtimeQuery) -> Result<Vec<Showtime>> {
        let date = query.date.as_deref().map(parse_date).transpose()?;
        let store = self.box_office.store();

        let mut showtimes = match &query.movie_id {
            Some(movie_id) => {
                retry_store_operation("list_showtimes_by_movie", move || async move {
                    store.list_showtimes_by_movie(movie_id)
                })
                .await?
            }
            None => {
                retry_store_operation("list_showtimes", move || async move { store.list_showtimes() })
                    .await?
            }
        };
        if let Some(date) = date {
            showtimes.retain(|s| s.date() == date);
        }
        Ok(showtimes)
    }

    pub async fn get_showtime(&self, showtime_id: &str) -> Result<Showtime> {
        let office = &self.box_office;
        retry_store_operation("get_showtime", move || async move { office.showtime(showtime_id) }).await
    }

    pub async fn seat_grid(&self, showtime_id: &str, selected: &[String]) -> Result<SeatGrid> {
        let office = &self.box_office;
        retry_store_operation("seat_grid", move || async move {
            office.seat_grid(showtime_id, selected)
        })
        .await
    }

    pub async fn quote(&self, showtime_id: &str, ticket_type: &str, seats: usize) -> Result<PriceQuote> {
        let ticket_type = parse_ticket_type(ticket_type)?;
        let office = &self.box_office;
        retry_store_operation("quote", move || async move {
            office.quote(showtime_id, ticket_type, seats)
        })
        .await
    }

    pub async fn get_order(&self, ctx: &AppContext, order_id: &str) -> Result<Order> {
        let office = &self.box_office;
        retry_store_operation("get_order", move || async move { office.get_order(ctx, order_id) }).await
    }

    pub async fn list_my_orders(&self, ctx: &AppContext) -> Result<Vec<Order>> {
        let office = &self.box_office;
        retry_store_operation("list_orders_for_user", move || async move {
            office.list_orders_for_user(ctx)
        })
        .await
    }

    pub async fn list_showtime_orders(&self, ctx: &AppContext, showtime_id: &str) -> Result<Vec<Order>> {
        let office = &self.box_office;
        retry_store_operation("list_orders_for_showtime", move || async move {
            office.list_orders_for_showtime(ctx, showtime_id)
        })
        .await
    }

    pub async fn list_operations(&self, ctx: &AppContext) -> Result<Vec<StaffOperation>> {
        let office = &self.box_office;
        retry_store_operation("list_operations", move || async move { office.list_operations(ctx) })
            .await
    }

    pub async fn create_order(&self, ctx: &AppContext, request: OrderRequest) -> Result<Order> {
        let ticket_type = parse_ticket_type(&request.ticket_type)?;
        let result = self
            .box_office
            .create_order(ctx, &request.showtime_id, request.seats, ticket_type, request.buyer)
            .await;
        match &result {
            Ok(_) => self.metrics.record_order_created(),
            Err(e) => self.metrics.record_failure(e),
        }
        result
    }

    pub async fn checkout(&self, ctx: &AppContext, request: OrderRequest) -> Result<Order> {
        let ticket_type = parse_ticket_type(&request.ticket_type)?;
        let result = self
            .box_office
            .checkout(ctx, &request.showtime_id, request.seats, ticket_type, request.buyer)
            .await;
        self.metrics
            .record_payment(result.as_ref().map(|order| order.seats.len()));
        if result.is_ok() {
            self.metrics.record_order_created();
        }
        result
    }

    pub async fn confirm_payment(&self, ctx: &AppContext, order_id: &str) -> Result<Order> {
        let result = self.box_office.confirm_payment(ctx, order_id).await;
        self.metrics
            .record_payment(result.as_ref().map(|order| order.seats.len()));
        result
    }

    pub async fn check_in(&self, ctx: &AppContext, order_id: &str) -> Result<Order> {
        let order = self.box_office.check_in(ctx, order_id).await?;
        self.metrics.record_check_in();
        Ok(order)
    }

    pub async fn cancel_order(&self, ctx: &AppContext, order_id: &str) -> Result<Order> {
        let order = self.box_office.cancel_order(ctx, order_id).await?;
        self.metrics.record_cancellation();
        Ok(order)
    }

    pub async fn refund(&self, ctx: &AppContext, order_id: &str, reason: &str) -> Result<RefundReceipt> {
        let receipt = self.box_office.refund_ticket(ctx, order_id, reason).await?;
        self.metrics.record_refund(receipt.refund_amount);
        Ok(receipt)
    }
}

fn parse_ticket_type(value: &str) -> Result<TicketType> {
    TicketType::parse(value)
        .ok_or_else(|| BoxOfficeError::InvalidArgument(format!("Invalid ticket type: {}", value)))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| BoxOfficeError::InvalidArgument(format!("Invalid date (expected YYYY-MM-DD): {}", value)))
}

fn parse_timestamp(timestamp_str: &str) -> Result<DateTime<Utc>> {
    // Try parsing as ISO 8601 format first
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try parsing as timestamp millis
    if let Ok(millis) = timestamp_str.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp_millis(millis) {
            return Ok(dt);
        }
    }

    Err(BoxOfficeError::InvalidArgument(
        format!("Invalid timestamp format: {}", timestamp_str)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_accept_rfc3339_and_millis() {
        let rfc = parse_timestamp("2026-10-16T19:30:00Z").unwrap();
        let millis = parse_timestamp(&rfc.timestamp_millis().to_string()).unwrap();
        assert_eq!(rfc, millis);
        assert!(parse_timestamp("tonight").is_err());
    }

    #[test]
    fn ticket_types_parse_case_insensitively() {
        assert_eq!(parse_ticket_type("Student").unwrap(), TicketType::Student);
        assert!(parse_ticket_type("pensioner").is_err());
    }
}
