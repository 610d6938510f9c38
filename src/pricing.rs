use crate::domain::{Amount, Showtime, TicketType};
use crate::{BoxOfficeError, Result};
use serde::{Deserialize, Serialize};

/// Unit price of `ticket_type` for this showtime.
pub fn price(showtime: &Showtime, ticket_type: TicketType) -> Result<Amount> {
    showtime
        .prices
        .get(&ticket_type)
        .copied()
        .ok_or(BoxOfficeError::InvalidTicketType(ticket_type))
}

pub fn total_price(showtime: &Showtime, ticket_type: TicketType, seat_count: usize) -> Result<Amount> {
    let unit = price(showtime, ticket_type)?;
    Amount::try_from(seat_count)
        .ok()
        .and_then(|count| unit.checked_mul(count))
        .ok_or_else(|| {
            BoxOfficeError::InvalidArgument(format!(
                "Total price overflows for {} x {}",
                seat_count, unit
            ))
        })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub ticket_type: TicketType,
    pub unit_price: Amount,
    pub seat_count: usize,
    pub total: Amount,
}

/// Running total for the seats currently selected.
pub fn quote(showtime: &Showtime, ticket_type: TicketType, seat_count: usize) -> Result<PriceQuote> {
    Ok(PriceQuote {
        ticket_type,
        unit_price: price(showtime, ticket_type)?,
        seat_count,
        total: total_price(showtime, ticket_type, seat_count)?,
    })
}
