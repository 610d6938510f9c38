use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::theater::{Seat, SeatType, Theater};

pub type Amount = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    Normal,
    Student,
    Senior,
    Child,
    Vip,
}

impl TicketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Student => "student",
            Self::Senior => "senior",
            Self::Child => "child",
            Self::Vip => "vip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "normal" | "adult" => Some(Self::Normal),
            "student" => Some(Self::Student),
            "senior" => Some(Self::Senior),
            "child" => Some(Self::Child),
            "vip" => Some(Self::Vip),
            _ => None,
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability record for one seat of one showtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatState {
    pub seat_id: String,
    pub row: u32,
    pub col: u32,
    pub available: bool,
    #[serde(default)]
    pub seat_type: SeatType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    pub showtime_id: String,
    pub movie_id: String,
    pub theater_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub prices: BTreeMap<TicketType, Amount>,
    pub seats: Vec<SeatState>,
}

impl Showtime {
    /// Lays out a fresh, fully available seat set for `theater`.
    pub fn schedule(
        showtime_id: String,
        movie_id: String,
        theater: &Theater,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        prices: BTreeMap<TicketType, Amount>,
    ) -> Self {
        let mut seats = Vec::with_capacity(theater.capacity());
        for row in 0..theater.row_count {
            for col in 0..theater.col_count {
                seats.push(SeatState {
                    seat_id: Seat::new(row, col).label(),
                    row,
                    col,
                    available: true,
                    seat_type: theater.seat_type_for_row(row),
                });
            }
        }

        Self {
            showtime_id,
            movie_id,
            theater_id: theater.theater_id.clone(),
            start_time,
            end_time,
            prices,
            seats,
        }
    }

    pub fn seat(&self, seat_id: &str) -> Option<&SeatState> {
        self.seats.iter().find(|s| s.seat_id == seat_id)
    }

    pub fn seat_mut(&mut self, seat_id: &str) -> Option<&mut SeatState> {
        self.seats.iter_mut().find(|s| s.seat_id == seat_id)
    }

    pub fn available_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.available).count()
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }
}
