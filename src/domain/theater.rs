use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub movie_id: String,
    pub title: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Largest accepted theater layout; seat tables are allocated up front.
pub const MAX_THEATER_ROWS: u32 = 100;
pub const MAX_THEATER_COLS: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Theater {
    pub theater_id: String,
    pub name: String,
    pub row_count: u32,
    pub col_count: u32,
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Rows scheduled as VIP seating.
    #[serde(default)]
    pub vip_rows: BTreeSet<u32>,
    /// Rows scheduled as couple seating.
    #[serde(default)]
    pub couple_rows: BTreeSet<u32>,
}

impl Theater {
    pub fn capacity(&self) -> usize {
        self.row_count as usize * self.col_count as usize
    }

    pub fn seat_type_for_row(&self, row: u32) -> SeatType {
        if self.vip_rows.contains(&row) {
            SeatType::Vip
        } else if self.couple_rows.contains(&row) {
            SeatType::Couple
        } else {
            SeatType::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeatType {
    #[default]
    Normal,
    Vip,
    Couple,
}

/// Zero-based seat position inside a theater.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Seat {
    pub row: u32,
    pub col: u32,
}

impl Seat {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// `(0, 0)` is `A1`, `(26, 4)` is `AA5`.
    pub fn label(&self) -> String {
        format!("{}{}", row_label(self.row), self.col + 1)
    }
}

/// Bijective base-26 row letters: A..Z, AA..AZ, BA..
pub fn row_label(row: u32) -> String {
    let mut n = row as u64 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
