use crate::domain::{row_label, SeatState, SeatType};
use crate::{BoxOfficeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatCell {
    NotASeat,
    Available,
    Selected,
    Sold,
    Vip,
    Couple,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
    pub seat_id: Option<String>,
    pub cell: SeatCell,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatGrid {
    pub row_count: u32,
    pub col_count: u32,
    pub row_labels: Vec<String>,
    pub available_seats: usize,
    pub cells: Vec<Vec<GridCell>>,
}

impl SeatGrid {
    /// Lays `seats` out over a `row_count` x `col_count` theater.
    ///
    /// Positions without a seat record render as [`SeatCell::NotASeat`]. Every
    /// id in `selected` must name a seat in `seats`.
    pub fn render(
        row_count: u32,
        col_count: u32,
        seats: &[SeatState],
        selected: &[String],
    ) -> Result<Self> {
        let known: HashSet<&str> = seats.iter().map(|s| s.seat_id.as_str()).collect();
        if let Some(missing) = selected.iter().find(|id| !known.contains(id.as_str())) {
            return Err(BoxOfficeError::SeatNotFound(missing.clone()));
        }
        let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();

        let by_position: HashMap<(u32, u32), &SeatState> =
            seats.iter().map(|s| ((s.row, s.col), s)).collect();

        let mut cells = Vec::with_capacity(row_count as usize);
        for row in 0..row_count {
            let mut line = Vec::with_capacity(col_count as usize);
            for col in 0..col_count {
                let cell = match by_position.get(&(row, col)) {
                    None => GridCell {
                        row,
                        col,
                        seat_id: None,
                        cell: SeatCell::NotASeat,
                    },
                    Some(seat) => GridCell {
                        row,
                        col,
                        seat_id: Some(seat.seat_id.clone()),
                        cell: classify(seat, selected.contains(seat.seat_id.as_str())),
                    },
                };
                line.push(cell);
            }
            cells.push(line);
        }

        Ok(Self {
            row_count,
            col_count,
            row_labels: (0..row_count).map(row_label).collect(),
            available_seats: seats.iter().filter(|s| s.available).count(),
            cells,
        })
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&GridCell> {
        self.cells.get(row as usize)?.get(col as usize)
    }
}

fn classify(seat: &SeatState, selected: bool) -> SeatCell {
    if !seat.available {
        SeatCell::Sold
    } else if selected {
        SeatCell::Selected
    } else {
        match seat.seat_type {
            SeatType::Normal => SeatCell::Available,
            SeatType::Vip => SeatCell::Vip,
            SeatType::Couple => SeatCell::Couple,
        }
    }
}
