use crate::domain::{OrderStatus, TicketType};
use thiserror::Error;

/// Broad classes callers use to decide on messaging and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    TransientIo,
    Internal,
}

#[derive(Error, Debug)]
pub enum BoxOfficeError {
    #[cfg(feature = "rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDB(#[from] rocksdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid seat count: {count} (must be between 1 and {max})")]
    InvalidSeatCount { count: usize, max: usize },

    #[error("Invalid ticket type: {0} has no price for this showtime")]
    InvalidTicketType(TicketType),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Showtime not found: {0}")]
    ShowtimeNotFound(String),

    #[error("Theater not found: {0}")]
    TheaterNotFound(String),

    #[error("Movie not found: {0}")]
    MovieNotFound(String),

    #[error("Seat not found: {0}")]
    SeatNotFound(String),

    #[error("Seat {seat_id} was just taken, please reselect")]
    SeatUnavailable { seat_id: String },

    #[error("Selection is full ({target} seats already selected)")]
    SelectionFull { target: usize },

    #[error("A checkout is already in progress")]
    CheckoutInFlight,

    #[error("Showtime {0} has already started")]
    ShowtimeStarted(String),

    #[error("Order {0} is already paid")]
    AlreadyPaid(String),

    #[error("Order {0} is already checked in")]
    AlreadyCheckedIn(String),

    #[error("Order {0} has not been paid")]
    NotPaid(String),

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Order {order_id} is not refundable in status {status}")]
    OrderNotRefundable { order_id: String, status: OrderStatus },

    #[error("Refund denied for order {order_id}: {reason}")]
    RefundWindowClosed { order_id: String, reason: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl BoxOfficeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(_) => ErrorKind::TransientIo,
            Self::Io(_) | Self::StoreUnavailable(_) => ErrorKind::TransientIo,
            Self::Json(_) | Self::Config(_) | Self::Metrics(_) => ErrorKind::Internal,
            Self::InvalidSeatCount { .. }
            | Self::InvalidTicketType(_)
            | Self::InvalidArgument(_)
            | Self::SelectionFull { .. }
            | Self::CheckoutInFlight => ErrorKind::Validation,
            Self::OrderNotFound(_)
            | Self::ShowtimeNotFound(_)
            | Self::TheaterNotFound(_)
            | Self::MovieNotFound(_)
            | Self::SeatNotFound(_) => ErrorKind::NotFound,
            Self::SeatUnavailable { .. }
            | Self::ShowtimeStarted(_)
            | Self::AlreadyPaid(_)
            | Self::AlreadyCheckedIn(_)
            | Self::NotPaid(_)
            | Self::InvalidTransition { .. }
            | Self::OrderNotRefundable { .. }
            | Self::RefundWindowClosed { .. } => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
        }
    }

    /// Only store I/O failures are worth retrying; everything else is a verdict.
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "rocksdb")]
            Self::RocksDB(_) => true,
            Self::Io(_) | Self::StoreUnavailable(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BoxOfficeError>;
