use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BoxOfficeError, Result};

/// What happens when a buyer picks one seat more than they asked for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicyKind {
    /// Drop the oldest selection and keep the new one.
    #[default]
    SlidingWindow,
    /// Refuse the new seat until one is deselected.
    RejectAtCap,
}

impl SelectionPolicyKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "sliding_window" | "sliding-window" => Ok(Self::SlidingWindow),
            "reject_at_cap" | "reject-at-cap" => Ok(Self::RejectAtCap),
            other => Err(BoxOfficeError::InvalidArgument(format!(
                "Invalid selection policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    #[default]
    Memory,
    Rocksdb,
}

impl StoreBackendKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "in_memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::Rocksdb),
            other => Err(BoxOfficeError::InvalidArgument(format!(
                "Invalid store backend: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Rocksdb => f.write_str("rocksdb"),
        }
    }
}

/// Hard ceiling on seats in one order or selection; config may only lower it.
pub const MAX_SEATS_PER_ORDER: usize = 4;

/// Longest configurable full-refund window (30 days).
pub const MAX_FULL_REFUND_WINDOW_MINUTES: i64 = 30 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingConfig {
    pub max_seats_per_order: usize,
    pub selection_policy: SelectionPolicyKind,
    pub full_refund_window_minutes: i64,
    pub partial_refund_percent: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_seats_per_order: 4,
            selection_policy: SelectionPolicyKind::SlidingWindow,
            full_refund_window_minutes: 120,
            partial_refund_percent: 80,
        }
    }
}

impl BookingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SEATS_PER_ORDER).contains(&self.max_seats_per_order) {
            return Err(BoxOfficeError::InvalidArgument(format!(
                "max_seats_per_order must be between 1 and {}: {}",
                MAX_SEATS_PER_ORDER, self.max_seats_per_order
            )));
        }
        if !(0..=100).contains(&self.partial_refund_percent) {
            return Err(BoxOfficeError::InvalidArgument(format!(
                "partial_refund_percent out of range: {}",
                self.partial_refund_percent
            )));
        }
        if !(0..=MAX_FULL_REFUND_WINDOW_MINUTES).contains(&self.full_refund_window_minutes) {
            return Err(BoxOfficeError::InvalidArgument(format!(
                "full_refund_window_minutes must be between 0 and {}: {}",
                MAX_FULL_REFUND_WINDOW_MINUTES, self.full_refund_window_minutes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub application_id: String,
    pub state_dir: String,
    pub http_port: u16,
    pub store_backend: StoreBackendKind,
    pub booking: BookingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            application_id: "box-office".to_string(),
            state_dir: "/tmp/box-office".to_string(),
            http_port: 8080,
            store_backend: StoreBackendKind::Memory,
            booking: BookingConfig::default(),
        }
    }
}

/// Environment overrides, all optional. `BOX_OFFICE_HTTP_PORT=9000` etc.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    state_dir: Option<String>,
    http_port: Option<u16>,
    store_backend: Option<String>,
    max_seats_per_order: Option<usize>,
    selection_policy: Option<String>,
    full_refund_window_minutes: Option<i64>,
    partial_refund_percent: Option<i64>,
}

impl ServiceConfig {
    /// Layers `BOX_OFFICE_*` environment variables over this config.
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides_from(config::Environment::with_prefix("BOX_OFFICE"))
    }

    pub fn apply_overrides_from(mut self, source: config::Environment) -> Result<Self> {
        let overrides: EnvOverrides = config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()?
            .try_deserialize()?;

        if let Some(state_dir) = overrides.state_dir {
            self.state_dir = state_dir;
        }
        if let Some(port) = overrides.http_port {
            self.http_port = port;
        }
        if let Some(backend) = overrides.store_backend {
            self.store_backend = StoreBackendKind::parse(&backend)?;
        }
        if let Some(max) = overrides.max_seats_per_order {
            self.booking.max_seats_per_order = max;
        }
        if let Some(policy) = overrides.selection_policy {
            self.booking.selection_policy = SelectionPolicyKind::parse(&policy)?;
        }
        if let Some(minutes) = overrides.full_refund_window_minutes {
            self.booking.full_refund_window_minutes = minutes;
        }
        if let Some(percent) = overrides.partial_refund_percent {
            self.booking.partial_refund_percent = percent;
        }

        self.booking.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_limit_cannot_exceed_four() {
        let mut booking = BookingConfig::default();
        assert!(booking.validate().is_ok());

        booking.max_seats_per_order = 1;
        assert!(booking.validate().is_ok());

        booking.max_seats_per_order = 5;
        assert!(matches!(booking.validate(), Err(BoxOfficeError::InvalidArgument(_))));

        booking.max_seats_per_order = 0;
        assert!(booking.validate().is_err());
    }

    #[test]
    fn refund_window_is_bounded() {
        let mut booking = BookingConfig {
            full_refund_window_minutes: MAX_FULL_REFUND_WINDOW_MINUTES,
            ..BookingConfig::default()
        };
        assert!(booking.validate().is_ok());

        booking.full_refund_window_minutes = i64::MAX / 2;
        assert!(booking.validate().is_err());

        booking.full_refund_window_minutes = -1;
        assert!(booking.validate().is_err());
    }

    #[test]
    fn env_override_above_seat_limit_is_rejected() {
        let mut env = config::Map::new();
        env.insert("BOX_OFFICE_MAX_SEATS_PER_ORDER".to_string(), "6".to_string());
        let result = ServiceConfig::default()
            .apply_overrides_from(config::Environment::with_prefix("BOX_OFFICE").source(Some(env)));
        assert!(matches!(result, Err(BoxOfficeError::InvalidArgument(_))));
    }
}
