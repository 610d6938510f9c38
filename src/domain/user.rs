use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::BookingConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "customer" => Some(Self::Customer),
            "staff" => Some(Self::Staff),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Staff and admins work the counter: walk-up sales, check-in, any order.
    pub fn is_box_office(&self) -> bool {
        match self {
            Self::Customer => false,
            Self::Staff | Self::Admin => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Per-request context handed to every box-office operation.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub current_user: Option<CurrentUser>,
    pub config: Arc<BookingConfig>,
}

impl AppContext {
    pub fn new(current_user: Option<CurrentUser>, config: Arc<BookingConfig>) -> Self {
        Self { current_user, config }
    }

    pub fn anonymous(config: Arc<BookingConfig>) -> Self {
        Self::new(None, config)
    }
}
