use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record of a box-office action. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffOperation {
    pub operation_id: String,
    pub operation_type: OperationType,
    pub operator_id: Option<String>,
    pub order_id: Option<String>,
    pub showtime_id: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Sell,
    Check,
    Refund,
    Modify,
}

impl StaffOperation {
    pub fn new(
        operation_type: OperationType,
        operator_id: Option<String>,
        order_id: Option<String>,
        showtime_id: Option<String>,
        details: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            operation_type,
            operator_id,
            order_id,
            showtime_id,
            details,
            created_at: now,
        }
    }
}
