// Key namespaces inside the state store
pub struct Stores;

impl Stores {
    pub const MOVIE: &'static str = "movie";
    pub const THEATER: &'static str = "theater";
    pub const SHOWTIME: &'static str = "showtime";
    pub const ORDER: &'static str = "order";
    pub const OPERATION: &'static str = "operation";
}

// Utility functions for key generation
pub fn store_key(store: &str, id: &str) -> String {
    format!("{}#{}", store, id)
}

pub fn store_prefix(store: &str) -> String {
    format!("{}#", store)
}

/// Operations sort by creation time when scanned in key order.
pub fn operation_key(created_at_millis: i64, operation_id: &str) -> String {
    store_key(
        Stores::OPERATION,
        &format!("{:020}#{}", created_at_millis.max(0), operation_id),
    )
}
