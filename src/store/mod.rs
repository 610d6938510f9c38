#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;
pub mod state_store;
pub mod ticket_store;

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::*;
pub use state_store::*;
pub use ticket_store::*;
