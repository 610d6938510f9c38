pub mod box_office;
pub mod clock;
pub mod config;
pub mod config_parser;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod pricing;
pub mod refund;
pub mod retry;
pub mod seating;
pub mod shutdown;
pub mod store;

pub use box_office::*;
pub use clock::*;
pub use config::*;
pub use config_parser::*;
pub use domain::*;
pub use error::*;
pub use refund::*;
pub use seating::*;
pub use store::*;
