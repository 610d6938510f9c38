pub mod operation;
pub mod order;
pub mod schemas;
pub mod showtime;
pub mod theater;
pub mod user;

pub use operation::*;
pub use order::*;
pub use schemas::*;
pub use showtime::*;
pub use theater::*;
pub use user::*;
