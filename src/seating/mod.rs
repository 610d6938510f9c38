pub mod grid;
pub mod selection;

pub use grid::*;
pub use selection::*;
