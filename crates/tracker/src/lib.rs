pub mod book;

pub use book::{PositionBook, PositionEvent};
