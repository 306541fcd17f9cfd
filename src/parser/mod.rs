pub mod date;
pub mod rows;

pub use rows::{extract_launches, Extraction};
