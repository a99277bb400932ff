//! Typed task records and row normalization

pub mod normalize;

pub use normalize::{TaskRecord, normalize_row, normalize_rows, parse_flexible_date};
