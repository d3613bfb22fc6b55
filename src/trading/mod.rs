//! Trade automation: the price-table compiler/evaluator that auto-answers
//! trade offers.

pub mod price_table;

pub use price_table::{PriceRange, PriceTable, PriceTableError};
