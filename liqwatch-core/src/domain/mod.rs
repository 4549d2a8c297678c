//! Domain types: raw daily bars and the enriched feature table.

pub mod bar;
pub mod feature;

pub use bar::Bar;
pub use feature::{FeatureRow, FeatureTable};
