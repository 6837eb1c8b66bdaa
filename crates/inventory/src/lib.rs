//! Inventory scanning rules.
//!
//! What a robot reports when it looks at a shelf: stock status classification
//! and the randomized discrepancies injected to emulate real sensing errors.
//! Pure logic; randomness is always supplied by the caller.

pub mod discrepancy;
pub mod scan;

pub use discrepancy::{DiscrepancyPolicy, FALSE_POSITIVE_PROBABILITY};
pub use scan::{ProductSnapshot, ScanResult, StockStatus};
