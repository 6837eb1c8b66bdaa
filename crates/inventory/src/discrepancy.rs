//! Discrepancy injection.
//!
//! Each product at a location draws one uniform sample and falls into exactly
//! one bucket, checked in order: missing, swapped, miscounted, or reported
//! truthfully. The three probabilities must sum to at most 1; the remainder
//! is the truthful bucket.

use rand::Rng;
use serde::{Deserialize, Serialize};

use scanfleet_core::{DomainError, DomainResult};

use crate::scan::{ProductSnapshot, ScanResult, StockStatus};

/// Chance of a phantom detection when a location holds no products.
pub const FALSE_POSITIVE_PROBABILITY: f64 = 0.02;

/// Maximum relative error applied by a miscount.
const COUNT_ERROR_SPREAD: f64 = 0.2;

/// Probabilities for each kind of injected discrepancy.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyPolicy {
    p_missing: f64,
    p_swapped: f64,
    p_count_error: f64,
}

impl Default for DiscrepancyPolicy {
    fn default() -> Self {
        Self {
            p_missing: 0.03,
            p_swapped: 0.01,
            p_count_error: 0.06,
        }
    }
}

impl DiscrepancyPolicy {
    pub fn new(p_missing: f64, p_swapped: f64, p_count_error: f64) -> DomainResult<Self> {
        for (name, p) in [
            ("p_missing", p_missing),
            ("p_swapped", p_swapped),
            ("p_count_error", p_count_error),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(DomainError::validation(format!(
                    "{name} must be within [0, 1], got {p}"
                )));
            }
        }
        let total = p_missing + p_swapped + p_count_error;
        if total > 1.0 + f64::EPSILON {
            return Err(DomainError::validation(format!(
                "discrepancy probabilities sum to {total}, must be at most 1"
            )));
        }
        Ok(Self {
            p_missing,
            p_swapped,
            p_count_error,
        })
    }

    /// A policy that never corrupts anything.
    pub fn truthful() -> Self {
        Self {
            p_missing: 0.0,
            p_swapped: 0.0,
            p_count_error: 0.0,
        }
    }

    pub fn p_missing(&self) -> f64 {
        self.p_missing
    }

    pub fn p_swapped(&self) -> f64 {
        self.p_swapped
    }

    pub fn p_count_error(&self) -> f64 {
        self.p_count_error
    }

    /// Build the scan results for everything observed at one location.
    ///
    /// An empty location yields nothing, except for the occasional phantom
    /// product (see [`FALSE_POSITIVE_PROBABILITY`]).
    pub fn scan<R: Rng + ?Sized>(&self, products: &[ProductSnapshot], rng: &mut R) -> Vec<ScanResult> {
        if products.is_empty() {
            return if rng.gen_bool(FALSE_POSITIVE_PROBABILITY) {
                vec![false_positive(rng)]
            } else {
                Vec::new()
            };
        }
        products.iter().map(|p| self.scan_product(p, rng)).collect()
    }

    /// Report a single product, possibly corrupted.
    pub fn scan_product<R: Rng + ?Sized>(&self, product: &ProductSnapshot, rng: &mut R) -> ScanResult {
        let base = clamp_quantity(product.quantity);
        let roll: f64 = rng.r#gen();

        if roll < self.p_missing {
            return ScanResult {
                product_code: product.product_code.clone(),
                product_name: product.name.clone(),
                quantity: 0,
                status_code: StockStatus::Critical,
            };
        }

        if roll < self.p_missing + self.p_swapped {
            return ScanResult {
                product_code: format!("{}-SWAP", product.product_code),
                product_name: format!("{} (swapped)", product.name),
                quantity: rng.gen_range(1..=10),
                status_code: StockStatus::Ok,
            };
        }

        if roll < self.p_missing + self.p_swapped + self.p_count_error {
            let quantity = miscount(base, rng);
            return ScanResult {
                product_code: product.product_code.clone(),
                product_name: product.name.clone(),
                quantity,
                status_code: StockStatus::for_miscount(quantity),
            };
        }

        ScanResult {
            product_code: product.product_code.clone(),
            product_name: product.name.clone(),
            quantity: base,
            status_code: StockStatus::for_quantity(base),
        }
    }
}

fn clamp_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity.max(0)).unwrap_or(u32::MAX)
}

/// Perturb `base` by up to ±20%, truncating toward zero, never below 0.
fn miscount<R: Rng + ?Sized>(base: u32, rng: &mut R) -> u32 {
    let base_f = f64::from(base);
    let factor = rng.gen_range(-COUNT_ERROR_SPREAD..=COUNT_ERROR_SPREAD);
    let delta = (base_f * factor).max(-base_f).trunc();
    (base_f + delta).max(0.0) as u32
}

fn false_positive<R: Rng + ?Sized>(rng: &mut R) -> ScanResult {
    let code = format!("SKU-FP-{}", rng.gen_range(1000..=9999));
    ScanResult {
        product_name: format!("FP {code}"),
        product_code: code,
        quantity: rng.gen_range(1..=5),
        status_code: StockStatus::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn shelf() -> Vec<ProductSnapshot> {
        vec![
            ProductSnapshot::new("SKU-0001", "Product 1", 25),
            ProductSnapshot::new("SKU-0002", "Product 2", 10),
            ProductSnapshot::new("SKU-0003", "Product 3", 3),
        ]
    }

    #[test]
    fn rejects_probabilities_above_one() {
        assert!(DiscrepancyPolicy::new(0.5, 0.4, 0.2).is_err());
        assert!(DiscrepancyPolicy::new(-0.1, 0.0, 0.0).is_err());
        assert!(DiscrepancyPolicy::new(1.0, 0.0, 0.0).is_ok());
        assert!(DiscrepancyPolicy::new(0.3, 0.3, 0.4).is_ok());
    }

    #[test]
    fn certain_missing_reports_zero_critical() {
        let policy = DiscrepancyPolicy::new(1.0, 0.0, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let results = policy.scan(&shelf(), &mut rng);
            assert_eq!(results.len(), 3);
            for r in results {
                assert_eq!(r.quantity, 0);
                assert_eq!(r.status_code, StockStatus::Critical);
            }
        }
    }

    #[test]
    fn certain_swap_reports_swapped_code() {
        let policy = DiscrepancyPolicy::new(0.0, 1.0, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let results = policy.scan(&shelf(), &mut rng);
        for (r, p) in results.iter().zip(shelf()) {
            assert_eq!(r.product_code, format!("{}-SWAP", p.product_code));
            assert_eq!(r.product_name, format!("{} (swapped)", p.name));
            assert!((1..=10).contains(&r.quantity));
            assert_eq!(r.status_code, StockStatus::Ok);
        }
    }

    #[test]
    fn truthful_policy_classifies_by_quantity() {
        let policy = DiscrepancyPolicy::truthful();
        let mut rng = StdRng::seed_from_u64(3);
        let results = policy.scan(&shelf(), &mut rng);
        let statuses: Vec<_> = results.iter().map(|r| (r.quantity, r.status_code)).collect();
        assert_eq!(
            statuses,
            vec![
                (25, StockStatus::Ok),
                (10, StockStatus::LowStock),
                (3, StockStatus::Critical),
            ]
        );
    }

    #[test]
    fn negative_store_quantities_are_clamped() {
        let policy = DiscrepancyPolicy::truthful();
        let mut rng = StdRng::seed_from_u64(3);
        let r = policy.scan_product(&ProductSnapshot::new("SKU-9", "Nine", -4), &mut rng);
        assert_eq!(r.quantity, 0);
        assert_eq!(r.status_code, StockStatus::Critical);
    }

    #[test]
    fn empty_location_rarely_reports_phantoms() {
        let policy = DiscrepancyPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut phantoms = 0;
        for _ in 0..10_000 {
            let results = policy.scan(&[], &mut rng);
            assert!(results.len() <= 1);
            for r in results {
                phantoms += 1;
                assert!(r.product_code.starts_with("SKU-FP-"));
                assert_eq!(r.product_name, format!("FP {}", r.product_code));
                assert!((1..=5).contains(&r.quantity));
            }
        }
        // 2% of 10k, with a wide margin.
        assert!((100..=320).contains(&phantoms), "phantoms = {phantoms}");
    }

    proptest! {
        /// A miscount stays within 20% of the true count.
        #[test]
        fn miscount_stays_within_spread(base in 0u32..10_000, seed in any::<u64>()) {
            let policy = DiscrepancyPolicy::new(0.0, 0.0, 1.0).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let r = policy.scan_product(&ProductSnapshot::new("SKU", "P", i64::from(base)), &mut rng);
            let spread = (f64::from(base) * COUNT_ERROR_SPREAD).floor() as u32;
            prop_assert!(r.quantity + spread >= base);
            prop_assert!(r.quantity <= base + spread);
            prop_assert_eq!(r.status_code, StockStatus::for_miscount(r.quantity));
        }
    }
}
