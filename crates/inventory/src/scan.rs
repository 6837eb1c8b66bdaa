use serde::{Deserialize, Serialize};

use scanfleet_core::ValueObject;

/// Stock classification attached to every scan result.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Ok,
    LowStock,
    Critical,
}

impl StockStatus {
    /// Classification of a truthfully counted quantity:
    /// more than 20 is OK, 5 through 20 is LOW_STOCK, below 5 is CRITICAL.
    pub fn for_quantity(quantity: u32) -> Self {
        match quantity {
            q if q > 20 => Self::Ok,
            q if q >= 5 => Self::LowStock,
            _ => Self::Critical,
        }
    }

    /// Classification used after a miscount: anything under 10 looks low.
    pub fn for_miscount(quantity: u32) -> Self {
        if quantity < 10 { Self::LowStock } else { Self::Ok }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::LowStock => "LOW_STOCK",
            Self::Critical => "CRITICAL",
        }
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known quantity of one product at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_code: String,
    pub name: String,
    pub quantity: i64,
}

impl ProductSnapshot {
    pub fn new(product_code: impl Into<String>, name: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_code: product_code.into(),
            name: name.into(),
            quantity,
        }
    }
}

/// One product observed during a scan. Transmitted, never persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub product_code: String,
    pub product_name: String,
    pub quantity: u32,
    pub status_code: StockStatus,
}

impl ValueObject for ScanResult {}
