//! Advisory-lock keys derived from location identifiers.
//!
//! The same identifier always maps to the same key. Numeric identifiers map
//! to themselves, so two distinct numeric ids never collide. Text identifiers
//! go through Adler-32, where collisions are possible but rare.

use serde::{Deserialize, Serialize};

use crate::id::LocationId;

/// Key of a distributed advisory lock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockKey(i64);

impl LockKey {
    /// Key used when a location has no identifier at all.
    pub const NONE: LockKey = LockKey(0);

    pub fn from_raw(key: i64) -> Self {
        Self(key)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Derive the lock key for an optional location identifier.
    pub fn derive(id: Option<&LocationId>) -> Self {
        match id {
            None => Self::NONE,
            Some(LocationId::Numeric(n)) => Self(*n),
            Some(LocationId::Text(s)) => Self::from_text(s),
        }
    }

    pub fn for_location(id: &LocationId) -> Self {
        Self::derive(Some(id))
    }

    fn from_text(s: &str) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse::<i64>() {
                return Self(n);
            }
        }
        Self(i64::from(adler32(s.as_bytes())))
    }
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Adler-32 checksum (RFC 1950), the same value zlib produces.
pub fn adler32(bytes: &[u8]) -> u32 {
    adler2::adler32_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn adler32_matches_reference_vectors() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"a"), 0x0062_0062);
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn missing_id_maps_to_zero() {
        assert_eq!(LockKey::derive(None), LockKey::NONE);
        assert_eq!(LockKey::NONE.as_i64(), 0);
    }

    #[test]
    fn numeric_ids_are_used_directly() {
        assert_eq!(LockKey::for_location(&LocationId::Numeric(1234)).as_i64(), 1234);
        assert_eq!(LockKey::for_location(&LocationId::text("1234")).as_i64(), 1234);
    }

    #[test]
    fn text_ids_hash_with_adler32() {
        let id = LocationId::text("WH-EMU-1-17");
        assert_eq!(
            LockKey::for_location(&id).as_i64(),
            i64::from(adler32(b"WH-EMU-1-17"))
        );
        assert!(LockKey::for_location(&id).as_i64() > 0);
    }

    #[test]
    fn oversized_digit_strings_fall_back_to_checksum() {
        let digits = "99999999999999999999999";
        assert_eq!(
            LockKey::for_location(&LocationId::text(digits)).as_i64(),
            i64::from(adler32(digits.as_bytes()))
        );
    }

    proptest! {
        /// Distinct numeric strings never share a key.
        #[test]
        fn distinct_numeric_strings_get_distinct_keys(a in 0u32..u32::MAX, b in 0u32..u32::MAX) {
            prop_assume!(a != b);
            let ka = LockKey::for_location(&LocationId::text(a.to_string()));
            let kb = LockKey::for_location(&LocationId::text(b.to_string()));
            prop_assert_ne!(ka, kb);
        }

        /// Derivation is a pure function of the identifier.
        #[test]
        fn derivation_is_deterministic(s in "[A-Za-z0-9-]{0,24}") {
            let id = LocationId::text(s);
            prop_assert_eq!(LockKey::for_location(&id), LockKey::for_location(&id.clone()));
        }
    }
}
