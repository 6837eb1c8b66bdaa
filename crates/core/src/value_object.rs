//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: a shelf coordinate or a single scan
/// result is defined entirely by its fields, and two of them with the same
/// fields are interchangeable.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Coordinate { zone: u32, row: u32, shelf: u32 }
///
/// impl ValueObject for Coordinate {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
