//! Things with identity.

use std::collections::HashSet;

/// Warehouses, locations and robots are entities: two records with the same
/// identifier describe the same physical thing even if their other fields
/// differ.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// Keep the first record for each identifier, preserving order.
pub fn distinct_by_id<E: Entity>(items: Vec<E>) -> Vec<E> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id().clone()))
        .collect()
}
