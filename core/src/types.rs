//! Shared primitive types used across the pipeline.

pub type OrderId = u64;
pub type UserId = u64;
pub type ProductId = u64;
pub type CategoryId = u64;

/// A (customer, product) key. Ordered so keyed tables iterate deterministically.
pub type PairKey = (UserId, ProductId);

/// The canonical run identifier.
pub type RunId = String;
