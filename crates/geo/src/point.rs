/// Map-space or pixel-space point. Reused from `geo_types` so arithmetic and
/// `approx` comparisons come for free, matching the teacher crate's `rect.rs`.
pub type Point<T = f64> = geo_types::Point<T>;
