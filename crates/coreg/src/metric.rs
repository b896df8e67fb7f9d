//! Similarity metrics (C2): scalar "how similar are these blocks" scores
//! consumed by the local matcher. Modelled as a tagged enum rather than a
//! trait object — the set is closed, small, and dispatched per sample pair
//! in the matcher's innermost loop (spec.md §9, "Strategy objects vs.
//! tagged variants").

/// A stateless similarity metric. `find_min` tells the caller which
/// direction is "better": the first three metrics minimise, correlation
/// maximises its absolute value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimilarityMetric {
    Euclidean,
    SquaredDifference,
    Manhattan,
    Correlation,
}

impl SimilarityMetric {
    pub fn find_min(self) -> bool {
        !matches!(self, SimilarityMetric::Correlation)
    }

    /// Evaluate the metric over two equal-length `bands * samples` slices.
    /// Samples where either side is NaN are skipped entirely (not just
    /// zeroed) — they do not participate in the count either.
    pub fn evaluate(self, reference: &[f32], floating: &[f32]) -> f32 {
        debug_assert_eq!(reference.len(), floating.len());

        match self {
            SimilarityMetric::Euclidean | SimilarityMetric::SquaredDifference => {
                let mut sum_sq = 0.0f64;
                let mut n = 0u64;
                for (&r, &f) in reference.iter().zip(floating) {
                    if r.is_nan() || f.is_nan() {
                        continue;
                    }
                    let d = r as f64 - f as f64;
                    sum_sq += d * d;
                    n += 1;
                }
                if n == 0 {
                    return f32::NAN;
                }
                (sum_sq / n as f64).sqrt() as f32
            }
            SimilarityMetric::Manhattan => {
                let mut sum_abs = 0.0f64;
                let mut n = 0u64;
                for (&r, &f) in reference.iter().zip(floating) {
                    if r.is_nan() || f.is_nan() {
                        continue;
                    }
                    sum_abs += (r as f64 - f as f64).abs();
                    n += 1;
                }
                if n == 0 {
                    return f32::NAN;
                }
                (sum_abs / n as f64) as f32
            }
            SimilarityMetric::Correlation => {
                let mut sum_r = 0.0f64;
                let mut sum_f = 0.0f64;
                let mut sum_rr = 0.0f64;
                let mut sum_ff = 0.0f64;
                let mut sum_rf = 0.0f64;
                let mut n = 0u64;
                for (&r, &f) in reference.iter().zip(floating) {
                    if r.is_nan() || f.is_nan() {
                        continue;
                    }
                    let r = r as f64;
                    let f = f as f64;
                    sum_r += r;
                    sum_f += f;
                    sum_rr += r * r;
                    sum_ff += f * f;
                    sum_rf += r * f;
                    n += 1;
                }
                if n == 0 {
                    return f32::NAN;
                }
                let n = n as f64;
                let numerator = (n * sum_rf - sum_r * sum_f).abs();
                let denominator = ((n * sum_rr - sum_r * sum_r) * (n * sum_ff - sum_f * sum_f)).sqrt();
                if denominator == 0.0 {
                    return f32::NAN;
                }
                (numerator / denominator) as f32
            }
        }
    }

    /// `true` if `candidate` is at least as good as `current` under this
    /// metric's polarity (used by the matcher's extremum search).
    pub fn is_better_or_equal(self, candidate: f32, current: f32) -> bool {
        if self.find_min() {
            candidate <= current
        } else {
            candidate >= current
        }
    }

    pub fn worst_possible(self) -> f32 {
        if self.find_min() {
            f32::INFINITY
        } else {
            f32::NEG_INFINITY
        }
    }

    pub fn passes_threshold(self, value: f32, threshold: f32) -> bool {
        if value.is_nan() {
            return false;
        }
        if self.find_min() {
            value <= threshold
        } else {
            value >= threshold
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "euclidean" => Ok(SimilarityMetric::Euclidean),
            "sqdiff" => Ok(SimilarityMetric::SquaredDifference),
            "manhatten" => Ok(SimilarityMetric::Manhattan),
            "correlation" => Ok(SimilarityMetric::Correlation),
            other => Err(format!("unknown metric: {other}")),
        }
    }
}
