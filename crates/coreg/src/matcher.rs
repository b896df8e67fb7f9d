//! Local matcher (C4): for one tie point, search a window x search-area
//! grid in the floating raster for the best metric value, then refine the
//! extremum to sub-pixel precision by 1-D polynomial fitting.

use geo::Raster;

use crate::metric::SimilarityMetric;
use crate::overlap::{self, read_block};
use crate::polyfit;
use crate::tiepoint::TiePoint;

/// Tunables shared by C5/C6/C7; all three call [`match_tie_point`] with the
/// same shape of configuration, differing only in whether `threshold` is
/// set (C7 passes `None`, per spec.md §4.3's "C7 skips the threshold test").
#[derive(Clone, Copy, Debug)]
pub struct MatcherConfig {
    pub half_window: i32,
    pub half_search: i32,
    pub metric: SimilarityMetric,
    pub subpixel_resolution: u32,
    pub threshold: Option<f32>,
}

/// Run the local matcher once, mutating `tie_point` in place. Returns the
/// Euclidean magnitude of the shift applied by this call (used by C6's
/// convergence check); `0.0` if the match failed the threshold test or no
/// candidate shift produced a usable overlap.
pub fn match_tie_point<R, F>(reference: &R, floating: &F, tie_point: &mut TiePoint, config: &MatcherConfig) -> f64
where
    R: Raster,
    F: Raster,
{
    let search_points = (2 * config.half_search + 1) as usize;
    let mut matrix = vec![f32::NAN; search_points * search_points];
    let mut remainders = vec![(0.0f64, 0.0f64); search_points * search_points];

    let mut best_metric = config.metric.worst_possible();
    let mut best_idx: Option<(usize, usize)> = None;

    for dy in -config.half_search..=config.half_search {
        for dx in -config.half_search..=config.half_search {
            let Some(shifted) = overlap::shifted_overlap(
                reference.geo_reference().raster_size(),
                floating.geo_reference().raster_size(),
                tie_point.x_ref,
                tie_point.y_ref,
                tie_point.x_float,
                tie_point.y_float,
                config.half_window,
                tie_point.x_shift + dx as f64,
                tie_point.y_shift + dy as f64,
            ) else {
                continue;
            };

            let Ok(reference_block) = read_block(reference, shifted.reference_window) else {
                continue;
            };
            let Ok(floating_block) = read_block(floating, shifted.floating_window) else {
                continue;
            };

            let value = config.metric.evaluate(&reference_block, &floating_block);
            if value.is_nan() {
                continue;
            }

            let xi = (dx + config.half_search) as usize;
            let yi = (dy + config.half_search) as usize;
            let cell = yi * search_points + xi;
            matrix[cell] = value;
            remainders[cell] = shifted.remainder;

            let is_better = if config.metric.find_min() {
                value < best_metric
            } else {
                value > best_metric
            };
            if is_better {
                best_metric = value;
                best_idx = Some((xi, yi));
            }
        }
    }

    let Some((best_x_idx, best_y_idx)) = best_idx else {
        tie_point.metric = f32::NAN;
        return 0.0;
    };

    let (remainder_x, remainder_y) = remainders[best_y_idx * search_points + best_x_idx];

    let (subpixel_x, metric_x) = refine_axis(&matrix, search_points, best_x_idx, best_y_idx, true, config);
    let (subpixel_y, metric_y) = refine_axis(&matrix, search_points, best_x_idx, best_y_idx, false, config);

    let averaged_metric = (metric_x.unwrap_or(best_metric as f64) + metric_y.unwrap_or(best_metric as f64)) / 2.0;

    let shift_x = (best_x_idx as i32 - config.half_search) as f64 + subpixel_x + remainder_x;
    let shift_y = (best_y_idx as i32 - config.half_search) as f64 + subpixel_y + remainder_y;
    let movement = ((shift_x * shift_x + shift_y * shift_y) / 2.0).sqrt();

    let passes = match config.threshold {
        Some(threshold) => config.metric.passes_threshold(averaged_metric as f32, threshold),
        None => true,
    };

    if passes {
        tie_point.x_shift += shift_x;
        tie_point.y_shift += shift_y;
        tie_point.metric = averaged_metric as f32;
        movement
    } else {
        tie_point.metric = f32::NAN;
        0.0
    }
}

/// Fit and locate the sub-pixel extremum along one axis of the similarity
/// matrix around `(best_x_idx, best_y_idx)`. `along_x` selects whether the
/// 1-D slice runs horizontally or vertically. Returns `(subpixel_offset,
/// Some(refined_metric))`, or `(0.0, None)` when the extremum sits too
/// close to the search border for the configured order (spec.md §4.3
/// step 4).
fn refine_axis(
    matrix: &[f32],
    search_points: usize,
    best_x_idx: usize,
    best_y_idx: usize,
    along_x: bool,
    config: &MatcherConfig,
) -> (f64, Option<f64>) {
    let idx = if along_x { best_x_idx } else { best_y_idx };

    let sample_at = |offset: isize| -> Option<f64> {
        let i = idx as isize + offset;
        if i < 0 || i as usize >= search_points {
            return None;
        }
        let value = if along_x {
            matrix[best_y_idx * search_points + i as usize]
        } else {
            matrix[i as usize * search_points + best_x_idx]
        };
        if value.is_nan() {
            None
        } else {
            Some(value as f64)
        }
    };

    if config.half_search == 1 {
        if idx == 0 || idx == search_points - 1 {
            return (0.0, None);
        }
        let Some(y_m1) = sample_at(-1) else { return (0.0, None) };
        let Some(y_0) = sample_at(0) else { return (0.0, None) };
        let Some(y_p1) = sample_at(1) else { return (0.0, None) };

        let xs = [-1.0, 0.0, 1.0];
        let ys = [y_m1, y_0, y_p1];
        let Some(coefficients) = polyfit::fit_1d(&xs, &ys, 3) else {
            return (0.0, None);
        };
        match polyfit::find_extreme_quadratic(&coefficients) {
            Some((x, y)) => (x, Some(y)),
            None => (0.0, None),
        }
    } else {
        if idx <= 1 || idx >= search_points.saturating_sub(2) {
            return (0.0, None);
        }
        let samples: Option<Vec<f64>> = [-2, -1, 0, 1, 2].iter().map(|&o| sample_at(o)).collect();
        let Some(ys) = samples else { return (0.0, None) };
        let xs = [-2.0, -1.0, 0.0, 1.0, 2.0];
        let Some(coefficients) = polyfit::fit_1d(&xs, &ys, 4) else {
            return (0.0, None);
        };
        let (x, y) = polyfit::find_extreme_quartic(&coefficients, config.metric.find_min(), config.subpixel_resolution);
        (x, Some(y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{GeoReference, GeoTransform, MemRaster, Point, RasterSize};

    fn ramp_raster(size: usize) -> MemRaster {
        let gr = GeoReference::new(
            RasterSize::with_rows_cols(size, size),
            1,
            GeoTransform::from_top_left_and_cell_size(Point::new(0.0, size as f64), 1.0, -1.0),
            "",
        );
        let mut data = vec![0.0f32; size * size];
        for row in 0..size {
            for col in 0..size {
                data[row * size + col] = (row * size + col) as f32;
            }
        }
        MemRaster::new(gr, data)
    }

    #[test]
    fn zero_shift_matches_identical_rasters() {
        let raster = ramp_raster(64);
        let mut tie_point = TiePoint::seed_aligned(Point::new(32.0, 32.0), 32.0, 32.0);
        let config = MatcherConfig {
            half_window: 5,
            half_search: 3,
            metric: SimilarityMetric::Euclidean,
            subpixel_resolution: 8,
            threshold: None,
        };
        match_tie_point(&raster, &raster, &mut tie_point, &config);
        assert!(tie_point.x_shift.abs() < 1e-6);
        assert!(tie_point.y_shift.abs() < 1e-6);
        assert_eq!(tie_point.metric, 0.0);
    }
}
