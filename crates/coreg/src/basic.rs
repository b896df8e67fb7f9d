//! Basic registration (C5): independent per-point local matching over a
//! regular seed grid, gated by window texture. Grounded on
//! `RSGISBasicImageRegistration` and the shared helpers in
//! `RSGISImageRegistration` (`removeTiePointsWithLowStdDev`, `calcStdDev`).

use geo::Raster;

use crate::error::{Error, Result};
use crate::matcher::{self, MatcherConfig};
use crate::overlap::{self, OverlapRegion};
use crate::tiepoint::TiePoint;

#[derive(Clone, Copy, Debug)]
pub struct BasicConfig {
    pub gap: i32,
    pub matcher: MatcherConfig,
    pub stddev_ref_threshold: f32,
    pub stddev_float_threshold: f32,
}

/// Run C5 end to end: overlap solve, grid seeding, texture gating, matching,
/// finalisation. Returns the retained tie points, or `NoTiePointsRetained`
/// if none survive.
pub fn register<R, F>(reference: &R, floating: &F, config: &BasicConfig) -> Result<Vec<TiePoint>>
where
    R: Raster,
    F: Raster,
{
    if config.gap < 1 {
        return Err(Error::Config("gap must be >= 1".to_string()));
    }

    let overlap_region = overlap::compute_overlap(reference.geo_reference(), floating.geo_reference())?;
    let seeds = seed_grid(reference, floating, &overlap_region, config.gap);

    let mut retained = Vec::with_capacity(seeds.len());
    for mut tie_point in seeds {
        if !passes_texture_gate(reference, floating, &tie_point, config.matcher.half_window, config) {
            continue;
        }
        matcher::match_tie_point(reference, floating, &mut tie_point, &config.matcher);
        retained.push(tie_point);
    }

    finalize(retained, floating)
}

/// Seed a regular grid of tie points across the overlap, centred so the
/// border margin is equal on both sides of each axis (spec.md §4.4 step 2).
pub fn seed_grid<R, F>(reference: &R, floating: &F, overlap: &OverlapRegion, gap: i32) -> Vec<TiePoint>
where
    R: Raster,
    F: Raster,
{
    let n_x = ((overlap.width as i32) / gap).max(1);
    let n_y = ((overlap.height as i32) / gap).max(1);

    let margin_x = (overlap.width as f64 - (n_x - 1) as f64 * gap as f64) / 2.0;
    let margin_y = (overlap.height as f64 - (n_y - 1) as f64 * gap as f64) / 2.0;

    let mut seeds = Vec::with_capacity((n_x * n_y) as usize);
    for j in 0..n_y {
        for i in 0..n_x {
            let local_x = margin_x + i as f64 * gap as f64;
            let local_y = margin_y + j as f64 * gap as f64;

            let x_ref = overlap.reference_offset.0 as f64 + local_x;
            let y_ref = overlap.reference_offset.1 as f64 + local_y;
            let x_float = overlap.floating_offset.0 as f64 + local_x;
            let y_float = overlap.floating_offset.1 as f64 + local_y;

            let map = reference.geo_reference().pixel_to_map(x_ref, y_ref);
            seeds.push(TiePoint::seed(map, x_ref, y_ref, x_float, y_float));
        }
    }
    seeds
}

/// Standard deviation of a `(2W+1)^2` multi-band window, counting only
/// samples that are non-zero and non-NaN. Returns `-1.0` if fewer than half
/// the window's samples carry data (near an image edge), matching
/// `RSGISImageRegistration::calcStdDev`.
fn window_stddev(data: &[f32]) -> f32 {
    let total = data.len();
    let valid: Vec<f64> = data.iter().filter(|v| !v.is_nan() && **v != 0.0).map(|&v| v as f64).collect();

    if (valid.len() as f64 / total as f64) < 0.5 {
        return -1.0;
    }

    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let sq_diff_sum: f64 = valid.iter().map(|&v| (v - mean) * (v - mean)).sum();
    (sq_diff_sum / valid.len() as f64).sqrt() as f32
}

pub(crate) fn passes_texture_gate<R, F>(reference: &R, floating: &F, tie_point: &TiePoint, half_window: i32, config: &BasicConfig) -> bool
where
    R: Raster,
    F: Raster,
{
    let size = 2 * half_window + 1;
    let reference_window = geo::PixelWindow::new(
        tie_point.x_ref.round() as i32 - half_window,
        tie_point.y_ref.round() as i32 - half_window,
        size as usize,
        size as usize,
    );
    let floating_window = geo::PixelWindow::new(
        tie_point.x_float.round() as i32 - half_window,
        tie_point.y_float.round() as i32 - half_window,
        size as usize,
        size as usize,
    );

    let Ok(reference_block) = reference.read_window_all_bands(reference_window) else {
        return false;
    };
    let Ok(floating_block) = floating.read_window_all_bands(floating_window) else {
        return false;
    };

    let reference_stddev = window_stddev(&reference_block);
    let floating_stddev = window_stddev(&floating_block);

    reference_stddev >= config.stddev_ref_threshold && floating_stddev >= config.stddev_float_threshold
}

/// Finalisation shared by C5 and C6: resolve the floating position from
/// the accumulated shift, then drop points with no metric, a failing
/// threshold, or a floating position outside the floating raster's pixel
/// extent (spec.md §4.4 step 5).
pub fn finalize<F: Raster>(mut points: Vec<TiePoint>, floating: &F) -> Result<Vec<TiePoint>> {
    for point in &mut points {
        point.finalize_floating_position();
    }

    points.retain(|point| {
        !point.metric.is_nan() && floating.geo_reference().contains_pixel(point.x_float, point.y_float)
    });

    if points.is_empty() {
        return Err(Error::NoTiePointsRetained);
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::SimilarityMetric;
    use geo::{GeoReference, GeoTransform, MemRaster, Point as GeoPoint, RasterSize};

    fn random_raster(size: usize, seed: u64) -> MemRaster {
        let gr = GeoReference::new(
            RasterSize::with_rows_cols(size, size),
            1,
            GeoTransform::from_top_left_and_cell_size(GeoPoint::new(0.0, size as f64), 1.0, -1.0),
            "",
        );
        let mut state = seed.wrapping_mul(2685821657736338717).wrapping_add(1);
        let mut data = vec![0.0f32; size * size];
        for v in data.iter_mut() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            *v = ((state % 1000) as f32) / 999.0;
        }
        MemRaster::new(gr, data)
    }

    #[test]
    fn self_registration_yields_near_zero_shifts() {
        let raster = random_raster(256, 42);
        let config = BasicConfig {
            gap: 16,
            matcher: MatcherConfig {
                half_window: 9,
                half_search: 4,
                metric: SimilarityMetric::Correlation,
                subpixel_resolution: 8,
                threshold: Some(0.9),
            },
            stddev_ref_threshold: 0.01,
            stddev_float_threshold: 0.01,
        };

        let result = register(&raster, &raster, &config).expect("self-registration should retain points");
        let median_shift = {
            let mut mags: Vec<f64> = result.iter().map(|p| p.shift_magnitude()).collect();
            mags.sort_by(|a, b| a.partial_cmp(b).unwrap());
            mags[mags.len() / 2]
        };
        assert!(median_shift < 1.0 / 8.0 + 1e-6);
    }

    #[test]
    fn zero_gap_is_rejected() {
        let raster = random_raster(32, 7);
        let config = BasicConfig {
            gap: 0,
            matcher: MatcherConfig {
                half_window: 4,
                half_search: 2,
                metric: SimilarityMetric::Euclidean,
                subpixel_resolution: 4,
                threshold: Some(10.0),
            },
            stddev_ref_threshold: 0.0,
            stddev_float_threshold: 0.0,
        };
        assert!(matches!(register(&raster, &raster, &config), Err(Error::Config(_))));
    }
}
