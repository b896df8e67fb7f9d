//! Single-connected-layer (elastic) registration (C6): like C5, but each
//! tie point's neighbours relax towards its latest shift after every match,
//! iterated until the average per-iteration movement stops changing.
//! Grounded on `RSGISSingleConnectLayerImageRegistration`.

use geo::Raster;

use crate::basic::{finalize, seed_grid, BasicConfig};
use crate::error::{Error, Result};
use crate::matcher;
use crate::overlap;
use crate::tiepoint::{build_neighbour_graph, TiePoint, TiePointNode};

#[derive(Clone, Copy, Debug)]
pub struct SingleLayerConfig {
    pub basic: BasicConfig,
    pub distance_threshold: f64,
    pub max_iterations: u32,
    pub move_change_threshold: f64,
    pub smoothness: f64,
}

/// Run C6 end to end: same seeding and texture gating as C5, then iterated
/// matching with inverse-distance shift propagation across the neighbour
/// graph, then the shared finalisation.
pub fn register<R, F>(reference: &R, floating: &F, config: &SingleLayerConfig) -> Result<Vec<TiePoint>>
where
    R: Raster,
    F: Raster,
{
    if config.basic.gap < 1 {
        return Err(Error::Config("gap must be >= 1".to_string()));
    }

    let overlap_region = overlap::compute_overlap(reference.geo_reference(), floating.geo_reference())?;
    let seeds = seed_grid(reference, floating, &overlap_region, config.basic.gap);

    let gated: Vec<TiePoint> = seeds
        .into_iter()
        .filter(|tie_point| {
            crate::basic::passes_texture_gate(reference, floating, tie_point, config.basic.matcher.half_window, &config.basic)
        })
        .collect();

    if gated.is_empty() {
        return Err(Error::NoTiePointsRetained);
    }

    let mut nodes = build_neighbour_graph(&gated, config.distance_threshold);
    relax(reference, floating, &mut nodes, config);

    let points: Vec<TiePoint> = nodes.into_iter().map(|node| node.point).collect();
    finalize(points, floating)
}

/// Iterate matching and inverse-distance relaxation until the average
/// per-iteration movement converges or `max_iterations` is reached.
fn relax<R, F>(reference: &R, floating: &F, nodes: &mut [TiePointNode], config: &SingleLayerConfig)
where
    R: Raster,
    F: Raster,
{
    let mut previous_average: Option<f64> = None;

    for _ in 0..config.max_iterations {
        let mut total_movement = 0.0;

        for i in 0..nodes.len() {
            let mut point = nodes[i].point;
            matcher::match_tie_point(reference, floating, &mut point, &config.basic.matcher);
            total_movement += point.shift_magnitude();
            nodes[i].point = point;

            let shift_x = point.x_shift;
            let shift_y = point.y_shift;
            let neighbours = nodes[i].neighbours.clone();
            for neighbour_idx in neighbours {
                let distance = point.floating_distance(&nodes[neighbour_idx].point);
                let inv_dist = if distance < 1.0 { 1.0 } else { 1.0 / (distance * config.smoothness) };

                let neighbour = &mut nodes[neighbour_idx].point;
                let shift_x_diff = shift_x - neighbour.x_shift;
                let shift_y_diff = shift_y - neighbour.y_shift;
                neighbour.x_shift += inv_dist * shift_x_diff;
                neighbour.y_shift += inv_dist * shift_y_diff;
            }
        }

        let average_movement = total_movement / nodes.len() as f64;
        match previous_average {
            None => previous_average = Some(average_movement),
            Some(prev) => {
                let move_diff = (average_movement - prev).abs();
                if move_diff < config.move_change_threshold {
                    break;
                }
                previous_average = Some(average_movement);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatcherConfig;
    use crate::metric::SimilarityMetric;
    use geo::{GeoReference, GeoTransform, MemRaster, Point as GeoPoint, RasterSize};

    fn textured_raster(size: usize) -> MemRaster {
        let gr = GeoReference::new(
            RasterSize::with_rows_cols(size, size),
            1,
            GeoTransform::from_top_left_and_cell_size(GeoPoint::new(0.0, size as f64), 1.0, -1.0),
            "",
        );
        let mut state = 123456789u64;
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
    fn self_registration_converges_to_small_shifts() {
        let raster = textured_raster(200);
        let config = SingleLayerConfig {
            basic: BasicConfig {
                gap: 20,
                matcher: MatcherConfig {
                    half_window: 7,
                    half_search: 3,
                    metric: SimilarityMetric::Correlation,
                    subpixel_resolution: 8,
                    threshold: Some(0.8),
                },
                stddev_ref_threshold: 0.01,
                stddev_float_threshold: 0.01,
            },
            distance_threshold: 40.0,
            max_iterations: 5,
            move_change_threshold: 1e-4,
            smoothness: 1.0,
        };

        let result = register(&raster, &raster, &config).expect("self-registration should retain points");
        for point in &result {
            assert!(point.shift_magnitude() < 1.0);
        }
    }

    #[test]
    fn zero_gap_is_rejected() {
        let raster = textured_raster(32);
        let config = SingleLayerConfig {
            basic: BasicConfig {
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
            },
            distance_threshold: 10.0,
            max_iterations: 3,
            move_change_threshold: 0.01,
            smoothness: 1.0,
        };
        assert!(matches!(register(&raster, &raster, &config), Err(Error::Config(_))));
    }
}
