//! Per-pixel registration (C7): run the local matcher at every overlap
//! pixel, with no threshold test, writing a 3-band diagnostic raster of
//! (X shift, Y shift, metric). Grounded on `RSGISImagePixelRegistration`.

use geo::{GeoReference, GeoTransform, Raster, RasterWriter};

use crate::error::{Error, Result};
use crate::matcher::{self, MatcherConfig};
use crate::overlap::{self, OverlapRegion};
use crate::tiepoint::TiePoint;

/// Solve the overlap and derive the 3-band output raster's geo-reference
/// ("X Shift", "Y Shift", "Metric Value" bands, per `RSGISImagePixelRegistration`'s
/// `initRegistration`). Callers create the destination raster from this
/// before calling [`register`].
pub fn plan<R: Raster, F: Raster>(reference: &R, floating: &F) -> Result<(OverlapRegion, GeoReference)> {
    let overlap_region = overlap::compute_overlap(reference.geo_reference(), floating.geo_reference())?;
    if overlap_region.is_empty() {
        return Err(Error::NoOverlap);
    }
    let geo_reference = output_geo_reference(reference.geo_reference(), &overlap_region);
    Ok((overlap_region, geo_reference))
}

/// Run C7 end to end, writing the 3-band result through `writer` one row
/// at a time. `writer` must already be sized and georeferenced per the
/// `GeoReference` returned by [`plan`]. `matcher_config.threshold` is
/// ignored: per-pixel registration always records whatever the matcher
/// found (spec.md §4.3, "C7 skips the threshold test").
pub fn register<R, F, W>(
    reference: &R,
    floating: &F,
    overlap_region: &OverlapRegion,
    matcher_config: &MatcherConfig,
    writer: &mut W,
) -> Result<()>
where
    R: Raster,
    F: Raster,
    W: RasterWriter,
{
    let config = MatcherConfig { threshold: None, ..*matcher_config };

    let mut x_shift_row = vec![0.0f32; overlap_region.width];
    let mut y_shift_row = vec![0.0f32; overlap_region.width];
    let mut metric_row = vec![0.0f32; overlap_region.width];

    for row in 0..overlap_region.height {
        for col in 0..overlap_region.width {
            let x_ref = overlap_region.reference_offset.0 as f64 + col as f64;
            let y_ref = overlap_region.reference_offset.1 as f64 + row as f64;
            let x_float = overlap_region.floating_offset.0 as f64 + col as f64;
            let y_float = overlap_region.floating_offset.1 as f64 + row as f64;

            let map = reference.geo_reference().pixel_to_map(x_ref, y_ref);
            let mut tie_point = TiePoint::seed(map, x_ref, y_ref, x_float, y_float);
            matcher::match_tie_point(reference, floating, &mut tie_point, &config);

            x_shift_row[col] = tie_point.x_shift as f32;
            y_shift_row[col] = tie_point.y_shift as f32;
            metric_row[col] = tie_point.metric;
        }

        writer.write_row(0, row, &x_shift_row)?;
        writer.write_row(1, row, &y_shift_row)?;
        writer.write_row(2, row, &metric_row)?;
    }

    Ok(())
}

fn output_geo_reference(reference: &GeoReference, overlap: &OverlapRegion) -> GeoReference {
    let transform = GeoTransform::new([
        overlap.top_left.x(),
        overlap.pixel_width,
        overlap.row_skew,
        overlap.top_left.y(),
        overlap.column_skew,
        overlap.pixel_height,
    ]);
    GeoReference::new(
        geo::RasterSize::with_rows_cols(overlap.height, overlap.width),
        3,
        transform,
        reference.projection(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::SimilarityMetric;
    use geo::{MemRaster, Point as GeoPoint, RasterSize};

    fn ramp_raster(size: usize) -> MemRaster {
        let gr = GeoReference::new(
            RasterSize::with_rows_cols(size, size),
            1,
            GeoTransform::from_top_left_and_cell_size(GeoPoint::new(0.0, size as f64), 1.0, -1.0),
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
    fn self_registration_produces_near_zero_shift_raster() {
        let raster = ramp_raster(32);
        let config = MatcherConfig {
            half_window: 4,
            half_search: 2,
            metric: SimilarityMetric::Euclidean,
            subpixel_resolution: 4,
            threshold: Some(0.0),
        };

        let (overlap_region, output_geo_reference) = plan(&raster, &raster).unwrap();
        let mut output = MemRaster::zeros(output_geo_reference);
        register(&raster, &raster, &overlap_region, &config, &mut output).unwrap();

        let x_shift_band = output.band_slice(0);
        assert!(x_shift_band.iter().all(|&v| v.abs() < 1e-3));
    }
}
