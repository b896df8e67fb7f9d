//! Warp engine (C10): tie-point-driven inverse mapping plus the resampling
//! loop that writes a warped output raster. Grounded on
//! `RSGISWarpImage::performWarp`'s `populateOutputImage`.

pub mod interpolator;
pub mod model;

use geo::{GeoReference, GeoTransform, Point, Raster, RasterSize, RasterWriter};

use crate::error::{Error, Result};
use crate::gcpcarrier::Gcp;
use interpolator::Interpolator;
use model::InverseModel;

/// Derive the output raster's geo-reference from the GCPs' map-coordinate
/// bounding box and the requested output resolution (spec.md §4.7 step 1).
pub fn output_geo_reference(gcps: &[Gcp], resolution: f64, projection: &str, band_count: usize) -> Result<GeoReference> {
    if gcps.is_empty() {
        return Err(Error::Config("cannot derive an output extent from an empty GCP set".to_string()));
    }
    if resolution <= 0.0 {
        return Err(Error::Config("output resolution must be positive".to_string()));
    }

    let (mut min_e, mut max_e) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_n, mut max_n) = (f64::INFINITY, f64::NEG_INFINITY);
    for gcp in gcps {
        min_e = min_e.min(gcp.easting);
        max_e = max_e.max(gcp.easting);
        min_n = min_n.min(gcp.northing);
        max_n = max_n.max(gcp.northing);
    }

    let width = ((max_e - min_e) / resolution).ceil().max(1.0) as usize;
    let height = ((max_n - min_n) / resolution).ceil().max(1.0) as usize;
    let transform = GeoTransform::from_top_left_and_cell_size(Point::new(min_e, max_n), resolution, -resolution);

    Ok(GeoReference::new(RasterSize::with_rows_cols(height, width), band_count, transform, projection))
}

/// Run C10's resampling loop end to end, writing through `writer` one row
/// at a time. `writer` must already be created from the `GeoReference`
/// returned by [`output_geo_reference`]. Per pixel: invert the map location
/// at that pixel's centre to an input pixel location; a model failure
/// (`None`) writes NaN to every band; a resolved location outside the
/// input raster's extent writes zero (spec.md §4.7 step 4).
pub fn warp<R, W>(input: &R, model: &InverseModel, interpolator: Interpolator, output_geo: &GeoReference, writer: &mut W) -> Result<()>
where
    R: Raster,
    W: RasterWriter,
{
    let band_count = input.band_count();
    let mut rows = vec![vec![0.0f32; output_geo.columns()]; band_count];

    for row in 0..output_geo.rows() {
        for col in 0..output_geo.columns() {
            let map = output_geo.pixel_to_map(col as f64 + 0.5, row as f64 + 0.5);

            match model.invert(map.x(), map.y()) {
                None => {
                    for band_row in rows.iter_mut() {
                        band_row[col] = f32::NAN;
                    }
                }
                Some((x_in, y_in)) => match interpolator.sample(input, x_in, y_in) {
                    Some(values) => {
                        for (band_row, value) in rows.iter_mut().zip(values) {
                            band_row[col] = value;
                        }
                    }
                    None => {
                        for band_row in rows.iter_mut() {
                            band_row[col] = 0.0;
                        }
                    }
                },
            }
        }

        for (band, band_row) in rows.iter().enumerate() {
            writer.write_row(band, row, band_row)?;
        }
    }
    Ok(())
}

/// Diagnostic variant of the resampling loop (spec.md §9, Open Question (a)):
/// instead of resampled pixel values, writes a two-band `(x_in, y_in)` image
/// of the inverse-mapped input pixel coordinates. Shares `warp`'s
/// output-raster setup but not its per-pixel body, since it records
/// coordinates rather than sampled values and never calls the interpolator.
pub fn warp_diagnostic_transform<W>(model: &InverseModel, output_geo: &GeoReference, writer: &mut W) -> Result<()>
where
    W: RasterWriter,
{
    let mut x_row = vec![0.0f32; output_geo.columns()];
    let mut y_row = vec![0.0f32; output_geo.columns()];

    for row in 0..output_geo.rows() {
        for col in 0..output_geo.columns() {
            let map = output_geo.pixel_to_map(col as f64 + 0.5, row as f64 + 0.5);
            match model.invert(map.x(), map.y()) {
                Some((x_in, y_in)) => {
                    x_row[col] = x_in as f32;
                    y_row[col] = y_in as f32;
                }
                None => {
                    x_row[col] = f32::NAN;
                    y_row[col] = f32::NAN;
                }
            }
        }
        writer.write_row(0, row, &x_row)?;
        writer.write_row(1, row, &y_row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::MemRaster;
    use model::NearestModel;

    fn gcp(easting: f64, northing: f64, col: f64, row: f64) -> Gcp {
        Gcp { pixel_col: col, pixel_row: row, easting, northing }
    }

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
    fn identity_gcps_round_trip_through_nearest_model() {
        let raster = ramp_raster(100);
        let gcps: Vec<Gcp> = (0..100)
            .step_by(10)
            .flat_map(|row| (0..100).step_by(10).map(move |col| (row, col)))
            .map(|(row, col)| gcp(col as f64, (100 - row) as f64, col as f64, row as f64))
            .collect();

        let output_geo = output_geo_reference(&gcps, 1.0, "", 1).unwrap();
        let model = InverseModel::Nearest(NearestModel::build(&gcps, 1.0));
        let mut output = MemRaster::zeros(output_geo.clone());

        warp(&raster, &model, Interpolator::NearestNeighbour, &output_geo, &mut output).unwrap();

        // Query pixel (50, 50) samples its centre, map (50.5, 49.5), which the
        // nearest-GCP model resolves to input pixel (51, 51) after rounding.
        assert_eq!(output.band_slice(0)[50 * output_geo.columns() + 50], raster.band_slice(0)[51 * 100 + 51]);
    }
}
