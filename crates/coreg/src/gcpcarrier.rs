//! GCP model carrier (C9): attach ground control points to a raster's
//! metadata without resampling it, for consumption by external warping
//! tools. Grounded on `RSGISAddGCPsGDAL`.

use std::io::BufRead;

use geo::{Raster, RasterWriter};

use crate::error::Result;
use crate::tiepointio::{self, TiePointFormat};

/// A single ground control point: 0-based pixel coordinates in the
/// floating image, paired with its reference map coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gcp {
    pub pixel_col: f64,
    pub pixel_row: f64,
    pub easting: f64,
    pub northing: f64,
}

/// Read a GCP list from a tie-point file in the RSGIS image-to-map format
/// (`easting,northing,x_float,y_float[,metric]`), converting the file's
/// 1-based pixel coordinates to 0-based (spec.md §6, `RSGISGCPImg2MapNode`'s
/// `imgX()-1`/`imgY()-1` convention).
pub fn read_gcp_file<R: BufRead>(reader: R) -> Result<Vec<Gcp>> {
    let points = tiepointio::read(reader, TiePointFormat::RsgisImageToMap)?;
    Ok(points
        .iter()
        .map(|point| Gcp {
            pixel_col: point.x_float - 1.0,
            pixel_row: point.y_float - 1.0,
            easting: point.map.x(),
            northing: point.map.y(),
        })
        .collect())
}

/// Copy every pixel of `input` into `output` unchanged, row by row, for
/// every band. Used to produce a plain pixel copy that GCPs are then
/// attached to, since a dataset's geotransform and its GCP list are
/// mutually exclusive in GDAL's model (spec.md §9,
/// `copyImageWithoutSpatialRef`).
pub fn copy_pixels<R, W>(input: &R, output: &mut W) -> Result<()>
where
    R: Raster,
    W: RasterWriter,
{
    let window = geo::PixelWindow::new(0, 0, input.width(), 1);
    for band in 0..input.band_count() {
        for row in 0..input.height() {
            let row_window = geo::PixelWindow::new(window.col_off, row as i32, window.width, 1);
            let data = input.read_window(band, row_window)?;
            output.write_row(band, row, &data)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcp_file_pixel_coordinates_are_converted_to_zero_based() {
        let text = "100.0,200.0,11.0,21.0,0.5\n";
        let gcps = read_gcp_file(text.as_bytes()).unwrap();
        assert_eq!(gcps.len(), 1);
        assert!((gcps[0].pixel_col - 10.0).abs() < 1e-9);
        assert!((gcps[0].pixel_row - 20.0).abs() < 1e-9);
        assert!((gcps[0].easting - 100.0).abs() < 1e-9);
    }

    #[test]
    fn copy_pixels_preserves_values() {
        use geo::{GeoReference, GeoTransform, MemRaster, Point, RasterSize};

        let gr = GeoReference::new(
            RasterSize::with_rows_cols(2, 2),
            1,
            GeoTransform::from_top_left_and_cell_size(Point::new(0.0, 2.0), 1.0, -1.0),
            "",
        );
        let input = MemRaster::new(gr.clone(), vec![1.0, 2.0, 3.0, 4.0]);
        let mut output = MemRaster::zeros(gr);
        copy_pixels(&input, &mut output).unwrap();
        assert_eq!(output.band_slice(0), input.band_slice(0));
    }
}
