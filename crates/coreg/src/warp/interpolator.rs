//! Resample interpolator (C12): recover band values for one output pixel
//! from the input raster at an inverse-mapped pixel location. Grounded on
//! `RSGISWarpImageInterpolator`'s `calcValue` (nearest-neighbour is the
//! only implementation the original ever shipped).

use geo::{PixelWindow, Raster};

/// Closed set of resample kernels (spec.md §9, "Strategy objects vs. tagged
/// variants"); nearest-neighbour is the only core variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolator {
    NearestNeighbour,
}

impl Interpolator {
    /// Sample all bands of `raster` at fractional pixel coordinates
    /// `(x_in, y_in)`. `None` if the rounded pixel index falls outside the
    /// raster's extent.
    pub fn sample<R: Raster>(&self, raster: &R, x_in: f64, y_in: f64) -> Option<Vec<f32>> {
        match self {
            Interpolator::NearestNeighbour => nearest_neighbour(raster, x_in, y_in),
        }
    }
}

fn nearest_neighbour<R: Raster>(raster: &R, x_in: f64, y_in: f64) -> Option<Vec<f32>> {
    let col = x_in.round();
    let row = y_in.round();
    if col < 0.0 || row < 0.0 || col >= raster.width() as f64 || row >= raster.height() as f64 {
        return None;
    }
    let window = PixelWindow::new(col as i32, row as i32, 1, 1);
    raster.read_window_all_bands(window).ok()
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
    fn samples_rounded_pixel_value() {
        let raster = ramp_raster(8);
        let values = Interpolator::NearestNeighbour.sample(&raster, 3.4, 2.6).unwrap();
        assert_eq!(values, vec![(3 * 8 + 3) as f32]);
    }

    #[test]
    fn out_of_bounds_is_none() {
        let raster = ramp_raster(8);
        assert!(Interpolator::NearestNeighbour.sample(&raster, -1.0, 0.0).is_none());
        assert!(Interpolator::NearestNeighbour.sample(&raster, 8.0, 0.0).is_none());
    }
}
