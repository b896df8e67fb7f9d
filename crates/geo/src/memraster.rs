use crate::{raster::PixelWindow, Error, GeoReference, Raster, RasterWriter, Result};

/// An in-memory multi-band raster backed by a flat `Vec<f32>`, one band
/// after another, each band row-major. This is the lightweight stand-in for
/// `DenseGeoRaster` the teacher crate uses for GDAL-backed data — it is
/// what the registration and warp tests exercise without touching disk, and
/// what C7's transient per-pixel output accumulates into before a row is
/// flushed to a real `RasterWriter`.
#[derive(Clone, Debug, PartialEq)]
pub struct MemRaster {
    geo_reference: GeoReference,
    data: Vec<f32>,
}

impl MemRaster {
    pub fn new(geo_reference: GeoReference, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            geo_reference.raster_size().cell_count() * geo_reference.band_count(),
            "data buffer does not match the declared raster size and band count"
        );
        MemRaster { geo_reference, data }
    }

    pub fn filled_with(geo_reference: GeoReference, value: f32) -> Self {
        let len = geo_reference.raster_size().cell_count() * geo_reference.band_count();
        MemRaster::new(geo_reference, vec![value; len])
    }

    pub fn zeros(geo_reference: GeoReference) -> Self {
        MemRaster::filled_with(geo_reference, 0.0)
    }

    fn band_offset(&self, band: usize) -> usize {
        band * self.geo_reference.raster_size().cell_count()
    }

    pub fn band_slice(&self, band: usize) -> &[f32] {
        let off = self.band_offset(band);
        &self.data[off..off + self.geo_reference.raster_size().cell_count()]
    }

    pub fn band_slice_mut(&mut self, band: usize) -> &mut [f32] {
        let off = self.band_offset(band);
        let len = self.geo_reference.raster_size().cell_count();
        &mut self.data[off..off + len]
    }

    pub fn set(&mut self, band: usize, row: usize, col: usize, value: f32) {
        let cols = self.geo_reference.columns();
        self.band_slice_mut(band)[row * cols + col] = value;
    }

    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        let cols = self.geo_reference.columns();
        self.band_slice(band)[row * cols + col]
    }
}

impl Raster for MemRaster {
    fn geo_reference(&self) -> &GeoReference {
        &self.geo_reference
    }

    fn read_window(&self, band: usize, window: PixelWindow) -> Result<Vec<f32>> {
        if band >= self.band_count() {
            return Err(Error::InvalidArgument(format!("band index {band} out of range")));
        }

        let cols = self.geo_reference.columns() as i32;
        let rows = self.geo_reference.rows() as i32;
        let band_data = self.band_slice(band);

        let mut out = Vec::with_capacity(window.width * window.height);
        for r in 0..window.height as i32 {
            for c in 0..window.width as i32 {
                let src_row = window.row_off + r;
                let src_col = window.col_off + c;
                if src_row < 0 || src_row >= rows || src_col < 0 || src_col >= cols {
                    out.push(f32::NAN);
                } else {
                    out.push(band_data[(src_row * cols + src_col) as usize]);
                }
            }
        }
        Ok(out)
    }
}

impl RasterWriter for MemRaster {
    fn write_row(&mut self, band: usize, row: usize, data: &[f32]) -> Result<()> {
        let cols = self.geo_reference.columns();
        if data.len() != cols {
            return Err(Error::InvalidArgument("row length does not match raster width".to_string()));
        }
        self.band_slice_mut(band)[row * cols..(row + 1) * cols].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeoTransform, Point, RasterSize};

    fn test_geo_reference(rows: usize, cols: usize) -> GeoReference {
        GeoReference::new(
            RasterSize::with_rows_cols(rows, cols),
            1,
            GeoTransform::from_top_left_and_cell_size(Point::new(0.0, rows as f64), 1.0, -1.0),
            "",
        )
    }

    #[test]
    fn read_window_fills_out_of_bounds_with_nan() {
        let raster = MemRaster::filled_with(test_geo_reference(4, 4), 1.0);
        let window = raster.read_window(0, PixelWindow::new(-1, -1, 3, 3)).unwrap();
        assert!(window[0].is_nan());
        assert_eq!(window[4], 1.0);
    }

    #[test]
    fn set_and_get_roundtrip() {
        let mut raster = MemRaster::zeros(test_geo_reference(4, 4));
        raster.set(0, 2, 3, 42.0);
        assert_eq!(raster.get(0, 2, 3), 42.0);
    }
}
