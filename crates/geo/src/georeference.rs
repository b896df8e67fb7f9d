use crate::{GeoTransform, Point, Rect, RasterSize};

/// Georeferencing metadata for a raster: its pixel grid size, its affine
/// transform to map space, and its projection. This is the concrete shape
/// of the "raster adapter" interface (C1): anything that can hand back a
/// `GeoReference` plus band data can participate in overlap solving,
/// matching and warping.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct GeoReference {
    size: RasterSize,
    band_count: usize,
    geo_transform: GeoTransform,
    projection: String,
}

impl GeoReference {
    pub fn new(size: RasterSize, band_count: usize, geo_transform: GeoTransform, projection: impl Into<String>) -> Self {
        GeoReference {
            size,
            band_count,
            geo_transform,
            projection: projection.into(),
        }
    }

    pub fn raster_size(&self) -> RasterSize {
        self.size
    }

    pub fn rows(&self) -> usize {
        self.size.rows
    }

    pub fn columns(&self) -> usize {
        self.size.cols
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    pub fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    pub fn projection(&self) -> &str {
        &self.projection
    }

    pub fn pixel_width(&self) -> f64 {
        self.geo_transform.pixel_width()
    }

    pub fn pixel_height(&self) -> f64 {
        self.geo_transform.pixel_height()
    }

    /// Map coordinate of the pixel (col, row) fractional position.
    pub fn pixel_to_map(&self, col: f64, row: f64) -> Point {
        self.geo_transform.apply_to_pixel(col, row)
    }

    /// Fractional pixel coordinate corresponding to a map coordinate, `None`
    /// if the transform is not invertible.
    pub fn map_to_pixel(&self, p: Point) -> Option<Point> {
        let inv = self.geo_transform.invert().ok()?;
        Some(inv.apply_to_pixel(p.x(), p.y()))
    }

    /// Geographic bounding box of the raster, derived from its geotransform
    /// and pixel dimensions (spec §4.1).
    pub fn bounding_box(&self) -> Rect {
        let top_left = self.geo_transform.top_left();
        let bottom_right = self.geo_transform.apply_to_pixel(self.columns() as f64, self.rows() as f64);
        Rect::from_points(top_left, bottom_right)
    }

    /// `true` if the raster pixel extent contains the given floating-image
    /// pixel coordinate.
    pub fn contains_pixel(&self, col: f64, row: f64) -> bool {
        col >= 0.0 && row >= 0.0 && col < self.columns() as f64 && row < self.rows() as f64
    }
}
