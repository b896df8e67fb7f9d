//! Overlap solver (C3): the geographic intersection of two rasters, and the
//! companion "shifted overlap" routine the local matcher uses to carve out
//! a pair of same-size windows for one trial shift.

use geo::{GeoReference, Point, Raster, RasterSize};

use crate::error::{Error, Result};

const RESOLUTION_TOLERANCE: f64 = 1e-4;
const PIXEL_ALIGN_TOLERANCE: f64 = 1e-4;

/// The geographic overlap between a reference and a floating raster,
/// computed once per registration run (spec.md §3, `OverlapRegion`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapRegion {
    pub top_left: Point,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_skew: f64,
    pub column_skew: f64,
    pub width: usize,
    pub height: usize,
    pub reference_offset: (i32, i32),
    pub floating_offset: (i32, i32),
    pub band_count: usize,
}

impl OverlapRegion {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn pixel_align(raw: f64) -> i32 {
    let rounded = raw.round();
    if (raw - rounded).abs() < PIXEL_ALIGN_TOLERANCE {
        rounded as i32
    } else {
        raw.floor() as i32
    }
}

/// Compute the overlap region between `reference` and `floating`. Fails
/// with `NoOverlap`, `ResolutionMismatch` or `RotationMismatch`; a
/// projection string mismatch is logged as a warning only (spec.md §4.1).
pub fn compute_overlap(reference: &GeoReference, floating: &GeoReference) -> Result<OverlapRegion> {
    if reference.band_count() != floating.band_count() {
        return Err(Error::Config(format!(
            "band count mismatch: reference has {}, floating has {}",
            reference.band_count(),
            floating.band_count()
        )));
    }

    let ref_gt = reference.geo_transform();
    let flt_gt = floating.geo_transform();

    let width_rel_diff = ((ref_gt.pixel_width() - flt_gt.pixel_width()) / ref_gt.pixel_width()).abs();
    let height_rel_diff = ((ref_gt.pixel_height() - flt_gt.pixel_height()) / ref_gt.pixel_height()).abs();
    if width_rel_diff > RESOLUTION_TOLERANCE || height_rel_diff > RESOLUTION_TOLERANCE {
        return Err(Error::ResolutionMismatch);
    }

    if ref_gt.row_skew() != flt_gt.row_skew() || ref_gt.column_skew() != flt_gt.column_skew() {
        return Err(Error::RotationMismatch);
    }

    if reference.projection() != floating.projection() {
        log::warn!(
            "reference and floating rasters have different projection strings: {:?} vs {:?}",
            reference.projection(),
            floating.projection()
        );
    }

    let reference_bbox = reference.bounding_box();
    let floating_bbox = floating.bounding_box();

    if !reference_bbox.intersects(&floating_bbox) {
        return Err(Error::NoOverlap);
    }

    let intersection = reference_bbox.intersection(&floating_bbox);
    if intersection.is_empty() {
        return Err(Error::NoOverlap);
    }

    let pixel_width = ref_gt.pixel_width();
    let pixel_height = ref_gt.pixel_height();

    let width = (intersection.width() / pixel_width).round().max(0.0) as usize;
    let height = (intersection.height() / pixel_height.abs()).round().max(0.0) as usize;
    if width == 0 || height == 0 {
        return Err(Error::NoOverlap);
    }

    let reference_offset = raster_pixel_offset(reference, intersection.top_left());
    let floating_offset = raster_pixel_offset(floating, intersection.top_left());

    Ok(OverlapRegion {
        top_left: intersection.top_left(),
        pixel_width,
        pixel_height,
        row_skew: ref_gt.row_skew(),
        column_skew: ref_gt.column_skew(),
        width,
        height,
        reference_offset,
        floating_offset,
        band_count: reference.band_count(),
    })
}

fn raster_pixel_offset(raster: &GeoReference, map_point: Point) -> (i32, i32) {
    let pixel = raster
        .map_to_pixel(map_point)
        .expect("geotransform invertibility was already checked by resolution/rotation matching");
    (pixel_align(pixel.x()), pixel_align(pixel.y()))
}

/// A pair of same-size pixel windows for one trial shift in the local
/// matcher: a fixed window into the reference raster, and a window shifted
/// by `(shift_x, shift_y)` floating-pixel units into the floating raster.
/// `remainder` is the fractional offset lost when the shifted floating
/// top-left was floored to an integer pixel, propagated so sub-pixel
/// accuracy survives the window read (spec.md §4.1, §4.3 step 1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShiftedOverlap {
    pub reference_window: geo::raster::PixelWindow,
    pub floating_window: geo::raster::PixelWindow,
    pub remainder: (f64, f64),
}

fn window_touches_raster(window: geo::raster::PixelWindow, size: RasterSize) -> bool {
    let col_end = window.col_off + window.width as i32;
    let row_end = window.row_off + window.height as i32;
    col_end > 0 && window.col_off < size.cols as i32 && row_end > 0 && window.row_off < size.rows as i32
}

/// Build the windows for one trial shift. The reference window is fixed at
/// `(ref_col, ref_row)`; the floating window is centred at
/// `(float_col + shift_x, float_row + shift_y)` — a separate base position,
/// since the two rasters generally have different pixel origins even
/// though their resolutions and rotations match (checked by
/// `compute_overlap`). Returns `None` when either window falls entirely
/// outside its raster's pixel extent — the "degenerate overlap" case the
/// matcher must skip without failing the whole search (spec.md §9,
/// "Exception control flow").
#[allow(clippy::too_many_arguments)]
pub fn shifted_overlap(
    reference_size: RasterSize,
    floating_size: RasterSize,
    ref_col: f64,
    ref_row: f64,
    float_col: f64,
    float_row: f64,
    half_window: i32,
    shift_x: f64,
    shift_y: f64,
) -> Option<ShiftedOverlap> {
    let size = (2 * half_window + 1) as usize;

    let reference_window = geo::raster::PixelWindow::new(
        ref_col.round() as i32 - half_window,
        ref_row.round() as i32 - half_window,
        size,
        size,
    );
    if !window_touches_raster(reference_window, reference_size) {
        return None;
    }

    let floating_col_f = float_col + shift_x - half_window as f64;
    let floating_row_f = float_row + shift_y - half_window as f64;
    let floating_col_off = floating_col_f.floor();
    let floating_row_off = floating_row_f.floor();

    let remainder = (floating_col_f - floating_col_off, floating_row_f - floating_row_off);
    let floating_window = geo::raster::PixelWindow::new(floating_col_off as i32, floating_row_off as i32, size, size);
    if !window_touches_raster(floating_window, floating_size) {
        return None;
    }

    Some(ShiftedOverlap {
        reference_window,
        floating_window,
        remainder,
    })
}

/// Read the multi-band block for a window, flattened `bands x samples`
/// row-major, the shape the similarity metric consumes.
pub fn read_block<R: Raster>(raster: &R, window: geo::raster::PixelWindow) -> Result<Vec<f32>> {
    Ok(raster.read_window_all_bands(window)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::GeoTransform;

    fn geo_reference(origin: (f64, f64), cell: f64, size: RasterSize) -> GeoReference {
        GeoReference::new(size, 1, GeoTransform::new([origin.0, cell, 0.0, origin.1, 0.0, -cell]), "")
    }

    #[test]
    fn overlap_is_symmetric_in_extent() {
        let a = geo_reference((0.0, 100.0), 1.0, RasterSize::with_rows_cols(100, 100));
        let b = geo_reference((50.0, 150.0), 1.0, RasterSize::with_rows_cols(100, 100));

        let ab = compute_overlap(&a, &b).unwrap();
        let ba = compute_overlap(&b, &a).unwrap();

        assert_eq!(ab.width, ba.width);
        assert_eq!(ab.height, ba.height);
        assert_eq!(ab.top_left, ba.top_left);
    }

    #[test]
    fn touching_rasters_have_no_overlap() {
        let a = geo_reference((0.0, 100.0), 1.0, RasterSize::with_rows_cols(100, 100));
        let b = geo_reference((100.0, 100.0), 1.0, RasterSize::with_rows_cols(100, 100));

        assert!(matches!(compute_overlap(&a, &b), Err(Error::NoOverlap)));
    }

    #[test]
    fn shift_outside_floating_raster_is_degenerate() {
        let result = shifted_overlap(
            RasterSize::with_rows_cols(50, 50),
            RasterSize::with_rows_cols(50, 50),
            25.0,
            25.0,
            25.0,
            25.0,
            4,
            1000.0,
            0.0,
        );
        assert!(result.is_none());
    }

    #[test]
    fn shift_within_bounds_reports_remainder() {
        let result = shifted_overlap(
            RasterSize::with_rows_cols(50, 50),
            RasterSize::with_rows_cols(50, 50),
            25.0,
            25.0,
            25.0,
            25.0,
            4,
            3.5,
            -1.25,
        )
        .unwrap();
        assert!(result.remainder.0 >= 0.0 && result.remainder.0 < 1.0);
        assert!(result.remainder.1 >= 0.0 && result.remainder.1 < 1.0);
    }
}
