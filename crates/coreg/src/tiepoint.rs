//! Tie points (spec.md §3, `TiePoint`/`TiePointNode`) stored as a dense
//! array. The C++ source links each point to a neighbour list of raw
//! pointers into the same container; here each point lives at a stable
//! index into a `Vec`, and neighbour lists are plain `Vec<usize>` (spec.md
//! §9, "Resource ownership cycles").

use geo::Point;

/// A single tie point: where it sits in the reference overlap, where it
/// currently believes the matching floating-image location is, and the
/// metric value of the last match attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TiePoint {
    /// Reference map coordinates (eastings, northings).
    pub map: Point,
    /// Reference pixel coordinates, fixed for the lifetime of the point.
    pub x_ref: f64,
    pub y_ref: f64,
    /// Floating pixel coordinates; starts equal to the reference overlap
    /// position, then corrected by the accumulated shift at finalisation.
    pub x_float: f64,
    pub y_float: f64,
    /// Accumulated shift in floating-pixel units.
    pub x_shift: f64,
    pub y_shift: f64,
    /// Metric value of the last match; `NaN` until matched.
    pub metric: f32,
}

impl TiePoint {
    /// `(x_ref, y_ref)` are pixel coordinates in the reference raster's own
    /// grid; `(x_float, y_float)` are the corresponding unshifted pixel
    /// coordinates in the floating raster's own grid (the two generally
    /// differ by each raster's pixel offset into the overlap, even though
    /// both refer to the same overlap-local position).
    pub fn seed(map: Point, x_ref: f64, y_ref: f64, x_float: f64, y_float: f64) -> Self {
        TiePoint {
            map,
            x_ref,
            y_ref,
            x_float,
            y_float,
            x_shift: 0.0,
            y_shift: 0.0,
            metric: f32::NAN,
        }
    }

    /// Convenience seed for self-registration and tests where reference and
    /// floating pixel grids coincide.
    pub fn seed_aligned(map: Point, x_ref: f64, y_ref: f64) -> Self {
        TiePoint::seed(map, x_ref, y_ref, x_ref, y_ref)
    }

    /// Euclidean distance between this point's and `other`'s reference
    /// pixel coordinates.
    pub fn reference_distance(&self, other: &TiePoint) -> f64 {
        let dx = self.x_ref - other.x_ref;
        let dy = self.y_ref - other.y_ref;
        (dx * dx + dy * dy).sqrt()
    }

    /// Current best-guess floating pixel coordinates (unshifted floating
    /// base position minus the accumulated shift — same convention as
    /// finalisation).
    pub fn current_float(&self) -> (f64, f64) {
        (self.x_float - self.x_shift, self.y_float - self.y_shift)
    }

    /// Euclidean distance between this point's and `other`'s current
    /// floating pixel coordinates.
    pub fn floating_distance(&self, other: &TiePoint) -> f64 {
        let (sx, sy) = self.current_float();
        let (ox, oy) = other.current_float();
        let dx = sx - ox;
        let dy = sy - oy;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn shift_magnitude(&self) -> f64 {
        (self.x_shift * self.x_shift + self.y_shift * self.y_shift).sqrt()
    }

    /// Resolve the final floating pixel coordinates from the accumulated
    /// shift (spec.md §4.4 step 5).
    pub fn finalize_floating_position(&mut self) {
        self.x_float -= self.x_shift;
        self.y_float -= self.y_shift;
    }
}

impl PartialEq<(f64, f64)> for TiePoint {
    fn eq(&self, other: &(f64, f64)) -> bool {
        self.x_ref == other.0 && self.y_ref == other.1
    }
}

/// A tie point plus the indices of its neighbours within
/// `distance_threshold` reference pixels, built once after seeding and
/// never mutated again (spec.md §4.5, `TiePointNode`).
#[derive(Clone, Debug, PartialEq)]
pub struct TiePointNode {
    pub point: TiePoint,
    pub neighbours: Vec<usize>,
}

/// Build the neighbour lists for a set of seeded tie points.
pub fn build_neighbour_graph(points: &[TiePoint], distance_threshold: f64) -> Vec<TiePointNode> {
    points
        .iter()
        .enumerate()
        .map(|(i, &point)| {
            let neighbours = points
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && point.reference_distance(other) < distance_threshold)
                .map(|(j, _)| j)
                .collect();
            TiePointNode { point, neighbours }
        })
        .collect()
}
