//! Sub-pixel extremum finding for the local matcher (C4 step 4–5): fit a
//! 1-D polynomial through similarity-matrix samples around the integer
//! extremum cell, then locate the polynomial's own extremum analytically.
//! Grounded on `RSGISImageRegistration::findExtreme` and
//! `RSGISPolyFit::PolyfitOneDimensionQuiet`. Root selection here respects
//! the metric's min/max polarity and range-filters to `[-1, 1]`, rather
//! than always picking the larger root regardless of polarity.

use nalgebra::{DMatrix, DVector};

/// Least-squares fit of `y = c0 + c1*x + c2*x^2 + ...` with `num_coeffs`
/// terms. Works whether the system is exactly determined (3 samples, 3
/// coefficients) or overdetermined (5 samples, 4 coefficients). Returns
/// `None` if the normal system is singular.
pub fn fit_1d(xs: &[f64], ys: &[f64], num_coeffs: usize) -> Option<Vec<f64>> {
    let n = xs.len();
    let mut design = DMatrix::<f64>::zeros(n, num_coeffs);
    for (row, &x) in xs.iter().enumerate() {
        let mut power = 1.0;
        for col in 0..num_coeffs {
            design[(row, col)] = power;
            power *= x;
        }
    }
    let targets = DVector::from_row_slice(ys);
    let svd = design.svd(true, true);
    svd.solve(&targets, 1e-12).ok().map(|v| v.iter().copied().collect())
}

fn evaluate(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().enumerate().map(|(j, &c)| c * x.powi(j as i32)).sum()
}

/// Sample the polynomial at `resolution` points per unit across
/// `[min_range, max_range]` and return the extremum consistent with
/// `find_min`'s polarity. Used both as the matcher's last-resort fallback
/// and whenever the analytic root lands outside the valid range.
fn sample_extreme(coefficients: &[f64], find_min: bool, min_range: f64, max_range: f64, resolution: u32) -> (f64, f64) {
    let division = 1.0 / resolution.max(1) as f64;
    let range = max_range - min_range;
    let num_tests = (range / division).ceil() as u32;

    let mut extreme_x = min_range;
    let mut extreme_y = evaluate(coefficients, min_range);
    for i in 0..num_tests {
        let x = min_range + i as f64 * division;
        let y = evaluate(coefficients, x);
        let better = if find_min { y < extreme_y } else { y > extreme_y };
        if better {
            extreme_x = x;
            extreme_y = y;
        }
    }
    (extreme_x, extreme_y)
}

/// Quadratic case (`S = 1`, three samples): the extremum of `c0 + c1*x +
/// c2*x^2` is at `x = -c1 / (2*c2)`, analytically, no range fallback.
/// Returns `None` if the quadratic term is (numerically) zero.
pub fn find_extreme_quadratic(coefficients: &[f64]) -> Option<(f64, f64)> {
    let c1 = coefficients[1];
    let c2 = coefficients[2];
    if c2 == 0.0 {
        return None;
    }
    let x = -c1 / (2.0 * c2);
    if !x.is_finite() {
        return None;
    }
    Some((x, evaluate(coefficients, x)))
}

/// Quartic-fit case (`S >= 2`, five samples, cubic least-squares fit):
/// roots of the derivative `c1 + 2*c2*x + 3*c3*x^2 = 0`, picking the root
/// whose value agrees with `find_min`'s polarity. Falls back to sampling
/// `resolution` points per unit over `[-1, 1]` if neither root lies in
/// range or the derivative has no real root.
pub fn find_extreme_quartic(coefficients: &[f64], find_min: bool, resolution: u32) -> (f64, f64) {
    let d0 = coefficients[1];
    let d1 = 2.0 * coefficients[2];
    let d2 = 3.0 * coefficients[3];

    let analytic = if d2 == 0.0 {
        if d1 == 0.0 {
            None
        } else {
            let x = -d0 / d1;
            Some((x, evaluate(coefficients, x)))
        }
    } else {
        let discriminant = d1 * d1 - 4.0 * d2 * d0;
        if discriminant < 0.0 {
            None
        } else {
            let sqrt_disc = discriminant.sqrt();
            let x1 = (-d1 + sqrt_disc) / (2.0 * d2);
            let x2 = (-d1 - sqrt_disc) / (2.0 * d2);
            let y1 = evaluate(coefficients, x1);
            let y2 = evaluate(coefficients, x2);

            let in_range = |x: f64| (-1.0..=1.0).contains(&x);
            match (in_range(x1), in_range(x2)) {
                (true, true) => {
                    let pick_first = if find_min { y1 <= y2 } else { y1 >= y2 };
                    Some(if pick_first { (x1, y1) } else { (x2, y2) })
                }
                (true, false) => Some((x1, y1)),
                (false, true) => Some((x2, y2)),
                (false, false) => None,
            }
        }
    };

    analytic.unwrap_or_else(|| sample_extreme(coefficients, find_min, -1.0, 1.0, resolution))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_fit_recovers_known_vertex() {
        // y = (x - 0.25)^2 = 0.0625 - 0.5x + x^2, vertex at x=0.25
        let xs = [-1.0, 0.0, 1.0];
        let ys: Vec<f64> = xs.iter().map(|&x| (x - 0.25).powi(2)).collect();
        let coefficients = fit_1d(&xs, &ys, 3).unwrap();
        let (x, _) = find_extreme_quadratic(&coefficients).unwrap();
        assert!((x - 0.25).abs() < 1e-9);
    }

    #[test]
    fn quartic_fit_recovers_known_minimum() {
        let xs = [-2.0, -1.0, 0.0, 1.0, 2.0];
        let ys: Vec<f64> = xs.iter().map(|&x| (x - 0.4).powi(2)).collect();
        let coefficients = fit_1d(&xs, &ys, 4).unwrap();
        let (x, _) = find_extreme_quartic(&coefficients, true, 8);
        assert!((x - 0.4).abs() < 1e-6);
    }
}
