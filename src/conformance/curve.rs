//! Piecewise-linear target curves and the target-function strategy.

use crate::error::{ConformanceError, Result};

/// Anything that maps an independent quantity to the expected response.
///
/// The evaluator only ever asks for `y_of_x`, so control modes plug in
/// their own targets (a curve, a shifted curve, a closure) without the
/// evaluator knowing which one it is holding.
pub trait TargetFunction {
    /// Expected dependent value at `x`.
    fn y_of_x(&self, x: f64) -> f64;
}

impl<T: TargetFunction + ?Sized> TargetFunction for &T {
    fn y_of_x(&self, x: f64) -> f64 {
        (**self).y_of_x(x)
    }
}

/// Closure adapter for ad-hoc targets.
///
/// # Examples
///
/// ```
/// use der_conformance::conformance::curve::{TargetFn, TargetFunction};
///
/// let double = TargetFn(|x: f64| 2.0 * x);
/// assert_eq!(double.y_of_x(1.5), 3.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TargetFn<F>(pub F);

impl<F: Fn(f64) -> f64> TargetFunction for TargetFn<F> {
    fn y_of_x(&self, x: f64) -> f64 {
        (self.0)(x)
    }
}

/// Evaluates `inner` with its input shifted by `shift`, i.e. `inner(x - shift)`.
///
/// Used for curves defined against an autonomously adjusted reference
/// (a volt-var curve following a moved `V_ref`). The shift is applied here,
/// on the caller side, so the curve itself stays generic.
#[derive(Debug, Clone)]
pub struct Shifted<T> {
    pub inner: T,
    pub shift: f64,
}

impl<T: TargetFunction> TargetFunction for Shifted<T> {
    fn y_of_x(&self, x: f64) -> f64 {
        self.inner.y_of_x(x - self.shift)
    }
}

/// Monotone breakpoint table with linear interpolation and boundary clamping.
///
/// Immutable once built. Inside `[x_min, x_max]` the value is linearly
/// interpolated between neighbouring breakpoints; outside it clamps to the
/// nearest boundary `y`.
///
/// # Examples
///
/// ```
/// use der_conformance::conformance::curve::{PiecewiseCurve, TargetFunction};
///
/// let vv = PiecewiseCurve::new(&[0.92, 0.98, 1.02, 1.08], &[0.44, 0.0, 0.0, -0.44]).unwrap();
/// assert_eq!(vv.y_of_x(1.0), 0.0);
/// assert_eq!(vv.y_of_x(1.2), -0.44);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseCurve {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl PiecewiseCurve {
    /// Builds a curve from parallel breakpoint slices.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurve` when the slices differ in length, hold fewer
    /// than two points, contain non-finite values, or `x` is not strictly
    /// increasing.
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(invalid(format!(
                "{} x breakpoints but {} y values",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(invalid(format!(
                "need at least 2 breakpoints, got {}",
                xs.len()
            )));
        }
        if let Some(i) = xs
            .iter()
            .zip(ys)
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(invalid(format!("breakpoint {i} is not finite")));
        }
        if let Some(i) = xs.windows(2).position(|w| w[1] <= w[0]) {
            return Err(invalid(format!(
                "x must be strictly increasing: x[{}]={} then x[{}]={}",
                i,
                xs[i],
                i + 1,
                xs[i + 1]
            )));
        }

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        })
    }

    /// Rescales both axes, e.g. to turn a per-unit table into physical units.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurve` if `x_base` is not positive (a non-positive
    /// base would break the ordering of the breakpoints).
    pub fn scaled(&self, x_base: f64, y_base: f64) -> Result<Self> {
        if x_base.is_nan() || x_base <= 0.0 || !y_base.is_finite() {
            return Err(invalid(format!(
                "scale bases must be finite with x_base > 0, got ({x_base}, {y_base})"
            )));
        }
        let xs: Vec<f64> = self.xs.iter().map(|x| x * x_base).collect();
        let ys: Vec<f64> = self.ys.iter().map(|y| y * y_base).collect();
        Self::new(&xs, &ys)
    }

    /// Moves every breakpoint by `dx` along the input axis.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurve` if `dx` is not finite.
    pub fn shifted(&self, dx: f64) -> Result<Self> {
        let xs: Vec<f64> = self.xs.iter().map(|x| x + dx).collect();
        Self::new(&xs, &self.ys)
    }

    /// Breakpoint abscissae, strictly increasing.
    pub fn breakpoints(&self) -> &[f64] {
        &self.xs
    }

    /// Breakpoint ordinates, parallel to [`breakpoints`](Self::breakpoints).
    pub fn values(&self) -> &[f64] {
        &self.ys
    }

    pub fn x_min(&self) -> f64 {
        self.xs[0]
    }

    pub fn x_max(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }
}

impl TargetFunction for PiecewiseCurve {
    fn y_of_x(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let last = self.xs.len() - 1;
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[last] {
            return self.ys[last];
        }

        // xs[i - 1] <= x < xs[i]
        let i = self.xs.partition_point(|&xi| xi <= x);
        let (x0, x1) = (self.xs[i - 1], self.xs[i]);
        let (y0, y1) = (self.ys[i - 1], self.ys[i]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

fn invalid(reason: String) -> ConformanceError {
    ConformanceError::InvalidCurve { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volt_var() -> PiecewiseCurve {
        PiecewiseCurve::new(&[0.92, 0.98, 1.02, 1.08], &[0.44, 0.0, 0.0, -0.44]).unwrap()
    }

    #[test]
    fn exact_at_breakpoints() {
        let c = volt_var();
        for (x, y) in c.breakpoints().iter().zip(c.values()) {
            assert_eq!(c.y_of_x(*x), *y);
        }
    }

    #[test]
    fn interpolates_between_breakpoints() {
        let c = volt_var();
        assert!((c.y_of_x(1.05) - -0.22).abs() < 1e-12);
        assert!((c.y_of_x(0.95) - 0.22).abs() < 1e-12);
    }

    #[test]
    fn clamps_outside_domain() {
        let c = volt_var();
        assert_eq!(c.y_of_x(0.5), 0.44);
        assert_eq!(c.y_of_x(2.0), -0.44);
        let once = c.y_of_x(1.2);
        assert_eq!(c.y_of_x(1.3), once);
    }

    #[test]
    fn rejects_unsorted_breakpoints() {
        let err = PiecewiseCurve::new(&[1.0, 0.9], &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, ConformanceError::InvalidCurve { .. }));
    }

    #[test]
    fn rejects_repeated_breakpoint() {
        assert!(PiecewiseCurve::new(&[1.0, 1.0, 1.1], &[0.0, 0.5, 1.0]).is_err());
    }

    #[test]
    fn rejects_mismatched_lengths_and_single_point() {
        assert!(PiecewiseCurve::new(&[1.0, 1.1], &[0.0]).is_err());
        assert!(PiecewiseCurve::new(&[1.0], &[0.0]).is_err());
        assert!(PiecewiseCurve::new(&[1.0, f64::NAN], &[0.0, 1.0]).is_err());
    }

    #[test]
    fn scaled_curve_tracks_per_unit_curve() {
        let pu = volt_var();
        let phys = pu.scaled(240.0, 5000.0).unwrap();
        assert!((phys.y_of_x(1.05 * 240.0) - pu.y_of_x(1.05) * 5000.0).abs() < 1e-6);
        assert!(pu.scaled(0.0, 1.0).is_err());
    }

    #[test]
    fn shifted_target_moves_the_input() {
        let c = volt_var();
        let shifted = Shifted {
            inner: &c,
            shift: 0.02,
        };
        assert!((shifted.y_of_x(1.07) - c.y_of_x(1.05)).abs() < 1e-12);
    }
}
