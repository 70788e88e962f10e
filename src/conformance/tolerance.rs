//! Tolerance bands built with the "4.2 rule".
//!
//! The independent-variable uncertainty is pushed through the target
//! function first, then the dependent-variable uncertainty is added on both
//! sides. Because the input is probed on both sides of `x0`, the rule also
//! holds for non-monotone targets.

use std::fmt;

use serde::Deserialize;

use crate::conformance::curve::TargetFunction;
use crate::error::{ConformanceError, Result};

/// Multiplier applied to both accuracies.
pub const ACCURACY_MULTIPLIER: f64 = 1.5;

/// Which edges of a band a measurement is checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sidedness {
    /// `min <= y <= max`.
    #[default]
    Both,
    /// `y <= max` only.
    AtOrBelow,
    /// `y >= min` only.
    AtOrAbove,
}

/// Closed interval of acceptable measured values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceBand {
    pub min: f64,
    pub max: f64,
}

impl ToleranceBand {
    /// Checks `y` against the edges selected by `sidedness`.
    pub fn accepts(&self, y: f64, sidedness: Sidedness) -> bool {
        match sidedness {
            Sidedness::Both => y >= self.min && y <= self.max,
            Sidedness::AtOrBelow => y <= self.max,
            Sidedness::AtOrAbove => y >= self.min,
        }
    }

    /// Signed distance from `y` to the nearest checked edge; negative when outside.
    pub fn margin(&self, y: f64, sidedness: Sidedness) -> f64 {
        match sidedness {
            Sidedness::Both => (y - self.min).min(self.max - y),
            Sidedness::AtOrBelow => self.max - y,
            Sidedness::AtOrAbove => y - self.min,
        }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

impl fmt::Display for ToleranceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.4}, {:.4}]", self.min, self.max)
    }
}

/// Builds the band for target `f` evaluated at `x0`.
///
/// ```text
/// lo = f(x0 - 1.5*xacc),  hi = f(x0 + 1.5*xacc)
/// band = [min(lo, hi) - 1.5*yacc, max(lo, hi) + 1.5*yacc]
/// ```
///
/// `xacc` may be zero for an input that is commanded rather than measured.
///
/// # Errors
///
/// Returns `ToleranceComputation` if `xacc` is negative or non-finite, or
/// `yacc` is not positive.
///
/// # Examples
///
/// ```
/// use der_conformance::conformance::curve::TargetFn;
/// use der_conformance::conformance::tolerance::tolerance_band;
///
/// let band = tolerance_band(&TargetFn(|x: f64| x), 1.0, 0.1, 0.1).unwrap();
/// assert!((band.min - 0.7).abs() < 1e-12);
/// assert!((band.max - 1.3).abs() < 1e-12);
/// ```
pub fn tolerance_band<F: TargetFunction + ?Sized>(
    f: &F,
    x0: f64,
    xacc: f64,
    yacc: f64,
) -> Result<ToleranceBand> {
    if !xacc.is_finite() || xacc < 0.0 {
        return Err(ConformanceError::ToleranceComputation {
            quantity: "independent variable accuracy",
            value: xacc,
        });
    }
    if !yacc.is_finite() || yacc <= 0.0 {
        return Err(ConformanceError::ToleranceComputation {
            quantity: "dependent variable accuracy",
            value: yacc,
        });
    }

    let lo = f.y_of_x(x0 - ACCURACY_MULTIPLIER * xacc);
    let hi = f.y_of_x(x0 + ACCURACY_MULTIPLIER * xacc);
    Ok(ToleranceBand {
        min: lo.min(hi) - ACCURACY_MULTIPLIER * yacc,
        max: lo.max(hi) + ACCURACY_MULTIPLIER * yacc,
    })
}
