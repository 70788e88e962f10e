//! EUT nameplate ratings.

use serde::Deserialize;

use crate::error::{ConformanceError, Result};

/// Normal-operating-performance category of the EUT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Category {
    A,
    #[default]
    B,
}

/// Rated values read off the EUT nameplate.
///
/// Curves and accuracy models are derived from these once per EUT.
#[derive(Debug, Clone, PartialEq)]
pub struct Nameplate {
    /// Rated active power (W).
    pub p_rated: f64,
    /// Rated apparent power (VA).
    pub s_rated: f64,
    /// Nominal voltage (V).
    pub v_nom: f64,
    /// Minimum operating voltage (V).
    pub v_min: f64,
    /// Maximum operating voltage (V).
    pub v_max: f64,
    /// Nominal frequency (Hz).
    pub f_nom: f64,
    /// Minimum operating frequency (Hz).
    pub f_min: f64,
    /// Maximum operating frequency (Hz).
    pub f_max: f64,
    /// Performance category.
    pub category: Category,
}

impl Nameplate {
    /// Checks that ratings are positive and every nominal sits inside its range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurve` naming the first inconsistent rating, since
    /// every curve built from this nameplate would be malformed.
    pub fn check(&self) -> Result<()> {
        let ratings = [
            ("p_rated", self.p_rated),
            ("s_rated", self.s_rated),
            ("v_nom", self.v_nom),
            ("f_nom", self.f_nom),
        ];
        if let Some((name, value)) = ratings
            .iter()
            .find(|(_, v)| !v.is_finite() || *v <= 0.0)
        {
            return Err(ConformanceError::InvalidCurve {
                reason: format!("nameplate {name} must be positive, got {value}"),
            });
        }
        if !(self.v_min < self.v_nom && self.v_nom < self.v_max) {
            return Err(ConformanceError::InvalidCurve {
                reason: "nameplate voltage range must satisfy v_min < v_nom < v_max".into(),
            });
        }
        if !(self.f_min < self.f_nom && self.f_nom < self.f_max) {
            return Err(ConformanceError::InvalidCurve {
                reason: "nameplate frequency range must satisfy f_min < f_nom < f_max".into(),
            });
        }
        Ok(())
    }
}
