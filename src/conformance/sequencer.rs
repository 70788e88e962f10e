//! Stimulus sequences that walk a curve's breakpoints.

use std::fmt;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::conformance::curve::PiecewiseCurve;
use crate::error::{ConformanceError, Result};

/// Relative tolerance for treating two stimulus values as the same.
const VALUE_TOLERANCE: f64 = 1e-9;

/// One stimulus in a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPoint {
    pub label: String,
    pub value: f64,
}

impl fmt::Display for StepPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:.4}", self.label, self.value)
    }
}

/// Direction of a walk away from the reference point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Excursion {
    /// Ascend to the domain maximum, then come back down.
    Up,
    /// Descend to the domain minimum, then come back up.
    Down,
}

/// Declarative filter over generated stimuli.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipRule {
    /// Drop the straddling pair of the n-th breakpoint (0-based).
    Breakpoint(usize),
    /// Drop every stimulus below this value.
    Below(f64),
    /// Drop every stimulus above this value.
    Above(f64),
}

impl SkipRule {
    fn skips(&self, point: &Candidate) -> bool {
        match *self {
            SkipRule::Breakpoint(i) => point.breakpoint == Some(i),
            SkipRule::Below(x) => point.value < x,
            SkipRule::Above(x) => point.value > x,
        }
    }
}

/// Generated stimulus before routing.
#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    value: f64,
    /// Breakpoint this value straddles; `None` for midpoints.
    breakpoint: Option<usize>,
}

/// Builds the "walk up, then walk back down" sequence shared by the curve tests.
///
/// For every breakpoint `x_i` it generates `x_i - margin` and
/// `x_i + margin`, and between consecutive breakpoints their midpoint.
/// Values outside `[lo + margin, hi - margin]` are dropped with a warning,
/// since the EUT cannot accept a stimulus beyond its declared envelope.
/// Order follows declaration order and is never re-sorted; of two values
/// that coincide, the later label is kept.
///
/// # Examples
///
/// ```
/// use der_conformance::conformance::curve::PiecewiseCurve;
/// use der_conformance::conformance::sequencer::{CurveStepSequencer, Excursion};
///
/// let curve = PiecewiseCurve::new(&[0.92, 0.98, 1.02, 1.08], &[0.44, 0.0, 0.0, -0.44]).unwrap();
/// let seq = CurveStepSequencer::new((0.88, 1.10), 0.01, 1.0)
///     .unwrap()
///     .with_excursions(vec![Excursion::Up]);
/// let steps = seq.traverse(&curve);
/// assert_eq!(steps.first().map(|s| s.label.as_str()), Some("up x3-a"));
/// assert_eq!(steps.last().map(|s| s.value), Some(1.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CurveStepSequencer {
    domain: (f64, f64),
    margin: f64,
    reference: f64,
    excursions: Vec<Excursion>,
    skip: Vec<SkipRule>,
}

impl CurveStepSequencer {
    /// Creates a sequencer walking up then down around `reference`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurve` for an empty or inverted domain or a reference
    /// within `margin` of its edges, `ToleranceComputation` for a negative
    /// margin.
    pub fn new(domain: (f64, f64), margin: f64, reference: f64) -> Result<Self> {
        let (lo, hi) = domain;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(ConformanceError::InvalidCurve {
                reason: format!("stimulus domain [{lo}, {hi}] is empty"),
            });
        }
        if !margin.is_finite() || margin < 0.0 {
            return Err(ConformanceError::ToleranceComputation {
                quantity: "stimulus margin",
                value: margin,
            });
        }
        // the route ends on the reference, so it must be a valid stimulus too
        let (min_ok, max_ok) = (lo + margin, hi - margin);
        if !((reference > min_ok || same(reference, min_ok))
            && (reference < max_ok || same(reference, max_ok)))
        {
            return Err(ConformanceError::InvalidCurve {
                reason: format!("reference {reference} outside envelope [{min_ok}, {max_ok}]"),
            });
        }
        Ok(Self {
            domain,
            margin,
            reference,
            excursions: vec![Excursion::Up, Excursion::Down],
            skip: Vec::new(),
        })
    }

    /// Replaces the walks to perform, in order.
    pub fn with_excursions(mut self, excursions: Vec<Excursion>) -> Self {
        self.excursions = excursions;
        self
    }

    pub fn with_skip(mut self, rule: SkipRule) -> Self {
        self.skip.push(rule);
        self
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Every accepted stimulus in declaration order, before routing.
    pub fn candidates(&self, breakpoints: &[f64]) -> Vec<StepPoint> {
        self.accepted(breakpoints)
            .into_iter()
            .map(|c| StepPoint {
                label: c.name,
                value: c.value,
            })
            .collect()
    }

    /// Full route: each excursion walks out from the reference to the
    /// domain edge, retraces its steps, and ends on the reference.
    pub fn traverse(&self, curve: &PiecewiseCurve) -> Vec<StepPoint> {
        let accepted = self.accepted(curve.breakpoints());
        let mut route = Vec::new();

        for excursion in &self.excursions {
            let mut leg: Vec<&Candidate> = match excursion {
                Excursion::Up => accepted
                    .iter()
                    .filter(|c| c.value > self.reference && !same(c.value, self.reference))
                    .collect(),
                Excursion::Down => accepted
                    .iter()
                    .filter(|c| c.value < self.reference && !same(c.value, self.reference))
                    .collect(),
            };
            if leg.is_empty() {
                debug!(?excursion, "no stimuli on this side of the reference");
                continue;
            }
            let outward = match excursion {
                Excursion::Up => "up",
                Excursion::Down => {
                    leg.reverse();
                    "down"
                }
            };

            for c in &leg {
                route.push(StepPoint {
                    label: format!("{outward} {}", c.name),
                    value: c.value,
                });
            }
            for c in leg.iter().rev().skip(1) {
                route.push(StepPoint {
                    label: format!("return {}", c.name),
                    value: c.value,
                });
            }
            route.push(StepPoint {
                label: "ref".to_string(),
                value: self.reference,
            });
        }
        route
    }

    fn generate(breakpoints: &[f64], margin: f64) -> Vec<Candidate> {
        let mut out = Vec::with_capacity(breakpoints.len() * 3);
        for (i, &x) in breakpoints.iter().enumerate() {
            let n = i + 1;
            out.push(Candidate {
                name: format!("x{n}-a"),
                value: x - margin,
                breakpoint: Some(i),
            });
            out.push(Candidate {
                name: format!("x{n}+a"),
                value: x + margin,
                breakpoint: Some(i),
            });
            if let Some(&next) = breakpoints.get(i + 1) {
                out.push(Candidate {
                    name: format!("x{n}/x{}", n + 1),
                    value: 0.5 * (x + next),
                    breakpoint: None,
                });
            }
        }
        out
    }

    fn accepted(&self, breakpoints: &[f64]) -> Vec<Candidate> {
        let (lo, hi) = self.domain;
        let (min_ok, max_ok) = (lo + self.margin, hi - self.margin);
        let mut kept: Vec<Candidate> = Vec::new();

        for c in Self::generate(breakpoints, self.margin) {
            if let Some(rule) = self.skip.iter().find(|r| r.skips(&c)) {
                debug!(label = %c.name, value = c.value, ?rule, "stimulus skipped");
                continue;
            }
            let inside = (c.value > min_ok || same(c.value, min_ok))
                && (c.value < max_ok || same(c.value, max_ok));
            if !inside {
                warn!(
                    label = %c.name,
                    value = c.value,
                    min = min_ok,
                    max = max_ok,
                    "stimulus outside the EUT operating envelope, dropped"
                );
                continue;
            }
            kept.retain(|k| !same(k.value, c.value));
            kept.push(c);
        }
        kept
    }
}

fn same(a: f64, b: f64) -> bool {
    (a - b).abs() <= VALUE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BREAKPOINTS: [f64; 4] = [0.9, 0.98, 1.02, 1.08];

    fn values(points: &[StepPoint]) -> Vec<f64> {
        points.iter().map(|p| p.value).collect()
    }

    fn contains(points: &[StepPoint], v: f64) -> bool {
        points.iter().any(|p| same(p.value, v))
    }

    #[test]
    fn emits_pairs_and_midpoints_inside_domain() {
        let seq = CurveStepSequencer::new((0.88, 1.10), 0.01, 1.0).unwrap();
        let points = seq.candidates(&BREAKPOINTS);
        for x in BREAKPOINTS {
            assert!(contains(&points, x - 0.01), "missing {x}-a");
            assert!(contains(&points, x + 0.01), "missing {x}+a");
        }
        for w in BREAKPOINTS.windows(2) {
            assert!(contains(&points, 0.5 * (w[0] + w[1])));
        }
        assert_eq!(points.len(), 11);
    }

    #[test]
    fn drops_values_within_margin_of_bounds() {
        let seq = CurveStepSequencer::new((0.885, 1.085), 0.01, 1.0).unwrap();
        let points = seq.candidates(&BREAKPOINTS);
        assert!(!contains(&points, 0.89));
        assert!(!contains(&points, 1.09));
        assert!(points.iter().all(|p| p.value >= 0.895 - 1e-9 && p.value <= 1.075 + 1e-9));
    }

    #[test]
    fn keeps_declaration_order() {
        let seq = CurveStepSequencer::new((0.88, 1.10), 0.01, 1.0).unwrap();
        let labels: Vec<String> = seq
            .candidates(&BREAKPOINTS)
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(&labels[..3], &["x1-a", "x1+a", "x1/x2"]);
        assert_eq!(labels.last().map(String::as_str), Some("x4+a"));
    }

    #[test]
    fn duplicate_keeps_later_label() {
        // margin equal to half the gap puts x1+a on the x1/x2 midpoint
        let seq = CurveStepSequencer::new((0.0, 10.0), 1.0, 5.0).unwrap();
        let points = seq.candidates(&[2.0, 4.0, 8.0]);
        let at_three: Vec<&StepPoint> = points.iter().filter(|p| same(p.value, 3.0)).collect();
        assert_eq!(at_three.len(), 1);
        assert_eq!(at_three[0].label, "x1/x2");
    }

    #[test]
    fn walks_up_back_down_then_down_back_up() {
        let curve =
            PiecewiseCurve::new(&BREAKPOINTS, &[0.44, 0.0, 0.0, -0.44]).unwrap();
        let seq = CurveStepSequencer::new((0.88, 1.10), 0.01, 1.0).unwrap();
        let route = seq.traverse(&curve);
        let v = values(&route);

        let expected_up = [1.01, 1.03, 1.05, 1.07, 1.09, 1.07, 1.05, 1.03, 1.01, 1.0];
        let expected_down = [0.99, 0.97, 0.94, 0.91, 0.89, 0.91, 0.94, 0.97, 0.99, 1.0];
        assert_eq!(v.len(), expected_up.len() + expected_down.len());
        for (got, want) in v.iter().zip(expected_up.iter().chain(&expected_down)) {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
        assert_eq!(route[0].label, "up x3-a");
        assert_eq!(route[5].label, "return x4-a");
        assert_eq!(route[9].label, "ref");
        assert_eq!(route[10].label, "down x2+a");
    }

    #[test]
    fn skip_rules_are_declarative() {
        let seq = CurveStepSequencer::new((0.88, 1.10), 0.01, 1.0)
            .unwrap()
            .with_skip(SkipRule::Breakpoint(3))
            .with_skip(SkipRule::Below(0.95));
        let points = seq.candidates(&BREAKPOINTS);
        assert!(!contains(&points, 1.07));
        assert!(!contains(&points, 1.09));
        assert!(contains(&points, 1.05));
        assert!(points.iter().all(|p| p.value >= 0.95));
    }

    #[test]
    fn one_directional_walk() {
        let curve = PiecewiseCurve::new(&[0.2, 0.5, 1.0], &[0.0, 0.0, -0.44]).unwrap();
        let seq = CurveStepSequencer::new((0.0, 1.0), 0.05, 0.3)
            .unwrap()
            .with_excursions(vec![Excursion::Up]);
        let route = seq.traverse(&curve);
        assert!(route.iter().all(|p| p.value >= 0.3 - 1e-9));
        assert_eq!(route.last().map(|p| p.label.as_str()), Some("ref"));
    }

    #[test]
    fn rejects_bad_construction() {
        assert!(CurveStepSequencer::new((1.0, 1.0), 0.01, 1.0).is_err());
        assert!(CurveStepSequencer::new((0.9, 1.1), -0.01, 1.0).is_err());
        assert!(CurveStepSequencer::new((0.9, 1.1), 0.01, 1.2).is_err());
    }

    #[test]
    fn reference_must_clear_the_margin() {
        // inside the domain but within the margin of its upper edge
        let err = CurveStepSequencer::new((0.88, 1.10), 0.01, 1.095).unwrap_err();
        assert!(matches!(err, ConformanceError::InvalidCurve { .. }));
        // exactly on the envelope edge is allowed
        let seq = CurveStepSequencer::new((0.88, 1.10), 0.01, 1.09).unwrap();
        let curve = PiecewiseCurve::new(&[0.9, 0.98, 1.02, 1.08], &[0.44, 0.0, 0.0, -0.44]).unwrap();
        let route = seq.traverse(&curve);
        assert!(route.iter().all(|p| p.value >= 0.89 - 1e-9 && p.value <= 1.09 + 1e-9));
        assert_eq!(route.last().map(|p| p.label.as_str()), Some("ref"));
    }
}
