//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::conformance::accuracy::{AccuracyModel, DEFAULT_FREQUENCY_MRA_HZ};
use crate::conformance::curve::PiecewiseCurve;
use crate::conformance::sequencer::{CurveStepSequencer, Excursion, SkipRule, StepPoint};
use crate::conformance::tolerance::Sidedness;
use crate::env::SimEnvironment;
use crate::error::Result;
use crate::eut::{Category, ControlMode, Nameplate, SimulatedEut};
use crate::procedure::{CurveProcedure, OnFault, RunContext, StimulusPlan};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the Category B volt-var scenario.
/// Load from TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::volt_var`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// EUT nameplate ratings.
    #[serde(default)]
    pub eut: EutConfig,
    /// Bench measurement accuracy.
    #[serde(default)]
    pub accuracy: AccuracyConfig,
    /// Characteristic curve in per-unit.
    #[serde(default)]
    pub curve: CurveConfig,
    /// Test procedure parameters.
    #[serde(default)]
    pub procedure: ProcedureConfig,
    /// Simulated EUT and grid.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// EUT nameplate ratings, in physical units.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EutConfig {
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
    /// Performance category: `"A"` or `"B"`.
    pub category: Category,
}

impl Default for EutConfig {
    fn default() -> Self {
        Self {
            p_rated: 5000.0,
            s_rated: 5000.0,
            v_nom: 240.0,
            v_min: 211.2,
            v_max: 264.0,
            f_nom: 60.0,
            f_min: 56.5,
            f_max: 66.0,
            category: Category::B,
        }
    }
}

/// Bench measurement accuracy.
///
/// Voltage and power accuracies follow from the nameplate; only the
/// frequency accuracy is absolute.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccuracyConfig {
    /// Frequency measurement accuracy (Hz).
    pub frequency_hz: f64,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_MRA_HZ,
        }
    }
}

/// Characteristic curve breakpoints in per-unit of the mode's bases.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CurveConfig {
    /// Input breakpoints (pu, strictly increasing).
    pub x: Vec<f64>,
    /// Output values at each breakpoint (pu).
    pub y: Vec<f64>,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            x: vec![0.92, 0.98, 1.02, 1.08],
            y: vec![0.44, 0.0, 0.0, -0.44],
        }
    }
}

/// Test procedure parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcedureConfig {
    /// Control function under test.
    pub mode: ControlMode,
    /// Open-loop response time (s, must be > 0).
    pub olrt: f64,
    /// Observation window per step, in multiples of the olrt (must be > 1).
    pub window_multiple: f64,
    /// Stimulus margin around each breakpoint, in multiples of the input accuracy.
    pub margin_multiple: f64,
    /// Curve input the EUT rests at before stepping (pu).
    pub reference: f64,
    /// Walks away from the reference, in order.
    pub excursions: Vec<Excursion>,
    /// Stimuli to leave out of the walk (values in pu).
    pub skip: Vec<SkipRule>,
    /// Which band edges each check uses.
    pub sidedness: Sidedness,
    /// What to do when a step faults: `"abort"` or `"record_failure"`.
    pub on_fault: OnFault,
    /// Stop settling after this many consecutive in-band samples.
    pub settle_early_exit: Option<usize>,
    /// Available active power per run, as fractions of rated (0.0-1.0].
    pub power_levels: Vec<f64>,
    /// Repetitions per power level (must be > 0).
    pub iterations: usize,
    /// Explicit curve inputs (pu); replaces the breakpoint walk when non-empty.
    pub setpoints: Vec<f64>,
    /// Shift of the curve along its input axis (pu).
    pub vref_shift: f64,
}

impl Default for ProcedureConfig {
    fn default() -> Self {
        Self {
            mode: ControlMode::VoltVar,
            olrt: 5.0,
            window_multiple: 4.0,
            margin_multiple: 1.5,
            reference: 1.0,
            excursions: vec![Excursion::Up, Excursion::Down],
            skip: Vec::new(),
            sidedness: Sidedness::Both,
            on_fault: OnFault::Abort,
            settle_early_exit: None,
            power_levels: vec![1.0],
            iterations: 1,
            setpoints: Vec::new(),
            vref_shift: 0.0,
        }
    }
}

/// Simulated EUT and grid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Seed for measurement noise.
    pub seed: u64,
    /// Output measurement noise standard deviation (pu of the output base).
    pub noise_std: f64,
    /// Time the simulated EUT takes to cover 90% of a step (s); the
    /// procedure olrt when omitted.
    pub response_time: Option<f64>,
    /// Calibration gain on the curve output.
    pub gain: f64,
    /// Calibration offset on the curve output (pu of the output base).
    pub offset: f64,
    /// Time each stimulus takes to apply (s).
    pub settling_delay: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            noise_std: 0.002,
            response_time: None,
            gain: 1.0,
            offset: 0.0,
            settling_delay: 0.1,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"procedure.olrt"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ScenarioConfig {
    /// Returns the Category B volt-var scenario.
    pub fn volt_var() -> Self {
        Self {
            eut: EutConfig::default(),
            accuracy: AccuracyConfig::default(),
            curve: CurveConfig::default(),
            procedure: ProcedureConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }

    /// Returns the Category A volt-var scenario: no deadband, smaller reactive range.
    pub fn volt_var_cat_a() -> Self {
        Self {
            eut: EutConfig {
                category: Category::A,
                ..EutConfig::default()
            },
            curve: CurveConfig {
                x: vec![0.90, 1.0, 1.10],
                y: vec![0.25, 0.0, -0.25],
            },
            procedure: ProcedureConfig {
                olrt: 10.0,
                ..ProcedureConfig::default()
            },
            ..Self::volt_var()
        }
    }

    /// Returns the volt-watt scenario: active power curtailed above 1.06 pu.
    pub fn volt_watt() -> Self {
        Self {
            curve: CurveConfig {
                x: vec![1.06, 1.10],
                y: vec![1.0, 0.2],
            },
            procedure: ProcedureConfig {
                mode: ControlMode::VoltWatt,
                olrt: 10.0,
                excursions: vec![Excursion::Up],
                ..ProcedureConfig::default()
            },
            ..Self::volt_var()
        }
    }

    /// Returns the watt-var scenario: absorption above half rated power.
    pub fn watt_var() -> Self {
        Self {
            curve: CurveConfig {
                x: vec![0.2, 0.5, 1.0],
                y: vec![0.0, 0.0, -0.44],
            },
            procedure: ProcedureConfig {
                mode: ControlMode::WattVar,
                olrt: 10.0,
                reference: 0.1,
                excursions: vec![Excursion::Up],
                ..ProcedureConfig::default()
            },
            ..Self::volt_var()
        }
    }

    /// Returns the over-frequency droop scenario (36 mHz deadband, 5% droop).
    pub fn freq_watt() -> Self {
        Self {
            curve: CurveConfig {
                x: vec![1.0006, 1.0506],
                y: vec![1.0, 0.0],
            },
            procedure: ProcedureConfig {
                mode: ControlMode::FreqWatt,
                olrt: 5.0,
                excursions: vec![Excursion::Up],
                ..ProcedureConfig::default()
            },
            ..Self::volt_var()
        }
    }

    /// Returns the active power limit scenario: 66%, 33%, 0%, then released.
    pub fn power_limit() -> Self {
        Self {
            curve: CurveConfig {
                x: vec![0.0, 1.0],
                y: vec![0.0, 1.0],
            },
            procedure: ProcedureConfig {
                mode: ControlMode::ActivePowerLimit,
                olrt: 30.0,
                excursions: Vec::new(),
                setpoints: vec![0.66, 0.33, 0.0, 1.0],
                ..ProcedureConfig::default()
            },
            ..Self::volt_var()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &[
        "volt_var",
        "volt_var_cat_a",
        "volt_watt",
        "watt_var",
        "freq_watt",
        "power_limit",
    ];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> std::result::Result<Self, ConfigError> {
        match name {
            "volt_var" => Ok(Self::volt_var()),
            "volt_var_cat_a" => Ok(Self::volt_var_cat_a()),
            "volt_watt" => Ok(Self::volt_watt()),
            "watt_var" => Ok(Self::watt_var()),
            "freq_watt" => Ok(Self::freq_watt()),
            "power_limit" => Ok(Self::power_limit()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ConfigError {
                field: field.into(),
                message,
            });
        };

        let nameplate = self.nameplate();
        if let Err(e) = nameplate.check() {
            push("eut", e.to_string());
        }

        let a = &self.accuracy;
        if !(a.frequency_hz.is_finite() && a.frequency_hz > 0.0) {
            push("accuracy.frequency_hz", "must be > 0".into());
        }

        if let Err(e) = PiecewiseCurve::new(&self.curve.x, &self.curve.y) {
            push("curve", e.to_string());
        }

        let p = &self.procedure;
        if !(p.olrt.is_finite() && p.olrt > 0.0) {
            push("procedure.olrt", "must be > 0".into());
        }
        if !(p.window_multiple.is_finite() && p.window_multiple > 1.0) {
            push("procedure.window_multiple", "must be > 1".into());
        }
        if !(p.margin_multiple.is_finite() && p.margin_multiple >= 0.0) {
            push("procedure.margin_multiple", "must be >= 0".into());
        }
        let (lo, hi) = p.mode.x_domain(&nameplate);
        let reference = p.reference * p.mode.x_base(&nameplate);
        // stepped plans start and end on the reference, so it must clear the margin
        let margin = match self.accuracy_model() {
            Ok(acc) if p.setpoints.is_empty() => {
                p.margin_multiple.max(0.0) * p.mode.x_accuracy(&acc)
            }
            _ => 0.0,
        };
        if !(reference >= lo + margin && reference <= hi - margin) {
            push(
                "procedure.reference",
                format!(
                    "{reference} is outside the stimulus envelope [{}, {}]",
                    lo + margin,
                    hi - margin
                ),
            );
        }
        if p.power_levels.is_empty() {
            push("procedure.power_levels", "must not be empty".into());
        }
        if p.power_levels.iter().any(|l| !(*l > 0.0 && *l <= 1.0)) {
            push("procedure.power_levels", "each level must be in (0.0, 1.0]".into());
        }
        if p.iterations == 0 {
            push("procedure.iterations", "must be > 0".into());
        }
        if p.setpoints.iter().any(|s| !(s.is_finite() && *s >= 0.0)) {
            push("procedure.setpoints", "must be finite and >= 0".into());
        }
        if p.setpoints.is_empty() && p.excursions.is_empty() {
            push(
                "procedure.excursions",
                "must not be empty when no explicit setpoints are given".into(),
            );
        }
        if !p.vref_shift.is_finite() {
            push("procedure.vref_shift", "must be finite".into());
        }

        let s = &self.simulation;
        if !(s.noise_std.is_finite() && s.noise_std >= 0.0) {
            push("simulation.noise_std", "must be >= 0".into());
        }
        if s.response_time.is_some_and(|t| !(t.is_finite() && t >= 0.0)) {
            push("simulation.response_time", "must be >= 0".into());
        }
        if !s.gain.is_finite() {
            push("simulation.gain", "must be finite".into());
        }
        if !s.offset.is_finite() {
            push("simulation.offset", "must be finite".into());
        }
        if !(s.settling_delay.is_finite() && s.settling_delay >= 0.0) {
            push("simulation.settling_delay", "must be >= 0".into());
        }

        errors
    }

    pub fn nameplate(&self) -> Nameplate {
        let e = &self.eut;
        Nameplate {
            p_rated: e.p_rated,
            s_rated: e.s_rated,
            v_nom: e.v_nom,
            v_min: e.v_min,
            v_max: e.v_max,
            f_nom: e.f_nom,
            f_min: e.f_min,
            f_max: e.f_max,
            category: e.category,
        }
    }

    /// Builds the accuracy model for the configured bench and EUT.
    ///
    /// # Errors
    ///
    /// Returns `ToleranceComputation` for non-positive ratings or accuracy.
    pub fn accuracy_model(&self) -> Result<AccuracyModel> {
        AccuracyModel::from_nameplate(&self.nameplate(), self.accuracy.frequency_hz)
    }

    /// The configured curve in physical units of the mode's bases.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurve` for malformed breakpoints or bases.
    pub fn physical_curve(&self) -> Result<PiecewiseCurve> {
        let nameplate = self.nameplate();
        let mode = self.procedure.mode;
        PiecewiseCurve::new(&self.curve.x, &self.curve.y)?
            .scaled(mode.x_base(&nameplate), mode.y_base(&nameplate))
    }

    /// Builds the test procedure.
    ///
    /// # Errors
    ///
    /// Returns the first fault met while building the curve, accuracy model
    /// or sequencer.
    pub fn procedure(&self) -> Result<CurveProcedure> {
        let nameplate = self.nameplate();
        let p = &self.procedure;
        let x_base = p.mode.x_base(&nameplate);
        let accuracy = self.accuracy_model()?;
        let reference = p.reference * x_base;

        let plan = if p.setpoints.is_empty() {
            let margin = p.margin_multiple * p.mode.x_accuracy(&accuracy);
            let mut sequencer =
                CurveStepSequencer::new(p.mode.x_domain(&nameplate), margin, reference)?
                    .with_excursions(p.excursions.clone());
            for rule in &p.skip {
                sequencer = sequencer.with_skip(match *rule {
                    SkipRule::Breakpoint(i) => SkipRule::Breakpoint(i),
                    SkipRule::Below(x) => SkipRule::Below(x * x_base),
                    SkipRule::Above(x) => SkipRule::Above(x * x_base),
                });
            }
            StimulusPlan::Traverse(sequencer)
        } else {
            StimulusPlan::Explicit(
                p.setpoints
                    .iter()
                    .map(|&pu| StepPoint {
                        label: format!("{:.0}%", 100.0 * pu),
                        value: pu * x_base,
                    })
                    .collect(),
            )
        };

        Ok(CurveProcedure::new(
            p.mode,
            self.physical_curve()?,
            p.olrt,
            reference,
            plan,
            accuracy,
        )
        .with_window_multiple(p.window_multiple)
        .with_vref_shift(p.vref_shift * x_base)
        .with_sidedness(p.sidedness)
        .with_settle_early_exit(p.settle_early_exit))
    }

    /// One context per power level and iteration, levels outermost.
    pub fn run_contexts(&self) -> Vec<RunContext> {
        let p = &self.procedure;
        p.power_levels
            .iter()
            .flat_map(|&level| {
                (1..=p.iterations).map(move |i| RunContext::new(level, i, p.on_fault))
            })
            .collect()
    }

    /// Builds the simulated bench with the EUT at rest on its curve.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurve` for a malformed curve.
    pub fn sim_bench(&self) -> Result<SimEnvironment> {
        let nameplate = self.nameplate();
        let s = &self.simulation;
        let mode = self.procedure.mode;
        let y_base = mode.y_base(&nameplate);
        let response_time = s.response_time.unwrap_or(self.procedure.olrt);

        let eut = SimulatedEut::new(nameplate, mode, self.physical_curve()?, response_time, s.seed)
            .with_calibration(s.gain, s.offset * y_base)
            .with_noise(s.noise_std * y_base);
        Ok(SimEnvironment::new(eut, s.settling_delay))
    }
}
