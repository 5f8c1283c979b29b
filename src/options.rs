//! Option storage, the restoration thresholds, and the per-call option derivation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RestoError, Result};

/// Prefix under which options of the restoration run are looked up.
pub const RESTO_PREFIX: &str = "resto.";

/// Time limits at or above this value are treated as unlimited.
pub const UNLIMITED_TIME: f64 = 1e20;

/// A single option value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Integer(i64),
    Number(f64),
    Text(String),
}

/// Flat list of user-set options, keyed by (possibly prefixed) name.
///
/// Lookups with a prefix try `prefix + name` first and fall back to `name`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsList {
    values: BTreeMap<String, OptionValue>,
}

impl OptionsList {
    /// Empty option list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` has been set, ignoring prefixes.
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn lookup(&self, name: &str, prefix: &str) -> Option<&OptionValue> {
        if !prefix.is_empty() {
            if let Some(value) = self.values.get(&format!("{prefix}{name}")) {
                return Some(value);
            }
        }
        self.values.get(name)
    }

    /// Numeric value of `name`; integers are widened.
    pub fn get_numeric(&self, name: &str, prefix: &str) -> Option<f64> {
        match self.lookup(name, prefix)? {
            OptionValue::Number(value) => Some(*value),
            OptionValue::Integer(value) => Some(*value as f64),
            OptionValue::Text(text) => text.trim().parse().ok(),
        }
    }

    /// Integer value of `name`; numbers with a fractional part are rejected.
    pub fn get_integer(&self, name: &str, prefix: &str) -> Option<i64> {
        match self.lookup(name, prefix)? {
            OptionValue::Integer(value) => Some(*value),
            OptionValue::Number(value) if value.fract() == 0.0 => Some(*value as i64),
            OptionValue::Number(_) => None,
            OptionValue::Text(text) => text.trim().parse().ok(),
        }
    }

    /// Text value of `name`.
    pub fn get_string(&self, name: &str, prefix: &str) -> Option<&str> {
        match self.lookup(name, prefix)? {
            OptionValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Boolean options are stored as `"yes"` / `"no"`.
    pub fn get_bool(&self, name: &str, prefix: &str) -> Option<bool> {
        match self.get_string(name, prefix)? {
            "yes" => Some(true),
            "no" => Some(false),
            _ => None,
        }
    }

    /// Sets `name` to a number, replacing any previous value.
    pub fn set_numeric<S: Into<String>>(&mut self, name: S, value: f64) {
        self.values.insert(name.into(), OptionValue::Number(value));
    }

    /// Sets `name` to an integer, replacing any previous value.
    pub fn set_integer<S: Into<String>>(&mut self, name: S, value: i64) {
        self.values.insert(name.into(), OptionValue::Integer(value));
    }

    /// Sets `name` to text, replacing any previous value.
    pub fn set_string<S: Into<String>, V: Into<String>>(&mut self, name: S, value: V) {
        self.values.insert(name.into(), OptionValue::Text(value.into()));
    }

    /// Sets `name` only if it has no value yet.
    pub fn set_numeric_if_unset<S: Into<String>>(&mut self, name: S, value: f64) {
        self.values
            .entry(name.into())
            .or_insert(OptionValue::Number(value));
    }

    /// Sets `name` only if it has no value yet.
    pub fn set_string_if_unset<S: Into<String>, V: Into<String>>(&mut self, name: S, value: V) {
        self.values
            .entry(name.into())
            .or_insert_with(|| OptionValue::Text(value.into()));
    }

    /// Builder-style variant of [`set_numeric`](Self::set_numeric).
    pub fn with_numeric<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.set_numeric(name, value);
        self
    }

    /// Builder-style variant of [`set_string`](Self::set_string).
    pub fn with_string<S: Into<String>, V: Into<String>>(mut self, name: S, value: V) -> Self {
        self.set_string(name, value);
        self
    }

    /// Builder-style variant of [`set_integer`](Self::set_integer).
    pub fn with_integer<S: Into<String>>(mut self, name: S, value: i64) -> Self {
        self.set_integer(name, value);
        self
    }

    /// Whether no option has been set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Thresholds and outer settings read once when the restoration phase is initialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestorationThresholds {
    /// Largest bound multiplier tolerated after the post-restoration update.
    pub bound_mult_reset_threshold: f64,
    /// Largest least-squares constraint multiplier estimate that is trusted.
    pub constr_mult_reset_threshold: f64,
    /// Primal infeasibility below which an early restoration stop is not infeasibility.
    pub resto_failure_feasibility_threshold: f64,
    /// Absolute tolerance on the unscaled constraint violation.
    pub constr_viol_tol: f64,
    /// Whether the outer problem is expected to be infeasible.
    pub expect_infeasible_problem: bool,
    /// Wallclock limit of the overall solve, `None` when unlimited.
    pub max_wall_time: Option<f64>,
    /// CPU limit of the overall solve, `None` when unlimited.
    pub max_cpu_time: Option<f64>,
    /// Deepest restoration nesting that may still start a restoration run.
    pub max_resto_depth: usize,
}

impl Default for RestorationThresholds {
    fn default() -> Self {
        Self::with_tolerance(1e-8)
    }
}

impl RestorationThresholds {
    /// Defaults, with the feasibility threshold derived from the overall tolerance `tol`.
    pub fn with_tolerance(tol: f64) -> Self {
        Self {
            bound_mult_reset_threshold: 1e3,
            constr_mult_reset_threshold: 0.0,
            resto_failure_feasibility_threshold: 1e2 * tol,
            constr_viol_tol: 1e-4,
            expect_infeasible_problem: false,
            max_wall_time: None,
            max_cpu_time: None,
            max_resto_depth: 32,
        }
    }

    /// Reads every threshold from `options` under `prefix`, falling back to defaults.
    pub fn from_options(options: &OptionsList, prefix: &str, tol: f64) -> Result<Self> {
        let defaults = Self::with_tolerance(tol);
        let nonnegative = |name: &str, default: f64| -> Result<f64> {
            let value = options.get_numeric(name, prefix).unwrap_or(default);
            if value < 0.0 || value.is_nan() {
                return Err(RestoError::invalid_option(name, "non-negative", value));
            }
            Ok(value)
        };
        let time_limit = |name: &str| -> Result<Option<f64>> {
            match options.get_numeric(name, prefix) {
                None => Ok(None),
                Some(value) if value <= 0.0 || value.is_nan() => {
                    Err(RestoError::invalid_option(name, "positive", value))
                }
                Some(value) if value >= UNLIMITED_TIME => Ok(None),
                Some(value) => Ok(Some(value)),
            }
        };

        let max_resto_depth = match options.get_integer("max_resto_depth", prefix) {
            Some(depth) if depth < 1 => {
                return Err(RestoError::invalid_option(
                    "max_resto_depth",
                    "at least 1",
                    depth as f64,
                ))
            }
            Some(depth) => depth as usize,
            None => defaults.max_resto_depth,
        };

        Ok(Self {
            bound_mult_reset_threshold: nonnegative(
                "bound_mult_reset_threshold",
                defaults.bound_mult_reset_threshold,
            )?,
            constr_mult_reset_threshold: nonnegative(
                "constr_mult_reset_threshold",
                defaults.constr_mult_reset_threshold,
            )?,
            resto_failure_feasibility_threshold: nonnegative(
                "resto_failure_feasibility_threshold",
                defaults.resto_failure_feasibility_threshold,
            )?,
            constr_viol_tol: nonnegative("constr_viol_tol", defaults.constr_viol_tol)?,
            expect_infeasible_problem: options
                .get_bool("expect_infeasible_problem", prefix)
                .unwrap_or(defaults.expect_infeasible_problem),
            max_wall_time: time_limit("max_wall_time")?,
            max_cpu_time: time_limit("max_cpu_time")?,
            max_resto_depth,
        })
    }

    /// Sets the bound multiplier reset threshold.
    pub fn with_bound_mult_reset_threshold(mut self, threshold: f64) -> Self {
        self.bound_mult_reset_threshold = threshold;
        self
    }

    /// Sets the constraint multiplier reset threshold.
    pub fn with_constr_mult_reset_threshold(mut self, threshold: f64) -> Self {
        self.constr_mult_reset_threshold = threshold;
        self
    }

    /// Sets the primal infeasibility threshold for declaring failure.
    pub fn with_resto_failure_feasibility_threshold(mut self, threshold: f64) -> Self {
        self.resto_failure_feasibility_threshold = threshold;
        self
    }

    /// Sets the absolute constraint violation tolerance.
    pub fn with_constr_viol_tol(mut self, tol: f64) -> Self {
        self.constr_viol_tol = tol;
        self
    }

    /// Sets the wallclock and CPU limits of the overall solve.
    pub fn with_time_limits(mut self, wall: Option<f64>, cpu: Option<f64>) -> Self {
        self.max_wall_time = wall;
        self.max_cpu_time = cpu;
        self
    }
}

/// Copy of the outer options with the overrides every restoration run needs.
///
/// The restoration run never starts with another restoration, and it tolerates a
/// much larger growth of infeasibility than the regular phase unless the user
/// chose otherwise.
pub fn base_resto_options(options: &OptionsList) -> OptionsList {
    let mut resto = options.clone();
    resto.set_string("resto.start_with_resto", "no");
    if !options.is_set("resto.theta_max_fact") {
        resto.set_numeric("resto.theta_max_fact", 1e8);
    }
    resto
}

/// Per-call facts that shape the options of one restoration run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivationInput {
    /// Whether the outer problem is square.
    pub is_square: bool,
    /// Value of `expect_infeasible_problem` for the outer solve.
    pub expect_infeasible: bool,
    /// 1 for the first restoration call of the outer solve.
    pub call_number: usize,
    /// Constraint violation of the outer current iterate.
    pub violation: f64,
    /// Wallclock seconds left to the overall solve.
    pub remaining_wall: Option<f64>,
    /// CPU seconds left to the overall solve.
    pub remaining_cpu: Option<f64>,
}

/// Derives the option set of one restoration run from the base copy.
pub fn derive_resto_options(base: &OptionsList, input: &DerivationInput) -> OptionsList {
    let mut options = base.clone();
    if let Some(wall) = input.remaining_wall {
        options.set_numeric("resto.max_wall_time", wall);
    }
    if let Some(cpu) = input.remaining_cpu {
        options.set_numeric("resto.max_cpu_time", cpu);
    }

    if input.is_square {
        // Do not leave the restoration phase before a square problem is solved.
        options.set_numeric_if_unset("required_infeasibility_reduction", 0.0);
    } else if input.expect_infeasible {
        options.set_string_if_unset("resto.expect_infeasible_problem", "no");
        if input.call_number == 1 && input.violation > 1e-3 {
            options.set_numeric_if_unset("required_infeasibility_reduction", 1e-3);
        }
    }
    options
}
