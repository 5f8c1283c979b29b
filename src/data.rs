//! Algorithm state shared between the outer solve and a restoration run.

use std::time::Instant;

use cpu_time::ProcessTime;
use serde::{Deserialize, Serialize};

use crate::error::{RestoError, Result};
use crate::iterates::{Iterates, RestoIterates};

/// Source of wallclock and CPU time stamps, in seconds.
pub trait Clock {
    /// Elapsed wallclock seconds.
    fn wall_time(&self) -> f64;
    /// CPU seconds consumed by the process.
    fn cpu_time(&self) -> f64;
}

/// Clock backed by [`Instant`] for wallclock time and by the process CPU clock
/// for CPU time. Both are measured from the moment the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    wall_origin: Instant,
    cpu_origin: ProcessTime,
}

impl SystemClock {
    /// Clock whose readings start at zero now.
    pub fn new() -> Self {
        Self {
            wall_origin: Instant::now(),
            cpu_origin: ProcessTime::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_time(&self) -> f64 {
        self.wall_origin.elapsed().as_secs_f64()
    }

    fn cpu_time(&self) -> f64 {
        self.cpu_origin.elapsed().as_secs_f64()
    }
}

/// Start stamps of the overall algorithm, taken from the same [`Clock`] the controller uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    /// Wallclock stamp at the start of the solve.
    pub start_wall_time: f64,
    /// CPU stamp at the start of the solve.
    pub start_cpu_time: f64,
}

impl TimingStats {
    /// Stamps the start of the overall algorithm with `clock`.
    pub fn start<C: Clock + ?Sized>(clock: &C) -> Self {
        Self {
            start_wall_time: clock.wall_time(),
            start_cpu_time: clock.cpu_time(),
        }
    }
}

/// Time left to a restoration run; `None` means unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeBudget {
    /// Wallclock seconds.
    pub wall: Option<f64>,
    /// CPU seconds.
    pub cpu: Option<f64>,
}

/// Purely informational fields that keep the iteration log continuous.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationInfo {
    /// Primal regularization of the last step.
    pub regu_x: f64,
    /// Primal step length.
    pub alpha_primal: f64,
    /// One-character tag printed next to the primal step length.
    pub alpha_primal_char: char,
    /// Dual step length.
    pub alpha_dual: f64,
    /// Line search trials of the last iteration.
    pub ls_count: usize,
    /// Iterations printed since the last log header.
    pub iters_since_header: usize,
    /// Time stamp of the last log line; negative before the first one.
    pub last_output: f64,
    /// Whether the next iteration log line is suppressed.
    pub skip_output: bool,
}

impl Default for IterationInfo {
    fn default() -> Self {
        Self {
            regu_x: 0.0,
            alpha_primal: 0.0,
            alpha_primal_char: ' ',
            alpha_dual: 0.0,
            ls_count: 0,
            iters_since_header: 0,
            last_output: -1.0,
            skip_output: false,
        }
    }
}

/// Iterates and bookkeeping of the outer algorithm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmData {
    curr: Iterates,
    trial: Option<Iterates>,
    iter_count: usize,
    /// Barrier parameter.
    pub curr_mu: f64,
    /// Fraction-to-the-boundary parameter.
    pub curr_tau: f64,
    /// Log bookkeeping.
    pub info: IterationInfo,
    /// Start stamps of the solve.
    pub timing: TimingStats,
    /// How many restoration runs enclose this algorithm; zero for the outer solve.
    pub resto_depth: usize,
}

impl AlgorithmData {
    /// State at iteration zero with `curr` as the current iterate and no trial point.
    pub fn new(curr: Iterates, curr_mu: f64, curr_tau: f64) -> Self {
        Self {
            curr,
            trial: None,
            iter_count: 0,
            curr_mu,
            curr_tau,
            info: IterationInfo::default(),
            timing: TimingStats::default(),
            resto_depth: 0,
        }
    }

    /// Replaces the start stamps.
    pub fn with_timing(mut self, timing: TimingStats) -> Self {
        self.timing = timing;
        self
    }

    /// Replaces the iteration counter.
    pub fn with_iter_count(mut self, iter_count: usize) -> Self {
        self.iter_count = iter_count;
        self
    }

    /// The current iterate.
    pub fn curr(&self) -> &Iterates {
        &self.curr
    }

    /// The trial iterate, if one has been set.
    pub fn trial(&self) -> Option<&Iterates> {
        self.trial.as_ref()
    }

    /// The trial iterate if one is set, the current one otherwise.
    pub fn trial_or_curr(&self) -> &Iterates {
        self.trial.as_ref().unwrap_or(&self.curr)
    }

    /// Installs `trial` as the trial iterate.
    pub fn set_trial(&mut self, trial: Iterates) {
        self.trial = Some(trial);
    }

    /// Makes the trial iterate the current one.
    pub fn accept_trial_point(&mut self) -> Result<()> {
        let trial = self.trial.take().ok_or(RestoError::MissingTrialPoint)?;
        self.curr = trial;
        Ok(())
    }

    /// Iteration counter of the outer algorithm.
    pub fn iter_count(&self) -> usize {
        self.iter_count
    }

    /// Overwrites the iteration counter.
    pub fn set_iter_count(&mut self, iter_count: usize) {
        self.iter_count = iter_count;
    }
}

/// Fresh state handed to the restoration engine for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RestoData {
    /// Iteration counter; the run continues the outer iteration numbering.
    pub iter_count: usize,
    /// Log bookkeeping, continued from the outer algorithm.
    pub info: IterationInfo,
    /// Final iterate of the run, written by the engine.
    pub curr: Option<RestoIterates>,
    /// Objective of the restoration problem at `curr`, if the engine reports it.
    pub curr_objective: Option<f64>,
    /// Time left to the run.
    pub budget: TimeBudget,
    /// Nesting depth of the run; one for a restoration called by the outer solve.
    pub depth: usize,
}

impl RestoData {
    /// Context that continues the outer iteration log.
    pub fn continuing(outer: &AlgorithmData, budget: TimeBudget) -> Self {
        let info = IterationInfo {
            skip_output: false,
            ..outer.info.clone()
        };
        Self {
            iter_count: outer.iter_count() + 1,
            info,
            curr: None,
            curr_objective: None,
            budget,
            depth: outer.resto_depth + 1,
        }
    }
}
