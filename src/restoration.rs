//! The restoration phase controller.
//!
//! When the outer interior-point iteration cannot find an acceptable trial
//! point, [`RestorationPhase::perform_restoration`] hands a feasibility
//! problem to a [`RestorationEngine`], typically another instance of the same
//! optimizer, and translates whatever it returns back into the outer
//! algorithm's terms.

use log::{debug, error, info, log_enabled, trace, warn, Level};

use crate::data::{AlgorithmData, Clock, RestoData, SystemClock, TimeBudget};
use crate::error::{RestoError, Result};
use crate::iterates::{BoundVectors, Iterates};
use crate::multipliers::{least_square_mults, repair_bound_multipliers, MultiplierEstimator};
use crate::options::{
    base_resto_options, derive_resto_options, DerivationInput, OptionsList,
    RestorationThresholds, RESTO_PREFIX,
};
use crate::status::{RestorationOutcome, SolverReturn, TimeLimit};

/// Problem-dependent quantities evaluated at outer iterates.
pub trait ProblemQuantities {
    /// Constraint violation measure used by the globalization, in the scaled problem.
    fn constraint_violation(&self, iterate: &Iterates) -> f64;

    /// Max-norm of the constraint violation of the unscaled problem.
    fn unscaled_constraint_violation(&self, iterate: &Iterates) -> f64;

    /// Max-norm of the primal infeasibility.
    fn primal_infeasibility(&self, iterate: &Iterates) -> f64;

    /// Whether the problem has as many active constraints as free variables.
    fn is_square_problem(&self) -> bool;

    /// Distances of `x` and `s` to their lower and upper bounds.
    fn bound_slacks(&self, iterate: &Iterates) -> BoundVectors;
}

/// Everything the engine needs to set up one restoration run.
#[derive(Clone, Copy, Debug)]
pub struct RestorationRequest<'a> {
    /// Outer iterate the restoration problem measures proximity to.
    pub reference: &'a Iterates,
    /// Options derived for this run.
    pub options: &'a OptionsList,
    /// Prefix under which the run looks up its options.
    pub prefix: &'a str,
    /// Whether the outer problem is square.
    pub is_square: bool,
}

/// Full optimizer invoked on the restoration problem.
pub trait RestorationEngine {
    /// Solves the restoration problem built around `request.reference`.
    ///
    /// The engine leaves its final iterate in `data.curr` and may update the
    /// iteration counter and informational fields of `data`.
    fn optimize(&mut self, request: &RestorationRequest<'_>, data: &mut RestoData) -> SolverReturn;
}

/// Description of an option read by the restoration phase.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisteredOption {
    /// Option name, without prefix.
    pub name: &'static str,
    /// Smallest admissible value.
    pub lower_bound: f64,
    /// `None` when the default depends on other options.
    pub default: Option<f64>,
    /// One-line summary.
    pub short_description: &'static str,
    /// Full description.
    pub long_description: &'static str,
}

struct Setup {
    options: OptionsList,
    thresholds: RestorationThresholds,
}

/// Restoration phase that minimizes constraint violation by a recursive solve.
pub struct RestorationPhase<E, M> {
    engine: E,
    estimator: M,
    clock: Box<dyn Clock>,
    setup: Option<Setup>,
    count_restorations: usize,
}

impl<E, M> RestorationPhase<E, M>
where
    E: RestorationEngine,
    M: MultiplierEstimator,
{
    /// Creates an uninitialized phase measuring time with a [`SystemClock`].
    pub fn new(engine: E, estimator: M) -> Self {
        Self {
            engine,
            estimator,
            clock: Box::new(SystemClock::new()),
            setup: None,
            count_restorations: 0,
        }
    }

    /// Replaces the clock used to measure elapsed time.
    ///
    /// The outer algorithm's start stamps must come from the same clock.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Options this phase reads, with their bounds and defaults.
    pub fn registered_options() -> Vec<RegisteredOption> {
        vec![
            RegisteredOption {
                name: "bound_mult_reset_threshold",
                lower_bound: 0.0,
                default: Some(1e3),
                short_description: "Threshold for resetting bound multipliers after the restoration phase.",
                long_description: "After returning from the restoration phase, the bound multipliers are \
                    updated with a Newton step for complementarity, taking the change of the primal \
                    variables during the entire restoration phase as the primal Newton step. If the \
                    largest bound multiplier exceeds this threshold afterwards, all of them are reset to 1.",
            },
            RegisteredOption {
                name: "constr_mult_reset_threshold",
                lower_bound: 0.0,
                default: Some(0.0),
                short_description: "Threshold for resetting equality and inequality multipliers after the restoration phase.",
                long_description: "After returning from the restoration phase, the constraint multipliers \
                    are recomputed by a least-squares estimate. Estimates larger than this threshold are \
                    ignored and the multipliers are set to zero.",
            },
            RegisteredOption {
                name: "resto_failure_feasibility_threshold",
                lower_bound: 0.0,
                default: None,
                short_description: "Threshold for primal infeasibility to declare failure of the restoration phase.",
                long_description: "If the restoration phase stops at an acceptable point or because of a \
                    tiny step and the primal infeasibility is at most this value, the restoration phase is \
                    reported as converged to a feasible point instead of local infeasibility. \
                    Defaults to 1e2*tol.",
            },
        ]
    }

    /// Captures the options, reads the thresholds, and initializes the estimator.
    ///
    /// `tol` is the overall termination tolerance of the outer algorithm.
    pub fn initialize(&mut self, options: &OptionsList, prefix: &str, tol: f64) -> Result<()> {
        let thresholds = RestorationThresholds::from_options(options, prefix, tol)?;
        self.estimator
            .initialize(options, prefix)
            .map_err(|err| match err {
                RestoError::EstimatorInitialization { .. } => err,
                other => RestoError::EstimatorInitialization {
                    reason: other.to_string(),
                },
            })?;
        self.setup = Some(Setup {
            options: base_resto_options(options),
            thresholds,
        });
        self.count_restorations = 0;
        Ok(())
    }

    /// Thresholds read by [`initialize`](Self::initialize).
    pub fn thresholds(&self) -> Option<&RestorationThresholds> {
        self.setup.as_ref().map(|setup| &setup.thresholds)
    }

    /// Number of restoration calls since initialization.
    pub fn count_restorations(&self) -> usize {
        self.count_restorations
    }

    /// The restoration engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The least-squares multiplier estimator.
    pub fn estimator(&self) -> &M {
        &self.estimator
    }

    /// Runs the restoration phase from the current outer iterate.
    ///
    /// On [`RestorationOutcome::Success`] the new point is left in the outer
    /// trial iterate for the caller to accept. Failure outcomes that still have
    /// a restoration iterate install and accept its outer-space part, so the
    /// caller reports the furthest point reached.
    pub fn perform_restoration<Q>(
        &mut self,
        data: &mut AlgorithmData,
        quantities: &Q,
    ) -> Result<RestorationOutcome>
    where
        Q: ProblemQuantities + ?Sized,
    {
        let setup = self.setup.as_ref().ok_or(RestoError::NotInitialized)?;
        let thresholds = setup.thresholds.clone();

        self.count_restorations += 1;
        debug!(
            "Starting Restoration Phase for the {}. time",
            self.count_restorations
        );

        let violation = quantities.constraint_violation(data.curr());
        if !(violation > 0.0) {
            return Err(RestoError::FeasibleStartingPoint { violation });
        }

        let budget = match self.remaining_budget(data, &thresholds) {
            Ok(budget) => budget,
            Err(limit) => {
                warn!("Time limit exhausted at start of restoration phase.");
                return Ok(RestorationOutcome::TimeExceeded(limit));
            }
        };

        if data.resto_depth >= thresholds.max_resto_depth {
            warn!(
                "Restoration phase nested {} levels deep; not starting another one.",
                data.resto_depth
            );
            return Ok(RestorationOutcome::RestorationFailed);
        }

        let square_problem = quantities.is_square_problem();
        let options = derive_resto_options(
            &setup.options,
            &DerivationInput {
                is_square: square_problem,
                expect_infeasible: thresholds.expect_infeasible_problem,
                call_number: self.count_restorations,
                violation,
                remaining_wall: budget.wall,
                remaining_cpu: budget.cpu,
            },
        );

        let mut resto_data = RestoData::continuing(data, budget);
        let reference = data.curr().clone();
        let request = RestorationRequest {
            reference: &reference,
            options: &options,
            prefix: RESTO_PREFIX,
            is_square: square_problem,
        };
        let status = self.engine.optimize(&request, &mut resto_data);
        debug!("Restoration phase returned with status: {status}");

        if status == SolverReturn::Success {
            return self.finish_successful_restoration(
                data,
                quantities,
                &resto_data,
                &thresholds,
                square_problem,
            );
        }

        let outcome = match status {
            SolverReturn::StopAtTinyStep
            | SolverReturn::StopAtAcceptablePoint
            | SolverReturn::MaxIterExceeded
            | SolverReturn::CpuTimeExceeded
            | SolverReturn::WallTimeExceeded
            | SolverReturn::LocalInfeasibility
            | SolverReturn::RestorationFailure
            | SolverReturn::ErrorInStepComputation
            | SolverReturn::UserRequestedStop => {
                salvage_current_iterate(data, &resto_data)?;
                classify_failure(status, data.curr(), quantities, &thresholds, square_problem)
            }
            other => {
                error!("Restoration phase ended with unclassified status: {other}");
                RestorationOutcome::InternalUnexpected(other)
            }
        };
        Ok(outcome)
    }

    fn remaining_budget(
        &self,
        data: &AlgorithmData,
        thresholds: &RestorationThresholds,
    ) -> std::result::Result<TimeBudget, TimeLimit> {
        let mut budget = TimeBudget::default();
        if let Some(max_wall) = thresholds.max_wall_time {
            let elapsed = self.clock.wall_time() - data.timing.start_wall_time;
            if elapsed >= max_wall {
                return Err(TimeLimit::Wall);
            }
            budget.wall = Some(max_wall - elapsed);
        }
        if let Some(max_cpu) = thresholds.max_cpu_time {
            let elapsed = self.clock.cpu_time() - data.timing.start_cpu_time;
            if elapsed >= max_cpu {
                return Err(TimeLimit::Cpu);
            }
            budget.cpu = Some(max_cpu - elapsed);
        }
        Ok(budget)
    }

    fn finish_successful_restoration<Q>(
        &mut self,
        data: &mut AlgorithmData,
        quantities: &Q,
        resto_data: &RestoData,
        thresholds: &RestorationThresholds,
        square_problem: bool,
    ) -> Result<RestorationOutcome>
    where
        Q: ProblemQuantities + ?Sized,
    {
        let resto_curr = resto_data
            .curr
            .as_ref()
            .ok_or_else(|| RestoError::MissingIterate {
                status: SolverReturn::Success.to_string(),
            })?;

        debug!("RESTORATION PHASE RESULTS");
        if let Some(objective) = resto_data.curr_objective {
            debug!("Optimal Objective Value = {objective:.16E}");
        }
        debug!("Number of Iterations = {}", resto_data.iter_count);
        if log_enabled!(Level::Trace) {
            trace!("restoration iterate: {resto_curr:?}");
        }

        let (x, s) = resto_curr.outer_primal()?;
        let trial = data.trial_or_curr().clone().with_primal(x, s)?;
        data.set_trial(trial);

        if square_problem {
            let constr_viol = match data.trial() {
                Some(trial) => quantities.unscaled_constraint_violation(trial),
                None => return Err(RestoError::MissingTrialPoint),
            };
            data.accept_trial_point()?;
            if constr_viol <= thresholds.constr_viol_tol {
                info!("Recursive restoration phase algorithm terminated successfully for square problem.");
                return Ok(RestorationOutcome::FeasibilityProblemSolved);
            }
            warn!(
                "Restoration phase for square problem returned with constraint violation {constr_viol:e} above constr_viol_tol."
            );
            return Ok(RestorationOutcome::RestorationFailed);
        }

        let curr_slacks = quantities.bound_slacks(data.curr());
        let trial_slacks = match data.trial() {
            Some(trial) => quantities.bound_slacks(trial),
            None => return Err(RestoError::MissingTrialPoint),
        };
        let repair = repair_bound_multipliers(
            &data.curr().bound_mult,
            &curr_slacks,
            &trial_slacks,
            data.curr_mu,
            data.curr_tau,
            thresholds.bound_mult_reset_threshold,
        )?;

        let trial = data.trial_or_curr().clone().with_bound_mult(repair.multipliers);
        let (y_c, y_d) = least_square_mults(
            &mut self.estimator,
            &trial,
            thresholds.constr_mult_reset_threshold,
        )?;
        data.set_trial(trial.with_eq_mult(y_c, y_d));

        data.set_iter_count(resto_data.iter_count.saturating_sub(1));
        data.info.skip_output = true;
        data.info.iters_since_header = resto_data.info.iters_since_header;
        data.info.last_output = resto_data.info.last_output;

        Ok(RestorationOutcome::Success)
    }
}

/// Installs the outer-space part of the restoration run's current iterate as the
/// outer current iterate. Does nothing if the run left no iterate behind.
///
/// The outer iterate is left untouched if any component has the wrong length.
fn salvage_current_iterate(data: &mut AlgorithmData, resto_data: &RestoData) -> Result<()> {
    let Some(resto_curr) = resto_data.curr.as_ref() else {
        return Ok(());
    };
    let salvaged = resto_curr.to_outer()?;
    salvaged.check_shape(data.curr())?;
    data.set_trial(salvaged);
    data.accept_trial_point()
}

/// Maps a non-success status of the restoration run to an outcome for the outer algorithm.
///
/// `curr` is the outer current iterate after any salvage.
fn classify_failure<Q>(
    status: SolverReturn,
    curr: &Iterates,
    quantities: &Q,
    thresholds: &RestorationThresholds,
    square_problem: bool,
) -> RestorationOutcome
where
    Q: ProblemQuantities + ?Sized,
{
    match status {
        SolverReturn::StopAtAcceptablePoint
            if square_problem
                && quantities.unscaled_constraint_violation(curr) < thresholds.constr_viol_tol =>
        {
            debug!("Recursive restoration phase algorithm terminated acceptably for square problem.");
            RestorationOutcome::FeasibilityProblemSolved
        }
        SolverReturn::StopAtTinyStep | SolverReturn::StopAtAcceptablePoint => {
            let orig_primal_inf = quantities.primal_infeasibility(curr);
            if orig_primal_inf <= thresholds.resto_failure_feasibility_threshold {
                warn!("Restoration phase converged to a point with small primal infeasibility.");
                RestorationOutcome::ConvergedToFeasiblePoint
            } else {
                RestorationOutcome::LocallyInfeasible
            }
        }
        SolverReturn::MaxIterExceeded => RestorationOutcome::MaxIterationsExceeded,
        SolverReturn::CpuTimeExceeded => RestorationOutcome::TimeExceeded(TimeLimit::Cpu),
        SolverReturn::WallTimeExceeded => RestorationOutcome::TimeExceeded(TimeLimit::Wall),
        SolverReturn::LocalInfeasibility => RestorationOutcome::LocallyInfeasible,
        SolverReturn::RestorationFailure => {
            warn!("Restoration phase in the restoration phase failed.");
            RestorationOutcome::RestorationFailed
        }
        SolverReturn::ErrorInStepComputation => {
            warn!("Step computation in the restoration phase failed.");
            RestorationOutcome::RestorationFailed
        }
        SolverReturn::UserRequestedStop => RestorationOutcome::UserStop,
        other => RestorationOutcome::InternalUnexpected(other),
    }
}
