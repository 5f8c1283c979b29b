use std::cell::Cell;
use std::rc::Rc;

use approx::assert_relative_eq;
use ipresto::data::{AlgorithmData, Clock, RestoData, TimingStats};
use ipresto::iterates::{BoundVectors, Iterates, RestoIterates};
use ipresto::multipliers::{bound_multiplier_steps, dual_fraction_to_boundary, MultiplierEstimator};
use ipresto::options::OptionsList;
use ipresto::restoration::{ProblemQuantities, RestorationEngine, RestorationRequest};
use ipresto::vector::{CompoundVector, IterVector};
use ipresto::{RestoError, RestorationOutcome, RestorationPhase, SolverReturn, TimeLimit};
use nalgebra::DVector;

/// Quantities with scripted violation measures and bound slacks equal to `x` and `s`.
struct Scripted {
    violation: f64,
    unscaled_violation: f64,
    primal_infeasibility: f64,
    square: bool,
}

impl Scripted {
    fn infeasible() -> Self {
        Self {
            violation: 0.01,
            unscaled_violation: 0.01,
            primal_infeasibility: 0.01,
            square: false,
        }
    }
}

impl ProblemQuantities for Scripted {
    fn constraint_violation(&self, _: &Iterates) -> f64 {
        self.violation
    }
    fn unscaled_constraint_violation(&self, _: &Iterates) -> f64 {
        self.unscaled_violation
    }
    fn primal_infeasibility(&self, _: &Iterates) -> f64 {
        self.primal_infeasibility
    }
    fn is_square_problem(&self) -> bool {
        self.square
    }
    fn bound_slacks(&self, iterate: &Iterates) -> BoundVectors {
        BoundVectors::new(
            iterate.x.clone(),
            DVector::zeros(0),
            iterate.s.clone(),
            DVector::zeros(0),
        )
    }
}

#[derive(Default)]
struct EngineLog {
    calls: Cell<usize>,
    last_reduction: Cell<Option<f64>>,
    last_wall_budget: Cell<Option<f64>>,
}

struct Engine {
    status: SolverReturn,
    x: Vec<f64>,
    s: Vec<f64>,
    log: Rc<EngineLog>,
}

fn augmented(head: &[f64], extra: usize) -> IterVector {
    IterVector::from(CompoundVector::from_dense(vec![
        DVector::from_row_slice(head),
        DVector::from_element(extra, 0.5),
    ]))
}

impl RestorationEngine for Engine {
    fn optimize(&mut self, request: &RestorationRequest<'_>, data: &mut RestoData) -> SolverReturn {
        self.log.calls.set(self.log.calls.get() + 1);
        self.log.last_reduction.set(
            request
                .options
                .get_numeric("required_infeasibility_reduction", request.prefix),
        );
        self.log.last_wall_budget.set(data.budget.wall);
        data.curr = Some(RestoIterates {
            x: augmented(&self.x, 4),
            s: augmented(&self.s, 2),
            y_c: augmented(&[5.0], 0),
            y_d: augmented(&[6.0], 0),
            z_lower: augmented(&[1e4, 1e4], 4),
            z_upper: augmented(&[], 0),
            v_lower: augmented(&[2.0], 0),
            v_upper: augmented(&[], 0),
        });
        data.iter_count += 12;
        self.status
    }
}

struct FixedClock {
    wall: f64,
    cpu: f64,
}

impl Clock for FixedClock {
    fn wall_time(&self) -> f64 {
        self.wall
    }
    fn cpu_time(&self) -> f64 {
        self.cpu
    }
}

struct Estimate(Rc<Cell<usize>>);

impl MultiplierEstimator for Estimate {
    fn calculate_multipliers(&mut self, _: &Iterates) -> Option<(DVector<f64>, DVector<f64>)> {
        self.0.set(self.0.get() + 1);
        Some((DVector::from_vec(vec![0.25]), DVector::from_vec(vec![-0.5])))
    }
}

fn current() -> Iterates {
    Iterates::new(
        DVector::from_vec(vec![2.0, 1.0]),
        DVector::from_vec(vec![0.5]),
        DVector::from_vec(vec![1.0]),
        DVector::from_vec(vec![1.0]),
        BoundVectors::new(
            DVector::from_vec(vec![0.5, 1.0]),
            DVector::zeros(0),
            DVector::from_vec(vec![0.2]),
            DVector::zeros(0),
        ),
    )
}

fn outer_data() -> AlgorithmData {
    AlgorithmData::new(current(), 0.1, 0.99).with_iter_count(5)
}

fn scripted_engine(status: SolverReturn, x: &[f64], s: &[f64]) -> (Engine, Rc<EngineLog>) {
    let log = Rc::new(EngineLog::default());
    let engine = Engine {
        status,
        x: x.to_vec(),
        s: s.to_vec(),
        log: Rc::clone(&log),
    };
    (engine, log)
}

fn phase_with(
    status: SolverReturn,
    options: OptionsList,
) -> (RestorationPhase<Engine, Estimate>, Rc<EngineLog>, Rc<Cell<usize>>) {
    let (engine, log) = scripted_engine(status, &[1.5, 1.2], &[0.4]);
    let estimates = Rc::new(Cell::new(0));
    let mut phase = RestorationPhase::new(engine, Estimate(Rc::clone(&estimates)));
    phase.initialize(&options, "", 1e-8).unwrap();
    (phase, log, estimates)
}

#[test]
fn successful_restoration_repairs_multipliers() {
    let options = OptionsList::new().with_numeric("constr_mult_reset_threshold", 10.0);
    let (mut phase, log, estimates) = phase_with(SolverReturn::Success, options);
    let mut data = outer_data();

    let outcome = phase
        .perform_restoration(&mut data, &Scripted::infeasible())
        .unwrap();
    assert_eq!(outcome, RestorationOutcome::Success);
    assert_eq!(log.calls.get(), 1);
    assert_eq!(estimates.get(), 1);

    let curr = current();
    let trial = data.trial().expect("trial point installed").clone();
    assert_eq!(trial.x, DVector::from_vec(vec![1.5, 1.2]));
    assert_eq!(trial.s, DVector::from_vec(vec![0.4]));
    assert_eq!(data.curr(), &curr);

    let quantities = Scripted::infeasible();
    let delta = bound_multiplier_steps(
        &curr.bound_mult,
        &quantities.bound_slacks(&curr),
        &quantities.bound_slacks(&trial),
        0.1,
    )
    .unwrap();
    let alpha = dual_fraction_to_boundary(0.99, &curr.bound_mult, &delta);
    let expected = curr.bound_mult.axpy(alpha, &delta).unwrap();
    assert!(expected.amax() < 1e3);
    assert_eq!(trial.bound_mult, expected);
    assert_relative_eq!(
        trial.bound_mult.x_lower[0],
        0.5 + alpha * (((2.0 - 1.5) * 0.5 + 0.1) / 2.0 - 0.5)
    );

    assert_eq!(trial.y_c, DVector::from_vec(vec![0.25]));
    assert_eq!(trial.y_d, DVector::from_vec(vec![-0.5]));
    assert_eq!(data.iter_count(), 5 + 1 + 12 - 1);
    assert!(data.info.skip_output);
}

#[test]
fn oversized_multipliers_are_reset_uniformly() {
    let options = OptionsList::new().with_numeric("bound_mult_reset_threshold", 0.1);
    let (mut phase, _, _) = phase_with(SolverReturn::Success, options);
    let mut data = outer_data();

    let outcome = phase
        .perform_restoration(&mut data, &Scripted::infeasible())
        .unwrap();
    assert_eq!(outcome, RestorationOutcome::Success);
    let trial = data.trial().unwrap();
    for family in trial.bound_mult.families() {
        assert!(family.iter().all(|value| *value == 1.0));
    }
    assert_eq!(trial.bound_mult.x_lower.len(), 2);
    assert_eq!(trial.bound_mult.s_lower.len(), 1);
}

#[test]
fn zero_violation_is_a_precondition_error() {
    let (mut phase, log, _) = phase_with(SolverReturn::Success, OptionsList::new());
    let quantities = Scripted {
        violation: 0.0,
        ..Scripted::infeasible()
    };
    let err = phase
        .perform_restoration(&mut outer_data(), &quantities)
        .unwrap_err();
    assert!(matches!(err, RestoError::FeasibleStartingPoint { .. }));
    assert_eq!(log.calls.get(), 0);
}

#[test]
fn exhausted_budgets_fail_without_running_the_engine() {
    let clock = FixedClock {
        wall: 100.0,
        cpu: 100.0,
    };
    let timing = TimingStats::start(&FixedClock { wall: 0.0, cpu: 0.0 });

    let options = OptionsList::new()
        .with_numeric("max_wall_time", 50.0)
        .with_numeric("max_cpu_time", 50.0);
    let (engine, log) = scripted_engine(SolverReturn::Success, &[1.0, 1.0], &[0.5]);
    let mut phase = RestorationPhase::new(engine, Estimate(Rc::new(Cell::new(0)))).with_clock(clock);
    phase.initialize(&options, "", 1e-8).unwrap();
    let mut data = outer_data().with_timing(timing);
    let outcome = phase
        .perform_restoration(&mut data, &Scripted::infeasible())
        .unwrap();
    assert_eq!(outcome, RestorationOutcome::TimeExceeded(TimeLimit::Wall));

    let options = OptionsList::new().with_numeric("max_cpu_time", 50.0);
    let (engine, cpu_log) = scripted_engine(SolverReturn::Success, &[1.0, 1.0], &[0.5]);
    let mut phase = RestorationPhase::new(engine, Estimate(Rc::new(Cell::new(0))))
        .with_clock(FixedClock { wall: 100.0, cpu: 100.0 });
    phase.initialize(&options, "", 1e-8).unwrap();
    let outcome = phase
        .perform_restoration(&mut data, &Scripted::infeasible())
        .unwrap();
    assert_eq!(outcome, RestorationOutcome::TimeExceeded(TimeLimit::Cpu));

    assert_eq!(log.calls.get(), 0);
    assert_eq!(cpu_log.calls.get(), 0);
    assert_eq!(data.curr(), &current());
}

#[test]
fn remaining_budget_is_passed_down() {
    let options = OptionsList::new().with_numeric("max_wall_time", 50.0);
    let (engine, log) = scripted_engine(SolverReturn::Success, &[1.5, 1.2], &[0.4]);
    let mut phase = RestorationPhase::new(engine, Estimate(Rc::new(Cell::new(0))))
        .with_clock(FixedClock { wall: 30.0, cpu: 0.0 });
    phase.initialize(&options, "", 1e-8).unwrap();
    let mut data = outer_data().with_timing(TimingStats {
        start_wall_time: 10.0,
        start_cpu_time: 0.0,
    });
    phase
        .perform_restoration(&mut data, &Scripted::infeasible())
        .unwrap();
    assert_eq!(log.last_wall_budget.get(), Some(30.0));
}

#[test]
fn square_problem_solved_at_acceptable_point() {
    let (mut phase, log, _) = phase_with(
        SolverReturn::StopAtAcceptablePoint,
        OptionsList::new().with_numeric("constr_viol_tol", 1e-6),
    );
    let quantities = Scripted {
        unscaled_violation: 1e-9,
        square: true,
        ..Scripted::infeasible()
    };
    let mut data = outer_data();
    let outcome = phase.perform_restoration(&mut data, &quantities).unwrap();
    assert_eq!(outcome, RestorationOutcome::FeasibilityProblemSolved);
    assert_eq!(log.last_reduction.get(), Some(0.0));
    assert_eq!(data.curr().x, DVector::from_vec(vec![1.5, 1.2]));
    assert!(data.trial().is_none());
}

#[test]
fn square_problem_success_is_never_ordinary() {
    let options = OptionsList::new().with_numeric("constr_viol_tol", 1e-6);
    let feasible = Scripted {
        unscaled_violation: 1e-7,
        square: true,
        ..Scripted::infeasible()
    };
    let (mut phase, _, estimates) = phase_with(SolverReturn::Success, options.clone());
    let mut data = outer_data();
    let outcome = phase.perform_restoration(&mut data, &feasible).unwrap();
    assert_eq!(outcome, RestorationOutcome::FeasibilityProblemSolved);
    assert_eq!(data.curr().x, DVector::from_vec(vec![1.5, 1.2]));
    assert_eq!(estimates.get(), 0);

    let still_infeasible = Scripted {
        unscaled_violation: 1e-3,
        ..feasible
    };
    let (mut phase, _, _) = phase_with(SolverReturn::Success, options);
    let outcome = phase
        .perform_restoration(&mut outer_data(), &still_infeasible)
        .unwrap();
    assert_ne!(outcome, RestorationOutcome::Success);
}

#[test]
fn square_success_at_exactly_the_violation_tolerance_is_solved() {
    let options = OptionsList::new().with_numeric("constr_viol_tol", 1e-6);
    let (mut phase, _, _) = phase_with(SolverReturn::Success, options);
    let quantities = Scripted {
        unscaled_violation: 1e-6,
        square: true,
        ..Scripted::infeasible()
    };
    let outcome = phase
        .perform_restoration(&mut outer_data(), &quantities)
        .unwrap();
    assert_eq!(outcome, RestorationOutcome::FeasibilityProblemSolved);
}

#[test]
fn square_acceptable_point_needs_violation_strictly_below_tolerance() {
    let options = OptionsList::new().with_numeric("constr_viol_tol", 1e-6);
    let (mut phase, _, _) = phase_with(SolverReturn::StopAtAcceptablePoint, options);
    let quantities = Scripted {
        unscaled_violation: 1e-6,
        square: true,
        ..Scripted::infeasible()
    };
    let mut data = outer_data();
    let outcome = phase.perform_restoration(&mut data, &quantities).unwrap();
    assert_eq!(outcome, RestorationOutcome::LocallyInfeasible);
    assert_eq!(data.curr().x, DVector::from_vec(vec![1.5, 1.2]));
}

#[test]
fn primal_infeasibility_at_the_failure_threshold_counts_as_feasible() {
    let options = OptionsList::new().with_numeric("resto_failure_feasibility_threshold", 1e-4);
    for status in [SolverReturn::StopAtTinyStep, SolverReturn::StopAtAcceptablePoint] {
        let (mut phase, _, _) = phase_with(status, options.clone());
        let at_threshold = Scripted {
            primal_infeasibility: 1e-4,
            ..Scripted::infeasible()
        };
        let outcome = phase
            .perform_restoration(&mut outer_data(), &at_threshold)
            .unwrap();
        assert_eq!(outcome, RestorationOutcome::ConvergedToFeasiblePoint, "status {status:?}");

        let above = Scripted {
            primal_infeasibility: 1.0001e-4,
            ..Scripted::infeasible()
        };
        let outcome = phase.perform_restoration(&mut outer_data(), &above).unwrap();
        assert_eq!(outcome, RestorationOutcome::LocallyInfeasible, "status {status:?}");
    }
}

#[test]
fn wrongly_sized_restoration_iterate_is_not_salvaged() {
    let (engine, _) = scripted_engine(SolverReturn::MaxIterExceeded, &[1.5, 1.2, 0.7], &[0.4]);
    let mut phase = RestorationPhase::new(engine, Estimate(Rc::new(Cell::new(0))));
    phase.initialize(&OptionsList::new(), "", 1e-8).unwrap();
    let mut data = outer_data();
    let err = phase
        .perform_restoration(&mut data, &Scripted::infeasible())
        .unwrap_err();
    assert!(matches!(
        err,
        RestoError::DimensionMismatch {
            context: "x",
            expected: 2,
            found: 3,
        }
    ));
    assert_eq!(data.curr(), &current());
    assert!(data.trial().is_none());
}

#[test]
fn tiny_step_near_feasibility_converges_to_feasible_point() {
    let (mut phase, _, _) = phase_with(SolverReturn::StopAtTinyStep, OptionsList::new());
    let quantities = Scripted {
        primal_infeasibility: 5e-9,
        ..Scripted::infeasible()
    };
    let mut data = outer_data();
    let outcome = phase.perform_restoration(&mut data, &quantities).unwrap();
    assert_eq!(outcome, RestorationOutcome::ConvergedToFeasiblePoint);
    assert!(!outcome.is_fatal());

    let curr = data.curr();
    assert_eq!(curr.x, DVector::from_vec(vec![1.5, 1.2]));
    assert_eq!(curr.y_c, DVector::from_vec(vec![5.0]));
    assert_eq!(curr.y_d, DVector::from_vec(vec![6.0]));
    assert_eq!(curr.bound_mult.x_lower, DVector::from_vec(vec![1e4, 1e4]));
    assert_eq!(curr.bound_mult.s_lower, DVector::from_vec(vec![2.0]));
}

#[test]
fn tiny_step_far_from_feasibility_is_local_infeasibility() {
    let (mut phase, _, _) = phase_with(SolverReturn::StopAtTinyStep, OptionsList::new());
    let quantities = Scripted {
        primal_infeasibility: 5.0,
        ..Scripted::infeasible()
    };
    let outcome = phase
        .perform_restoration(&mut outer_data(), &quantities)
        .unwrap();
    assert_eq!(outcome, RestorationOutcome::LocallyInfeasible);
    assert_eq!(outcome.solver_return(), Some(SolverReturn::LocalInfeasibility));
}

#[test]
fn pass_through_statuses() {
    let cases = [
        (SolverReturn::LocalInfeasibility, RestorationOutcome::LocallyInfeasible),
        (SolverReturn::UserRequestedStop, RestorationOutcome::UserStop),
        (
            SolverReturn::CpuTimeExceeded,
            RestorationOutcome::TimeExceeded(TimeLimit::Cpu),
        ),
        (
            SolverReturn::WallTimeExceeded,
            RestorationOutcome::TimeExceeded(TimeLimit::Wall),
        ),
        (
            SolverReturn::InvalidNumberDetected,
            RestorationOutcome::InternalUnexpected(SolverReturn::InvalidNumberDetected),
        ),
    ];
    for (status, expected) in cases {
        let (mut phase, _, _) = phase_with(status, OptionsList::new());
        let outcome = phase
            .perform_restoration(&mut outer_data(), &Scripted::infeasible())
            .unwrap();
        assert_eq!(outcome, expected, "status {status:?}");
    }
}

#[test]
fn expected_infeasibility_requests_reduction_on_first_call_only() {
    let options = OptionsList::new().with_string("expect_infeasible_problem", "yes");
    let (mut phase, log, _) = phase_with(SolverReturn::LocalInfeasibility, options);
    let quantities = Scripted {
        violation: 0.5,
        ..Scripted::infeasible()
    };

    phase.perform_restoration(&mut outer_data(), &quantities).unwrap();
    assert_eq!(log.last_reduction.get(), Some(1e-3));
    phase.perform_restoration(&mut outer_data(), &quantities).unwrap();
    assert_eq!(log.last_reduction.get(), None);
    assert_eq!(phase.count_restorations(), 2);
}
