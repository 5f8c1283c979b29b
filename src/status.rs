//! Terminal statuses of an optimization run and outcomes of a restoration call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal status reported by a full optimization run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverReturn {
    Success,
    MaxIterExceeded,
    CpuTimeExceeded,
    WallTimeExceeded,
    StopAtTinyStep,
    StopAtAcceptablePoint,
    LocalInfeasibility,
    UserRequestedStop,
    FeasiblePointFound,
    DivergingIterates,
    RestorationFailure,
    ErrorInStepComputation,
    InvalidNumberDetected,
    TooFewDegreesOfFreedom,
    InvalidOption,
    OutOfMemory,
    InternalError,
    Unassigned,
}

impl fmt::Display for SolverReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SolverReturn::Success => "optimal solution found",
            SolverReturn::MaxIterExceeded => "maximum number of iterations exceeded",
            SolverReturn::CpuTimeExceeded => "maximum CPU time exceeded",
            SolverReturn::WallTimeExceeded => "maximum wallclock time exceeded",
            SolverReturn::StopAtTinyStep => "search direction became too small",
            SolverReturn::StopAtAcceptablePoint => "solved to acceptable level",
            SolverReturn::LocalInfeasibility => "converged to a point of local infeasibility",
            SolverReturn::UserRequestedStop => "stopped at user request",
            SolverReturn::FeasiblePointFound => "feasible point for square problem found",
            SolverReturn::DivergingIterates => "iterates diverging",
            SolverReturn::RestorationFailure => "restoration failed",
            SolverReturn::ErrorInStepComputation => "error in step computation",
            SolverReturn::InvalidNumberDetected => "invalid number detected",
            SolverReturn::TooFewDegreesOfFreedom => "problem has too few degrees of freedom",
            SolverReturn::InvalidOption => "invalid option",
            SolverReturn::OutOfMemory => "not enough memory",
            SolverReturn::InternalError => "internal error",
            SolverReturn::Unassigned => "unassigned status",
        };
        f.write_str(text)
    }
}

/// Which time limit was hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeLimit {
    Wall,
    Cpu,
}

/// Result of one restoration call, as seen by the outer algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestorationOutcome {
    /// A new trial point has been installed; the outer algorithm may resume.
    Success,
    /// A square problem has been made feasible within `constr_viol_tol`.
    FeasibilityProblemSolved,
    /// The restoration problem converged to a local minimizer of infeasibility.
    LocallyInfeasible,
    /// The restoration run stopped early at a point that is nearly feasible for the outer problem.
    ConvergedToFeasiblePoint,
    /// A wallclock or CPU budget was exhausted, before or during the run.
    TimeExceeded(TimeLimit),
    /// The restoration run hit its iteration cap.
    MaxIterationsExceeded,
    /// A nested restoration or the step computation failed.
    RestorationFailed,
    /// The user asked the run to stop.
    UserStop,
    /// The restoration run ended with a status that has no classification.
    InternalUnexpected(SolverReturn),
}

impl RestorationOutcome {
    /// Whether the outer algorithm may continue iterating from the new trial point.
    pub fn is_success(&self) -> bool {
        matches!(self, RestorationOutcome::Success)
    }

    /// Whether the outcome ends the overall solve.
    ///
    /// [`ConvergedToFeasiblePoint`](RestorationOutcome::ConvergedToFeasiblePoint)
    /// is left to the outer algorithm to decide.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RestorationOutcome::Success | RestorationOutcome::ConvergedToFeasiblePoint
        )
    }

    /// Final status of the overall solve implied by this outcome, if it ends it.
    pub fn solver_return(&self) -> Option<SolverReturn> {
        match self {
            RestorationOutcome::Success | RestorationOutcome::ConvergedToFeasiblePoint => None,
            RestorationOutcome::FeasibilityProblemSolved => Some(SolverReturn::FeasiblePointFound),
            RestorationOutcome::LocallyInfeasible => Some(SolverReturn::LocalInfeasibility),
            RestorationOutcome::TimeExceeded(TimeLimit::Wall) => {
                Some(SolverReturn::WallTimeExceeded)
            }
            RestorationOutcome::TimeExceeded(TimeLimit::Cpu) => Some(SolverReturn::CpuTimeExceeded),
            RestorationOutcome::MaxIterationsExceeded => Some(SolverReturn::MaxIterExceeded),
            RestorationOutcome::RestorationFailed => Some(SolverReturn::RestorationFailure),
            RestorationOutcome::UserStop => Some(SolverReturn::UserRequestedStop),
            RestorationOutcome::InternalUnexpected(_) => Some(SolverReturn::InternalError),
        }
    }
}

impl fmt::Display for RestorationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorationOutcome::Success => write!(f, "restoration phase succeeded"),
            RestorationOutcome::FeasibilityProblemSolved => write!(
                f,
                "restoration phase converged to sufficiently feasible point of original square problem"
            ),
            RestorationOutcome::LocallyInfeasible => write!(
                f,
                "restoration phase converged to a point of local infeasibility"
            ),
            RestorationOutcome::ConvergedToFeasiblePoint => write!(
                f,
                "restoration phase converged to a point with small primal infeasibility"
            ),
            RestorationOutcome::TimeExceeded(TimeLimit::Wall) => {
                write!(f, "maximal wallclock time exceeded in restoration phase")
            }
            RestorationOutcome::TimeExceeded(TimeLimit::Cpu) => {
                write!(f, "maximal CPU time exceeded in restoration phase")
            }
            RestorationOutcome::MaxIterationsExceeded => {
                write!(f, "maximal number of iterations exceeded in restoration phase")
            }
            RestorationOutcome::RestorationFailed => write!(f, "restoration phase failed"),
            RestorationOutcome::UserStop => {
                write!(f, "user requested stop during restoration phase")
            }
            RestorationOutcome::InternalUnexpected(status) => {
                write!(f, "restoration phase ended with unexpected status: {status}")
            }
        }
    }
}
