//! Feasibility restoration phase for interior-point nonlinear programming solvers.
//!
//! When the line search of an interior-point method cannot find an acceptable
//! trial point, the solver switches to a restoration phase: it minimizes the
//! constraint violation (plus a proximity term to the last iterate) by running
//! a complete copy of the optimizer on an auxiliary problem. This crate
//! provides the controller around that recursive solve. It
//!
//! - derives the options of the restoration run from the outer options
//!   (`options` module),
//! - runs the restoration engine under the remaining time budget and maps its
//!   terminal status to a [`RestorationOutcome`] (`restoration` module),
//! - brings the restoration iterate back into the original problem space
//!   (`vector` and `iterates` modules), and
//! - reconstructs bound and constraint multipliers for the outer algorithm
//!   (`multipliers` module).
//!
//! The optimizer itself, the problem functions and the least-squares
//! multiplier estimator are supplied by the caller through the
//! [`RestorationEngine`], [`ProblemQuantities`] and [`MultiplierEstimator`]
//! traits.
//!
//! # Quick start
//!
//! ```no_run
//! use ipresto::data::{AlgorithmData, RestoData};
//! use ipresto::iterates::{BoundVectors, Iterates};
//! use ipresto::options::OptionsList;
//! use ipresto::restoration::{ProblemQuantities, RestorationEngine, RestorationRequest};
//! use ipresto::{RestorationOutcome, RestorationPhase, SolverReturn, ZeroMultipliers};
//! use nalgebra::DVector;
//!
//! struct MyEngine;
//!
//! impl RestorationEngine for MyEngine {
//!     fn optimize(&mut self, _request: &RestorationRequest<'_>, _data: &mut RestoData) -> SolverReturn {
//!         // Build the restoration problem around `request.reference` and solve it.
//!         SolverReturn::LocalInfeasibility
//!     }
//! }
//!
//! # fn quantities() -> Box<dyn ProblemQuantities> { unimplemented!() }
//! let quantities = quantities();
//! let empty = || DVector::zeros(0);
//! let curr = Iterates::new(
//!     DVector::from_vec(vec![3.0]),
//!     empty(),
//!     DVector::from_vec(vec![0.0]),
//!     empty(),
//!     BoundVectors::new(DVector::from_vec(vec![1.0]), empty(), empty(), empty()),
//! );
//! let mut data = AlgorithmData::new(curr, 0.1, 0.99);
//!
//! let mut phase = RestorationPhase::new(MyEngine, ZeroMultipliers);
//! phase.initialize(&OptionsList::new(), "", 1e-8).expect("valid options");
//!
//! match phase.perform_restoration(&mut data, quantities.as_ref()).expect("restoration ran") {
//!     RestorationOutcome::Success => println!("resume from {:?}", data.trial()),
//!     outcome => println!("stopping: {outcome}"),
//! }
//! ```

pub mod data;
pub mod error;
pub mod iterates;
pub mod multipliers;
pub mod options;
pub mod restoration;
pub mod status;
pub mod vector;

pub use error::{RestoError, Result};
pub use multipliers::{MultiplierEstimator, ZeroMultipliers};
pub use options::{OptionsList, RestorationThresholds};
pub use restoration::{ProblemQuantities, RestorationEngine, RestorationPhase};
pub use status::{RestorationOutcome, SolverReturn, TimeLimit};
