use thiserror::Error;

/// Unified error type for `ipresto` operations.
///
/// These are setup and representation errors. Ordinary ways a restoration
/// call can end, including its failures, are reported through
/// [`RestorationOutcome`](crate::status::RestorationOutcome) instead.
#[derive(Debug, Error)]
pub enum RestoError {
    /// Raised when restoration is requested at a point that is already feasible.
    #[error("restoration phase entered with non-positive constraint violation {violation}")]
    FeasibleStartingPoint { violation: f64 },

    /// Raised when the controller is used before [`initialize`](crate::RestorationPhase::initialize).
    #[error("restoration phase must be initialized before performing restoration")]
    NotInitialized,

    /// Raised when an augmented-space vector is expected but a plain vector was supplied.
    #[error("expected a compound vector for `{context}`")]
    NotCompound {
        /// Name of the iterate component being reduced.
        context: &'static str,
    },

    /// Raised when provided vectors have incompatible dimensions.
    #[error("dimension mismatch in {context}: expected {expected} but found {found}")]
    DimensionMismatch {
        /// Human-readable context describing the operation.
        context: &'static str,
        /// The required dimension.
        expected: usize,
        /// The dimension that was actually supplied.
        found: usize,
    },

    /// Raised when the restoration engine reports success without leaving an iterate behind.
    #[error("restoration engine returned {status} without a current iterate")]
    MissingIterate { status: String },

    /// Raised when a trial point is accepted before one has been set.
    #[error("no trial point has been set")]
    MissingTrialPoint,

    /// Raised when an option holds a value outside its admissible range.
    #[error("option `{name}` must be {requirement}, found {value}")]
    InvalidOption {
        name: String,
        requirement: &'static str,
        value: String,
    },

    /// Raised when the equality multiplier estimator fails to set itself up.
    #[error("equality multiplier estimator failed to initialize: {reason}")]
    EstimatorInitialization { reason: String },
}

impl RestoError {
    /// Helper to format a [`DimensionMismatch`](RestoError::DimensionMismatch) error.
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper to raise when a component is not an augmented-space vector.
    pub fn not_compound(context: &'static str) -> Self {
        Self::NotCompound { context }
    }

    /// Helper for rejecting option values that violate their bounds.
    pub fn invalid_option<S: Into<String>>(name: S, requirement: &'static str, value: f64) -> Self {
        Self::InvalidOption {
            name: name.into(),
            requirement,
            value: value.to_string(),
        }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, RestoError>;
