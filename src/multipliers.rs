//! Multiplier recovery after a restoration run.
//!
//! The restoration run does not produce meaningful multipliers for the outer
//! problem. The whole primal move `curr -> trial` is treated as one primal-dual
//! Newton step, and the matching dual step for the bound multipliers is
//! reconstructed from the complementarity conditions `z ⊙ slack = mu`.

use log::debug;
use nalgebra::DVector;

use crate::error::{RestoError, Result};
use crate::iterates::{BoundVectors, Iterates};
use crate::options::OptionsList;

/// Newton step for one bound multiplier family.
///
/// `delta_z = ((curr_slack - trial_slack) ⊙ curr_z + mu) / curr_slack - curr_z`
pub fn bound_multiplier_step(
    curr_z: &DVector<f64>,
    curr_slack: &DVector<f64>,
    trial_slack: &DVector<f64>,
    mu: f64,
) -> Result<DVector<f64>> {
    let n = curr_z.len();
    if curr_slack.len() != n {
        return Err(RestoError::dimension_mismatch("current slack", n, curr_slack.len()));
    }
    if trial_slack.len() != n {
        return Err(RestoError::dimension_mismatch("trial slack", n, trial_slack.len()));
    }

    let mut delta = curr_slack - trial_slack;
    delta.component_mul_assign(curr_z);
    delta.add_scalar_mut(mu);
    delta.component_div_assign(curr_slack);
    delta -= curr_z;
    Ok(delta)
}

/// [`bound_multiplier_step`] for all four bound families at once.
pub fn bound_multiplier_steps(
    curr_z: &BoundVectors,
    curr_slacks: &BoundVectors,
    trial_slacks: &BoundVectors,
    mu: f64,
) -> Result<BoundVectors> {
    Ok(BoundVectors {
        x_lower: bound_multiplier_step(
            &curr_z.x_lower,
            &curr_slacks.x_lower,
            &trial_slacks.x_lower,
            mu,
        )?,
        x_upper: bound_multiplier_step(
            &curr_z.x_upper,
            &curr_slacks.x_upper,
            &trial_slacks.x_upper,
            mu,
        )?,
        s_lower: bound_multiplier_step(
            &curr_z.s_lower,
            &curr_slacks.s_lower,
            &trial_slacks.s_lower,
            mu,
        )?,
        s_upper: bound_multiplier_step(
            &curr_z.s_upper,
            &curr_slacks.s_upper,
            &trial_slacks.s_upper,
            mu,
        )?,
    })
}

/// Largest step in `(0, 1]` keeping every family above `(1 - tau)` times its current value.
pub fn dual_fraction_to_boundary(tau: f64, curr_z: &BoundVectors, delta: &BoundVectors) -> f64 {
    curr_z
        .families()
        .into_iter()
        .zip(delta.families())
        .map(|(z, dz)| fraction_to_boundary(tau, z, dz))
        .fold(1.0, f64::min)
}

fn fraction_to_boundary(tau: f64, z: &DVector<f64>, dz: &DVector<f64>) -> f64 {
    z.iter()
        .zip(dz.iter())
        .filter(|(_, step)| **step < 0.0)
        .map(|(value, step)| -tau * value / step)
        .fold(1.0, f64::min)
}

/// Bound multipliers proposed for the outer trial point.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundRepair {
    /// Step length applied to the reconstructed multiplier step.
    pub alpha_dual: f64,
    /// Largest multiplier produced by the step, before any reset.
    pub max_multiplier: f64,
    /// Whether the multipliers were reset to one.
    pub reset: bool,
    /// Multipliers for the trial point.
    pub multipliers: BoundVectors,
}

/// Reconstructs trial bound multipliers from the primal move of a restoration run.
pub fn repair_bound_multipliers(
    curr_z: &BoundVectors,
    curr_slacks: &BoundVectors,
    trial_slacks: &BoundVectors,
    mu: f64,
    tau: f64,
    reset_threshold: f64,
) -> Result<BoundRepair> {
    let delta = bound_multiplier_steps(curr_z, curr_slacks, trial_slacks, mu)?;
    let alpha_dual = dual_fraction_to_boundary(tau, curr_z, &delta);
    debug!("Step size for bound multipliers: {alpha_dual:8.2e}");

    let stepped = curr_z.axpy(alpha_dual, &delta)?;
    let max_multiplier = stepped.amax();
    if max_multiplier > reset_threshold {
        debug!(
            "Bound multipliers after restoration phase too large (max={max_multiplier:8.2e}). Set all to 1."
        );
        return Ok(BoundRepair {
            alpha_dual,
            max_multiplier,
            reset: true,
            multipliers: stepped.filled_like(1.0),
        });
    }

    Ok(BoundRepair {
        alpha_dual,
        max_multiplier,
        reset: false,
        multipliers: stepped,
    })
}

/// Least-squares estimator for the equality and inequality multipliers.
pub trait MultiplierEstimator {
    /// Reads the estimator's own options. Failure aborts the setup of the restoration phase.
    fn initialize(&mut self, _options: &OptionsList, _prefix: &str) -> Result<()> {
        Ok(())
    }

    /// Estimates `(y_c, y_d)` at `iterate`, or `None` if the estimate could not be computed.
    fn calculate_multipliers(&mut self, iterate: &Iterates) -> Option<(DVector<f64>, DVector<f64>)>;
}

/// Estimator that never produces an estimate, so constraint multipliers restart at zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroMultipliers;

impl MultiplierEstimator for ZeroMultipliers {
    fn calculate_multipliers(&mut self, _iterate: &Iterates) -> Option<(DVector<f64>, DVector<f64>)> {
        None
    }
}

/// Equality and inequality multipliers to install at `iterate`.
///
/// Square systems get zero multipliers. Otherwise the estimate is used only when
/// `reset_threshold` is positive, the estimator succeeds, and no entry of the
/// estimate exceeds the threshold in magnitude.
pub fn least_square_mults<M: MultiplierEstimator + ?Sized>(
    estimator: &mut M,
    iterate: &Iterates,
    reset_threshold: f64,
) -> Result<(DVector<f64>, DVector<f64>)> {
    let zeros = || {
        (
            DVector::zeros(iterate.y_c.len()),
            DVector::zeros(iterate.y_d.len()),
        )
    };

    if iterate.y_c.len() == iterate.x.len() || reset_threshold <= 0.0 {
        return Ok(zeros());
    }

    let Some((y_c, y_d)) = estimator.calculate_multipliers(iterate) else {
        debug!("Least-square multiplier estimate failed; constraint multipliers set to zero.");
        return Ok(zeros());
    };
    if y_c.len() != iterate.y_c.len() {
        return Err(RestoError::dimension_mismatch("y_c estimate", iterate.y_c.len(), y_c.len()));
    }
    if y_d.len() != iterate.y_d.len() {
        return Err(RestoError::dimension_mismatch("y_d estimate", iterate.y_d.len(), y_d.len()));
    }

    let norm = y_c.amax().max(y_d.amax());
    if norm > reset_threshold {
        debug!("Least-square multipliers too large (max={norm:8.2e}); set to zero.");
        return Ok(zeros());
    }
    Ok((y_c, y_d))
}
