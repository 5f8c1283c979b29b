//! Primal-dual iterate containers in the outer and in the restoration space.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{RestoError, Result};
use crate::vector::{amax, IterVector};

/// One vector per bound family: lower/upper bounds on variables and on slacks.
///
/// Used for bound multipliers, bound slacks and multiplier steps alike.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundVectors {
    /// Lower bounds on `x`.
    pub x_lower: DVector<f64>,
    /// Upper bounds on `x`.
    pub x_upper: DVector<f64>,
    /// Lower bounds on `s`.
    pub s_lower: DVector<f64>,
    /// Upper bounds on `s`.
    pub s_upper: DVector<f64>,
}

impl BoundVectors {
    /// Bundles the four families.
    pub fn new(
        x_lower: DVector<f64>,
        x_upper: DVector<f64>,
        s_lower: DVector<f64>,
        s_upper: DVector<f64>,
    ) -> Self {
        Self {
            x_lower,
            x_upper,
            s_lower,
            s_upper,
        }
    }

    /// Vectors with the same dimensions as `self`, every entry set to `value`.
    pub fn filled_like(&self, value: f64) -> Self {
        Self {
            x_lower: DVector::from_element(self.x_lower.len(), value),
            x_upper: DVector::from_element(self.x_upper.len(), value),
            s_lower: DVector::from_element(self.s_lower.len(), value),
            s_upper: DVector::from_element(self.s_upper.len(), value),
        }
    }

    /// Iterates over the four families in the order `x_lower, x_upper, s_lower, s_upper`.
    pub fn families(&self) -> [&DVector<f64>; 4] {
        [&self.x_lower, &self.x_upper, &self.s_lower, &self.s_upper]
    }

    /// Largest absolute entry over all four families.
    pub fn amax(&self) -> f64 {
        self.families().into_iter().map(amax).fold(0.0, f64::max)
    }

    /// Returns `self + alpha * step` family by family.
    pub fn axpy(&self, alpha: f64, step: &BoundVectors) -> Result<BoundVectors> {
        Ok(Self {
            x_lower: checked_axpy("x_lower", &self.x_lower, alpha, &step.x_lower)?,
            x_upper: checked_axpy("x_upper", &self.x_upper, alpha, &step.x_upper)?,
            s_lower: checked_axpy("s_lower", &self.s_lower, alpha, &step.s_lower)?,
            s_upper: checked_axpy("s_upper", &self.s_upper, alpha, &step.s_upper)?,
        })
    }
}

fn checked_axpy(
    context: &'static str,
    base: &DVector<f64>,
    alpha: f64,
    step: &DVector<f64>,
) -> Result<DVector<f64>> {
    if base.len() != step.len() {
        return Err(RestoError::dimension_mismatch(context, base.len(), step.len()));
    }
    Ok(base + step * alpha)
}

/// An iterate of the outer algorithm, expressed in the original problem space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Iterates {
    /// Primal variables.
    pub x: DVector<f64>,
    /// Slacks for the inequality constraints.
    pub s: DVector<f64>,
    /// Multipliers of the equality constraints.
    pub y_c: DVector<f64>,
    /// Multipliers of the inequality constraints.
    pub y_d: DVector<f64>,
    /// Bound multipliers (`z_L`, `z_U`, `v_L`, `v_U`).
    pub bound_mult: BoundVectors,
}

impl Iterates {
    /// Bundles the primal and dual components.
    pub fn new(
        x: DVector<f64>,
        s: DVector<f64>,
        y_c: DVector<f64>,
        y_d: DVector<f64>,
        bound_mult: BoundVectors,
    ) -> Self {
        Self {
            x,
            s,
            y_c,
            y_d,
            bound_mult,
        }
    }

    /// Replaces the primal part, keeping every multiplier.
    pub fn with_primal(mut self, x: DVector<f64>, s: DVector<f64>) -> Result<Self> {
        if x.len() != self.x.len() {
            return Err(RestoError::dimension_mismatch("x", self.x.len(), x.len()));
        }
        if s.len() != self.s.len() {
            return Err(RestoError::dimension_mismatch("s", self.s.len(), s.len()));
        }
        self.x = x;
        self.s = s;
        Ok(self)
    }

    /// Fails with [`RestoError::DimensionMismatch`] unless every component of
    /// `self` has the length of the matching component of `other`.
    pub fn check_shape(&self, other: &Iterates) -> Result<()> {
        let pairs = [
            ("x", &self.x, &other.x),
            ("s", &self.s, &other.s),
            ("y_c", &self.y_c, &other.y_c),
            ("y_d", &self.y_d, &other.y_d),
            ("z_L", &self.bound_mult.x_lower, &other.bound_mult.x_lower),
            ("z_U", &self.bound_mult.x_upper, &other.bound_mult.x_upper),
            ("v_L", &self.bound_mult.s_lower, &other.bound_mult.s_lower),
            ("v_U", &self.bound_mult.s_upper, &other.bound_mult.s_upper),
        ];
        for (context, ours, theirs) in pairs {
            if ours.len() != theirs.len() {
                return Err(RestoError::dimension_mismatch(context, theirs.len(), ours.len()));
            }
        }
        Ok(())
    }

    /// Replaces the equality and inequality multipliers.
    pub fn with_eq_mult(mut self, y_c: DVector<f64>, y_d: DVector<f64>) -> Self {
        self.y_c = y_c;
        self.y_d = y_d;
        self
    }

    /// Replaces all four bound multiplier families.
    pub fn with_bound_mult(mut self, bound_mult: BoundVectors) -> Self {
        self.bound_mult = bound_mult;
        self
    }
}

/// An iterate of the restoration problem, living in the augmented space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestoIterates {
    /// Primal variables; the first block is the outer `x`.
    pub x: IterVector,
    /// Slacks; the first block is the outer `s`.
    pub s: IterVector,
    pub y_c: IterVector,
    pub y_d: IterVector,
    /// Lower bound multipliers on `x`.
    pub z_lower: IterVector,
    /// Upper bound multipliers on `x`.
    pub z_upper: IterVector,
    /// Lower bound multipliers on `s`.
    pub v_lower: IterVector,
    /// Upper bound multipliers on `s`.
    pub v_upper: IterVector,
}

impl RestoIterates {
    /// First blocks of the primal vectors.
    pub fn outer_primal(&self) -> Result<(DVector<f64>, DVector<f64>)> {
        Ok((self.x.first_block("x")?, self.s.first_block("s")?))
    }

    /// Reduces every component to its first block, yielding an outer-space iterate.
    pub fn to_outer(&self) -> Result<Iterates> {
        let (x, s) = self.outer_primal()?;
        Ok(Iterates {
            x,
            s,
            y_c: self.y_c.first_block("y_c")?,
            y_d: self.y_d.first_block("y_d")?,
            bound_mult: BoundVectors {
                x_lower: self.z_lower.first_block("z_L")?,
                x_upper: self.z_upper.first_block("z_U")?,
                s_lower: self.v_lower.first_block("v_L")?,
                s_upper: self.v_upper.first_block("v_U")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::CompoundVector;

    fn augmented(head: &[f64], tail: &[f64]) -> IterVector {
        IterVector::from(CompoundVector::from_dense(vec![
            DVector::from_row_slice(head),
            DVector::from_row_slice(tail),
        ]))
    }

    #[test]
    fn to_outer_keeps_first_blocks() {
        let resto = RestoIterates {
            x: augmented(&[1.0, 2.0], &[0.5, 0.5, 0.5]),
            s: augmented(&[3.0], &[]),
            y_c: augmented(&[4.0], &[]),
            y_d: augmented(&[5.0], &[]),
            z_lower: augmented(&[6.0, 6.5], &[1.0, 1.0, 1.0]),
            z_upper: augmented(&[], &[]),
            v_lower: augmented(&[7.0], &[]),
            v_upper: augmented(&[], &[]),
        };
        let outer = resto.to_outer().unwrap();
        assert_eq!(outer.x, DVector::from_vec(vec![1.0, 2.0]));
        assert_eq!(outer.bound_mult.x_lower, DVector::from_vec(vec![6.0, 6.5]));
        assert_eq!(outer.bound_mult.x_upper.len(), 0);
        assert_eq!(outer.y_d[0], 5.0);
    }

    #[test]
    fn to_outer_rejects_dense_components() {
        let mut resto = RestoIterates {
            x: augmented(&[1.0], &[]),
            s: augmented(&[], &[]),
            y_c: augmented(&[], &[]),
            y_d: augmented(&[], &[]),
            z_lower: augmented(&[], &[]),
            z_upper: augmented(&[], &[]),
            v_lower: augmented(&[], &[]),
            v_upper: augmented(&[], &[]),
        };
        resto.v_upper = IterVector::from(DVector::zeros(0));
        assert!(matches!(
            resto.to_outer(),
            Err(RestoError::NotCompound { context: "v_U" })
        ));
    }

    #[test]
    fn shape_check_names_the_offending_component() {
        let resto = RestoIterates {
            x: augmented(&[1.0, 2.0], &[0.5]),
            s: augmented(&[], &[]),
            y_c: augmented(&[4.0], &[]),
            y_d: augmented(&[], &[]),
            z_lower: augmented(&[6.0], &[1.0]),
            z_upper: augmented(&[], &[]),
            v_lower: augmented(&[], &[]),
            v_upper: augmented(&[], &[]),
        };
        let outer = resto.to_outer().unwrap();
        assert!(outer.check_shape(&outer).is_ok());

        let reference = outer.clone().with_bound_mult(BoundVectors::new(
            DVector::zeros(2),
            DVector::zeros(0),
            DVector::zeros(0),
            DVector::zeros(0),
        ));
        assert!(matches!(
            outer.check_shape(&reference),
            Err(RestoError::DimensionMismatch {
                context: "z_L",
                expected: 2,
                found: 1,
            })
        ));
    }

    #[test]
    fn bound_vectors_axpy_and_amax() {
        let z = BoundVectors::new(
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![2.0, 3.0]),
            DVector::zeros(0),
            DVector::from_vec(vec![0.5]),
        );
        let step = z.filled_like(-1.0);
        let next = z.axpy(0.5, &step).unwrap();
        assert_eq!(next.x_upper, DVector::from_vec(vec![1.5, 2.5]));
        assert_eq!(next.amax(), 2.5);
    }
}
