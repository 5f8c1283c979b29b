//! Vector representations shared by the outer algorithm and the restoration problem.
//!
//! The restoration problem augments every primal and dual vector of the
//! original problem with extra blocks (penalty slacks and their multipliers).
//! Those vectors arrive as [`IterVector::Compound`]; their first block lives in
//! the original problem's coordinate space.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{RestoError, Result};

/// A vector that is either a plain dense block or a composition of sub-blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum IterVector {
    /// A contiguous vector in a single coordinate space.
    Dense(DVector<f64>),
    /// A vector composed of several sub-vectors laid end to end.
    Compound(CompoundVector),
}

impl IterVector {
    /// Total number of entries across all blocks.
    pub fn dim(&self) -> usize {
        match self {
            IterVector::Dense(values) => values.len(),
            IterVector::Compound(compound) => compound.dim(),
        }
    }

    /// Returns the compound view of this vector, if it has one.
    pub fn as_compound(&self) -> Option<&CompoundVector> {
        match self {
            IterVector::Compound(compound) => Some(compound),
            IterVector::Dense(_) => None,
        }
    }

    /// Returns the dense values of this vector, if it is a single block.
    pub fn as_dense(&self) -> Option<&DVector<f64>> {
        match self {
            IterVector::Dense(values) => Some(values),
            IterVector::Compound(_) => None,
        }
    }

    /// Extracts the first sub-block, i.e. the part living in the original problem space.
    ///
    /// Fails if the vector is not compound or if its first block is not dense.
    pub fn first_block(&self, context: &'static str) -> Result<DVector<f64>> {
        let compound = self
            .as_compound()
            .ok_or_else(|| RestoError::not_compound(context))?;
        compound
            .comp(0)
            .and_then(IterVector::as_dense)
            .cloned()
            .ok_or_else(|| RestoError::not_compound(context))
    }

    /// Largest absolute entry, or zero for an empty vector.
    pub fn amax(&self) -> f64 {
        match self {
            IterVector::Dense(values) => amax(values),
            IterVector::Compound(compound) => compound
                .comps
                .iter()
                .map(IterVector::amax)
                .fold(0.0, f64::max),
        }
    }
}

impl From<DVector<f64>> for IterVector {
    fn from(value: DVector<f64>) -> Self {
        IterVector::Dense(value)
    }
}

impl From<CompoundVector> for IterVector {
    fn from(value: CompoundVector) -> Self {
        IterVector::Compound(value)
    }
}

/// Ordered collection of sub-vectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompoundVector {
    comps: Vec<IterVector>,
}

impl CompoundVector {
    /// Creates a compound vector from its blocks.
    pub fn new(comps: Vec<IterVector>) -> Self {
        Self { comps }
    }

    /// Convenience constructor for compound vectors made only of dense blocks.
    pub fn from_dense(blocks: Vec<DVector<f64>>) -> Self {
        Self::new(blocks.into_iter().map(IterVector::Dense).collect())
    }

    /// Returns block `index`, if present.
    pub fn comp(&self, index: usize) -> Option<&IterVector> {
        self.comps.get(index)
    }

    /// Total number of entries across all blocks.
    pub fn dim(&self) -> usize {
        self.comps.iter().map(IterVector::dim).sum()
    }
}

/// Max-norm of a dense vector; zero when empty.
pub(crate) fn amax(values: &DVector<f64>) -> f64 {
    values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_block_of_compound_vector() {
        let v = IterVector::from(CompoundVector::from_dense(vec![
            DVector::from_vec(vec![1.0, -2.0]),
            DVector::from_vec(vec![7.0, 8.0, 9.0]),
        ]));
        assert_eq!(v.dim(), 5);
        assert_eq!(v.first_block("x").unwrap(), DVector::from_vec(vec![1.0, -2.0]));
        assert_eq!(v.amax(), 9.0);
    }

    #[test]
    fn dense_vector_is_not_compound() {
        let v = IterVector::from(DVector::from_vec(vec![1.0]));
        assert!(v.as_compound().is_none());
        let err = v.first_block("y_c").unwrap_err();
        assert!(matches!(err, RestoError::NotCompound { context: "y_c" }));
    }

    #[test]
    fn nested_first_block_is_rejected() {
        let inner = CompoundVector::from_dense(vec![DVector::from_vec(vec![1.0])]);
        let v = IterVector::from(CompoundVector::new(vec![IterVector::from(inner)]));
        assert!(v.first_block("s").is_err());
    }

    #[test]
    fn empty_amax_is_zero() {
        assert_eq!(amax(&DVector::zeros(0)), 0.0);
    }
}
