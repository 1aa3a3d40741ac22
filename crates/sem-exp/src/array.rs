use sem_core::{ErrorInfo, ParameterSpace, SemError};
use serde::Serialize;
use serde_json::Value;

use crate::space::Nested;

/// Name of the trailing repetition dimension.
pub const RUNS_DIM: &str = "runs";

/// Dense row-major array with named dimensions and coordinate labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledArray<T> {
    dims: Vec<String>,
    coords: Vec<Vec<Value>>,
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> LabeledArray<T> {
    /// Flattens a per-repetition reconstruction, adding a trailing `runs`
    /// dimension. Every leaf must hold the same number of repetitions.
    pub fn from_runs(space: &ParameterSpace, nested: Nested<Vec<T>>) -> Result<Self, SemError> {
        let leaves = nested.into_leaves();
        let runs = leaves.first().map(Vec::len).unwrap_or(0);
        if let Some(ragged) = leaves.iter().find(|leaf| leaf.len() != runs) {
            return Err(SemError::Config(
                ErrorInfo::new(
                    "sem_exp.ragged_runs",
                    "parameter points hold different numbers of repetitions",
                )
                .with_context("expected", runs.to_string())
                .with_context("found", ragged.len().to_string())
                .with_hint("run missing simulations with the same run count first"),
            ));
        }
        let (mut dims, mut coords, mut shape) = axes_of(space);
        dims.push(RUNS_DIM.to_string());
        coords.push((0..runs).map(Value::from).collect());
        shape.push(runs);
        let data = leaves.into_iter().flatten().collect();
        Self::assemble(dims, coords, shape, data)
    }

    /// Flattens a reconstruction whose leaves were already reduced.
    pub fn from_reduced(space: &ParameterSpace, nested: Nested<T>) -> Result<Self, SemError> {
        let (dims, coords, shape) = axes_of(space);
        Self::assemble(dims, coords, shape, nested.into_leaves())
    }

    fn assemble(
        dims: Vec<String>,
        coords: Vec<Vec<Value>>,
        shape: Vec<usize>,
        data: Vec<T>,
    ) -> Result<Self, SemError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(SemError::Config(
                ErrorInfo::new("sem_exp.array_shape", "data does not fill the array shape")
                    .with_context("expected", expected.to_string())
                    .with_context("found", data.len().to_string()),
            ));
        }
        Ok(Self {
            dims,
            coords,
            shape,
            data,
        })
    }

    /// Drops every dimension of length one. Row-major order is unchanged.
    pub fn squeeze(self) -> Self {
        let mut dims = Vec::new();
        let mut coords = Vec::new();
        let mut shape = Vec::new();
        for ((dim, coord), len) in self.dims.into_iter().zip(self.coords).zip(self.shape) {
            if len != 1 {
                dims.push(dim);
                coords.push(coord);
                shape.push(len);
            }
        }
        Self {
            dims,
            coords,
            shape,
            data: self.data,
        }
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn coords(&self) -> &[Vec<Value>] {
        &self.coords
    }

    /// Coordinate labels of a named dimension.
    pub fn coord(&self, dim: &str) -> Option<&[Value]> {
        let idx = self.dims.iter().position(|name| name == dim)?;
        Some(&self.coords[idx])
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at a full multi-index.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (idx, len) in index.iter().zip(&self.shape) {
            if idx >= len {
                return None;
            }
            offset = offset * len + idx;
        }
        self.data.get(offset)
    }
}

fn axes_of(space: &ParameterSpace) -> (Vec<String>, Vec<Vec<Value>>, Vec<usize>) {
    let axes = space.axes();
    (
        axes.iter().map(|axis| axis.name.clone()).collect(),
        axes.iter().map(|axis| axis.values.clone()).collect(),
        axes.iter().map(|axis| axis.values.len()).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn space() -> ParameterSpace {
        ParameterSpace::new()
            .with_axis("x", vec![json!(1), json!(2)])
            .with_axis("y", vec![json!(10)])
    }

    fn nested(runs: &[usize]) -> Nested<Vec<f64>> {
        Nested::Node(
            runs.iter()
                .enumerate()
                .map(|(x, count)| {
                    Nested::Node(vec![Nested::Leaf(
                        (0..*count).map(|r| (x * 10 + r) as f64).collect(),
                    )])
                })
                .collect(),
        )
    }

    #[test]
    fn squeeze_drops_fixed_axes() {
        let array = LabeledArray::from_runs(&space(), nested(&[3, 3])).expect("array");
        assert_eq!(array.shape(), &[2, 1, 3]);
        let squeezed = array.squeeze();
        assert_eq!(squeezed.dims(), &["x".to_string(), RUNS_DIM.to_string()]);
        assert_eq!(squeezed.shape(), &[2, 3]);
        assert_eq!(squeezed.get(&[1, 2]), Some(&12.0));
        assert_eq!(squeezed.coord("x"), Some(&[json!(1), json!(2)][..]));
    }

    #[test]
    fn ragged_runs_are_rejected() {
        let err = LabeledArray::from_runs(&space(), nested(&[3, 2])).expect_err("ragged");
        assert_eq!(err.info().code, "sem_exp.ragged_runs");
    }

    #[test]
    fn reduced_arrays_have_no_runs_dimension() {
        let reduced = nested(&[2, 2]).map(|runs| runs.iter().sum::<f64>());
        let array = LabeledArray::from_reduced(&space(), reduced).expect("array");
        assert_eq!(array.dims().len(), 2);
        assert_eq!(array.get(&[1, 0]), Some(&21.0));
        assert_eq!(array.get(&[2, 0]), None);
    }
}
