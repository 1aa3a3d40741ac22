use sem_core::{Axis, ParameterSpace, Query, ResultStore, SemError, SimulationResult};
use serde::Serialize;
use tracing::debug;

/// Nested container with one level per parameter axis.
///
/// Serializes as plain nested JSON arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Nested<L> {
    Node(Vec<Nested<L>>),
    Leaf(L),
}

impl<L> Nested<L> {
    pub fn children(&self) -> Option<&[Nested<L>]> {
        match self {
            Nested::Node(children) => Some(children),
            Nested::Leaf(_) => None,
        }
    }

    pub fn leaf(&self) -> Option<&L> {
        match self {
            Nested::Node(_) => None,
            Nested::Leaf(leaf) => Some(leaf),
        }
    }

    /// Follows one child index per level.
    pub fn get(&self, index: &[usize]) -> Option<&Nested<L>> {
        match index.split_first() {
            None => Some(self),
            Some((head, rest)) => self.children()?.get(*head)?.get(rest),
        }
    }

    /// Number of node levels above the leaves, read along the first branch.
    pub fn depth(&self) -> usize {
        match self {
            Nested::Leaf(_) => 0,
            Nested::Node(children) => 1 + children.first().map(Nested::depth).unwrap_or(0),
        }
    }

    /// Length of each node level, read along the first branch.
    pub fn outer_shape(&self) -> Vec<usize> {
        let mut shape = Vec::new();
        let mut cursor = self;
        while let Nested::Node(children) = cursor {
            shape.push(children.len());
            match children.first() {
                Some(first) => cursor = first,
                None => break,
            }
        }
        shape
    }

    /// Leaves in row-major order.
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            Nested::Leaf(leaf) => out.push(leaf),
            Nested::Node(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    pub fn into_leaves(self) -> Vec<L> {
        match self {
            Nested::Leaf(leaf) => vec![leaf],
            Nested::Node(children) => children.into_iter().flat_map(Nested::into_leaves).collect(),
        }
    }

    pub fn map<M, F: FnMut(L) -> M>(self, mut f: F) -> Nested<M> {
        self.map_inner(&mut f)
    }

    fn map_inner<M, F: FnMut(L) -> M>(self, f: &mut F) -> Nested<M> {
        match self {
            Nested::Leaf(leaf) => Nested::Leaf(f(leaf)),
            Nested::Node(children) => {
                Nested::Node(children.into_iter().map(|child| child.map_inner(f)).collect())
            }
        }
    }
}

impl<T> Nested<Vec<T>> {
    /// Outer shape plus the repetition count of the first leaf.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = self.outer_shape();
        let origin = vec![0; shape.len()];
        let runs = self.get(&origin).and_then(Nested::leaf).map(Vec::len);
        shape.push(runs.unwrap_or(0));
        shape
    }
}

/// Rebuilds flat results into a structure indexed by parameter axes.
pub struct SpaceReconstructor<'s, S: ResultStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: ResultStore + ?Sized> SpaceReconstructor<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// One level per axis of `space` in declared order; each leaf holds the
    /// parsed stdout of every matching repetition.
    pub fn build<T, F>(
        &self,
        query: &Query,
        space: &ParameterSpace,
        mut leaf_fn: F,
    ) -> Result<Nested<Vec<T>>, SemError>
    where
        F: FnMut(&str) -> T,
    {
        space.validate()?;
        let mut leaf = |results: Vec<SimulationResult>| {
            results
                .iter()
                .map(|result| leaf_fn(&result.stdout))
                .collect::<Vec<T>>()
        };
        self.descend(query, space.axes(), &mut leaf)
    }

    /// Like [`SpaceReconstructor::build`], reducing each leaf's repetitions
    /// to a single value.
    pub fn build_reduced<T, U, F, R>(
        &self,
        query: &Query,
        space: &ParameterSpace,
        mut leaf_fn: F,
        mut reduce_fn: R,
    ) -> Result<Nested<U>, SemError>
    where
        F: FnMut(&str) -> T,
        R: FnMut(Vec<T>) -> U,
    {
        space.validate()?;
        let mut leaf = |results: Vec<SimulationResult>| {
            let parsed = results
                .iter()
                .map(|result| leaf_fn(&result.stdout))
                .collect::<Vec<T>>();
            reduce_fn(parsed)
        };
        self.descend(query, space.axes(), &mut leaf)
    }

    fn descend<L>(
        &self,
        query: &Query,
        axes: &[Axis],
        leaf: &mut dyn FnMut(Vec<SimulationResult>) -> L,
    ) -> Result<Nested<L>, SemError> {
        let Some((axis, rest)) = axes.split_first() else {
            let results = self.store.query(query)?;
            debug!(matches = results.len(), "reconstructed leaf");
            return Ok(Nested::Leaf(leaf(results)));
        };
        let mut children = Vec::with_capacity(axis.values.len());
        for value in &axis.values {
            let bound = query.bind(axis.name.clone(), value.clone());
            children.push(self.descend(&bound, rest, leaf)?);
        }
        Ok(Nested::Node(children))
    }
}
