//! Parameter combinations, repetition identifiers, queries, and spaces.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{serde_error, ErrorInfo, SemError};

/// Parameter name under which the repetition identifier is stored.
pub const REPETITION_KEY: &str = "RngRun";

/// Identifier distinguishing repetitions of one combination across a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepetitionId(u64);

impl RepetitionId {
    /// Creates a new identifier from its raw integer representation.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Returns the identifier `offset` positions after this one.
    pub const fn offset(&self, offset: u64) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Display for RepetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable assignment of scalar values to parameter names.
///
/// Every "mutation" returns a new value, so combinations handed out in a batch
/// never alias each other.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterCombination(BTreeMap<String, Value>);

impl ParameterCombination {
    /// Creates an empty combination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this combination with `name` bound to `value`.
    pub fn with(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.0.clone();
        next.insert(name.into(), value.into());
        Self(next)
    }

    /// Returns a copy of this combination stamped with the repetition id.
    pub fn with_repetition(&self, id: RepetitionId) -> Self {
        self.with(REPETITION_KEY, id.as_raw())
    }

    /// Returns a copy of this combination without the repetition id.
    pub fn without_repetition(&self) -> Self {
        let mut next = self.0.clone();
        next.remove(REPETITION_KEY);
        Self(next)
    }

    /// Returns the repetition id, if one is bound and is a non-negative integer.
    pub fn repetition(&self) -> Option<RepetitionId> {
        self.0
            .get(REPETITION_KEY)
            .and_then(Value::as_u64)
            .map(RepetitionId::from_raw)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying ordered map.
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    /// Canonical JSON encoding: keys sorted, no whitespace.
    pub fn to_canonical_json(&self) -> Result<String, SemError> {
        serde_json::to_string(&self.0).map_err(|err| serde_error("sem_core.params_encode", err))
    }

    /// Deduplication key: canonical JSON with integral floats written as
    /// integers, so combinations equal under [`values_match`] share a key.
    pub fn normalized_key(&self) -> Result<String, SemError> {
        let normalized: BTreeMap<&str, Value> = self
            .0
            .iter()
            .map(|(name, value)| (name.as_str(), normalize_number(value)))
            .collect();
        serde_json::to_string(&normalized).map_err(|err| serde_error("sem_core.params_encode", err))
    }

    /// Parameter names that are not part of `available`.
    ///
    /// The repetition key is always accepted.
    pub fn unknown_names(&self, available: &BTreeSet<String>) -> Vec<String> {
        self.0
            .keys()
            .filter(|name| name.as_str() != REPETITION_KEY && !available.contains(*name))
            .cloned()
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ParameterCombination {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<BTreeMap<String, Value>> for ParameterCombination {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

// 2^53, the largest magnitude below which every integer is an exact f64.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

fn normalize_number(value: &Value) -> Value {
    match value {
        Value::Number(number) if number.is_f64() => match number.as_f64() {
            Some(float) if float.fract() == 0.0 && float.abs() < EXACT_INTEGER_LIMIT => {
                Value::from(float as i64)
            }
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Compares two scalar parameter values.
///
/// Numbers compare by numeric value so that `1` matches `1.0`; every other
/// kind compares structurally.
pub fn values_match(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => lhs == rhs,
    }
}

/// Partial combination used to filter a result store.
///
/// Unbound names match any value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(BTreeMap<String, Value>);

impl Query {
    /// Query matching every stored result.
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns a copy of this query with one more binding.
    pub fn bind(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.0.clone();
        next.insert(name.into(), value.into());
        Self(next)
    }

    pub fn bindings(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true when every binding is present in `params` with a matching value.
    pub fn matches(&self, params: &ParameterCombination) -> bool {
        self.0.iter().all(|(name, expected)| {
            params
                .get(name)
                .map(|actual| values_match(expected, actual))
                .unwrap_or(false)
        })
    }
}

impl From<&ParameterCombination> for Query {
    fn from(params: &ParameterCombination) -> Self {
        Self(params.as_map().clone())
    }
}

impl From<ParameterCombination> for Query {
    fn from(params: ParameterCombination) -> Self {
        Self(params.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum AxisValues {
    Many(Vec<Value>),
    One(Value),
}

impl From<AxisValues> for Vec<Value> {
    fn from(values: AxisValues) -> Self {
        match values {
            AxisValues::Many(values) => values,
            AxisValues::One(value) => vec![value],
        }
    }
}

/// One parameter's ordered list of candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    #[serde(deserialize_with = "deserialize_axis_values")]
    pub values: Vec<Value>,
}

fn deserialize_axis_values<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    AxisValues::deserialize(deserializer).map(Vec::from)
}

impl Axis {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Axes with more than one value become array dimensions after squeezing.
    pub fn is_varying(&self) -> bool {
        self.values.len() > 1
    }
}

/// Ordered collection of axes. Declaration order is iteration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    axes: Vec<Axis>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an axis, returning the extended space.
    pub fn with_axis(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.axes.push(Axis::new(name, values));
        self
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|axis| axis.name == name)
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn varying_axes(&self) -> impl Iterator<Item = &Axis> {
        self.axes.iter().filter(|axis| axis.is_varying())
    }

    /// Same axes, re-ordered to follow `order`. Every axis must be named exactly once.
    pub fn reordered(&self, order: &[&str]) -> Result<Self, SemError> {
        if order.len() != self.axes.len() {
            return Err(SemError::Config(
                ErrorInfo::new("sem_core.space_order", "axis order must name every axis once")
                    .with_context("expected", self.axes.len().to_string())
                    .with_context("given", order.len().to_string()),
            ));
        }
        let mut axes = Vec::with_capacity(order.len());
        for name in order {
            let axis = self.axis(name).ok_or_else(|| {
                SemError::Config(
                    ErrorInfo::new("sem_core.space_order", "unknown axis in order")
                        .with_context("axis", *name),
                )
            })?;
            axes.push(axis.clone());
        }
        let reordered = Self { axes };
        reordered.validate()?;
        Ok(reordered)
    }

    /// Rejects spaces declaring the same axis twice.
    pub fn validate(&self) -> Result<(), SemError> {
        let mut seen = BTreeSet::new();
        for axis in &self.axes {
            if !seen.insert(axis.name.as_str()) {
                return Err(SemError::Config(
                    ErrorInfo::new("sem_core.space_duplicate_axis", "axis declared twice")
                        .with_context("axis", axis.name.clone()),
                ));
            }
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<Value>)> for ParameterSpace {
    fn from_iter<I: IntoIterator<Item = (K, Vec<Value>)>>(iter: I) -> Self {
        Self {
            axes: iter
                .into_iter()
                .map(|(name, values)| Axis::new(name, values))
                .collect(),
        }
    }
}
