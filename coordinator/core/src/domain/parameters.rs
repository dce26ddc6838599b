// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Parameter Trees
//!
//! A participant's model update is an arbitrarily nested structure of numbers:
//! a state dictionary maps layer names to scalars, vectors, or matrices, and
//! matrices are sequences of sequences. [`ParameterTree`] captures that
//! recursively and [`Shape`] is its structural signature.
//!
//! Every tree aggregated within one round must share a single [`Shape`]; the
//! check is explicit and reports the first offending path as a
//! [`ShapeMismatch`].
//!
//! ## JSON encoding
//!
//! | Tree node | JSON |
//! |-----------|------|
//! | `Scalar` | number |
//! | `Sequence` | array |
//! | `Map` | object |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Recursive numeric value holding one model update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterTree {
    Scalar(f64),
    Sequence(Vec<ParameterTree>),
    Map(BTreeMap<String, ParameterTree>),
}

/// Structural signature of a [`ParameterTree`]: nesting, sequence lengths and key sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "children", rename_all = "snake_case")]
pub enum Shape {
    Scalar,
    Sequence(Vec<Shape>),
    Map(BTreeMap<String, Shape>),
}

/// Two trees that were expected to line up do not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("shape mismatch at `{path}`: expected {expected}, found {found}")]
pub struct ShapeMismatch {
    /// Location of the first disagreement, `$` being the root.
    pub path: String,
    pub expected: String,
    pub found: String,
}

impl ParameterTree {
    pub fn shape(&self) -> Shape {
        match self {
            ParameterTree::Scalar(_) => Shape::Scalar,
            ParameterTree::Sequence(items) => {
                Shape::Sequence(items.iter().map(ParameterTree::shape).collect())
            }
            ParameterTree::Map(entries) => Shape::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.shape()))
                    .collect(),
            ),
        }
    }

    /// Verify this tree has exactly the given shape.
    pub fn conforms_to(&self, shape: &Shape) -> Result<(), ShapeMismatch> {
        let mut path = String::from("$");
        check_shape(self, shape, &mut path)
    }

    /// Number of scalar leaves.
    pub fn leaf_count(&self) -> usize {
        match self {
            ParameterTree::Scalar(_) => 1,
            ParameterTree::Sequence(items) => items.iter().map(ParameterTree::leaf_count).sum(),
            ParameterTree::Map(entries) => entries.values().map(ParameterTree::leaf_count).sum(),
        }
    }

    /// Add `other` leaf-by-leaf into `self`.
    ///
    /// Positions that do not line up are left untouched; callers validate
    /// shapes with [`ParameterTree::conforms_to`] first.
    pub fn accumulate(&mut self, other: &ParameterTree) {
        match (self, other) {
            (ParameterTree::Scalar(acc), ParameterTree::Scalar(value)) => *acc += value,
            (ParameterTree::Sequence(acc), ParameterTree::Sequence(values)) => {
                for (slot, value) in acc.iter_mut().zip(values) {
                    slot.accumulate(value);
                }
            }
            (ParameterTree::Map(acc), ParameterTree::Map(values)) => {
                for (key, slot) in acc.iter_mut() {
                    if let Some(value) = values.get(key) {
                        slot.accumulate(value);
                    }
                }
            }
            _ => {}
        }
    }

    /// Apply `f` to every scalar leaf in place.
    pub fn for_each_leaf_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut f64),
    {
        match self {
            ParameterTree::Scalar(value) => f(value),
            ParameterTree::Sequence(items) => {
                for item in items {
                    item.for_each_leaf_mut(f);
                }
            }
            ParameterTree::Map(entries) => {
                for value in entries.values_mut() {
                    value.for_each_leaf_mut(f);
                }
            }
        }
    }
}

impl From<f64> for ParameterTree {
    fn from(value: f64) -> Self {
        ParameterTree::Scalar(value)
    }
}

impl From<Vec<f64>> for ParameterTree {
    fn from(values: Vec<f64>) -> Self {
        ParameterTree::Sequence(values.into_iter().map(ParameterTree::Scalar).collect())
    }
}

impl From<Vec<Vec<f64>>> for ParameterTree {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        ParameterTree::Sequence(rows.into_iter().map(ParameterTree::from).collect())
    }
}

impl Shape {
    fn describe(&self) -> String {
        match self {
            Shape::Scalar => "scalar".to_string(),
            Shape::Sequence(items) => format!("sequence of length {}", items.len()),
            Shape::Map(entries) => {
                let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
                format!("map with keys [{}]", keys.join(", "))
            }
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn check_shape(tree: &ParameterTree, shape: &Shape, path: &mut String) -> Result<(), ShapeMismatch> {
    match (tree, shape) {
        (ParameterTree::Scalar(_), Shape::Scalar) => Ok(()),
        (ParameterTree::Sequence(items), Shape::Sequence(expected)) => {
            if items.len() != expected.len() {
                return Err(mismatch(path, shape, &tree.shape()));
            }
            for (index, (item, item_shape)) in items.iter().zip(expected).enumerate() {
                let len = path.len();
                path.push_str(&format!("[{}]", index));
                check_shape(item, item_shape, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        (ParameterTree::Map(entries), Shape::Map(expected)) => {
            if entries.len() != expected.len() || !entries.keys().eq(expected.keys()) {
                return Err(mismatch(path, shape, &tree.shape()));
            }
            for ((key, value), value_shape) in entries.iter().zip(expected.values()) {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                check_shape(value, value_shape, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        _ => Err(mismatch(path, shape, &tree.shape())),
    }
}

fn mismatch(path: &str, expected: &Shape, found: &Shape) -> ShapeMismatch {
    ShapeMismatch {
        path: path.to_string(),
        expected: expected.describe(),
        found: found.describe(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> ParameterTree {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decodes_state_dict_json() {
        let parsed = tree(json!({
            "bias": 0.5,
            "fc1.weight": [[1.0, 2.0], [3.0, 4.0]],
            "fc1.bias": [1, 2],
        }));

        let ParameterTree::Map(entries) = &parsed else {
            panic!("expected a map at the root");
        };
        assert_eq!(entries["bias"], ParameterTree::Scalar(0.5));
        assert_eq!(entries["fc1.bias"], ParameterTree::from(vec![1.0, 2.0]));
        assert_eq!(
            entries["fc1.weight"],
            ParameterTree::from(vec![vec![1.0, 2.0], vec![3.0, 4.0]])
        );
        assert_eq!(parsed.leaf_count(), 7);
    }

    #[test]
    fn test_encodes_back_to_plain_json() {
        let model = tree(json!({"w": [[1.5, 2.0]], "b": 3.0}));
        assert_eq!(
            serde_json::to_value(&model).unwrap(),
            json!({"w": [[1.5, 2.0]], "b": 3.0})
        );
    }

    #[test]
    fn test_identical_shapes_conform() {
        let a = tree(json!({"w": [[1.0, 2.0], [3.0, 4.0]], "b": [0.0]}));
        let b = tree(json!({"w": [[9.0, 8.0], [7.0, 6.0]], "b": [1.0]}));
        assert!(b.conforms_to(&a.shape()).is_ok());
    }

    #[test]
    fn test_sequence_length_mismatch_reports_path() {
        let a = tree(json!({"w": [[1.0, 2.0], [3.0, 4.0]]}));
        let b = tree(json!({"w": [[1.0, 2.0], [3.0]]}));

        let err = b.conforms_to(&a.shape()).unwrap_err();
        assert_eq!(err.path, "$.w[1]");
        assert_eq!(err.expected, "sequence of length 2");
        assert_eq!(err.found, "sequence of length 1");
    }

    #[test]
    fn test_key_set_mismatch() {
        let a = tree(json!({"w": [1.0], "b": 1.0}));
        let b = tree(json!({"w": [1.0], "c": 1.0}));

        let err = b.conforms_to(&a.shape()).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(err.expected.contains("b, w"));
    }

    #[test]
    fn test_scalar_versus_sequence_mismatch() {
        let a = tree(json!({"w": 1.0}));
        let b = tree(json!({"w": [1.0]}));

        let err = b.conforms_to(&a.shape()).unwrap_err();
        assert_eq!(err.path, "$.w");
        assert_eq!(err.expected, "scalar");
    }

    #[test]
    fn test_accumulate_and_scale() {
        let mut acc = tree(json!({"w": [2.0, 4.0]}));
        acc.accumulate(&tree(json!({"w": [6.0, 8.0]})));
        acc.for_each_leaf_mut(&mut |v| *v /= 2.0);
        assert_eq!(acc, tree(json!({"w": [4.0, 6.0]})));
    }

    #[test]
    fn test_empty_sequences_are_valid_shapes() {
        let a = tree(json!({"w": []}));
        let b = tree(json!({"w": []}));
        assert!(b.conforms_to(&a.shape()).is_ok());
        assert_eq!(a.leaf_count(), 0);
    }
}
