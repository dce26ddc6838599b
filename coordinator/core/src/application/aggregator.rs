// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Parameter-wise averaging of participant updates (FedAvg, unweighted).

use thiserror::Error;

use crate::domain::parameters::{ParameterTree, ShapeMismatch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("cannot aggregate an empty submission set")]
    EmptySubmissionSet,

    #[error("submission #{submission} does not match the round shape: {source}")]
    ShapeMismatch {
        submission: usize,
        #[source]
        source: ShapeMismatch,
    },
}

/// Average `trees` leaf by leaf.
///
/// Every tree is re-validated against the shape of the first before any
/// arithmetic happens. Sums are accumulated in `f64` and divided by the number
/// of trees once per leaf.
pub fn aggregate<'a, I>(trees: I) -> Result<ParameterTree, AggregationError>
where
    I: IntoIterator<Item = &'a ParameterTree>,
{
    let mut trees = trees.into_iter();
    let first = trees.next().ok_or(AggregationError::EmptySubmissionSet)?;
    let shape = first.shape();

    let mut sum = first.clone();
    let mut count = 1usize;
    for tree in trees {
        tree.conforms_to(&shape)
            .map_err(|source| AggregationError::ShapeMismatch {
                submission: count,
                source,
            })?;
        sum.accumulate(tree);
        count += 1;
    }

    let n = count as f64;
    sum.for_each_leaf_mut(&mut |value| *value /= n);
    Ok(sum)
}
