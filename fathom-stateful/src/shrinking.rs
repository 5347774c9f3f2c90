//! Shrinking of recorded chains
//!
//! A step whose transformer was chosen after reading the state may depend on
//! every step before it, so the steps preceding a kept state-reading step are
//! never changed. Steps are shrunk in ranges instead: each range starts at a
//! state-reading step (or at the start of the chain) and contains the
//! independent steps following it. Steps after a shrunk range are not
//! replayed but generated anew.

use std::iter;
use std::rc::Rc;

use fathom::Shrinkable;
use fathom::combinatorics::distinct_pairs;
use log::trace;

use crate::chain::{ChainIteration, ShrinkableChain};

type ChainCandidates<T> = Box<dyn Iterator<Item = ShrinkableChain<T>>>;
type RangeCandidates<T> = Box<dyn Iterator<Item = Vec<ChainIteration<T>>>>;

pub(crate) struct ChainShrinker<T> {
    chain: ShrinkableChain<T>,
    iterations: Rc<Vec<ChainIteration<T>>>,
}

impl<T> Clone for ChainShrinker<T> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            iterations: self.iterations.clone(),
        }
    }
}

/// `(start, end)` index ranges, the latest range first
pub(crate) fn split_into_ranges<T>(iterations: &[ChainIteration<T>]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut end = iterations.len();
    for index in (0..iterations.len()).rev() {
        if iterations[index].accessed_state || index == 0 {
            ranges.push((index, end));
            end = index;
        }
    }
    ranges
}

impl<T: 'static> ChainShrinker<T> {
    pub(crate) fn new(chain: ShrinkableChain<T>, iterations: Vec<ChainIteration<T>>) -> Self {
        Self {
            chain,
            iterations: Rc::new(iterations),
        }
    }

    /// Candidates in order of decreasing effect
    ///
    /// 1. a lower maximum when fewer steps were executed than allowed
    /// 2. without the last state-reading step
    /// 3. per range: sub-list removal, single steps, pairs of steps, no-op steps
    pub(crate) fn candidates(&self) -> ChainCandidates<T> {
        // chains that never ran have nothing to shrink
        if self.iterations.is_empty() {
            return Box::new(iter::empty());
        }
        let mut phases: Vec<Box<dyn FnOnce() -> ChainCandidates<T>>> = Vec::new();

        let this = self.clone();
        phases.push(Box::new(move || this.shrink_max_transformations()));
        let this = self.clone();
        phases.push(Box::new(move || this.drop_last_state_accessing_step()));
        for (start, end) in split_into_ranges(&self.iterations) {
            let this = self.clone();
            phases.push(Box::new(move || this.shrink_range(start, end)));
        }

        Box::new(phases.into_iter().flat_map(|phase| phase()))
    }

    fn shrink_max_transformations(&self) -> ChainCandidates<T> {
        let executed = self.iterations.len();
        if executed >= self.chain.max() {
            return Box::new(iter::empty());
        }
        Box::new(iter::once(
            self.chain
                .with_iterations(self.iterations.as_ref().clone(), executed),
        ))
    }

    fn drop_last_state_accessing_step(&self) -> ChainCandidates<T> {
        match self
            .iterations
            .iter()
            .rposition(|iteration| iteration.accessed_state)
        {
            Some(index) => Box::new(iter::once(self.without_step(index))),
            None => Box::new(iter::empty()),
        }
    }

    fn without_step(&self, index: usize) -> ShrinkableChain<T> {
        let mut iterations = self.iterations.as_ref().clone();
        iterations.remove(index);
        let max = iterations.len();
        self.chain.with_iterations(iterations, max)
    }

    fn shrink_range(&self, start: usize, end: usize) -> ChainCandidates<T> {
        trace!("Shrinking chain steps {}..{}", start, end);
        let range: Rc<Vec<ChainIteration<T>>> = Rc::new(self.iterations[start..end].to_vec());
        let mut phases: Vec<Box<dyn FnOnce() -> RangeCandidates<T>>> = Vec::new();

        let steps = range.clone();
        phases.push(Box::new(move || remove_sub_lists(steps)));
        let steps = range.clone();
        phases.push(Box::new(move || shrink_one_by_one(steps)));
        let steps = range.clone();
        phases.push(Box::new(move || shrink_pairs(steps)));

        let this = self.clone();
        let shrunk_ranges = phases
            .into_iter()
            .flat_map(|phase| phase())
            .map(move |shrunk| this.replace_range(start, end, shrunk));

        let this = self.clone();
        let no_ops = iter::once(()).flat_map(move |_| this.drop_no_op_steps(start, end));
        Box::new(shrunk_ranges.chain(no_ops))
    }

    /// Keep the steps before the range, regenerate the ones after it
    fn replace_range(
        &self,
        start: usize,
        end: usize,
        shrunk: Vec<ChainIteration<T>>,
    ) -> ShrinkableChain<T> {
        let rest = self.iterations.len() - (end - start);
        let max = rest + shrunk.len();
        let mut iterations = self.iterations[..start].to_vec();
        iterations.extend(shrunk);
        self.chain.with_iterations(iterations, max)
    }

    /// Steps that did not change the state can go even before state-reading steps
    fn drop_no_op_steps(&self, start: usize, end: usize) -> ChainCandidates<T> {
        let Some(last_access) = self
            .iterations
            .iter()
            .rposition(|iteration| iteration.accessed_state)
        else {
            return Box::new(iter::empty());
        };
        let this = self.clone();
        Box::new(
            (start..end.min(last_access))
                .filter(move |&index| !this.iterations[index].changed_state)
                .map({
                    let this = self.clone();
                    move |index| this.without_step(index)
                }),
        )
    }
}

/// Contiguous removals, largest first; at least one step stays
fn remove_sub_lists<T: 'static>(steps: Rc<Vec<ChainIteration<T>>>) -> RangeCandidates<T> {
    let size = steps.len();
    Box::new((1..size).rev().flat_map(move |removed| {
        let steps = steps.clone();
        (0..=size - removed).map(move |from| {
            steps[..from]
                .iter()
                .chain(steps[from + removed..].iter())
                .cloned()
                .collect::<Vec<_>>()
        })
    }))
}

fn shrink_one_by_one<T: 'static>(steps: Rc<Vec<ChainIteration<T>>>) -> RangeCandidates<T> {
    Box::new((0..steps.len()).flat_map(move |index| {
        let steps = steps.clone();
        let candidates = steps[index].shrinkable.shrink();
        candidates.map(move |candidate| {
            let mut shrunk = steps.as_ref().clone();
            shrunk[index] = steps[index].with_shrinkable(candidate);
            shrunk
        })
    }))
}

fn shrink_pairs<T: 'static>(steps: Rc<Vec<ChainIteration<T>>>) -> RangeCandidates<T> {
    Box::new(distinct_pairs(steps.len()).flat_map(move |(first, second)| {
        let steps = steps.clone();
        let pairs = steps[first]
            .shrinkable
            .shrink()
            .zip(steps[second].shrinkable.shrink());
        pairs.map(move |(left, right)| {
            let mut shrunk = steps.as_ref().clone();
            shrunk[first] = steps[first].with_shrinkable(left);
            shrunk[second] = steps[second].with_shrinkable(right);
            shrunk
        })
    }))
}
