use std::collections::HashSet;
use std::hash::Hash;
use std::iter;
use std::rc::Rc;

use super::{Candidates, Shrinkable, ShrinkableRef, ShrinkingDistance};
use crate::combinatorics::distinct_pairs;

type ListCandidates<E> = Box<dyn Iterator<Item = ShrinkableList<E>>>;

/// A list of element shrinkables
///
/// Shrinking proceeds in four phases: the list gets shorter (never below
/// `min_size`), then single elements shrink one after the other, then pairs
/// of elements shrink together, and finally the elements get sorted by their
/// own distance.
pub struct ShrinkableList<E> {
    elements: Rc<Vec<ShrinkableRef<E>>>,
    min_size: usize,
    sort_elements: bool,
}

impl<E> Clone for ShrinkableList<E> {
    fn clone(&self) -> Self {
        Self {
            elements: self.elements.clone(),
            min_size: self.min_size,
            sort_elements: self.sort_elements,
        }
    }
}

impl<E: 'static> ShrinkableList<E> {
    pub fn new(elements: Vec<ShrinkableRef<E>>, min_size: usize) -> Self {
        Self {
            elements: Rc::new(elements),
            min_size,
            sort_elements: true,
        }
    }

    pub fn elements(&self) -> &[ShrinkableRef<E>] {
        &self.elements
    }

    fn with_elements(&self, elements: Vec<ShrinkableRef<E>>) -> Self {
        Self {
            elements: Rc::new(elements),
            min_size: self.min_size,
            sort_elements: self.sort_elements,
        }
    }

    fn without_sorting(mut self) -> Self {
        self.sort_elements = false;
        self
    }

    fn list_candidates(&self) -> ListCandidates<E> {
        let mut phases: Vec<Box<dyn FnOnce() -> ListCandidates<E>>> = Vec::new();

        let this = self.clone();
        phases.push(Box::new(move || this.shrink_size()));
        let this = self.clone();
        phases.push(Box::new(move || this.shrink_elements_one_by_one()));
        let this = self.clone();
        phases.push(Box::new(move || this.shrink_pairs()));
        if self.sort_elements {
            let this = self.clone();
            phases.push(Box::new(move || this.sort_by_distance()));
        }

        Box::new(phases.into_iter().flat_map(|phase| phase()))
    }

    /// Contiguous removals, cheapest result first
    fn shrink_size(&self) -> ListCandidates<E> {
        let size = self.elements.len();
        if size <= self.min_size {
            return Box::new(iter::empty());
        }
        let removable = size - self.min_size;
        let mut removals: Vec<(usize, usize)> = vec![(self.min_size, size)];
        let half = size / 2;
        if half > 0 && half <= removable {
            removals.push((0, half));
            removals.push((size - half, size));
        }
        removals.extend((0..size).map(|index| (index, index + 1)));

        let mut seen = HashSet::new();
        let mut candidates: Vec<ShrinkableList<E>> = removals
            .into_iter()
            .filter(|&(start, end)| end - start <= removable && seen.insert((start, end)))
            .map(|(start, end)| {
                let remaining = self.elements[..start]
                    .iter()
                    .chain(self.elements[end..].iter())
                    .cloned()
                    .collect();
                self.with_elements(remaining)
            })
            .collect();
        candidates.sort_by_key(|candidate| candidate.distance());
        Box::new(candidates.into_iter())
    }

    fn shrink_elements_one_by_one(&self) -> ListCandidates<E> {
        let this = self.clone();
        Box::new((0..self.elements.len()).flat_map(move |index| {
            let list = this.clone();
            this.elements[index].shrink().map(move |candidate| {
                let mut elements = list.elements.as_ref().clone();
                elements[index] = candidate;
                list.with_elements(elements)
            })
        }))
    }

    fn shrink_pairs(&self) -> ListCandidates<E> {
        let this = self.clone();
        Box::new(distinct_pairs(self.elements.len()).flat_map(move |(first, second)| {
            let list = this.clone();
            this.elements[first]
                .shrink()
                .zip(this.elements[second].shrink())
                .map(move |(left, right)| {
                    let mut elements = list.elements.as_ref().clone();
                    elements[first] = left;
                    elements[second] = right;
                    list.with_elements(elements)
                })
        }))
    }

    fn sort_by_distance(&self) -> ListCandidates<E> {
        let distances: Vec<ShrinkingDistance> =
            self.elements.iter().map(|e| e.distance()).collect();
        if distances.windows(2).all(|pair| pair[0] <= pair[1]) {
            return Box::new(iter::empty());
        }
        let mut sorted = self.elements.as_ref().clone();
        sorted.sort_by_key(|element| element.distance());
        Box::new(iter::once(self.with_elements(sorted)))
    }
}

impl<E: 'static> Shrinkable<Vec<E>> for ShrinkableList<E> {
    fn value(&self) -> Vec<E> {
        self.elements.iter().map(|element| element.value()).collect()
    }

    fn shrink(&self) -> Candidates<Vec<E>> {
        Box::new(
            self.list_candidates()
                .map(|candidate| Rc::new(candidate) as ShrinkableRef<Vec<E>>),
        )
    }

    fn distance(&self) -> ShrinkingDistance {
        ShrinkingDistance::for_collection(&self.elements)
    }
}

/// A set of element shrinkables with pairwise distinct values
///
/// Shrinks like a list but drops every candidate in which two elements
/// would end up with the same value.
pub struct ShrinkableSet<E> {
    list: ShrinkableList<E>,
}

impl<E: Eq + Hash + 'static> ShrinkableSet<E> {
    /// The element values must be pairwise distinct
    pub fn new(elements: Vec<ShrinkableRef<E>>, min_size: usize) -> Self {
        Self {
            list: ShrinkableList::new(elements, min_size).without_sorting(),
        }
    }

    fn has_distinct_values(list: &ShrinkableList<E>) -> bool {
        let mut seen = HashSet::with_capacity(list.elements.len());
        list.elements.iter().all(|element| seen.insert(element.value()))
    }
}

impl<E: Eq + Hash + 'static> Shrinkable<HashSet<E>> for ShrinkableSet<E> {
    fn value(&self) -> HashSet<E> {
        self.list.elements.iter().map(|element| element.value()).collect()
    }

    fn shrink(&self) -> Candidates<HashSet<E>> {
        Box::new(
            self.list
                .list_candidates()
                .filter(Self::has_distinct_values)
                .map(|list| Rc::new(ShrinkableSet { list }) as ShrinkableRef<HashSet<E>>),
        )
    }

    fn distance(&self) -> ShrinkingDistance {
        self.list.distance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shrinkable::ShrinkableBigInt;
    use num_bigint::BigInt;

    fn int(value: i64) -> ShrinkableRef<BigInt> {
        Rc::new(ShrinkableBigInt::new(
            BigInt::from(value),
            BigInt::from(-100),
            BigInt::from(100),
            BigInt::from(0),
        ))
    }

    fn ints(values: &[i64]) -> Vec<ShrinkableRef<BigInt>> {
        values.iter().map(|&v| int(v)).collect()
    }

    fn as_i64(values: Vec<BigInt>) -> Vec<i64> {
        values.into_iter().map(|v| i64::try_from(v).unwrap()).collect()
    }

    #[test]
    fn test_value_and_distance() {
        let list = ShrinkableList::new(ints(&[3, -2, 5]), 0);
        assert_eq!(as_i64(list.value()), vec![3, -2, 5]);
        assert_eq!(list.distance(), ShrinkingDistance::of(&[3, 10]));
    }

    #[test]
    fn test_size_shrinking_comes_first() {
        let list = ShrinkableList::new(ints(&[3, -2, 5]), 0);
        let first = list.shrink().next().unwrap();
        assert!(first.value().is_empty());
    }

    #[test]
    fn test_min_size_is_respected() {
        let list = ShrinkableList::new(ints(&[3, -2, 5]), 2);
        for candidate in list.shrink() {
            assert!(candidate.value().len() >= 2);
        }
    }

    #[test]
    fn test_candidates_do_not_increase_distance() {
        let list = ShrinkableList::new(ints(&[30, -20, 50, 7]), 1);
        for candidate in list.shrink().take(200) {
            assert!(candidate.distance() <= list.distance());
        }
    }

    #[test]
    fn test_element_and_pair_shrinking() {
        let list = ShrinkableList::new(ints(&[4, 6]), 2);
        let candidates: Vec<Vec<i64>> = list.shrink().map(|c| as_i64(c.value())).collect();
        assert!(candidates.contains(&vec![0, 6]));
        assert!(candidates.contains(&vec![4, 0]));
        assert!(candidates.contains(&vec![0, 0]));
    }

    #[test]
    fn test_sorting_candidate() {
        let list = ShrinkableList::new(ints(&[9, 1]), 2);
        let candidates: Vec<Vec<i64>> = list.shrink().map(|c| as_i64(c.value())).collect();
        assert_eq!(candidates.last(), Some(&vec![1, 9]));
    }

    #[test]
    fn test_empty_list_is_minimal() {
        let list: ShrinkableList<BigInt> = ShrinkableList::new(Vec::new(), 0);
        assert_eq!(list.shrink().count(), 0);
        assert_eq!(list.distance(), ShrinkingDistance::of(&[0]));
    }

    #[test]
    fn test_set_candidates_stay_unique() {
        let set = ShrinkableSet::new(ints(&[1, 2]), 2);
        let candidates: Vec<HashSet<BigInt>> = set.shrink().map(|c| c.value()).collect();
        assert!(!candidates.is_empty());
        // shrinking 2 to 1 would collapse the set, so every candidate keeps both elements
        assert!(candidates.iter().all(|s| s.len() == 2));
        assert!(candidates.contains(&[0, 2].iter().map(|&v| BigInt::from(v)).collect()));
    }

    #[test]
    fn test_set_value() {
        let set = ShrinkableSet::new(ints(&[5, -5]), 0);
        let expected: HashSet<BigInt> = [5, -5].iter().map(|&v| BigInt::from(v)).collect();
        assert_eq!(set.value(), expected);
        assert_eq!(set.distance(), ShrinkingDistance::of(&[2, 10]));
    }
}
