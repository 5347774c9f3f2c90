//! Combinatorial enumeration and counting.
//!
//! All iterators here enumerate finite spaces lazily and can be recreated at
//! will. Counting helpers use checked arithmetic and answer `None` when a
//! count does not fit into a `u64`.

/// Largest element count for which binomial coefficients are computed
pub const MAX_BINOMIAL_N: u64 = 70;

/// `n` over `k`, `None` on overflow or for `n` beyond [`MAX_BINOMIAL_N`]
///
/// Choosing nothing is always possible exactly once, whatever `n` is.
pub fn binomial(n: u64, k: u64) -> Option<u64> {
    if k == 0 {
        return Some(1);
    }
    if n > MAX_BINOMIAL_N {
        return None;
    }
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // exact: the running product of i+1 consecutive numbers is divisible by (i+1)!
        result = result * u128::from(n - i) / u128::from(i + 1);
    }
    u64::try_from(result).ok()
}

/// `n!`, `None` on overflow
pub fn factorial(n: u64) -> Option<u64> {
    (1..=n).try_fold(1u64, |acc, i| acc.checked_mul(i))
}

/// `base^exponent`, `None` on overflow
pub fn checked_power(base: u64, exponent: usize) -> Option<u64> {
    (0..exponent).try_fold(1u64, |acc, _| acc.checked_mul(base))
}

/// Cartesian product of index ranges; the last position varies fastest
#[derive(Debug, Clone)]
pub struct CombinedIndices {
    sizes: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl CombinedIndices {
    pub fn new(sizes: Vec<usize>) -> Self {
        let next = if sizes.contains(&0) {
            None
        } else {
            Some(vec![0; sizes.len()])
        };
        Self { sizes, next }
    }
}

impl Iterator for CombinedIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut successor = current.clone();
        for position in (0..successor.len()).rev() {
            successor[position] += 1;
            if successor[position] < self.sizes[position] {
                self.next = Some(successor);
                return Some(current);
            }
            successor[position] = 0;
        }
        Some(current)
    }
}

/// All `k`-element subsets of `0..n` as ascending index lists, in lexicographic order
#[derive(Debug, Clone)]
pub struct IndexCombinations {
    n: usize,
    next: Option<Vec<usize>>,
}

impl IndexCombinations {
    pub fn new(n: usize, k: usize) -> Self {
        let next = (k <= n).then(|| (0..k).collect());
        Self { n, next }
    }
}

impl Iterator for IndexCombinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let k = current.len();
        let mut successor = current.clone();
        if let Some(position) = (0..k).rev().find(|&i| successor[i] < self.n - k + i) {
            successor[position] += 1;
            for following in position + 1..k {
                successor[following] = successor[following - 1] + 1;
            }
            self.next = Some(successor);
        }
        Some(current)
    }
}

/// All orderings of `0..n` in lexicographic order
#[derive(Debug, Clone)]
pub struct IndexPermutations {
    next: Option<Vec<usize>>,
}

impl IndexPermutations {
    pub fn new(n: usize) -> Self {
        Self {
            next: Some((0..n).collect()),
        }
    }
}

impl Iterator for IndexPermutations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut successor = current.clone();
        let len = successor.len();
        if let Some(pivot) = (0..len.saturating_sub(1))
            .rev()
            .find(|&i| successor[i] < successor[i + 1])
        {
            let swap_with = (pivot + 1..len)
                .rev()
                .find(|&j| successor[j] > successor[pivot])
                .unwrap_or(pivot + 1);
            successor.swap(pivot, swap_with);
            successor[pivot + 1..].reverse();
            self.next = Some(successor);
        }
        Some(current)
    }
}

/// All index pairs `(i, j)` with `i < j < size`
#[derive(Debug, Clone)]
pub struct DistinctPairs {
    size: usize,
    first: usize,
    second: usize,
}

impl Iterator for DistinctPairs {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        if self.second >= self.size {
            self.first += 1;
            self.second = self.first + 1;
        }
        if self.second >= self.size {
            return None;
        }
        let pair = (self.first, self.second);
        self.second += 1;
        Some(pair)
    }
}

/// Pairs of distinct positions of a sequence with `size` elements
pub fn distinct_pairs(size: usize) -> DistinctPairs {
    DistinctPairs {
        size,
        first: 0,
        second: 1,
    }
}

fn pick<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

/// Cartesian product of the given value lists, last list varying fastest
pub fn combine<T: Clone>(lists: Vec<Vec<T>>) -> impl Iterator<Item = Vec<T>> {
    let sizes = lists.iter().map(Vec::len).collect();
    CombinedIndices::new(sizes).map(move |indices| {
        indices
            .iter()
            .enumerate()
            .map(|(list, &index)| lists[list][index].clone())
            .collect()
    })
}

/// Every list of `min_size..=max_size` elements, by increasing length
pub fn list_combinations<T: Clone>(
    elements: Vec<T>,
    min_size: usize,
    max_size: usize,
) -> impl Iterator<Item = Vec<T>> {
    let count = elements.len();
    (min_size..=max_size).flat_map(move |size| {
        let elements = elements.clone();
        CombinedIndices::new(vec![count; size]).map(move |indices| pick(&elements, &indices))
    })
}

/// Every subset of `min_size..=max_size` of the given distinct elements, by increasing size
pub fn set_combinations<T: Clone>(
    elements: Vec<T>,
    min_size: usize,
    max_size: usize,
) -> impl Iterator<Item = Vec<T>> {
    let count = elements.len();
    (min_size..=max_size).flat_map(move |size| {
        let elements = elements.clone();
        IndexCombinations::new(count, size).map(move |indices| pick(&elements, &indices))
    })
}

/// Every ordering of the given values; equal values produce equal orderings
pub fn permutations<T: Clone>(values: Vec<T>) -> impl Iterator<Item = Vec<T>> {
    IndexPermutations::new(values.len()).map(move |indices| pick(&values, &indices))
}

/// Concatenation of several iterables
pub fn concat<I>(iterables: Vec<I>) -> impl Iterator<Item = I::Item>
where
    I: IntoIterator,
{
    iterables.into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(5, 2), Some(10));
        assert_eq!(binomial(5, 0), Some(1));
        assert_eq!(binomial(5, 5), Some(1));
        assert_eq!(binomial(3, 4), Some(0));
        assert_eq!(binomial(70, 2), Some(2415));
        assert_eq!(binomial(70, 35), None);
        assert_eq!(binomial(71, 1), None);
        assert_eq!(binomial(1_000, 0), Some(1));
    }

    #[test]
    fn test_factorial() {
        assert_eq!(factorial(0), Some(1));
        assert_eq!(factorial(4), Some(24));
        assert_eq!(factorial(20), Some(2_432_902_008_176_640_000));
        assert_eq!(factorial(21), None);
    }

    #[test]
    fn test_checked_power() {
        assert_eq!(checked_power(3, 4), Some(81));
        assert_eq!(checked_power(0, 0), Some(1));
        assert_eq!(checked_power(2, 64), None);
    }

    #[test]
    fn test_combine_is_odometer() {
        let combined: Vec<Vec<i32>> = combine(vec![vec![1, 2], vec![10, 20, 30]]).collect();
        assert_eq!(
            combined,
            vec![
                vec![1, 10],
                vec![1, 20],
                vec![1, 30],
                vec![2, 10],
                vec![2, 20],
                vec![2, 30]
            ]
        );
    }

    #[test]
    fn test_combine_three_by_four_yields_twelve_distinct() {
        let combined: Vec<Vec<u8>> = combine(vec![vec![1, 2, 3], vec![4, 5, 6, 7]]).collect();
        assert_eq!(combined.len(), 12);
        let distinct: HashSet<Vec<u8>> = combined.into_iter().collect();
        assert_eq!(distinct.len(), 12);
    }

    #[test]
    fn test_combine_edge_cases() {
        assert_eq!(combine::<u8>(vec![]).collect::<Vec<_>>(), vec![Vec::<u8>::new()]);
        assert_eq!(combine(vec![vec![1], vec![]]).count(), 0);
    }

    #[test]
    fn test_list_combinations_by_increasing_size() {
        let lists: Vec<Vec<char>> = list_combinations(vec!['a', 'b'], 0, 2).collect();
        assert_eq!(lists.len(), 1 + 2 + 4);
        assert!(lists[0].is_empty());
        assert_eq!(lists[1], vec!['a']);
        assert_eq!(lists[3], vec!['a', 'a']);
        assert_eq!(lists[6], vec!['b', 'b']);
    }

    #[test]
    fn test_set_combinations() {
        let sets: Vec<Vec<u8>> = set_combinations(vec![1, 2, 3, 4, 5], 2, 2).collect();
        assert_eq!(sets.len(), 10);
        assert_eq!(sets[0], vec![1, 2]);
        assert_eq!(sets[9], vec![4, 5]);

        let too_large: Vec<Vec<u8>> = set_combinations(vec![1, 2], 3, 3).collect();
        assert!(too_large.is_empty());

        let with_empty: Vec<Vec<u8>> = set_combinations(vec![1, 2], 0, 1).collect();
        assert_eq!(with_empty, vec![vec![], vec![1], vec![2]]);
    }

    #[test]
    fn test_permutations_are_lexicographic() {
        let all: Vec<Vec<u8>> = permutations(vec![1, 2, 3]).collect();
        assert_eq!(
            all,
            vec![
                vec![1, 2, 3],
                vec![1, 3, 2],
                vec![2, 1, 3],
                vec![2, 3, 1],
                vec![3, 1, 2],
                vec![3, 2, 1]
            ]
        );
        assert_eq!(permutations(vec![1, 2, 3, 4]).count(), 24);
        assert_eq!(permutations(Vec::<u8>::new()).count(), 1);
    }

    #[test]
    fn test_permutations_keep_duplicates() {
        let all: Vec<Vec<char>> = permutations(vec!['x', 'x']).collect();
        assert_eq!(all, vec![vec!['x', 'x'], vec!['x', 'x']]);
    }

    #[test]
    fn test_distinct_pairs() {
        let pairs: Vec<(usize, usize)> = distinct_pairs(4).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(distinct_pairs(1).count(), 0);
        assert_eq!(distinct_pairs(0).count(), 0);
    }

    #[test]
    fn test_concat() {
        let joined: Vec<u8> = concat(vec![vec![1, 2], vec![], vec![3]]).collect();
        assert_eq!(joined, vec![1, 2, 3]);
    }

    #[test]
    fn test_iterators_are_restartable() {
        let first: Vec<Vec<u8>> = set_combinations(vec![1, 2, 3], 1, 2).collect();
        let second: Vec<Vec<u8>> = set_combinations(vec![1, 2, 3], 1, 2).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3 + 3);
    }
}
