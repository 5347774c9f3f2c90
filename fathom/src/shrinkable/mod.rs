//! Shrinkable values and shrinking distances.
//!
//! A [`Shrinkable`] couples a generated value with the lazily computed set of
//! "smaller" alternatives it can be shrunk to. Every candidate has a
//! [`ShrinkingDistance`] that is less than or equal to the distance of the
//! shrinkable it came from, so that a search descending into candidates always
//! terminates.

use std::cmp::Ordering;
use std::fmt;
use std::iter;
use std::rc::Rc;
use std::sync::Arc;

mod bigint;
mod collection;
mod combined;
mod flat_mapped;

pub use bigint::ShrinkableBigInt;
pub use collection::{ShrinkableList, ShrinkableSet};
pub use combined::{CombinedShrinkable, ZipShrinkable};
pub use flat_mapped::FlatMappedShrinkable;

/// Shared handle to a shrinkable; shrinkables are confined to a single trial
pub type ShrinkableRef<T> = Rc<dyn Shrinkable<T>>;

/// Lazy stream of shrinking candidates
pub type Candidates<T> = Box<dyn Iterator<Item = ShrinkableRef<T>>>;

/// Deferred candidate stream, evaluated only when reached
pub type CandidateSupplier<T> = Box<dyn FnOnce() -> Candidates<T>>;

/// Value transformation shared between generators, arbitraries and shrinkables
pub type Mapper<T, U> = Arc<dyn Fn(T) -> U + Send + Sync>;

/// Value predicate shared between generators, arbitraries and shrinkables
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Rejected filter candidates are searched this many levels deep for valid ones
const MAX_FILTER_DEPTH: usize = 4;

/// A generated value together with its lazily computed shrinking candidates
pub trait Shrinkable<T> {
    /// The current value
    fn value(&self) -> T;

    /// Candidates that are "smaller" than this one
    ///
    /// The stream is lazy and may be long; callers are expected to stop
    /// consuming it as soon as they found what they are looking for.
    fn shrink(&self) -> Candidates<T>;

    /// Distance to the minimal value; zero means nothing left to shrink
    fn distance(&self) -> ShrinkingDistance;
}

/// Lexicographically ordered tuple of non-negative distances
///
/// Missing trailing dimensions compare as zero. [`ShrinkingDistance::MAX`]
/// compares greater than every other distance.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShrinkingDistance {
    dimensions: Vec<u64>,
    max: bool,
}

impl ShrinkingDistance {
    /// Distance of a value that cannot shrink any further
    pub const MIN: ShrinkingDistance = ShrinkingDistance {
        dimensions: Vec::new(),
        max: false,
    };

    /// Greater than any other distance
    pub const MAX: ShrinkingDistance = ShrinkingDistance {
        dimensions: Vec::new(),
        max: true,
    };

    /// Distance with the given dimensions
    pub fn of(dimensions: &[u64]) -> Self {
        Self {
            dimensions: dimensions.to_vec(),
            max: false,
        }
    }

    pub fn dimensions(&self) -> &[u64] {
        &self.dimensions
    }

    pub fn is_max(&self) -> bool {
        self.max
    }

    /// Whether every dimension is zero
    pub fn is_zero(&self) -> bool {
        !self.max && self.dimensions.iter().all(|&d| d == 0)
    }

    /// Component-wise sum, saturating at `u64::MAX`
    pub fn plus(&self, other: &ShrinkingDistance) -> ShrinkingDistance {
        if self.max || other.max {
            return ShrinkingDistance::MAX;
        }
        let size = self.dimensions.len().max(other.dimensions.len());
        let dimensions = (0..size)
            .map(|i| self.dimension(i).saturating_add(other.dimension(i)))
            .collect();
        ShrinkingDistance {
            dimensions,
            max: false,
        }
    }

    /// Concatenation of both dimension lists
    pub fn append(&self, other: &ShrinkingDistance) -> ShrinkingDistance {
        if self.max || other.max {
            return ShrinkingDistance::MAX;
        }
        let mut dimensions = self.dimensions.clone();
        dimensions.extend_from_slice(&other.dimensions);
        ShrinkingDistance {
            dimensions,
            max: false,
        }
    }

    /// `[size] ++ sum(element distances)`
    pub fn for_collection<T>(elements: &[ShrinkableRef<T>]) -> ShrinkingDistance {
        let sum = elements
            .iter()
            .fold(ShrinkingDistance::MIN, |acc, element| {
                acc.plus(&element.distance())
            });
        ShrinkingDistance::of(&[elements.len() as u64]).append(&sum)
    }

    /// Concatenation of the parts' distances in declaration order
    pub fn combine<T>(parts: &[ShrinkableRef<T>]) -> ShrinkingDistance {
        parts
            .iter()
            .fold(ShrinkingDistance::MIN, |acc, part| acc.append(&part.distance()))
    }

    fn dimension(&self, index: usize) -> u64 {
        self.dimensions.get(index).copied().unwrap_or(0)
    }
}

impl Default for ShrinkingDistance {
    fn default() -> Self {
        ShrinkingDistance::MIN
    }
}

impl Ord for ShrinkingDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.max, other.max) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        let size = self.dimensions.len().max(other.dimensions.len());
        (0..size)
            .map(|i| self.dimension(i).cmp(&other.dimension(i)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ShrinkingDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ShrinkingDistance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ShrinkingDistance {}

impl fmt::Display for ShrinkingDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max {
            return write!(f, "ShrinkingDistance:MAX");
        }
        let dimensions: Vec<String> = self.dimensions.iter().map(|d| d.to_string()).collect();
        write!(f, "ShrinkingDistance[{}]", dimensions.join(", "))
    }
}

/// A value without any shrinking candidates
#[derive(Debug, Clone)]
pub struct Unshrinkable<T> {
    value: T,
    distance: ShrinkingDistance,
}

impl<T: Clone> Unshrinkable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            distance: ShrinkingDistance::MIN,
        }
    }

    /// Unshrinkable value that still reports a distance, e.g. for replayed values
    pub fn with_distance(value: T, distance: ShrinkingDistance) -> Self {
        Self { value, distance }
    }
}

impl<T: Clone + 'static> Shrinkable<T> for Unshrinkable<T> {
    fn value(&self) -> T {
        self.value.clone()
    }

    fn shrink(&self) -> Candidates<T> {
        Box::new(iter::empty())
    }

    fn distance(&self) -> ShrinkingDistance {
        self.distance.clone()
    }
}

/// Wrap a value that cannot be shrunk
pub fn unshrinkable<T: Clone + 'static>(value: T) -> ShrinkableRef<T> {
    Rc::new(Unshrinkable::new(value))
}

/// Shrinkable whose value is derived from another shrinkable's value
pub struct MappedShrinkable<T, U> {
    inner: ShrinkableRef<T>,
    mapper: Mapper<T, U>,
}

impl<T: 'static, U: 'static> MappedShrinkable<T, U> {
    pub fn new(inner: ShrinkableRef<T>, mapper: Mapper<T, U>) -> Self {
        Self { inner, mapper }
    }
}

impl<T: 'static, U: 'static> Shrinkable<U> for MappedShrinkable<T, U> {
    fn value(&self) -> U {
        (self.mapper)(self.inner.value())
    }

    fn shrink(&self) -> Candidates<U> {
        let mapper = self.mapper.clone();
        Box::new(self.inner.shrink().map(move |candidate| {
            Rc::new(MappedShrinkable::new(candidate, mapper.clone())) as ShrinkableRef<U>
        }))
    }

    fn distance(&self) -> ShrinkingDistance {
        self.inner.distance()
    }
}

/// Map a shrinkable's value, keeping its candidates and distance
pub fn map_shrinkable<T: 'static, U: 'static>(
    inner: ShrinkableRef<T>,
    mapper: Mapper<T, U>,
) -> ShrinkableRef<U> {
    Rc::new(MappedShrinkable::new(inner, mapper))
}

/// Shrinkable whose candidates all satisfy a predicate
///
/// A candidate failing the predicate is not discarded outright: its own
/// candidates are searched for valid ones, a few levels deep.
pub struct FilteredShrinkable<T> {
    inner: ShrinkableRef<T>,
    predicate: Predicate<T>,
}

impl<T: 'static> FilteredShrinkable<T> {
    pub fn new(inner: ShrinkableRef<T>, predicate: Predicate<T>) -> Self {
        Self { inner, predicate }
    }
}

fn filtered_candidates<T: 'static>(
    inner: ShrinkableRef<T>,
    predicate: Predicate<T>,
    depth: usize,
) -> Candidates<T> {
    Box::new(inner.shrink().flat_map(move |candidate| {
        if predicate(&candidate.value()) {
            let valid: ShrinkableRef<T> =
                Rc::new(FilteredShrinkable::new(candidate, predicate.clone()));
            Box::new(iter::once(valid)) as Candidates<T>
        } else if depth + 1 < MAX_FILTER_DEPTH {
            filtered_candidates(candidate, predicate.clone(), depth + 1)
        } else {
            Box::new(iter::empty())
        }
    }))
}

impl<T: 'static> Shrinkable<T> for FilteredShrinkable<T> {
    fn value(&self) -> T {
        self.inner.value()
    }

    fn shrink(&self) -> Candidates<T> {
        filtered_candidates(self.inner.clone(), self.predicate.clone(), 0)
    }

    fn distance(&self) -> ShrinkingDistance {
        self.inner.distance()
    }
}

/// Concatenate candidate streams, evaluating each only once it is reached
pub fn concat_lazily<T: 'static>(suppliers: Vec<CandidateSupplier<T>>) -> Candidates<T> {
    Box::new(suppliers.into_iter().flat_map(|supplier| supplier()))
}

/// Order a materialized set of candidates by ascending distance
pub fn sorted_by_distance<T: 'static>(mut candidates: Vec<ShrinkableRef<T>>) -> Candidates<T> {
    candidates.sort_by_key(|candidate| candidate.distance());
    Box::new(candidates.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use num_traits::ToPrimitive;

    fn int(value: i64, target: i64) -> ShrinkableRef<BigInt> {
        Rc::new(ShrinkableBigInt::new(
            BigInt::from(value),
            BigInt::from(-1000),
            BigInt::from(1000),
            BigInt::from(target),
        ))
    }

    #[test]
    fn test_distance_lexicographic_order() {
        let d = ShrinkingDistance::of;
        assert!(d(&[1, 5]) < d(&[2, 0]));
        assert!(d(&[2, 0]) > d(&[1, 99]));
        assert!(d(&[3, 1]) > d(&[3, 0]));
        assert!(d(&[0]) < d(&[1]));
    }

    #[test]
    fn test_missing_dimensions_compare_as_zero() {
        let d = ShrinkingDistance::of;
        assert_eq!(d(&[1]), d(&[1, 0, 0]));
        assert!(d(&[1]) < d(&[1, 1]));
        assert_eq!(ShrinkingDistance::MIN, d(&[0, 0]));
        assert!(ShrinkingDistance::MIN.is_zero());
    }

    #[test]
    fn test_max_is_greatest() {
        assert!(ShrinkingDistance::MAX > ShrinkingDistance::of(&[u64::MAX, u64::MAX]));
        assert_eq!(ShrinkingDistance::MAX, ShrinkingDistance::MAX);
        assert!(!ShrinkingDistance::MAX.is_zero());
        assert!(ShrinkingDistance::MAX.plus(&ShrinkingDistance::of(&[1])).is_max());
    }

    #[test]
    fn test_plus_saturates() {
        let sum = ShrinkingDistance::of(&[u64::MAX - 1, 2]).plus(&ShrinkingDistance::of(&[5]));
        assert_eq!(sum.dimensions(), &[u64::MAX, 2]);
    }

    #[test]
    fn test_append_concatenates() {
        let appended = ShrinkingDistance::of(&[1, 2]).append(&ShrinkingDistance::of(&[3]));
        assert_eq!(appended.dimensions(), &[1, 2, 3]);
        assert_eq!(appended.to_string(), "ShrinkingDistance[1, 2, 3]");
    }

    #[test]
    fn test_for_collection() {
        let elements = vec![int(3, 0), int(-4, 0)];
        let distance = ShrinkingDistance::for_collection(&elements);
        assert_eq!(distance.dimensions(), &[2, 7]);

        let empty: Vec<ShrinkableRef<BigInt>> = Vec::new();
        assert_eq!(ShrinkingDistance::for_collection(&empty).dimensions(), &[0]);
    }

    #[test]
    fn test_combine_concatenates_parts() {
        let parts = vec![int(3, 0), int(-4, 0)];
        assert_eq!(ShrinkingDistance::combine(&parts).dimensions(), &[3, 4]);
    }

    #[test]
    fn test_unshrinkable() {
        let value = unshrinkable("fixed".to_string());
        assert_eq!(value.value(), "fixed");
        assert_eq!(value.shrink().count(), 0);
        assert!(value.distance().is_zero());
    }

    #[test]
    fn test_mapped_keeps_distance_and_candidates() {
        let mapped = map_shrinkable(int(10, 0), Arc::new(|v: BigInt| v.to_string()));
        assert_eq!(mapped.value(), "10");
        assert_eq!(mapped.distance(), ShrinkingDistance::of(&[10]));
        let first = mapped.shrink().next().unwrap();
        assert_eq!(first.value(), "0");
    }

    #[test]
    fn test_filtered_candidates_satisfy_predicate() {
        let even: Predicate<BigInt> = Arc::new(|v: &BigInt| v.to_i64().unwrap() % 2 == 0);
        let filtered: ShrinkableRef<BigInt> =
            Rc::new(FilteredShrinkable::new(int(100, 3), even.clone()));
        let candidates: Vec<_> = filtered.shrink().collect();
        assert!(!candidates.is_empty());
        for candidate in candidates {
            assert!(even(&candidate.value()));
            assert!(candidate.distance() <= filtered.distance());
        }
    }

    #[test]
    fn test_concat_lazily_defers_evaluation() {
        use std::cell::Cell;
        let evaluated = Rc::new(Cell::new(false));
        let flag = evaluated.clone();
        let suppliers: Vec<CandidateSupplier<BigInt>> = vec![
            Box::new(|| Box::new(iter::once(int(1, 0))) as Candidates<BigInt>),
            Box::new(move || {
                flag.set(true);
                Box::new(iter::once(int(2, 0))) as Candidates<BigInt>
            }),
        ];
        let mut candidates = concat_lazily(suppliers);
        assert_eq!(candidates.next().unwrap().value(), BigInt::from(1));
        assert!(!evaluated.get());
        assert_eq!(candidates.next().unwrap().value(), BigInt::from(2));
        assert!(evaluated.get());
    }
}
