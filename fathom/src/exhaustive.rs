//! Exhaustive generation of small value spaces.
//!
//! Every constructor counts the values it would produce before anything is
//! enumerated. When the count overflows or exceeds `max_number_of_samples` the
//! constructor returns `None` and the caller falls back to random generation;
//! exhaustive enumeration never silently truncates.

use std::collections::HashSet;
use std::hash::Hash;
use std::iter;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::combinatorics::{self, binomial, checked_power, factorial};
use crate::error::{GenerationError, GenerationResult};
use crate::generator::MAX_MISSES;
use crate::shrinkable::{Mapper, Predicate};

/// Lazily enumerated values; filtering generators may report an error instead
pub type ExhaustiveItems<T> = Box<dyn Iterator<Item = GenerationResult<T>>>;

/// Shared handle to an exhaustive generator
pub type ExhaustiveRef<T> = Rc<dyn ExhaustiveGenerator<T>>;

/// Creates the exhaustive generator of a dependent value from a base value
pub type ExhaustiveFactory<T, U> = Arc<dyn Fn(T) -> Option<ExhaustiveRef<U>> + Send + Sync>;

/// Finite, restartable enumeration of a value space
pub trait ExhaustiveGenerator<T> {
    /// Upper bound of the number of values [`iter`](Self::iter) yields
    fn max_count(&self) -> u64;

    /// Enumerate from the beginning
    fn iter(&self) -> ExhaustiveItems<T>;
}

fn within_ceiling(count: Option<u64>, max_number_of_samples: u64, what: &str) -> Option<u64> {
    match count {
        Some(count) if count <= max_number_of_samples => Some(count),
        Some(count) => {
            debug!(
                "{} not exhaustible: {} values exceed {} samples",
                what, count, max_number_of_samples
            );
            None
        }
        None => {
            debug!("{} not exhaustible: value count overflows", what);
            None
        }
    }
}

/// Turn `None` into [`GenerationError::NotExhaustible`] for callers that require exhaustive generation
pub fn require_exhaustive<T>(
    generator: Option<ExhaustiveRef<T>>,
    max_number_of_samples: u64,
) -> GenerationResult<ExhaustiveRef<T>> {
    generator.ok_or(GenerationError::not_exhaustible(max_number_of_samples))
}

/// Enumerate all values of a generator, stopping at the first error
pub fn collect_all<T>(generator: &dyn ExhaustiveGenerator<T>) -> GenerationResult<Vec<T>> {
    generator.iter().collect()
}

fn deferred<T: 'static>(
    items: impl FnOnce() -> GenerationResult<ExhaustiveItems<T>> + 'static,
) -> ExhaustiveItems<T> {
    Box::new(iter::once_with(items).flat_map(|result| match result {
        Ok(items) => items,
        Err(error) => Box::new(iter::once(Err(error))) as ExhaustiveItems<T>,
    }))
}

struct ChooseExhaustive<T> {
    values: Arc<Vec<T>>,
}

impl<T: Clone + 'static> ExhaustiveGenerator<T> for ChooseExhaustive<T> {
    fn max_count(&self) -> u64 {
        self.values.len() as u64
    }

    fn iter(&self) -> ExhaustiveItems<T> {
        let values = self.values.clone();
        Box::new((0..values.len()).map(move |i| Ok(values[i].clone())))
    }
}

/// Every value of a fixed list, in list order
pub fn choose<T: Clone + 'static>(
    values: Arc<Vec<T>>,
    max_number_of_samples: u64,
) -> Option<ExhaustiveRef<T>> {
    within_ceiling(Some(values.len() as u64), max_number_of_samples, "choose")?;
    Some(Rc::new(ChooseExhaustive { values }))
}

/// A single value
pub fn just<T: Clone + 'static>(value: T, max_number_of_samples: u64) -> Option<ExhaustiveRef<T>> {
    choose(Arc::new(vec![value]), max_number_of_samples)
}

struct RangeExhaustive {
    min: BigInt,
    count: u64,
}

impl ExhaustiveGenerator<BigInt> for RangeExhaustive {
    fn max_count(&self) -> u64 {
        self.count
    }

    fn iter(&self) -> ExhaustiveItems<BigInt> {
        let min = self.min.clone();
        Box::new((0..self.count).map(move |offset| Ok(&min + BigInt::from(offset))))
    }
}

/// Every integer of `[min, max]` in ascending order
pub fn integral_range(
    min: &BigInt,
    max: &BigInt,
    max_number_of_samples: u64,
) -> Option<ExhaustiveRef<BigInt>> {
    if min > max {
        return None;
    }
    let count = (max - min + 1u32).to_u64();
    let count = within_ceiling(count, max_number_of_samples, "integral range")?;
    Some(Rc::new(RangeExhaustive {
        min: min.clone(),
        count,
    }))
}

struct MappedExhaustive<T, U> {
    inner: ExhaustiveRef<T>,
    mapper: Mapper<T, U>,
}

impl<T: 'static, U: 'static> ExhaustiveGenerator<U> for MappedExhaustive<T, U> {
    fn max_count(&self) -> u64 {
        self.inner.max_count()
    }

    fn iter(&self) -> ExhaustiveItems<U> {
        let mapper = self.mapper.clone();
        Box::new(self.inner.iter().map(move |item| item.map(|value| mapper(value))))
    }
}

/// Apply a function to every value
pub fn map<T: 'static, U: 'static>(
    inner: ExhaustiveRef<T>,
    mapper: Mapper<T, U>,
) -> ExhaustiveRef<U> {
    Rc::new(MappedExhaustive { inner, mapper })
}

/// Passes on accepted values; gives up after too many consecutive rejections
struct RejectingItems<T> {
    inner: ExhaustiveItems<T>,
    accept: Box<dyn FnMut(&T) -> bool>,
    context: &'static str,
    failed: bool,
}

impl<T> Iterator for RejectingItems<T> {
    type Item = GenerationResult<T>;

    fn next(&mut self) -> Option<GenerationResult<T>> {
        if self.failed {
            return None;
        }
        let mut misses = 0;
        loop {
            match self.inner.next()? {
                Ok(value) if (self.accept)(&value) => return Some(Ok(value)),
                Ok(_) => {
                    misses += 1;
                    if misses > MAX_MISSES {
                        self.failed = true;
                        return Some(Err(GenerationError::too_many_misses(
                            misses,
                            self.context,
                        )));
                    }
                }
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

struct FilteredExhaustive<T> {
    inner: ExhaustiveRef<T>,
    predicate: Predicate<T>,
}

impl<T: 'static> ExhaustiveGenerator<T> for FilteredExhaustive<T> {
    fn max_count(&self) -> u64 {
        self.inner.max_count()
    }

    fn iter(&self) -> ExhaustiveItems<T> {
        let predicate = self.predicate.clone();
        Box::new(RejectingItems {
            inner: self.inner.iter(),
            accept: Box::new(move |value: &T| predicate(value)),
            context: "exhaustive filter",
            failed: false,
        })
    }
}

/// Only values accepted by the predicate; the count stays an upper bound
pub fn filter<T: 'static>(inner: ExhaustiveRef<T>, predicate: Predicate<T>) -> ExhaustiveRef<T> {
    Rc::new(FilteredExhaustive { inner, predicate })
}

struct UniqueExhaustive<T> {
    inner: ExhaustiveRef<T>,
}

impl<T: Clone + Eq + Hash + 'static> ExhaustiveGenerator<T> for UniqueExhaustive<T> {
    fn max_count(&self) -> u64 {
        self.inner.max_count()
    }

    fn iter(&self) -> ExhaustiveItems<T> {
        let mut seen = HashSet::new();
        Box::new(RejectingItems {
            inner: self.inner.iter(),
            accept: Box::new(move |value: &T| seen.insert(value.clone())),
            context: "exhaustive unique",
            failed: false,
        })
    }
}

/// Skip values that were already produced in the current enumeration
pub fn unique<T: Clone + Eq + Hash + 'static>(inner: ExhaustiveRef<T>) -> ExhaustiveRef<T> {
    Rc::new(UniqueExhaustive { inner })
}

struct CombinedExhaustive<T, R> {
    parts: Rc<Vec<ExhaustiveRef<T>>>,
    combinator: Mapper<Vec<T>, R>,
    count: u64,
}

impl<T: Clone + 'static, R: 'static> ExhaustiveGenerator<R> for CombinedExhaustive<T, R> {
    fn max_count(&self) -> u64 {
        self.count
    }

    fn iter(&self) -> ExhaustiveItems<R> {
        let parts = self.parts.clone();
        let combinator = self.combinator.clone();
        deferred(move || {
            let lists = parts
                .iter()
                .map(|part| collect_all(part.as_ref()))
                .collect::<GenerationResult<Vec<_>>>()?;
            Ok(Box::new(
                combinatorics::combine(lists).map(move |values| Ok(combinator(values))),
            ) as ExhaustiveItems<R>)
        })
    }
}

fn product_count(counts: impl IntoIterator<Item = u64>, max_number_of_samples: u64) -> Option<u64> {
    let mut product: u64 = 1;
    for count in counts {
        product = product.checked_mul(count)?;
        if product > max_number_of_samples {
            return None;
        }
    }
    Some(product)
}

/// Cartesian product of the parts' values, the last part varying fastest
pub fn combine<T: Clone + 'static, R: 'static>(
    parts: Vec<ExhaustiveRef<T>>,
    combinator: Mapper<Vec<T>, R>,
    max_number_of_samples: u64,
) -> Option<ExhaustiveRef<R>> {
    let count = product_count(
        parts.iter().map(|part| part.max_count()),
        max_number_of_samples,
    );
    let count = within_ceiling(count, max_number_of_samples, "combine")?;
    Some(Rc::new(CombinedExhaustive {
        parts: Rc::new(parts),
        combinator,
        count,
    }))
}

struct ZipExhaustive<A, B> {
    left: ExhaustiveRef<A>,
    right: ExhaustiveRef<B>,
    count: u64,
}

impl<A: Clone + 'static, B: Clone + 'static> ExhaustiveGenerator<(A, B)> for ZipExhaustive<A, B> {
    fn max_count(&self) -> u64 {
        self.count
    }

    fn iter(&self) -> ExhaustiveItems<(A, B)> {
        let left = self.left.clone();
        let right = self.right.clone();
        deferred(move || {
            let lefts = collect_all(left.as_ref())?;
            let rights = Rc::new(collect_all(right.as_ref())?);
            Ok(Box::new(lefts.into_iter().flat_map(move |a| {
                let rights = rights.clone();
                (0..rights.len()).map(move |i| Ok((a.clone(), rights[i].clone())))
            })) as ExhaustiveItems<(A, B)>)
        })
    }
}

/// Pairs of two generators' values, the right side varying fastest
pub fn zip<A: Clone + 'static, B: Clone + 'static>(
    left: ExhaustiveRef<A>,
    right: ExhaustiveRef<B>,
    max_number_of_samples: u64,
) -> Option<ExhaustiveRef<(A, B)>> {
    let count = product_count(
        [left.max_count(), right.max_count()],
        max_number_of_samples,
    );
    let count = within_ceiling(count, max_number_of_samples, "zip")?;
    Some(Rc::new(ZipExhaustive { left, right, count }))
}

struct ListExhaustive<E> {
    element: ExhaustiveRef<E>,
    min_size: usize,
    max_size: usize,
    count: u64,
}

impl<E: Clone + 'static> ExhaustiveGenerator<Vec<E>> for ListExhaustive<E> {
    fn max_count(&self) -> u64 {
        self.count
    }

    fn iter(&self) -> ExhaustiveItems<Vec<E>> {
        let element = self.element.clone();
        let (min_size, max_size) = (self.min_size, self.max_size);
        deferred(move || {
            let values = collect_all(element.as_ref())?;
            Ok(Box::new(
                combinatorics::list_combinations(values, min_size, max_size).map(Ok),
            ) as ExhaustiveItems<Vec<E>>)
        })
    }
}

/// Every list of `min_size..=max_size` elements, by increasing length
pub fn list<E: Clone + 'static>(
    element: ExhaustiveRef<E>,
    min_size: usize,
    max_size: usize,
    max_number_of_samples: u64,
) -> Option<ExhaustiveRef<Vec<E>>> {
    if min_size > max_size {
        return None;
    }
    let element_count = element.max_count();
    let mut count: u64 = 0;
    for size in min_size..=max_size {
        let for_size = checked_power(element_count, size);
        count = within_ceiling(
            for_size.and_then(|c| count.checked_add(c)),
            max_number_of_samples,
            "list",
        )?;
    }
    Some(Rc::new(ListExhaustive {
        element,
        min_size,
        max_size,
        count,
    }))
}

struct SetExhaustive<E> {
    distinct: Arc<Vec<E>>,
    min_size: usize,
    max_size: usize,
    count: u64,
}

impl<E: Clone + Eq + Hash + 'static> ExhaustiveGenerator<HashSet<E>> for SetExhaustive<E> {
    fn max_count(&self) -> u64 {
        self.count
    }

    fn iter(&self) -> ExhaustiveItems<HashSet<E>> {
        Box::new(
            combinatorics::set_combinations(
                self.distinct.as_ref().clone(),
                self.min_size,
                self.max_size,
            )
            .map(|values| Ok(values.into_iter().collect())),
        )
    }
}

/// Every set of `min_size..=max_size` distinct elements, by increasing size
///
/// Sets are built from the distinct values of `element`, so elements that
/// repeat values do not inflate the count.
pub fn set<E: Clone + Eq + Hash + 'static>(
    element: ExhaustiveRef<E>,
    min_size: usize,
    max_size: usize,
    max_number_of_samples: u64,
) -> Option<ExhaustiveRef<HashSet<E>>> {
    if min_size > max_size {
        return None;
    }
    let distinct = if max_size == 0 {
        Vec::new()
    } else {
        if element.max_count() > combinatorics::MAX_BINOMIAL_N {
            debug!(
                "set not exhaustible: {} element values exceed {}",
                element.max_count(),
                combinatorics::MAX_BINOMIAL_N
            );
            return None;
        }
        let mut seen = HashSet::new();
        match collect_all(element.as_ref()) {
            Ok(values) => values
                .into_iter()
                .filter(|value| seen.insert(value.clone()))
                .collect(),
            Err(error) => {
                debug!("set not exhaustible: {}", error);
                return None;
            }
        }
    };
    let element_count = distinct.len() as u64;
    let mut count: u64 = 0;
    for size in min_size..=max_size {
        let for_size = binomial(element_count, size as u64);
        count = within_ceiling(
            for_size.and_then(|c| count.checked_add(c)),
            max_number_of_samples,
            "set",
        )?;
    }
    Some(Rc::new(SetExhaustive {
        distinct: Arc::new(distinct),
        min_size,
        max_size,
        count,
    }))
}

struct PermutationsExhaustive<T> {
    values: Arc<Vec<T>>,
    count: u64,
}

impl<T: Clone + 'static> ExhaustiveGenerator<Vec<T>> for PermutationsExhaustive<T> {
    fn max_count(&self) -> u64 {
        self.count
    }

    fn iter(&self) -> ExhaustiveItems<Vec<T>> {
        let values = self.values.as_ref().clone();
        Box::new(combinatorics::permutations(values).map(Ok))
    }
}

/// Every ordering of the given values
pub fn permutations<T: Clone + 'static>(
    values: Arc<Vec<T>>,
    max_number_of_samples: u64,
) -> Option<ExhaustiveRef<Vec<T>>> {
    let count = within_ceiling(
        factorial(values.len() as u64),
        max_number_of_samples,
        "permutations",
    )?;
    Some(Rc::new(PermutationsExhaustive { values, count }))
}

struct FlatMappedExhaustive<T, U> {
    base: ExhaustiveRef<T>,
    factory: ExhaustiveFactory<T, U>,
    count: u64,
}

impl<T: 'static, U: 'static> ExhaustiveGenerator<U> for FlatMappedExhaustive<T, U> {
    fn max_count(&self) -> u64 {
        self.count
    }

    fn iter(&self) -> ExhaustiveItems<U> {
        let factory = self.factory.clone();
        Box::new(self.base.iter().flat_map(move |base| match base {
            Ok(value) => match factory(value) {
                Some(derived) => derived.iter(),
                None => Box::new(iter::once(Err(GenerationError::Aborted {
                    reason: "derived generator is no longer exhaustible".to_string(),
                }))) as ExhaustiveItems<U>,
            },
            Err(error) => Box::new(iter::once(Err(error))) as ExhaustiveItems<U>,
        }))
    }
}

/// Values of generators derived from every base value, concatenated in base order
///
/// The base is enumerated once up front to sum up the derived counts.
pub fn flat_map<T: 'static, U: 'static>(
    base: ExhaustiveRef<T>,
    factory: ExhaustiveFactory<T, U>,
    max_number_of_samples: u64,
) -> Option<ExhaustiveRef<U>> {
    let mut count: u64 = 0;
    for value in base.iter() {
        let derived = factory(value.ok()?)?;
        count = within_ceiling(
            count.checked_add(derived.max_count()),
            max_number_of_samples,
            "flat map",
        )?;
    }
    Some(Rc::new(FlatMappedExhaustive {
        base,
        factory,
        count,
    }))
}
