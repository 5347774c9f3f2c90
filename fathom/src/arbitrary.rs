//! Arbitrary specifications of value spaces.
//!
//! An [`Arbitrary`] is an immutable description of how to generate values:
//! randomly for a given generation size, exhaustively when the value space is
//! small enough, and through a bounded list of edge cases. Arbitraries are
//! `Send + Sync` and cheap to share; every builder method returns a new
//! instance instead of modifying the receiver.

use std::collections::HashSet;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::combinatorics::CombinedIndices;
use crate::error::{GenerationError, GenerationResult};
use crate::exhaustive::{self, ExhaustiveFactory, ExhaustiveRef};
use crate::generator::{
    BoxedGenerator, ChooseGenerator, CombineGenerator, DEFAULT_MAX_COLLECTION_SIZE,
    FilterGenerator, FlatMapGenerator, GeneratorFactory, JustGenerator, ListGenerator,
    MapGenerator, SetGenerator, UniqueGenerator, ZipGenerator,
};
use crate::shrinkable::{
    CombinedShrinkable, FilteredShrinkable, Mapper, Predicate, Shrinkable, ShrinkableList,
    ShrinkableRef, ShrinkableSet, ZipShrinkable, map_shrinkable, unshrinkable,
};

/// Immutable specification of a value space
pub trait Arbitrary<T>: Send + Sync {
    /// Random generator for the given generation size
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<T>>;

    /// Exhaustive generator, or `None` if the space exceeds `max_number_of_samples`
    fn exhaustive(&self, _max_number_of_samples: u64) -> Option<ExhaustiveRef<T>> {
        None
    }

    /// At most `max_edge_cases` values at the borders of the space
    fn edge_cases(&self, _max_edge_cases: usize) -> Vec<ShrinkableRef<T>> {
        Vec::new()
    }
}

/// Shared, type-erased arbitrary
pub type ArbitraryRef<T> = Arc<dyn Arbitrary<T>>;

impl<T> Arbitrary<T> for ArbitraryRef<T> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<T>> {
        self.as_ref().generator(gen_size)
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<T>> {
        self.as_ref().exhaustive(max_number_of_samples)
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<T>> {
        self.as_ref().edge_cases(max_edge_cases)
    }
}

/// Generator that fails every draw with the same error
fn failing<T: 'static>(error: GenerationError) -> BoxedGenerator<T> {
    Box::new(move |_rng: &mut dyn RngCore| -> GenerationResult<ShrinkableRef<T>> {
        Err(error.clone())
    })
}

/// Combinators available on every arbitrary
pub trait ArbitraryExt<T: 'static>: Arbitrary<T> + Sized + 'static {
    /// Erase the concrete type
    fn boxed(self) -> ArbitraryRef<T> {
        Arc::new(self)
    }

    /// Transform every value
    fn map<U: 'static>(self, mapper: impl Fn(T) -> U + Send + Sync + 'static) -> MappedArbitrary<T, U> {
        MappedArbitrary {
            inner: self.boxed(),
            mapper: Arc::new(mapper),
        }
    }

    /// Keep only values accepted by the predicate
    fn filter(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> FilteredArbitrary<T> {
        FilteredArbitrary {
            inner: self.boxed(),
            predicate: Arc::new(predicate),
        }
    }

    /// Generate a dependent value from an arbitrary derived from every value
    fn flat_map<U: 'static>(
        self,
        mapper: impl Fn(T) -> ArbitraryRef<U> + Send + Sync + 'static,
    ) -> FlatMappedArbitrary<T, U> {
        FlatMappedArbitrary {
            inner: self.boxed(),
            mapper: Arc::new(mapper),
        }
    }

    /// Never produce the same value twice per generator
    fn unique(self) -> UniqueArbitrary<T>
    where
        T: Clone + Eq + Hash + Send + Sync,
    {
        UniqueArbitrary { inner: self.boxed() }
    }

    /// Lists of this arbitrary's values
    fn list(self) -> ListArbitrary<T> {
        ListArbitrary::new(self.boxed())
    }

    /// Sets of this arbitrary's values
    fn set(self) -> SetArbitrary<T>
    where
        T: Clone + Eq + Hash,
    {
        SetArbitrary::new(self.boxed())
    }
}

impl<T: 'static, A: Arbitrary<T> + Sized + 'static> ArbitraryExt<T> for A {}

/// Always the same value
#[derive(Debug, Clone)]
pub struct Just<T> {
    value: T,
}

/// Arbitrary of a single value
pub fn just<T: Clone + Send + Sync + 'static>(value: T) -> Just<T> {
    Just { value }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary<T> for Just<T> {
    fn generator(&self, _gen_size: usize) -> GenerationResult<BoxedGenerator<T>> {
        Ok(Box::new(JustGenerator::new(self.value.clone())))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<T>> {
        exhaustive::just(self.value.clone(), max_number_of_samples)
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<T>> {
        std::iter::once(unshrinkable(self.value.clone()))
            .take(max_edge_cases)
            .collect()
    }
}

/// Uniform choice from a fixed list of values
#[derive(Debug, Clone)]
pub struct Choose<T> {
    values: Arc<Vec<T>>,
}

/// Arbitrary choosing one of the given values; shrinks towards the first one
pub fn of<T: Clone + Send + Sync + 'static>(values: Vec<T>) -> Choose<T> {
    Choose {
        values: Arc::new(values),
    }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary<T> for Choose<T> {
    fn generator(&self, _gen_size: usize) -> GenerationResult<BoxedGenerator<T>> {
        Ok(Box::new(ChooseGenerator::new(self.values.clone())?))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<T>> {
        exhaustive::choose(self.values.clone(), max_number_of_samples)
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<T>> {
        let mut edges: Vec<ShrinkableRef<T>> = Vec::new();
        if let Some(first) = self.values.first() {
            edges.push(unshrinkable(first.clone()));
        }
        if self.values.len() > 1 {
            if let Some(last) = self.values.last() {
                edges.push(unshrinkable(last.clone()));
            }
        }
        edges.truncate(max_edge_cases);
        edges
    }
}

/// Values of another arbitrary, transformed
pub struct MappedArbitrary<T, U> {
    inner: ArbitraryRef<T>,
    mapper: Mapper<T, U>,
}

impl<T: 'static, U: 'static> Arbitrary<U> for MappedArbitrary<T, U> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<U>> {
        let inner = self.inner.generator(gen_size)?;
        Ok(Box::new(MapGenerator::new(inner, self.mapper.clone())))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<U>> {
        let inner = self.inner.exhaustive(max_number_of_samples)?;
        Some(exhaustive::map(inner, self.mapper.clone()))
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<U>> {
        self.inner
            .edge_cases(max_edge_cases)
            .into_iter()
            .map(|edge| map_shrinkable(edge, self.mapper.clone()))
            .collect()
    }
}

/// Values of another arbitrary accepted by a predicate
pub struct FilteredArbitrary<T> {
    inner: ArbitraryRef<T>,
    predicate: Predicate<T>,
}

impl<T: 'static> Arbitrary<T> for FilteredArbitrary<T> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<T>> {
        let inner = self.inner.generator(gen_size)?;
        Ok(Box::new(FilterGenerator::new(inner, self.predicate.clone())))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<T>> {
        let inner = self.inner.exhaustive(max_number_of_samples)?;
        Some(exhaustive::filter(inner, self.predicate.clone()))
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<T>> {
        self.inner
            .edge_cases(max_edge_cases)
            .into_iter()
            .filter(|edge| (self.predicate)(&edge.value()))
            .map(|edge| {
                Rc::new(FilteredShrinkable::new(edge, self.predicate.clone())) as ShrinkableRef<T>
            })
            .collect()
    }
}

/// Values of another arbitrary, each at most once per generator
pub struct UniqueArbitrary<T> {
    inner: ArbitraryRef<T>,
}

impl<T: Clone + Eq + Hash + Send + Sync + 'static> Arbitrary<T> for UniqueArbitrary<T> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<T>> {
        let inner = self.inner.generator(gen_size)?;
        Ok(Box::new(UniqueGenerator::new(inner)))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<T>> {
        let inner = self.inner.exhaustive(max_number_of_samples)?;
        Some(exhaustive::unique(inner))
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<T>> {
        let mut seen = HashSet::new();
        self.inner
            .edge_cases(max_edge_cases)
            .into_iter()
            .filter(|edge| seen.insert(edge.value()))
            .collect()
    }
}

/// Dependent values: a base value selects the arbitrary of the final value
pub struct FlatMappedArbitrary<T, U> {
    inner: ArbitraryRef<T>,
    mapper: Arc<dyn Fn(T) -> ArbitraryRef<U> + Send + Sync>,
}

impl<T: 'static, U: 'static> Arbitrary<U> for FlatMappedArbitrary<T, U> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<U>> {
        let inner = self.inner.generator(gen_size)?;
        let mapper = self.mapper.clone();
        let factory: GeneratorFactory<T, U> =
            Arc::new(move |value| match mapper(value).generator(gen_size) {
                Ok(generator) => generator,
                Err(error) => failing(error),
            });
        Ok(Box::new(FlatMapGenerator::new(inner, factory)))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<U>> {
        let base = self.inner.exhaustive(max_number_of_samples)?;
        let mapper = self.mapper.clone();
        let factory: ExhaustiveFactory<T, U> =
            Arc::new(move |value| mapper(value).exhaustive(max_number_of_samples));
        exhaustive::flat_map(base, factory, max_number_of_samples)
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<U>> {
        self.inner
            .edge_cases(max_edge_cases)
            .into_iter()
            .flat_map(|base| (self.mapper)(base.value()).edge_cases(max_edge_cases))
            .take(max_edge_cases)
            .collect()
    }
}

/// Cartesian combination of edge case lists, bounded by `max_edge_cases`
fn combined_edge_cases<T: 'static>(
    edge_lists: Vec<Vec<ShrinkableRef<T>>>,
    max_edge_cases: usize,
) -> Vec<Vec<ShrinkableRef<T>>> {
    let sizes = edge_lists.iter().map(Vec::len).collect();
    CombinedIndices::new(sizes)
        .take(max_edge_cases)
        .map(|indices| {
            indices
                .iter()
                .enumerate()
                .map(|(part, &index)| edge_lists[part][index].clone())
                .collect()
        })
        .collect()
}

/// Pairs of two arbitraries' values
pub struct ZipArbitrary<A, B> {
    left: ArbitraryRef<A>,
    right: ArbitraryRef<B>,
}

/// Arbitrary of pairs
pub fn zip<A: Clone + 'static, B: Clone + 'static>(
    left: ArbitraryRef<A>,
    right: ArbitraryRef<B>,
) -> ZipArbitrary<A, B> {
    ZipArbitrary { left, right }
}

/// Two differently typed values combined into one
pub fn combine2<A, B, R>(
    left: ArbitraryRef<A>,
    right: ArbitraryRef<B>,
    combinator: impl Fn(A, B) -> R + Send + Sync + 'static,
) -> MappedArbitrary<(A, B), R>
where
    A: Clone + 'static,
    B: Clone + 'static,
    R: 'static,
{
    zip(left, right).map(move |(a, b)| combinator(a, b))
}

impl<A: Clone + 'static, B: Clone + 'static> Arbitrary<(A, B)> for ZipArbitrary<A, B> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<(A, B)>> {
        Ok(Box::new(ZipGenerator::new(
            self.left.generator(gen_size)?,
            self.right.generator(gen_size)?,
        )))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<(A, B)>> {
        exhaustive::zip(
            self.left.exhaustive(max_number_of_samples)?,
            self.right.exhaustive(max_number_of_samples)?,
            max_number_of_samples,
        )
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<(A, B)>> {
        let lefts = self.left.edge_cases(max_edge_cases);
        let rights = self.right.edge_cases(max_edge_cases);
        lefts
            .iter()
            .flat_map(|left| {
                rights.iter().map(move |right| {
                    Rc::new(ZipShrinkable::new(left.clone(), right.clone()))
                        as ShrinkableRef<(A, B)>
                })
            })
            .take(max_edge_cases)
            .collect()
    }
}

/// Several same-typed values combined into one
pub struct CombinedArbitrary<T, R> {
    parts: Vec<ArbitraryRef<T>>,
    combinator: Mapper<Vec<T>, R>,
}

/// Combine the values of several arbitraries of the same type
pub fn combine<T: Clone + 'static, R: 'static>(
    parts: Vec<ArbitraryRef<T>>,
    combinator: impl Fn(Vec<T>) -> R + Send + Sync + 'static,
) -> CombinedArbitrary<T, R> {
    CombinedArbitrary {
        parts,
        combinator: Arc::new(combinator),
    }
}

impl<T: Clone + 'static, R: 'static> Arbitrary<R> for CombinedArbitrary<T, R> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<R>> {
        let parts = self
            .parts
            .iter()
            .map(|part| part.generator(gen_size))
            .collect::<GenerationResult<Vec<_>>>()?;
        Ok(Box::new(CombineGenerator::new(parts, self.combinator.clone())))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<R>> {
        let parts = self
            .parts
            .iter()
            .map(|part| part.exhaustive(max_number_of_samples))
            .collect::<Option<Vec<_>>>()?;
        exhaustive::combine(parts, self.combinator.clone(), max_number_of_samples)
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<R>> {
        let edge_lists = self
            .parts
            .iter()
            .map(|part| part.edge_cases(max_edge_cases))
            .collect();
        combined_edge_cases(edge_lists, max_edge_cases)
            .into_iter()
            .map(|parts| {
                Rc::new(CombinedShrinkable::new(parts, self.combinator.clone())) as ShrinkableRef<R>
            })
            .collect()
    }
}

fn effective_max_size(min_size: usize, max_size: Option<usize>) -> usize {
    max_size.unwrap_or_else(|| min_size.max(DEFAULT_MAX_COLLECTION_SIZE))
}

/// Lists of elements from an element arbitrary
pub struct ListArbitrary<E> {
    element: ArbitraryRef<E>,
    min_size: usize,
    max_size: Option<usize>,
}

impl<E> Clone for ListArbitrary<E> {
    fn clone(&self) -> Self {
        Self {
            element: self.element.clone(),
            min_size: self.min_size,
            max_size: self.max_size,
        }
    }
}

impl<E: 'static> ListArbitrary<E> {
    pub fn new(element: ArbitraryRef<E>) -> Self {
        Self {
            element,
            min_size: 0,
            max_size: None,
        }
    }

    pub fn of_min_size(&self, min_size: usize) -> Self {
        Self {
            min_size,
            ..self.clone()
        }
    }

    pub fn of_max_size(&self, max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ..self.clone()
        }
    }

    pub fn of_size(&self, size: usize) -> Self {
        self.of_min_size(size).of_max_size(size)
    }
}

impl<E: Clone + 'static> Arbitrary<Vec<E>> for ListArbitrary<E> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<Vec<E>>> {
        Ok(Box::new(ListGenerator::new(
            self.element.generator(gen_size)?,
            gen_size,
            self.min_size,
            effective_max_size(self.min_size, self.max_size),
        )?))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<Vec<E>>> {
        exhaustive::list(
            self.element.exhaustive(max_number_of_samples)?,
            self.min_size,
            effective_max_size(self.min_size, self.max_size),
            max_number_of_samples,
        )
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<Vec<E>>> {
        let max_size = effective_max_size(self.min_size, self.max_size);
        let mut edges: Vec<ShrinkableRef<Vec<E>>> = Vec::new();
        if self.min_size == 0 {
            edges.push(Rc::new(ShrinkableList::new(Vec::new(), 0)));
        }
        if self.min_size <= 1 && max_size >= 1 {
            for element in self.element.edge_cases(max_edge_cases) {
                edges.push(Rc::new(ShrinkableList::new(vec![element], self.min_size)));
            }
        }
        edges.truncate(max_edge_cases);
        edges
    }
}

/// Sets of distinct elements from an element arbitrary
pub struct SetArbitrary<E> {
    element: ArbitraryRef<E>,
    min_size: usize,
    max_size: Option<usize>,
}

impl<E> Clone for SetArbitrary<E> {
    fn clone(&self) -> Self {
        Self {
            element: self.element.clone(),
            min_size: self.min_size,
            max_size: self.max_size,
        }
    }
}

impl<E: Clone + Eq + Hash + 'static> SetArbitrary<E> {
    pub fn new(element: ArbitraryRef<E>) -> Self {
        Self {
            element,
            min_size: 0,
            max_size: None,
        }
    }

    pub fn of_min_size(&self, min_size: usize) -> Self {
        Self {
            min_size,
            ..self.clone()
        }
    }

    pub fn of_max_size(&self, max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ..self.clone()
        }
    }

    pub fn of_size(&self, size: usize) -> Self {
        self.of_min_size(size).of_max_size(size)
    }
}

impl<E: Clone + Eq + Hash + 'static> Arbitrary<HashSet<E>> for SetArbitrary<E> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<HashSet<E>>> {
        Ok(Box::new(SetGenerator::new(
            self.element.generator(gen_size)?,
            gen_size,
            self.min_size,
            effective_max_size(self.min_size, self.max_size),
        )?))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<HashSet<E>>> {
        exhaustive::set(
            self.element.exhaustive(max_number_of_samples)?,
            self.min_size,
            effective_max_size(self.min_size, self.max_size),
            max_number_of_samples,
        )
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<HashSet<E>>> {
        let max_size = effective_max_size(self.min_size, self.max_size);
        let mut edges: Vec<ShrinkableRef<HashSet<E>>> = Vec::new();
        if self.min_size == 0 {
            edges.push(Rc::new(ShrinkableSet::new(Vec::new(), 0)));
        }
        if self.min_size <= 1 && max_size >= 1 {
            for element in self.element.edge_cases(max_edge_cases) {
                edges.push(Rc::new(ShrinkableSet::new(vec![element], self.min_size)));
            }
        }
        edges.truncate(max_edge_cases);
        edges
    }
}

/// Random orderings of a fixed list of values
#[derive(Debug, Clone)]
pub struct Shuffle<T> {
    values: Arc<Vec<T>>,
}

/// Arbitrary of all permutations of the given values
pub fn shuffle<T: Clone + Send + Sync + 'static>(values: Vec<T>) -> Shuffle<T> {
    Shuffle {
        values: Arc::new(values),
    }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary<Vec<T>> for Shuffle<T> {
    fn generator(&self, _gen_size: usize) -> GenerationResult<BoxedGenerator<Vec<T>>> {
        let values = self.values.clone();
        Ok(Box::new(
            move |rng: &mut dyn RngCore| -> GenerationResult<ShrinkableRef<Vec<T>>> {
                let mut shuffled = values.as_ref().clone();
                for i in (1..shuffled.len()).rev() {
                    let j = rng.gen_range(0..=i);
                    shuffled.swap(i, j);
                }
                Ok(unshrinkable(shuffled))
            },
        ))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<Vec<T>>> {
        exhaustive::permutations(self.values.clone(), max_number_of_samples)
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<Vec<T>>> {
        std::iter::once(unshrinkable(self.values.as_ref().clone()))
            .take(max_edge_cases)
            .collect()
    }
}
