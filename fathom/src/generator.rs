//! Random generators and their combinators.
//!
//! A [`RandomGenerator`] turns the state of a random source into a
//! [`Shrinkable`](crate::shrinkable::Shrinkable). For a given random source
//! state the result is always the same, which is what makes seeds replayable.

use std::collections::HashSet;
use std::hash::Hash;
use std::iter;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rand::{Rng, RngCore};

use crate::distribution::{RandomDistribution, RandomNumericGenerator};
use crate::error::{GenerationError, GenerationResult};
use crate::rng::XorShiftRng;
use crate::shrinkable::{
    Candidates, CombinedShrinkable, FilteredShrinkable, FlatMappedShrinkable, Mapper,
    Predicate, Shrinkable, ShrinkableList, ShrinkableRef, ShrinkableSet, ShrinkingDistance,
    ZipShrinkable, map_shrinkable, unshrinkable,
};

/// Consecutive rejections after which filtering generators give up
pub const MAX_MISSES: usize = 10_000;

/// Upper size limit of generated collections when none is configured
pub const DEFAULT_MAX_COLLECTION_SIZE: usize = 255;

/// Core generator trait producing shrinkable values from a random source
pub trait RandomGenerator<T> {
    /// Draw the next shrinkable value
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<T>>;
}

/// Type-erased generator
pub type BoxedGenerator<T> = Box<dyn RandomGenerator<T>>;

/// Creates the generator of a dependent value from a base value
pub type GeneratorFactory<T, U> = Arc<dyn Fn(T) -> BoxedGenerator<U> + Send + Sync>;

impl<T, F> RandomGenerator<T> for F
where
    F: Fn(&mut dyn RngCore) -> GenerationResult<ShrinkableRef<T>>,
{
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<T>> {
        self(rng)
    }
}

/// Always produces the same, unshrinkable value
#[derive(Debug, Clone)]
pub struct JustGenerator<T> {
    value: T,
}

impl<T: Clone> JustGenerator<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Clone + 'static> RandomGenerator<T> for JustGenerator<T> {
    fn next(&self, _rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<T>> {
        Ok(unshrinkable(self.value.clone()))
    }
}

/// Chooses uniformly from a fixed list of values; shrinks towards earlier values
#[derive(Debug, Clone)]
pub struct ChooseGenerator<T> {
    values: Arc<Vec<T>>,
}

impl<T: Clone> ChooseGenerator<T> {
    pub fn new(values: Arc<Vec<T>>) -> GenerationResult<Self> {
        if values.is_empty() {
            return Err(GenerationError::invalid_field(
                "values",
                "cannot choose from an empty list of values",
            ));
        }
        Ok(Self { values })
    }
}

impl<T: Clone + 'static> RandomGenerator<T> for ChooseGenerator<T> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<T>> {
        let index = rng.gen_range(0..self.values.len());
        Ok(Rc::new(ChoiceShrinkable {
            values: self.values.clone(),
            index,
        }))
    }
}

/// A chosen value, shrinking towards the start of its list of choices
pub struct ChoiceShrinkable<T> {
    values: Arc<Vec<T>>,
    index: usize,
}

impl<T: Clone + 'static> Shrinkable<T> for ChoiceShrinkable<T> {
    fn value(&self) -> T {
        self.values[self.index].clone()
    }

    fn shrink(&self) -> Candidates<T> {
        let index = self.index;
        let values = self.values.clone();
        let bits = usize::BITS - index.leading_zeros();
        Box::new((0..bits).map(move |halvings| {
            Rc::new(ChoiceShrinkable {
                values: values.clone(),
                index: index - (index >> halvings),
            }) as ShrinkableRef<T>
        }))
    }

    fn distance(&self) -> ShrinkingDistance {
        ShrinkingDistance::of(&[self.index as u64])
    }
}

/// Applies a function to every generated value
pub struct MapGenerator<T, U> {
    inner: BoxedGenerator<T>,
    mapper: Mapper<T, U>,
}

impl<T, U> MapGenerator<T, U> {
    pub fn new(inner: BoxedGenerator<T>, mapper: Mapper<T, U>) -> Self {
        Self { inner, mapper }
    }
}

impl<T: 'static, U: 'static> RandomGenerator<U> for MapGenerator<T, U> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<U>> {
        let shrinkable = self.inner.next(rng)?;
        Ok(map_shrinkable(shrinkable, self.mapper.clone()))
    }
}

/// Only lets through values accepted by a predicate
pub struct FilterGenerator<T> {
    inner: BoxedGenerator<T>,
    predicate: Predicate<T>,
}

impl<T> FilterGenerator<T> {
    pub fn new(inner: BoxedGenerator<T>, predicate: Predicate<T>) -> Self {
        Self { inner, predicate }
    }
}

impl<T: 'static> RandomGenerator<T> for FilterGenerator<T> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<T>> {
        for _ in 0..MAX_MISSES {
            let shrinkable = self.inner.next(rng)?;
            if (self.predicate)(&shrinkable.value()) {
                return Ok(Rc::new(FilteredShrinkable::new(
                    shrinkable,
                    self.predicate.clone(),
                )));
            }
        }
        Err(GenerationError::too_many_misses(MAX_MISSES, "filter"))
    }
}

/// Never produces the same value twice during its lifetime
///
/// Shrinking candidates are restricted to values this generator has not
/// produced yet, apart from the shrunk value itself.
pub struct UniqueGenerator<T> {
    inner: BoxedGenerator<T>,
    seen: Arc<Mutex<HashSet<T>>>,
}

impl<T: Eq + Hash> UniqueGenerator<T> {
    pub fn new(inner: BoxedGenerator<T>) -> Self {
        Self {
            inner,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<T: Clone + Eq + Hash + Send + Sync + 'static> RandomGenerator<T> for UniqueGenerator<T> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<T>> {
        for _ in 0..MAX_MISSES {
            let shrinkable = self.inner.next(rng)?;
            let value = shrinkable.value();
            let fresh = self
                .seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(value.clone());
            if fresh {
                let seen = self.seen.clone();
                let unused: Predicate<T> = Arc::new(move |candidate: &T| {
                    candidate == &value
                        || !seen
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .contains(candidate)
                });
                return Ok(Rc::new(FilteredShrinkable::new(shrinkable, unused)));
            }
        }
        Err(GenerationError::too_many_misses(MAX_MISSES, "unique"))
    }
}

/// Generates a base value, then a dependent value from a generator derived from it
pub struct FlatMapGenerator<T, U> {
    inner: BoxedGenerator<T>,
    factory: GeneratorFactory<T, U>,
}

impl<T, U> FlatMapGenerator<T, U> {
    pub fn new(inner: BoxedGenerator<T>, factory: GeneratorFactory<T, U>) -> Self {
        Self { inner, factory }
    }
}

impl<T: 'static, U: 'static> RandomGenerator<U> for FlatMapGenerator<T, U> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<U>> {
        let base = self.inner.next(rng)?;
        // The dependent value gets its own seed so it can be regenerated during shrinking
        let seed = rng.next_u64();
        let mapped = (self.factory)(base.value()).next(&mut XorShiftRng::new(seed))?;
        Ok(Rc::new(FlatMappedShrinkable::new(
            base,
            self.factory.clone(),
            seed,
            mapped,
        )))
    }
}

/// Pairs the values of two generators
pub struct ZipGenerator<A, B> {
    left: BoxedGenerator<A>,
    right: BoxedGenerator<B>,
}

impl<A, B> ZipGenerator<A, B> {
    pub fn new(left: BoxedGenerator<A>, right: BoxedGenerator<B>) -> Self {
        Self { left, right }
    }
}

impl<A: 'static, B: 'static> RandomGenerator<(A, B)> for ZipGenerator<A, B> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<(A, B)>> {
        let left = self.left.next(rng)?;
        let right = self.right.next(rng)?;
        Ok(Rc::new(ZipShrinkable::new(left, right)))
    }
}

/// Combines the values of several generators of the same type
pub struct CombineGenerator<T, R> {
    parts: Vec<BoxedGenerator<T>>,
    combinator: Mapper<Vec<T>, R>,
}

impl<T, R> CombineGenerator<T, R> {
    pub fn new(parts: Vec<BoxedGenerator<T>>, combinator: Mapper<Vec<T>, R>) -> Self {
        Self { parts, combinator }
    }
}

impl<T: 'static, R: 'static> RandomGenerator<R> for CombineGenerator<T, R> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<R>> {
        let parts = self
            .parts
            .iter()
            .map(|part| part.next(rng))
            .collect::<GenerationResult<Vec<_>>>()?;
        Ok(Rc::new(CombinedShrinkable::new(
            parts,
            self.combinator.clone(),
        )))
    }
}

/// Draws collection sizes, biased towards the minimum size
struct SizeGenerator {
    min_size: usize,
    sizes: Box<dyn RandomNumericGenerator>,
}

impl SizeGenerator {
    fn new(gen_size: usize, min_size: usize, max_size: usize) -> GenerationResult<Self> {
        if min_size > max_size {
            return Err(GenerationError::invalid_field(
                "min_size",
                format!(
                    "min size <{}> must not be larger than max size <{}>",
                    min_size, max_size
                ),
            ));
        }
        let min = BigInt::from(min_size);
        let sizes = RandomDistribution::Biased.create_generator(
            gen_size,
            &min,
            &BigInt::from(max_size),
            &min,
        )?;
        Ok(Self { min_size, sizes })
    }

    fn next(&self, rng: &mut dyn RngCore) -> usize {
        self.sizes.next(rng).to_usize().unwrap_or(self.min_size)
    }
}

/// Generates lists of elements with a size in `[min_size, max_size]`
pub struct ListGenerator<E> {
    element: BoxedGenerator<E>,
    min_size: usize,
    sizes: SizeGenerator,
}

impl<E> ListGenerator<E> {
    pub fn new(
        element: BoxedGenerator<E>,
        gen_size: usize,
        min_size: usize,
        max_size: usize,
    ) -> GenerationResult<Self> {
        Ok(Self {
            element,
            min_size,
            sizes: SizeGenerator::new(gen_size, min_size, max_size)?,
        })
    }
}

impl<E: 'static> RandomGenerator<Vec<E>> for ListGenerator<E> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<Vec<E>>> {
        let size = self.sizes.next(rng);
        let elements = (0..size)
            .map(|_| self.element.next(rng))
            .collect::<GenerationResult<Vec<_>>>()?;
        Ok(Rc::new(ShrinkableList::new(elements, self.min_size)))
    }
}

/// Generates sets of distinct elements with a size in `[min_size, max_size]`
pub struct SetGenerator<E> {
    element: BoxedGenerator<E>,
    min_size: usize,
    sizes: SizeGenerator,
}

impl<E> SetGenerator<E> {
    pub fn new(
        element: BoxedGenerator<E>,
        gen_size: usize,
        min_size: usize,
        max_size: usize,
    ) -> GenerationResult<Self> {
        Ok(Self {
            element,
            min_size,
            sizes: SizeGenerator::new(gen_size, min_size, max_size)?,
        })
    }
}

impl<E: Clone + Eq + Hash + 'static> RandomGenerator<HashSet<E>> for SetGenerator<E> {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<HashSet<E>>> {
        let size = self.sizes.next(rng);
        let mut values = HashSet::with_capacity(size);
        let mut elements = Vec::with_capacity(size);
        let mut misses = 0;
        while elements.len() < size {
            let element = self.element.next(rng)?;
            if values.insert(element.value()) {
                elements.push(element);
            } else {
                misses += 1;
                if misses > MAX_MISSES {
                    return Err(GenerationError::too_many_misses(misses, "set elements"));
                }
            }
        }
        Ok(Rc::new(ShrinkableSet::new(elements, self.min_size)))
    }
}

/// Draws from a fixed sequence of shrinkables in order, then from a fallback
pub fn with_prefix<T: 'static>(
    prefix: Vec<ShrinkableRef<T>>,
    fallback: BoxedGenerator<T>,
) -> BoxedGenerator<T> {
    let prefix = std::cell::RefCell::new(prefix.into_iter());
    Box::new(move |rng: &mut dyn RngCore| match prefix.borrow_mut().next() {
        Some(shrinkable) => Ok(shrinkable),
        None => fallback.next(rng),
    })
}

/// Draws `count` values from a generator, stopping at the first error
pub fn sample<T: 'static>(
    generator: &dyn RandomGenerator<T>,
    rng: &mut dyn RngCore,
    count: usize,
) -> GenerationResult<Vec<T>> {
    iter::repeat_with(|| generator.next(rng).map(|s| s.value()))
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shrinkable::ShrinkableBigInt;

    fn small_ints() -> BoxedGenerator<i64> {
        Box::new(|rng: &mut dyn RngCore| -> GenerationResult<ShrinkableRef<i64>> {
            let value = rng.gen_range(0..100i64);
            let shrinkable: ShrinkableRef<BigInt> = Rc::new(ShrinkableBigInt::new(
                BigInt::from(value),
                BigInt::from(0),
                BigInt::from(99),
                BigInt::from(0),
            ));
            Ok(map_shrinkable(
                shrinkable,
                Arc::new(|v: BigInt| v.to_i64().unwrap_or_default()),
            ))
        })
    }

    #[test]
    fn test_just_generator() {
        let generator = JustGenerator::new("constant");
        let mut rng = XorShiftRng::new(1);
        let value = generator.next(&mut rng).unwrap();
        assert_eq!(value.value(), "constant");
        assert_eq!(value.shrink().count(), 0);
    }

    #[test]
    fn test_choose_generator_shrinks_towards_first() {
        let generator = ChooseGenerator::new(Arc::new(vec!['a', 'b', 'c', 'd', 'e'])).unwrap();
        let mut rng = XorShiftRng::new(3);
        for _ in 0..50 {
            let chosen = generator.next(&mut rng).unwrap();
            let value = chosen.value();
            assert!(('a'..='e').contains(&value));
            if value != 'a' {
                assert_eq!(chosen.shrink().next().unwrap().value(), 'a');
            }
        }
    }

    #[test]
    fn test_choose_from_nothing_is_rejected() {
        let result = ChooseGenerator::<u8>::new(Arc::new(Vec::new()));
        assert!(matches!(
            result,
            Err(GenerationError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_filter_generator() {
        let even = FilterGenerator::new(small_ints(), Arc::new(|v: &i64| v % 2 == 0));
        let mut rng = XorShiftRng::new(11);
        let values = sample(&even, &mut rng, 100).unwrap();
        assert!(values.iter().all(|v| v % 2 == 0));
    }

    #[test]
    fn test_filter_gives_up_after_too_many_misses() {
        let impossible = FilterGenerator::new(small_ints(), Arc::new(|v: &i64| *v > 1000));
        let mut rng = XorShiftRng::new(11);
        let result = impossible.next(&mut rng);
        assert!(matches!(
            result,
            Err(GenerationError::TooManyMisses { misses: 10_000, .. })
        ));
    }

    #[test]
    fn test_unique_generator() {
        let unique = UniqueGenerator::new(small_ints());
        let mut rng = XorShiftRng::new(5);
        let values = sample(&unique, &mut rng, 100).unwrap();
        let distinct: HashSet<i64> = values.iter().copied().collect();
        assert_eq!(distinct.len(), 100);
        assert!(unique.next(&mut rng).err().unwrap().is_too_many_misses());
    }

    #[test]
    fn test_map_and_zip() {
        let doubled = MapGenerator::new(small_ints(), Arc::new(|v: i64| v * 2));
        let zipped = ZipGenerator::new(Box::new(doubled), small_ints());
        let mut rng = XorShiftRng::new(8);
        for (left, right) in sample(&zipped, &mut rng, 50).unwrap() {
            assert_eq!(left % 2, 0);
            assert!((0..100).contains(&right));
        }
    }

    #[test]
    fn test_flat_map_shrinks_dependent_value() {
        let factory: GeneratorFactory<i64, Vec<i64>> = Arc::new(|size: i64| {
            Box::new(
                ListGenerator::new(small_ints(), 100, size as usize, size as usize)
                    .expect("valid sizes"),
            ) as BoxedGenerator<Vec<i64>>
        });
        let sizes = FilterGenerator::new(small_ints(), Arc::new(|v: &i64| *v < 10));
        let generator = FlatMapGenerator::new(Box::new(sizes), factory);
        let mut rng = XorShiftRng::new(21);
        for _ in 0..20 {
            let shrinkable = generator.next(&mut rng).unwrap();
            let list = shrinkable.value();
            assert!(list.len() < 10);
            for candidate in shrinkable.shrink().take(50) {
                assert!(candidate.distance() <= shrinkable.distance());
            }
        }
    }

    #[test]
    fn test_list_generator_sizes() {
        let lists = ListGenerator::new(small_ints(), 1000, 2, 5).unwrap();
        let mut rng = XorShiftRng::new(13);
        let values = sample(&lists, &mut rng, 200).unwrap();
        assert!(values.iter().all(|l| (2..=5).contains(&l.len())));
        assert!(values.iter().any(|l| l.len() == 5));
    }

    #[test]
    fn test_list_generator_rejects_inverted_sizes() {
        assert!(ListGenerator::new(small_ints(), 1000, 5, 2).is_err());
    }

    #[test]
    fn test_set_generator() {
        let sets = SetGenerator::new(small_ints(), 1000, 3, 10).unwrap();
        let mut rng = XorShiftRng::new(17);
        for set in sample(&sets, &mut rng, 100).unwrap() {
            assert!((3..=10).contains(&set.len()));
        }
    }

    #[test]
    fn test_set_generator_cannot_fill_impossible_size() {
        let two_values = ChooseGenerator::new(Arc::new(vec![1, 2])).unwrap();
        let sets = SetGenerator::new(Box::new(two_values), 1000, 3, 3).unwrap();
        let mut rng = XorShiftRng::new(17);
        assert!(sets.next(&mut rng).err().unwrap().is_too_many_misses());
    }

    #[test]
    fn test_combine_generator() {
        let sum = CombineGenerator::new(
            vec![small_ints(), small_ints(), small_ints()],
            Arc::new(|values: Vec<i64>| values.iter().sum::<i64>()),
        );
        let mut rng = XorShiftRng::new(2);
        let shrinkable = sum.next(&mut rng).unwrap();
        assert!((0..300).contains(&shrinkable.value()));
        assert_eq!(shrinkable.distance().dimensions().len(), 3);
    }

    #[test]
    fn test_with_prefix_drains_prefix_first() {
        let generator = with_prefix(vec![unshrinkable(-1), unshrinkable(-2)], small_ints());
        let mut rng = XorShiftRng::new(4);
        let values = sample(generator.as_ref(), &mut rng, 4).unwrap();
        assert_eq!(&values[..2], &[-1, -2]);
        assert!(values[2..].iter().all(|v| *v >= 0));
    }

    #[test]
    fn test_same_seed_same_values() {
        let lists = ListGenerator::new(small_ints(), 100, 0, 20).unwrap();
        let first = sample(&lists, &mut XorShiftRng::new(99), 20).unwrap();
        let second = sample(&lists, &mut XorShiftRng::new(99), 20).unwrap();
        assert_eq!(first, second);
    }
}
