//! Integral arbitraries.
//!
//! All integral types are generated through the same arbitrary-precision
//! machinery: a [`RandomDistribution`] draws a `BigInt` inside the range and a
//! [`ShrinkableBigInt`] shrinks it towards the shrinking target. Fixed-width
//! types are converted at the end.

use std::rc::Rc;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{Bounded, One, Zero};
use rand::RngCore;

use crate::arbitrary::Arbitrary;
use crate::distribution::{RandomDistribution, RandomNumericGenerator};
use crate::error::{GenerationError, GenerationResult};
use crate::exhaustive::{self, ExhaustiveRef};
use crate::generator::{BoxedGenerator, MapGenerator, RandomGenerator};
use crate::shrinkable::{Mapper, ShrinkableBigInt, ShrinkableRef, map_shrinkable};

/// Types generated by [`IntegralArbitrary`]
pub trait IntegralValue: Clone + Into<BigInt> + TryFrom<BigInt> + Send + Sync + 'static {}

impl<T> IntegralValue for T where T: Clone + Into<BigInt> + TryFrom<BigInt> + Send + Sync + 'static {}

/// A validated integral range together with its shrinking target
#[derive(Debug, Clone)]
pub(crate) struct IntegralSpace {
    min: BigInt,
    max: BigInt,
    target: BigInt,
}

impl IntegralSpace {
    /// Without an explicit target the space shrinks towards zero, or the border closest to it
    pub(crate) fn new(min: BigInt, max: BigInt, target: Option<BigInt>) -> GenerationResult<Self> {
        if min > max {
            return Err(GenerationError::invalid_field(
                "min",
                format!("min <{}> must not be larger than max <{}>", min, max),
            ));
        }
        let target = target
            .unwrap_or_else(BigInt::zero)
            .clamp(min.clone(), max.clone());
        Ok(Self { min, max, target })
    }

    pub(crate) fn shrinkable(&self, value: BigInt) -> ShrinkableRef<BigInt> {
        Rc::new(ShrinkableBigInt::new(
            value,
            self.min.clone(),
            self.max.clone(),
            self.target.clone(),
        ))
    }

    pub(crate) fn generator(
        &self,
        gen_size: usize,
        distribution: RandomDistribution,
    ) -> GenerationResult<IntegralGenerator> {
        let numbers = distribution.create_generator(gen_size, &self.min, &self.max, &self.target)?;
        Ok(IntegralGenerator {
            numbers,
            space: self.clone(),
        })
    }

    pub(crate) fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<BigInt>> {
        exhaustive::integral_range(&self.min, &self.max, max_number_of_samples)
    }

    /// Target, borders and the target's direct neighbours, without duplicates
    pub(crate) fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<BigInt>> {
        let candidates = [
            self.target.clone(),
            self.min.clone(),
            self.max.clone(),
            &self.target + BigInt::one(),
            &self.target - BigInt::one(),
        ];
        let mut values: Vec<BigInt> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if candidate >= self.min && candidate <= self.max && !values.contains(&candidate) {
                values.push(candidate);
            }
        }
        values
            .into_iter()
            .take(max_edge_cases)
            .map(|value| self.shrinkable(value))
            .collect()
    }
}

/// Random integers of a fixed range
pub struct IntegralGenerator {
    numbers: Box<dyn RandomNumericGenerator>,
    space: IntegralSpace,
}

impl RandomGenerator<BigInt> for IntegralGenerator {
    fn next(&self, rng: &mut dyn RngCore) -> GenerationResult<ShrinkableRef<BigInt>> {
        Ok(self.space.shrinkable(self.numbers.next(rng)))
    }
}

/// Integral values of type `T` in a closed range
#[derive(Debug, Clone)]
pub struct IntegralArbitrary<T> {
    min: T,
    max: T,
    target: Option<T>,
    distribution: RandomDistribution,
}

/// Integers covering the full range of `T`
pub fn integers<T: IntegralValue + Bounded>() -> IntegralArbitrary<T> {
    IntegralArbitrary::new(T::min_value(), T::max_value())
}

/// Arbitrary-precision integers, by default in the range of `i64`
pub fn big_integers() -> IntegralArbitrary<BigInt> {
    IntegralArbitrary::new(BigInt::from(i64::MIN), BigInt::from(i64::MAX))
}

impl<T: IntegralValue> IntegralArbitrary<T> {
    pub fn new(min: T, max: T) -> Self {
        Self {
            min,
            max,
            target: None,
            distribution: RandomDistribution::default(),
        }
    }

    /// Restrict values to `[min, max]`
    pub fn between(&self, min: T, max: T) -> Self {
        Self {
            min,
            max,
            ..self.clone()
        }
    }

    pub fn greater_or_equal(&self, min: T) -> Self {
        Self {
            min,
            ..self.clone()
        }
    }

    pub fn less_or_equal(&self, max: T) -> Self {
        Self {
            max,
            ..self.clone()
        }
    }

    /// Shrink towards `target`; a target outside the range is moved to the nearest border
    pub fn shrink_towards(&self, target: T) -> Self {
        Self {
            target: Some(target),
            ..self.clone()
        }
    }

    pub fn with_distribution(&self, distribution: RandomDistribution) -> Self {
        Self {
            distribution,
            ..self.clone()
        }
    }

    fn space(&self) -> GenerationResult<IntegralSpace> {
        IntegralSpace::new(
            self.min.clone().into(),
            self.max.clone().into(),
            self.target.clone().map(Into::into),
        )
    }

    /// Every value stems from `[min, max]`, so the conversion back never falls back
    fn from_big(&self) -> Mapper<BigInt, T> {
        let fallback = self.min.clone();
        Arc::new(move |value: BigInt| T::try_from(value).unwrap_or_else(|_| fallback.clone()))
    }
}

impl<T: IntegralValue> Arbitrary<T> for IntegralArbitrary<T> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<T>> {
        let integers = self.space()?.generator(gen_size, self.distribution)?;
        Ok(Box::new(MapGenerator::new(
            Box::new(integers),
            self.from_big(),
        )))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<T>> {
        let range = self.space().ok()?.exhaustive(max_number_of_samples)?;
        Some(exhaustive::map(range, self.from_big()))
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<T>> {
        let Ok(space) = self.space() else {
            return Vec::new();
        };
        let mapper = self.from_big();
        space
            .edge_cases(max_edge_cases)
            .into_iter()
            .map(|edge| map_shrinkable(edge, mapper.clone()))
            .collect()
    }
}
