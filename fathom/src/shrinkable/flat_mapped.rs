use std::rc::Rc;

use super::{
    CandidateSupplier, Candidates, Shrinkable, ShrinkableRef, ShrinkingDistance, concat_lazily,
};
use crate::generator::GeneratorFactory;
use crate::rng::XorShiftRng;

/// Dependent value generated from a base value
///
/// The base shrinks first; every base candidate regenerates the dependent
/// value from the recorded seed, so that the dependent side stays as close as
/// possible to what was originally generated. Afterwards the dependent value
/// shrinks on its own.
pub struct FlatMappedShrinkable<T, U> {
    base: ShrinkableRef<T>,
    factory: GeneratorFactory<T, U>,
    seed: u64,
    mapped: ShrinkableRef<U>,
}

impl<T: 'static, U: 'static> FlatMappedShrinkable<T, U> {
    pub fn new(
        base: ShrinkableRef<T>,
        factory: GeneratorFactory<T, U>,
        seed: u64,
        mapped: ShrinkableRef<U>,
    ) -> Self {
        Self {
            base,
            factory,
            seed,
            mapped,
        }
    }

    fn with(&self, base: ShrinkableRef<T>, mapped: ShrinkableRef<U>) -> ShrinkableRef<U> {
        Rc::new(FlatMappedShrinkable {
            base,
            factory: self.factory.clone(),
            seed: self.seed,
            mapped,
        })
    }

    fn shrink_base(&self) -> Candidates<U> {
        let this = self.clone_parts();
        let limit = self.distance();
        Box::new(self.base.shrink().filter_map(move |base| {
            let mut rng = XorShiftRng::new(this.seed);
            let mapped = (this.factory)(base.value()).next(&mut rng).ok()?;
            let candidate = this.with(base, mapped);
            (candidate.distance() <= limit).then_some(candidate)
        }))
    }

    fn shrink_mapped(&self) -> Candidates<U> {
        let this = self.clone_parts();
        Box::new(
            self.mapped
                .shrink()
                .map(move |mapped| this.with(this.base.clone(), mapped)),
        )
    }

    fn clone_parts(&self) -> Self {
        Self {
            base: self.base.clone(),
            factory: self.factory.clone(),
            seed: self.seed,
            mapped: self.mapped.clone(),
        }
    }
}

impl<T: 'static, U: 'static> Shrinkable<U> for FlatMappedShrinkable<T, U> {
    fn value(&self) -> U {
        self.mapped.value()
    }

    fn shrink(&self) -> Candidates<U> {
        let this = self.clone_parts();
        let shrink_base: CandidateSupplier<U> = Box::new(move || this.shrink_base());
        let this = self.clone_parts();
        let shrink_mapped: CandidateSupplier<U> = Box::new(move || this.shrink_mapped());
        concat_lazily(vec![shrink_base, shrink_mapped])
    }

    fn distance(&self) -> ShrinkingDistance {
        self.base.distance().append(&self.mapped.distance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationResult;
    use crate::generator::{BoxedGenerator, RandomGenerator};
    use crate::shrinkable::{ShrinkableBigInt, map_shrinkable};
    use num_bigint::BigInt;
    use rand::{Rng, RngCore};
    use std::sync::Arc;

    fn int(value: i64, max: i64) -> ShrinkableRef<BigInt> {
        Rc::new(ShrinkableBigInt::new(
            BigInt::from(value),
            BigInt::from(0),
            BigInt::from(max),
            BigInt::from(0),
        ))
    }

    /// Pairs of a bound and a value between zero and the bound
    fn up_to(bound: BigInt) -> BoxedGenerator<(BigInt, BigInt)> {
        Box::new(
            move |rng: &mut dyn RngCore| -> GenerationResult<ShrinkableRef<(BigInt, BigInt)>> {
                let max = i64::try_from(&bound).unwrap_or(0);
                let bound = bound.clone();
                Ok(map_shrinkable(
                    int(rng.gen_range(0..=max), max),
                    Arc::new(move |value: BigInt| (bound.clone(), value)),
                ))
            },
        )
    }

    fn flat_mapped(base: i64, seed: u64) -> FlatMappedShrinkable<BigInt, (BigInt, BigInt)> {
        let factory: GeneratorFactory<BigInt, (BigInt, BigInt)> = Arc::new(up_to);
        let mapped = factory(BigInt::from(base))
            .next(&mut XorShiftRng::new(seed))
            .unwrap();
        FlatMappedShrinkable::new(int(base, 100), factory, seed, mapped)
    }

    #[test]
    fn test_value_and_distance() {
        let shrinkable = flat_mapped(40, 7);
        let (bound, value) = shrinkable.value();
        assert_eq!(bound, BigInt::from(40));
        assert!(value <= bound);
        let expected = ShrinkingDistance::of(&[40]).append(&shrinkable.mapped.distance());
        assert_eq!(shrinkable.distance(), expected);
    }

    #[test]
    fn test_candidates_never_exceed_parent_distance() {
        for seed in 0..20 {
            let shrinkable = flat_mapped(60, seed);
            let distance = shrinkable.distance();
            for candidate in shrinkable.shrink().take(200) {
                assert!(candidate.distance() <= distance, "seed {}", seed);
            }
        }
    }

    #[test]
    fn test_base_candidates_regenerate_from_recorded_seed() {
        let seed = 42;
        let shrinkable = flat_mapped(30, seed);
        let base_candidates: Vec<(BigInt, BigInt)> = shrinkable
            .shrink()
            .map(|candidate| candidate.value())
            .take_while(|(bound, _)| bound != &BigInt::from(30))
            .collect();
        assert!(!base_candidates.is_empty());

        for (bound, value) in base_candidates {
            assert!(value >= BigInt::from(0) && value <= bound);
            let regenerated = up_to(bound.clone())
                .next(&mut XorShiftRng::new(seed))
                .unwrap()
                .value();
            assert_eq!(regenerated, (bound, value));
        }
    }

    #[test]
    fn test_dependent_value_shrinks_after_base() {
        let shrinkable = flat_mapped(25, 3);
        let (_, original) = shrinkable.value();
        let last = shrinkable.shrink().last().map(|candidate| candidate.value());
        if original > BigInt::from(0) {
            let (bound, value) = last.unwrap();
            assert_eq!(bound, BigInt::from(25));
            assert!(value < original);
        }
    }
}
