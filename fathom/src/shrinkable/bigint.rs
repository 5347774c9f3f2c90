use std::iter;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::Signed;

use super::{Candidates, Shrinkable, ShrinkableRef, ShrinkingDistance};
use crate::distribution::saturating_distance;

#[derive(Debug)]
struct IntegralBounds {
    min: BigInt,
    max: BigInt,
    target: BigInt,
}

/// Arbitrary-precision integer shrinking towards a target inside its range
///
/// Candidates, in order: the target itself, then values approaching the
/// target by successively halved steps down to a single step. A value below
/// the target additionally offers its mirror image above the target.
#[derive(Debug, Clone)]
pub struct ShrinkableBigInt {
    value: BigInt,
    bounds: Rc<IntegralBounds>,
}

impl ShrinkableBigInt {
    /// The target is clamped into `[min, max]`
    pub fn new(value: BigInt, min: BigInt, max: BigInt, target: BigInt) -> Self {
        let target = target.clamp(min.clone(), max.clone());
        Self {
            value,
            bounds: Rc::new(IntegralBounds { min, max, target }),
        }
    }

    pub fn target(&self) -> &BigInt {
        &self.bounds.target
    }

    fn with_value(&self, value: BigInt) -> ShrinkableRef<BigInt> {
        Rc::new(ShrinkableBigInt {
            value,
            bounds: self.bounds.clone(),
        })
    }
}

impl Shrinkable<BigInt> for ShrinkableBigInt {
    fn value(&self) -> BigInt {
        self.value.clone()
    }

    fn shrink(&self) -> Candidates<BigInt> {
        let target = &self.bounds.target;
        if &self.value == target {
            return Box::new(iter::empty());
        }

        let difference = &self.value - target;
        let below_target = difference.is_negative();
        let magnitude = difference.abs();
        let bits = magnitude.bits() as usize;

        let this = self.clone();
        let approaching = (0..bits).map(move |halvings| {
            let step: BigInt = &magnitude >> halvings;
            let candidate = if below_target {
                &this.value + step
            } else {
                &this.value - step
            };
            this.with_value(candidate)
        });

        let mirrored = if below_target {
            let mirror = target + target - &self.value;
            (mirror <= self.bounds.max && mirror >= self.bounds.min)
                .then(|| self.with_value(mirror))
        } else {
            None
        };

        Box::new(approaching.chain(mirrored))
    }

    fn distance(&self) -> ShrinkingDistance {
        ShrinkingDistance::of(&[saturating_distance(&self.value, &self.bounds.target)])
    }
}
