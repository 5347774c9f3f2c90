//! Random distributions for sampling arbitrary-precision integral ranges.
//!
//! A [`RandomDistribution`] is an immutable policy. Given the generation size,
//! the range and its center (the shrinking target) it creates a
//! [`RandomNumericGenerator`] which draws `BigInt` values from a random source.
//! Every generator stays within `[min, max]` for every draw.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, ToPrimitive, Zero};
use rand::{Rng, RngCore};

use crate::error::{GenerationError, GenerationResult};

/// Number of bits covered by one partition of an over-wide uniform range
const PARTITION_BITS: usize = 62;

/// Upper limit of redraws before a gaussian sample is clamped to the border
const MAX_GAUSSIAN_TRIES: usize = 100;

/// Default number of standard deviations between center and range border
pub const DEFAULT_BORDER_SIGMA: f64 = 3.0;

/// Policy controlling how numeric values are spread across a range
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RandomDistribution {
    /// Every value of the range is equally likely
    Uniform,
    /// Values close to the center are far more likely than values close to the borders
    Biased,
    /// Normal distribution around the center; the range border sits at
    /// `border_sigma` standard deviations
    Gaussian { border_sigma: f64 },
}

impl Default for RandomDistribution {
    fn default() -> Self {
        RandomDistribution::Biased
    }
}

impl fmt::Display for RandomDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandomDistribution::Uniform => write!(f, "UniformDistribution"),
            RandomDistribution::Biased => write!(f, "BiasedDistribution"),
            RandomDistribution::Gaussian { border_sigma } => {
                write!(f, "GaussianDistribution(borderSigma={})", border_sigma)
            }
        }
    }
}

impl RandomDistribution {
    /// Uniform distribution
    pub fn uniform() -> Self {
        RandomDistribution::Uniform
    }

    /// Biased distribution
    pub fn biased() -> Self {
        RandomDistribution::Biased
    }

    /// Gaussian distribution with the default border sigma of 3
    pub fn gaussian() -> Self {
        RandomDistribution::Gaussian {
            border_sigma: DEFAULT_BORDER_SIGMA,
        }
    }

    /// Gaussian distribution with a custom border sigma
    pub fn gaussian_with(border_sigma: f64) -> Self {
        RandomDistribution::Gaussian { border_sigma }
    }

    /// Create a numeric generator for `[min, max]` centered on `center`
    pub fn create_generator(
        &self,
        gen_size: usize,
        min: &BigInt,
        max: &BigInt,
        center: &BigInt,
    ) -> GenerationResult<Box<dyn RandomNumericGenerator>> {
        if min > max {
            return Err(GenerationError::invalid_field(
                "min",
                format!("min <{}> must not be larger than max <{}>", min, max),
            ));
        }
        if center < min || center > max {
            return Err(GenerationError::invalid_field(
                "center",
                format!("center <{}> must be within [{}, {}]", center, min, max),
            ));
        }
        match *self {
            RandomDistribution::Uniform => Ok(Box::new(UniformGenerator::new(min, max))),
            RandomDistribution::Biased => {
                Ok(Box::new(BiasedGenerator::new(gen_size, min, max, center)))
            }
            RandomDistribution::Gaussian { border_sigma } => {
                if !(border_sigma.is_finite() && border_sigma > 0.0) {
                    return Err(GenerationError::invalid_field(
                        "border_sigma",
                        format!("border sigma <{}> must be a positive number", border_sigma),
                    ));
                }
                Ok(Box::new(GaussianGenerator {
                    min: min.clone(),
                    max: max.clone(),
                    center: center.clone(),
                    border_sigma,
                }))
            }
        }
    }
}

/// Draws values of a fixed integral range
pub trait RandomNumericGenerator {
    /// Draw the next value
    fn next(&self, rng: &mut dyn RngCore) -> BigInt;
}

/// Uniformly draw a value in `[0, bound)`; `bound` must be positive.
///
/// Bounds beyond a machine word are split into partitions of `2^62` values.
/// A partition index is drawn uniformly (recursively) followed by an offset
/// inside the partition; offsets past the end of the last, shorter partition
/// are rejected so that the result stays exactly uniform.
pub fn uniform_below(rng: &mut dyn RngCore, bound: &BigUint) -> BigUint {
    if let Some(small) = bound.to_u64() {
        return BigUint::from(rng.gen_range(0..small));
    }
    let partition_size = BigUint::one() << PARTITION_BITS;
    let partitions = (bound + &partition_size - BigUint::one()) / &partition_size;
    loop {
        let index = uniform_below(rng, &partitions);
        let offset = rng.gen_range(0..(1u64 << PARTITION_BITS));
        let candidate = index * &partition_size + BigUint::from(offset);
        if &candidate < bound {
            return candidate;
        }
    }
}

/// Uniformly draw a value in `[min, max]`
pub fn uniform_between(rng: &mut dyn RngCore, min: &BigInt, max: &BigInt) -> BigInt {
    let span = (max - min).magnitude() + BigUint::one();
    min + BigInt::from(uniform_below(rng, &span))
}

/// Uniform distribution over the whole range
#[derive(Debug, Clone)]
pub struct UniformGenerator {
    min: BigInt,
    max: BigInt,
}

impl UniformGenerator {
    fn new(min: &BigInt, max: &BigInt) -> Self {
        Self {
            min: min.clone(),
            max: max.clone(),
        }
    }
}

impl RandomNumericGenerator for UniformGenerator {
    fn next(&self, rng: &mut dyn RngCore) -> BigInt {
        uniform_between(rng, &self.min, &self.max)
    }
}

/// Partitioned distribution with exponentially growing partitions around the center
#[derive(Debug, Clone)]
pub struct BiasedGenerator {
    partitions: Vec<(BigInt, BigInt)>,
}

impl BiasedGenerator {
    fn new(gen_size: usize, min: &BigInt, max: &BigInt, center: &BigInt) -> Self {
        Self {
            partitions: biased_partitions(gen_size, min, max, center),
        }
    }

    /// The inclusive partitions a value is drawn from
    pub fn partitions(&self) -> &[(BigInt, BigInt)] {
        &self.partitions
    }
}

impl RandomNumericGenerator for BiasedGenerator {
    fn next(&self, rng: &mut dyn RngCore) -> BigInt {
        let index = rng.gen_range(0..self.partitions.len());
        let (low, high) = &self.partitions[index];
        uniform_between(rng, low, high)
    }
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Split `[min, max]` into a central partition of `center ± 10` followed by
/// partitions reaching out to `center ± 10^k` on both sides. The outermost
/// partition on each side always extends to the border.
fn biased_partitions(
    gen_size: usize,
    min: &BigInt,
    max: &BigInt,
    center: &BigInt,
) -> Vec<(BigInt, BigInt)> {
    let per_side = (decimal_digits(gen_size) + 1).clamp(2, 40);
    let ten = BigInt::from(10);

    let central_low = (center - &ten).max(min.clone());
    let central_high = (center + &ten).min(max.clone());
    let mut partitions = vec![(central_low.clone(), central_high.clone())];

    let mut reached_low = central_low;
    let mut reached_high = central_high;
    let mut outer = ten.clone();
    for k in 2..=per_side {
        outer *= &ten;
        let last = k == per_side;

        if &reached_high < max {
            let low = &reached_high + BigInt::one();
            let high = if last {
                max.clone()
            } else {
                (center + &outer).min(max.clone())
            };
            partitions.push((low, high.clone()));
            reached_high = high;
        }
        if &reached_low > min {
            let high = &reached_low - BigInt::one();
            let low = if last {
                min.clone()
            } else {
                (center - &outer).max(min.clone())
            };
            partitions.push((low.clone(), high));
            reached_low = low;
        }
    }
    partitions
}

/// Normal distribution around the center, rescaled so the borders lie at
/// `border_sigma` standard deviations
#[derive(Debug, Clone)]
pub struct GaussianGenerator {
    min: BigInt,
    max: BigInt,
    center: BigInt,
    border_sigma: f64,
}

impl GaussianGenerator {
    fn standard_normal(rng: &mut dyn RngCore) -> f64 {
        // Box-Muller; u1 is kept away from zero so the logarithm is finite
        let u1 = 1.0 - (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        let u2 = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl RandomNumericGenerator for GaussianGenerator {
    fn next(&self, rng: &mut dyn RngCore) -> BigInt {
        let mut z = Self::standard_normal(rng);
        let mut tries = 1;
        while z.abs() > self.border_sigma && tries < MAX_GAUSSIAN_TRIES {
            z = Self::standard_normal(rng);
            tries += 1;
        }
        let factor = (z / self.border_sigma).clamp(-1.0, 1.0);

        let distance_to_border = if factor >= 0.0 {
            &self.max - &self.center
        } else {
            &self.center - &self.min
        };
        if distance_to_border.is_zero() {
            return self.center.clone();
        }

        // 53-bit fixed point keeps the offset exact for ranges of any width
        let numerator = BigInt::from((factor.abs() * (1u64 << 53) as f64).round() as u64);
        let offset: BigInt = (distance_to_border * numerator) >> 53usize;
        let value = if factor >= 0.0 {
            &self.center + offset
        } else {
            &self.center - offset
        };
        value.clamp(self.min.clone(), self.max.clone())
    }
}

/// Absolute difference of two big integers, saturated into a `u64`
pub fn saturating_distance(left: &BigInt, right: &BigInt) -> u64 {
    (left - right).abs().to_u64().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::XorShiftRng;

    fn big(value: i64) -> BigInt {
        BigInt::from(value)
    }

    fn draw_all(
        distribution: RandomDistribution,
        min: i64,
        max: i64,
        center: i64,
        draws: usize,
    ) -> Vec<i64> {
        let generator = distribution
            .create_generator(1000, &big(min), &big(max), &big(center))
            .unwrap();
        let mut rng = XorShiftRng::new(4711);
        (0..draws)
            .map(|_| generator.next(&mut rng).to_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_all_distributions_stay_in_range() {
        for distribution in [
            RandomDistribution::uniform(),
            RandomDistribution::biased(),
            RandomDistribution::gaussian(),
        ] {
            for value in draw_all(distribution, -100, 100, 0, 5000) {
                assert!((-100..=100).contains(&value), "{} out of range", value);
            }
            for value in draw_all(distribution, 5, 9, 7, 500) {
                assert!((5..=9).contains(&value));
            }
        }
    }

    #[test]
    fn test_singular_range() {
        for distribution in [
            RandomDistribution::uniform(),
            RandomDistribution::biased(),
            RandomDistribution::gaussian(),
        ] {
            assert!(draw_all(distribution, 3, 3, 3, 50).iter().all(|&v| v == 3));
        }
    }

    #[test]
    fn test_uniform_hits_every_third() {
        let values = draw_all(RandomDistribution::uniform(), -100, 100, 0, 10_000);
        assert!(values.iter().any(|&v| v < -33));
        assert!(values.iter().any(|&v| (-33..=33).contains(&v)));
        assert!(values.iter().any(|&v| v > 33));
    }

    #[test]
    fn test_biased_prefers_center() {
        let values = draw_all(RandomDistribution::biased(), -100_000, 100_000, 0, 10_000);
        let near_center = values.iter().filter(|v| v.abs() <= 100).count();
        let far_out = values.iter().filter(|v| v.abs() > 99_900).count();
        assert!(near_center > far_out * 5, "{} vs {}", near_center, far_out);
        assert!(values.iter().any(|v| v.abs() > 10_000));
    }

    #[test]
    fn test_gaussian_prefers_center() {
        let values = draw_all(RandomDistribution::gaussian(), -1000, 1000, 0, 10_000);
        let inner_third = values.iter().filter(|v| v.abs() <= 333).count();
        let outer_third = values.iter().filter(|v| v.abs() > 666).count();
        assert!(inner_third > outer_third * 3);
    }

    #[test]
    fn test_gaussian_with_off_center_target() {
        let values = draw_all(RandomDistribution::gaussian(), 0, 1000, 1000, 2000);
        assert!(values.iter().all(|v| (0..=1000).contains(v)));
        let upper = values.iter().filter(|&&v| v > 500).count();
        assert!(upper > values.len() / 2);
    }

    #[test]
    fn test_invalid_configurations_are_rejected() {
        let result = RandomDistribution::uniform().create_generator(10, &big(5), &big(3), &big(4));
        assert!(matches!(
            result,
            Err(GenerationError::InvalidConfiguration { .. })
        ));

        let result = RandomDistribution::biased().create_generator(10, &big(0), &big(3), &big(9));
        assert!(result.is_err());

        let result =
            RandomDistribution::gaussian_with(0.0).create_generator(10, &big(0), &big(3), &big(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_uniform_beyond_64_bits() {
        let min = -(BigInt::one() << 100usize);
        let max = BigInt::one() << 100usize;
        let generator = RandomDistribution::uniform()
            .create_generator(1000, &min, &max, &BigInt::zero())
            .unwrap();
        let mut rng = XorShiftRng::new(1);
        let mut saw_huge = false;
        for _ in 0..1000 {
            let value = generator.next(&mut rng);
            assert!(value >= min && value <= max);
            if value.abs() > BigInt::from(u64::MAX) {
                saw_huge = true;
            }
        }
        assert!(saw_huge);
    }

    #[test]
    fn test_biased_beyond_64_bits_stays_in_range() {
        let min = BigInt::zero();
        let max = BigInt::one() << 80usize;
        for distribution in [RandomDistribution::biased(), RandomDistribution::gaussian()] {
            let generator = distribution
                .create_generator(1000, &min, &max, &min)
                .unwrap();
            let mut rng = XorShiftRng::new(99);
            for _ in 0..1000 {
                let value = generator.next(&mut rng);
                assert!(value >= min && value <= max);
            }
        }
    }

    #[test]
    fn test_biased_partitions_cover_range_without_gaps() {
        let generator = BiasedGenerator::new(1000, &big(-5000), &big(300), &big(0));
        let mut partitions = generator.partitions().to_vec();
        partitions.sort();
        assert_eq!(partitions.first().unwrap().0, big(-5000));
        assert_eq!(partitions.last().unwrap().1, big(300));
        for window in partitions.windows(2) {
            assert_eq!(&window[0].1 + BigInt::one(), window[1].0);
        }
    }

    #[test]
    fn test_reproducible_for_same_seed() {
        let first = draw_all(RandomDistribution::biased(), -1000, 1000, 0, 100);
        let second = draw_all(RandomDistribution::biased(), -1000, 1000, 0, 100);
        assert_eq!(first, second);
    }
}
