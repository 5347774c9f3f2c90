//! Decimal values with a fixed number of fractional digits.
//!
//! A [`Decimal`] is an unscaled arbitrary-precision integer plus a scale, the
//! number of digits after the decimal point. Decimal arbitraries generate the
//! unscaled value with the integral machinery; the range borders are rounded
//! inwards to the requested scale.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use crate::arbitrary::Arbitrary;
use crate::distribution::RandomDistribution;
use crate::error::{GenerationError, GenerationResult};
use crate::exhaustive::{self, ExhaustiveRef};
use crate::generator::{BoxedGenerator, MapGenerator};
use crate::integral::IntegralSpace;
use crate::shrinkable::{Mapper, ShrinkableRef, map_shrinkable};

/// Default number of fractional digits of generated decimals
pub const DEFAULT_SCALE: u32 = 2;

/// Rounding applied when a decimal loses fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Towards negative infinity
    Floor,
    /// Towards positive infinity
    Ceiling,
}

/// Decimal number `unscaled * 10^-scale`
///
/// Equality is representational: `1.0` and `1.00` are different values.
/// Use [`Decimal::compare`] for numeric comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decimal {
    unscaled: BigInt,
    scale: u32,
}

/// Error returned when parsing a decimal fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDecimalError {
    input: String,
}

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid decimal: '{}'", self.input)
    }
}

impl std::error::Error for ParseDecimalError {}

fn power_of_ten(exponent: u32) -> BigInt {
    BigInt::from(10).pow(exponent)
}

impl Decimal {
    pub fn new(unscaled: impl Into<BigInt>, scale: u32) -> Self {
        Self {
            unscaled: unscaled.into(),
            scale,
        }
    }

    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Same number with a different scale; losing digits rounds as requested
    pub fn with_scale(&self, scale: u32, rounding: Rounding) -> Decimal {
        match scale.cmp(&self.scale) {
            Ordering::Equal => self.clone(),
            Ordering::Greater => Decimal::new(
                &self.unscaled * power_of_ten(scale - self.scale),
                scale,
            ),
            Ordering::Less => {
                let divisor = power_of_ten(self.scale - scale);
                // `/` and `%` truncate towards zero
                let mut quotient = &self.unscaled / &divisor;
                let remainder = &self.unscaled % &divisor;
                if !remainder.is_zero() {
                    match rounding {
                        Rounding::Floor if self.unscaled.is_negative() => quotient -= BigInt::one(),
                        Rounding::Ceiling if self.unscaled.is_positive() => quotient += BigInt::one(),
                        _ => {}
                    }
                }
                Decimal::new(quotient, scale)
            }
        }
    }

    /// Numeric comparison regardless of scale
    pub fn compare(&self, other: &Decimal) -> Ordering {
        let scale = self.scale.max(other.scale);
        let left = self.with_scale(scale, Rounding::Floor);
        let right = other.with_scale(scale, Rounding::Floor);
        left.unscaled.cmp(&right.unscaled)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::new(value, 0)
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseDecimalError {
            input: s.to_string(),
        };
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (integer, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (integer.is_empty() && fraction.is_empty()) || !all_digits(integer) || !all_digits(fraction)
        {
            return Err(error());
        }
        let joined = format!("{}{}", integer, fraction);
        let magnitude = BigInt::from_str(if joined.is_empty() { "0" } else { &joined })
            .map_err(|_| error())?;
        let scale = u32::try_from(fraction.len()).map_err(|_| error())?;
        Ok(Decimal::new(if negative { -magnitude } else { magnitude }, scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.abs().to_string();
        let sign = if self.unscaled.is_negative() { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, integer, fraction)
    }
}

/// Decimals with a fixed scale in a closed range
#[derive(Debug, Clone)]
pub struct DecimalArbitrary {
    min: Decimal,
    max: Decimal,
    scale: u32,
    target: Option<Decimal>,
    distribution: RandomDistribution,
}

/// Decimals with two fractional digits in `[-1_000_000_000, 1_000_000_000]`
pub fn decimals() -> DecimalArbitrary {
    DecimalArbitrary {
        min: Decimal::from(-1_000_000_000),
        max: Decimal::from(1_000_000_000),
        scale: DEFAULT_SCALE,
        target: None,
        distribution: RandomDistribution::default(),
    }
}

impl DecimalArbitrary {
    pub fn between(&self, min: Decimal, max: Decimal) -> Self {
        Self {
            min,
            max,
            ..self.clone()
        }
    }

    /// Number of fractional digits of every generated value
    pub fn of_scale(&self, scale: u32) -> Self {
        Self {
            scale,
            ..self.clone()
        }
    }

    pub fn shrink_towards(&self, target: Decimal) -> Self {
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

    /// Unscaled range; the lower border is rounded up and the upper border down
    fn space(&self) -> GenerationResult<IntegralSpace> {
        if self.min.compare(&self.max) == Ordering::Greater {
            return Err(GenerationError::invalid_field(
                "min",
                format!("min <{}> must not be larger than max <{}>", self.min, self.max),
            ));
        }
        let min = self.min.with_scale(self.scale, Rounding::Ceiling);
        let max = self.max.with_scale(self.scale, Rounding::Floor);
        if min.unscaled > max.unscaled {
            return Err(GenerationError::invalid_field(
                "scale",
                format!(
                    "no decimal of scale {} lies within [{}, {}]",
                    self.scale, self.min, self.max
                ),
            ));
        }
        let target = self
            .target
            .as_ref()
            .map(|target| target.with_scale(self.scale, Rounding::Floor).unscaled);
        IntegralSpace::new(min.unscaled, max.unscaled, target)
    }

    fn to_decimal(&self) -> Mapper<BigInt, Decimal> {
        let scale = self.scale;
        Arc::new(move |unscaled: BigInt| Decimal::new(unscaled, scale))
    }
}

impl Arbitrary<Decimal> for DecimalArbitrary {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<Decimal>> {
        let unscaled = self.space()?.generator(gen_size, self.distribution)?;
        Ok(Box::new(MapGenerator::new(
            Box::new(unscaled),
            self.to_decimal(),
        )))
    }

    fn exhaustive(&self, max_number_of_samples: u64) -> Option<ExhaustiveRef<Decimal>> {
        let range = self.space().ok()?.exhaustive(max_number_of_samples)?;
        Some(exhaustive::map(range, self.to_decimal()))
    }

    fn edge_cases(&self, max_edge_cases: usize) -> Vec<ShrinkableRef<Decimal>> {
        let Ok(space) = self.space() else {
            return Vec::new();
        };
        let mapper = self.to_decimal();
        space
            .edge_cases(max_edge_cases)
            .into_iter()
            .map(|edge| map_shrinkable(edge, mapper.clone()))
            .collect()
    }
}
