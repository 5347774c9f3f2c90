//! Streams of random samples with edge cases injected.

use std::fmt;
use std::str::FromStr;

use log::debug;
use rand::{Rng, RngCore};

use crate::arbitrary::Arbitrary;
use crate::error::{GenerationError, GenerationResult};
use crate::generator::{BoxedGenerator, RandomGenerator};
use crate::rng::XorShiftRng;
use crate::shrinkable::ShrinkableRef;

/// Lower bound on the number of edge cases considered per arbitrary
pub const MIN_EDGE_CASES: usize = 10;

/// How edge cases are mixed into a random sample stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeCasesMode {
    /// All edge cases come before any random value
    First,
    /// Edge cases are interleaved with random values
    #[default]
    Mixin,
    /// No edge cases at all
    None,
}

impl fmt::Display for EdgeCasesMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeCasesMode::First => "FIRST",
            EdgeCasesMode::Mixin => "MIXIN",
            EdgeCasesMode::None => "NONE",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for EdgeCasesMode {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIRST" => Ok(EdgeCasesMode::First),
            "MIXIN" => Ok(EdgeCasesMode::Mixin),
            "NONE" => Ok(EdgeCasesMode::None),
            other => Err(GenerationError::invalid_field(
                "edge_cases",
                format!("unknown edge cases mode <{}>", other),
            )),
        }
    }
}

/// One in how many samples is an edge case in [`EdgeCasesMode::Mixin`]
pub fn base_to_edge_case_ratio(gen_size: usize) -> u32 {
    let ratio = (gen_size / 5).clamp(3, 20) as u32;
    ratio + 1
}

/// Upper bound on the number of edge cases collected for a generation size
pub fn max_edge_cases(gen_size: usize) -> usize {
    gen_size.max(MIN_EDGE_CASES)
}

/// Endless stream of shrinkables drawn from an arbitrary
///
/// The stream owns its random source; two streams created with the same
/// arbitrary, generation size, seed and mode produce identical samples.
pub struct RandomizedShrinkables<T> {
    generator: BoxedGenerator<T>,
    edge_cases: Vec<ShrinkableRef<T>>,
    mode: EdgeCasesMode,
    ratio: u32,
    next_edge_case: usize,
    rng: XorShiftRng,
}

impl<T: 'static> RandomizedShrinkables<T> {
    pub fn new(
        arbitrary: &dyn Arbitrary<T>,
        gen_size: usize,
        rng: XorShiftRng,
        mode: EdgeCasesMode,
    ) -> GenerationResult<Self> {
        let generator = arbitrary.generator(gen_size)?;
        let edge_cases = match mode {
            EdgeCasesMode::None => Vec::new(),
            EdgeCasesMode::First | EdgeCasesMode::Mixin => {
                arbitrary.edge_cases(max_edge_cases(gen_size))
            }
        };
        debug!(
            "Sampling with {} edge cases in mode {}",
            edge_cases.len(),
            mode
        );
        Ok(Self {
            generator,
            edge_cases,
            mode,
            ratio: base_to_edge_case_ratio(gen_size),
            next_edge_case: 0,
            rng,
        })
    }

    /// Number of edge cases this stream may inject
    pub fn edge_cases_total(&self) -> usize {
        self.edge_cases.len()
    }

    fn next_shrinkable(&mut self) -> GenerationResult<ShrinkableRef<T>> {
        match self.mode {
            EdgeCasesMode::First if self.next_edge_case < self.edge_cases.len() => {
                let edge_case = self.edge_cases[self.next_edge_case].clone();
                self.next_edge_case += 1;
                Ok(edge_case)
            }
            EdgeCasesMode::Mixin
                if !self.edge_cases.is_empty() && self.rng.gen_range(0..self.ratio) == 0 =>
            {
                let index = self.rng.gen_range(0..self.edge_cases.len());
                Ok(self.edge_cases[index].clone())
            }
            _ => self.generator.next(&mut self.rng as &mut dyn RngCore),
        }
    }
}

impl<T: 'static> Iterator for RandomizedShrinkables<T> {
    type Item = GenerationResult<ShrinkableRef<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_shrinkable())
    }
}
