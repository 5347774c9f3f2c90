#![allow(clippy::result_large_err)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! # Fathom - Generation and Shrinking for Property-Based Testing
//!
//! Fathom produces test data for property-based tests and minimizes failing
//! samples. Values are generated randomly and reproducibly from a seed,
//! enumerated exhaustively when the value space is small enough, and shrunk
//! through lazily computed candidates ordered by a shrinking distance.
//!
//! ## Quick Start
//!
//! ```rust
//! use fathom::generator::RandomGenerator;
//! use fathom::{Arbitrary, ShrinkEngine, TryOutcome, XorShiftRng, integers};
//!
//! let arbitrary = integers::<i32>().between(0, 1000);
//! let generator = arbitrary.generator(100).unwrap();
//! let mut rng = XorShiftRng::new(42);
//! let sample = generator.next(&mut rng).unwrap();
//!
//! let result = ShrinkEngine::new().shrink(sample, |value: &i32| {
//!     if *value >= 10 {
//!         TryOutcome::Falsified(format!("{} is too large", value))
//!     } else {
//!         TryOutcome::Satisfied
//!     }
//! });
//! assert!(result.minimal <= 10);
//! ```

// Public modules
pub mod arbitrary;
pub mod combinatorics;
pub mod config;
pub mod decimal;
pub mod distribution;
pub mod error;
pub mod exhaustive;
pub mod generator;
pub mod integral;
pub mod parallel;
pub mod rng;
pub mod sampling;
pub mod shrink;
pub mod shrinkable;

// Re-export the main public API
pub use arbitrary::{
    Arbitrary, ArbitraryExt, ArbitraryRef, ListArbitrary, SetArbitrary, combine, combine2, just,
    of, shuffle, zip,
};
pub use config::{
    ConfigError, ConfigManager, EngineConfig, GenerationMode, get_global_config,
    set_global_config,
};
pub use decimal::{Decimal, DecimalArbitrary, decimals};
pub use distribution::{RandomDistribution, RandomNumericGenerator};
pub use error::{GenerationError, GenerationResult};
pub use exhaustive::{ExhaustiveGenerator, ExhaustiveRef};
pub use generator::{BoxedGenerator, RandomGenerator};
pub use integral::{IntegralArbitrary, big_integers, integers};
pub use parallel::{ParallelConfig, sample_parallel};
pub use rng::{DefaultRngProvider, RngProvider, Seed, XorShiftRng, create_seeded_rng};
pub use sampling::{EdgeCasesMode, RandomizedShrinkables};
pub use shrink::{ShrinkConfig, ShrinkEngine, ShrinkResult, ShrinkingMode, TryOutcome};
pub use shrinkable::{Shrinkable, ShrinkableRef, ShrinkingDistance};
