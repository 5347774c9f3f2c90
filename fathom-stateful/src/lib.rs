//! # Fathom Stateful
//!
//! Generation and shrinking of state-dependent chains for fathom. A chain
//! starts from an initial state and applies transformers one after the other.
//! Which transformer comes next may depend on the current state.
//!
//! ## Features
//!
//! - **Chains**: Weighted transformations, dependent on the state or not
//! - **Action Chains**: Actions with preconditions, invariants and peekers
//! - **Replay**: Recorded steps are replayed deterministically from a seed
//! - **Shrinking**: Shorter chains, smaller steps and dropped no-op steps
//!
//! ## Quick Example
//!
//! ```rust
//! use fathom_stateful::prelude::*;
//! use fathom::{Arbitrary, ArbitraryExt, RandomGenerator, Shrinkable, XorShiftRng, integers};
//!
//! struct Push;
//!
//! impl Action<Vec<i32>> for Push {
//!     fn transformer(&self, _state: &StateAccess<'_, Vec<i32>>) -> fathom::ArbitraryRef<Transformer<Vec<i32>>> {
//!         integers::<i32>()
//!             .between(0, 9)
//!             .map(|value| {
//!                 Transformer::mutate(format!("push {}", value), move |stack: &mut Vec<i32>| {
//!                     stack.push(value)
//!                 })
//!             })
//!             .boxed()
//!     }
//! }
//!
//! # fn main() {
//! let stacks = action_chains(Vec::new)
//!     .with_action(2, Push)
//!     .with_action(
//!         1,
//!         just_action("pop", |mut stack: Vec<i32>| {
//!             stack.pop();
//!             stack
//!         })
//!         .when(|stack: &Vec<i32>| !stack.is_empty()),
//!     )
//!     .with_max_transformations(8);
//!
//! let generator = stacks.generator(100).unwrap();
//! let mut chain = generator
//!     .next(&mut XorShiftRng::new(42))
//!     .unwrap()
//!     .value()
//!     .with_invariant("digits only", |stack: &Vec<i32>| stack.iter().all(|v| *v < 10));
//!
//! let stack = chain.run().unwrap();
//! assert!(stack.len() <= 8);
//! assert_eq!(chain.transformations().len(), 8);
//! # }
//! ```

pub mod action;
pub mod chain;
pub mod change_detector;
pub mod error;
mod shrinking;
pub mod transformer;

pub use action::{
    Action, ActionChain, ActionChainArbitrary, JustAction, RunningState, action_chains,
    just_action,
};
pub use chain::{Chain, ChainArbitrary, MAX_TRANSFORMATION_TRIES, chains};
pub use change_detector::{AlwaysChanged, ChangeDetector, EqualityChangeDetector};
pub use error::ChainError;
pub use transformer::{END_OF_CHAIN, StateAccess, Transformation, Transformer};

/// Re-exports for convenient imports
pub mod prelude {
    pub use crate::action::*;
    pub use crate::chain::{Chain, ChainArbitrary, chains};
    pub use crate::change_detector::*;
    pub use crate::error::*;
    pub use crate::transformer::*;
}
