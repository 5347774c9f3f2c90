//! Action chains: chains of actions checked against invariants
//!
//! An [`Action`] decides whether it applies to a state and which transformers
//! it offers for it. [`ActionChain`] runs the generated chain, calls every
//! peeker and checks every invariant after each transformation.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use fathom::generator::MapGenerator;
use fathom::shrinkable::Predicate;
use fathom::{Arbitrary, ArbitraryExt, ArbitraryRef, BoxedGenerator, GenerationResult, just};
use log::{debug, trace};

use crate::chain::{Chain, ChainArbitrary, chains};
use crate::change_detector::ChangeDetector;
use crate::error::ChainError;
use crate::transformer::{StateAccess, Transformation, Transformer};

/// A kind of state change offered to an action chain
pub trait Action<T>: Send + Sync {
    /// Whether the action applies to the current state
    ///
    /// Reading the state through `state` makes the step depend on all steps
    /// before it.
    fn precondition(&self, _state: &StateAccess<'_, T>) -> bool {
        true
    }

    /// The transformers this action offers for the current state
    fn transformer(&self, state: &StateAccess<'_, T>) -> ArbitraryRef<Transformer<T>>;

    fn description(&self) -> String {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name).to_string()
    }
}

/// An action that always applies the same transformer
pub struct JustAction<T> {
    transformer: Transformer<T>,
    precondition: Option<Predicate<T>>,
}

/// Action applying `f` under the given description
pub fn just_action<T: 'static>(
    description: impl Into<String>,
    f: impl Fn(T) -> T + Send + Sync + 'static,
) -> JustAction<T> {
    JustAction::new(Transformer::transform(description, f))
}

impl<T: 'static> JustAction<T> {
    pub fn new(transformer: Transformer<T>) -> Self {
        Self {
            transformer,
            precondition: None,
        }
    }

    /// Only apply to states accepted by `precondition`
    pub fn when(self, precondition: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            precondition: Some(Arc::new(precondition)),
            ..self
        }
    }
}

impl<T: 'static> Action<T> for JustAction<T> {
    fn precondition(&self, state: &StateAccess<'_, T>) -> bool {
        match &self.precondition {
            Some(precondition) => precondition(state.get()),
            None => true,
        }
    }

    fn transformer(&self, _state: &StateAccess<'_, T>) -> ArbitraryRef<Transformer<T>> {
        just(self.transformer.clone()).boxed()
    }

    fn description(&self) -> String {
        self.transformer.description().to_string()
    }
}

impl<T: 'static> Transformation<T> {
    /// Offer the transformers of `action` whenever its precondition holds
    pub fn from_action(action: Arc<dyn Action<T>>) -> Self {
        let replayed = action.clone();
        Transformation::new(move |state: &StateAccess<'_, T>| {
            if action.precondition(state) {
                Some(action.transformer(state))
            } else {
                trace!("Action {} does not apply", action.description());
                None
            }
        })
        .replayed_only_if(Arc::new(move |state: &T| {
            let accessed = Cell::new(false);
            replayed.precondition(&StateAccess::new(state, &accessed))
        }))
    }
}

/// Arbitrary of [`ActionChain`]s
pub struct ActionChainArbitrary<T> {
    chains: ChainArbitrary<T>,
}

impl<T> Clone for ActionChainArbitrary<T> {
    fn clone(&self) -> Self {
        Self {
            chains: self.chains.clone(),
        }
    }
}

/// Action chains starting from the state supplied by `initial`
pub fn action_chains<T: 'static>(
    initial: impl Fn() -> T + Send + Sync + 'static,
) -> ActionChainArbitrary<T> {
    ActionChainArbitrary {
        chains: chains(initial),
    }
}

impl<T: 'static> ActionChainArbitrary<T> {
    /// Add an action chosen with the given relative weight
    pub fn with_action(&self, weight: u32, action: impl Action<T> + 'static) -> Self {
        self.with_transformation(weight, Transformation::from_action(Arc::new(action)))
    }

    /// Add a raw transformation next to the actions
    pub fn with_transformation(&self, weight: u32, transformation: Transformation<T>) -> Self {
        Self {
            chains: self.chains.with_transformation(weight, transformation),
        }
    }

    pub fn with_max_transformations(&self, max_transformations: usize) -> Self {
        Self {
            chains: self.chains.with_max_transformations(max_transformations),
        }
    }

    /// Run until an action ends the chain
    pub fn infinite(&self) -> Self {
        Self {
            chains: self.chains.infinite(),
        }
    }

    pub fn improve_shrinking_with<D>(
        &self,
        supplier: impl Fn() -> D + Send + Sync + 'static,
    ) -> Self
    where
        D: ChangeDetector<T> + 'static,
    {
        Self {
            chains: self.chains.improve_shrinking_with(supplier),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ActionChainArbitrary<T> {
    pub fn detect_changes_by_equality(&self) -> Self {
        Self {
            chains: self.chains.detect_changes_by_equality(),
        }
    }
}

impl<T: 'static> Arbitrary<ActionChain<T>> for ActionChainArbitrary<T> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<ActionChain<T>>> {
        Ok(Box::new(MapGenerator::new(
            self.chains.generator(gen_size)?,
            Arc::new(ActionChain::new),
        )))
    }
}

/// Progress of an [`ActionChain`] run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningState {
    NotRun,
    Running,
    Failed,
    Succeeded,
}

struct Invariant<T> {
    label: String,
    check: Rc<dyn Fn(&T) -> bool>,
}

impl<T> Clone for Invariant<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            check: self.check.clone(),
        }
    }
}

/// A generated chain together with the invariants it has to keep
pub struct ActionChain<T> {
    chain: Chain<T>,
    invariants: Vec<Invariant<T>>,
    peekers: Vec<Rc<dyn Fn(&T)>>,
    running: RunningState,
}

impl<T: 'static> ActionChain<T> {
    pub fn new(chain: Chain<T>) -> Self {
        Self {
            chain,
            invariants: Vec::new(),
            peekers: Vec::new(),
            running: RunningState::NotRun,
        }
    }

    /// Check `invariant` after every transformation
    pub fn with_invariant(
        mut self,
        label: impl Into<String>,
        invariant: impl Fn(&T) -> bool + 'static,
    ) -> Self {
        self.invariants.push(Invariant {
            label: label.into(),
            check: Rc::new(invariant),
        });
        self
    }

    /// Look at the initial state and at every transformed state
    pub fn peek(mut self, peeker: impl Fn(&T) + 'static) -> Self {
        self.peekers.push(Rc::new(peeker));
        self
    }

    pub fn transformations(&self) -> &[String] {
        self.chain.transformations()
    }

    pub fn max_transformations(&self) -> usize {
        self.chain.max_transformations()
    }

    pub fn running(&self) -> RunningState {
        self.running
    }

    /// The state the last run stopped at
    pub fn final_state(&self) -> Option<&T> {
        match self.running {
            RunningState::NotRun => None,
            _ => self.chain.state(),
        }
    }

    fn run_steps(&mut self) -> Result<(), ChainError> {
        if let Some(initial) = self.chain.state() {
            for peeker in &self.peekers {
                peeker(initial);
            }
        }
        loop {
            let violated = match self.chain.step()? {
                None => return Ok(()),
                Some(state) => {
                    for peeker in &self.peekers {
                        peeker(state);
                    }
                    self.invariants
                        .iter()
                        .find(|invariant| !(invariant.check)(state))
                        .map(|invariant| invariant.label.clone())
                }
            };
            if let Some(label) = violated {
                let transformations = self.chain.transformations().to_vec();
                return Err(ChainError::InvariantViolated {
                    label,
                    message: format!(
                        "failed after {} transformations",
                        transformations.len()
                    ),
                    transformations,
                });
            }
        }
    }
}

impl<T: Clone + 'static> ActionChain<T> {
    /// Run the chain to its end and return the final state
    ///
    /// Fails on the first violated invariant. A chain can only be run once;
    /// clone it to run it again from the initial state.
    pub fn run(&mut self) -> Result<T, ChainError> {
        if self.running != RunningState::NotRun {
            self.chain = self.chain.clone();
        }
        self.running = RunningState::Running;
        match self.run_steps() {
            Ok(()) => {
                self.running = RunningState::Succeeded;
                debug!(
                    "Action chain succeeded after {} transformations",
                    self.chain.count_transformations()
                );
                let step = self.chain.count_transformations();
                self.chain
                    .state()
                    .cloned()
                    .ok_or(ChainError::Interrupted { step })
            }
            Err(error) => {
                self.running = RunningState::Failed;
                debug!("Action chain failed: {}", error);
                Err(error)
            }
        }
    }
}

impl<T: 'static> Clone for ActionChain<T> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            invariants: self.invariants.clone(),
            peekers: self.peekers.clone(),
            running: RunningState::NotRun,
        }
    }
}

impl<T: 'static> fmt::Debug for ActionChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionChain")
            .field("running", &self.running)
            .field("transformations", &self.chain.transformations())
            .field("invariants", &self.invariants.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom::{RandomGenerator, Shrinkable, XorShiftRng, integers};
    use std::cell::RefCell;

    struct Push;

    impl Action<Vec<i32>> for Push {
        fn transformer(&self, _state: &StateAccess<'_, Vec<i32>>) -> ArbitraryRef<Transformer<Vec<i32>>> {
            integers::<i32>()
                .between(0, 100)
                .map(|value| {
                    Transformer::mutate(format!("push {}", value), move |stack: &mut Vec<i32>| {
                        stack.push(value)
                    })
                })
                .boxed()
        }
    }

    fn generate<T: 'static>(arbitrary: &ActionChainArbitrary<T>, seed: u64) -> ActionChain<T> {
        let generator = arbitrary.generator(100).unwrap();
        generator.next(&mut XorShiftRng::new(seed)).unwrap().value()
    }

    #[test]
    fn test_successful_run() {
        let arbitrary = action_chains(Vec::new)
            .with_action(1, Push)
            .with_max_transformations(5);
        let mut chain = generate(&arbitrary, 4);
        assert_eq!(chain.running(), RunningState::NotRun);
        assert!(chain.final_state().is_none());

        let stack = chain.run().unwrap();
        assert_eq!(stack.len(), 5);
        assert_eq!(chain.running(), RunningState::Succeeded);
        assert_eq!(chain.final_state(), Some(&stack));
        assert_eq!(chain.transformations().len(), 5);
        assert!(chain.transformations().iter().all(|t| t.starts_with("push ")));
    }

    #[test]
    fn test_preconditions_select_actions() {
        let arbitrary = action_chains(String::new)
            .with_action(
                1,
                just_action("x", |s: String| s + "x").when(|s: &String| s.len() < 5),
            )
            .with_action(
                1,
                just_action("y", |s: String| s + "y").when(|s: &String| s.len() >= 5),
            )
            .with_max_transformations(10);
        let mut chain = generate(&arbitrary, 17);
        assert_eq!(chain.run().unwrap(), "xxxxxyyyyy");
    }

    #[test]
    fn test_violated_invariant_fails_run() {
        let arbitrary = action_chains(|| 0i32)
            .with_action(1, just_action("inc", |n: i32| n + 1))
            .with_max_transformations(10);
        let mut chain = generate(&arbitrary, 5).with_invariant("below three", |n: &i32| *n < 3);

        let error = chain.run().unwrap_err();
        assert_eq!(chain.running(), RunningState::Failed);
        assert_eq!(chain.final_state(), Some(&3));
        match &error {
            ChainError::InvariantViolated {
                label,
                transformations,
                ..
            } => {
                assert_eq!(label, "below three");
                assert_eq!(transformations, &["inc", "inc", "inc"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(error.outcome().is_falsified());
    }

    #[test]
    fn test_peekers_see_initial_and_every_state() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = seen.clone();
        let arbitrary = action_chains(|| 1i32)
            .with_action(1, just_action("double", |n: i32| n * 2))
            .with_max_transformations(4);
        let mut chain = generate(&arbitrary, 8).peek(move |n: &i32| recorder.borrow_mut().push(*n));

        assert_eq!(chain.run().unwrap(), 16);
        assert_eq!(*seen.borrow(), vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn test_clone_runs_again_from_start() {
        let arbitrary = action_chains(Vec::new)
            .with_action(1, Push)
            .with_max_transformations(6);
        let mut chain = generate(&arbitrary, 21).with_invariant("short", |s: &Vec<i32>| s.len() <= 6);
        let first = chain.run().unwrap();

        let mut copy = chain.clone();
        assert_eq!(copy.running(), RunningState::NotRun);
        assert_eq!(copy.run().unwrap(), first);
        assert_eq!(copy.transformations(), chain.transformations());

        assert_eq!(chain.run().unwrap(), first);
    }

    #[test]
    fn test_action_description() {
        assert_eq!(Action::<Vec<i32>>::description(&Push), "Push");
        assert_eq!(just_action("inc", |n: i32| n + 1).description(), "inc");
    }

    #[test]
    fn test_action_precondition_is_checked_on_replay() {
        let pop = Transformation::from_action(Arc::new(
            just_action("pop", |mut stack: Vec<i32>| {
                stack.pop();
                stack
            })
            .when(|stack: &Vec<i32>| !stack.is_empty()),
        ));
        let precondition = pop.precondition().unwrap();
        assert!(!precondition(&Vec::new()));
        assert!(precondition(&vec![1]));
    }
}
