//! Chains of state transformations generated on the fly
//!
//! A chain starts from a fresh initial state and asks its transformations for
//! the next transformer one step at a time, so that later steps can depend on
//! the state produced by earlier ones. Every generated step is recorded in a
//! log shared with the chain's shrinkable; replaying the chain reuses the
//! recorded steps and only generates new ones past the end of the log.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use fathom::shrinkable::{Candidates, Predicate};
use fathom::{
    Arbitrary, BoxedGenerator, GenerationError, GenerationResult, RandomGenerator, Shrinkable,
    ShrinkableRef, ShrinkingDistance, XorShiftRng,
};
use log::{debug, trace};
use rand::{Rng, RngCore};

use crate::change_detector::{AlwaysChanged, ChangeDetector, EqualityChangeDetector};
use crate::error::ChainError;
use crate::shrinking::ChainShrinker;
use crate::transformer::{StateAccess, Transformation, Transformer};

/// Tries to find an applicable transformation before a step is given up
pub const MAX_TRANSFORMATION_TRIES: usize = 1000;

/// Lower bound of the default chain length
const MIN_DEFAULT_TRANSFORMATIONS: usize = 10;

type InitialSupplier<T> = Arc<dyn Fn() -> T + Send + Sync>;
type DetectorSupplier<T> = Arc<dyn Fn() -> Box<dyn ChangeDetector<T>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainLength {
    /// Derived from the generation size
    Default,
    Max(usize),
    /// Only ended by an end-of-chain transformer
    Unbounded,
}

/// Arbitrary of chains starting from the same initial state
pub struct ChainArbitrary<T> {
    initial: InitialSupplier<T>,
    transformations: Vec<(u32, Transformation<T>)>,
    length: ChainLength,
    change_detector: DetectorSupplier<T>,
}

impl<T> Clone for ChainArbitrary<T> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            transformations: self.transformations.clone(),
            length: self.length,
            change_detector: self.change_detector.clone(),
        }
    }
}

/// Chains whose states are created by `initial`
pub fn chains<T: 'static>(initial: impl Fn() -> T + Send + Sync + 'static) -> ChainArbitrary<T> {
    ChainArbitrary::start_with(initial)
}

impl<T: 'static> ChainArbitrary<T> {
    pub fn start_with(initial: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            initial: Arc::new(initial),
            transformations: Vec::new(),
            length: ChainLength::Default,
            change_detector: Arc::new(|| Box::new(AlwaysChanged) as Box<dyn ChangeDetector<T>>),
        }
    }

    /// Add a transformation chosen with a probability proportional to `weight`
    pub fn with_transformation(&self, weight: u32, transformation: Transformation<T>) -> Self {
        let mut arbitrary = self.clone();
        arbitrary.transformations.push((weight, transformation));
        arbitrary
    }

    pub fn with_max_transformations(&self, max_transformations: usize) -> Self {
        let mut arbitrary = self.clone();
        arbitrary.length = ChainLength::Max(max_transformations);
        arbitrary
    }

    /// Chains that only end with an end-of-chain transformer
    pub fn infinite(&self) -> Self {
        let mut arbitrary = self.clone();
        arbitrary.length = ChainLength::Unbounded;
        arbitrary
    }

    /// Use change detectors from `supplier` to find no-op steps while shrinking
    pub fn improve_shrinking_with<D>(
        &self,
        supplier: impl Fn() -> D + Send + Sync + 'static,
    ) -> Self
    where
        D: ChangeDetector<T> + 'static,
    {
        let mut arbitrary = self.clone();
        arbitrary.change_detector =
            Arc::new(move || Box::new(supplier()) as Box<dyn ChangeDetector<T>>);
        arbitrary
    }

    fn max_transformations(&self, gen_size: usize) -> usize {
        match self.length {
            ChainLength::Default => {
                ((gen_size as f64).sqrt().round() as usize).max(MIN_DEFAULT_TRANSFORMATIONS)
            }
            ChainLength::Max(max) => max,
            ChainLength::Unbounded => usize::MAX,
        }
    }

    pub(crate) fn spec(&self, gen_size: usize) -> Rc<ChainSpec<T>> {
        Rc::new(ChainSpec {
            initial: self.initial.clone(),
            transformations: self.transformations.clone(),
            total_weight: self
                .transformations
                .iter()
                .map(|(weight, _)| u64::from(*weight))
                .sum(),
            change_detector: self.change_detector.clone(),
            gen_size,
        })
    }

    fn validate(&self) -> GenerationResult<()> {
        if self.transformations.is_empty() {
            return Err(GenerationError::invalid_field(
                "transformations",
                "a chain needs at least one transformation",
            ));
        }
        if let Some((weight, _)) = self.transformations.iter().find(|(weight, _)| *weight == 0) {
            return Err(GenerationError::invalid_field(
                "weight",
                format!("transformation weights must be positive, got {}", weight),
            ));
        }
        Ok(())
    }
}

impl<T: Clone + PartialEq + 'static> ChainArbitrary<T> {
    /// Treat transformations that leave an equal state behind as no-ops
    pub fn detect_changes_by_equality(&self) -> Self {
        self.improve_shrinking_with(EqualityChangeDetector::<T>::new)
    }
}

impl<T: 'static> Arbitrary<Chain<T>> for ChainArbitrary<T> {
    fn generator(&self, gen_size: usize) -> GenerationResult<BoxedGenerator<Chain<T>>> {
        self.validate()?;
        let spec = self.spec(gen_size);
        let max_transformations = self.max_transformations(gen_size);
        Ok(Box::new(
            move |rng: &mut dyn RngCore| -> GenerationResult<ShrinkableRef<Chain<T>>> {
                let seed = rng.next_u64();
                Ok(Rc::new(ShrinkableChain::new(
                    spec.clone(),
                    seed,
                    max_transformations,
                )))
            },
        ))
    }
}

/// Everything a chain needs to create new steps
pub(crate) struct ChainSpec<T> {
    initial: InitialSupplier<T>,
    transformations: Vec<(u32, Transformation<T>)>,
    total_weight: u64,
    change_detector: DetectorSupplier<T>,
    gen_size: usize,
}

impl<T: 'static> ChainSpec<T> {
    fn choose(&self, rng: &mut XorShiftRng) -> &Transformation<T> {
        let mut pick = rng.gen_range(0..self.total_weight);
        for (weight, transformation) in &self.transformations {
            let weight = u64::from(*weight);
            if pick < weight {
                return transformation;
            }
            pick -= weight;
        }
        // weights sum up to total_weight
        &self.transformations[self.transformations.len() - 1].1
    }
}

/// One recorded step of a chain
pub(crate) struct ChainIteration<T> {
    /// The transformer was chosen after reading the state
    pub(crate) accessed_state: bool,
    /// The change detector saw a different state after the last application
    pub(crate) changed_state: bool,
    pub(crate) shrinkable: ShrinkableRef<Transformer<T>>,
    pub(crate) precondition: Option<Predicate<T>>,
}

impl<T> Clone for ChainIteration<T> {
    fn clone(&self) -> Self {
        Self {
            accessed_state: self.accessed_state,
            changed_state: self.changed_state,
            shrinkable: self.shrinkable.clone(),
            precondition: self.precondition.clone(),
        }
    }
}

impl<T: 'static> ChainIteration<T> {
    pub(crate) fn with_shrinkable(&self, shrinkable: ShrinkableRef<Transformer<T>>) -> Self {
        Self {
            shrinkable,
            ..self.clone()
        }
    }

    fn description(&self) -> String {
        self.shrinkable.value().description().to_string()
    }
}

/// Recorded steps shared between a shrinkable chain and the chains it creates
pub(crate) struct ChainLog<T> {
    iterations: RefCell<Vec<ChainIteration<T>>>,
    /// Steps executed by the latest run, `None` if it never ran
    executed: Cell<Option<usize>>,
}

impl<T> ChainLog<T> {
    fn new(iterations: Vec<ChainIteration<T>>) -> Self {
        Self {
            iterations: RefCell::new(iterations),
            executed: Cell::new(None),
        }
    }

    fn get(&self, index: usize) -> Option<ChainIteration<T>> {
        self.iterations.borrow().get(index).cloned()
    }

    fn len(&self) -> usize {
        self.iterations.borrow().len()
    }

    /// The steps of the latest run, or all recorded steps if there was none
    pub(crate) fn executed_iterations(&self) -> Vec<ChainIteration<T>> {
        let iterations = self.iterations.borrow();
        let executed = self
            .executed
            .get()
            .map_or(iterations.len(), |executed| executed.min(iterations.len()));
        iterations[..executed].to_vec()
    }
}

/// A chain that runs through its transformations step by step
///
/// Cloning a chain yields a new chain that starts again from a fresh initial
/// state and replays the same steps.
pub struct Chain<T> {
    spec: Rc<ChainSpec<T>>,
    seed: u64,
    max_transformations: usize,
    log: Rc<ChainLog<T>>,
    rng: XorShiftRng,
    state: Option<T>,
    steps: usize,
    transformations: Vec<String>,
    ended: bool,
}

impl<T: 'static> Chain<T> {
    fn start(
        spec: Rc<ChainSpec<T>>,
        seed: u64,
        max_transformations: usize,
        log: Rc<ChainLog<T>>,
    ) -> Self {
        log.executed.set(Some(0));
        let state = (spec.initial)();
        Self {
            spec,
            seed,
            max_transformations,
            log,
            rng: XorShiftRng::new(seed),
            state: Some(state),
            steps: 0,
            transformations: Vec::new(),
            ended: false,
        }
    }

    /// The current state, `None` only after a transformer panicked
    pub fn state(&self) -> Option<&T> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<T> {
        self.state
    }

    pub fn max_transformations(&self) -> usize {
        self.max_transformations
    }

    /// Descriptions of the transformers applied so far
    pub fn transformations(&self) -> &[String] {
        &self.transformations
    }

    pub fn count_transformations(&self) -> usize {
        self.steps
    }

    pub fn has_ended(&self) -> bool {
        self.ended || self.steps >= self.max_transformations
    }

    /// Apply the next transformer
    ///
    /// Returns the new state, or `None` once the chain has ended.
    pub fn step(&mut self) -> Result<Option<&T>, ChainError> {
        if self.has_ended() {
            return Ok(None);
        }
        let step_seed = self.rng.next_u64();
        let index = self.steps;
        let iteration = {
            let Some(state) = self.state.as_ref() else {
                return Ok(None);
            };
            match self.log.get(index) {
                Some(iteration) => {
                    if let Some(precondition) = &iteration.precondition {
                        if !precondition(state) {
                            debug!("Replay of step {} is invalid", index);
                            return Err(ChainError::InvalidReplay {
                                step: index,
                                description: iteration.description(),
                            });
                        }
                    }
                    iteration
                }
                None => {
                    let iteration = self.generate_step(step_seed, state)?;
                    self.log.iterations.borrow_mut().push(iteration.clone());
                    iteration
                }
            }
        };

        let transformer = iteration.shrinkable.value();
        self.steps += 1;
        self.log.executed.set(Some(self.steps));
        self.transformations
            .push(transformer.description().to_string());
        trace!("Chain step {}: {}", index, transformer);

        if transformer.is_end_of_chain() {
            self.ended = true;
            return Ok(None);
        }

        let Some(state) = self.state.take() else {
            return Ok(None);
        };
        let mut detector = (self.spec.change_detector)();
        detector.before_transformation(&state);
        let next = transformer.apply(state);
        let changed = detector.has_changed(&next);
        if let Some(recorded) = self.log.iterations.borrow_mut().get_mut(index) {
            recorded.changed_state = changed;
        }
        self.state = Some(next);
        Ok(self.state.as_ref())
    }

    /// Apply transformers until the chain ends
    pub fn run_to_end(&mut self) -> Result<(), ChainError> {
        while self.step()?.is_some() {}
        Ok(())
    }

    fn generate_step(&self, seed: u64, state: &T) -> Result<ChainIteration<T>, ChainError> {
        let mut rng = XorShiftRng::new(seed);
        let accessed = Cell::new(false);
        let access = StateAccess::new(state, &accessed);
        for _ in 0..MAX_TRANSFORMATION_TRIES {
            let transformation = self.spec.choose(&mut rng);
            if let Some(arbitrary) = transformation.provide(&access) {
                let shrinkable = arbitrary.generator(self.spec.gen_size)?.next(&mut rng)?;
                return Ok(ChainIteration {
                    accessed_state: accessed.get(),
                    changed_state: true,
                    shrinkable,
                    precondition: transformation.precondition().cloned(),
                });
            }
        }
        Err(GenerationError::too_many_misses(
            MAX_TRANSFORMATION_TRIES,
            format!("chain step {}", self.steps),
        )
        .into())
    }
}

impl<T: 'static> Clone for Chain<T> {
    fn clone(&self) -> Self {
        Chain::start(
            self.spec.clone(),
            self.seed,
            self.max_transformations,
            self.log.clone(),
        )
    }
}

impl<T> fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("max_transformations", &self.max_transformations)
            .field("steps", &self.steps)
            .field("transformations", &self.transformations)
            .finish()
    }
}

/// Shrinkable of a chain and the steps recorded while running it
pub(crate) struct ShrinkableChain<T> {
    spec: Rc<ChainSpec<T>>,
    seed: u64,
    max_transformations: usize,
    log: Rc<ChainLog<T>>,
}

impl<T> Clone for ShrinkableChain<T> {
    fn clone(&self) -> Self {
        Self {
            spec: self.spec.clone(),
            seed: self.seed,
            max_transformations: self.max_transformations,
            log: self.log.clone(),
        }
    }
}

impl<T: 'static> ShrinkableChain<T> {
    pub(crate) fn new(spec: Rc<ChainSpec<T>>, seed: u64, max_transformations: usize) -> Self {
        Self {
            spec,
            seed,
            max_transformations,
            log: Rc::new(ChainLog::new(Vec::new())),
        }
    }

    /// A chain replaying `iterations` and generating new steps up to the maximum
    pub(crate) fn with_iterations(
        &self,
        iterations: Vec<ChainIteration<T>>,
        max_transformations: usize,
    ) -> Self {
        Self {
            spec: self.spec.clone(),
            seed: self.seed,
            max_transformations,
            log: Rc::new(ChainLog::new(iterations)),
        }
    }

    pub(crate) fn max(&self) -> usize {
        self.max_transformations
    }

    pub(crate) fn recorded(&self) -> Vec<ChainIteration<T>> {
        self.log.iterations.borrow().clone()
    }

    pub(crate) fn recorded_len(&self) -> usize {
        self.log.len()
    }
}

impl<T: 'static> Shrinkable<Chain<T>> for ShrinkableChain<T> {
    fn value(&self) -> Chain<T> {
        Chain::start(
            self.spec.clone(),
            self.seed,
            self.max_transformations,
            self.log.clone(),
        )
    }

    fn shrink(&self) -> Candidates<Chain<T>> {
        let shrinker = ChainShrinker::new(self.clone(), self.log.executed_iterations());
        Box::new(
            shrinker
                .candidates()
                .map(|candidate| Rc::new(candidate) as ShrinkableRef<Chain<T>>),
        )
    }

    /// `[max transformations] ++ sum of the recorded steps' distances`
    fn distance(&self) -> ShrinkingDistance {
        let steps = self
            .log
            .iterations
            .borrow()
            .iter()
            .take(self.max_transformations)
            .fold(ShrinkingDistance::MIN, |acc, iteration| {
                acc.plus(&iteration.shrinkable.distance())
            });
        ShrinkingDistance::of(&[self.max_transformations as u64]).append(&steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom::{ArbitraryExt, integers, just};

    fn counter_chains() -> ChainArbitrary<i64> {
        chains(|| 0i64)
            .with_transformation(
                1,
                Transformation::independent(
                    integers::<i64>()
                        .between(1, 10)
                        .map(|n| Transformer::transform(format!("add {}", n), move |s: i64| s + n))
                        .boxed(),
                ),
            )
            .with_transformation(
                1,
                Transformation::independent(
                    just(Transformer::transform("double", |s: i64| s * 2)).boxed(),
                ),
            )
    }

    fn generate<T: 'static>(arbitrary: &ChainArbitrary<T>, seed: u64) -> ShrinkableRef<Chain<T>> {
        let generator = arbitrary.generator(100).unwrap();
        generator.next(&mut XorShiftRng::new(seed)).unwrap()
    }

    #[test]
    fn test_runs_up_to_max_transformations() {
        let shrinkable = generate(&counter_chains().with_max_transformations(7), 1);
        let mut chain = shrinkable.value();
        assert_eq!(chain.state(), Some(&0));
        chain.run_to_end().unwrap();
        assert_eq!(chain.count_transformations(), 7);
        assert_eq!(chain.transformations().len(), 7);
        assert!(chain.has_ended());
        assert!(chain.step().unwrap().is_none());
    }

    #[test]
    fn test_default_length_depends_on_gen_size() {
        let arbitrary = counter_chains();
        assert_eq!(arbitrary.max_transformations(100), 10);
        assert_eq!(arbitrary.max_transformations(400), 20);
        assert_eq!(arbitrary.infinite().max_transformations(100), usize::MAX);
    }

    #[test]
    fn test_replay_yields_same_states() {
        let shrinkable = generate(&counter_chains().with_max_transformations(12), 99);
        let mut first = shrinkable.value();
        first.run_to_end().unwrap();
        let mut second = shrinkable.value();
        second.run_to_end().unwrap();
        assert_eq!(first.state(), second.state());
        assert_eq!(first.transformations(), second.transformations());

        let mut cloned = first.clone();
        assert_eq!(cloned.count_transformations(), 0);
        cloned.run_to_end().unwrap();
        assert_eq!(cloned.state(), first.state());
    }

    #[test]
    fn test_dependent_steps_see_current_state() {
        let arbitrary = chains(|| 1i64)
            .with_transformation(
                1,
                Transformation::dependent(|current: &i64| {
                    let current = *current;
                    just(Transformer::transform(
                        format!("set {}", current + 1),
                        move |_s: i64| current + 1,
                    ))
                    .boxed()
                }),
            )
            .with_max_transformations(5);
        let mut chain = generate(&arbitrary, 3).value();
        chain.run_to_end().unwrap();
        assert_eq!(chain.state(), Some(&6));
        assert_eq!(chain.transformations(), ["set 2", "set 3", "set 4", "set 5", "set 6"]);
    }

    #[test]
    fn test_end_of_chain_stops_unbounded_chain() {
        let arbitrary = chains(String::new)
            .with_transformation(
                1,
                Transformation::independent(
                    just(Transformer::transform("add x", |s: String| s + "x")).boxed(),
                )
                .when(|s: &String| s.len() < 5),
            )
            .with_transformation(
                1,
                Transformation::independent(just(Transformer::end_of_chain()).boxed())
                    .when(|s: &String| s.len() >= 5),
            )
            .infinite();
        let mut chain = generate(&arbitrary, 8).value();
        chain.run_to_end().unwrap();
        assert_eq!(chain.state().map(String::as_str), Some("xxxxx"));
        assert_eq!(chain.transformations().len(), 6);
        assert_eq!(chain.transformations()[5], crate::transformer::END_OF_CHAIN);
    }

    #[test]
    fn test_no_applicable_transformation_is_too_many_misses() {
        let arbitrary = chains(|| 0i32)
            .with_transformation(
                1,
                Transformation::independent(just(Transformer::<i32>::noop()).boxed())
                    .when(|_s: &i32| false),
            );
        let mut chain = generate(&arbitrary, 4).value();
        match chain.step() {
            Err(ChainError::Generation(error)) => assert!(error.is_too_many_misses()),
            other => panic!("unexpected {:?}", other.map(|state| state.copied())),
        }
    }

    #[test]
    fn test_configuration_errors() {
        let empty = chains(|| 0u8);
        assert!(empty.generator(10).err().unwrap().is_configuration_error());
        let zero_weight = chains(|| 0u8).with_transformation(
            0,
            Transformation::independent(just(Transformer::<u8>::noop()).boxed()),
        );
        assert!(zero_weight.generator(10).err().unwrap().is_configuration_error());
    }

    #[test]
    fn test_change_detection_is_recorded() {
        let arbitrary = chains(Vec::<i32>::new)
            .with_transformation(
                1,
                Transformation::independent(just(Transformer::<Vec<i32>>::noop()).boxed()),
            )
            .with_transformation(
                1,
                Transformation::independent(
                    just(Transformer::mutate("push", |v: &mut Vec<i32>| v.push(1))).boxed(),
                ),
            )
            .detect_changes_by_equality();
        let shrinkable = ShrinkableChain::new(arbitrary.spec(100), 17, 20);
        let mut chain = shrinkable.value();
        chain.run_to_end().unwrap();
        assert_eq!(chain.transformations().len(), 20);
        assert_eq!(shrinkable.recorded_len(), 20);
        for (iteration, description) in shrinkable.recorded().iter().zip(chain.transformations()) {
            assert_eq!(iteration.changed_state, description != "noop");
        }
    }

    #[test]
    fn test_changes_are_assumed_by_default() {
        let arbitrary = chains(|| 0u8).with_transformation(
            1,
            Transformation::independent(just(Transformer::<u8>::noop()).boxed()),
        );
        let shrinkable = ShrinkableChain::new(arbitrary.spec(100), 2, 5);
        shrinkable.value().run_to_end().unwrap();
        assert!(shrinkable.recorded().iter().all(|iteration| iteration.changed_state));
    }

    #[test]
    fn test_distance_counts_max_and_steps() {
        let shrinkable = generate(&counter_chains().with_max_transformations(4), 5);
        assert_eq!(shrinkable.distance(), ShrinkingDistance::of(&[4]));
        shrinkable.value().run_to_end().unwrap();
        assert_eq!(shrinkable.distance().dimensions()[0], 4);
    }
}
