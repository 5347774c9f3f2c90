//! Shrinking search for minimizing falsified samples.
//!
//! The search starts from a falsifying shrinkable and repeatedly descends into
//! the first candidate that still falsifies the property, until no candidate
//! does or a budget runs out.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::error::GenerationError;
use crate::shrinkable::{Candidates, ShrinkableRef, ShrinkingDistance};

/// Consecutive panics while producing candidates before a level is given up
const MAX_PANICKING_CANDIDATES: usize = 100;

/// Consecutive steps without a strictly smaller distance before the search stops
const MAX_EQUAL_DISTANCE_STEPS: usize = 100;

/// Result of evaluating a property for one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryOutcome {
    /// The property holds
    Satisfied,
    /// The property does not hold
    Falsified(String),
    /// The value does not satisfy the property's assumptions
    Invalid,
}

impl TryOutcome {
    pub fn is_falsified(&self) -> bool {
        matches!(self, TryOutcome::Falsified(_))
    }
}

/// How much effort goes into shrinking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShrinkingMode {
    /// Report the original sample
    Off,
    /// Shrink until the time budget is used up
    #[default]
    Bounded,
    /// Shrink without a time budget
    Full,
}

impl fmt::Display for ShrinkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShrinkingMode::Off => "OFF",
            ShrinkingMode::Bounded => "BOUNDED",
            ShrinkingMode::Full => "FULL",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ShrinkingMode {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OFF" => Ok(ShrinkingMode::Off),
            "BOUNDED" => Ok(ShrinkingMode::Bounded),
            "FULL" => Ok(ShrinkingMode::Full),
            other => Err(GenerationError::invalid_field(
                "shrinking",
                format!("unknown shrinking mode <{}>", other),
            )),
        }
    }
}

/// Result of a shrinking search
#[derive(Debug, Clone)]
pub struct ShrinkResult<T> {
    /// Sample the search started from
    pub original: T,
    /// Smallest sample found that still falsifies the property
    pub minimal: T,
    /// Falsification message of the minimal sample
    pub message: Option<String>,
    /// Distance of the minimal sample
    pub distance: ShrinkingDistance,
    /// Number of successful shrinking steps
    pub shrink_steps: usize,
    /// Time spent shrinking
    pub shrink_duration: Duration,
    /// Whether the search ran to completion instead of hitting a budget
    pub completed: bool,
}

impl<T: Clone> ShrinkResult<T> {
    /// Result for a sample that was not shrunk at all
    pub fn no_shrinking(original: T, message: Option<String>, distance: ShrinkingDistance) -> Self {
        Self {
            minimal: original.clone(),
            original,
            message,
            distance,
            shrink_steps: 0,
            shrink_duration: Duration::from_secs(0),
            completed: true,
        }
    }
}

/// Configuration for shrinking behavior
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShrinkConfig {
    pub mode: ShrinkingMode,
    /// Time budget of [`ShrinkingMode::Bounded`]
    pub timeout: Duration,
    /// Maximum number of successful shrinking steps
    pub max_iterations: usize,
    /// Log every accepted step at info level instead of debug
    pub verbose: bool,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        Self {
            mode: ShrinkingMode::Bounded,
            timeout: Duration::from_secs(10),
            max_iterations: 10_000,
            verbose: false,
        }
    }
}

impl ShrinkConfig {
    pub fn new(mode: ShrinkingMode, timeout: Duration, max_iterations: usize) -> Self {
        Self {
            mode,
            timeout,
            max_iterations,
            verbose: false,
        }
    }

    pub fn with_mode(mode: ShrinkingMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Default::default()
        }
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "property panicked".to_string()
    }
}

/// Evaluates the property; a panicking property counts as falsified
fn evaluate<T, F>(falsifier: &mut F, value: &T) -> TryOutcome
where
    F: FnMut(&T) -> TryOutcome,
{
    match panic::catch_unwind(AssertUnwindSafe(|| falsifier(value))) {
        Ok(outcome) => outcome,
        Err(payload) => TryOutcome::Falsified(panic_message(payload.as_ref())),
    }
}

/// Next candidate of a level; candidates whose production panics are skipped
fn next_candidate<T>(candidates: &mut Candidates<T>) -> Option<ShrinkableRef<T>> {
    for _ in 0..MAX_PANICKING_CANDIDATES {
        match panic::catch_unwind(AssertUnwindSafe(|| candidates.next())) {
            Ok(candidate) => return candidate,
            Err(_) => debug!("Skipping shrinking candidate that panicked"),
        }
    }
    None
}

/// Coordinates the shrinking search
#[derive(Debug, Clone, Default)]
pub struct ShrinkEngine {
    config: ShrinkConfig,
}

impl ShrinkEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ShrinkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShrinkConfig {
        &self.config
    }

    /// Shrink a sample as long as the falsifier keeps falsifying
    ///
    /// A sample that does not falsify the property is returned unshrunk.
    pub fn shrink<T, F>(&self, shrinkable: ShrinkableRef<T>, mut falsifier: F) -> ShrinkResult<T>
    where
        T: Clone + fmt::Debug + 'static,
        F: FnMut(&T) -> TryOutcome,
    {
        let start_time = Instant::now();
        let original = shrinkable.value();

        let message = match evaluate(&mut falsifier, &original) {
            TryOutcome::Falsified(message) => message,
            _ => return ShrinkResult::no_shrinking(original, None, shrinkable.distance()),
        };
        if self.config.mode == ShrinkingMode::Off {
            return ShrinkResult::no_shrinking(original, Some(message), shrinkable.distance());
        }

        let mut current = shrinkable;
        let mut current_message = message;
        let mut shrink_steps = 0;
        let mut equal_distance_steps = 0;
        let mut completed = true;

        'search: loop {
            if shrink_steps >= self.config.max_iterations {
                debug!("Shrinking stopped after {} steps", shrink_steps);
                completed = false;
                break;
            }
            let current_distance = current.distance();
            let mut candidates = current.shrink();
            while let Some(candidate) = next_candidate(&mut candidates) {
                if self.config.mode == ShrinkingMode::Bounded
                    && start_time.elapsed() >= self.config.timeout
                {
                    warn!(
                        "Shrinking timed out after {} steps and {:?}",
                        shrink_steps,
                        start_time.elapsed()
                    );
                    completed = false;
                    break 'search;
                }
                let distance = candidate.distance();
                if distance > current_distance {
                    continue;
                }
                let value = candidate.value();
                trace!("Trying shrinking candidate {:?}", value);
                if let TryOutcome::Falsified(message) = evaluate(&mut falsifier, &value) {
                    if distance == current_distance {
                        equal_distance_steps += 1;
                        if equal_distance_steps > MAX_EQUAL_DISTANCE_STEPS {
                            break 'search;
                        }
                    } else {
                        equal_distance_steps = 0;
                    }
                    shrink_steps += 1;
                    if self.config.verbose {
                        log::info!("Shrink step {}: {:?} ({})", shrink_steps, value, distance);
                    } else {
                        debug!("Shrink step {}: {:?} ({})", shrink_steps, value, distance);
                    }
                    current = candidate;
                    current_message = message;
                    continue 'search;
                }
            }
            break;
        }

        debug!(
            "Shrinking finished after {} steps in {:?}",
            shrink_steps,
            start_time.elapsed()
        );
        ShrinkResult {
            original,
            minimal: current.value(),
            message: Some(current_message),
            distance: current.distance(),
            shrink_steps,
            shrink_duration: start_time.elapsed(),
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shrinkable::{ShrinkableBigInt, ShrinkableList, unshrinkable};
    use num_bigint::BigInt;
    use std::rc::Rc;

    fn big(value: i64) -> BigInt {
        BigInt::from(value)
    }

    fn integer(value: i64) -> ShrinkableRef<BigInt> {
        Rc::new(ShrinkableBigInt::new(big(value), big(-10_000), big(10_000), big(0)))
    }

    fn falsified_if(condition: bool) -> TryOutcome {
        if condition {
            TryOutcome::Falsified("too large".to_string())
        } else {
            TryOutcome::Satisfied
        }
    }

    #[test]
    fn test_shrink_integer_to_threshold() {
        let engine = ShrinkEngine::new();
        let result = engine.shrink(integer(9_000), |v| falsified_if(v >= &big(37)));
        assert_eq!(result.original, big(9_000));
        assert_eq!(result.minimal, big(37));
        assert_eq!(result.message.as_deref(), Some("too large"));
        assert!(result.completed);
        assert!(result.shrink_steps > 0);
    }

    #[test]
    fn test_shrink_negative_values_towards_zero() {
        let engine = ShrinkEngine::new();
        let result = engine.shrink(integer(-5_000), |v| falsified_if(v <= &big(-12)));
        assert_eq!(result.minimal, big(-12));
    }

    #[test]
    fn test_shrink_list_to_single_element() {
        let elements = [3, 900, 1, 45, 7].iter().map(|&v| integer(v)).collect();
        let list: ShrinkableRef<Vec<BigInt>> = Rc::new(ShrinkableList::new(elements, 0));
        let result = ShrinkEngine::new().shrink(list, |values: &Vec<BigInt>| {
            falsified_if(values.iter().any(|v| v > &big(5)))
        });
        assert_eq!(result.minimal, vec![big(6)]);
        assert_eq!(result.distance, ShrinkingDistance::of(&[1, 6]));
    }

    #[test]
    fn test_satisfied_sample_is_not_shrunk() {
        let result = ShrinkEngine::new().shrink(integer(50), |_| TryOutcome::Satisfied);
        assert_eq!(result.minimal, big(50));
        assert_eq!(result.shrink_steps, 0);
        assert!(result.message.is_none());
    }

    #[test]
    fn test_shrinking_off() {
        let engine = ShrinkEngine::with_config(ShrinkConfig::with_mode(ShrinkingMode::Off));
        let result = engine.shrink(integer(50), |_| TryOutcome::Falsified("always".into()));
        assert_eq!(result.minimal, big(50));
        assert_eq!(result.message.as_deref(), Some("always"));
    }

    #[test]
    fn test_invalid_candidates_are_skipped() {
        let result = ShrinkEngine::new().shrink(integer(100), |v| {
            if v < &big(20) {
                TryOutcome::Invalid
            } else {
                falsified_if(v >= &big(10))
            }
        });
        assert_eq!(result.minimal, big(20));
    }

    #[test]
    fn test_panicking_property_counts_as_falsified() {
        let result = ShrinkEngine::new().shrink(integer(1_000), |v| {
            assert!(v < &big(100), "value {} too large", v);
            TryOutcome::Satisfied
        });
        assert_eq!(result.minimal, big(100));
        assert_eq!(result.message.as_deref(), Some("value 100 too large"));
    }

    #[test]
    fn test_step_budget() {
        let engine = ShrinkEngine::with_config(ShrinkConfig::with_max_iterations(2));
        let result = engine.shrink(integer(10_000), |v| falsified_if(v >= &big(1)));
        assert_eq!(result.shrink_steps, 2);
        assert!(!result.completed);
    }

    #[test]
    fn test_zero_timeout_stops_bounded_shrinking() {
        let engine = ShrinkEngine::with_config(ShrinkConfig::with_timeout(Duration::ZERO));
        let result = engine.shrink(integer(10_000), |v| falsified_if(v >= &big(1)));
        assert_eq!(result.minimal, big(10_000));
        assert!(!result.completed);

        let full = ShrinkEngine::with_config(ShrinkConfig::new(
            ShrinkingMode::Full,
            Duration::ZERO,
            10_000,
        ));
        assert_eq!(full.shrink(integer(10_000), |v| falsified_if(v >= &big(1))).minimal, big(1));
    }

    #[test]
    fn test_accepted_steps_approach_target() {
        let mut accepted = Vec::new();
        ShrinkEngine::new().shrink(integer(7_777), |v| {
            let outcome = falsified_if(v >= &big(3));
            if outcome.is_falsified() {
                accepted.push(v.clone());
            }
            outcome
        });
        assert!(accepted.len() > 2);
        assert!(accepted.windows(2).all(|pair| pair[1] < pair[0]));
        assert_eq!(accepted.last(), Some(&big(3)));
    }

    #[test]
    fn test_unshrinkable_sample_stays() {
        let result = ShrinkEngine::new().shrink(unshrinkable(big(1)), |_| {
            TryOutcome::Falsified("fails".into())
        });
        assert_eq!(result.minimal, big(1));
        assert!(result.completed);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("bounded".parse::<ShrinkingMode>().unwrap(), ShrinkingMode::Bounded);
        assert_eq!("FULL".parse::<ShrinkingMode>().unwrap(), ShrinkingMode::Full);
        assert!("eventually".parse::<ShrinkingMode>().is_err());
        assert_eq!(ShrinkingMode::Off.to_string(), "OFF");
    }
}
