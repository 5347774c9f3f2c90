//! Errors raised while running chains

use std::fmt;

use fathom::{GenerationError, TryOutcome};

/// Failure of a chain or action chain run
#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    /// An invariant did not hold after a transformation
    InvariantViolated {
        label: String,
        message: String,
        /// Descriptions of all transformations applied up to the failure
        transformations: Vec<String>,
    },

    /// A recorded step no longer applies to the state it is replayed on
    InvalidReplay { step: usize, description: String },

    /// The next transformer could not be generated
    Generation(GenerationError),

    /// A transformer panicked and left the chain without a state
    Interrupted { step: usize },
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvariantViolated {
                label,
                message,
                transformations,
            } => {
                write!(f, "Invariant '{}' violated: {}", label, message)?;
                if !transformations.is_empty() {
                    write!(f, "\nTransformations:")?;
                    for (index, transformation) in transformations.iter().enumerate() {
                        write!(f, "\n  {}. {}", index + 1, transformation)?;
                    }
                }
                Ok(())
            }
            ChainError::InvalidReplay { step, description } => {
                write!(
                    f,
                    "Invalid replay: precondition of step {} ({}) does not hold any more",
                    step, description
                )
            }
            ChainError::Generation(error) => write!(f, "Chain generation failed: {}", error),
            ChainError::Interrupted { step } => {
                write!(f, "Chain was interrupted in step {}", step)
            }
        }
    }
}

impl std::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChainError::Generation(error) => Some(error),
            _ => None,
        }
    }
}

impl From<GenerationError> for ChainError {
    fn from(error: GenerationError) -> Self {
        ChainError::Generation(error)
    }
}

impl ChainError {
    pub fn is_invalid_replay(&self) -> bool {
        matches!(self, ChainError::InvalidReplay { .. })
    }

    /// The transformations that led to an invariant violation, if any
    pub fn transformations(&self) -> &[String] {
        match self {
            ChainError::InvariantViolated {
                transformations, ..
            } => transformations,
            _ => &[],
        }
    }

    /// How a shrinking search should treat a chain that failed this way
    ///
    /// Invalid replays are shrinking artifacts and do not count as failures.
    pub fn outcome(&self) -> TryOutcome {
        match self {
            ChainError::InvalidReplay { .. } => TryOutcome::Invalid,
            other => TryOutcome::Falsified(other.to_string()),
        }
    }
}
