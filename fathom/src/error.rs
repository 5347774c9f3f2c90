//! Error types for generation and exhaustive enumeration.

use std::fmt;

/// Errors raised while generating values
///
/// Exhaustive infeasibility is not reported through this type during normal
/// operation: constructors return `None` instead and the caller falls back to
/// random generation. [`GenerationError::NotExhaustible`] only exists for
/// callers that insist on exhaustive generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// A generator was configured with values it cannot work with
    InvalidConfiguration {
        message: String,
        field: Option<String>,
    },

    /// A filtering, unique or flat-mapping generator gave up looking for a value
    TooManyMisses { misses: usize, context: String },

    /// Exhaustive generation was requested but the value space is too large
    NotExhaustible { max_number_of_samples: u64 },

    /// Generation was aborted for a reason outside the generator's control
    Aborted { reason: String },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::InvalidConfiguration { message, field } => {
                write!(f, "Invalid configuration: {}", message)?;
                if let Some(field_name) = field {
                    write!(f, " (field: {})", field_name)?;
                }
                Ok(())
            }
            GenerationError::TooManyMisses { misses, context } => {
                write!(
                    f,
                    "Too many misses: {} could not produce a value after {} tries",
                    context, misses
                )
            }
            GenerationError::NotExhaustible {
                max_number_of_samples,
            } => {
                write!(
                    f,
                    "Not exhaustible: value space exceeds {} samples",
                    max_number_of_samples
                )
            }
            GenerationError::Aborted { reason } => write!(f, "Generation aborted: {}", reason),
        }
    }
}

impl std::error::Error for GenerationError {}

impl GenerationError {
    /// Create a configuration error
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error naming the offending field
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a too-many-misses error
    pub fn too_many_misses(misses: usize, context: impl Into<String>) -> Self {
        Self::TooManyMisses {
            misses,
            context: context.into(),
        }
    }

    /// Create a not-exhaustible error
    pub fn not_exhaustible(max_number_of_samples: u64) -> Self {
        Self::NotExhaustible {
            max_number_of_samples,
        }
    }

    /// Whether this error stems from a rejected configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, GenerationError::InvalidConfiguration { .. })
    }

    /// Whether this error stems from an exhausted miss budget
    pub fn is_too_many_misses(&self) -> bool {
        matches!(self, GenerationError::TooManyMisses { .. })
    }
}

/// Result alias used throughout generation code
pub type GenerationResult<T> = Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_configuration() {
        let error = GenerationError::invalid_field("min", "min <5> must not be larger than max <3>");
        assert_eq!(
            format!("{}", error),
            "Invalid configuration: min <5> must not be larger than max <3> (field: min)"
        );
        assert!(error.is_configuration_error());
        assert!(!error.is_too_many_misses());
    }

    #[test]
    fn test_display_too_many_misses() {
        let error = GenerationError::too_many_misses(10_000, "filter");
        assert_eq!(
            format!("{}", error),
            "Too many misses: filter could not produce a value after 10000 tries"
        );
        assert!(error.is_too_many_misses());
    }

    #[test]
    fn test_kinds_are_distinguishable() {
        let errors = [
            GenerationError::invalid_configuration("bad"),
            GenerationError::too_many_misses(1, "unique"),
            GenerationError::not_exhaustible(1000),
            GenerationError::Aborted {
                reason: "timeout".to_string(),
            },
        ];
        for (i, left) in errors.iter().enumerate() {
            for (j, right) in errors.iter().enumerate() {
                assert_eq!(i == j, left == right);
            }
        }
    }
}
