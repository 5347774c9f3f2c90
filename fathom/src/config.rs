//! Engine configuration: defaults, validation and the `fathom.properties` file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::debug;

use crate::arbitrary::Arbitrary;
use crate::error::{GenerationError, GenerationResult};
use crate::exhaustive::{ExhaustiveRef, require_exhaustive};
use crate::rng::Seed;
use crate::sampling::EdgeCasesMode;
use crate::shrink::{ShrinkConfig, ShrinkingMode};

/// Name of the properties file read by [`EngineConfig::load_default_file`]
pub const PROPERTIES_FILE: &str = "fathom.properties";

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Invalid number of tries (must be > 0)
    InvalidTries(usize),
    /// Invalid max discard ratio (must be > 0)
    InvalidMaxDiscardRatio(usize),
    /// Invalid bounded shrinking time (must be > 0)
    InvalidShrinkingSeconds,
    /// Invalid exhaustive ceiling (must be > 0)
    InvalidMaxNumberOfSamples(u64),
    /// A property has a value that cannot be parsed
    InvalidProperty { key: String, value: String },
    /// The properties file cannot be read
    Io { path: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTries(n) => write!(f, "Invalid tries count: {} (must be > 0)", n),
            ConfigError::InvalidMaxDiscardRatio(n) => {
                write!(f, "Invalid max discard ratio: {} (must be > 0)", n)
            }
            ConfigError::InvalidShrinkingSeconds => {
                write!(f, "Invalid bounded shrinking seconds (must be > 0)")
            }
            ConfigError::InvalidMaxNumberOfSamples(n) => {
                write!(f, "Invalid max number of samples: {} (must be > 0)", n)
            }
            ConfigError::InvalidProperty { key, value } => {
                write!(f, "Invalid value '{}' for property '{}'", value, key)
            }
            ConfigError::Io { path, message } => {
                write!(f, "Cannot read properties file {}: {}", path, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// How samples are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GenerationMode {
    /// Exhaustive if the value space fits into the tries, randomized otherwise
    #[default]
    Auto,
    Randomized,
    Exhaustive,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationMode::Auto => "AUTO",
            GenerationMode::Randomized => "RANDOMIZED",
            GenerationMode::Exhaustive => "EXHAUSTIVE",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for GenerationMode {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(GenerationMode::Auto),
            "RANDOMIZED" => Ok(GenerationMode::Randomized),
            "EXHAUSTIVE" => Ok(GenerationMode::Exhaustive),
            other => Err(GenerationError::invalid_field(
                "generation",
                format!("unknown generation mode <{}>", other),
            )),
        }
    }
}

/// Defaults for generation and shrinking
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Number of samples per property
    pub tries: usize,
    /// Maximum ratio of invalid to valid samples
    pub max_discard_ratio: usize,
    pub shrinking: ShrinkingMode,
    /// Time budget of bounded shrinking
    pub bounded_shrinking_seconds: u64,
    pub generation: GenerationMode,
    pub edge_cases: EdgeCasesMode,
    /// Fixed seed for replaying a run
    pub seed: Option<Seed>,
    /// Ceiling for exhaustive generation; defaults to `tries`
    pub max_number_of_samples: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tries: 1000,
            max_discard_ratio: 5,
            shrinking: ShrinkingMode::Bounded,
            bounded_shrinking_seconds: 10,
            generation: GenerationMode::Auto,
            edge_cases: EdgeCasesMode::Mixin,
            seed: None,
            max_number_of_samples: None,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tries == 0 {
            return Err(ConfigError::InvalidTries(self.tries));
        }
        if self.max_discard_ratio == 0 {
            return Err(ConfigError::InvalidMaxDiscardRatio(self.max_discard_ratio));
        }
        if self.bounded_shrinking_seconds == 0 {
            return Err(ConfigError::InvalidShrinkingSeconds);
        }
        if self.max_number_of_samples == Some(0) {
            return Err(ConfigError::InvalidMaxNumberOfSamples(0));
        }
        Ok(())
    }

    pub fn with_tries(mut self, tries: usize) -> Self {
        self.tries = tries;
        self
    }

    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_shrinking(mut self, shrinking: ShrinkingMode) -> Self {
        self.shrinking = shrinking;
        self
    }

    pub fn with_generation(mut self, generation: GenerationMode) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_edge_cases(mut self, edge_cases: EdgeCasesMode) -> Self {
        self.edge_cases = edge_cases;
        self
    }

    pub fn with_max_number_of_samples(mut self, max_number_of_samples: u64) -> Self {
        self.max_number_of_samples = Some(max_number_of_samples);
        self
    }

    /// Exhaustive ceiling in effect
    pub fn effective_max_number_of_samples(&self) -> u64 {
        self.max_number_of_samples.unwrap_or(self.tries as u64)
    }

    /// Configured seed, or a fresh one
    pub fn effective_seed(&self) -> Seed {
        self.seed.unwrap_or_else(Seed::random)
    }

    /// Shrinking configuration derived from these defaults
    pub fn shrink_config(&self) -> ShrinkConfig {
        ShrinkConfig {
            mode: self.shrinking,
            timeout: Duration::from_secs(self.bounded_shrinking_seconds),
            ..ShrinkConfig::default()
        }
    }

    /// Exhaustive generator to use for an arbitrary, `None` for random generation
    ///
    /// `Exhaustive` mode fails if the value space exceeds the ceiling; `Auto`
    /// silently falls back to random generation.
    pub fn exhaustive_generator<T>(
        &self,
        arbitrary: &dyn Arbitrary<T>,
    ) -> GenerationResult<Option<ExhaustiveRef<T>>> {
        let ceiling = self.effective_max_number_of_samples();
        match self.generation {
            GenerationMode::Randomized => Ok(None),
            GenerationMode::Exhaustive => {
                require_exhaustive(arbitrary.exhaustive(ceiling), ceiling).map(Some)
            }
            GenerationMode::Auto => Ok(arbitrary.exhaustive(ceiling)),
        }
    }

    /// Apply `key = value` lines in properties format on top of this configuration
    ///
    /// Blank lines and lines starting with `#` or `!` are ignored, as are
    /// unknown keys.
    pub fn apply_properties(mut self, content: &str) -> Result<Self, ConfigError> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = match line.split_once(['=', ':']) {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (line, ""),
            };
            let invalid = || ConfigError::InvalidProperty {
                key: key.to_string(),
                value: value.to_string(),
            };
            match key {
                "defaultTries" => self.tries = value.parse().map_err(|_| invalid())?,
                "defaultMaxDiscardRatio" => {
                    self.max_discard_ratio = value.parse().map_err(|_| invalid())?
                }
                "defaultShrinking" => self.shrinking = value.parse().map_err(|_| invalid())?,
                "boundedShrinkingSeconds" => {
                    self.bounded_shrinking_seconds = value.parse().map_err(|_| invalid())?
                }
                "defaultGeneration" => self.generation = value.parse().map_err(|_| invalid())?,
                "defaultEdgeCases" => self.edge_cases = value.parse().map_err(|_| invalid())?,
                "seed" => {
                    self.seed = if value.is_empty() {
                        None
                    } else {
                        Some(value.parse().map_err(|_| invalid())?)
                    }
                }
                other => debug!("Ignoring unknown property '{}'", other),
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Defaults overridden by a properties file
    pub fn from_properties_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        EngineConfig::default().apply_properties(&content)
    }

    /// Defaults overridden by `fathom.properties` in `directory`, if the file exists
    pub fn load_default_file(directory: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = directory.as_ref().join(PROPERTIES_FILE);
        if path.is_file() {
            Self::from_properties_file(path)
        } else {
            Ok(EngineConfig::default())
        }
    }
}

/// Holds the configuration shared by everything running on one thread
pub struct ConfigManager {
    global_config: EngineConfig,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            global_config: EngineConfig::default(),
        }
    }

    pub fn with_global_config(global_config: EngineConfig) -> Result<Self, ConfigError> {
        global_config.validate()?;
        Ok(Self { global_config })
    }

    pub fn global_config(&self) -> &EngineConfig {
        &self.global_config
    }

    pub fn set_global_config(&mut self, global_config: EngineConfig) -> Result<(), ConfigError> {
        global_config.validate()?;
        self.global_config = global_config;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

// Thread-local configuration manager (doc comments are not allowed on thread_local!)
thread_local! {
    static CONFIG_MANAGER: std::cell::RefCell<ConfigManager> = std::cell::RefCell::new(ConfigManager::new());
}

/// Get the current thread's configuration
pub fn get_global_config() -> EngineConfig {
    CONFIG_MANAGER.with(|manager| manager.borrow().global_config().clone())
}

/// Replace the current thread's configuration
pub fn set_global_config(config: EngineConfig) -> Result<(), ConfigError> {
    CONFIG_MANAGER.with(|manager| manager.borrow_mut().set_global_config(config))
}
