//! State transformers and the providers that choose them

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use fathom::ArbitraryRef;
use fathom::shrinkable::Predicate;

/// Description of the sentinel that ends a chain
pub const END_OF_CHAIN: &str = "End of chain";

enum TransformerKind<T> {
    Apply(Arc<dyn Fn(T) -> T + Send + Sync>),
    EndOfChain,
}

impl<T> Clone for TransformerKind<T> {
    fn clone(&self) -> Self {
        match self {
            TransformerKind::Apply(f) => TransformerKind::Apply(f.clone()),
            TransformerKind::EndOfChain => TransformerKind::EndOfChain,
        }
    }
}

/// A described transformation of a state into its successor
pub struct Transformer<T> {
    description: String,
    kind: TransformerKind<T>,
}

impl<T> Clone for Transformer<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl<T: 'static> Transformer<T> {
    /// Replace the state by a new one
    pub fn transform(
        description: impl Into<String>,
        f: impl Fn(T) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            kind: TransformerKind::Apply(Arc::new(f)),
        }
    }

    /// Change the state in place
    pub fn mutate(
        description: impl Into<String>,
        f: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        Self::transform(description, move |mut state: T| {
            f(&mut state);
            state
        })
    }

    /// Leave the state as it is
    pub fn noop() -> Self {
        Self::transform("noop", |state: T| state)
    }

    /// Stop the chain; applying it leaves the state untouched
    pub fn end_of_chain() -> Self {
        Self {
            description: END_OF_CHAIN.to_string(),
            kind: TransformerKind::EndOfChain,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_end_of_chain(&self) -> bool {
        matches!(self.kind, TransformerKind::EndOfChain)
    }

    pub fn apply(&self, state: T) -> T {
        match &self.kind {
            TransformerKind::Apply(f) => f(state),
            TransformerKind::EndOfChain => state,
        }
    }
}

impl<T> fmt::Debug for Transformer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transformer({})", self.description)
    }
}

impl<T> fmt::Display for Transformer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Read access to the live state of a chain
///
/// Every read is recorded. Steps whose transformer was chosen after looking
/// at the state are treated as dependent on all steps before them when the
/// chain gets shrunk.
pub struct StateAccess<'a, T> {
    state: &'a T,
    accessed: &'a Cell<bool>,
}

impl<'a, T> StateAccess<'a, T> {
    pub(crate) fn new(state: &'a T, accessed: &'a Cell<bool>) -> Self {
        Self { state, accessed }
    }

    pub fn get(&self) -> &'a T {
        self.accessed.set(true);
        self.state
    }

    pub fn has_been_accessed(&self) -> bool {
        self.accessed.get()
    }
}

type Provider<T> =
    Arc<dyn Fn(&StateAccess<'_, T>) -> Option<ArbitraryRef<Transformer<T>>> + Send + Sync>;

/// Chooses the arbitrary of the next transformer
///
/// A provider returning `None` does not apply to the current state; the chain
/// then tries another transformation.
pub struct Transformation<T> {
    precondition: Option<Predicate<T>>,
    provider: Provider<T>,
}

impl<T> Clone for Transformation<T> {
    fn clone(&self) -> Self {
        Self {
            precondition: self.precondition.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl<T: 'static> Transformation<T> {
    pub fn new(
        provider: impl Fn(&StateAccess<'_, T>) -> Option<ArbitraryRef<Transformer<T>>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            precondition: None,
            provider: Arc::new(provider),
        }
    }

    /// Transformers that do not depend on the state
    pub fn independent(arbitrary: ArbitraryRef<Transformer<T>>) -> Self {
        Self::new(move |_state: &StateAccess<'_, T>| Some(arbitrary.clone()))
    }

    /// Transformers derived from the current state
    pub fn dependent(
        f: impl Fn(&T) -> ArbitraryRef<Transformer<T>> + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |state: &StateAccess<'_, T>| Some(f(state.get())))
    }

    /// Only applies to states accepted by `precondition`
    ///
    /// The precondition is checked again whenever the step is replayed.
    pub fn when(self, precondition: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        let precondition: Predicate<T> = Arc::new(precondition);
        let check = precondition.clone();
        let provider = self.provider;
        Self {
            precondition: Some(precondition),
            provider: Arc::new(move |state: &StateAccess<'_, T>| {
                if check(state.get()) {
                    provider(state)
                } else {
                    None
                }
            }),
        }
    }

    /// Check `precondition` on replay without consulting it during generation
    pub(crate) fn replayed_only_if(self, precondition: Predicate<T>) -> Self {
        Self {
            precondition: Some(precondition),
            provider: self.provider,
        }
    }

    /// The check a recorded step has to pass when it is replayed
    pub fn precondition(&self) -> Option<&Predicate<T>> {
        self.precondition.as_ref()
    }

    pub(crate) fn provide(
        &self,
        state: &StateAccess<'_, T>,
    ) -> Option<ArbitraryRef<Transformer<T>>> {
        (self.provider)(state)
    }
}
