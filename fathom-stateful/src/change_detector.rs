//! Detection of transformations that leave the state unchanged
//!
//! Steps known to be no-ops can be dropped when a chain is shrunk, even if
//! later steps looked at the state.

/// Observes one transformation of a state
pub trait ChangeDetector<T> {
    /// Called with the state before the transformation is applied
    fn before_transformation(&mut self, state: &T);

    /// Whether the transformed state differs from the one seen before
    fn has_changed(&self, state: &T) -> bool;
}

/// Assumes every transformation changes the state
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysChanged;

impl<T> ChangeDetector<T> for AlwaysChanged {
    fn before_transformation(&mut self, _state: &T) {}

    fn has_changed(&self, _state: &T) -> bool {
        true
    }
}

/// Compares a snapshot of the state before the transformation with the result
#[derive(Debug, Clone)]
pub struct EqualityChangeDetector<T> {
    before: Option<T>,
}

impl<T> EqualityChangeDetector<T> {
    pub fn new() -> Self {
        Self { before: None }
    }
}

impl<T> Default for EqualityChangeDetector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> ChangeDetector<T> for EqualityChangeDetector<T> {
    fn before_transformation(&mut self, state: &T) {
        self.before = Some(state.clone());
    }

    fn has_changed(&self, state: &T) -> bool {
        match &self.before {
            Some(before) => before != state,
            None => true,
        }
    }
}
