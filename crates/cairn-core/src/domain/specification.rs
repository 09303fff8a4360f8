//! Specification pattern for composable predicates
//!
//! Filters over nodes and relationships are expressed as specifications
//! and combined with AND semantics.

/// Core specification trait
pub trait Specification<T>: Send + Sync {
    /// Check if the value satisfies this specification
    fn is_satisfied_by(&self, value: &T) -> bool;

    /// Combine with another specification using AND
    fn and<S: Specification<T> + 'static>(self, other: S) -> AllOf<T>
    where
        Self: Sized + 'static,
        T: 'static,
    {
        AllOf::new().with(self).with(other)
    }
}

/// Conjunction over any number of specifications
///
/// An empty conjunction is satisfied by everything.
pub struct AllOf<T> {
    specs: Vec<Box<dyn Specification<T>>>,
}

impl<T> AllOf<T> {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Add a specification to the conjunction
    pub fn with<S: Specification<T> + 'static>(mut self, spec: S) -> Self {
        self.specs.push(Box::new(spec));
        self
    }

    /// Add a specification in place
    pub fn push<S: Specification<T> + 'static>(&mut self, spec: S) {
        self.specs.push(Box::new(spec));
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<T> Default for AllOf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Specification<T> for AllOf<T> {
    fn is_satisfied_by(&self, value: &T) -> bool {
        self.specs.iter().all(|spec| spec.is_satisfied_by(value))
    }
}

/// A specification backed by a closure
pub struct PredicateSpec<F> {
    predicate: F,
}

impl<F> PredicateSpec<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<T, F> Specification<T> for PredicateSpec<F>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn is_satisfied_by(&self, value: &T) -> bool {
        (self.predicate)(value)
    }
}
