//! Multicast observer lists.
//!
//! Engines report events (fills, cancels, Greeks) through `Delegate`s:
//! callers register closures before submitting work and the owning subsystem
//! fires them synchronously on its own dispatch thread. Registration is not
//! synchronised with firing, and observers must not re-enter the subject
//! from inside a callback.

use std::fmt;

/// Handle returned by [`Delegate::add`], used to unregister an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateToken(u64);

/// Ordered multicast list of observers for events of type `T`.
pub struct Delegate<T> {
    next_token: u64,
    observers: Vec<(u64, Box<dyn FnMut(&T) + Send>)>,
}

impl<T> Delegate<T> {
    /// Create an empty delegate
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_token: 1,
            observers: Vec::new(),
        }
    }

    /// Register an observer; fires in registration order.
    pub fn add(&mut self, observer: impl FnMut(&T) + Send + 'static) -> DelegateToken {
        let token = self.next_token;
        self.next_token += 1;
        self.observers.push((token, Box::new(observer)));
        DelegateToken(token)
    }

    /// Unregister an observer. Returns false when the token is unknown.
    pub fn remove(&mut self, token: DelegateToken) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(t, _)| *t != token.0);
        self.observers.len() != before
    }

    /// Fire all observers in registration order.
    pub fn fire(&mut self, event: &T) {
        for (_, observer) in &mut self.observers {
            observer(event);
        }
    }

    /// Number of registered observers
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether any observer is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<T> Default for Delegate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Delegate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    #[test]
    fn test_fire_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut delegate = Delegate::new();
        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            delegate.add(move |value: &i32| seen.lock().unwrap().push((tag, *value)));
        }
        delegate.fire(&7);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn test_remove_observer() {
        let seen = Arc::new(Mutex::new(0_u32));
        let mut delegate = Delegate::new();
        let token = {
            let seen = seen.clone();
            delegate.add(move |_: &()| *seen.lock().unwrap() += 1)
        };
        delegate.fire(&());
        assert!(delegate.remove(token));
        assert!(!delegate.remove(token));
        delegate.fire(&());
        assert_eq!(*seen.lock().unwrap(), 1);
        assert!(delegate.is_empty());
    }
}
