// ABOUTME: Observer registry with unsubscribe-only capability tokens
// ABOUTME: Replaces callback lists; unsubscribing is idempotent and safe after the registry is gone

use std::sync::{Arc, Mutex, Weak};

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<E>)>,
}

/// A set of observers for events of type `E`.
pub struct Observers<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }
}

impl<E: 'static> Observers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            let id = registry.next_id;
            registry.next_id += 1;
            registry.callbacks.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.callbacks.retain(|(cb_id, _)| *cb_id != id);
                }
            })),
        }
    }

    /// Deliver an event to every current observer.
    ///
    /// Observers are snapshotted first, so a callback may unsubscribe
    /// (itself or others) without deadlocking.
    pub fn emit(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.callbacks.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }
}

/// Capability token whose only operation is unsubscribing.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Remove the observer. Calling this more than once is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registered<E>(observers: &Observers<E>) -> usize {
        observers.registry.lock().unwrap().callbacks.len()
    }

    #[test]
    fn test_emit_reaches_subscribers() {
        let observers: Observers<u32> = Observers::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let _sub = observers.subscribe(move |n| {
            seen_clone.fetch_add(*n as usize, Ordering::SeqCst);
        });

        observers.emit(&2);
        observers.emit(&3);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let observers: Observers<u32> = Observers::new();
        let mut sub = observers.subscribe(|_| {});
        assert_eq!(registered(&observers), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(registered(&observers), 0);
        assert!(!sub.is_active());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let observers: Observers<u32> = Observers::new();
        {
            let _sub = observers.subscribe(|_| {});
            assert_eq!(registered(&observers), 1);
        }
        assert_eq!(registered(&observers), 0);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let observers: Observers<u32> = Observers::new();
        let mut sub = observers.subscribe(|_| {});
        drop(observers);
        sub.unsubscribe();
    }

    #[test]
    fn test_only_removes_own_callback() {
        let observers: Observers<u32> = Observers::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let mut first = observers.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = count.clone();
        let _second = observers.subscribe(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        first.unsubscribe();
        observers.emit(&0);
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }
}
