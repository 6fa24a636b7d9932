use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use log::debug;

use crate::lifecycle::lock;

/// Callback registered with a continuous-data capability.
pub type Listener<T> = Box<dyn Fn(T) + Send + Sync + 'static>;

type Remover = Box<dyn FnOnce() + Send + 'static>;

/// Handle for one registered listener.
///
/// The listener is unregistered exactly once: either by an explicit
/// [`Subscription::remove`] or when the handle is dropped.
#[must_use = "dropping a Subscription unregisters its listener immediately"]
pub struct Subscription {
    label: &'static str,
    remover: Option<Remover>,
}

impl Subscription {
    pub fn new(label: &'static str, remover: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label,
            remover: Some(Box::new(remover)),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn remove(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(remover) = self.remover.take() {
            remover();
            debug!("released {} subscription", self.label);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.remover.is_some())
            .finish()
    }
}

/// Every subscription a mounted panel holds.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    held: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.held.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Unregisters everything, newest first. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let count = self.held.len();
        while let Some(subscription) = self.held.pop() {
            subscription.remove();
        }
        count
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.release_all();
    }
}

type SharedListener<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Fan-out registry a platform bridge uses to deliver samples to listeners.
pub struct ListenerHub<T> {
    label: &'static str,
    next_id: AtomicU64,
    listeners: Arc<Mutex<BTreeMap<u64, SharedListener<T>>>>,
}

impl<T: Clone + Send + 'static> ListenerHub<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            next_id: AtomicU64::new(0),
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, Arc::from(listener));

        let listeners = Arc::clone(&self.listeners);
        Subscription::new(self.label, move || {
            lock(&listeners).remove(&id);
        })
    }

    /// Delivers `value` to every listener registered at the time of the call.
    /// Listeners run outside the registry lock so they may unsubscribe.
    pub fn emit(&self, value: T) {
        let snapshot: Vec<SharedListener<T>> = lock(&self.listeners).values().cloned().collect();
        for listener in snapshot {
            listener(value.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn drop_and_remove_each_release_once() {
        let released = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&released);
        let sub = Subscription::new("test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.remove();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&released);
        {
            let _sub = Subscription::new("test", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn set_releases_every_member() {
        let hub: ListenerHub<u32> = ListenerHub::new("hub");
        let mut set = SubscriptionSet::new();
        set.push(hub.subscribe(Box::new(|_| {})));
        set.push(hub.subscribe(Box::new(|_| {})));
        set.push(hub.subscribe(Box::new(|_| {})));
        assert_eq!(hub.listener_count(), 3);

        assert_eq!(set.release_all(), 3);
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(set.release_all(), 0);
    }

    #[test]
    fn emit_reaches_only_live_listeners() {
        let hub: ListenerHub<u32> = ListenerHub::new("hub");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let sub = hub.subscribe(Box::new(move |v| sink.lock().unwrap().push(v)));
        hub.emit(1);
        hub.emit(2);
        drop(sub);
        hub.emit(3);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
