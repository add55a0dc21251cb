/// Handle returned by [`OneShot::subscribe`].
pub type SubscriptionId = u64;

struct Subscription<K, E> {
    id: SubscriptionId,
    key: K,
    filter: fn(&E) -> bool,
}

/// A set of one-shot subscriptions.
///
/// Each subscription fires for the first event its filter accepts and is
/// removed right after, so it never fires twice.
pub struct OneShot<K, E> {
    next_id: SubscriptionId,
    subscriptions: Vec<Subscription<K, E>>,
}

impl<K, E> Default for OneShot<K, E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            subscriptions: vec![],
        }
    }
}

impl<K, E> OneShot<K, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, key: K, filter: fn(&E) -> bool) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, key, filter });
        id
    }

    /// Removes a subscription before it fired. Returns false if it is gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Fires every subscription accepting `event` and returns their keys in
    /// subscription order.
    pub fn dispatch(&mut self, event: &E) -> Vec<K> {
        let mut fired = vec![];
        let mut pending = Vec::with_capacity(self.subscriptions.len());
        for subscription in self.subscriptions.drain(..) {
            if (subscription.filter)(event) {
                fired.push(subscription.key);
            } else {
                pending.push(subscription);
            }
        }
        self.subscriptions = pending;
        fired
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
