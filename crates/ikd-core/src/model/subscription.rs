//! `Subscription`: the durable (service, node, state) record.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Null,
    Subscribed,
    Pending,
    Unsubscribed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub service: String,
    pub node: String,
}

impl SubscriptionKey {
    pub fn new(service: impl Into<String>, node: impl Into<String>) -> Self {
        SubscriptionKey {
            service: service.into(),
            node: node.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub key: SubscriptionKey,
    pub state: SubscriptionState,
    /// Stable ids of the sources currently powered onto this subscription.
    pub observers: Vec<i64>,
}

impl Subscription {
    pub fn new(id: i64, key: SubscriptionKey) -> Self {
        Subscription {
            id,
            key,
            state: SubscriptionState::Null,
            observers: Vec::new(),
        }
    }

    /// Goal implied by current power-up membership: at least one observer
    /// means the goal is `subscribed`, zero means `unsubscribed`.
    pub fn goal(&self) -> SubscriptionState {
        if self.observers.is_empty() {
            SubscriptionState::Unsubscribed
        } else {
            SubscriptionState::Subscribed
        }
    }

    pub fn power_up(&mut self, source_id: i64) {
        if !self.observers.contains(&source_id) {
            self.observers.push(source_id);
        }
    }

    pub fn power_down(&mut self, source_id: i64) {
        self.observers.retain(|id| *id != source_id);
    }
}
