use std::vec::IntoIter;

use log::warn;

use mashup_shared::{DistributionChange, LifecycleEvent, SessionId, TransactionEvent};

use crate::RuntimeError;

pub struct RuntimeEvents {
    preparing: Vec<TransactionEvent>,
    prepared: Vec<TransactionEvent>,
    completed: Vec<TransactionEvent>,
    cancelled: Vec<TransactionEvent>,
    failed: Vec<TransactionEvent>,
    distribution_changes: Vec<(SessionId, DistributionChange)>,
    errors: Vec<RuntimeError>,
    empty: bool,
}

impl Default for RuntimeEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeEvents {
    pub(crate) fn new() -> Self {
        Self {
            preparing: Vec::new(),
            prepared: Vec::new(),
            completed: Vec::new(),
            cancelled: Vec::new(),
            failed: Vec::new(),
            distribution_changes: Vec::new(),
            errors: Vec::new(),
            empty: true,
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: RuntimeEvent>(&mut self) -> V::Iter {
        V::iter(self)
    }

    pub fn has<V: RuntimeEvent>(&self) -> bool {
        V::has(self)
    }

    // Crate-public

    pub(crate) fn push_transaction_event(&mut self, event: TransactionEvent) {
        match event.kind {
            LifecycleEvent::Preparing => self.preparing.push(event),
            LifecycleEvent::Prepared => self.prepared.push(event),
            LifecycleEvent::Completed => self.completed.push(event),
            LifecycleEvent::Cancelled => self.cancelled.push(event),
            LifecycleEvent::Failed => self.failed.push(event),
        }
        self.empty = false;
    }

    pub(crate) fn push_distribution_change(&mut self, session_id: &SessionId, change: DistributionChange) {
        self.distribution_changes.push((session_id.clone(), change));
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: RuntimeError) {
        self.errors.push(error);
        self.empty = false;
    }
}

impl Drop for RuntimeEvents {
    fn drop(&mut self) {
        if !self.failed.is_empty() {
            warn!("Dropped Transaction Failed Event(s)! Make sure to handle these through `events.read::<TransactionFailedEvent>()`, components may need manual recovery.");
        }
        if !self.errors.is_empty() {
            warn!("Dropped Runtime Error Event(s)! Make sure to handle these through `events.read::<ErrorEvent>()`.");
        }
    }
}

// Event Trait
pub trait RuntimeEvent {
    type Iter;

    fn iter(events: &mut RuntimeEvents) -> Self::Iter;

    fn has(events: &RuntimeEvents) -> bool;
}

macro_rules! transaction_event {
    ($(#[$meta:meta])* $name:ident, $field:ident) => {
        $(#[$meta])*
        pub struct $name;
        impl RuntimeEvent for $name {
            type Iter = IntoIter<TransactionEvent>;

            fn iter(events: &mut RuntimeEvents) -> Self::Iter {
                let list = std::mem::take(&mut events.$field);
                IntoIterator::into_iter(list)
            }

            fn has(events: &RuntimeEvents) -> bool {
                !events.$field.is_empty()
            }
        }
    };
}

transaction_event!(TransactionPreparingEvent, preparing);
transaction_event!(TransactionPreparedEvent, prepared);
transaction_event!(TransactionCompletedEvent, completed);
transaction_event!(
    /// The transaction ended before COMMIT; every Source still hosts its components
    TransactionCancelledEvent,
    cancelled
);
transaction_event!(
    /// COMMIT did not finish everywhere; `reason` lists the failed participants
    TransactionFailedEvent,
    failed
);

// Distribution Changed Event
pub struct DistributionChangedEvent;
impl RuntimeEvent for DistributionChangedEvent {
    type Iter = IntoIter<(SessionId, DistributionChange)>;

    fn iter(events: &mut RuntimeEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.distribution_changes);
        IntoIterator::into_iter(list)
    }

    fn has(events: &RuntimeEvents) -> bool {
        !events.distribution_changes.is_empty()
    }
}

// Error Event
pub struct ErrorEvent;
impl RuntimeEvent for ErrorEvent {
    type Iter = IntoIter<RuntimeError>;

    fn iter(events: &mut RuntimeEvents) -> Self::Iter {
        let list = std::mem::take(&mut events.errors);
        IntoIterator::into_iter(list)
    }

    fn has(events: &RuntimeEvents) -> bool {
        !events.errors.is_empty()
    }
}
