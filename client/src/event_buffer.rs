use std::collections::HashMap;

use log::{debug, trace};

use mashup_shared::{DownstreamEvent, InstanceId, SequenceList};

/// Holds the input of suspended component instances.
///
/// Sequence numbers are assigned per device in arrival order, so draining a
/// buffer yields events in the order they were produced.
pub struct EventBuffer {
    last_sequence: u64,
    suspended: HashMap<InstanceId, SequenceList<DownstreamEvent>>,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuffer {
    pub fn new() -> Self {
        Self {
            last_sequence: 0,
            suspended: HashMap::new(),
        }
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    /// Starts buffering input for `instance_id`. Returns false if it already was.
    pub fn suspend(&mut self, instance_id: &InstanceId) -> bool {
        if self.suspended.contains_key(instance_id) {
            return false;
        }
        debug!("suspending input of component instance {}", instance_id);
        self.suspended.insert(instance_id.clone(), SequenceList::new());
        true
    }

    pub fn is_suspended(&self, instance_id: &InstanceId) -> bool {
        self.suspended.contains_key(instance_id)
    }

    /// Buffers the event if its instance is suspended, otherwise hands it back
    pub fn buffer(&mut self, event: DownstreamEvent) -> Option<DownstreamEvent> {
        let Some(list) = self.suspended.get_mut(&event.instance) else {
            return Some(event);
        };
        trace!(
            "buffering event {} #{} for component instance {}",
            event.name,
            event.sequence,
            event.instance
        );
        let sequence = event.sequence;
        if list.try_insert_scan_from_back(sequence, event).is_err() {
            debug!("dropping duplicate event #{}", sequence);
        }
        None
    }

    pub fn buffered_len(&self, instance_id: &InstanceId) -> usize {
        self.suspended.get(instance_id).map_or(0, |list| list.len())
    }

    /// Returns what was held so far, in sequence order, and keeps buffering
    pub fn drain(&mut self, instance_id: &InstanceId) -> Vec<DownstreamEvent> {
        let Some(list) = self.suspended.get_mut(instance_id) else {
            return Vec::new();
        };
        list.drain_ordered().into_iter().map(|(_, event)| event).collect()
    }

    /// Stops buffering and returns what was held, in sequence order
    pub fn resume(&mut self, instance_id: &InstanceId) -> Vec<DownstreamEvent> {
        let Some(mut list) = self.suspended.remove(instance_id) else {
            return Vec::new();
        };
        debug!(
            "resuming input of component instance {} with {} buffered event(s)",
            instance_id,
            list.len()
        );
        list.drain_ordered().into_iter().map(|(_, event)| event).collect()
    }
}
