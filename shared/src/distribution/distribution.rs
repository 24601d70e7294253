use std::mem;

use log::trace;

use crate::{
    distribution::{channel::Channel, component_item::ComponentItem, error::DistributionError},
    types::{ComponentTypeId, InstanceId, SessionId},
};

/// One CHANGED notification emitted by a Distribution mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DistributionChange {
    ComponentAdded(ComponentItem),
    ComponentRemoved(ComponentItem),
    ChannelAdded(String),
    ChannelUpdated(String),
    ChannelRemoved(String),
}

/// The components and channels one device hosts for one application.
///
/// Components are unique by instance id, channels by name. Every successful
/// mutation queues a `DistributionChange`, drained with `take_changes()`.
#[derive(Clone, Debug)]
pub struct Distribution {
    session_id: SessionId,
    distribution_id: String,
    components: Vec<ComponentItem>,
    channels: Vec<Channel>,
    changes: Vec<DistributionChange>,
}

impl Distribution {
    pub fn new(session_id: impl Into<SessionId>, distribution_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            distribution_id: distribution_id.into(),
            components: Vec::new(),
            channels: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn distribution_id(&self) -> &str {
        &self.distribution_id
    }

    pub fn components(&self) -> &[ComponentItem] {
        &self.components
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn index_of(&self, item: &ComponentItem) -> Option<usize> {
        self.components.iter().position(|existing| existing == item)
    }

    pub fn add_component(&mut self, item: ComponentItem) -> Result<(), DistributionError> {
        if self.index_of(&item).is_some() {
            return Err(DistributionError::DuplicateComponent {
                distribution_id: self.distribution_id.clone(),
                instance_id: item.instance_id().to_string(),
            });
        }

        trace!(
            "distribution {} adds component {}",
            self.distribution_id,
            item.instance_id()
        );
        self.components.push(item.clone());
        self.changes.push(DistributionChange::ComponentAdded(item));
        Ok(())
    }

    pub fn remove_component(&mut self, item: &ComponentItem) -> Result<ComponentItem, DistributionError> {
        let Some(index) = self.index_of(item) else {
            return Err(DistributionError::ComponentNotFound {
                distribution_id: self.distribution_id.clone(),
                instance_id: item.instance_id().to_string(),
            });
        };

        trace!(
            "distribution {} removes component {}",
            self.distribution_id,
            item.instance_id()
        );
        let removed = self.components.remove(index);
        self.changes
            .push(DistributionChange::ComponentRemoved(removed.clone()));
        Ok(removed)
    }

    pub fn contains_component(
        &self,
        instance_id: &InstanceId,
        component_type_id: &ComponentTypeId,
    ) -> bool {
        self.components
            .iter()
            .any(|item| item.matches(instance_id, component_type_id))
    }

    pub fn contains_instance(&self, instance_id: &InstanceId) -> bool {
        self.get_component(instance_id).is_some()
    }

    pub fn get_component(&self, instance_id: &InstanceId) -> Option<&ComponentItem> {
        self.components
            .iter()
            .find(|item| item.instance_id() == instance_id)
    }

    /// Adds the channel, replacing any channel with the same name
    pub fn add_channel(&mut self, channel: Channel) {
        let name = channel.name().to_string();
        match self.channels.iter_mut().find(|c| c.name() == name) {
            Some(existing) => {
                *existing = channel;
                self.changes.push(DistributionChange::ChannelUpdated(name));
            }
            None => {
                self.channels.push(channel);
                self.changes.push(DistributionChange::ChannelAdded(name));
            }
        }
    }

    pub fn remove_channel(&mut self, name: &str) -> Result<Channel, DistributionError> {
        let Some(index) = self.channels.iter().position(|c| c.name() == name) else {
            return Err(DistributionError::ChannelNotFound {
                distribution_id: self.distribution_id.clone(),
                channel_name: name.to_string(),
            });
        };

        let removed = self.channels.remove(index);
        self.changes
            .push(DistributionChange::ChannelRemoved(name.to_string()));
        Ok(removed)
    }

    pub fn get_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name() == name)
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn take_changes(&mut self) -> Vec<DistributionChange> {
        mem::take(&mut self.changes)
    }
}
