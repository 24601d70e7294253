use std::collections::{BTreeMap, HashMap};

use crate::{
    options::feature::{CapabilityTriple, DVFeature},
    types::ComponentTypeId,
};

/// Everything the matcher needs to know about one component type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub component_type_id: ComponentTypeId,
    pub required_features: Vec<DVFeature>,
    pub required_capabilities: Vec<CapabilityTriple>,
    pub exposed_capabilities: Vec<CapabilityTriple>,
}

impl ComponentDescriptor {
    pub fn new(component_type_id: impl Into<ComponentTypeId>) -> Self {
        Self {
            component_type_id: component_type_id.into(),
            required_features: Vec::new(),
            required_capabilities: Vec::new(),
            exposed_capabilities: Vec::new(),
        }
    }

    pub fn requires_feature(mut self, feature: DVFeature) -> Self {
        self.required_features.push(feature);
        self
    }

    pub fn requires_capability(mut self, capability: CapabilityTriple) -> Self {
        self.required_capabilities.push(capability);
        self
    }

    pub fn exposes_capability(mut self, capability: CapabilityTriple) -> Self {
        self.exposed_capabilities.push(capability);
        self
    }
}

/// Looks up component descriptors and their registered substitutes
pub trait ComponentCatalog {
    fn descriptor(&self, component_type_id: &ComponentTypeId) -> Option<&ComponentDescriptor>;

    /// Candidate substitutes for `component_type_id`, in registration order
    fn substitutes(&self, component_type_id: &ComponentTypeId) -> Vec<&ComponentDescriptor>;
}

/// In-memory catalog
#[derive(Default)]
pub struct StaticCatalog {
    descriptors: BTreeMap<ComponentTypeId, ComponentDescriptor>,
    substitutes: HashMap<ComponentTypeId, Vec<ComponentTypeId>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ComponentDescriptor) {
        self.descriptors
            .insert(descriptor.component_type_id.clone(), descriptor);
    }

    pub fn register_substitute(&mut self, original: impl Into<ComponentTypeId>, substitute: impl Into<ComponentTypeId>) {
        let list = self.substitutes.entry(original.into()).or_default();
        let substitute = substitute.into();
        if !list.contains(&substitute) {
            list.push(substitute);
        }
    }
}

impl ComponentCatalog for StaticCatalog {
    fn descriptor(&self, component_type_id: &ComponentTypeId) -> Option<&ComponentDescriptor> {
        self.descriptors.get(component_type_id)
    }

    fn substitutes(&self, component_type_id: &ComponentTypeId) -> Vec<&ComponentDescriptor> {
        let Some(ids) = self.substitutes.get(component_type_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.descriptors.get(id))
            .collect()
    }
}
