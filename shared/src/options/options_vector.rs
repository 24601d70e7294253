use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    options::{
        catalog::{ComponentCatalog, ComponentDescriptor},
        feature::{DVFeature, DeviceProfile},
        ranker::SubstituteRanker,
    },
    types::ComponentTypeId,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DVComponentItem {
    pub component_type_id: ComponentTypeId,
    pub required_features: Vec<DVFeature>,
}

impl From<&ComponentDescriptor> for DVComponentItem {
    fn from(descriptor: &ComponentDescriptor) -> Self {
        Self {
            component_type_id: descriptor.component_type_id.clone(),
            required_features: descriptor.required_features.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DVCandidateItem {
    pub component: DVComponentItem,
    pub matching_degree: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DVReplacementItem {
    pub component: DVComponentItem,
    /// Sorted by descending matching degree, ties by candidate id
    pub candidates: Vec<DVCandidateItem>,
}

impl DVReplacementItem {
    pub fn best_candidate(&self) -> Option<&DVCandidateItem> {
        self.candidates.first()
    }

    /// Best candidate that covers at least part of the original
    pub fn best_matching_candidate(&self) -> Option<&DVCandidateItem> {
        self.best_candidate()
            .filter(|candidate| candidate.matching_degree > 0)
    }
}

/// Capability-matching result for one device.
///
/// Each requested component id lands in exactly one of the three partitions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionOptionsVector {
    pub executables: Vec<DVComponentItem>,
    pub non_executables: Vec<DVComponentItem>,
    pub replaceables: Vec<DVReplacementItem>,
}

/// True iff every required feature of the descriptor is advertised by the device
pub fn is_executable(descriptor: &ComponentDescriptor, device: &DeviceProfile) -> bool {
    device.supports_all(&descriptor.required_features)
}

impl DistributionOptionsVector {
    /// Partitions `required` against what `device` can run.
    ///
    /// Types unknown to the catalog are non-executable. Substitutes qualify
    /// as candidates if they are themselves executable on the device. Those
    /// scoring a zero matching degree are listed last.
    pub fn compute(
        device: &DeviceProfile,
        required: &[ComponentTypeId],
        catalog: &dyn ComponentCatalog,
        ranker: &dyn SubstituteRanker,
    ) -> Self {
        let mut options = Self::default();
        let mut seen: HashSet<&ComponentTypeId> = HashSet::new();

        for component_type_id in required {
            if !seen.insert(component_type_id) {
                continue;
            }

            let Some(descriptor) = catalog.descriptor(component_type_id) else {
                debug!(
                    "component type {} unknown to catalog, not executable on {}",
                    component_type_id,
                    device.session_id()
                );
                options.non_executables.push(DVComponentItem {
                    component_type_id: component_type_id.clone(),
                    required_features: Vec::new(),
                });
                continue;
            };

            if is_executable(descriptor, device) {
                options.executables.push(DVComponentItem::from(descriptor));
                continue;
            }

            let mut candidates: Vec<DVCandidateItem> = catalog
                .substitutes(component_type_id)
                .into_iter()
                .filter(|candidate| candidate.component_type_id != *component_type_id)
                .filter(|candidate| is_executable(candidate, device))
                .map(|candidate| DVCandidateItem {
                    component: DVComponentItem::from(candidate),
                    matching_degree: ranker.matching_degree(descriptor, candidate).min(100),
                })
                .collect();

            if candidates.is_empty() {
                options.non_executables.push(DVComponentItem::from(descriptor));
                continue;
            }

            candidates.sort_by(|a, b| {
                b.matching_degree
                    .cmp(&a.matching_degree)
                    .then_with(|| a.component.component_type_id.cmp(&b.component.component_type_id))
            });
            options.replaceables.push(DVReplacementItem {
                component: DVComponentItem::from(descriptor),
                candidates,
            });
        }

        options
    }

    /// Looks in executables, then non-executables, then replaceables
    pub fn get_component_item(&self, component_type_id: &ComponentTypeId) -> Option<&DVComponentItem> {
        self.executables
            .iter()
            .chain(self.non_executables.iter())
            .chain(self.replaceables.iter().map(|r| &r.component))
            .find(|item| item.component_type_id == *component_type_id)
    }

    pub fn replacement_for(&self, component_type_id: &ComponentTypeId) -> Option<&DVReplacementItem> {
        self.replaceables
            .iter()
            .find(|r| r.component.component_type_id == *component_type_id)
    }

    pub fn is_fully_executable(&self) -> bool {
        self.non_executables.is_empty()
    }

    pub fn non_executable_ids(&self) -> Vec<&ComponentTypeId> {
        self.non_executables
            .iter()
            .map(|item| &item.component_type_id)
            .collect()
    }
}
