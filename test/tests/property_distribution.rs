/// PROPERTY-BASED TESTS: Distribution and event buffering invariants
///
/// Key invariants:
/// 1. A Distribution contains exactly what was added and not yet removed
/// 2. Buffered events come back in sequence order, each exactly once
/// 3. Migration options list executable candidates best first, zero-degree ones last
use std::collections::BTreeSet;

use mashup_client::EventBuffer;
use mashup_shared::{
    CapabilityCoverageRanker, CapabilityTriple, ComponentDescriptor, ComponentItem, ComponentTypeId,
    DVFeature, DeviceProfile, Distribution, DistributionModification, DistributionOptionsVector,
    DownstreamEvent, InstanceId, ModificationType, StaticCatalog,
};
use proptest::prelude::*;
use serde_json::Value;

fn item_strategy() -> impl Strategy<Value = ComponentItem> {
    (0u8..20, prop::sample::select(vec!["map", "chat", "player"]))
        .prop_map(|(index, kind)| ComponentItem::new(format!("i{}", index), kind))
}

proptest! {
    /// Containment follows adds and removes
    #[test]
    fn prop_distribution_tracks_adds_and_removes(
        adds in prop::collection::vec(item_strategy(), 0..30),
        removes in prop::collection::vec(item_strategy(), 0..30),
    ) {
        let mut distribution = Distribution::new("devA", "app@devA");
        let mut expected: Vec<ComponentItem> = Vec::new();

        for item in adds {
            let result = distribution.add_component(item.clone());
            if expected.contains(&item) {
                prop_assert!(result.is_err());
            } else {
                prop_assert!(result.is_ok());
                expected.push(item);
            }
        }
        for item in removes {
            let result = distribution.remove_component(&item);
            if let Some(index) = expected.iter().position(|existing| existing == &item) {
                prop_assert_eq!(result.ok(), Some(item));
                expected.remove(index);
            } else {
                prop_assert!(result.is_err());
            }
        }

        prop_assert_eq!(distribution.components(), expected.as_slice());
        for item in &expected {
            prop_assert!(distribution.contains_component(item.instance_id(), item.component_type_id()));
        }
    }

    /// Events arriving in any order while suspended are released sorted and deduplicated
    #[test]
    fn prop_buffered_events_resume_in_order(
        sequences in prop::collection::vec(1u64..200, 0..50),
    ) {
        let mut buffer = EventBuffer::new();
        let instance = InstanceId::from("i1");
        buffer.suspend(&instance);

        for sequence in &sequences {
            let event = DownstreamEvent::new("i1", *sequence, format!("e{}", sequence), Value::Null);
            prop_assert!(buffer.buffer(event).is_none());
        }

        let released: Vec<u64> = buffer.resume(&instance).into_iter().map(|event| event.sequence).collect();
        let expected: Vec<u64> = sequences.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        prop_assert_eq!(released, expected);
        prop_assert!(!buffer.is_suspended(&instance));
    }

    /// A modification needs at least one component and keeps them as given
    #[test]
    fn prop_modification_requires_components(
        components in prop::collection::vec(item_strategy(), 0..10),
        mod_type in prop::sample::select(vec![ModificationType::Create, ModificationType::Add, ModificationType::Rem]),
    ) {
        let result = DistributionModification::new("m1", mod_type, "devB", components.clone());
        match result {
            Ok(modification) => {
                prop_assert!(!components.is_empty());
                prop_assert_eq!(modification.mod_type(), mod_type);
                prop_assert_eq!(modification.components(), components.as_slice());
            }
            Err(_) => prop_assert!(components.is_empty()),
        }
    }

    /// Every requested type lands in exactly one partition, and candidates
    /// run on the device and come best first
    #[test]
    fn prop_options_partition_requested_types(
        has_gps in any::<bool>(),
        has_camera in any::<bool>(),
        has_screen in any::<bool>(),
        required in prop::collection::vec(
            prop::sample::select(vec!["map", "static-map", "photo", "chat", "unknown", "globe"]),
            0..8,
        ),
    ) {
        let gps = DVFeature::new("gps", "1", "sensor");
        let camera = DVFeature::new("camera", "1", "sensor");
        let screen = DVFeature::new("screen", "1", "display");
        let show = CapabilityTriple::new("view", "location", "show");
        let zoom = CapabilityTriple::new("view", "location", "zoom");

        let mut device = DeviceProfile::new("devB");
        for (present, feature) in [(has_gps, &gps), (has_camera, &camera), (has_screen, &screen)] {
            if present {
                device = device.with_feature(feature.clone());
            }
        }

        let mut catalog = StaticCatalog::new();
        catalog.register(
            ComponentDescriptor::new("map")
                .requires_feature(gps.clone())
                .requires_capability(show.clone())
                .requires_capability(zoom.clone()),
        );
        catalog.register(
            ComponentDescriptor::new("static-map")
                .requires_feature(screen.clone())
                .exposes_capability(show.clone()),
        );
        catalog.register(ComponentDescriptor::new("list-map").exposes_capability(show).exposes_capability(zoom));
        catalog.register(ComponentDescriptor::new("photo").requires_feature(camera.clone()));
        catalog.register(ComponentDescriptor::new("chat"));
        catalog.register(
            ComponentDescriptor::new("globe")
                .requires_feature(gps.clone())
                .requires_capability(CapabilityTriple::new("view", "planet", "spin")),
        );
        catalog.register_substitute("map", "static-map");
        catalog.register_substitute("map", "list-map");
        catalog.register_substitute("map", "chat");
        catalog.register_substitute("globe", "chat");

        let required: Vec<ComponentTypeId> = required.into_iter().map(ComponentTypeId::from).collect();
        let options = DistributionOptionsVector::compute(&device, &required, &catalog, &CapabilityCoverageRanker);

        let distinct: BTreeSet<&ComponentTypeId> = required.iter().collect();
        let partitioned = options.executables.len() + options.non_executables.len() + options.replaceables.len();
        prop_assert_eq!(partitioned, distinct.len());
        for component_type_id in distinct {
            let homes = usize::from(options.executables.iter().any(|i| &i.component_type_id == component_type_id))
                + usize::from(options.non_executables.iter().any(|i| &i.component_type_id == component_type_id))
                + usize::from(options.replacement_for(component_type_id).is_some());
            prop_assert_eq!(homes, 1);
        }

        for replacement in &options.replaceables {
            prop_assert!(!replacement.candidates.is_empty());
            for candidate in &replacement.candidates {
                prop_assert!(candidate.matching_degree <= 100);
                prop_assert!(device.supports_all(&candidate.component.required_features));
            }
            if let Some(best) = replacement.best_matching_candidate() {
                prop_assert!(best.matching_degree > 0);
                prop_assert_eq!(Some(best), replacement.best_candidate());
            }
            let degrees: Vec<u8> = replacement.candidates.iter().map(|c| c.matching_degree).collect();
            let mut sorted = degrees.clone();
            sorted.sort_by(|a, b| b.cmp(a));
            prop_assert_eq!(degrees, sorted);
        }

        // list-map needs nothing and covers the whole map
        if !has_gps && required.iter().any(|id| id.as_str() == "map") {
            let replacement = options.replacement_for(&ComponentTypeId::from("map"));
            prop_assert_eq!(
                replacement.and_then(|r| r.best_candidate()).map(|c| c.component.component_type_id.as_str()),
                Some("list-map")
            );
        }

        // chat stands in for a globe but covers none of it
        if !has_gps && required.iter().any(|id| id.as_str() == "globe") {
            let replacement = options.replacement_for(&ComponentTypeId::from("globe"));
            prop_assert!(replacement.is_some_and(|r| r.best_matching_candidate().is_none()));
        }
    }
}
