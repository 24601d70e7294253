/// Integration tests for Migrations between devices.
/// A migration moves running components: the Source suspends and
/// checkpoints them, tears them down on COMMIT, and the Target restores them
/// and replays the input buffered in between.
use std::time::Duration;

use serde_json::json;

use mashup_client::{
    RuntimeConfig, TransactionCancelledEvent, TransactionCompletedEvent, TransactionFailedEvent,
    TransactionPreparingEvent,
};
use mashup_shared::{
    ComponentTypeId, Envelope, InstanceId, ProtocolMessage, TransactionNotice, TransactionState,
};
use mashup_test::{add, item, laptop, phone, realize, rem, three_devices, tv, TestNetwork};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn instance(id: &str) -> InstanceId {
    InstanceId::from(id)
}

/// devA runs `i1` (a map, zoomed in) and `i2` (a camera feed)
fn network_with_components() -> TestNetwork {
    init_logger();
    let mut network = three_devices();
    realize(&mut network, "devA", vec![item("i1", "map")]);
    realize(&mut network, "devA", vec![item("i2", "camera-feed")]);
    network.components_mut("devA").set_property("i1", "zoom", 12);
    network.components_mut("devA").set_property("i1", "center", "48.85,2.35");
    network.runtime_mut("devA").take_events();
    network
}

#[test]
fn migrated_component_resumes_on_target_with_its_checkpoint() {
    let mut network = network_with_components();
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Completed)
    );

    // devA no longer hosts i1
    let source = network.runtime("devA").local_distribution();
    assert!(!source.contains_instance(&instance("i1")));
    assert!(source.contains_instance(&instance("i2")));
    assert!(!network.components("devA").is_running("i1"));

    // devB hosts it, restored from the checkpoint taken before teardown
    let target = network.runtime("devB").local_distribution();
    assert!(target.contains_component(&instance("i1"), &"map".into()));
    assert_eq!(network.components("devB").property("i1", "zoom"), Some(&json!(12)));
    assert_eq!(
        network.components("devB").property("i1", "center"),
        Some(&json!("48.85,2.35"))
    );
    let restored = network
        .components("devB")
        .running("i1")
        .and_then(|component| component.restored_from.clone())
        .expect("restored from checkpoint");
    assert_eq!(restored.instance_id(), &instance("i1"));

    let mut events = network.runtime_mut("devA").take_events();
    assert_eq!(events.read::<TransactionPreparingEvent>().count(), 1);
    assert_eq!(events.read::<TransactionCompletedEvent>().count(), 1);
}

#[test]
fn events_buffered_during_migration_reach_target_in_order_exactly_once() {
    let mut network = network_with_components();
    let now = network.now();

    network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    assert!(network.runtime("devA").is_suspended(&instance("i1")));

    for name in ["pan", "zoom-in", "tap", "zoom-out"] {
        network
            .runtime_mut("devA")
            .deliver_event(&instance("i1"), name, json!({ "by": "alice" }))
            .expect("suspended instances still accept events");
    }
    // events of other components are not held back
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i2"), "snap", json!(null))
        .expect("i2 is live");
    assert_eq!(network.components("devA").delivered_to("i2"), vec!["snap"]);
    assert!(network.components("devA").delivered_to("i1").is_empty());

    network.exchange_messages();

    assert_eq!(
        network.components("devB").delivered_to("i1"),
        vec!["pan", "zoom-in", "tap", "zoom-out"]
    );
    assert!(network.components("devA").delivered_to("i1").is_empty());
    assert!(!network.runtime("devA").is_suspended(&instance("i1")));

    // after the migration, input for i1 is addressed to devB
    assert!(network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "late", json!(null))
        .is_err());
    network
        .runtime_mut("devB")
        .deliver_event(&instance("i1"), "late", json!(null))
        .expect("i1 now runs on devB");
    assert_eq!(network.components("devB").delivered_to("i1").len(), 5);
}

#[test]
fn input_between_source_and_target_commit_reaches_the_target() {
    let mut network = network_with_components();
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "pan", json!(null))
        .expect("buffered");
    // PREPARE reaches devB, its acknowledgement reaches devA, which commits as Source
    network.exchange_round();
    network.exchange_round();
    assert!(!network.components("devA").is_running("i1"));
    assert!(!network.runtime("devB").local_distribution().contains_instance(&instance("i1")));

    // the Target has not committed yet, the Source still holds the input
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "tap", json!(null))
        .expect("held until the migration ends");
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "zoom-in", json!(null))
        .expect("held until the migration ends");
    assert!(network.runtime("devA").is_suspended(&instance("i1")));

    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Completed)
    );
    assert_eq!(
        network.components("devB").delivered_to("i1"),
        vec!["pan", "tap", "zoom-in"]
    );
    assert!(network.components("devA").delivered_to("i1").is_empty());
    assert!(!network.runtime("devA").is_suspended(&instance("i1")));
}

#[test]
fn input_between_commits_is_replayed_on_a_restored_source() {
    let mut network = network_with_components();
    network.components_mut("devB").fail_instantiate("i1");
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "pan", json!(null))
        .expect("buffered");
    network.exchange_round();
    network.exchange_round();
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "tap", json!(null))
        .expect("held until the migration ends");

    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Failed)
    );
    assert!(network.components("devA").is_running("i1"));
    assert_eq!(network.components("devA").delivered_to("i1"), vec!["pan", "tap"]);
    assert!(!network.runtime("devA").is_suspended(&instance("i1")));
    assert!(network.components("devB").delivered_to("i1").is_empty());
}

#[test]
fn late_input_reaches_a_target_when_a_third_device_coordinates() {
    let mut network = network_with_components();
    network.publish_distributions();
    let now = network.now();

    network
        .runtime_mut("devC")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    // PREPARE, acknowledgements, then the Source COMMIT reaches devA
    network.exchange_round();
    network.exchange_round();
    network.exchange_round();
    assert!(!network.components("devA").is_running("i1"));
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "swipe", json!({ "dx": 3 }))
        .expect("held until the migration ends");

    network.exchange_messages();

    assert_eq!(network.components("devB").delivered_to("i1"), vec!["swipe"]);
    assert!(!network.runtime("devA").is_suspended(&instance("i1")));
}

#[test]
fn migration_over_the_wire_completes() {
    init_logger();
    let mut network = TestNetwork::new().over_the_wire();
    network.add_device(phone());
    network.add_device(laptop());
    network.add_device(tv());
    realize(&mut network, "devA", vec![item("i1", "map")]);
    network.components_mut("devA").set_property("i1", "zoom", 3);

    let now = network.now();
    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "pan", json!({ "dx": 4, "dy": -2 }))
        .expect("buffered");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Completed)
    );
    assert_eq!(network.components("devB").property("i1", "zoom"), Some(&json!(3)));
    let delivered = network.components("devB").delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload, json!({ "dx": 4, "dy": -2 }));
}

#[test]
fn third_device_can_coordinate() {
    let mut network = network_with_components();
    network.publish_distributions();
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devC")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devC").transaction_state(&transaction_id),
        Some(TransactionState::Completed)
    );
    assert!(network.runtime("devB").local_distribution().contains_instance(&instance("i1")));
    assert!(!network.runtime("devA").local_distribution().contains_instance(&instance("i1")));
    assert_eq!(network.runtime("devA").transaction_state(&transaction_id), None);
}

#[test]
fn component_runs_as_substitute_when_target_lacks_features() {
    let mut network = network_with_components();
    let now = network.now();

    network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devC", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_messages();

    let hosted = network
        .runtime("devC")
        .local_distribution()
        .get_component(&instance("i1"))
        .cloned()
        .expect("devC hosts i1");
    assert_eq!(hosted.component_type_id(), &ComponentTypeId::from("static-map"));
    assert_eq!(network.components("devC").property("i1", "zoom"), Some(&json!(12)));
}

#[test]
fn substitute_covering_nothing_is_not_a_placement() {
    let mut network = network_with_components();
    realize(&mut network, "devA", vec![item("i3", "route-planner")]);
    network.runtime_mut("devA").take_events();
    let now = network.now();

    let options = network
        .runtime("devA")
        .request_current_migration_options(&"devC".into())
        .expect("devC is registered");
    let replacement = options
        .replacement_for(&ComponentTypeId::from("route-planner"))
        .expect("text-map is listed");
    assert_eq!(replacement.candidates.len(), 1);
    assert_eq!(replacement.candidates[0].matching_degree, 0);

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devC", vec![item("i3", "route-planner")])], now)
        .expect("migration starts");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Cancelled)
    );
    assert!(network.components("devA").is_running("i3"));
    assert!(!network.runtime("devC").local_distribution().contains_instance(&instance("i3")));
    let mut events = network.runtime_mut("devA").take_events();
    let cancelled: Vec<_> = events.read::<TransactionCancelledEvent>().collect();
    assert!(cancelled[0]
        .reason
        .as_deref()
        .is_some_and(|reason| reason.contains("route-planner")));
}

#[test]
fn one_incapable_target_cancels_the_whole_migration() {
    let mut network = network_with_components();
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration(
            "devA",
            vec![
                add("m1", "devB", vec![item("i1", "map")]),
                add("m2", "devC", vec![item("i2", "camera-feed")]),
            ],
            now,
        )
        .expect("migration starts");
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "pan", json!(null))
        .expect("buffered");
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "tap", json!(null))
        .expect("buffered");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Cancelled)
    );

    // the source Distribution is unchanged
    let source = network.runtime("devA").local_distribution();
    assert!(source.contains_component(&instance("i1"), &"map".into()));
    assert!(source.contains_component(&instance("i2"), &"camera-feed".into()));
    assert!(network.components("devA").is_running("i1"));
    assert!(network.components("devA").is_running("i2"));
    assert!(!network.runtime("devA").is_suspended(&instance("i1")));
    assert!(!network.runtime("devA").is_suspended(&instance("i2")));

    // the capable target did not start anything
    assert!(!network.runtime("devB").local_distribution().contains_instance(&instance("i1")));
    assert_eq!(network.components("devB").running_count(), 0);

    // input held during PREPARE is delivered on the source, in order
    assert_eq!(network.components("devA").delivered_to("i1"), vec!["pan", "tap"]);

    let mut events = network.runtime_mut("devA").take_events();
    let cancelled: Vec<_> = events.read::<TransactionCancelledEvent>().collect();
    assert_eq!(cancelled.len(), 1);
    assert!(cancelled[0]
        .reason
        .as_deref()
        .is_some_and(|reason| reason.contains("devC")));
}

#[test]
fn target_commit_failure_restores_the_source() {
    let mut network = network_with_components();
    network.components_mut("devB").fail_instantiate("i1");
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "pan", json!(null))
        .expect("buffered");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Failed)
    );

    // devA tore i1 down on COMMIT, then restored it from its backup
    assert_eq!(network.components("devA").torn_down(), &[instance("i1")]);
    assert!(network.runtime("devA").local_distribution().contains_instance(&instance("i1")));
    assert_eq!(network.components("devA").property("i1", "zoom"), Some(&json!(12)));
    assert_eq!(network.components("devA").delivered_to("i1"), vec!["pan"]);

    assert!(!network.runtime("devB").local_distribution().contains_instance(&instance("i1")));

    let mut events = network.runtime_mut("devA").take_events();
    assert_eq!(events.read::<TransactionFailedEvent>().count(), 1);
}

#[test]
fn source_teardown_failure_keeps_components_on_source() {
    let mut network = network_with_components();
    network.components_mut("devA").fail_teardown("i2");
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration(
            "devA",
            vec![
                add("m2", "devB", vec![item("i1", "map")]),
                rem("m3", "devA", vec![item("i2", "camera-feed")]),
            ],
            now,
        )
        .expect("migration starts");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Failed)
    );
    let source = network.runtime("devA").local_distribution();
    assert!(source.contains_instance(&instance("i1")));
    assert!(source.contains_instance(&instance("i2")));
    assert!(network.components("devA").is_running("i1"));
    assert!(network.components("devA").is_running("i2"));
    assert_eq!(network.components("devB").running_count(), 0);
}

#[test]
fn rem_removes_a_component_without_a_target() {
    let mut network = network_with_components();
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![rem("m1", "devA", vec![item("i2", "camera-feed")])], now)
        .expect("migration starts");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Completed)
    );
    assert!(!network.runtime("devA").local_distribution().contains_instance(&instance("i2")));
    assert!(!network.components("devA").is_running("i2"));
    assert!(network.components("devA").is_running("i1"));
}

#[test]
fn prepare_timeout_cancels_and_resumes_the_source() {
    let mut network = network_with_components();
    network.set_offline("devB", true);
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_messages();
    network
        .runtime_mut("devA")
        .deliver_event(&instance("i1"), "pan", json!(null))
        .expect("buffered");

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Preparing)
    );
    assert_eq!(network.runtime("devA").get_preparing_modifications().len(), 1);

    network.advance(Duration::from_secs(11));

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Cancelled)
    );
    assert!(!network.runtime("devA").is_suspended(&instance("i1")));
    assert_eq!(network.components("devA").delivered_to("i1"), vec!["pan"]);
    assert!(network.runtime("devA").get_preparing_modifications().is_empty());
}

#[test]
fn silent_target_during_commit_restores_the_source() {
    let mut network = network_with_components();
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    // PREPARE reaches devB, its acknowledgement reaches devA
    network.exchange_round();
    network.exchange_round();
    assert!(!network.runtime("devA").local_distribution().contains_instance(&instance("i1")));

    network.set_offline("devB", true);
    network.advance(Duration::from_secs(31));

    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Failed)
    );
    assert!(network.runtime("devA").local_distribution().contains_instance(&instance("i1")));
    assert_eq!(network.components("devA").property("i1", "zoom"), Some(&json!(12)));
}

#[test]
fn restore_after_grace_period_is_reported() {
    init_logger();
    let mut network = TestNetwork::new();
    let config = RuntimeConfig {
        checkpoint_grace_period: Duration::from_secs(1),
        ..Default::default()
    };
    network.add_device_with_config(phone(), config);
    network.add_device(laptop());
    realize(&mut network, "devA", vec![item("i1", "map")]);
    let now = network.now();

    network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_round();
    network.exchange_round();

    network.set_offline("devB", true);
    network.advance(Duration::from_secs(2));
    network.advance(Duration::from_secs(30));

    let mut events = network.runtime_mut("devA").take_events();
    assert_eq!(events.read::<TransactionFailedEvent>().count(), 1);
    let errors: Vec<_> = events.read::<mashup_client::ErrorEvent>().collect();
    assert!(errors
        .iter()
        .any(|error| matches!(error, mashup_client::RuntimeError::BackupUnavailable { .. })));
    assert!(!network.runtime("devA").local_distribution().contains_instance(&instance("i1")));
}

#[test]
fn cancel_is_idempotent_and_refused_during_commit() {
    let mut network = network_with_components();
    network.set_offline("devB", true);
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network
        .runtime_mut("devA")
        .cancel_transaction(&transaction_id, "user changed their mind", now)
        .expect("cancel before commit");
    network
        .runtime_mut("devA")
        .cancel_transaction(&transaction_id, "again", now)
        .expect("second cancel is a no-op");
    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Cancelled)
    );
    assert!(network.components("devA").is_running("i1"));
    assert!(!network.runtime("devA").is_suspended(&instance("i1")));

    network.set_offline("devB", false);
    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m2", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_round();
    network.exchange_round();
    assert!(network
        .runtime_mut("devA")
        .cancel_transaction(&transaction_id, "too late", now)
        .is_err());

    network.exchange_messages();
    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Completed)
    );
    assert!(network
        .runtime_mut("devA")
        .cancel_transaction(&transaction_id, "after the fact", now)
        .is_err());
}

#[test]
fn participant_may_cancel_before_commit() {
    let mut network = network_with_components();
    network.publish_distributions();
    network.set_offline("devB", true);
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devC")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    // devA prepares, its acknowledgement is still queued
    network.exchange_round();
    assert!(network.runtime("devA").is_suspended(&instance("i1")));

    network
        .runtime_mut("devA")
        .cancel_transaction(&transaction_id, "user is still looking at the map", now)
        .expect("source leaves before commit");
    assert!(!network.runtime("devA").is_suspended(&instance("i1")));
    network.exchange_messages();

    assert_eq!(
        network.runtime("devC").transaction_state(&transaction_id),
        Some(TransactionState::Cancelled)
    );
    assert!(network.components("devA").is_running("i1"));
    assert!(network.runtime("devA").local_distribution().contains_instance(&instance("i1")));
}

#[test]
fn busy_instance_rejects_a_second_migration() {
    let mut network = network_with_components();
    network.set_offline("devB", true);
    let now = network.now();

    let first = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    let second = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m2", "devC", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_messages();

    assert_eq!(
        network.runtime("devA").transaction_state(&first),
        Some(TransactionState::Preparing)
    );
    assert_eq!(
        network.runtime("devA").transaction_state(&second),
        Some(TransactionState::Cancelled)
    );
    assert!(network.runtime("devA").is_suspended(&instance("i1")));
}

#[test]
fn silent_coordinator_lets_the_source_resume() {
    let mut network = network_with_components();
    network.publish_distributions();
    let now = network.now();

    network
        .runtime_mut("devC")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.set_offline("devB", true);
    network.exchange_round();
    assert!(network.runtime("devA").is_suspended(&instance("i1")));

    network.set_offline("devC", true);
    network.advance(Duration::from_secs(41));

    assert!(!network.runtime("devA").is_suspended(&instance("i1")));
    assert!(network.components("devA").is_running("i1"));
    assert!(network.runtime("devA").get_preparing_modifications().is_empty());
}

#[test]
fn finished_transactions_are_forgotten_after_retention() {
    init_logger();
    let mut network = TestNetwork::new();
    let config = RuntimeConfig {
        transaction_retention: Duration::from_secs(5),
        ..Default::default()
    };
    network.add_device_with_config(phone(), config);
    network.add_device(laptop());
    realize(&mut network, "devA", vec![item("i1", "map")]);
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_messages();
    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Completed)
    );

    network.advance(Duration::from_secs(4));
    assert_eq!(
        network.runtime("devA").transaction_state(&transaction_id),
        Some(TransactionState::Completed)
    );

    network.advance(Duration::from_secs(2));
    assert_eq!(network.runtime("devA").transaction_state(&transaction_id), None);
    let now = network.now();
    assert!(matches!(
        network
            .runtime_mut("devA")
            .cancel_transaction(&transaction_id, "long gone", now),
        Err(mashup_client::RuntimeError::UnknownTransaction { .. })
    ));
}

#[test]
fn expired_backup_is_only_reported_during_retention() {
    init_logger();
    let mut network = TestNetwork::new();
    let config = RuntimeConfig {
        checkpoint_grace_period: Duration::from_secs(1),
        transaction_retention: Duration::from_secs(5),
        ..Default::default()
    };
    network.add_device_with_config(phone(), config);
    network.add_device(laptop());
    realize(&mut network, "devA", vec![item("i1", "map")]);
    let now = network.now();

    let transaction_id = network
        .runtime_mut("devA")
        .request_migration("devA", vec![add("m1", "devB", vec![item("i1", "map")])], now)
        .expect("migration starts");
    network.exchange_round();
    network.exchange_round();
    network.set_offline("devB", true);
    network.advance(Duration::from_secs(2));

    let restore = || {
        Envelope::new(
            "devB".into(),
            "devA".into(),
            ProtocolMessage::MigrationRestore(TransactionNotice::new(transaction_id.clone(), "crash")),
        )
    };
    let now = network.now();
    assert!(matches!(
        network.runtime_mut("devA").receive_message(restore(), now),
        Err(mashup_client::RuntimeError::BackupUnavailable { .. })
    ));

    network.advance(Duration::from_secs(5));
    let now = network.now();
    assert!(network.runtime_mut("devA").receive_message(restore(), now).is_ok());
}
