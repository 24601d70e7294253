/// Integration tests for inbound messages that are malformed, misrouted or
/// refer to transactions the device does not know.
use mashup_client::RuntimeError;
use mashup_shared::{
    CommitReply, Envelope, MigrationRequestParams, PrepareOutcome, PrepareReply, ProtocolMessage,
    Role, SessionId, TransactionKind, ValidationError,
};
use mashup_test::{item, realize, three_devices, TestNetwork};
use serde_json::json;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn network() -> TestNetwork {
    init_logger();
    let mut network = three_devices();
    realize(&mut network, "devA", vec![item("i1", "chat")]);
    network
}

fn prepare_envelope(params: serde_json::Value) -> Envelope {
    let params: MigrationRequestParams = serde_json::from_value(params).expect("params deserialize");
    Envelope::new(
        SessionId::from("devC"),
        SessionId::from("devA"),
        ProtocolMessage::MigrationPrepare(params),
    )
}

fn migration_json() -> serde_json::Value {
    json!({
        "mid": "devC-mig-7",
        "initdev": "devC",
        "srcdev": "devA",
        "modifications": [{
            "modid": "m1",
            "type": "ADD",
            "target": "devB",
            "components": [{ "instance": "i1", "component": "chat" }]
        }]
    })
}

#[test]
fn request_without_role_is_rejected_by_field() {
    let mut network = network();
    let now = network.now();

    let envelope = prepare_envelope(json!({ "migration": migration_json() }));
    let result = network.runtime_mut("devA").receive_message(envelope, now);

    match result {
        Err(RuntimeError::Validation(ValidationError::MissingField { field })) => {
            assert_eq!(field, "crole");
        }
        other => panic!("expected a missing crole, got {:?}", other),
    }
    assert!(network.runtime_mut("devA").take_outgoing_messages().is_empty());
    // nothing was suspended
    assert!(!network.runtime("devA").is_suspended(&"i1".into()));
}

#[test]
fn request_with_unknown_role_is_rejected() {
    let mut network = network();
    let now = network.now();

    let envelope = prepare_envelope(json!({ "crole": "observer", "migration": migration_json() }));
    let result = network.runtime_mut("devA").receive_message(envelope, now);

    assert!(matches!(
        result,
        Err(RuntimeError::Validation(ValidationError::InvalidRole { field: "crole", .. }))
    ));
}

#[test]
fn modification_without_target_names_its_path() {
    let mut network = network();
    let now = network.now();

    let mut migration = migration_json();
    migration["modifications"][0]
        .as_object_mut()
        .expect("modification object")
        .remove("target");
    let envelope = prepare_envelope(json!({ "crole": "source", "migration": migration }));
    let result = network.runtime_mut("devA").receive_message(envelope, now);

    match result {
        Err(RuntimeError::Validation(ValidationError::MissingField { field })) => {
            assert_eq!(field, "migration.modifications[0].target");
        }
        other => panic!("expected a missing target, got {:?}", other),
    }
}

#[test]
fn hand_written_prepare_is_answered() {
    let mut network = network();
    let now = network.now();

    let envelope = prepare_envelope(json!({ "crole": "source", "migration": migration_json() }));
    network
        .runtime_mut("devA")
        .receive_message(envelope, now)
        .expect("valid prepare");

    assert!(network.runtime("devA").is_suspended(&"i1".into()));
    let outgoing = network.runtime_mut("devA").take_outgoing_messages();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].to, SessionId::from("devC"));
    match &outgoing[0].message {
        ProtocolMessage::PrepareReply(reply) => {
            assert_eq!(reply.role, Role::Source);
            match &reply.outcome {
                PrepareOutcome::Accepted { checkpoints } => assert_eq!(checkpoints.len(), 1),
                PrepareOutcome::Rejected { reason } => panic!("prepare rejected: {}", reason),
            }
        }
        other => panic!("expected a prepare reply, got {}", other.name()),
    }
}

#[test]
fn misrouted_envelope_is_refused() {
    let mut network = network();
    let now = network.now();

    let envelope = Envelope::new(
        SessionId::from("devC"),
        SessionId::from("devB"),
        ProtocolMessage::PrepareReply(PrepareReply::accepted(
            "devA-mig-1".into(),
            TransactionKind::Migration,
            Role::Target,
            Vec::new(),
        )),
    );
    let result = network.runtime_mut("devA").receive_message(envelope, now);

    assert!(matches!(result, Err(RuntimeError::Misrouted { .. })));
}

#[test]
fn reply_for_unknown_transaction_is_an_error() {
    let mut network = network();
    let now = network.now();

    let envelope = Envelope::new(
        SessionId::from("devB"),
        SessionId::from("devA"),
        ProtocolMessage::CommitReply(CommitReply::committed(
            "devA-mig-99".into(),
            TransactionKind::Migration,
            Role::Target,
            Vec::new(),
        )),
    );
    let result = network.runtime_mut("devA").receive_message(envelope, now);

    assert!(matches!(result, Err(RuntimeError::UnknownTransaction { .. })));
}

#[test]
fn late_reply_for_a_finished_transaction_is_ignored() {
    let mut network = network();
    let now = network.now();
    let transaction_id = realize(&mut network, "devA", vec![item("i2", "chat")]);

    let envelope = Envelope::new(
        SessionId::from("devB"),
        SessionId::from("devA"),
        ProtocolMessage::PrepareReply(PrepareReply::accepted(
            transaction_id,
            TransactionKind::Realization,
            Role::Target,
            Vec::new(),
        )),
    );

    assert!(network.runtime_mut("devA").receive_message(envelope, now).is_ok());
}

#[test]
fn garbage_on_the_wire_is_malformed() {
    assert!(matches!(
        Envelope::decode("not json"),
        Err(ValidationError::Malformed { .. })
    ));
    assert!(matches!(
        Envelope::decode(r#"{"from":"devA","to":"devB","message":{"kind":"launch","body":{}}}"#),
        Err(ValidationError::Malformed { .. })
    ));
}
