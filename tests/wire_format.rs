//! Wire-format tests: exact JSON shapes, decoding failures, and
//! case-insensitive enum parsing.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use uuid::Uuid;

use ailoop_sdk::codec;
use ailoop_sdk::{
    DependencyType, FixedClock, Message, MessageContent, MessageFactory, NotificationPriority,
    ResponseType, SenderType, Task, TaskState, DEFAULT_AUTHORIZATION_TIMEOUT_SECS,
    DEFAULT_QUESTION_TIMEOUT_SECS,
};

fn factory() -> MessageFactory<FixedClock> {
    MessageFactory::new(FixedClock(
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
    ))
}

// ─── Encoding ───────────────────────────────────────────────────────────────

#[test]
fn test_notification_wire_shape() {
    let message = factory()
        .create_notification("ops", "disk 90% full", NotificationPriority::High)
        .unwrap();
    let value = codec::encode_value(&message).unwrap();

    assert_eq!(
        value,
        json!({
            "id": message.id.to_string(),
            "channel": "ops",
            "sender_type": "AGENT",
            "content": {
                "type": "notification",
                "text": "disk 90% full",
                "priority": "high"
            },
            "timestamp": "2024-01-15T12:00:00Z",
            "correlation_id": null
        })
    );
}

#[test]
fn test_field_order_is_stable() {
    let message = factory()
        .create_question("public", "Proceed?", None, Some(vec!["yes".into(), "no".into()]))
        .unwrap();
    let json = codec::encode(&message).unwrap();

    let keys = ["\"id\"", "\"channel\"", "\"sender_type\"", "\"content\"", "\"timestamp\""];
    let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
    assert_eq!(json, codec::encode(&message).unwrap());
}

#[test]
fn test_task_update_wire_shape() {
    let message = factory()
        .create_task_update("builds", "task-7", TaskState::Abandoned)
        .unwrap();
    let value = message.to_value().unwrap();
    assert_eq!(
        value["content"],
        json!({
            "type": "task_update",
            "task_id": "task-7",
            "state": "abandoned",
            "updated_at": "2024-01-15T12:00:00Z"
        })
    );
}

#[test]
fn test_task_create_embeds_task_snapshot() {
    let f = factory();
    let task = Task::new("task-1", "Ship", "Release 0.2", f.clock().0).with_assignee("ops");
    let message = f.create_task_create("builds", task.clone()).unwrap();
    let value = message.to_value().unwrap();
    assert_eq!(value["content"]["type"], "task_create");
    assert_eq!(value["content"]["task"]["id"], "task-1");
    assert_eq!(value["content"]["task"]["depends_on"], json!([]));

    let decoded = Message::from_value(value).unwrap();
    assert_eq!(decoded.content, MessageContent::TaskCreate { task });
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

#[test]
fn test_notification_round_trip_keeps_priority() {
    let message = Message::create_notification("ops", "disk 90% full", NotificationPriority::High)
        .unwrap();
    let decoded = codec::decode(&codec::encode(&message).unwrap()).unwrap();

    assert_eq!(decoded.sender_type, SenderType::Agent);
    assert!(matches!(
        decoded.content,
        MessageContent::Notification {
            priority: NotificationPriority::High,
            ..
        }
    ));
    assert_eq!(decoded, message);
}

#[test]
fn test_timeout_response_round_trip_without_answer() {
    let original = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
    let message = Message::create_response("ops", original, None, ResponseType::Timeout).unwrap();

    let decoded = Message::from_json(&message.to_json().unwrap()).unwrap();
    assert_eq!(decoded.sender_type, SenderType::Human);
    assert_eq!(decoded.correlation_id, Some(original));
    assert_eq!(
        decoded.content,
        MessageContent::Response {
            answer: None,
            response_type: ResponseType::Timeout,
        }
    );
}

#[test]
fn test_default_timeouts() {
    let question = Message::create_question("ops", "Why?", None, None).unwrap();
    let authorization = Message::create_authorization("ops", "rm -rf build/", None, None).unwrap();

    assert!(matches!(
        question.content,
        MessageContent::Question {
            timeout_seconds: 60,
            ..
        }
    ));
    assert!(matches!(
        authorization.content,
        MessageContent::Authorization {
            timeout_seconds: 300,
            ..
        }
    ));
    assert_eq!(DEFAULT_QUESTION_TIMEOUT_SECS, 60);
    assert_eq!(DEFAULT_AUTHORIZATION_TIMEOUT_SECS, 300);
}

#[test]
fn test_decode_server_message_with_extra_fields() {
    let decoded = codec::decode(
        r#"{
            "id": "6f1f6c1e-7a1e-4c7b-9f51-6c7b1a2f9e10",
            "channel": "public",
            "sender_type": "AGENT",
            "content": {"type": "question", "text": "Proceed?", "timeout_seconds": 30},
            "timestamp": "2024-01-15T12:00:00.123456Z",
            "correlation_id": null,
            "metadata": {"source": "ci"},
            "delivered": true
        }"#,
    )
    .unwrap();

    assert_eq!(decoded.channel, "public");
    assert_eq!(decoded.metadata.unwrap()["source"], "ci");
    assert_eq!(
        decoded.timestamp,
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456)
    );
}

#[test]
fn test_metadata_floats_round_trip_exactly() {
    let ratios = [
        1.0715660391465826e-75,
        -1.81996730402717e-179,
        -1.603964615428183e143,
        -9.643915712060552e-234,
        0.1,
        f64::MAX,
        f64::MIN_POSITIVE,
    ];
    for ratio in ratios {
        let mut metadata = serde_json::Map::new();
        metadata.insert("ratio".into(), json!(ratio));
        let message = Message::create_notification("ops", "load", NotificationPriority::Low)
            .unwrap()
            .with_metadata(metadata);

        let decoded = codec::decode(&codec::encode(&message).unwrap()).unwrap();
        assert_eq!(decoded, message, "ratio {ratio:e} changed on the wire");
    }
}

// ─── Decoding Failures ──────────────────────────────────────────────────────

fn with_content(content: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "6f1f6c1e-7a1e-4c7b-9f51-6c7b1a2f9e10",
        "channel": "public",
        "sender_type": "AGENT",
        "content": content,
        "timestamp": "2024-01-15T12:00:00Z"
    })
}

#[rstest]
#[case::unknown_type(json!({"type": "hologram", "text": "hi"}), "hologram")]
#[case::missing_type(json!({"text": "orphan payload"}), "orphan payload")]
#[case::numeric_type(json!({"type": 42}), "42")]
#[case::content_not_object(json!("question"), "must be a JSON object")]
#[case::question_without_text(json!({"type": "question", "timeout_seconds": 60}), "text")]
#[case::zero_timeout(json!({"type": "question", "text": "q", "timeout_seconds": 0}), "timeout")]
#[case::empty_url(json!({"type": "navigate", "url": ""}), "url")]
#[case::bad_priority(json!({"type": "notification", "text": "n", "priority": "meh"}), "meh")]
fn test_decode_rejects(#[case] content: serde_json::Value, #[case] needle: &str) {
    let err = codec::decode_value(with_content(content)).unwrap_err();
    assert!(err.is_validation(), "expected validation error, got {err}");
    assert!(
        err.to_string().contains(needle),
        "`{err}` should mention `{needle}`"
    );
}

#[test]
fn test_decode_rejects_empty_channel() {
    let mut value = with_content(json!({"type": "notification", "text": "hi"}));
    value["channel"] = json!("");
    let err = codec::decode_value(value).unwrap_err();
    assert!(err.to_string().contains("channel"));
}

#[test]
fn test_decode_rejects_correlation_on_question() {
    let mut value = with_content(json!({"type": "question", "text": "q", "timeout_seconds": 5}));
    value["correlation_id"] = json!("11111111-1111-1111-1111-111111111111");
    let err = codec::decode_value(value).unwrap_err();
    assert!(err.to_string().contains("correlation_id"));
}

// ─── Enum Parsing ───────────────────────────────────────────────────────────

#[rstest]
#[case("pending", TaskState::Pending)]
#[case("DONE", TaskState::Done)]
#[case("  Abandoned\n", TaskState::Abandoned)]
fn test_task_state_parse(#[case] input: &str, #[case] expected: TaskState) {
    assert_eq!(input.parse::<TaskState>().unwrap(), expected);
}

#[rstest]
#[case("blocks", DependencyType::Blocks)]
#[case("Related", DependencyType::Related)]
#[case("PARENT", DependencyType::Parent)]
fn test_dependency_type_parse(#[case] input: &str, #[case] expected: DependencyType) {
    assert_eq!(input.parse::<DependencyType>().unwrap(), expected);
}

#[rstest]
#[case("urgent", NotificationPriority::Urgent)]
#[case("High", NotificationPriority::High)]
#[case("NORMAL", NotificationPriority::Normal)]
#[case("low", NotificationPriority::Low)]
fn test_priority_parse(#[case] input: &str, #[case] expected: NotificationPriority) {
    assert_eq!(input.parse::<NotificationPriority>().unwrap(), expected);
    assert_eq!(expected.to_string(), input.trim().to_lowercase());
}

#[rstest]
#[case("text", ResponseType::Text)]
#[case("Authorization_Approved", ResponseType::AuthorizationApproved)]
#[case("AUTHORIZATION_DENIED", ResponseType::AuthorizationDenied)]
#[case("timeout", ResponseType::Timeout)]
#[case("cancelled", ResponseType::Cancelled)]
fn test_response_type_parse(#[case] input: &str, #[case] expected: ResponseType) {
    assert_eq!(input.parse::<ResponseType>().unwrap(), expected);
}

#[rstest]
#[case::state("finished")]
#[case::empty("")]
#[case::typo("pendng")]
fn test_task_state_rejects(#[case] input: &str) {
    let err = input.parse::<TaskState>().unwrap_err();
    assert!(err.is_validation());
    assert!(err.message().contains("pending, done, abandoned"));
}

#[test]
fn test_dependency_type_rejects_with_accepted_list() {
    let err = "owns".parse::<DependencyType>().unwrap_err();
    assert_eq!(
        err.message(),
        "invalid dependency type `owns`: must be one of blocks, related, parent"
    );
}
