use super::*;

fn sample_frame() -> Frame {
    Frame::request("mask:update", Data::new())
        .with_session_id(Uuid::new_v4())
        .with_from("host-1")
        .with_data("map_id", "map-1")
        .with_data("mask", "data:image/png;base64,AAAA")
}

#[test]
fn request_sets_fields() {
    let frame = Frame::request("map:create", Data::new());
    assert_eq!(frame.syscall, "map:create");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.session_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let session_id = Uuid::new_v4();
    let req = Frame::request("layer:add", Data::new()).with_session_id(session_id);
    let item = req.item(Data::new());

    assert_eq!(item.parent_id, Some(req.id));
    assert_eq!(item.session_id, Some(session_id));
    assert_eq!(item.syscall, "layer:add");
    assert_eq!(item.status, Status::Item);
}

#[test]
fn done_carries_data() {
    let req = Frame::request("session:join", Data::new());
    let done = req.done(Data::from([("role".to_owned(), serde_json::json!("observer"))]));

    assert_eq!(done.status, Status::Done);
    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.data.get("role").and_then(|v| v.as_str()), Some("observer"));
}

#[test]
fn terminal_statuses() {
    assert!(Status::Done.is_terminal());
    assert!(Status::Error.is_terminal());
    assert!(Status::Cancel.is_terminal());
    assert!(!Status::Request.is_terminal());
    assert!(!Status::Item.is_terminal());
}

#[test]
fn prefix_extraction() {
    let frame = Frame::request("view:update", Data::new());
    assert_eq!(frame.prefix(), "view");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("map not found")]
    struct NotFound;

    impl ErrorCode for NotFound {
        fn error_code(&self) -> &'static str {
            "map_not_found"
        }
    }

    let req = Frame::request("mask:update", Data::new());
    let err = req.error_from(&NotFound);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data.get(FRAME_CODE).and_then(|v| v.as_str()), Some("map_not_found"));
    assert_eq!(err.data.get(FRAME_MESSAGE).and_then(|v| v.as_str()), Some("map not found"));
    assert_eq!(
        err.data
            .get(FRAME_RETRYABLE)
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
}

#[test]
fn encode_decode_round_trip_preserves_frame() {
    let frame = sample_frame();
    let text = encode_frame(&frame);
    let decoded = decode_frame(&text).expect("decode should succeed");
    assert_eq!(decoded, frame);
}

#[test]
fn encode_frame_outputs_json_object() {
    let text = encode_frame(&sample_frame());
    assert!(text.starts_with('{'));
    assert!(text.contains("\"syscall\":\"mask:update\""));
}

#[test]
fn absent_session_id_is_omitted_from_json() {
    let text = encode_frame(&Frame::request("session:join", Data::new()));
    assert!(!text.contains("session_id"));
}

#[test]
fn decode_frame_rejects_malformed_text() {
    let err = decode_frame("{not json").expect_err("text should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_frame_rejects_unknown_status() {
    let text = r#"{"id":"9f0d1c8e-0000-4000-8000-000000000000","parent_id":null,"ts":1,"from":null,"syscall":"map:create","status":"bogus","data":{}}"#;
    assert!(decode_frame(text).is_err());
}

#[test]
fn decode_frame_rejects_non_uuid_id() {
    let text = r#"{"id":"not-a-uuid","parent_id":null,"ts":1,"from":null,"syscall":"map:create","status":"request","data":{}}"#;
    assert!(decode_frame(text).is_err());
}

#[test]
fn status_serializes_as_lowercase_json() {
    assert_eq!(
        serde_json::to_string(&Status::Request).expect("serialize"),
        "\"request\""
    );
    assert_eq!(
        serde_json::to_string(&Status::Item).expect("serialize"),
        "\"item\""
    );
    assert_eq!(
        serde_json::to_string(&Status::Cancel).expect("serialize"),
        "\"cancel\""
    );
}

#[test]
fn status_rejects_non_lowercase_json() {
    assert!(serde_json::from_str::<Status>("\"Error\"").is_err());
}
