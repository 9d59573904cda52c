use milkwise_backend::prompts::Prompts;
use milkwise_backend::services::classifier::Escalation;
use milkwise_backend::services::persistence::{JsonLinesSink, MessageRecord, PersistenceSink};
use milkwise_backend::services::session_manager::{Rating, Session};
use serde_json::Value;

fn read_lines(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_chat_log_appends_tagged_lines() {
    let path = std::env::temp_dir().join(format!("chat-log-{}.json", uuid::Uuid::new_v4()));
    let sink = JsonLinesSink::new(&path);

    let mut session = Session::start(&Prompts::default());
    let flags = Escalation {
        is_emergency: true,
        needs_professional_consult: false,
    };
    let user = session.append_user_message("call 911", flags);
    let reply = session.append_assistant_message("Calling is the right step.", flags);

    for id in [user, reply] {
        let record = MessageRecord::new(session.id(), session.message(id).unwrap());
        sink.insert_message(&record).await.unwrap();
    }
    let feedback = session.record_feedback_if_changed(reply, Some(Rating::Down)).unwrap();
    sink.upsert_feedback(&feedback).await.unwrap();

    let lines = read_lines(sink.path());
    std::fs::remove_file(&path).ok();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["record"], "message");
    assert_eq!(lines[0]["actor_type"], "user");
    assert_eq!(lines[0]["content"], "call 911");
    assert_eq!(lines[0]["is_emergency"], true);
    assert_eq!(lines[1]["actor_type"], "assistant");
    assert_eq!(lines[1]["session_id"], session.id().to_string());
    assert_eq!(lines[2]["record"], "feedback");
    assert_eq!(lines[2]["value"], -1);
    assert_eq!(lines[2]["message_id"], reply.to_string());
}

#[tokio::test]
async fn test_chat_log_reports_io_errors() {
    let dir = std::env::temp_dir().join(format!("missing-{}", uuid::Uuid::new_v4()));
    let sink = JsonLinesSink::new(dir.join("nested").join("chat_logs.json"));

    let session = Session::start(&Prompts::default());
    let intro = &session.visible_messages()[0];
    let result = sink
        .insert_message(&MessageRecord::new(session.id(), intro))
        .await;

    assert!(result.is_err());
}
