use milkwise_backend::prompts::Prompts;
use milkwise_backend::services::classifier::Escalation;
use milkwise_backend::services::session_manager::{MessageRole, Rating, Session, SessionManager};
use std::time::Duration;
use tokio::time::sleep;

fn persona_only() -> Prompts {
    Prompts {
        persona: "You are a supportive assistant.".to_string(),
        introduction: None,
    }
}

#[test]
fn test_user_then_assistant_order() {
    let mut session = Session::start(&persona_only());
    let flags = Escalation {
        is_emergency: false,
        needs_professional_consult: true,
    };

    let user = session.append_user_message("my baby has a rash", flags);
    let reply = session.append_assistant_message("Here is what to watch for.", flags);

    let roles: Vec<_> = session.messages().iter().map(|m| m.role()).collect();
    assert_eq!(
        roles,
        vec![MessageRole::System, MessageRole::User, MessageRole::Assistant]
    );
    assert_eq!(session.messages()[1].id(), user);
    assert_eq!(session.messages()[2].id(), reply);
    assert_ne!(user, reply);
    assert_eq!(session.message(reply).unwrap().escalation(), flags);
    assert_eq!(session.message(user).unwrap().content(), "my baby has a rash");
}

#[test]
fn test_system_prompt_is_hidden() {
    let session = Session::start(&Prompts::default());
    assert_eq!(session.messages()[0].role(), MessageRole::System);
    assert!(
        session
            .visible_messages()
            .iter()
            .all(|m| m.role() != MessageRole::System)
    );
}

#[test]
fn test_feedback_recorded_once_per_value() {
    let mut session = Session::start(&Prompts::default());
    let intro = session.visible_messages()[0].id();

    let first = session.record_feedback_if_changed(intro, Some(Rating::Up));
    let repeat = session.record_feedback_if_changed(intro, Some(Rating::Up));
    assert!(first.is_some());
    assert!(repeat.is_none());

    let record = first.unwrap();
    assert_eq!(record.message_id, intro);
    assert_eq!(record.session_id, session.id());
    assert_eq!(record.value, Rating::Up);
}

#[test]
fn test_feedback_change_yields_new_record() {
    let mut session = Session::start(&persona_only());
    let reply = session.append_assistant_message("hello", Escalation::NONE);

    let up = session.record_feedback_if_changed(reply, Some(Rating::Up)).unwrap();
    let down = session.record_feedback_if_changed(reply, Some(Rating::Down)).unwrap();

    assert_ne!(up.feedback_id, down.feedback_id);
    assert_eq!(session.feedback_for(reply), Some(Rating::Down));
}

#[tokio::test]
async fn basic_session_flow() {
    let mgr = SessionManager::new(Duration::from_secs(60), Prompts::default());
    let (sid, handle) = mgr.create_session().await;

    handle
        .lock()
        .await
        .append_user_message("hello", Escalation::NONE);

    let again = mgr.get(sid).await.unwrap();
    assert_eq!(again.lock().await.messages().len(), 3);
    assert_eq!(mgr.list_session_ids().await, vec![sid]);
    assert!(mgr.remove_session(sid).await);
    assert!(mgr.get(sid).await.is_none());
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let mgr = SessionManager::new(Duration::from_secs(60), persona_only());
    let (_, a) = mgr.create_session().await;
    let (_, b) = mgr.create_session().await;

    a.lock().await.append_user_message("only in a", Escalation::NONE);

    assert_eq!(a.lock().await.messages().len(), 2);
    assert_eq!(b.lock().await.messages().len(), 1);
    assert_eq!(mgr.len().await, 2);
}

#[tokio::test]
async fn test_session_expiration() {
    let mgr = SessionManager::new(Duration::from_millis(10), Prompts::default());
    let (sid, _) = mgr.create_session().await;

    // Wait for expiration
    sleep(Duration::from_millis(20)).await;

    let removed_count = mgr.purge_expired().await;
    assert_eq!(removed_count, 1, "Should have removed 1 expired session");
    assert!(
        !mgr.remove_session(sid).await,
        "Session should already be gone"
    );
}

#[tokio::test]
async fn test_activity_keeps_session_alive() {
    let mgr = SessionManager::new(Duration::from_millis(50), Prompts::default());
    let (sid, _) = mgr.create_session().await;

    sleep(Duration::from_millis(30)).await;
    assert!(mgr.get(sid).await.is_some());
    sleep(Duration::from_millis(30)).await;

    assert_eq!(mgr.purge_expired().await, 0);
    assert!(!mgr.is_empty().await);
}
