//! Multi-step team workflows against a real on-disk store

use agent_team_coord_core::messaging::{self, Outgoing};
use agent_team_coord_core::schema::{BackendKind, MessageKind};
use agent_team_coord_core::tasks::{self, TaskPatch};
use agent_team_coord_core::{TeamMember, TeamStore};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn team_with(members: &[&str]) -> (TempDir, TeamStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = TeamStore::new(temp_dir.path());
    store.create_team("t1", Some("workflow".to_string())).unwrap();
    for name in members {
        store
            .add_member("t1", TeamMember::new("t1", name, BackendKind::Tmux))
            .unwrap();
    }
    (temp_dir, store)
}

#[test]
fn test_direct_send_lands_in_one_mailbox() {
    let (_temp, store) = team_with(&["alice", "bob"]);

    messaging::send(&store, "t1", &Outgoing::plain("bob", "please review PR 12").with_sender("alice"))
        .unwrap();

    let bob = store.read_inbox("t1", "bob").unwrap();
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].text, "please review PR 12");
    assert_eq!(bob[0].from, "team-lead@t1");
    assert!(store.read_inbox("t1", "alice").unwrap().is_empty());
}

#[test]
fn test_broadcast_excludes_sender() {
    let (_temp, store) = team_with(&["alice", "bob", "carol"]);

    let delivery = messaging::send(&store, "t1", &Outgoing::broadcast("standup").with_sender("alice@t1"))
        .unwrap();
    assert_eq!(delivery.recipients, vec!["bob", "carol"]);

    for name in ["bob", "carol"] {
        let inbox = store.read_inbox("t1", name).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, MessageKind::Broadcast);
    }
    assert!(store.read_inbox("t1", "alice").unwrap().is_empty());
}

#[test]
fn test_task_claim_notifies_once() {
    let (_temp, store) = team_with(&["alice"]);
    let task = tasks::create_task(&store, "t1", "Write parser", "Tokenizer first").unwrap();
    assert_eq!(task.status, "open");

    let claim = TaskPatch {
        status: Some("in_progress".to_string()),
        owner: Some("alice".to_string()),
        ..TaskPatch::default()
    };
    tasks::update_task(&store, "t1", &task.id, claim.clone()).unwrap();
    tasks::update_task(&store, "t1", &task.id, claim).unwrap();

    let inbox = store.read_inbox("t1", "alice").unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, MessageKind::TaskAssignment);
    let payload: serde_json::Value = serde_json::from_str(&inbox[0].text).unwrap();
    assert_eq!(payload["taskId"], task.id);
    assert_eq!(payload["subject"], "Write parser");
    assert_eq!(payload["assignedBy"], "team-lead@t1");
}

#[test]
fn test_concurrent_senders_lose_nothing() {
    let (_temp, store) = team_with(&["alice"]);
    let writers = 8;
    let per_writer = 5;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_writer {
                    messaging::send(&store, "t1", &Outgoing::plain("alice", &format!("w{w}-{i}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let inbox = store.read_inbox("t1", "alice").unwrap();
    assert_eq!(inbox.len(), writers * per_writer);
    // Each writer's own messages stay in send order.
    for w in 0..writers {
        let mine: Vec<_> = inbox
            .iter()
            .filter(|m| m.text.starts_with(&format!("w{w}-")))
            .map(|m| m.text.clone())
            .collect();
        let expected: Vec<_> = (0..per_writer).map(|i| format!("w{w}-{i}")).collect();
        assert_eq!(mine, expected);
    }
}

#[test]
fn test_concurrent_task_creation_assigns_unique_ids() {
    let (_temp, store) = team_with(&[]);
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                tasks::create_task(&store, "t1", &format!("task {i}"), "").unwrap()
            })
        })
        .collect();
    let mut ids: Vec<u64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().id.parse().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);

    let listed: Vec<String> = tasks::list_tasks(&store, "t1")
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(listed, vec!["1", "2", "3", "4", "5", "6"]);
}

#[test]
fn test_poll_wakes_on_delivery() {
    let (_temp, store) = team_with(&["alice"]);
    let sender = store.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        messaging::send(&sender, "t1", &Outgoing::plain("alice", "wake up")).unwrap();
    });

    let found = messaging::poll_inbox(&store, "t1", "alice", None, Duration::from_secs(10)).unwrap();
    handle.join().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text, "wake up");
}

#[test]
fn test_delete_team_requires_empty_roster() {
    let (_temp, store) = team_with(&["alice"]);
    assert!(store.delete_team("t1").is_err());
    store.remove_member("t1", "alice").unwrap();
    store.delete_team("t1").unwrap();
    assert!(!store.team_exists("t1"));
}
