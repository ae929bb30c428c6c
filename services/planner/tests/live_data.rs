//! Live queries through the multiplexer against the SQLite store, plus the
//! profile merge path.

use chrono::NaiveDate;
use parking_lot::Mutex;
use planner_core::{ClassType, DocumentStore};
use planner_lib::adapters::SqliteDocumentStore;
use planner_lib::realtime::feeds::{self, FeedEvent};
use planner_lib::realtime::{month_key, LiveEvent, RealtimeManager, RealtimeStatus};
use planner_lib::services::{ClassService, NewClass, NewProfile, ProfilePatch, UserService};
use std::sync::Arc;
use std::time::Duration;

async fn store() -> Arc<dyn DocumentStore> {
    Arc::new(SqliteDocumentStore::in_memory().await.unwrap())
}

fn june_class(topic: &str, day: u32, start: &str) -> NewClass {
    NewClass {
        topic: topic.to_string(),
        mentor: "m1".to_string(),
        support_mentors: vec!["s1".to_string(), "m1".to_string(), "s1".to_string()],
        manager: "mgr".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
        start_time: start.to_string(),
        end_time: "23:00".to_string(),
        class_type: ClassType::Online,
        location: None,
        meeting_link: Some("https://meet.example.com/abc".to_string()),
        description: None,
    }
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

fn snapshot_ids(event: &LiveEvent) -> Vec<String> {
    match event {
        LiveEvent::Snapshot(docs) => docs.iter().map(|d| d.id.clone()).collect(),
        LiveEvent::Stalled { reason } => panic!("unexpected stall: {}", reason),
    }
}

#[tokio::test]
async fn month_feed_replays_cache_to_late_callbacks() {
    let store = store().await;
    let classes = ClassService::new(store.clone());
    let manager = RealtimeManager::new(store.clone());
    let key = month_key(2024, 6);
    assert_eq!(key, "m:2024-6");

    let target = classes.classes_by_month_target(2024, 6).unwrap();
    manager.subscribe(&key, &target, |_| {}).unwrap();

    let first = Arc::new(Mutex::new(Vec::new()));
    let sink = first.clone();
    manager.add_callback(&key, move |event| sink.lock().push(snapshot_ids(event)));

    let class_a = classes.create_class(june_class("Rust", 3, "09:00")).await.unwrap();
    classes
        .create_class(NewClass {
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            ..june_class("July", 1, "09:00")
        })
        .await
        .unwrap();
    wait_until("classA snapshot", || {
        first.lock().last().map(|ids| ids == &vec![class_a.clone()]) == Some(true)
    })
    .await;

    let second = Arc::new(Mutex::new(Vec::new()));
    let sink = second.clone();
    manager.add_callback(&key, move |event| sink.lock().push(snapshot_ids(event)));
    assert_eq!(*second.lock(), vec![vec![class_a.clone()]]);

    let stored = classes.get_class(&class_a).await.unwrap();
    assert_eq!(stored.support_mentors, vec!["s1".to_string()]);

    manager.unsubscribe_all();
    assert_eq!(manager.get_status(), RealtimeStatus::default());
}

#[tokio::test]
async fn typed_month_feed_orders_by_date_then_start_time() {
    let store = store().await;
    let classes = ClassService::new(store.clone());
    let manager = RealtimeManager::new(store.clone());

    let latest = Arc::new(Mutex::new(None));
    let sink = latest.clone();
    feeds::subscribe_classes_by_month(&manager, &classes, 2024, 6, None, move |event| {
        if let FeedEvent::Update(list) = event {
            let topics: Vec<String> = list.into_iter().map(|c| c.topic).collect();
            *sink.lock() = Some(topics);
        }
    })
    .unwrap();

    classes.create_class(june_class("late", 10, "14:00")).await.unwrap();
    classes.create_class(june_class("early", 10, "08:00")).await.unwrap();
    classes.create_class(june_class("first", 2, "18:00")).await.unwrap();

    wait_until("three classes", || {
        latest.lock().as_ref().map(|t| t.len()) == Some(3)
    })
    .await;
    assert_eq!(
        latest.lock().clone().unwrap(),
        vec!["first", "early", "late"]
    );
    assert!(manager.get_status().active_listeners.contains(feeds::CLASSES_KEY));
}

#[tokio::test]
async fn user_classes_feed_keeps_only_related_classes() {
    let store = store().await;
    let classes = ClassService::new(store.clone());
    let manager = RealtimeManager::new(store.clone());

    classes.create_class(june_class("mine", 3, "09:00")).await.unwrap();
    classes
        .create_class(NewClass {
            mentor: "someone".to_string(),
            support_mentors: vec![],
            manager: "else".to_string(),
            ..june_class("theirs", 4, "09:00")
        })
        .await
        .unwrap();

    let latest = Arc::new(Mutex::new(None));
    let sink = latest.clone();
    feeds::subscribe_user_classes(&manager, &classes, "s1", None, move |event| {
        if let FeedEvent::Update(list) = event {
            *sink.lock() = Some(list.into_iter().map(|c| c.topic).collect::<Vec<_>>());
        }
    })
    .unwrap();

    wait_until("first snapshot", || latest.lock().is_some()).await;
    assert_eq!(latest.lock().clone().unwrap(), vec!["mine"]);
}

#[tokio::test]
async fn profile_updates_merge_and_reach_the_user_feed() {
    let store = store().await;
    let users = UserService::new(store.clone());
    let manager = RealtimeManager::new(store.clone());
    users
        .save_user_info(
            "u1",
            NewProfile {
                first_name: "Ana".to_string(),
                last_name: "Lee".to_string(),
                email: "a@x.com".to_string(),
                role: None,
            },
        )
        .await
        .unwrap();

    let latest = Arc::new(Mutex::new(None));
    let sink = latest.clone();
    feeds::subscribe_user_info(&manager, &users, "u1", move |event| {
        if let FeedEvent::Update(profile) = event {
            *sink.lock() = profile.map(|p| p.first_name);
        }
    })
    .unwrap();
    wait_until("initial profile", || latest.lock().is_some()).await;

    users
        .update_user_info(
            "u1",
            ProfilePatch {
                first_name: Some("Anna".to_string()),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();

    let profile = users.get_user_info("u1").await.unwrap().unwrap();
    assert_eq!(profile.first_name, "Anna");
    assert_eq!(profile.last_name, "Lee");
    assert_eq!(profile.email, "a@x.com");
    assert!(profile.updated_at >= profile.created_at);

    wait_until("updated profile", || {
        latest.lock().as_deref() == Some("Anna")
    })
    .await;
    assert!(manager
        .get_status()
        .active_listeners
        .contains(&feeds::user_info_key("u1")));
}
